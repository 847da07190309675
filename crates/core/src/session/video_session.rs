use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;

use crate::capture::domain::photo_sink::PhotoSink;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::model_kind::ModelKind;
use crate::pipeline::annotate_frame_use_case::AnnotateFrameUseCase;
use crate::pipeline::capture_passport_use_case::{
    CaptureError, CapturePassportUseCase, CaptureSettings, CapturedPhoto,
};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::rendering::label_font::LabelFont;
use crate::session::in_flight::InFlightGuard;
use crate::session::scheduler::LoopHandle;
use crate::session::state::{Action, AppState};
use crate::session::store::Store;
use crate::shared::config::AppConfig;
use crate::shared::image_size::ImageSize;
use crate::video::domain::frame_source::FrameSource;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no model is selected and loaded")]
    ModelNotReady,
    #[error("frame source error: {0}")]
    Source(String),
    #[error("annotation loop is already running")]
    AlreadyRunning,
    #[error("detector error: {0}")]
    Detector(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    ModelNotReady,
    NoFrame,
    DetectorError,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::InFlight => "in_flight",
            SkipReason::ModelNotReady => "model_not_ready",
            SkipReason::NoFrame => "no_frame",
            SkipReason::DetectorError => "detector_error",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Annotated { frame_index: usize, faces: usize },
    Skipped(SkipReason),
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Everything one tick touches. Cloned into the loop thread.
#[derive(Clone)]
struct TickContext {
    store: Store,
    source: Arc<Mutex<Box<dyn FrameSource>>>,
    detector: Arc<Mutex<Box<dyn FaceDetector>>>,
    annotate: Arc<Mutex<AnnotateFrameUseCase>>,
    guard: InFlightGuard,
    in_flight_skips: Arc<AtomicUsize>,
}

impl TickContext {
    fn run_tick(&self) -> TickOutcome {
        let Some(_token) = self.guard.try_enter() else {
            self.in_flight_skips.fetch_add(1, Ordering::Relaxed);
            log::debug!("Tick skipped: previous detection still in flight");
            return TickOutcome::Skipped(SkipReason::InFlight);
        };

        let Some(kind) = self.store.read(AppState::ready_model) else {
            return self.skip(SkipReason::ModelNotReady);
        };

        let frame = {
            let mut source = lock(&self.source);
            if !source.is_open() {
                drop(source);
                return self.skip(SkipReason::NoFrame);
            }
            match source.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    drop(source);
                    log::warn!("Failed to read frame: {e}");
                    return self.skip(SkipReason::NoFrame);
                }
            }
        };

        let tick = {
            let mut detector = lock(&self.detector);
            let mut annotate = lock(&self.annotate);
            match annotate.execute(frame, &mut **detector, kind) {
                Ok(tick) => tick,
                Err(e) => {
                    log::warn!("Detection failed: {e}");
                    annotate
                        .logger_mut()
                        .skipped(SkipReason::DetectorError.as_str());
                    return TickOutcome::Skipped(SkipReason::DetectorError);
                }
            }
        };

        let frame_index = tick.frame.index();
        let faces = tick.detections.len();
        self.store.dispatch(Action::FrameAnnotated {
            frame: Arc::new(tick.frame),
            detections: tick.detections,
            overlay: tick.overlay,
        });
        TickOutcome::Annotated { frame_index, faces }
    }

    fn skip(&self, reason: SkipReason) -> TickOutcome {
        lock(&self.annotate).logger_mut().skipped(reason.as_str());
        TickOutcome::Skipped(reason)
    }
}

/// Live capture session: model selection, video lifecycle, the annotation
/// loop and one-shot passport capture over a shared [`Store`].
///
/// The loop starts once the video is open and the selected model is loaded,
/// whichever happens last. Closing (or dropping) the session stops the loop
/// before the frame source is released.
pub struct VideoSession {
    config: AppConfig,
    ctx: TickContext,
    capture: CapturePassportUseCase,
    loop_handle: Option<LoopHandle>,
}

impl VideoSession {
    pub fn new(
        config: AppConfig,
        detector: Box<dyn FaceDetector>,
        source: Box<dyn FrameSource>,
        sink: Box<dyn PhotoSink>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        let font = LabelFont::from_config(config.font_path.as_deref());
        let annotate = AnnotateFrameUseCase::new(config.display_size, font.clone(), logger);
        let capture =
            CapturePassportUseCase::new(sink, CaptureSettings::from_config(&config), font);
        let ctx = TickContext {
            store: Store::new(AppState::new(config.capture_threshold)),
            source: Arc::new(Mutex::new(source)),
            detector: Arc::new(Mutex::new(detector)),
            annotate: Arc::new(Mutex::new(annotate)),
            guard: InFlightGuard::new(),
            in_flight_skips: Arc::new(AtomicUsize::new(0)),
        };
        Self {
            config,
            ctx,
            capture,
            loop_handle: None,
        }
    }

    pub fn store(&self) -> &Store {
        &self.ctx.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Selects a model, loading it first if needed.
    pub fn select_model(&mut self, kind: ModelKind) -> Result<(), SessionError> {
        self.ctx.store.dispatch(Action::SelectModel(kind));
        let loaded = lock(&self.ctx.detector).is_loaded(kind);
        if loaded {
            self.ctx.store.dispatch(Action::ModelLoaded(kind));
            self.start_if_ready();
            Ok(())
        } else {
            self.load_model(kind)
        }
    }

    /// Loads a model. Failure is logged and leaves it unloaded; there is no
    /// retry.
    pub fn load_model(&mut self, kind: ModelKind) -> Result<(), SessionError> {
        log::info!("Loading {kind} model");
        let result = lock(&self.ctx.detector).load_model(kind, &self.config.model_base_url);
        match result {
            Ok(()) => {
                log::info!("{kind} model ready");
                self.ctx.store.dispatch(Action::ModelLoaded(kind));
                self.start_if_ready();
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                log::error!("Failed to load {kind} model: {message}");
                self.ctx.store.dispatch(Action::ModelLoadFailed {
                    kind,
                    message: message.clone(),
                });
                Err(SessionError::Detector(message))
            }
        }
    }

    /// Opens the frame source at the display size without starting the loop.
    pub fn open_source(&mut self) -> Result<ImageSize, SessionError> {
        let requested = self.config.display_size;
        let size = {
            let mut source = lock(&self.ctx.source);
            if source.is_open() {
                return Err(SessionError::AlreadyRunning);
            }
            source.open(requested).map_err(|e| {
                log::error!("Failed to open video source: {e}");
                SessionError::Source(e.to_string())
            })?
        };
        log::info!("Video source open at {size}");
        self.ctx.store.dispatch(Action::VideoStarted);
        Ok(size)
    }

    /// Opens the frame source and starts the loop when a model is already
    /// ready; otherwise the loop starts once one finishes loading.
    pub fn open_video(&mut self) -> Result<ImageSize, SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        let size = self.open_source()?;
        self.start_if_ready();
        Ok(size)
    }

    /// Starts the annotation loop.
    pub fn start_loop(&mut self) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        if self.ctx.store.read(AppState::ready_model).is_none() {
            return Err(SessionError::ModelNotReady);
        }
        if !lock(&self.ctx.source).is_open() {
            return Err(SessionError::Source("video source is not open".into()));
        }

        let ctx = self.ctx.clone();
        let interval = Duration::from_millis(self.config.tick_interval_ms.max(1));
        let handle = LoopHandle::spawn("annotation-loop", interval, move || {
            ctx.run_tick();
        })
        .map_err(|e| SessionError::Source(format!("failed to spawn annotation loop: {e}")))?;
        log::info!(
            "Annotation loop started ({} ms interval)",
            self.config.tick_interval_ms
        );
        self.loop_handle = Some(handle);
        Ok(())
    }

    fn start_if_ready(&mut self) {
        if self.is_running() || !lock(&self.ctx.source).is_open() {
            return;
        }
        if self.ctx.store.read(AppState::ready_model).is_some() {
            if let Err(e) = self.start_loop() {
                log::error!("Could not start annotation loop: {e}");
            }
        }
    }

    /// Runs one tick on the calling thread.
    pub fn step(&self) -> TickOutcome {
        self.ctx.run_tick()
    }

    pub fn is_running(&self) -> bool {
        self.loop_handle.as_ref().is_some_and(LoopHandle::is_running)
    }

    /// Number of ticks skipped because a detection was still running.
    pub fn in_flight_skips(&self) -> usize {
        self.ctx.in_flight_skips.load(Ordering::Relaxed)
    }

    /// Captures a passport photo from the latest frame and detections.
    pub fn capture(&self) -> Result<Option<CapturedPhoto>, CaptureError> {
        let (frame, detections) = self
            .ctx
            .store
            .read(|s| (s.latest_frame.clone(), s.detections.clone()));
        let result = self.capture.execute(frame.as_deref(), &detections);
        match &result {
            Ok(Some(_)) => {
                self.ctx.store.dispatch(Action::PhotoCaptured);
            }
            Ok(None) => {}
            Err(e) => log::error!("Capture failed: {e}"),
        }
        result
    }

    /// Stops the loop, then releases the frame source.
    pub fn close(&mut self) {
        let was_running = self.loop_handle.is_some();
        if let Some(mut handle) = self.loop_handle.take() {
            handle.stop();
            lock(&self.ctx.annotate).finish();
        }
        let mut source = lock(&self.ctx.source);
        if source.is_open() || was_running {
            source.close();
            drop(source);
            self.ctx.store.dispatch(Action::VideoStopped);
            log::info!("Video closed");
        }
    }
}

impl Drop for VideoSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection_result::DetectionResult;
    use crate::detection::domain::model_kind::DetectionOptions;
    use crate::detection::infrastructure::replay_face_detector::{
        ReplayFaceDetector, ReplayScript,
    };
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::frame::Frame;

    type EventLog = Arc<Mutex<Vec<&'static str>>>;

    struct StubSource {
        open: bool,
        index: usize,
        events: EventLog,
    }

    impl FrameSource for StubSource {
        fn open(&mut self, requested: ImageSize) -> Result<ImageSize, Box<dyn std::error::Error>> {
            self.open = true;
            self.events.lock().unwrap().push("open");
            Ok(requested)
        }

        fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
            self.events.lock().unwrap().push("read");
            let frame = Frame::new(vec![90; 640 * 480 * 3], 640, 480, self.index);
            self.index += 1;
            Ok(frame)
        }

        fn close(&mut self) {
            self.open = false;
            self.events.lock().unwrap().push("close");
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn load_model(
            &mut self,
            _kind: ModelKind,
            _base_url: &str,
        ) -> Result<(), Box<dyn std::error::Error>> {
            Err("network unreachable".into())
        }

        fn is_loaded(&self, _kind: ModelKind) -> bool {
            false
        }

        fn detect_all_faces(
            &mut self,
            _frame: &Frame,
            _kind: ModelKind,
            _options: &DetectionOptions,
        ) -> Result<Vec<DetectionResult>, Box<dyn std::error::Error>> {
            Err("not loaded".into())
        }
    }

    struct RecordingSink {
        delivered: Arc<Mutex<Vec<String>>>,
    }

    impl PhotoSink for RecordingSink {
        fn deliver(&self, file_name: &str, _png: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
            self.delivered.lock().unwrap().push(file_name.to_string());
            Ok(())
        }
    }

    struct Harness {
        session: VideoSession,
        events: EventLog,
        delivered: Arc<Mutex<Vec<String>>>,
    }

    fn config() -> AppConfig {
        AppConfig {
            tick_interval_ms: 5,
            ..AppConfig::default()
        }
    }

    fn harness_with(detector: Box<dyn FaceDetector>) -> Harness {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let session = VideoSession::new(
            config(),
            detector,
            Box::new(StubSource {
                open: false,
                index: 0,
                events: events.clone(),
            }),
            Box::new(RecordingSink {
                delivered: delivered.clone(),
            }),
            Box::new(NullPipelineLogger),
        );
        Harness {
            session,
            events,
            delivered,
        }
    }

    fn replay(confidence: f64) -> Box<dyn FaceDetector> {
        Box::new(ReplayFaceDetector::new(ReplayScript::constant(vec![
            DetectionResult::new(BoundingBox::new(300.0, 200.0, 100.0, 120.0), confidence),
        ])))
    }

    fn wait_until(session: &VideoSession, f: impl Fn(&AppState) -> bool) {
        for _ in 0..400 {
            if session.store().read(&f) {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_loop_refuses_to_start_without_model() {
        let mut h = harness_with(replay(0.9));
        h.session.open_video().unwrap();
        assert!(!h.session.is_running());
        assert!(matches!(
            h.session.start_loop(),
            Err(SessionError::ModelNotReady)
        ));
    }

    #[test]
    fn test_loop_refuses_to_start_without_video() {
        let mut h = harness_with(replay(0.9));
        h.session.select_model(ModelKind::FastAccurate).unwrap();
        assert!(!h.session.is_running());
        assert!(matches!(h.session.start_loop(), Err(SessionError::Source(_))));
    }

    #[test]
    fn test_loop_starts_when_model_loads_after_video() {
        let mut h = harness_with(replay(0.9));
        h.session.open_video().unwrap();
        h.session.select_model(ModelKind::FastAccurate).unwrap();
        assert!(h.session.is_running());
        assert!(matches!(
            h.session.start_loop(),
            Err(SessionError::AlreadyRunning)
        ));

        wait_until(&h.session, |s| !s.detections.is_empty());
        assert!(h.session.store().view().can_capture);
    }

    #[test]
    fn test_step_annotates_and_capture_delivers() {
        let mut h = harness_with(replay(0.9));
        h.session.select_model(ModelKind::FastLightweight).unwrap();
        // Loop not running: drive ticks by hand.
        h.session.open_source().unwrap();

        let outcome = h.session.step();
        assert_eq!(
            outcome,
            TickOutcome::Annotated {
                frame_index: 0,
                faces: 1
            }
        );

        let photo = h.session.capture().unwrap().unwrap();
        assert_eq!(photo.image.dimensions(), (400, 500));
        assert_eq!(*h.delivered.lock().unwrap(), vec!["passport_photo.png"]);
        assert_eq!(h.session.store().view().captures, 1);
    }

    #[test]
    fn test_capture_without_detections_is_noop() {
        let h = harness_with(replay(0.9));
        assert!(h.session.capture().unwrap().is_none());
        assert!(h.delivered.lock().unwrap().is_empty());
        assert_eq!(h.session.store().view().captures, 0);
    }

    #[test]
    fn test_low_confidence_face_cannot_be_captured() {
        let mut h = harness_with(replay(0.6));
        h.session.select_model(ModelKind::FastAccurate).unwrap();
        h.session.open_source().unwrap();
        h.session.step();
        let view = h.session.store().view();
        assert_eq!(view.face_count, 1);
        assert!(!view.can_capture);
    }

    #[test]
    fn test_step_without_model_is_skipped() {
        let h = harness_with(replay(0.9));
        assert_eq!(
            h.session.step(),
            TickOutcome::Skipped(SkipReason::ModelNotReady)
        );
    }

    #[test]
    fn test_step_skipped_while_detection_in_flight() {
        let mut h = harness_with(replay(0.9));
        h.session.select_model(ModelKind::FastAccurate).unwrap();
        let _token = h.session.ctx.guard.try_enter().unwrap();
        assert_eq!(h.session.step(), TickOutcome::Skipped(SkipReason::InFlight));
        assert_eq!(h.session.in_flight_skips(), 1);
    }

    #[test]
    fn test_model_load_failure_is_reported() {
        let mut h = harness_with(Box::new(FailingDetector));
        let err = h.session.select_model(ModelKind::LandmarkCapable).unwrap_err();
        assert!(matches!(err, SessionError::Detector(_)));
        let state = h.session.store().snapshot();
        assert_eq!(state.selected_model, Some(ModelKind::LandmarkCapable));
        assert_eq!(state.ready_model(), None);
        assert!(state.last_error.unwrap().contains("network unreachable"));
    }

    #[test]
    fn test_close_stops_loop_before_releasing_source() {
        let mut h = harness_with(replay(0.9));
        h.session.select_model(ModelKind::FastAccurate).unwrap();
        h.session.open_video().unwrap();
        wait_until(&h.session, |s| s.latest_frame.is_some());

        h.session.close();
        assert!(!h.session.is_running());
        let events = h.events.lock().unwrap().clone();
        assert_eq!(events.first(), Some(&"open"));
        assert_eq!(events.last(), Some(&"close"));
        assert_eq!(events.iter().filter(|e| **e == "close").count(), 1);

        let view = h.session.store().view();
        assert!(!view.video_running);
        assert_eq!(view.face_count, 0);
    }

    #[test]
    fn test_drop_releases_source() {
        let h = harness_with(replay(0.9));
        let events = h.events.clone();
        let mut session = h.session;
        session.select_model(ModelKind::FastAccurate).unwrap();
        session.open_video().unwrap();
        drop(session);
        assert_eq!(events.lock().unwrap().last(), Some(&"close"));
    }

    #[test]
    fn test_reopen_after_close() {
        let mut h = harness_with(replay(0.9));
        h.session.select_model(ModelKind::FastAccurate).unwrap();
        h.session.open_video().unwrap();
        h.session.close();
        h.session.open_video().unwrap();
        assert!(h.session.is_running());
        assert!(h.session.store().view().video_running);
    }
}
