//! Camera capture via `nokhwa`.
//!
//! `nokhwa::Camera` is not `Send` on every backend, so the camera is created
//! and driven on its own thread; the source talks to it over channels.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

use crate::shared::frame::Frame;
use crate::shared::image_size::ImageSize;
use crate::video::domain::frame_source::FrameSource;

enum Request {
    Frame(Sender<Result<Frame, String>>),
    Stop,
}

struct CameraWorker {
    requests: Sender<Request>,
    handle: JoinHandle<()>,
}

pub struct WebcamSource {
    device_index: u32,
    fps: u32,
    worker: Option<CameraWorker>,
}

impl WebcamSource {
    pub fn new(device_index: u32, fps: u32) -> Self {
        Self {
            device_index,
            fps,
            worker: None,
        }
    }
}

impl FrameSource for WebcamSource {
    fn open(&mut self, requested: ImageSize) -> Result<ImageSize, Box<dyn std::error::Error>> {
        if self.worker.is_some() {
            return Err("Webcam already open".into());
        }
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (req_tx, req_rx) = crossbeam_channel::unbounded();
        let device_index = self.device_index;
        let fps = self.fps;

        let handle = thread::spawn(move || {
            let camera = match open_camera(device_index, requested, fps) {
                Ok(camera) => camera,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            serve(camera, ready_tx, req_rx);
        });

        let size = ready_rx
            .recv()
            .map_err(|_| "Webcam thread exited before opening")??;
        self.worker = Some(CameraWorker {
            requests: req_tx,
            handle,
        });
        Ok(size)
    }

    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        let worker = self.worker.as_ref().ok_or("Webcam not open")?;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        worker
            .requests
            .send(Request::Frame(reply_tx))
            .map_err(|_| "Webcam thread stopped")?;
        let frame = reply_rx.recv().map_err(|_| "Webcam thread stopped")??;
        Ok(frame)
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.requests.send(Request::Stop);
            if worker.handle.join().is_err() {
                log::warn!("Webcam thread panicked during shutdown");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_camera(device_index: u32, requested: ImageSize, fps: u32) -> Result<Camera, String> {
    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
    let mut camera = Camera::new(CameraIndex::Index(device_index), format)
        .map_err(|e| format!("Failed to open webcam device {device_index}: {e}"))?;
    camera
        .open_stream()
        .map_err(|e| format!("Failed to open webcam stream: {e}"))?;

    // Drivers may refuse; keep their default in that case.
    if let Err(e) = camera.set_resolution(Resolution::new(requested.width, requested.height)) {
        log::warn!("Could not set resolution {requested}: {e}. Using camera default.");
    }
    if let Err(e) = camera.set_frame_rate(fps) {
        log::warn!("Could not set frame rate {fps} fps: {e}. Using camera default.");
    }
    Ok(camera)
}

fn serve(
    mut camera: Camera,
    ready_tx: Sender<Result<ImageSize, String>>,
    requests: Receiver<Request>,
) {
    let resolution = camera.resolution();
    let size = ImageSize::new(resolution.width(), resolution.height());
    log::info!("Webcam opened at {size} @ {} fps", camera.frame_rate());
    let _ = ready_tx.send(Ok(size));

    let mut index = 0usize;
    for request in requests {
        match request {
            Request::Frame(reply) => {
                let _ = reply.send(capture(&mut camera, size, index));
                index += 1;
            }
            Request::Stop => break,
        }
    }

    if let Err(e) = camera.stop_stream() {
        log::warn!("Failed to stop webcam stream: {e}");
    }
    log::info!("Webcam stream released");
}

fn capture(camera: &mut Camera, size: ImageSize, index: usize) -> Result<Frame, String> {
    let buffer = camera
        .frame()
        .map_err(|e| format!("Failed to capture webcam frame: {e}"))?;
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| format!("Failed to decode webcam frame: {e}"))?;
    let data = decoded.to_vec();
    if data.len() != size.width as usize * size.height as usize * 3 {
        return Err(format!("Webcam frame does not match {size}"));
    }
    Ok(Frame::new(data, size.width, size.height, index))
}
