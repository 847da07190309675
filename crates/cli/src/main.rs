use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use crossbeam_channel::select;

use passport_cam_core::capture::infrastructure::directory_sink::DirectorySink;
use passport_cam_core::detection::domain::face_detector::FaceDetector;
use passport_cam_core::detection::domain::model_kind::ModelKind;
use passport_cam_core::detection::infrastructure::onnx_face_detector::OnnxFaceDetector;
use passport_cam_core::detection::infrastructure::replay_face_detector::{
    ReplayFaceDetector, ReplayScript,
};
use passport_cam_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use passport_cam_core::session::state::ViewState;
use passport_cam_core::session::video_session::{TickOutcome, VideoSession};
use passport_cam_core::shared::config::AppConfig;
use passport_cam_core::shared::constants::IMAGE_EXTENSIONS;
use passport_cam_core::video::domain::frame_source::FrameSource;
use passport_cam_core::video::infrastructure::image_sequence_source::ImageSequenceSource;
use passport_cam_core::video::infrastructure::still_image_source::StillImageSource;
#[cfg(feature = "webcam")]
use passport_cam_core::video::infrastructure::webcam_source::WebcamSource;

/// Live face annotation and passport photo capture.
#[derive(Parser)]
#[command(name = "passport-cam")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Detection model: fast-accurate, fast-lightweight or landmark-capable.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Where model files come from: an http(s) URL or a local directory.
    #[arg(long, global = true)]
    model_base_url: Option<String>,

    /// Replay detections from a JSON file instead of running a model.
    #[arg(long, global = true)]
    detections: Option<PathBuf>,

    /// Directory the passport photo is written to.
    #[arg(long, global = true, default_value = ".")]
    output_dir: PathBuf,

    /// Pixels of padding around the face before cropping.
    #[arg(long, global = true)]
    padding: Option<u32>,

    /// TTF/OTF font for accuracy labels, replacing the bundled one.
    #[arg(long, global = true)]
    font: Option<PathBuf>,

    /// Persist the effective settings to the config file.
    #[arg(long, global = true)]
    save_config: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Detect faces in a still image and write a passport photo.
    Capture {
        /// Input image file.
        input: PathBuf,
    },
    /// Run the live annotation loop. Commands on stdin: `c` capture,
    /// `m <model>` switch model, `q` quit.
    Live {
        /// Replay a still image as video.
        #[arg(long, conflicts_with = "dir")]
        image: Option<PathBuf>,

        /// Replay a directory of images as video, looping.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Webcam device index.
        #[cfg(feature = "webcam")]
        #[arg(long, conflicts_with_all = ["image", "dir"])]
        camera: Option<u32>,

        /// Annotation interval in milliseconds.
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

/// Operator input during a live session.
#[derive(Debug, PartialEq)]
enum LiveCommand {
    Capture,
    SelectModel(ModelKind),
    Quit,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = build_config(&cli)?;
    if cli.save_config {
        config.save()?;
        if let Some(path) = AppConfig::config_path() {
            log::info!("Settings saved to {}", path.display());
        }
    }

    match &cli.command {
        Command::Capture { input } => {
            let path = run_capture(&config, input, cli.detections.as_deref(), &cli.output_dir)?;
            println!("Saved {}", path.display());
        }
        Command::Live { .. } => {
            let source = open_live_source(&cli.command)?;
            run_live(&config, source, cli.detections.as_deref(), &cli.output_dir)?;
        }
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load();
    if let Some(model) = &cli.model {
        config.model = model.parse()?;
    }
    if let Some(url) = &cli.model_base_url {
        config.model_base_url = url.clone();
    }
    if let Some(padding) = cli.padding {
        config.crop_padding = padding;
    }
    if let Some(font) = &cli.font {
        config.font_path = Some(font.clone());
    }
    if let Command::Live {
        interval_ms: Some(ms),
        ..
    } = &cli.command
    {
        config.tick_interval_ms = *ms;
    }
    Ok(config)
}

fn build_detector(
    config: &AppConfig,
    detections: Option<&Path>,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    match detections {
        Some(path) => {
            log::info!("Replaying detections from {}", path.display());
            Ok(Box::new(ReplayFaceDetector::new(
                ReplayScript::from_json_file(path)?,
            )))
        }
        None => Ok(Box::new(OnnxFaceDetector::new(config.model_files.clone()))),
    }
}

fn build_session(
    config: &AppConfig,
    source: Box<dyn FrameSource>,
    detections: Option<&Path>,
    output_dir: &Path,
) -> Result<VideoSession, Box<dyn std::error::Error>> {
    let detector = build_detector(config, detections)?;
    Ok(VideoSession::new(
        config.clone(),
        detector,
        source,
        Box::new(DirectorySink::new(output_dir)),
        Box::new(StdoutPipelineLogger::default()),
    ))
}

fn run_capture(
    config: &AppConfig,
    input: &Path,
    detections: Option<&Path>,
    output_dir: &Path,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let source = Box::new(StillImageSource::new(input));
    let mut session = build_session(config, source, detections, output_dir)?;

    session.select_model(config.model)?;
    session.open_source()?;

    match session.step() {
        TickOutcome::Annotated { faces, .. } => log::info!("Detected {faces} face(s)"),
        TickOutcome::Skipped(reason) => {
            return Err(format!("Detection did not run ({})", reason.as_str()).into())
        }
    }

    let view = session.store().view();
    if view.face_count == 0 {
        return Err(format!("No face detected in {}", input.display()).into());
    }
    if !view.can_capture {
        return Err(format!(
            "No face above {:.0}% accuracy in {}",
            config.capture_threshold * 100.0,
            input.display()
        )
        .into());
    }

    match session.capture()? {
        Some(photo) => Ok(output_dir.join(photo.file_name)),
        None => Err(format!("No face detected in {}", input.display()).into()),
    }
}

fn open_live_source(command: &Command) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    let Command::Live { image, dir, .. } = command else {
        return Err("not a live command".into());
    };

    #[cfg(feature = "webcam")]
    {
        if let Command::Live {
            camera: Some(index),
            ..
        } = command
        {
            return Ok(Box::new(WebcamSource::new(*index, 30)));
        }
    }

    if let Some(image) = image {
        return Ok(Box::new(StillImageSource::new(image)));
    }
    if let Some(dir) = dir {
        return Ok(Box::new(ImageSequenceSource::new(dir)));
    }

    #[cfg(feature = "webcam")]
    {
        Ok(Box::new(WebcamSource::new(0, 30)))
    }
    #[cfg(not(feature = "webcam"))]
    {
        Err(
            "No video source: pass --image or --dir (build with --features webcam for a camera)"
                .into(),
        )
    }
}

fn run_live(
    config: &AppConfig,
    source: Box<dyn FrameSource>,
    detections: Option<&Path>,
    output_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = build_session(config, source, detections, output_dir)?;
    let views = session.store().subscribe();

    if let Err(e) = session.select_model(config.model) {
        eprintln!("Model {} unavailable: {e}. Pick another with `m <model>`.", config.model);
    }
    session.open_video()?;

    let commands = spawn_stdin_reader();
    eprintln!("Commands: c = capture, m <model> = switch model, q = quit");

    let mut view: Option<ViewState> = None;
    loop {
        select! {
            recv(views) -> msg => {
                let Ok(next) = msg else { break };
                report_view_change(view.as_ref(), &next);
                view = Some(next);
            }
            recv(commands) -> msg => {
                let Ok(line) = msg else { break };
                match parse_command(&line) {
                    Ok(Some(LiveCommand::Quit)) => break,
                    Ok(Some(LiveCommand::Capture)) => {
                        if !session.store().view().can_capture {
                            eprintln!(
                                "No face above {:.0}% accuracy yet",
                                config.capture_threshold * 100.0
                            );
                            continue;
                        }
                        match session.capture() {
                            Ok(Some(photo)) => {
                                println!("Saved {}", output_dir.join(photo.file_name).display())
                            }
                            Ok(None) => eprintln!("Nothing to capture"),
                            Err(e) => eprintln!("Capture failed: {e}"),
                        }
                    }
                    Ok(Some(LiveCommand::SelectModel(kind))) => {
                        if let Err(e) = session.select_model(kind) {
                            eprintln!("Model {kind} unavailable: {e}");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => eprintln!("{e}"),
                }
            }
        }
    }

    session.close();
    Ok(())
}

fn spawn_stdin_reader() -> crossbeam_channel::Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn report_view_change(previous: Option<&ViewState>, next: &ViewState) {
    let changed = |f: fn(&ViewState) -> bool| previous.map(f) != Some(f(next));
    if changed(|v| v.model_ready) && next.model_ready {
        if let Some(kind) = next.selected_model {
            eprintln!("Model {kind} ready");
        }
    }
    if changed(|v| v.can_capture) {
        if next.can_capture {
            eprintln!("Face detected ({} total): type `c` to capture", next.face_count);
        } else {
            eprintln!("Waiting for a clear face...");
        }
    }
}

fn parse_command(line: &str) -> Result<Option<LiveCommand>, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Ok(None);
    };
    match head {
        "c" | "capture" => Ok(Some(LiveCommand::Capture)),
        "q" | "quit" => Ok(Some(LiveCommand::Quit)),
        "m" | "model" => {
            let name = parts
                .next()
                .ok_or("Usage: m <fast-accurate|fast-lightweight|landmark-capable>")?;
            Ok(Some(LiveCommand::SelectModel(name.parse()?)))
        }
        other => Err(format!("Unknown command '{other}'")),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(model) = &cli.model {
        model.parse::<ModelKind>()?;
    }
    if let Some(path) = &cli.detections {
        if !path.exists() {
            return Err(format!("Detections file not found: {}", path.display()).into());
        }
    }
    if let Some(font) = &cli.font {
        if !font.exists() {
            return Err(format!("Font file not found: {}", font.display()).into());
        }
    }
    if cli.output_dir.is_file() {
        return Err(format!(
            "Output directory is a file: {}",
            cli.output_dir.display()
        )
        .into());
    }
    match &cli.command {
        Command::Capture { input } => {
            if !input.exists() {
                return Err(format!("Input file not found: {}", input.display()).into());
            }
            if !is_image(input) {
                return Err(format!("Input is not a supported image: {}", input.display()).into());
            }
        }
        Command::Live {
            image,
            dir,
            interval_ms,
            ..
        } => {
            if let Some(image) = image {
                if !image.exists() {
                    return Err(format!("Image not found: {}", image.display()).into());
                }
            }
            if let Some(dir) = dir {
                if !dir.is_dir() {
                    return Err(format!("Not a directory: {}", dir.display()).into());
                }
            }
            if *interval_ms == Some(0) {
                return Err("Interval must be at least 1 ms".into());
            }
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
