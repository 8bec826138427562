use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use facetally_core::classification::infrastructure::onnx_classifier::OnnxClassifier;
use facetally_core::detection::infrastructure::seeta_face_detector::SeetaFaceDetector;
use facetally_core::reporting::infrastructure::background_sinks::{
    BackgroundFrameSink, BackgroundReportSink,
};
use facetally_core::reporting::infrastructure::http_frame_sink::HttpFrameSink;
use facetally_core::reporting::infrastructure::http_report_sink::HttpReportSink;
use facetally_core::service::service_config::ServiceConfig;
use facetally_core::service::service_error::StartupError;
use facetally_core::service::service_logger::LogServiceLogger;
use facetally_core::service::service_loop::ServiceLoop;
use facetally_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;

/// Counts distinct people in a live camera stream by classified face.
#[derive(Parser)]
#[command(name = "facetally")]
struct Cli {
    /// Video source: camera device (/dev/video0), stream URL, or file.
    source: String,

    /// SeetaFace detection model file.
    #[arg(long)]
    face_model: PathBuf,

    /// ONNX face classification model file.
    #[arg(long)]
    classifier_model: PathBuf,

    /// JSON configuration file; missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dashboard base URL for count reports and frame streaming.
    #[arg(long)]
    dashboard_url: Option<String>,

    /// Pixel distance under which two faces are the same person.
    #[arg(long)]
    tracking_threshold: Option<f64>,

    /// Processed frames kept in the tracking buffer.
    #[arg(long)]
    tracking_window: Option<usize>,

    /// Maximum processed frame rate; frames are skipped above it.
    #[arg(long)]
    max_fps: Option<f64>,

    /// Send counts every N processed frames.
    #[arg(long)]
    report_every: Option<u64>,

    /// Label names by classifier output index (comma-separated).
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<String>>,

    /// Do not stream frames to the dashboard.
    #[arg(long)]
    no_stream: bool,

    /// Do not mirror frames before detection.
    #[arg(long)]
    no_mirror: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut service = start(&cli, &config, stop.clone())?;
    install_interrupt_handler(stop)?;

    let summary = service.run()?;
    log::info!(
        "Stopped ({:?}): {} of {} captured frames processed",
        summary.stop_reason,
        summary.processed_frames,
        summary.captured_frames
    );
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ServiceConfig, StartupError> {
    let mut config = match &cli.config {
        Some(path) => ServiceConfig::from_json_file(path)?,
        None => ServiceConfig::default(),
    };
    apply_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut ServiceConfig, cli: &Cli) {
    if let Some(url) = &cli.dashboard_url {
        config.reporting.dashboard_url = url.clone();
    }
    if let Some(threshold) = cli.tracking_threshold {
        config.tracking.threshold_px = threshold;
    }
    if let Some(window) = cli.tracking_window {
        config.tracking.window_frames = window;
    }
    if let Some(max_fps) = cli.max_fps {
        config.governor.skip_threshold_fps = max_fps;
        config.governor.target_max_fps = max_fps;
    }
    if let Some(every) = cli.report_every {
        config.reporting.report_every = every;
    }
    if let Some(labels) = &cli.labels {
        config.classifier.labels = labels.clone();
    }
    if cli.no_stream {
        config.reporting.stream_frames = false;
    }
    if cli.no_mirror {
        config.mirror = false;
    }
}

/// Loads both models, opens the source and starts the reporting workers.
/// Nothing is left running if any step fails.
fn start(
    cli: &Cli,
    config: &ServiceConfig,
    stop: Arc<AtomicBool>,
) -> Result<ServiceLoop, StartupError> {
    let detector = load_detector(&cli.face_model, config)?;
    log::info!("Loaded face detector {}", cli.face_model.display());

    let classifier = OnnxClassifier::new(
        &cli.classifier_model,
        config.label_set(),
        config.classifier.color,
        config.classifier.image_size,
    )
    .map_err(|source| StartupError::ClassifierModel {
        path: cli.classifier_model.clone(),
        source,
    })?;
    log::info!("Loaded classifier {}", cli.classifier_model.display());

    let source = FfmpegFrameSource::open(&cli.source).map_err(|source| StartupError::Source {
        source_name: cli.source.clone(),
        source,
    })?;

    let reporting = &config.reporting;
    let report_sink = BackgroundReportSink::spawn(Box::new(HttpReportSink::new(
        &reporting.dashboard_url,
        reporting.report_timeout(),
    )?))?;
    log::info!(
        "Reporting counts to {} every {} processed frames",
        reporting.dashboard_url,
        reporting.report_every
    );

    let frame_sink = if reporting.stream_frames {
        Some(BackgroundFrameSink::spawn(Box::new(HttpFrameSink::new(
            &reporting.dashboard_url,
            reporting.frame_timeout(),
            reporting.jpeg_quality,
        )?))?)
    } else {
        None
    };

    let mut service = ServiceLoop::new(
        config,
        Box::new(source),
        Box::new(detector),
        Box::new(classifier),
        Box::new(report_sink),
        stop,
    )
    .with_logger(Box::new(LogServiceLogger::new(config.fps_log_every)));
    if let Some(sink) = frame_sink {
        service = service.with_frame_sink(Box::new(sink));
    }
    Ok(service)
}

fn load_detector(path: &Path, config: &ServiceConfig) -> Result<SeetaFaceDetector, StartupError> {
    let detector = &config.detector;
    SeetaFaceDetector::new(
        path,
        detector.scale_factor,
        detector.score_threshold,
        detector.min_face_size,
        detector.window_step,
    )
    .map_err(|source| StartupError::DetectorModel {
        path: path.to_path_buf(),
        source,
    })
}

/// Raises `stop` on the first Ctrl-C so the loop can tear down cleanly;
/// a second Ctrl-C exits immediately.
fn install_interrupt_handler(stop: Arc<AtomicBool>) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    std::thread::Builder::new()
        .name("interrupt".into())
        .spawn(move || {
            runtime.block_on(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::warn!("Cannot listen for Ctrl-C: {e}");
                    return;
                }
                log::info!("Interrupt received, stopping after the current frame");
                stop.store(true, Ordering::SeqCst);

                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Interrupted again, exiting");
                    process::exit(130);
                }
            });
        })?;
    Ok(())
}
