use emotion_detector::config::{AppConfig, DEFAULT_CONFIG_PATH};
use emotion_detector::error::{EmotionDetectorError, Result};
use emotion_detector::gate::FrameGate;
use emotion_detector::models::EmotionReading;
use emotion_detector::sink;
use emotion_detector::source::{ReplayExtractor, SyntheticCamera};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the logging system (file only, no console output)
fn init_logging(path: &Path) -> Result<()> {
    let log_file = std::fs::File::create(path).map_err(EmotionDetectorError::Io)?;

    let file_layer = fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false);

    tracing_subscriber::registry().with(file_layer).init();

    Ok(())
}

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = AppConfig::load(&config_path)?;
    init_logging(&config.logging.file)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(config));
    if let Err(e) = &result {
        error!("Application error: {}", e);
    }
    result
}

async fn run(config: AppConfig) -> Result<()> {
    let (emotion_sender, mut emotion_receiver) = broadcast::channel::<EmotionReading>(32);

    let display = tokio::spawn(async move {
        loop {
            match emotion_receiver.recv().await {
                Ok(reading) => {
                    info!(
                        "Frame {}: {}",
                        reading.frame_id, reading.classification.label
                    );
                    println!("{}", sink::render(&reading));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Display lagged, skipped {} readings", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let extractor = Arc::new(ReplayExtractor::new(&config.replay));
    let gate = FrameGate::new(extractor, Arc::new(emotion_sender), config.gate_config())?;
    let camera = SyntheticCamera::new(&config.source);

    let report = camera.run(&gate).await;
    gate.wait_idle().await;

    let stats = gate.stats();
    info!("Capture report: {:?}, gate stats: {:?}", report, stats);
    println!(
        "emitted {} frames: {} classified, {} superseded, {} skipped, {} failed, {} timed out",
        report.emitted,
        stats.processed,
        stats.superseded,
        stats.skipped,
        stats.failed,
        stats.timed_out
    );

    let ledger = camera.ledger();
    if ledger.outstanding() > 0 {
        warn!(
            "{} of {} frames were never released",
            ledger.outstanding(),
            ledger.issued()
        );
    }

    // Dropping the gate drops the last sender and ends the display task.
    drop(gate);
    if let Err(e) = display.await {
        error!("Display task failed: {}", e);
    }

    Ok(())
}
