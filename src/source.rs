// Synthetic frame source and scripted face extractor

use crate::config::{ReplayConfig, ReplayFrame, SourceConfig, MAX_FRAME_DIMENSION};
use crate::error::Result;
use crate::gate::{Admission, FaceExtractor, FrameGate};
use crate::models::{Frame, RawFaceObservation};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tracks frames handed out against frames released
#[derive(Debug, Default)]
pub struct ReleaseLedger {
    issued: AtomicU64,
    released: AtomicU64,
}

impl ReleaseLedger {
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// Frames issued but not yet released
    pub fn outstanding(&self) -> u64 {
        self.issued().saturating_sub(self.released())
    }
}

/// Summary of one capture run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureReport {
    pub emitted: u64,
    pub started: u64,
    pub buffered: u64,
}

/// Emits blank frames at a fixed rate, standing in for a camera
pub struct SyntheticCamera {
    frame_duration: Duration,
    frames: u64,
    width: u32,
    height: u32,
    frame_len: usize,
    ledger: Arc<ReleaseLedger>,
}

/// RGB payload size, or None for dimensions outside the accepted range
fn rgb_frame_len(width: u32, height: u32) -> Option<usize> {
    if width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
        return None;
    }
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(3)
}

impl SyntheticCamera {
    pub fn new(config: &SourceConfig) -> Self {
        let fps = config.fps.max(1);
        let frame_len = rgb_frame_len(config.width, config.height).unwrap_or_else(|| {
            warn!(
                "Frame size {}x{} is out of range, emitting empty frames",
                config.width, config.height
            );
            0
        });
        Self {
            frame_duration: Duration::from_secs(1) / fps,
            frames: config.frames,
            width: config.width,
            height: config.height,
            frame_len,
            ledger: Arc::new(ReleaseLedger::default()),
        }
    }

    pub fn ledger(&self) -> Arc<ReleaseLedger> {
        Arc::clone(&self.ledger)
    }

    fn next_frame(&self, id: u64) -> Frame {
        self.ledger.issued.fetch_add(1, Ordering::SeqCst);
        let ledger = Arc::clone(&self.ledger);
        let data = vec![0u8; self.frame_len];
        Frame::new(id, data, self.width, self.height).with_release(move |_| {
            ledger.released.fetch_add(1, Ordering::SeqCst);
        })
    }

    /// Feeds frames to the gate at the configured rate
    pub async fn run(&self, gate: &FrameGate) -> CaptureReport {
        info!(
            "Capturing {} frames at {:?} per frame",
            self.frames, self.frame_duration
        );

        let mut report = CaptureReport::default();
        let mut last_frame_time = Instant::now();

        for id in 1..=self.frames {
            // Rate limiting to the target frame rate
            let elapsed = last_frame_time.elapsed();
            if elapsed < self.frame_duration {
                tokio::time::sleep(self.frame_duration - elapsed).await;
            }
            last_frame_time = Instant::now();

            match gate.submit(self.next_frame(id)) {
                Admission::Started => report.started += 1,
                Admission::Buffered { .. } => report.buffered += 1,
            }
            report.emitted += 1;
        }

        debug!("Capture finished: {:?}", report);
        report
    }
}

/// Extractor that replays scripted faces with a fixed latency
pub struct ReplayExtractor {
    script: Vec<ReplayFrame>,
    latency: Duration,
    cursor: AtomicUsize,
}

impl ReplayExtractor {
    pub fn new(config: &ReplayConfig) -> Self {
        if config.frames.is_empty() {
            warn!("Replay script is empty, every frame will report no face");
        }
        Self {
            script: config.frames.clone(),
            latency: Duration::from_millis(config.latency_ms),
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FaceExtractor for ReplayExtractor {
    async fn extract(&self, frame: &Frame) -> Result<Vec<RawFaceObservation>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.script.is_empty() {
            return Ok(Vec::new());
        }

        let step = self.cursor.fetch_add(1, Ordering::Relaxed) % self.script.len();
        debug!("Replaying script step {} for frame {}", step, frame.id);
        Ok(self.script[step].faces.clone())
    }
}
