// Frame admission gate: one classification in flight, at most one frame buffered

use crate::emotion::{classify, matching_rule, Predicates};
use crate::error::{EmotionDetectorError, Result};
use crate::models::{EmotionReading, Frame, FrameId, FrameResult, RawFaceObservation};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, warn};

/// Default time budget for one extractor call
pub const DEFAULT_EXTRACTOR_TIMEOUT: Duration = Duration::from_secs(2);

/// Face-probability extractor.
///
/// The gate never calls `extract` concurrently with itself.
#[async_trait]
pub trait FaceExtractor: Send + Sync {
    /// Returns the faces found in `frame`, in detection order
    async fn extract(&self, frame: &Frame) -> Result<Vec<RawFaceObservation>>;
}

/// Receives one reading per classified frame
pub trait ClassificationSink: Send + Sync {
    fn deliver(&self, reading: EmotionReading);
}

/// What `submit` did with a frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Dispatched to the extractor immediately
    Started,
    /// Parked behind the in-flight frame, displacing `superseded` if any
    Buffered { superseded: Option<FrameId> },
}

/// Gate settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateConfig {
    /// None waits on the extractor indefinitely
    pub extractor_timeout: Option<Duration>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            extractor_timeout: Some(DEFAULT_EXTRACTOR_TIMEOUT),
        }
    }
}

/// Snapshot of the gate's counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateStats {
    pub submitted: u64,
    pub processed: u64,
    pub superseded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub timed_out: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    processed: AtomicU64,
    superseded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> GateStats {
        GateStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct Slot {
    in_flight: bool,
    buffered: Option<Frame>,
}

struct Shared {
    slot: Mutex<Slot>,
    extractor: Arc<dyn FaceExtractor>,
    sink: Arc<dyn ClassificationSink>,
    config: GateConfig,
    counters: Counters,
    idle: watch::Sender<bool>,
}

/// Admits frames to classification without letting work pile up.
///
/// At most one frame is being classified and at most one more waits behind
/// it. A newer frame replaces the waiting one, which is released unprocessed.
#[derive(Clone)]
pub struct FrameGate {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl FrameGate {
    /// Creates a gate that dispatches on the current tokio runtime
    pub fn new(
        extractor: Arc<dyn FaceExtractor>,
        sink: Arc<dyn ClassificationSink>,
        config: GateConfig,
    ) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| EmotionDetectorError::Runtime(e.to_string()))?;
        Ok(Self::with_runtime(extractor, sink, config, runtime))
    }

    /// Creates a gate that dispatches on the given runtime
    pub fn with_runtime(
        extractor: Arc<dyn FaceExtractor>,
        sink: Arc<dyn ClassificationSink>,
        config: GateConfig,
        runtime: Handle,
    ) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::default()),
                extractor,
                sink,
                config,
                counters: Counters::default(),
                idle,
            }),
            runtime,
        }
    }

    /// Hands a frame to the gate. Never blocks on classification.
    pub fn submit(&self, frame: Frame) -> Admission {
        let shared = &self.shared;
        Counters::bump(&shared.counters.submitted);
        let frame_id = frame.id;

        let mut slot = shared.lock_slot();
        if slot.in_flight {
            let displaced = slot.buffered.replace(frame);
            drop(slot);

            let superseded = displaced.map(|old| {
                Counters::bump(&shared.counters.superseded);
                debug!("Frame {} superseded by frame {}", old.id, frame_id);
                old.id
            });
            debug!("Frame {} buffered", frame_id);
            return Admission::Buffered { superseded };
        }

        slot.in_flight = true;
        shared.idle.send_replace(false);
        drop(slot);

        debug!("Frame {} admitted", frame_id);
        let shared = Arc::clone(shared);
        self.runtime.spawn(shared.drive(frame));
        Admission::Started
    }

    /// True when nothing is in flight or buffered
    pub fn is_idle(&self) -> bool {
        !self.shared.lock_slot().in_flight
    }

    /// Resolves once nothing is in flight or buffered
    pub async fn wait_idle(&self) {
        let mut idle = self.shared.idle.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = idle.wait_for(|idle| *idle).await;
    }

    pub fn stats(&self) -> GateStats {
        self.shared.counters.snapshot()
    }
}

impl Shared {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Processes `first`, then each frame that gets buffered meanwhile
    async fn drive(self: Arc<Self>, first: Frame) {
        let mut guard = IdleGuard {
            shared: &self,
            armed: true,
        };
        let mut frame = first;

        loop {
            self.process(frame).await;

            let next = {
                let mut slot = self.lock_slot();
                let next = slot.buffered.take();
                if next.is_none() {
                    slot.in_flight = false;
                    self.idle.send_replace(true);
                }
                next
            };

            match next {
                Some(next) => {
                    debug!("Frame {} admitted from buffer", next.id);
                    frame = next;
                }
                None => {
                    guard.armed = false;
                    return;
                }
            }
        }
    }

    /// Classifies one frame and releases it. Failures cost only this frame.
    async fn process(&self, frame: Frame) {
        let frame_id = frame.id;

        if frame.is_empty() {
            Counters::bump(&self.counters.skipped);
            debug!("Frame {} carries no image data, releasing", frame_id);
            return;
        }

        let outcome = self.extract(&frame).await;
        drop(frame);

        match outcome {
            Ok(faces) => {
                let result = FrameResult::from_raw(&faces);
                let classification = classify(&result);
                let rule = result
                    .first_face()
                    .map(|face| matching_rule(&Predicates::from_face(face)).name)
                    .unwrap_or("no face");
                Counters::bump(&self.counters.processed);
                debug!(
                    "Frame {}: {} face(s), classified as {} ({})",
                    frame_id,
                    result.face_count(),
                    classification.label,
                    rule
                );
                self.sink.deliver(EmotionReading::new(frame_id, classification));
            }
            Err(EmotionDetectorError::ExtractorTimeout(budget)) => {
                Counters::bump(&self.counters.timed_out);
                warn!(
                    "Face detection for frame {} timed out after {:?}",
                    frame_id, budget
                );
            }
            Err(e) => {
                Counters::bump(&self.counters.failed);
                error!("Face detection failed for frame {}: {}", frame_id, e);
            }
        }
    }

    /// Runs the extractor under the time budget. A panicking extractor is
    /// reported as a failure of this frame only.
    async fn extract(&self, frame: &Frame) -> Result<Vec<RawFaceObservation>> {
        let call = AssertUnwindSafe(self.extractor.extract(frame)).catch_unwind();
        let outcome = match self.config.extractor_timeout {
            Some(budget) => tokio::time::timeout(budget, call)
                .await
                .map_err(|_| EmotionDetectorError::ExtractorTimeout(budget))?,
            None => call.await,
        };

        outcome.map_err(|panic| {
            EmotionDetectorError::ExtractorFailure(format!(
                "extractor panicked: {}",
                panic_message(panic.as_ref())
            ))
        })?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Returns the gate to idle if the driving task is cancelled or unwinds
struct IdleGuard<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        warn!("Classification task ended abnormally, resetting gate");
        loop {
            let abandoned = {
                let mut slot = self.shared.lock_slot();
                let buffered = slot.buffered.take();
                if buffered.is_none() {
                    slot.in_flight = false;
                    self.shared.idle.send_replace(true);
                }
                buffered
            };

            // Released outside the lock.
            match abandoned {
                Some(frame) => {
                    debug!("Releasing buffered frame {} after abnormal exit", frame.id);
                }
                None => return,
            }
        }
    }
}
