// Shared test doubles for the frame gate

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use emotion_detector::error::{EmotionDetectorError, Result};
use emotion_detector::gate::{FaceExtractor, FrameGate, GateConfig};
use emotion_detector::models::{EmotionReading, Frame, FrameId, RawFaceObservation};
use tokio::sync::{mpsc, Semaphore};

/// How the controlled extractor answers for a given frame.
#[derive(Clone, Debug)]
pub enum Outcome {
    Faces(Vec<RawFaceObservation>),
    Fail,
    Panic,
    /// Never completes.
    Hang,
}

/// Extractor that announces each call and waits for a permit before answering.
pub struct ControlledExtractor {
    entered: mpsc::UnboundedSender<FrameId>,
    permits: Arc<Semaphore>,
    outcomes: Mutex<HashMap<FrameId, Outcome>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ControlledExtractor {
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn outcome_for(&self, id: FrameId) -> Outcome {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .unwrap_or_else(|| Outcome::Faces(vec![smiling_face()]))
    }
}

#[async_trait]
impl FaceExtractor for ControlledExtractor {
    async fn extract(&self, frame: &Frame) -> Result<Vec<RawFaceObservation>> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _ = self.entered.send(frame.id);
        let outcome = self.outcome_for(frame.id);

        if matches!(outcome, Outcome::Hang) {
            std::future::pending::<()>().await;
        }

        self.permits
            .acquire()
            .await
            .map_err(|e| EmotionDetectorError::ExtractorFailure(e.to_string()))?
            .forget();
        tokio::task::yield_now().await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Outcome::Faces(faces) => Ok(faces),
            Outcome::Fail => Err(EmotionDetectorError::ExtractorFailure(format!(
                "detector rejected frame {}",
                frame.id
            ))),
            Outcome::Panic => panic!("detector crashed on frame {}", frame.id),
            Outcome::Hang => unreachable!(),
        }
    }
}

pub fn smiling_face() -> RawFaceObservation {
    RawFaceObservation::new(Some(0.8), Some(0.9), Some(0.9))
}

/// A gate wired to a controlled extractor, a reading channel and a release log.
pub struct Harness {
    pub gate: FrameGate,
    pub extractor: Arc<ControlledExtractor>,
    pub permits: Arc<Semaphore>,
    pub entered: mpsc::UnboundedReceiver<FrameId>,
    pub readings: mpsc::UnboundedReceiver<EmotionReading>,
    released: Arc<Mutex<Vec<FrameId>>>,
}

impl Harness {
    pub fn new(config: GateConfig) -> Self {
        Self::with_outcomes(config, HashMap::new())
    }

    pub fn with_outcomes(config: GateConfig, outcomes: HashMap<FrameId, Outcome>) -> Self {
        let (entered_tx, entered) = mpsc::unbounded_channel();
        let permits = Arc::new(Semaphore::new(0));
        let extractor = Arc::new(ControlledExtractor {
            entered: entered_tx,
            permits: Arc::clone(&permits),
            outcomes: Mutex::new(outcomes),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        });
        let (readings_tx, readings) = mpsc::unbounded_channel::<EmotionReading>();
        let gate = FrameGate::new(extractor.clone(), Arc::new(readings_tx), config).unwrap();

        Self {
            gate,
            extractor,
            permits,
            entered,
            readings,
            released: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A frame whose release is recorded in this harness.
    pub fn frame(&self, id: FrameId) -> Frame {
        self.frame_with_data(id, vec![0; 12])
    }

    pub fn frame_with_data(&self, id: FrameId, data: Vec<u8>) -> Frame {
        let released = Arc::clone(&self.released);
        Frame::new(id, data, 2, 2).with_release(move |id| {
            released.lock().unwrap().push(id);
        })
    }

    /// Released frame ids, sorted.
    pub fn released(&self) -> Vec<FrameId> {
        let mut ids = self.released.lock().unwrap().clone();
        ids.sort_unstable();
        ids
    }

    pub fn drain_readings(&mut self) -> Vec<EmotionReading> {
        let mut out = Vec::new();
        while let Ok(reading) = self.readings.try_recv() {
            out.push(reading);
        }
        out
    }

    pub fn drain_entered(&mut self) -> Vec<FrameId> {
        let mut out = Vec::new();
        while let Ok(id) = self.entered.try_recv() {
            out.push(id);
        }
        out
    }
}
