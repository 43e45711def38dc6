// Core data models for the Emotion Detector

use serde::Deserialize;

/// Sequence number assigned to a frame by its source
pub type FrameId = u64;

type ReleaseHook = Box<dyn FnOnce(FrameId) + Send + Sync>;

/// Represents a single video frame with RGB data.
///
/// A frame owns its underlying resource. Dropping the frame releases it,
/// so every frame is released exactly once whether it is classified,
/// superseded or rejected.
pub struct Frame {
    /// Sequence number from the frame source
    pub id: FrameId,
    /// Raw RGB pixel data (width * height * 3 bytes)
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    release: Option<ReleaseHook>,
}

impl Frame {
    /// Creates a new Frame with the given parameters
    pub fn new(id: FrameId, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            data,
            width,
            height,
            release: None,
        }
    }

    /// Attaches a hook that runs once when the frame is released
    pub fn with_release<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(FrameId) + Send + Sync + 'static,
    {
        self.release = Some(Box::new(hook));
        self
    }

    /// True when the frame carries no pixel payload
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.id);
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("bytes", &self.data.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Confidence value in [0.0, 1.0]
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Probability(f32);

impl Probability {
    pub const ZERO: Probability = Probability(0.0);

    /// Returns None for values outside [0.0, 1.0] (including NaN)
    pub fn new(value: f32) -> Option<Self> {
        (0.0..=1.0).contains(&value).then_some(Self(value))
    }

    /// Converts an extractor-reported value. Unknown or malformed values
    /// fall back to 0.0, the lowest-confidence reading.
    pub fn from_reported(value: Option<f32>) -> Self {
        value.and_then(Self::new).unwrap_or(Self::ZERO)
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

/// Face probabilities as reported by the extractor, each possibly unknown
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct RawFaceObservation {
    pub smile: Option<f32>,
    pub left_eye_open: Option<f32>,
    pub right_eye_open: Option<f32>,
}

impl RawFaceObservation {
    pub fn new(
        smile: Option<f32>,
        left_eye_open: Option<f32>,
        right_eye_open: Option<f32>,
    ) -> Self {
        Self {
            smile,
            left_eye_open,
            right_eye_open,
        }
    }

    /// Applies the 0.0 default to every unknown probability
    pub fn resolve(&self) -> FaceObservation {
        FaceObservation {
            smile_probability: Probability::from_reported(self.smile),
            left_eye_open_probability: Probability::from_reported(self.left_eye_open),
            right_eye_open_probability: Probability::from_reported(self.right_eye_open),
        }
    }
}

/// The three probabilities for one detected face in one frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceObservation {
    pub smile_probability: Probability,
    pub left_eye_open_probability: Probability,
    pub right_eye_open_probability: Probability,
}

impl FaceObservation {
    /// Builds an observation from known values, defaulting malformed ones to 0.0
    pub fn new(smile: f32, left_eye_open: f32, right_eye_open: f32) -> Self {
        RawFaceObservation::new(Some(smile), Some(left_eye_open), Some(right_eye_open)).resolve()
    }
}

/// Extractor output for one frame
#[derive(Clone, Debug, PartialEq)]
pub enum FrameResult {
    NoFace,
    /// Faces in extractor order, never empty
    Faces(Vec<FaceObservation>),
}

impl FrameResult {
    pub fn from_faces(faces: Vec<FaceObservation>) -> Self {
        if faces.is_empty() {
            FrameResult::NoFace
        } else {
            FrameResult::Faces(faces)
        }
    }

    pub fn from_raw(faces: &[RawFaceObservation]) -> Self {
        Self::from_faces(faces.iter().map(RawFaceObservation::resolve).collect())
    }

    /// The face the classifier reads; later faces are ignored
    pub fn first_face(&self) -> Option<&FaceObservation> {
        match self {
            FrameResult::NoFace => None,
            FrameResult::Faces(faces) => faces.first(),
        }
    }

    pub fn face_count(&self) -> usize {
        match self {
            FrameResult::NoFace => 0,
            FrameResult::Faces(faces) => faces.len(),
        }
    }
}

/// Represents the detected emotional state of a single frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EmotionLabel {
    Depression,
    Sadness,
    Tiredness,
    Joy,
    Neutral,
    NoFaceDetected,
}

impl EmotionLabel {
    /// Text shown to the user for this label
    pub fn display_text(self) -> &'static str {
        match self {
            EmotionLabel::Depression => "Депрессия",
            EmotionLabel::Sadness => "Грусть",
            EmotionLabel::Tiredness => "Усталость",
            EmotionLabel::Joy => "Радость",
            EmotionLabel::Neutral => "Нейтральное",
            EmotionLabel::NoFaceDetected => "Лицо не обнаружено",
        }
    }
}

impl std::fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmotionLabel::Depression => write!(f, "Depression"),
            EmotionLabel::Sadness => write!(f, "Sadness"),
            EmotionLabel::Tiredness => write!(f, "Tiredness"),
            EmotionLabel::Joy => write!(f, "Joy"),
            EmotionLabel::Neutral => write!(f, "Neutral"),
            EmotionLabel::NoFaceDetected => write!(f, "NoFaceDetected"),
        }
    }
}

/// Display color for a label
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Blue,
    Cyan,
    Magenta,
    Green,
    Gray,
}

impl Color {
    /// Packed 0xAARRGGBB value
    pub fn argb(self) -> u32 {
        match self {
            Color::Blue => 0xFF00_00FF,
            Color::Cyan => 0xFF00_FFFF,
            Color::Magenta => 0xFFFF_00FF,
            Color::Green => 0xFF00_FF00,
            Color::Gray => 0xFF88_8888,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:08X}", self.argb())
    }
}

/// One frame's emotion verdict
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub label: EmotionLabel,
    pub color: Color,
}

impl Classification {
    pub const fn new(label: EmotionLabel, color: Color) -> Self {
        Self { label, color }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label.display_text(), self.color)
    }
}

/// A classification tagged with the frame it came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmotionReading {
    pub frame_id: FrameId,
    pub classification: Classification,
}

impl EmotionReading {
    pub fn new(frame_id: FrameId, classification: Classification) -> Self {
        Self {
            frame_id,
            classification,
        }
    }
}
