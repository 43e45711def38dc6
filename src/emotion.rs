// Emotion classification from face-feature probabilities

use crate::models::{Classification, Color, EmotionLabel, FaceObservation, FrameResult};

/// Smile probability above which a face counts as smiling (strict)
pub const SMILE_THRESHOLD: f32 = 0.5;
/// Eye-open probability below which an eye counts as closed (strict)
pub const EYE_CLOSED_THRESHOLD: f32 = 0.3;
/// Inclusive lower bound of a weak smile
pub const WEAK_SMILE_MIN: f32 = 0.2;
/// Inclusive upper bound of a weak smile
pub const WEAK_SMILE_MAX: f32 = 0.4;
/// Smile probability below which a face counts as neutral (strict)
pub const NEUTRAL_FACE_MAX: f32 = 0.2;

/// Output when the frame contains no face
pub const NO_FACE: Classification = Classification::new(EmotionLabel::NoFaceDetected, Color::Gray);

/// Boolean features derived from one face observation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Predicates {
    pub is_smiling: bool,
    pub eyes_closed: bool,
    pub weak_smile: bool,
    pub neutral_face: bool,
}

impl Predicates {
    pub fn from_face(face: &FaceObservation) -> Self {
        let smile = face.smile_probability.get();
        let left = face.left_eye_open_probability.get();
        let right = face.right_eye_open_probability.get();

        Self {
            is_smiling: smile > SMILE_THRESHOLD,
            eyes_closed: left < EYE_CLOSED_THRESHOLD && right < EYE_CLOSED_THRESHOLD,
            weak_smile: (WEAK_SMILE_MIN..=WEAK_SMILE_MAX).contains(&smile),
            neutral_face: smile < NEUTRAL_FACE_MAX,
        }
    }
}

/// One row of the rule table
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&Predicates) -> bool,
    pub classification: Classification,
}

/// Rules in priority order; the first match wins.
///
/// The rows overlap. `weak_smile` implies `!is_smiling`, so every face that
/// satisfies the tiredness row has already matched the sadness row. The order
/// is kept as-is until the intended precedence is settled.
pub static RULES: [Rule; 5] = [
    Rule {
        name: "eyes closed, neutral face",
        matches: |p| p.eyes_closed && p.neutral_face,
        classification: Classification::new(EmotionLabel::Depression, Color::Blue),
    },
    Rule {
        name: "eyes closed, not smiling",
        matches: |p| !p.is_smiling && p.eyes_closed,
        classification: Classification::new(EmotionLabel::Sadness, Color::Cyan),
    },
    Rule {
        name: "eyes closed, weak smile",
        matches: |p| p.weak_smile && p.eyes_closed,
        classification: Classification::new(EmotionLabel::Tiredness, Color::Magenta),
    },
    Rule {
        name: "smiling",
        matches: |p| p.is_smiling,
        classification: Classification::new(EmotionLabel::Joy, Color::Green),
    },
    Rule {
        name: "fallback",
        matches: |_| true,
        classification: Classification::new(EmotionLabel::Neutral, Color::Gray),
    },
];

/// Returns the first rule matching the given predicates
pub fn matching_rule(predicates: &Predicates) -> &'static Rule {
    RULES
        .iter()
        .find(|rule| (rule.matches)(predicates))
        .unwrap_or(&RULES[RULES.len() - 1])
}

/// Classifies a single face
pub fn classify_face(face: &FaceObservation) -> Classification {
    matching_rule(&Predicates::from_face(face)).classification
}

/// Classifies one frame's extractor output.
///
/// Only the first face is read; additional faces are ignored.
pub fn classify(result: &FrameResult) -> Classification {
    match result.first_face() {
        Some(face) => classify_face(face),
        None => NO_FACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawFaceObservation;

    fn face(smile: f32, left: f32, right: f32) -> FaceObservation {
        FaceObservation::new(smile, left, right)
    }

    fn predicates(smile: f32, left: f32, right: f32) -> Predicates {
        Predicates::from_face(&face(smile, left, right))
    }

    #[test]
    fn smiling_is_strictly_above_half() {
        assert!(!predicates(0.5, 0.9, 0.9).is_smiling);
        assert!(predicates(0.51, 0.9, 0.9).is_smiling);
    }

    #[test]
    fn weak_smile_bounds_are_inclusive() {
        assert!(predicates(0.2, 0.9, 0.9).weak_smile);
        assert!(predicates(0.4, 0.9, 0.9).weak_smile);
        assert!(!predicates(0.19, 0.9, 0.9).weak_smile);
        assert!(!predicates(0.41, 0.9, 0.9).weak_smile);
    }

    #[test]
    fn neutral_face_is_strictly_below_point_two() {
        assert!(predicates(0.19, 0.9, 0.9).neutral_face);
        assert!(!predicates(0.2, 0.9, 0.9).neutral_face);
    }

    #[test]
    fn eyes_closed_needs_both_eyes_strictly_below_point_three() {
        assert!(predicates(0.0, 0.29, 0.29).eyes_closed);
        assert!(!predicates(0.0, 0.3, 0.3).eyes_closed);
        assert!(!predicates(0.0, 0.29, 0.3).eyes_closed);
        assert!(!predicates(0.0, 0.3, 0.29).eyes_closed);
    }

    #[test]
    fn open_eyed_smile_is_joy() {
        assert_eq!(
            classify_face(&face(0.8, 0.9, 0.9)),
            Classification::new(EmotionLabel::Joy, Color::Green)
        );
    }

    #[test]
    fn depression_wins_over_sadness() {
        let p = predicates(0.1, 0.1, 0.1);
        assert!(p.eyes_closed && p.neutral_face && !p.is_smiling);
        assert_eq!(
            classify_face(&face(0.1, 0.1, 0.1)),
            Classification::new(EmotionLabel::Depression, Color::Blue)
        );
    }

    #[test]
    fn sadness_preempts_tiredness_for_weak_smile_with_closed_eyes() {
        let p = predicates(0.3, 0.1, 0.1);
        assert!(p.weak_smile && p.eyes_closed);
        assert_eq!(
            classify_face(&face(0.3, 0.1, 0.1)),
            Classification::new(EmotionLabel::Sadness, Color::Cyan)
        );
    }

    #[test]
    fn rule_names_identify_the_winning_row() {
        assert_eq!(matching_rule(&predicates(0.3, 0.1, 0.1)).name, "eyes closed, not smiling");
        assert_eq!(matching_rule(&predicates(0.1, 0.1, 0.1)).name, "eyes closed, neutral face");
        assert_eq!(matching_rule(&predicates(0.3, 0.9, 0.9)).name, "fallback");
    }

    #[test]
    fn closed_eyes_with_half_smile_is_sadness() {
        assert_eq!(classify_face(&face(0.5, 0.1, 0.1)).label, EmotionLabel::Sadness);
    }

    #[test]
    fn smile_with_closed_eyes_is_joy() {
        assert_eq!(classify_face(&face(0.9, 0.1, 0.1)).label, EmotionLabel::Joy);
    }

    #[test]
    fn open_eyes_without_smile_is_neutral() {
        assert_eq!(
            classify_face(&face(0.3, 0.9, 0.9)),
            Classification::new(EmotionLabel::Neutral, Color::Gray)
        );
        assert_eq!(classify_face(&face(0.5, 0.3, 0.3)).label, EmotionLabel::Neutral);
    }

    #[test]
    fn unknown_probabilities_read_as_zero() {
        // All zero: eyes closed and neutral face.
        let result = FrameResult::from_raw(&[RawFaceObservation::default()]);
        assert_eq!(classify(&result).label, EmotionLabel::Depression);
    }

    #[test]
    fn no_face_is_gray_regardless_of_anything_else() {
        assert_eq!(
            classify(&FrameResult::NoFace),
            Classification::new(EmotionLabel::NoFaceDetected, Color::Gray)
        );
    }

    #[test]
    fn only_the_first_face_is_classified() {
        let result = FrameResult::Faces(vec![face(0.8, 0.9, 0.9), face(0.1, 0.1, 0.1)]);
        assert_eq!(classify(&result).label, EmotionLabel::Joy);
    }

    #[test]
    fn every_input_matches_exactly_one_first_rule_and_is_stable() {
        let steps: Vec<f32> = (0..=20).map(|i| i as f32 * 0.05).collect();
        for &smile in &steps {
            for &left in &steps {
                for &right in &steps {
                    let f = face(smile, left, right);
                    let p = Predicates::from_face(&f);
                    let first = RULES.iter().position(|r| (r.matches)(&p));
                    assert!(first.is_some());
                    let expected = RULES[first.unwrap_or_default()].classification;
                    assert_eq!(classify_face(&f), expected);
                    assert_eq!(classify_face(&f), classify_face(&f));
                    assert_ne!(classify_face(&f).label, EmotionLabel::Tiredness);
                }
            }
        }
    }
}
