// Delivery of emotion readings to display consumers

use crate::gate::ClassificationSink;
use crate::models::EmotionReading;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

impl ClassificationSink for broadcast::Sender<EmotionReading> {
    fn deliver(&self, reading: EmotionReading) {
        if let Err(e) = self.send(reading) {
            warn!("Failed to send emotion reading: {}", e);
        }
    }
}

impl ClassificationSink for mpsc::UnboundedSender<EmotionReading> {
    fn deliver(&self, reading: EmotionReading) {
        if let Err(e) = self.send(reading) {
            warn!("Failed to send emotion reading: {}", e);
        }
    }
}

/// Formats a reading the way the status line shows it
pub fn render(reading: &EmotionReading) -> String {
    format!(
        "[frame {:>5}] {} {}",
        reading.frame_id,
        reading.classification.color,
        reading.classification.label.display_text()
    )
}
