// Library exports for the Emotion Detector

pub mod config;
pub mod emotion;
pub mod error;
pub mod gate;
pub mod models;
pub mod sink;
pub mod source;
