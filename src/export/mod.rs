//! JSON export for predictions and catalogue artifacts

pub mod json;

pub use json::{write_json_atomic, write_predictions, PredictionsJson};
