//! Model file management: discovery, activation, ablated copies and comparison.

pub mod registry;

pub use registry::{ComparisonResult, MODEL_EXTENSION, ModelInfo, ModelRegistry};
