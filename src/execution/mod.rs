//! Evaluation module.
//!
//! This module runs filter graphs and caches accelerated filter handles.

pub mod acceleration;
pub mod cache;
pub mod engine;

pub use acceleration::ImageFilterBuilder;
pub use cache::{CacheStats, ImageFilterCache, ImageFilterHandle};
pub use engine::{EvaluationEngine, EvaluationOptions, EvaluationResult, EvaluationStats};
