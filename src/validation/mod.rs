//! Validation module for pre-evaluation checking.
//!
//! The validation pipeline runs before evaluation to catch errors early.

pub mod pipeline;
pub mod stages;

pub use pipeline::ValidationPipeline;
pub use stages::{ParameterValidation, StructuralValidation, ValidationStage};
