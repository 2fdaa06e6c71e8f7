//! Core types for the effectgraph filter engine.
//!
//! This module contains the foundational pieces every effect builds on:
//! - Geometry and color values
//! - Pixel buffers and their alpha representations
//! - Device RGB / linear RGB conversion
//! - The filter region and its scale
//! - The draw primitive and the parallel job scheduler
//! - Error types

pub mod buffer;
pub mod color_space;
pub mod draw;
pub mod error;
pub mod geometry;
pub mod parallel;
pub mod region;

// Re-export commonly used types
pub use buffer::{AlphaRepresentation, PixelBuffer};
pub use color_space::ColorSpace;
pub use error::{EffectError, EffectGraphError, GraphError, NodeId, ValidationError};
pub use geometry::{Color, FloatPoint, FloatPoint3D, FloatRect, IntPoint, IntRect};
pub use parallel::{ParallelJobs, ParallelSettings};
pub use region::FilterRegion;
