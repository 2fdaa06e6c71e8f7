//! # effectgraph - Raster Filter Effect Graphs
//!
//! effectgraph evaluates directed acyclic graphs of raster filter effects
//! (blur, lighting, turbulence, compositing and the rest of the SVG filter
//! primitive set) over RGBA8 pixel buffers.
//!
//! ## Features
//!
//! - **Exact kernels**: Every effect has fixed integer-exact semantics
//! - **Paint rect propagation**: Only the pixels the output needs are computed
//! - **Color spaces**: Nodes work in device RGB or linear RGB; conversion is automatic
//! - **Parallel kernels**: Large kernels split their rows over a persistent worker pool
//! - **Caching**: Each node keeps its result until a parameter it depends on changes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use effectgraph::prelude::*;
//!
//! let mut graph = FilterGraph::new(FilterRegion::new(FloatRect::new(0.0, 0.0, 64.0, 64.0)));
//! graph.set_source_image(SourceImage::new(pixels, IntPoint::default()));
//!
//! // Drop shadow: blur the alpha, shift it, draw the source on top
//! let alpha = graph.add_effect(EffectKind::SourceAlpha, vec![])?;
//! let blur = graph.add_effect(EffectKind::GaussianBlur(GaussianBlur::new(2.0, 2.0)), vec![alpha])?;
//! let offset = graph.add_effect(EffectKind::Offset(Offset::new(3.0, 3.0)), vec![blur])?;
//! let source = graph.add_effect(EffectKind::SourceGraphic, vec![])?;
//! let merge = graph.add_effect(EffectKind::Merge, vec![offset, source])?;
//! graph.set_last_effect(merge)?;
//!
//! let result = EvaluationEngine::new().evaluate(&mut graph)?;
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`core`]: Pixel buffers, geometry, color spaces, parallelism and errors
//! - [`effects`]: The effect kinds and their kernels
//! - [`graph`]: The node arena, paint rect propagation and the JSON description
//! - [`validation`]: Multi-stage validation pipeline
//! - [`execution`]: Evaluation engine and the accelerated filter hook
//!
//! ## Accelerated Filters
//!
//! Implement [`ImageFilterBuilder`](execution::ImageFilterBuilder) to turn
//! nodes into backend filter objects:
//!
//! ```rust,ignore
//! use effectgraph::prelude::*;
//!
//! struct Describe;
//!
//! impl ImageFilterBuilder for Describe {
//!     fn build(
//!         &self,
//!         graph: &FilterGraph,
//!         id: NodeId,
//!         color_space: ColorSpace,
//!         requires_valid_premultiplied: bool,
//!     ) -> Option<ImageFilterHandle> {
//!         let kind = graph.effect(id).ok()?;
//!         Some(std::sync::Arc::new(kind.name().to_string()))
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod effects;
pub mod execution;
pub mod graph;
pub mod validation;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use effectgraph::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
    pub use crate::core::color_space::ColorSpace;
    pub use crate::core::geometry::{Color, FloatPoint, FloatPoint3D, FloatRect, IntPoint, IntRect};
    pub use crate::core::parallel::ParallelSettings;
    pub use crate::core::region::FilterRegion;

    // Errors
    pub use crate::core::error::{
        EffectError, EffectGraphError, EffectGraphResult, GraphError, GraphResult, NodeId,
        ValidationError, ValidationReport, ValidationWarning,
    };

    // Effects
    pub use crate::effects::{
        Blend, BlendMode, ChannelSelector, ColorMatrix, ColorMatrixType, ComponentTransfer,
        Composite, CompositeMode, ConvolveMatrix, DiffuseLighting, DisplacementMap, DropShadow,
        EdgeMode, EffectKind, Flood, GaussianBlur, LightSource, Morphology, MorphologyOperator,
        Offset, SourceImage, SpecularLighting, TransferFunction, TransferFunctionType, Turbulence,
        TurbulenceType,
    };

    // Graph
    pub use crate::graph::serialization::{SerializedEffect, SerializedGraph};
    pub use crate::graph::structure::FilterGraph;
    pub use crate::graph::topology::TopologyAnalyzer;

    // Validation
    pub use crate::validation::pipeline::ValidationPipeline;
    pub use crate::validation::stages::{ParameterValidation, StructuralValidation, ValidationStage};

    // Evaluation
    pub use crate::execution::acceleration::ImageFilterBuilder;
    pub use crate::execution::cache::{CacheStats, ImageFilterCache, ImageFilterHandle};
    pub use crate::execution::engine::{
        EvaluationEngine, EvaluationOptions, EvaluationResult, EvaluationStats,
    };
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
