//! Graph module for managing filter graphs.
//!
//! A filter graph is a directed acyclic graph (DAG) where nodes are filter
//! effects and edges are the results one effect reads from another. Nodes
//! live in an arena and only refer to nodes added before them.

pub mod dump;
pub mod node;
pub mod paint_rect;
pub mod serialization;
pub mod structure;
pub mod topology;

// Re-export commonly used types
pub use node::FilterEffectNode;
pub use serialization::{SerializedEffect, SerializedGraph};
pub use structure::FilterGraph;
pub use topology::TopologyAnalyzer;
