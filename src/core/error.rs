//! Error types for effectgraph.
//!
//! Three layers, each a thiserror enum that names the node at fault:
//! [`GraphError`] for arena and description misuse, [`ValidationError`] for
//! graphs rejected before any kernel runs, and [`EffectError`] for nodes that
//! ran but left no result. All of them lift into [`EffectGraphError`] with `?`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable index of a node inside a [`FilterGraph`](crate::graph::FilterGraph) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The arena slot this id points at.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything an effectgraph call can fail with, including I/O and JSON from
/// graph files.
#[derive(Error, Debug)]
pub enum EffectGraphError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Effect error: {0}")]
    Effect(#[from] EffectError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Misuse of the node arena or of a graph description.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Effect '{kind}' takes {expected} input(s), got {got}")]
    InputArity {
        kind: String,
        expected: usize,
        got: usize,
    },

    #[error("Graph has no last effect to evaluate")]
    NoRootEffect,

    #[error("Unknown result name '{0}'")]
    UnknownResult(String),

    #[error("Result name '{0}' is defined twice")]
    DuplicateResult(String),

    #[error("Unsupported graph format version {0}")]
    UnsupportedVersion(String),

    #[error("Graph is empty")]
    EmptyGraph,

    #[error("Node {0} is part of an input cycle")]
    CycleDetected(NodeId),
}

/// Reasons the validation pipeline refuses a graph.
///
/// Bad parameters such as a zero convolution divisor stop here and never
/// reach a pixel kernel.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Invalid parameter '{parameter}' on node {node_id}: {reason}")]
    InvalidParameter {
        node_id: NodeId,
        parameter: String,
        reason: String,
    },

    #[error("Node {node_id} references missing input {input}")]
    DanglingInput { node_id: NodeId, input: NodeId },

    #[error("Node {node_id} ({kind}) expects {expected} input(s), has {got}")]
    WrongInputCount {
        node_id: NodeId,
        kind: String,
        expected: usize,
        got: usize,
    },

    #[error("Node {0} reads the source image but none is bound")]
    MissingSourceImage(NodeId),

    #[error("Graph has no last effect")]
    NoRootEffect,

    #[error("{0}")]
    Other(String),
}

/// Per-node evaluation failures.
///
/// A failed node keeps no result; every dependent reports [`EffectError::MissingInput`]
/// in turn, so the failure travels up to the root.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectError {
    #[error("Node {node_id} paint area {width}x{height} exceeds the maximum of {max_area} pixels")]
    SizeExceeded {
        node_id: NodeId,
        width: i32,
        height: i32,
        max_area: u64,
    },

    #[error("Node {node_id} has no result from input {input}")]
    MissingInput { node_id: NodeId, input: NodeId },

    #[error("Node {0} reads the source image but none is bound")]
    MissingSourceImage(NodeId),

    #[error("Node {node_id} has invalid parameters: {reason}")]
    InvalidParameters { node_id: NodeId, reason: String },
}

impl ValidationError {
    /// Later stages cannot run meaningfully after one of these.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ValidationError::NoRootEffect | ValidationError::DanglingInput { .. }
        )
    }

    /// A one-line hint for the CLI.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            ValidationError::InvalidParameter {
                parameter, reason, ..
            } => Some(format!("Adjust '{}': {}", parameter, reason)),
            ValidationError::WrongInputCount { expected, .. } => {
                Some(format!("Connect exactly {} input(s)", expected))
            }
            ValidationError::MissingSourceImage(_) => {
                Some("Bind a source image before evaluating".to_string())
            }
            ValidationError::NoRootEffect => {
                Some("Mark the effect that produces the output as the last effect".to_string())
            }
            _ => None,
        }
    }

    /// Nodes the error points at; empty for graph-wide problems.
    pub fn affected_nodes(&self) -> Vec<NodeId> {
        match self {
            ValidationError::InvalidParameter { node_id, .. }
            | ValidationError::DanglingInput { node_id, .. }
            | ValidationError::WrongInputCount { node_id, .. }
            | ValidationError::MissingSourceImage(node_id) => vec![*node_id],
            _ => vec![],
        }
    }
}

impl EffectError {
    /// The node whose evaluation failed.
    pub fn node_id(&self) -> NodeId {
        match self {
            EffectError::SizeExceeded { node_id, .. }
            | EffectError::MissingInput { node_id, .. }
            | EffectError::InvalidParameters { node_id, .. } => *node_id,
            EffectError::MissingSourceImage(node_id) => *node_id,
        }
    }

    /// True when the node failed on its own rather than because an input failed.
    pub fn is_origin(&self) -> bool {
        !matches!(self, EffectError::MissingInput { .. })
    }
}

/// Shorthand for fallible effectgraph calls.
pub type EffectGraphResult<T> = Result<T, EffectGraphError>;

/// Shorthand for arena operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Shorthand for single validation checks.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// What the validation pipeline found in one graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// False once any error was recorded.
    pub success: bool,
    /// Errors, in the order the stages found them.
    pub errors: Vec<ValidationError>,
    /// Findings that do not block evaluation.
    pub warnings: Vec<ValidationWarning>,
    /// Wall time spent in the pipeline, in milliseconds.
    pub duration_ms: u64,
}

/// A finding that does not block evaluation, such as a node nothing reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// Text shown to the user.
    pub message: String,
    /// The node concerned.
    pub node_id: Option<NodeId>,
    /// How to silence it.
    pub suggestion: Option<String>,
}

impl ValidationReport {
    /// A passing report with nothing in it.
    pub fn new() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Record an error; the report no longer passes.
    pub fn add_error(&mut self, error: ValidationError) {
        self.success = false;
        self.errors.push(error);
    }

    /// Record a warning.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// True when no error was recorded.
    pub fn can_evaluate(&self) -> bool {
        self.success
    }

    /// One line for the end of `effectgraph validate`.
    pub fn summary(&self) -> String {
        if self.success {
            if self.warnings.is_empty() {
                "Graph is ready to evaluate".to_string()
            } else {
                format!("Graph is ready to evaluate ({} warning(s))", self.warnings.len())
            }
        } else {
            format!("Graph rejected: {} error(s)", self.errors.len())
        }
    }

    /// Numbered error lines, each followed by its hint when there is one.
    pub fn detailed_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .enumerate()
            .map(|(i, error)| {
                let mut line = format!("{}. {}", i + 1, error);
                if let Some(fix) = error.suggested_fix() {
                    line.push_str(&format!("\n   hint: {}", fix));
                }
                line
            })
            .collect()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}
