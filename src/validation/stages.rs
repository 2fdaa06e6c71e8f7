//! Individual validation stages.
//!
//! Each stage checks for a specific category of errors.

use crate::core::error::{NodeId, ValidationError, ValidationWarning};
use crate::graph::structure::FilterGraph;
use crate::graph::topology::TopologyAnalyzer;

/// Trait for validation stages.
pub trait ValidationStage: Send + Sync {
    /// Name of this validation stage.
    fn name(&self) -> &str;

    /// Validate the graph.
    ///
    /// Returns Ok with warnings, or Err with errors.
    fn validate(&self, graph: &FilterGraph) -> Result<Vec<ValidationWarning>, Vec<ValidationError>>;
}

/// Structural validation - checks graph structure.
///
/// Verifies:
/// - A last effect is set
/// - Inputs refer to earlier nodes
/// - Every node has as many inputs as its kind takes
/// - A source image is bound when the output reads it
pub struct StructuralValidation;

impl ValidationStage for StructuralValidation {
    fn name(&self) -> &str {
        "Structural Validation"
    }

    fn validate(&self, graph: &FilterGraph) -> Result<Vec<ValidationWarning>, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let Some(root) = graph.last_effect() else {
            return Err(vec![ValidationError::NoRootEffect]);
        };

        for (id, node) in graph.nodes() {
            if let Some(&input) = node.inputs().iter().find(|input| input.index() >= id.index()) {
                errors.push(ValidationError::DanglingInput { node_id: id, input });
                continue;
            }

            let arity = node.kind().input_arity();
            let got = node.inputs().len();
            if !arity.accepts(got) {
                errors.push(ValidationError::WrongInputCount {
                    node_id: id,
                    kind: node.kind().name().to_string(),
                    expected: arity.expected(got),
                    got,
                });
            }
        }
        if errors.iter().any(ValidationError::is_fatal) {
            return Err(errors);
        }

        if graph.source_image().is_none() {
            let mut reachable = graph.upstream(root);
            reachable.push(root);
            reachable.sort();
            let reads_source = reachable
                .into_iter()
                .find(|id| graph.effect(*id).is_ok_and(|kind| kind.is_source()));
            if let Some(source) = reads_source {
                errors.push(ValidationError::MissingSourceImage(source));
            }
        }

        let unreachable = TopologyAnalyzer::new(graph).unreachable_nodes().unwrap_or_default();
        for id in unreachable {
            let name = graph.effect(id).map(|kind| kind.name()).unwrap_or("?");
            warnings.push(ValidationWarning {
                message: format!("Node {id} ({name}) does not contribute to the output"),
                node_id: Some(id),
                suggestion: Some("Remove it or connect it to the last effect".to_string()),
            });
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(errors)
        }
    }
}

/// Parameter validation - rejects values no kernel may see.
///
/// Covers zero divisors, bad kernel orders and targets, negative
/// deviations, frequencies and octave counts, and lighting constants.
pub struct ParameterValidation;

impl ParameterValidation {
    /// The parameter errors of one node.
    pub fn node_errors(graph: &FilterGraph, id: NodeId) -> Vec<ValidationError> {
        let Ok(kind) = graph.effect(id) else {
            return Vec::new();
        };
        kind.parameter_errors()
            .into_iter()
            .map(|(parameter, reason)| ValidationError::InvalidParameter {
                node_id: id,
                parameter,
                reason,
            })
            .collect()
    }
}

impl ValidationStage for ParameterValidation {
    fn name(&self) -> &str {
        "Parameter Validation"
    }

    fn validate(&self, graph: &FilterGraph) -> Result<Vec<ValidationWarning>, Vec<ValidationError>> {
        let errors: Vec<_> = graph
            .node_ids()
            .flat_map(|id| Self::node_errors(graph, id))
            .collect();

        if errors.is_empty() {
            Ok(Vec::new())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
    use crate::core::geometry::IntPoint;
    use crate::core::region::FilterRegion;
    use crate::effects::{Blend, ConvolveMatrix, EffectKind, Flood, GaussianBlur, SourceImage};

    fn bind_source(graph: &mut FilterGraph) {
        graph.set_source_image(SourceImage::new(
            PixelBuffer::new(4, 4, AlphaRepresentation::Premultiplied),
            IntPoint::default(),
        ));
    }

    #[test]
    fn test_structural_validation_requires_root() {
        let graph = FilterGraph::new(FilterRegion::default());
        let errors = StructuralValidation.validate(&graph).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoRootEffect]);
    }

    #[test]
    fn test_structural_validation_arity() {
        let mut graph = FilterGraph::new(FilterRegion::default());
        let flood = graph.add_effect(EffectKind::Flood(Flood::default()), vec![]).unwrap();
        let blend = graph
            .add_effect(EffectKind::Blend(Blend::default()), vec![flood])
            .unwrap();
        graph.set_last_effect(blend).unwrap();

        let errors = StructuralValidation.validate(&graph).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::WrongInputCount {
                node_id: blend,
                kind: "feBlend".to_string(),
                expected: 2,
                got: 1,
            }]
        );
    }

    #[test]
    fn test_structural_validation_source_binding() {
        let mut graph = FilterGraph::new(FilterRegion::default());
        let source = graph.add_effect(EffectKind::SourceAlpha, vec![]).unwrap();
        let blur = graph
            .add_effect(EffectKind::GaussianBlur(GaussianBlur::new(1.0, 1.0)), vec![source])
            .unwrap();
        graph.set_last_effect(blur).unwrap();

        let errors = StructuralValidation.validate(&graph).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MissingSourceImage(source)]);

        bind_source(&mut graph);
        assert!(StructuralValidation.validate(&graph).unwrap().is_empty());
    }

    #[test]
    fn test_unused_nodes_warn() {
        let mut graph = FilterGraph::new(FilterRegion::default());
        let unused = graph.add_effect(EffectKind::SourceGraphic, vec![]).unwrap();
        let flood = graph.add_effect(EffectKind::Flood(Flood::default()), vec![]).unwrap();
        graph.set_last_effect(flood).unwrap();

        // The unread source leaf needs no binding.
        let warnings = StructuralValidation.validate(&graph).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].node_id, Some(unused));
    }

    #[test]
    fn test_parameter_validation() {
        let mut graph = FilterGraph::new(FilterRegion::default());
        let source = graph.add_effect(EffectKind::SourceGraphic, vec![]).unwrap();
        let blur = graph
            .add_effect(EffectKind::GaussianBlur(GaussianBlur::new(-1.0, 1.0)), vec![source])
            .unwrap();
        let mut kernel = ConvolveMatrix::new(3, vec![0.0; 9]);
        kernel.set_divisor(Some(0.0));
        let convolve = graph
            .add_effect(EffectKind::ConvolveMatrix(kernel), vec![blur])
            .unwrap();
        graph.set_last_effect(convolve).unwrap();

        let errors = ParameterValidation.validate(&graph).unwrap_err();
        let nodes: Vec<NodeId> = errors.iter().flat_map(|e| e.affected_nodes()).collect();
        assert!(nodes.contains(&blur));
        assert!(nodes.contains(&convolve));
        assert!(errors.iter().all(|e| !e.is_fatal()));
    }
}
