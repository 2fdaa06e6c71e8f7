//! Graph serialization for saving and loading.
//!
//! A graph description lists effects in order. Each effect names its result
//! and refers to its inputs by earlier result names, the way SVG filter
//! primitives use `result`, `in` and `in2`.

use crate::core::color_space::ColorSpace;
use crate::core::error::{EffectGraphResult, GraphError, GraphResult, NodeId};
use crate::core::geometry::FloatRect;
use crate::core::region::FilterRegion;
use crate::effects::{EffectKind, InputArity};
use crate::graph::structure::FilterGraph;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Input name that refers to the bound source image.
pub const SOURCE_GRAPHIC: &str = "SourceGraphic";
/// Input name that refers to the alpha of the bound source image.
pub const SOURCE_ALPHA: &str = "SourceAlpha";

fn default_true() -> bool {
    true
}

fn unit_scale() -> [f32; 2] {
    [1.0, 1.0]
}

/// Serializable representation of one effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedEffect {
    /// Name later effects use to read this one. May be empty.
    #[serde(default)]
    pub result: String,
    /// The effect and its parameters.
    pub kind: EffectKind,
    /// Input result names. An empty name is the previous result.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Operating color space, when not the kind's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_interpolation: Option<ColorSpace>,
    /// Explicit subregion x, local units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    /// Explicit subregion y, local units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    /// Explicit subregion width, local units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    /// Explicit subregion height, local units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    /// Whether requests are clipped to the subregion.
    #[serde(default = "default_true")]
    pub clips_to_bounds: bool,
}

impl SerializedEffect {
    /// An effect with default placement.
    pub fn new(result: impl Into<String>, kind: EffectKind, inputs: Vec<String>) -> Self {
        Self {
            result: result.into(),
            kind,
            inputs,
            color_interpolation: None,
            x: None,
            y: None,
            width: None,
            height: None,
            clips_to_bounds: true,
        }
    }
}

/// Serializable representation of a complete graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedGraph {
    /// Graph format version
    pub version: String,
    /// Filter region in local units. Callers supply one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_region: Option<FloatRect>,
    /// Local-to-absolute scale, `[x, y]`.
    #[serde(default = "unit_scale")]
    pub scale: [f32; 2],
    /// Effects in evaluation order.
    pub effects: Vec<SerializedEffect>,
    /// Result name of the output effect; the last effect when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl SerializedGraph {
    /// Current format version.
    pub const VERSION: &'static str = "1.0";

    /// Create an empty description.
    pub fn new() -> Self {
        Self {
            version: Self::VERSION.to_string(),
            filter_region: None,
            scale: unit_scale(),
            effects: Vec::new(),
            output: None,
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read a description from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> EffectGraphResult<Self> {
        let json = fs::read_to_string(path)?;
        let graph = Self::from_json(&json)?;
        graph.check_version()?;
        Ok(graph)
    }

    /// Write the description as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> EffectGraphResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    fn check_version(&self) -> GraphResult<()> {
        if self.version != Self::VERSION {
            return Err(GraphError::UnsupportedVersion(self.version.clone()));
        }
        Ok(())
    }

    /// Describe an existing graph. Source leaves become input names and
    /// every other node gets a `result<N>` name.
    pub fn from_graph(graph: &FilterGraph) -> Self {
        let mut names: HashMap<NodeId, String> = HashMap::new();
        let mut effects = Vec::new();

        for (id, node) in graph.nodes() {
            let name = match node.kind() {
                EffectKind::SourceGraphic => SOURCE_GRAPHIC.to_string(),
                EffectKind::SourceAlpha => SOURCE_ALPHA.to_string(),
                _ => format!("result{}", id.index()),
            };
            names.insert(id, name.clone());
            if node.kind().is_source() {
                continue;
            }

            let inputs = node
                .inputs()
                .iter()
                .map(|input| names.get(input).cloned().unwrap_or_default())
                .collect();
            let mut effect = SerializedEffect::new(name, node.kind().clone(), inputs);
            if node.operating_color_space() != node.kind().default_operating_color_space() {
                effect.color_interpolation = Some(node.operating_color_space());
            }
            let boundaries = node.effect_boundaries();
            let [has_x, has_y, has_width, has_height] = node.explicit_boundaries();
            effect.x = has_x.then_some(boundaries.x);
            effect.y = has_y.then_some(boundaries.y);
            effect.width = has_width.then_some(boundaries.width);
            effect.height = has_height.then_some(boundaries.height);
            effect.clips_to_bounds = node.clips_to_bounds();
            effects.push(effect);
        }

        let filter = graph.filter_region();
        Self {
            version: Self::VERSION.to_string(),
            filter_region: Some(filter.region),
            scale: [filter.scale_x, filter.scale_y],
            effects,
            output: graph.last_effect().and_then(|id| names.get(&id).cloned()),
        }
    }

    /// Build the graph, set its last effect and determine its subregions.
    pub fn build(&self) -> GraphResult<FilterGraph> {
        self.check_version()?;
        if self.effects.is_empty() {
            return Err(GraphError::EmptyGraph);
        }

        let filter = FilterRegion::new(self.filter_region.unwrap_or_default())
            .with_scale(self.scale[0], self.scale[1]);
        let mut builder = Builder::new(FilterGraph::new(filter));

        for effect in &self.effects {
            let takes_inputs = matches!(effect.kind.input_arity(), InputArity::Exactly(n) if n > 0);
            let inputs = if effect.inputs.is_empty() && takes_inputs {
                vec![builder.resolve("")?]
            } else {
                effect
                    .inputs
                    .iter()
                    .map(|name| builder.resolve(name))
                    .collect::<GraphResult<Vec<_>>>()?
            };

            let graph = &mut builder.graph;
            let id = graph.add_effect(effect.kind.clone(), inputs)?;
            if let Some(color_space) = effect.color_interpolation {
                graph.set_operating_color_space(id, color_space)?;
            }
            if effect.x.is_some() || effect.y.is_some() || effect.width.is_some() || effect.height.is_some() {
                graph.set_effect_boundaries(id, effect.x, effect.y, effect.width, effect.height)?;
            }
            graph.set_clips_to_bounds(id, effect.clips_to_bounds)?;
            builder.define(&effect.result, id)?;
        }

        let root = match &self.output {
            Some(name) => builder.resolve(name)?,
            None => builder.previous.ok_or(GraphError::EmptyGraph)?,
        };
        let mut graph = builder.graph;
        graph.set_last_effect(root)?;
        graph.determine_filter_primitive_subregions();
        Ok(graph)
    }
}

impl Default for SerializedGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Name resolution state while building.
struct Builder {
    graph: FilterGraph,
    results: IndexMap<String, NodeId>,
    source_graphic: Option<NodeId>,
    source_alpha: Option<NodeId>,
    previous: Option<NodeId>,
}

impl Builder {
    fn new(graph: FilterGraph) -> Self {
        Self {
            graph,
            results: IndexMap::new(),
            source_graphic: None,
            source_alpha: None,
            previous: None,
        }
    }

    fn resolve(&mut self, name: &str) -> GraphResult<NodeId> {
        match name {
            "" => match self.previous {
                Some(previous) => Ok(previous),
                None => self.source(EffectKind::SourceGraphic),
            },
            SOURCE_GRAPHIC => self.source(EffectKind::SourceGraphic),
            SOURCE_ALPHA => self.source(EffectKind::SourceAlpha),
            _ => self
                .results
                .get(name)
                .copied()
                .ok_or_else(|| GraphError::UnknownResult(name.to_string())),
        }
    }

    fn source(&mut self, kind: EffectKind) -> GraphResult<NodeId> {
        let slot = match kind {
            EffectKind::SourceAlpha => &mut self.source_alpha,
            _ => &mut self.source_graphic,
        };
        if let Some(id) = *slot {
            return Ok(id);
        }
        let id = self.graph.add_effect(kind, Vec::new())?;
        *slot = Some(id);
        Ok(id)
    }

    fn define(&mut self, name: &str, id: NodeId) -> GraphResult<()> {
        self.previous = Some(id);
        if name.is_empty() {
            return Ok(());
        }
        if name == SOURCE_GRAPHIC || name == SOURCE_ALPHA || self.results.contains_key(name) {
            return Err(GraphError::DuplicateResult(name.to_string()));
        }
        self.results.insert(name.to_string(), id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::EffectGraphError;
    use crate::effects::{GaussianBlur, Offset};

    const DROP_SHADOW: &str = r#"{
        "version": "1.0",
        "filter_region": {"x": 0, "y": 0, "width": 64, "height": 32},
        "effects": [
            {"result": "blur", "kind": {"type": "GaussianBlur", "std_deviation_x": 2, "std_deviation_y": 2},
             "inputs": ["SourceAlpha"]},
            {"result": "shifted", "kind": {"type": "Offset", "dx": 3, "dy": 3}, "inputs": [""]},
            {"result": "out", "kind": {"type": "Merge"}, "inputs": ["shifted", "SourceGraphic"],
             "color_interpolation": "deviceRgb", "x": 0, "width": 40}
        ]
    }"#;

    #[test]
    fn test_build_from_json() {
        let description = SerializedGraph::from_json(DROP_SHADOW).unwrap();
        assert_eq!(description.scale, [1.0, 1.0]);
        let graph = description.build().unwrap();

        // SourceAlpha, blur, offset, SourceGraphic, merge.
        assert_eq!(graph.node_count(), 5);
        let root = graph.last_effect().unwrap();
        let merge = graph.node(root).unwrap();
        assert_eq!(merge.operating_color_space(), ColorSpace::DeviceRgb);
        assert_eq!(merge.max_effect_rect(), FloatRect::new(0.0, 0.0, 40.0, 32.0));

        let dump = graph.external_representation(root).unwrap();
        assert_eq!(
            dump,
            "[feMerge]\n  [feOffset dx=\"3\" dy=\"3\"]\n    [feGaussianBlur stdDeviation=\"2, 2\"]\n      [SourceAlpha]\n  [SourceGraphic]\n"
        );
    }

    #[test]
    fn test_missing_inputs_read_previous_result() {
        let mut description = SerializedGraph::new();
        description.effects.push(SerializedEffect::new(
            "",
            EffectKind::GaussianBlur(GaussianBlur::new(1.0, 1.0)),
            vec![],
        ));
        description.effects.push(SerializedEffect::new(
            "",
            EffectKind::Offset(Offset::new(1.0, 0.0)),
            vec![],
        ));
        let graph = description.build().unwrap();
        let root = graph.last_effect().unwrap();
        let blur = graph.node(root).unwrap().inputs()[0];
        let source = graph.node(blur).unwrap().inputs()[0];
        assert_eq!(graph.effect(source).unwrap(), &EffectKind::SourceGraphic);
    }

    #[test]
    fn test_name_errors() {
        let mut description = SerializedGraph::new();
        description
            .effects
            .push(SerializedEffect::new("a", EffectKind::Merge, vec!["nope".into()]));
        assert_eq!(
            description.build().unwrap_err(),
            GraphError::UnknownResult("nope".into())
        );

        description.effects[0].inputs.clear();
        description
            .effects
            .push(SerializedEffect::new("a", EffectKind::Merge, vec![]));
        assert_eq!(description.build().unwrap_err(), GraphError::DuplicateResult("a".into()));

        description.effects.truncate(1);
        description.output = Some("b".into());
        assert_eq!(description.build().unwrap_err(), GraphError::UnknownResult("b".into()));
    }

    #[test]
    fn test_version_and_empty() {
        assert_eq!(SerializedGraph::new().build().unwrap_err(), GraphError::EmptyGraph);
        let mut description = SerializedGraph::from_json(DROP_SHADOW).unwrap();
        description.version = "2.0".into();
        assert_eq!(
            description.build().unwrap_err(),
            GraphError::UnsupportedVersion("2.0".into())
        );
    }

    #[test]
    fn test_from_graph_rebuilds_same_tree() {
        let original = SerializedGraph::from_json(DROP_SHADOW).unwrap().build().unwrap();
        let description = SerializedGraph::from_graph(&original);
        assert_eq!(description.output.as_deref(), Some("result4"));
        assert_eq!(description.effects.len(), 3);
        assert_eq!(description.effects[2].width, Some(40.0));
        assert_eq!(description.effects[2].x, Some(0.0));
        assert_eq!(description.effects[2].y, None);

        let json = description.to_json().unwrap();
        let rebuilt = SerializedGraph::from_json(&json).unwrap().build().unwrap();
        let dump = |g: &FilterGraph| g.external_representation(g.last_effect().unwrap()).unwrap();
        assert_eq!(dump(&rebuilt), dump(&original));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow.json");
        let description = SerializedGraph::from_json(DROP_SHADOW).unwrap();
        description.save(&path).unwrap();
        let loaded = SerializedGraph::load(&path).unwrap();
        assert_eq!(loaded, description);

        let missing = SerializedGraph::load(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(EffectGraphError::Io(_))));
    }

    #[test]
    fn test_load_rejects_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        fs::write(&path, r#"{"version": "0.1", "effects": []}"#).unwrap();
        assert!(matches!(
            SerializedGraph::load(&path),
            Err(EffectGraphError::Graph(GraphError::UnsupportedVersion(_)))
        ));
    }
}
