use crate::classifier::OperatorType;
use crate::metadata::LayerRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn for_layer(layer_id: i64) -> Self {
        Self(format!("layer_{layer_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Parameter tensors feeding a layer, split out for node detail text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerDetails {
    pub weights: Vec<String>,
    pub biases: Vec<String>,
    pub attributes: Vec<String>,
}

impl LayerDetails {
    pub fn from_layer(layer: &LayerRecord) -> Self {
        Self {
            weights: layer
                .input_tensors
                .iter()
                .filter(|x| x.contains("weight") || x.contains("conv"))
                .cloned()
                .collect(),
            biases: layer
                .input_tensors
                .iter()
                .filter(|x| x.contains("bias"))
                .cloned()
                .collect(),
            attributes: layer.attribute_names.clone(),
        }
    }

    /// `W (conv1)` for a first weight tensor named `conv1.weight`.
    pub fn weight_label(&self) -> Option<String> {
        self.weights.first().map(|x| format!("W ({})", tensor_prefix(x)))
    }

    pub fn bias_label(&self) -> Option<String> {
        self.biases.first().map(|x| format!("B ({})", tensor_prefix(x)))
    }
}

fn tensor_prefix(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphNodeKind {
    Input,
    Layer {
        op_type: OperatorType,
        layer: LayerRecord,
        details: LayerDetails,
    },
    Output,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub kind: GraphNodeKind,
    pub width: f32,
    pub height: f32,
    pub label: String,
}

impl GraphNode {
    pub fn op_type(&self) -> Option<OperatorType> {
        match &self.kind {
            GraphNodeKind::Layer { op_type, .. } => Some(*op_type),
            _ => None,
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, GraphNodeKind::Input)
    }

    pub fn is_output(&self) -> bool {
        matches!(self.kind, GraphNodeKind::Output)
    }

    /// Key used for styling: the displayed operator name, or `Input`/`Output`.
    pub fn type_name(&self) -> String {
        match &self.kind {
            GraphNodeKind::Input => "Input".to_string(),
            GraphNodeKind::Output => "Output".to_string(),
            GraphNodeKind::Layer { op_type, .. } => op_type.to_string(),
        }
    }
}

/// A data hand-off between two nodes through one tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    pub tensor: String,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId, tensor: &str) -> Self {
        Self {
            id: format!("{source}->{target}#{tensor}"),
            source,
            target,
            tensor: tensor.to_string(),
        }
    }
}
