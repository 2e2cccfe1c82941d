pub mod layered;

use crate::config::LayoutSpacing;
use crate::graph::{Edge, GraphNode, NodeId};
use egui::{Rect, pos2, vec2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;

pub use layered::LayeredLayoutEngine;

pub const OPTION_ALGORITHM: &str = "elk.algorithm";
pub const OPTION_DIRECTION: &str = "elk.direction";
pub const OPTION_NODE_NODE_SPACING: &str = "elk.spacing.nodeNode";
pub const OPTION_BETWEEN_LAYERS_SPACING: &str = "elk.layered.spacing.nodeNodeBetweenLayers";
pub const OPTION_EDGE_NODE_SPACING: &str = "elk.spacing.edgeNode";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRequestNode {
    pub id: String,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRequestEdge {
    pub id: String,
    pub sources: Vec<String>,
    pub targets: Vec<String>,
}

/// What gets handed to a [`LayoutEngine`]: sized nodes, edges, and string
/// options in the key format of the ELK layered algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRequest {
    pub id: String,
    #[serde(rename = "layoutOptions")]
    pub layout_options: BTreeMap<String, String>,
    pub children: Vec<LayoutRequestNode>,
    pub edges: Vec<LayoutRequestEdge>,
}

impl LayoutRequest {
    pub fn option_f32(&self, key: &str) -> Option<f32> {
        self.layout_options.get(key).and_then(|x| x.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResponseNode {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutResponse {
    pub children: Vec<LayoutResponseNode>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutEngineError {
    #[error("Edge {edge} references unknown node \"{node}\"")]
    UnknownNode { edge: String, node: String },
    #[error("Duplicate node id \"{0}\"")]
    DuplicateNode(String),
    #[error("Unsupported layout option {0}={1}")]
    UnsupportedOption(String, String),
    #[error("Layout rejected: {0}")]
    Rejected(String),
}

/// A layered graph layout algorithm.
///
/// Implementations may complete synchronously or suspend; results are always
/// consumed on the calling thread.
pub trait LayoutEngine {
    fn layout(
        &self,
        request: LayoutRequest,
    ) -> impl Future<Output = Result<LayoutResponse, LayoutEngineError>>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("Failed to layout graph: {0}")]
    LayoutFailure(String),
    #[error("No nodes found in the model graph")]
    EmptyGraph,
}

impl From<LayoutEngineError> for LayoutError {
    fn from(value: LayoutEngineError) -> Self {
        LayoutError::LayoutFailure(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedNode {
    pub node: GraphNode,
    pub x: f32,
    pub y: f32,
}

impl PositionedNode {
    pub fn id(&self) -> &NodeId {
        &self.node.id
    }

    /// Model-space bounds, top-left at `(x, y)`.
    pub fn rect(&self) -> Rect {
        Rect::from_min_size(pos2(self.x, self.y), vec2(self.node.width, self.node.height))
    }
}

/// Positioned nodes plus the unchanged edge list. Edges carry no geometry;
/// they are drawn from their endpoint nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<Edge>,
}

impl LayoutResult {
    pub fn node(&self, id: &NodeId) -> Option<&PositionedNode> {
        self.nodes.iter().find(|x| x.id() == id)
    }

    /// Id lookup for work done every frame; [`Self::node`] scans.
    pub fn node_index(&self) -> HashMap<&NodeId, &PositionedNode> {
        self.nodes.iter().map(|x| (x.id(), x)).collect()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn bounding_rect(&self) -> Option<Rect> {
        self.nodes
            .iter()
            .map(|x| x.rect())
            .reduce(|a, b| a.union(b))
    }

    pub fn summary(&self) -> String {
        format!(
            "Graph created with {} nodes and {} edges",
            self.nodes.len(),
            self.edges.len()
        )
    }
}

pub fn layout_options(spacing: &LayoutSpacing) -> BTreeMap<String, String> {
    BTreeMap::from([
        (OPTION_ALGORITHM.to_string(), "layered".to_string()),
        (OPTION_DIRECTION.to_string(), "RIGHT".to_string()),
        (OPTION_NODE_NODE_SPACING.to_string(), spacing.node_node.to_string()),
        (
            OPTION_BETWEEN_LAYERS_SPACING.to_string(),
            spacing.between_layers.to_string(),
        ),
        (OPTION_EDGE_NODE_SPACING.to_string(), spacing.edge_node.to_string()),
    ])
}

/// Nodes are expected in input, layer, output order; the order only affects
/// tie-breaking inside the engine.
pub fn build_request(
    nodes: &[GraphNode],
    edges: &[Edge],
    spacing: &LayoutSpacing,
) -> LayoutRequest {
    LayoutRequest {
        id: "root".to_string(),
        layout_options: layout_options(spacing),
        children: nodes
            .iter()
            .map(|x| LayoutRequestNode {
                id: x.id.0.clone(),
                width: x.width,
                height: x.height,
            })
            .collect(),
        edges: edges
            .iter()
            .map(|x| LayoutRequestEdge {
                id: x.id.clone(),
                sources: vec![x.source.0.clone()],
                targets: vec![x.target.0.clone()],
            })
            .collect(),
    }
}

pub async fn build_and_layout<E: LayoutEngine>(
    engine: &E,
    nodes: Vec<GraphNode>,
    edges: Vec<Edge>,
    spacing: &LayoutSpacing,
) -> Result<LayoutResult, LayoutError> {
    let request = build_request(&nodes, &edges, spacing);
    let response = engine.layout(request).await.inspect_err(|err| {
        log::warn!("Graph layout error: {err}");
    })?;

    if response.children.is_empty() {
        return Err(LayoutError::EmptyGraph);
    }

    let positions = response
        .children
        .iter()
        .map(|x| (x.id.as_str(), (x.x, x.y)))
        .collect::<HashMap<_, _>>();
    let mut positioned = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Some((x, y)) = positions.get(node.id.as_str()).copied() else {
            return Err(LayoutError::LayoutFailure(format!(
                "layout response is missing node \"{}\"",
                node.id
            )));
        };
        if !x.is_finite() || !y.is_finite() {
            return Err(LayoutError::LayoutFailure(format!(
                "non-finite position for node \"{}\"",
                node.id
            )));
        }
        positioned.push(PositionedNode { node, x, y });
    }

    let result = LayoutResult {
        nodes: positioned,
        edges,
    };
    log::info!("{}", result.summary());
    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayoutTicket(pub u64);

/// Hands out increasing tokens for layout requests. Only the most recently
/// issued token may commit; anything older is discarded when it arrives.
#[derive(Debug, Default)]
pub struct LayoutSequencer {
    next_token: u64,
    pending: Option<u64>,
}

impl LayoutSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> LayoutTicket {
        let token = self.next_token;
        self.next_token += 1;
        self.pending = Some(token);
        LayoutTicket(token)
    }

    pub fn is_current(&self, ticket: LayoutTicket) -> bool {
        self.pending == Some(ticket.0)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns true if `ticket` is the latest request, which is then settled.
    pub fn settle(&mut self, ticket: LayoutTicket) -> bool {
        if self.is_current(ticket) {
            self.pending = None;
            true
        } else {
            log::debug!("Discarding superseded layout {}", ticket.0);
            false
        }
    }
}
