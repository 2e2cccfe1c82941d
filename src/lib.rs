//! Interactive map of a model's operator graph.
//!
//! Layer records come from an upstream metadata provider with no operator
//! types and no explicit edges. [`classifier`] infers a type per layer,
//! [`resolver`] reconnects layers through shared tensor names, [`layout`]
//! positions the result, and [`viewport`] with [`render`] put it on screen.

pub mod classifier;
pub mod config;
pub mod explorer;
pub mod graph;
pub mod layout;
pub mod metadata;
pub mod render;
pub mod resolver;
pub mod viewport;

pub use classifier::{Classification, OperatorType, classify};
pub use config::{ConfigError, ViewPolicy, ViewerConfig};
pub use explorer::{GraphDisplay, GraphExplorer, LayoutOutcome};
pub use graph::{Edge, GraphNode, GraphNodeKind, NodeId};
pub use layout::{
    LayeredLayoutEngine, LayoutEngine, LayoutError, LayoutResult, PositionedNode, build_and_layout,
};
pub use metadata::{LayerRecord, MetadataError, ModelCatalog, ModelMetadata};
pub use resolver::{ResolvedGraph, resolve};
pub use viewport::{ViewportController, ViewportState};
