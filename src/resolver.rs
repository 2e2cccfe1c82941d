//! Reconstructs the data-flow graph from tensor-name coincidence.
//!
//! A layer's producer index is built from every layer's outputs (a later
//! producer of the same tensor silently replaces an earlier one) and from the
//! declared graph inputs, which produce themselves. Each data input of a layer
//! is then looked up in that index. Parameter tensors (weights, biases) never
//! become edges, and tensors without a producer are dropped so that a partial
//! model still renders with orphan nodes.

use crate::classifier::classify;
use crate::config::{NodeSizes, ViewerConfig};
use crate::graph::{Edge, GraphNode, GraphNodeKind, LayerDetails, NodeId};
use crate::metadata::{LayerRecord, ModelMetadata};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOptions {
    pub parameter_markers: Vec<String>,
    pub node_sizes: NodeSizes,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::from_config(&ViewerConfig::default())
    }
}

impl ResolverOptions {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            parameter_markers: config.parameter_markers.clone(),
            node_sizes: config.node_sizes.clone(),
        }
    }

    pub fn is_parameter_tensor(&self, tensor: &str) -> bool {
        self.parameter_markers
            .iter()
            .any(|marker| tensor.contains(marker.as_str()))
    }
}

/// A data input with no known producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedTensor {
    pub tensor: String,
    pub consumer: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedGraph {
    pub inputs: Vec<GraphNode>,
    pub layers: Vec<GraphNode>,
    pub outputs: Vec<GraphNode>,
    pub edges: Vec<Edge>,
    pub unresolved: Vec<UnresolvedTensor>,
}

impl ResolvedGraph {
    pub fn node_count(&self) -> usize {
        self.inputs.len() + self.layers.len() + self.outputs.len()
    }

    /// Inputs, then layers, then outputs.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.inputs
            .iter()
            .chain(self.layers.iter())
            .chain(self.outputs.iter())
    }

    pub fn into_nodes_and_edges(self) -> (Vec<GraphNode>, Vec<Edge>) {
        let mut nodes = self.inputs;
        nodes.extend(self.layers);
        nodes.extend(self.outputs);
        (nodes, self.edges)
    }
}

pub fn resolve(
    layers: &[LayerRecord],
    graph_inputs: &[String],
    graph_outputs: &[String],
) -> ResolvedGraph {
    resolve_with(&ResolverOptions::default(), layers, graph_inputs, graph_outputs)
}

pub fn resolve_model(options: &ResolverOptions, metadata: &ModelMetadata) -> ResolvedGraph {
    resolve_with(options, &metadata.layers, &metadata.inputs, &metadata.outputs)
}

pub fn resolve_with(
    options: &ResolverOptions,
    layers: &[LayerRecord],
    graph_inputs: &[String],
    graph_outputs: &[String],
) -> ResolvedGraph {
    let sizes = &options.node_sizes;

    let mut producer_of: HashMap<&str, NodeId> = HashMap::new();
    for layer in layers {
        let node_id = NodeId::for_layer(layer.id);
        for tensor in &layer.output_tensors {
            if let Some(previous) = producer_of.insert(tensor.as_str(), node_id.clone()) {
                log::debug!("Tensor {tensor} produced by both {previous} and {node_id}");
            }
        }
    }

    let mut taken = layers
        .iter()
        .map(|x| NodeId::for_layer(x.id))
        .collect::<HashSet<_>>();

    // Initializers listed among the graph inputs are parameters, not inputs
    let mut input_node_of: HashMap<&str, NodeId> = HashMap::new();
    let mut inputs = vec![];
    for name in graph_inputs {
        if options.is_parameter_tensor(name) || input_node_of.contains_key(name.as_str()) {
            continue;
        }
        let id = claim_node_id(&mut taken, name, "input");
        producer_of.insert(name.as_str(), id.clone());
        input_node_of.insert(name.as_str(), id.clone());
        inputs.push(GraphNode {
            id,
            kind: GraphNodeKind::Input,
            width: sizes.io_width,
            height: sizes.io_height,
            label: name.clone(),
        });
    }

    let layer_nodes = layers
        .iter()
        .map(|layer| {
            let classification = classify(layer);
            GraphNode {
                id: NodeId::for_layer(layer.id),
                kind: GraphNodeKind::Layer {
                    op_type: classification.op_type,
                    layer: layer.clone(),
                    details: LayerDetails::from_layer(layer),
                },
                width: sizes.layer_width,
                height: classification.height,
                label: classification.op_type.to_string(),
            }
        })
        .collect::<Vec<_>>();

    let mut seen_outputs = HashSet::new();
    let mut outputs = vec![];
    for name in graph_outputs {
        if !seen_outputs.insert(name.as_str()) {
            continue;
        }
        outputs.push(GraphNode {
            id: claim_node_id(&mut taken, name, "output"),
            kind: GraphNodeKind::Output,
            width: sizes.io_width,
            height: sizes.io_height,
            label: name.clone(),
        });
    }

    let mut edges = vec![];
    let mut unresolved = vec![];
    let mut seen_edges = HashSet::new();
    for layer in layers {
        let target = NodeId::for_layer(layer.id);
        for tensor in &layer.input_tensors {
            if options.is_parameter_tensor(tensor) {
                continue;
            }
            match producer_of.get(tensor.as_str()) {
                Some(source) if *source == target => {}
                Some(source) => {
                    if seen_edges.insert((source.clone(), target.clone(), tensor.clone())) {
                        edges.push(Edge::new(source.clone(), target.clone(), tensor));
                    }
                }
                None => {
                    log::debug!("No producer for tensor {tensor} consumed by {target}");
                    unresolved.push(UnresolvedTensor {
                        tensor: tensor.clone(),
                        consumer: target.clone(),
                    });
                }
            }
        }
    }

    for output in &outputs {
        let tensor = output.label.as_str();
        let source = layers
            .iter()
            .find(|layer| layer.output_tensors.iter().any(|x| x == tensor))
            .map(|layer| NodeId::for_layer(layer.id))
            .or_else(|| input_node_of.get(tensor).cloned());
        match source {
            Some(source) => {
                if seen_edges.insert((source.clone(), output.id.clone(), tensor.to_string())) {
                    edges.push(Edge::new(source, output.id.clone(), tensor));
                }
            }
            None => log::debug!("Graph output {tensor} has no producer"),
        }
    }

    if !unresolved.is_empty() {
        log::warn!(
            "{} tensor references could not be resolved to a producer",
            unresolved.len()
        );
    }

    ResolvedGraph {
        inputs,
        layers: layer_nodes,
        outputs,
        edges,
        unresolved,
    }
}

/// The tensor name itself, or `<role>:<name>` when another node already
/// uses that id.
fn claim_node_id(taken: &mut HashSet<NodeId>, name: &str, role: &str) -> NodeId {
    let mut id = NodeId(name.to_string());
    let mut suffix = 1;
    while taken.contains(&id) {
        id = if suffix == 1 {
            NodeId(format!("{role}:{name}"))
        } else {
            NodeId(format!("{role}:{name}#{suffix}"))
        };
        suffix += 1;
    }
    taken.insert(id.clone());
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::OperatorType;

    fn names(x: &[&str]) -> Vec<String> {
        x.iter().map(|x| x.to_string()).collect()
    }

    fn edge_pairs(graph: &ResolvedGraph) -> Vec<(String, String)> {
        graph
            .edges
            .iter()
            .map(|x| (x.source.0.clone(), x.target.0.clone()))
            .collect()
    }

    #[test]
    fn test_single_conv_chain() {
        let layers = vec![LayerRecord::new(1, &["x"], &["y"], &["kernel_shape"])];
        let graph = resolve(&layers, &names(&["x"]), &names(&["y"]));
        assert_eq!(graph.inputs.len(), 1);
        assert_eq!(graph.layers[0].op_type(), Some(OperatorType::Conv));
        assert_eq!(graph.outputs[0].id, NodeId::from("y"));
        assert_eq!(
            edge_pairs(&graph),
            vec![
                ("x".to_string(), "layer_1".to_string()),
                ("layer_1".to_string(), "y".to_string())
            ]
        );
        assert!(graph.unresolved.is_empty());
    }

    #[test]
    fn test_last_producer_wins() {
        let layers = vec![
            LayerRecord::new(1, &["x"], &["t"], &[]),
            LayerRecord::new(2, &["x"], &["t"], &[]),
            LayerRecord::new(3, &["t"], &["y"], &[]),
        ];
        let graph = resolve(&layers, &names(&["x"]), &[]);
        let into_three = graph
            .edges
            .iter()
            .filter(|x| x.target == NodeId::for_layer(3))
            .collect::<Vec<_>>();
        assert_eq!(into_three.len(), 1);
        assert_eq!(into_three[0].source, NodeId::for_layer(2));
    }

    #[test]
    fn test_parameter_inputs_never_form_edges() {
        let layers = vec![
            LayerRecord::new(1, &["w.weight"], &["fc1.weight"], &[]),
            LayerRecord::new(2, &["x", "fc1.weight", "fc1.bias"], &["y"], &[]),
        ];
        let graph = resolve(&layers, &names(&["x"]), &names(&["y"]));
        assert!(graph.edges.iter().all(|x| !x.tensor.contains("weight")));
        assert!(graph.edges.iter().all(|x| !x.tensor.contains("bias")));
        assert!(!graph.edges.iter().any(|x| x.target == NodeId::for_layer(1)));
        assert!(graph.unresolved.is_empty());
    }

    #[test]
    fn test_initializer_inputs_get_no_node() {
        let layers = vec![LayerRecord::new(1, &["x", "fc.weight"], &["y"], &[])];
        let graph = resolve(
            &layers,
            &names(&["x", "fc.weight", "fc.bias"]),
            &names(&["y"]),
        );
        assert_eq!(graph.inputs.len(), 1);
        assert_eq!(graph.inputs[0].label, "x");
    }

    #[test]
    fn test_unresolved_tensor_leaves_orphan() {
        let layers = vec![LayerRecord::new(1, &["missing"], &["y"], &[])];
        let graph = resolve(&layers, &[], &[]);
        assert!(graph.edges.is_empty());
        assert_eq!(
            graph.unresolved,
            vec![UnresolvedTensor {
                tensor: "missing".to_string(),
                consumer: NodeId::for_layer(1)
            }]
        );
    }

    #[test]
    fn test_no_self_loops_or_duplicate_handoffs() {
        let layers = vec![
            // Reads its own output, and reads x twice
            LayerRecord::new(1, &["x", "x", "h"], &["h"], &[]),
            LayerRecord::new(2, &["h", "x"], &["a", "b"], &[]),
            LayerRecord::new(3, &["a", "b"], &["y"], &[]),
        ];
        let graph = resolve(&layers, &names(&["x"]), &names(&["y", "y"]));
        assert!(graph.edges.iter().all(|x| x.source != x.target));
        let mut triples = HashSet::new();
        for edge in &graph.edges {
            let triple = (edge.source.clone(), edge.target.clone(), edge.tensor.clone());
            assert!(triples.insert(triple));
        }
        // Two distinct tensors between layer_2 and layer_3 stay distinct
        let multi = graph
            .edges
            .iter()
            .filter(|x| x.source == NodeId::for_layer(2) && x.target == NodeId::for_layer(3))
            .count();
        assert_eq!(multi, 2);
        assert_eq!(graph.outputs.len(), 1);
    }

    #[test]
    fn test_output_without_producer_has_no_edge() {
        let layers = vec![LayerRecord::new(1, &["x"], &["y"], &[])];
        let graph = resolve(&layers, &names(&["x"]), &names(&["z"]));
        assert_eq!(graph.outputs.len(), 1);
        assert!(!graph.edges.iter().any(|x| x.target == NodeId::from("z")));
    }

    #[test]
    fn test_custom_markers() {
        let options = ResolverOptions {
            parameter_markers: names(&["param"]),
            ..Default::default()
        };
        // With custom markers, "conv1_out" is ordinary data again
        let layers = vec![
            LayerRecord::new(1, &["x"], &["conv1_out"], &["kernel_shape"]),
            LayerRecord::new(2, &["conv1_out", "param0"], &["y"], &[]),
        ];
        let graph = resolve_with(&options, &layers, &names(&["x"]), &[]);
        let edge = graph.edges.iter().find(|x| x.tensor == "conv1_out").unwrap();
        assert_eq!((&edge.source, &edge.target), (&NodeId::for_layer(1), &NodeId::for_layer(2)));
        assert!(!graph.edges.iter().any(|x| x.tensor == "param0"));
    }

    #[test]
    fn test_passthrough_output_gets_own_node() {
        let layers = vec![LayerRecord::new(1, &["x"], &["y"], &["kernel_shape"])];
        let graph = resolve(&layers, &names(&["x"]), &names(&["y", "x"]));
        let ids = graph.nodes().map(|x| x.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["x", "layer_1", "y", "output:x"]);
        assert_eq!(graph.outputs[1].label, "x");
        assert!(graph.edges.iter().any(|x| {
            x.source == NodeId::from("x") && x.target == NodeId::from("output:x") && x.tensor == "x"
        }));
    }

    #[test]
    fn test_tensor_named_like_layer_node() {
        let layers = vec![LayerRecord::new(1, &["layer_1"], &["y"], &[])];
        let graph = resolve(&layers, &names(&["layer_1"]), &names(&["y"]));
        assert_eq!(graph.inputs[0].id, NodeId::from("input:layer_1"));
        assert_eq!(graph.inputs[0].label, "layer_1");
        assert!(graph.edges.iter().any(|x| {
            x.source == NodeId::from("input:layer_1") && x.target == NodeId::for_layer(1)
        }));
    }
}
