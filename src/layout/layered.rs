use crate::layout::{
    LayoutEngine, LayoutEngineError, LayoutRequest, LayoutResponse, LayoutResponseNode,
    OPTION_ALGORITHM, OPTION_BETWEEN_LAYERS_SPACING, OPTION_DIRECTION, OPTION_NODE_NODE_SPACING,
};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::{Future, ready};

const DEFAULT_NODE_NODE_SPACING: f32 = 50.0;
const DEFAULT_BETWEEN_LAYERS_SPACING: f32 = 80.0;

/// Left-to-right layered placement.
///
/// Nodes are ranked by longest path from the sources, then pulled forward to
/// sit one rank before their nearest consumer. Each rank becomes a column, and
/// within a column nodes are ordered by the mean position of their consumers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredLayoutEngine;

impl LayoutEngine for LayeredLayoutEngine {
    fn layout(
        &self,
        request: LayoutRequest,
    ) -> impl Future<Output = Result<LayoutResponse, LayoutEngineError>> {
        ready(layout_layered(&request))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    Active,
    Done,
}

/// Successor lists with back edges removed, so that ranking always terminates.
fn forward_successors(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = successors.len();
    let mut state = vec![VisitState::Unvisited; n];
    let mut forward = vec![vec![]; n];
    for root in 0..n {
        if state[root] != VisitState::Unvisited {
            continue;
        }
        state[root] = VisitState::Active;
        let mut stack = vec![(root, 0usize)];
        while let Some((node, next_child)) = stack.pop() {
            if next_child >= successors[node].len() {
                state[node] = VisitState::Done;
                continue;
            }
            stack.push((node, next_child + 1));
            let child = successors[node][next_child];
            match state[child] {
                VisitState::Active => {
                    // Back edge, closes a cycle
                }
                VisitState::Done => forward[node].push(child),
                VisitState::Unvisited => {
                    forward[node].push(child);
                    state[child] = VisitState::Active;
                    stack.push((child, 0));
                }
            }
        }
    }
    forward
}

/// Longest-path rank of every node over an acyclic successor list.
fn longest_path_ranks(successors: &[Vec<usize>]) -> (Vec<usize>, Vec<usize>) {
    let n = successors.len();
    let mut in_degree = vec![0usize; n];
    for children in successors {
        for child in children {
            in_degree[*child] += 1;
        }
    }
    let mut queue = (0..n).filter(|x| in_degree[*x] == 0).collect::<VecDeque<_>>();
    let mut ranks = vec![0usize; n];
    let mut topological_order = Vec::with_capacity(n);
    while let Some(node) = queue.pop_front() {
        topological_order.push(node);
        for child in &successors[node] {
            ranks[*child] = ranks[*child].max(ranks[node] + 1);
            in_degree[*child] -= 1;
            if in_degree[*child] == 0 {
                queue.push_back(*child);
            }
        }
    }
    (ranks, topological_order)
}

pub fn layout_layered(request: &LayoutRequest) -> Result<LayoutResponse, LayoutEngineError> {
    if let Some(algorithm) = request.layout_options.get(OPTION_ALGORITHM) {
        if algorithm != "layered" {
            return Err(LayoutEngineError::UnsupportedOption(
                OPTION_ALGORITHM.to_string(),
                algorithm.clone(),
            ));
        }
    }
    if let Some(direction) = request.layout_options.get(OPTION_DIRECTION) {
        if direction != "RIGHT" {
            return Err(LayoutEngineError::UnsupportedOption(
                OPTION_DIRECTION.to_string(),
                direction.clone(),
            ));
        }
    }
    let node_spacing = request
        .option_f32(OPTION_NODE_NODE_SPACING)
        .unwrap_or(DEFAULT_NODE_NODE_SPACING);
    let layer_spacing = request
        .option_f32(OPTION_BETWEEN_LAYERS_SPACING)
        .unwrap_or(DEFAULT_BETWEEN_LAYERS_SPACING);

    let n = request.children.len();
    let mut index_of = HashMap::new();
    for (i, node) in request.children.iter().enumerate() {
        if index_of.insert(node.id.as_str(), i).is_some() {
            return Err(LayoutEngineError::DuplicateNode(node.id.clone()));
        }
    }

    // Column width and stacking height of each node
    let breadth = request.children.iter().map(|x| x.width).collect::<Vec<_>>();
    let depth = request.children.iter().map(|x| x.height).collect::<Vec<_>>();

    let mut successors = vec![vec![]; n];
    let mut seen_pairs = HashSet::new();
    for edge in &request.edges {
        let lookup = |id: &String| {
            index_of
                .get(id.as_str())
                .copied()
                .ok_or_else(|| LayoutEngineError::UnknownNode {
                    edge: edge.id.clone(),
                    node: id.clone(),
                })
        };
        for source in &edge.sources {
            let source = lookup(source)?;
            for target in &edge.targets {
                let target = lookup(target)?;
                if source != target && seen_pairs.insert((source, target)) {
                    successors[source].push(target);
                }
            }
        }
    }

    let successors = forward_successors(&successors);
    let (mut ranks, topological_order) = longest_path_ranks(&successors);

    // Pull each node forward to sit right before its nearest consumer
    for node in topological_order.iter().rev() {
        if let Some(nearest) = successors[*node].iter().map(|x| ranks[*x]).min() {
            ranks[*node] = nearest - 1;
        }
    }

    let num_ranks = ranks.iter().max().map(|x| x + 1).unwrap_or(0);
    let mut columns = vec![vec![]; num_ranks];
    for (node, rank) in ranks.iter().enumerate() {
        columns[*rank].push(node);
    }

    // Order columns from the last one backwards, by mean consumer position
    let mut across = vec![0.0f32; n];
    for column in columns.iter_mut().rev() {
        let mut keyed = column
            .iter()
            .map(|node| {
                let consumers = &successors[*node];
                let key = if consumers.is_empty() {
                    0.0
                } else {
                    consumers
                        .iter()
                        .map(|x| across[*x] + depth[*x] / 2.0)
                        .sum::<f32>()
                        / consumers.len() as f32
                };
                (*node, key)
            })
            .collect::<Vec<_>>();
        keyed.sort_by(|(a_node, a), (b_node, b)| match a.total_cmp(b) {
            Ordering::Equal => a_node.cmp(b_node),
            other => other,
        });
        *column = keyed.into_iter().map(|(node, _)| node).collect();

        let total = column.iter().map(|x| depth[*x]).sum::<f32>()
            + node_spacing * column.len().saturating_sub(1) as f32;
        let mut cursor = -total / 2.0;
        for node in column.iter() {
            across[*node] = cursor;
            cursor += depth[*node] + node_spacing;
        }
    }

    let mut along = vec![0.0f32; n];
    let mut column_start = 0.0f32;
    for column in &columns {
        let column_breadth = column.iter().map(|x| breadth[*x]).fold(0.0f32, f32::max);
        for node in column {
            along[*node] = column_start;
        }
        column_start += column_breadth + layer_spacing;
    }

    let min_across = across.iter().copied().fold(f32::INFINITY, f32::min);
    let min_across = if min_across.is_finite() { min_across } else { 0.0 };

    let children = request
        .children
        .iter()
        .enumerate()
        .map(|(i, node)| {
            LayoutResponseNode {
                id: node.id.clone(),
                x: along[i],
                y: across[i] - min_across,
                width: node.width,
                height: node.height,
            }
        })
        .collect();

    Ok(LayoutResponse { children })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutRequestEdge, LayoutRequestNode};
    use std::collections::BTreeMap;

    fn node(id: &str, width: f32, height: f32) -> LayoutRequestNode {
        LayoutRequestNode {
            id: id.to_string(),
            width,
            height,
        }
    }

    fn edge(source: &str, target: &str) -> LayoutRequestEdge {
        LayoutRequestEdge {
            id: format!("{source}->{target}"),
            sources: vec![source.to_string()],
            targets: vec![target.to_string()],
        }
    }

    fn request(nodes: Vec<LayoutRequestNode>, edges: Vec<LayoutRequestEdge>) -> LayoutRequest {
        LayoutRequest {
            id: "root".to_string(),
            layout_options: BTreeMap::new(),
            children: nodes,
            edges,
        }
    }

    fn position(response: &LayoutResponse, id: &str) -> (f32, f32) {
        let node = response.children.iter().find(|x| x.id == id).unwrap();
        (node.x, node.y)
    }

    fn overlaps(a: &LayoutResponseNode, b: &LayoutResponseNode) -> bool {
        a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
    }

    #[test]
    fn test_chain_flows_left_to_right() {
        let response = layout_layered(&request(
            vec![node("a", 140.0, 80.0), node("b", 200.0, 140.0), node("c", 140.0, 80.0)],
            vec![edge("a", "b"), edge("b", "c")],
        ))
        .unwrap();
        assert_eq!(position(&response, "a").0, 0.0);
        assert_eq!(position(&response, "b").0, 140.0 + 80.0);
        assert_eq!(position(&response, "c").0, 140.0 + 80.0 + 200.0 + 80.0);
    }

    #[test]
    fn test_sources_pulled_next_to_consumer() {
        // "late" only feeds the last node; it should share the column before it
        let response = layout_layered(&request(
            vec![
                node("a", 100.0, 50.0),
                node("b", 100.0, 50.0),
                node("c", 100.0, 50.0),
                node("late", 100.0, 50.0),
            ],
            vec![edge("a", "b"), edge("b", "c"), edge("late", "c")],
        ))
        .unwrap();
        assert_eq!(position(&response, "late").0, position(&response, "b").0);
    }

    #[test]
    fn test_no_overlap_within_column() {
        let nodes = (0..5).map(|i| node(&format!("n{i}"), 200.0, 100.0)).collect();
        let edges = (1..5).map(|i| edge("n0", &format!("n{i}"))).collect();
        let response = layout_layered(&request(nodes, edges)).unwrap();
        for (i, a) in response.children.iter().enumerate() {
            for b in response.children.iter().skip(i + 1) {
                assert!(!overlaps(a, b), "{} overlaps {}", a.id, b.id);
            }
        }
        let min_y = response.children.iter().map(|x| x.y).fold(f32::INFINITY, f32::min);
        assert_eq!(min_y, 0.0);
    }

    #[test]
    fn test_cycles_terminate() {
        let response = layout_layered(&request(
            vec![node("a", 10.0, 10.0), node("b", 10.0, 10.0), node("c", 10.0, 10.0)],
            vec![edge("a", "b"), edge("b", "c"), edge("c", "a")],
        ))
        .unwrap();
        assert_eq!(response.children.len(), 3);
        assert!(position(&response, "a").0 < position(&response, "b").0);
        assert!(position(&response, "b").0 < position(&response, "c").0);
    }

    #[test]
    fn test_errors() {
        let result = layout_layered(&request(vec![node("a", 1.0, 1.0)], vec![edge("a", "ghost")]));
        assert!(matches!(result, Err(LayoutEngineError::UnknownNode { .. })));

        let result = layout_layered(&request(
            vec![node("a", 1.0, 1.0), node("a", 1.0, 1.0)],
            vec![],
        ));
        assert_eq!(result, Err(LayoutEngineError::DuplicateNode("a".to_string())));

        for (key, value) in [(OPTION_ALGORITHM, "force"), (OPTION_DIRECTION, "DOWN")] {
            let mut req = request(vec![node("a", 1.0, 1.0)], vec![]);
            req.layout_options.insert(key.to_string(), value.to_string());
            assert!(matches!(
                layout_layered(&req),
                Err(LayoutEngineError::UnsupportedOption(_, _))
            ));
        }
    }
}
