//! Flow diagram layout
//!
//! Layered layout: every node gets a rank (its longest distance from a
//! source), ranks are laid out along the flow direction and nodes within a
//! rank side by side, centred on the widest rank.

use std::collections::{HashMap, VecDeque};

use petgraph::Incoming;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use tracing::debug;

use super::error::RenderError;
use crate::extraction::{Direction, FlowSpec};

pub const NODE_WIDTH: f64 = 172.0;
pub const NODE_HEIGHT: f64 = 36.0;

/// Gap between consecutive ranks
const RANK_SEPARATION: f64 = 50.0;
/// Gap between neighbours in the same rank
const NODE_SEPARATION: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    pub rank: usize,
    /// Top-left corner
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutEdge {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowLayout {
    pub direction: Direction,
    /// Same order as the input nodes
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<LayoutEdge>,
    pub width: f64,
    pub height: f64,
}

impl FlowLayout {
    pub fn compute(spec: &FlowSpec) -> Result<Self, RenderError> {
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(spec.nodes.len(), spec.edges.len());
        let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(spec.nodes.len());

        for (position, node) in spec.nodes.iter().enumerate() {
            if node.id.is_empty() {
                return Err(RenderError::flow_structure(format!(
                    "Node {} has an empty id",
                    position + 1
                )));
            }
            let idx = graph.add_node(position);
            if index.insert(node.id.as_str(), idx).is_some() {
                return Err(RenderError::flow_structure(format!(
                    "Duplicate node id '{}'",
                    node.id
                )));
            }
        }

        for edge in &spec.edges {
            let source = lookup(&index, &edge.source)?;
            let target = lookup(&index, &edge.target)?;
            graph.add_edge(source, target, ());
        }

        let ranks = match toposort(&graph, None) {
            Ok(order) => longest_path_ranks(&graph, &order),
            Err(cycle) => {
                debug!(node = ?cycle.node_id(), "Flow diagram has a cycle, using breadth-first ranks");
                breadth_first_ranks(&graph)
            }
        };

        let direction = spec.direction();
        let rank_count = ranks.iter().copied().max().map_or(0, |max| max + 1);
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
        for (position, rank) in ranks.iter().enumerate() {
            members[*rank].push(position);
        }

        // Extent of a rank across the flow
        let (breadth, along) = match direction {
            Direction::TopBottom => (NODE_WIDTH, NODE_HEIGHT),
            Direction::LeftRight => (NODE_HEIGHT, NODE_WIDTH),
        };
        let span = |count: usize| {
            if count == 0 {
                0.0
            } else {
                count as f64 * breadth + (count - 1) as f64 * NODE_SEPARATION
            }
        };
        let widest = members.iter().map(|m| span(m.len())).fold(0.0, f64::max);

        let mut nodes: Vec<Option<PositionedNode>> = vec![None; spec.nodes.len()];
        for (rank, positions) in members.iter().enumerate() {
            let offset = (widest - span(positions.len())) / 2.0;
            for (slot, &position) in positions.iter().enumerate() {
                let across = offset + slot as f64 * (breadth + NODE_SEPARATION);
                let down = rank as f64 * (along + RANK_SEPARATION);
                let (x, y) = match direction {
                    Direction::TopBottom => (across, down),
                    Direction::LeftRight => (down, across),
                };
                let node = &spec.nodes[position];
                nodes[position] = Some(PositionedNode {
                    id: node.id.clone(),
                    label: node.display_label().to_string(),
                    node_type: node.node_type.clone(),
                    rank,
                    x,
                    y,
                });
            }
        }

        let depth = if rank_count == 0 {
            0.0
        } else {
            rank_count as f64 * along + (rank_count - 1) as f64 * RANK_SEPARATION
        };
        let (width, height) = match direction {
            Direction::TopBottom => (widest, depth),
            Direction::LeftRight => (depth, widest),
        };

        Ok(Self {
            direction,
            nodes: nodes.into_iter().flatten().collect(),
            edges: spec
                .edges
                .iter()
                .map(|edge| LayoutEdge {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    label: edge.label.clone(),
                })
                .collect(),
            width,
            height,
        })
    }

    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn rank_count(&self) -> usize {
        self.nodes.iter().map(|node| node.rank + 1).max().unwrap_or(0)
    }
}

fn lookup(index: &HashMap<&str, NodeIndex>, id: &str) -> Result<NodeIndex, RenderError> {
    index
        .get(id)
        .copied()
        .ok_or_else(|| RenderError::flow_structure(format!("Edge refers to unknown node '{}'", id)))
}

/// Rank of each node (by input position) as its longest path from a source
fn longest_path_ranks(graph: &DiGraph<usize, ()>, order: &[NodeIndex]) -> Vec<usize> {
    let mut ranks = vec![0; graph.node_count()];
    for &node in order {
        let rank = graph
            .neighbors_directed(node, Incoming)
            .map(|parent| ranks[graph[parent]] + 1)
            .max()
            .unwrap_or(0);
        ranks[graph[node]] = rank;
    }
    ranks
}

/// Rank of each node as its breadth-first distance from the nearest root
///
/// Roots are nodes without incoming edges; nodes only reachable through a
/// cycle start a new search from themselves, in input order.
fn breadth_first_ranks(graph: &DiGraph<usize, ()>) -> Vec<usize> {
    let mut ranks: Vec<Option<usize>> = vec![None; graph.node_count()];
    let mut queue = VecDeque::new();

    for node in graph.node_indices() {
        if graph.neighbors_directed(node, Incoming).next().is_none() {
            ranks[graph[node]] = Some(0);
            queue.push_back(node);
        }
    }
    drain(graph, &mut ranks, &mut queue);

    for node in graph.node_indices() {
        if ranks[graph[node]].is_none() {
            ranks[graph[node]] = Some(0);
            queue.push_back(node);
            drain(graph, &mut ranks, &mut queue);
        }
    }

    ranks.into_iter().map(|rank| rank.unwrap_or(0)).collect()
}

fn drain(graph: &DiGraph<usize, ()>, ranks: &mut [Option<usize>], queue: &mut VecDeque<NodeIndex>) {
    while let Some(node) = queue.pop_front() {
        let next = ranks[graph[node]].unwrap_or(0) + 1;
        for child in graph.neighbors(node) {
            if ranks[graph[child]].is_none() {
                ranks[graph[child]] = Some(next);
                queue.push_back(child);
            }
        }
    }
}
