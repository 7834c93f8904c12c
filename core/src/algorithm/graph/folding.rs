//! Multigraph Folding for Max-Flow
//!
//! Reduces a domain's directed capacity multigraph to an undirected simple
//! residual network: one edge per unordered node pair, chosen among the
//! parallel directed links by skipping exhausted ones and never re-choosing a
//! pair whose orientation an earlier round already fixed the other way.
//! Synthetic super-ingress and super-egress vertices with unlimited capacity
//! turn the multi-source/multi-sink problem into a single-pair one.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::algorithm::path_finding::bidirectional::ResidualNetwork;
use crate::algorithm::traits::{LinkId, NodeId};
use crate::data_structures::graph::CapacityGraph;

/// Vertex index of the synthetic super-ingress
pub const SUPER_INGRESS: usize = 0;
/// Vertex index of the synthetic super-egress
pub const SUPER_EGRESS: usize = 1;

/// Vertex of the folded network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowVertex {
    SuperIngress,
    SuperEgress,
    Node(NodeId),
}

/// Capacity-graph link a folded edge was chosen from.
///
/// The folded edge's tail→head orientation equals the link's src→dst.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoldedLink {
    pub id: LinkId,
    pub delay: f64,
    pub cpu: f64,
}

/// Undirected residual edge with independent per-direction capacity
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualEdge {
    pub tail: usize,
    pub head: usize,
    /// Capacity usable from tail to head
    pub cap_forward: f64,
    /// Capacity usable from head to tail
    pub cap_backward: f64,
    /// Signed flow, positive when running tail to head
    pub flow: f64,
    /// `None` for super-ingress/egress edges
    pub link: Option<FoldedLink>,
}

impl ResidualEdge {
    /// Residual capacity when leaving `from`
    pub fn residual_from(&self, from: usize) -> f64 {
        let residual = if from == self.tail {
            self.cap_forward - self.flow
        } else {
            self.cap_backward + self.flow
        };
        residual.max(0.0)
    }

    /// Push `amount` of flow leaving `from`
    pub fn push_from(&mut self, from: usize, amount: f64) {
        if from == self.tail {
            self.flow += amount;
        } else {
            self.flow -= amount;
        }
    }

    /// Endpoint opposite to `v`
    pub fn other(&self, v: usize) -> usize {
        if v == self.tail {
            self.head
        } else {
            self.tail
        }
    }

    /// Whether travelling from `from` matches the chosen link orientation
    pub fn is_aligned(&self, from: usize) -> bool {
        from == self.tail
    }
}

/// Transient residual network owned by one PathComputer round
#[derive(Debug, Clone)]
pub struct FoldedNetwork {
    vertices: Vec<FlowVertex>,
    index: BTreeMap<NodeId, usize>,
    edges: Vec<ResidualEdge>,
    adjacency: Vec<Vec<usize>>,
    epsilon: f64,
}

impl FoldedNetwork {
    fn new(epsilon: f64) -> Self {
        Self {
            vertices: vec![FlowVertex::SuperIngress, FlowVertex::SuperEgress],
            index: BTreeMap::new(),
            edges: Vec::new(),
            adjacency: vec![Vec::new(), Vec::new()],
            epsilon,
        }
    }

    fn ensure_vertex(&mut self, node: NodeId) -> usize {
        if let Some(&v) = self.index.get(&node) {
            return v;
        }
        let v = self.vertices.len();
        self.vertices.push(FlowVertex::Node(node));
        self.adjacency.push(Vec::new());
        self.index.insert(node, v);
        v
    }

    fn push_edge(&mut self, edge: ResidualEdge) {
        let e = self.edges.len();
        self.adjacency[edge.tail].push(e);
        self.adjacency[edge.head].push(e);
        self.edges.push(edge);
    }

    pub fn vertex(&self, v: usize) -> Option<FlowVertex> {
        self.vertices.get(v).copied()
    }

    pub fn vertex_of(&self, node: NodeId) -> Option<usize> {
        self.index.get(&node).copied()
    }

    pub fn edges(&self) -> &[ResidualEdge] {
        &self.edges
    }

    pub fn edge(&self, e: usize) -> Option<&ResidualEdge> {
        self.edges.get(e)
    }

    pub fn edge_mut(&mut self, e: usize) -> Option<&mut ResidualEdge> {
        self.edges.get_mut(e)
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut ResidualEdge> {
        self.edges.iter_mut()
    }

    /// Number of folded substrate edges, excluding super edges
    pub fn link_count(&self) -> usize {
        self.edges.iter().filter(|e| e.link.is_some()).count()
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl ResidualNetwork for FoldedNetwork {
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn outgoing(&self, v: usize) -> Vec<(usize, usize)> {
        self.adjacency[v]
            .iter()
            .filter(|&&e| self.edges[e].residual_from(v) > self.epsilon)
            .map(|&e| (self.edges[e].other(v), e))
            .collect()
    }

    fn incoming(&self, v: usize) -> Vec<(usize, usize)> {
        self.adjacency[v]
            .iter()
            .filter_map(|&e| {
                let w = self.edges[e].other(v);
                (self.edges[e].residual_from(w) > self.epsilon).then_some((w, e))
            })
            .collect()
    }
}

/// Remove nodes present in both role sets from the currently larger set.
///
/// Overlapping nodes are visited in ascending order and ties remove the node
/// from the ingress set. The inputs are left untouched.
pub fn resolve_role_overlap(
    ingresses: &BTreeSet<NodeId>,
    egresses: &BTreeSet<NodeId>,
) -> (BTreeSet<NodeId>, BTreeSet<NodeId>) {
    let mut ingresses = ingresses.clone();
    let mut egresses = egresses.clone();
    let overlap: Vec<NodeId> = ingresses.intersection(&egresses).copied().collect();
    for node in overlap {
        debug!("Node {} is both ingress and egress", node);
        if egresses.len() > ingresses.len() {
            egresses.remove(&node);
        } else {
            ingresses.remove(&node);
        }
    }
    (ingresses, egresses)
}

/// Folds a capacity multigraph round after round, remembering fixed orientations
#[derive(Debug, Clone, Default)]
pub struct FlowNetworkFolder {
    fixed: BTreeSet<(NodeId, NodeId)>,
    epsilon: f64,
}

impl FlowNetworkFolder {
    pub fn new(epsilon: f64) -> Self {
        Self {
            fixed: BTreeSet::new(),
            epsilon,
        }
    }

    /// Orientations fixed so far
    pub fn fixed_orientations(&self) -> &BTreeSet<(NodeId, NodeId)> {
        &self.fixed
    }

    /// Build the folded residual network for one round
    pub fn fold(
        &mut self,
        graph: &CapacityGraph,
        ingresses: &BTreeSet<NodeId>,
        egresses: &BTreeSet<NodeId>,
    ) -> FoldedNetwork {
        let mut network = FoldedNetwork::new(self.epsilon);
        for node in graph.nodes() {
            network.ensure_vertex(node);
        }

        let mut chosen: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();
        for link in graph.links() {
            if link.max_rate <= self.epsilon {
                debug!("Link {} ({} -> {}) is exhausted", link.id, link.src, link.dst);
                continue;
            }
            if link.src == link.dst {
                continue;
            }
            let pair = (link.src.min(link.dst), link.src.max(link.dst));
            if chosen.contains(&pair) || self.fixed.contains(&(link.dst, link.src)) {
                continue;
            }
            let tail = network.ensure_vertex(link.src);
            let head = network.ensure_vertex(link.dst);
            network.push_edge(ResidualEdge {
                tail,
                head,
                cap_forward: link.max_rate,
                cap_backward: link.max_rate,
                flow: 0.0,
                link: Some(FoldedLink {
                    id: link.id,
                    delay: link.delay,
                    cpu: link.cpu,
                }),
            });
            chosen.insert(pair);
            self.fixed.insert((link.src, link.dst));
        }

        let (ingresses, egresses) = resolve_role_overlap(ingresses, egresses);
        for node in ingresses {
            let v = network.ensure_vertex(node);
            network.push_edge(ResidualEdge {
                tail: SUPER_INGRESS,
                head: v,
                cap_forward: f64::INFINITY,
                cap_backward: 0.0,
                flow: 0.0,
                link: None,
            });
        }
        for node in egresses {
            let v = network.ensure_vertex(node);
            network.push_edge(ResidualEdge {
                tail: v,
                head: SUPER_EGRESS,
                cap_forward: f64::INFINITY,
                cap_backward: 0.0,
                flow: 0.0,
                link: None,
            });
        }
        network
    }
}
