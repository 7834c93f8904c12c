//! Substrate topology and domain capacity graphs
//!
//! `Topology` is the directed physical network every domain is carved out of:
//! named nodes carrying cpu capacity and directed edges carrying an id, a
//! maximum rate and a delay. `CapacityGraph` is the mutable directed multigraph
//! one domain routes over while computing its advertised paths. At leaf level
//! its links are substrate edges; at aggregate level they are the children's
//! advertised paths joined by inter-domain edges.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::algorithm::traits::{EdgeId, LinkId, NodeId};

/// Errors raised while assembling a topology
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TopologyError {
    #[error("Node name '{0}' is already present")]
    DuplicateNode(String),

    #[error("Edge {0} is already present")]
    DuplicateEdge(EdgeId),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Unknown node name: {0}")]
    UnknownNodeName(String),

    #[error("Invalid attribute {attribute} on {owner}: {value}")]
    InvalidAttribute {
        owner: String,
        attribute: &'static str,
        value: f64,
    },
}

/// Physical node with its processing capacity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstrateNode {
    pub name: String,
    pub cpu: f64,
}

/// Directed physical edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstrateEdge {
    pub id: EdgeId,
    pub src: NodeId,
    pub dst: NodeId,
    pub max_rate: f64,
    pub delay: f64,
}

/// Directed substrate network with named nodes
#[derive(Debug, Clone, Default, Serialize)]
pub struct Topology {
    nodes: Vec<SubstrateNode>,
    edges: Vec<SubstrateEdge>,
    #[serde(skip)]
    names: HashMap<String, NodeId>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its identifier
    pub fn add_node(&mut self, name: impl Into<String>, cpu: f64) -> Result<NodeId, TopologyError> {
        let name = name.into();
        if !cpu.is_finite() || cpu < 0.0 {
            return Err(TopologyError::InvalidAttribute {
                owner: name,
                attribute: "cpu",
                value: cpu,
            });
        }
        if self.names.contains_key(&name) {
            return Err(TopologyError::DuplicateNode(name));
        }
        let id = NodeId(self.nodes.len());
        self.names.insert(name.clone(), id);
        self.nodes.push(SubstrateNode { name, cpu });
        Ok(id)
    }

    /// Add a directed edge between two existing nodes
    pub fn add_edge(
        &mut self,
        id: EdgeId,
        src: NodeId,
        dst: NodeId,
        max_rate: f64,
        delay: f64,
    ) -> Result<(), TopologyError> {
        for node in [src, dst] {
            if node.as_usize() >= self.nodes.len() {
                return Err(TopologyError::UnknownNode(node));
            }
        }
        if self.edges.iter().any(|e| e.id == id) {
            return Err(TopologyError::DuplicateEdge(id));
        }
        for (attribute, value) in [("max_rate", max_rate), ("delay", delay)] {
            if value.is_nan() || value < 0.0 {
                return Err(TopologyError::InvalidAttribute {
                    owner: id.to_string(),
                    attribute,
                    value,
                });
            }
        }
        self.edges.push(SubstrateEdge {
            id,
            src,
            dst,
            max_rate,
            delay,
        });
        Ok(())
    }

    /// Add the twin pair `id` (u→v) and `id.backward()` (v→u) with equal attributes
    pub fn add_link_pair(
        &mut self,
        id: EdgeId,
        u: NodeId,
        v: NodeId,
        max_rate: f64,
        delay: f64,
    ) -> Result<(), TopologyError> {
        self.add_edge(id, u, v, max_rate, delay)?;
        self.add_edge(id.backward(), v, u, max_rate, delay)
    }

    pub fn node_id(&self, name: &str) -> Result<NodeId, TopologyError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| TopologyError::UnknownNodeName(name.to_owned()))
    }

    pub fn node(&self, id: NodeId) -> Option<&SubstrateNode> {
        self.nodes.get(id.as_usize())
    }

    /// Display name of a node, falling back to its numeric form
    pub fn name(&self, id: NodeId) -> String {
        self.node(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn cpu(&self, id: NodeId) -> f64 {
        self.node(id).map_or(0.0, |n| n.cpu)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[SubstrateEdge] {
        &self.edges
    }

    /// First edge leading from `u` to `v`
    pub fn find_edge(&self, u: NodeId, v: NodeId) -> Option<&SubstrateEdge> {
        self.edges.iter().find(|e| e.src == u && e.dst == v)
    }

    pub fn has_edge(&self, u: NodeId, v: NodeId) -> bool {
        self.find_edge(u, v).is_some()
    }

    /// Induced subgraph on `nodes`, keeping global node identifiers
    pub fn induced(&self, nodes: &BTreeSet<NodeId>) -> Self {
        Self {
            nodes: self.nodes.clone(),
            edges: self
                .edges
                .iter()
                .filter(|e| nodes.contains(&e.src) && nodes.contains(&e.dst))
                .cloned()
                .collect(),
            names: self.names.clone(),
        }
    }
}

/// Serialized form of a topology; the name index is rebuilt on load
#[derive(Deserialize)]
struct TopologyRecord {
    nodes: Vec<SubstrateNode>,
    edges: Vec<SubstrateEdge>,
}

impl TryFrom<TopologyRecord> for Topology {
    type Error = TopologyError;

    fn try_from(record: TopologyRecord) -> Result<Self, Self::Error> {
        let mut topology = Self::new();
        for node in record.nodes {
            topology.add_node(node.name, node.cpu)?;
        }
        for edge in record.edges {
            topology.add_edge(edge.id, edge.src, edge.dst, edge.max_rate, edge.delay)?;
        }
        Ok(topology)
    }
}

impl<'de> Deserialize<'de> for Topology {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let record = TopologyRecord::deserialize(deserializer)?;
        Self::try_from(record).map_err(serde::de::Error::custom)
    }
}

/// Directed link in a domain's capacity graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityLink {
    pub id: LinkId,
    pub src: NodeId,
    pub dst: NodeId,
    pub max_rate: f64,
    pub delay: f64,
    pub cpu: f64,
}

/// Directed multigraph of remaining capacities owned by one domain computation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityGraph {
    links: Vec<CapacityLink>,
    node_cpu: BTreeMap<NodeId, f64>,
}

impl CapacityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaf capacity graph: substrate edges as links, substrate cpu on nodes
    pub fn from_topology(topology: &Topology, nodes: &BTreeSet<NodeId>) -> Self {
        let mut graph = Self::new();
        for &node in nodes {
            graph.set_node_cpu(node, topology.cpu(node));
        }
        for edge in topology.edges() {
            if nodes.contains(&edge.src) && nodes.contains(&edge.dst) {
                graph.add_link(CapacityLink {
                    id: LinkId::Edge(edge.id),
                    src: edge.src,
                    dst: edge.dst,
                    max_rate: edge.max_rate,
                    delay: edge.delay,
                    cpu: 0.0,
                });
            }
        }
        graph
    }

    pub fn add_link(&mut self, link: CapacityLink) {
        self.node_cpu.entry(link.src).or_insert(0.0);
        self.node_cpu.entry(link.dst).or_insert(0.0);
        self.links.push(link);
    }

    pub fn set_node_cpu(&mut self, node: NodeId, cpu: f64) {
        self.node_cpu.insert(node, cpu);
    }

    pub fn node_cpu(&self, node: NodeId) -> f64 {
        self.node_cpu.get(&node).copied().unwrap_or(0.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_cpu.keys().copied()
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.node_cpu.contains_key(&node)
    }

    /// Links in insertion order
    pub fn links(&self) -> &[CapacityLink] {
        &self.links
    }

    pub fn link(&self, id: LinkId) -> Option<&CapacityLink> {
        self.links.iter().find(|l| l.id == id)
    }

    /// Remaining capacity of `id`, if the link exists
    pub fn capacity_of(&self, id: LinkId) -> Option<f64> {
        self.link(id).map(|l| l.max_rate)
    }

    /// Reduce the capacity of `id` by `amount`, clamping at zero
    pub fn deduct(&mut self, id: LinkId, amount: f64) -> bool {
        match self.links.iter_mut().find(|l| l.id == id) {
            Some(link) => {
                link.max_rate = (link.max_rate - amount).max(0.0);
                true
            }
            None => false,
        }
    }
}
