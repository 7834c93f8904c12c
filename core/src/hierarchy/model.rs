//! Records exchanged between hierarchy levels
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::algorithm::graph::max_flow::SharedBottleneck;
use crate::algorithm::traits::{EdgeId, LinkId, NodeId, PathId};

/// Advertised route between two border nodes of one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntraDomainPath {
    pub id: PathId,
    pub src: NodeId,
    pub dst: NodeId,
    pub domain: String,
    pub cpu: f64,
    pub delay: f64,
    pub rate: f64,
}

impl IntraDomainPath {
    /// Backward twin with swapped endpoints and equal attributes
    pub fn twin(&self) -> Self {
        Self {
            id: self.id.backward(),
            src: self.dst,
            dst: self.src,
            ..self.clone()
        }
    }
}

/// Link between border nodes of two sibling domains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterDomainLink {
    pub id: EdgeId,
    pub src: NodeId,
    pub dst: NodeId,
    pub rate: f64,
    pub delay: f64,
}

/// CPU budget shared by several advertised paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuRestriction {
    pub id: String,
    pub domain: String,
    pub paths: Vec<PathId>,
    pub shared_cpu: f64,
}

/// Bandwidth bottleneck shared by several advertised paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRestriction {
    pub id: String,
    pub domain: String,
    pub paths: Vec<PathId>,
    pub shared_bottleneck: f64,
}

impl SharedBottleneck for RoutingRestriction {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn members(&self) -> &[PathId] {
        &self.paths
    }
}

/// What a domain hands to its parent after computing its paths
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    pub paths: Vec<IntraDomainPath>,
    pub cpu_restrictions: Vec<CpuRestriction>,
    pub routing_restrictions: Vec<RoutingRestriction>,
}

impl Advertisement {
    pub fn path_ids(&self) -> Vec<PathId> {
        self.paths.iter().map(|p| p.id).collect()
    }

    pub fn path(&self, id: PathId) -> Option<&IntraDomainPath> {
        self.paths.iter().find(|p| p.id == id)
    }
}

/// Which paths crossed which links and nodes during one domain computation.
///
/// Shared by every role pair of the domain; feeds aggregation and
/// restriction propagation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Participation {
    pub link_paths: BTreeMap<LinkId, Vec<PathId>>,
    pub node_paths: BTreeMap<NodeId, Vec<PathId>>,
}

impl Participation {
    pub fn record_link(&mut self, link: LinkId, path: PathId) {
        self.link_paths.entry(link).or_default().push(path);
    }

    pub fn record_node(&mut self, node: NodeId, forward: PathId, backward: PathId) {
        self.node_paths
            .entry(node)
            .or_default()
            .extend([forward, backward]);
    }

    /// Links both paths were recorded on
    pub fn shared_links(&self, a: PathId, b: PathId) -> Vec<LinkId> {
        self.link_paths
            .iter()
            .filter(|(_, paths)| paths.contains(&a) && paths.contains(&b))
            .map(|(link, _)| *link)
            .collect()
    }
}
