//! Domain hierarchy coordinator
//!
//! A `Coordinator` is one node of the domain tree. Leaves own a partition of
//! the substrate; aggregates own their children and the inter-domain links
//! between them. The tree is processed in two passes:
//!
//! 1. `build_hierarchy` extracts leaf subgraphs, discovers inter-domain links
//!    and pushes border-node roles down to the children owning the nodes.
//! 2. `compute_advertised_paths` runs post-order. Each domain computes paths
//!    between every pair of its border roles over one capacity graph, in the
//!    order the roles were registered, then filters them and derives the
//!    restrictions it advertises to its parent.
//!
//! The global path-id cursor is threaded through both recursion and role
//! pairs by value, so ids are unique across the whole tree.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, info};
use thiserror::Error;

use crate::algorithm::traits::{LinkId, NodeId, PathIdCursor};
use crate::config::CoordinatorConfig;
use crate::data_structures::graph::{CapacityGraph, CapacityLink, Topology, TopologyError};
use crate::decomposition::assignment::{SolvedAssignment, Vnf};
use crate::decomposition::decomposer::{DecompositionError, FlowDecomposer};
use crate::decomposition::workload::{ChildWorkload, RequestSet};
use crate::hierarchy::aggregation::PathAggregator;
use crate::hierarchy::description::{EdgeDescription, NetworkDescription, RestrictionDescription};
use crate::hierarchy::model::{Advertisement, InterDomainLink, Participation};
use crate::hierarchy::path_computer::{Level, PathComputer, PathError};
use crate::hierarchy::restrictions::RestrictionPropagator;

/// Hierarchy errors
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Decomposition(#[from] DecompositionError),

    #[error("Domain {0} was not built against a topology")]
    NotBuilt(String),

    #[error("Aggregate domain {0} has no children")]
    EmptyAggregate(String),

    #[error("Domain name {0} is used more than once")]
    DuplicateDomain(String),

    #[error("Node {node} belongs to both {first} and {second}")]
    OverlappingDomains {
        node: NodeId,
        first: String,
        second: String,
    },
}

/// Why a node is a border node of a domain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BorderRole {
    /// Request ingress anchor
    Ingress,
    /// Request egress anchor
    Egress,
    /// Endpoint of a link towards the named sibling domain
    Domain(String),
}

impl fmt::Display for BorderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => f.write_str("ingress"),
            Self::Egress => f.write_str("egress"),
            Self::Domain(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone)]
enum DomainKind {
    Leaf {
        nodes: BTreeSet<NodeId>,
        substrate: Option<Topology>,
    },
    Aggregate {
        children: Vec<Coordinator>,
        inter_links: Vec<InterDomainLink>,
    },
}

/// One domain of the hierarchy
#[derive(Debug, Clone)]
pub struct Coordinator {
    name: String,
    is_root: bool,
    kind: DomainKind,
    /// Roles in registration order; path computation follows this order
    border_roles: Vec<(BorderRole, BTreeSet<NodeId>)>,
    /// Paths and restrictions advertised by the children
    inherited: Advertisement,
    advertisement: Option<Advertisement>,
}

impl Coordinator {
    fn with_kind(name: String, kind: DomainKind) -> Self {
        Self {
            name,
            is_root: false,
            kind,
            border_roles: Vec::new(),
            inherited: Advertisement::default(),
            advertisement: None,
        }
    }

    pub fn leaf(name: impl Into<String>, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self::with_kind(
            name.into(),
            DomainKind::Leaf {
                nodes: nodes.into_iter().collect(),
                substrate: None,
            },
        )
    }

    pub fn aggregate(name: impl Into<String>, children: Vec<Coordinator>) -> Self {
        Self::with_kind(
            name.into(),
            DomainKind::Aggregate {
                children,
                inter_links: Vec::new(),
            },
        )
    }

    /// Mark this domain as the root of the hierarchy
    pub fn into_root(mut self) -> Self {
        self.is_root = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn level(&self) -> Level {
        match self.kind {
            DomainKind::Leaf { .. } => Level::Leaf,
            DomainKind::Aggregate { .. } => Level::Aggregate,
        }
    }

    pub fn children(&self) -> &[Coordinator] {
        match &self.kind {
            DomainKind::Leaf { .. } => &[],
            DomainKind::Aggregate { children, .. } => children.as_slice(),
        }
    }

    pub fn inter_links(&self) -> &[InterDomainLink] {
        match &self.kind {
            DomainKind::Leaf { .. } => &[],
            DomainKind::Aggregate { inter_links, .. } => inter_links.as_slice(),
        }
    }

    pub fn border_roles(&self) -> &[(BorderRole, BTreeSet<NodeId>)] {
        &self.border_roles
    }

    pub fn role_nodes(&self, role: &BorderRole) -> Option<&BTreeSet<NodeId>> {
        self.border_roles
            .iter()
            .find(|(r, _)| r == role)
            .map(|(_, nodes)| nodes)
    }

    /// Union of all role node sets
    pub fn border_nodes(&self) -> BTreeSet<NodeId> {
        self.border_roles
            .iter()
            .flat_map(|(_, nodes)| nodes.iter().copied())
            .collect()
    }

    pub fn inherited(&self) -> &Advertisement {
        &self.inherited
    }

    /// Result of this domain's own path computation, once run
    pub fn advertisement(&self) -> Option<&Advertisement> {
        self.advertisement.as_ref()
    }

    pub fn substrate_nodes(&self) -> BTreeSet<NodeId> {
        match &self.kind {
            DomainKind::Leaf { nodes, .. } => nodes.clone(),
            DomainKind::Aggregate { children, .. } => {
                children.iter().flat_map(Coordinator::substrate_nodes).collect()
            }
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        match &self.kind {
            DomainKind::Leaf { nodes, .. } => nodes.contains(&node),
            DomainKind::Aggregate { children, .. } => children.iter().any(|c| c.contains(node)),
        }
    }

    /// This domain or a descendant with the given name
    pub fn find(&self, name: &str) -> Option<&Coordinator> {
        if self.name == name {
            return Some(self);
        }
        self.children().iter().find_map(|c| c.find(name))
    }

    /// All descendants in pre-order, excluding `self`
    pub fn descendants(&self) -> Vec<&Coordinator> {
        let mut found = Vec::new();
        for child in self.children() {
            found.push(child);
            found.extend(child.descendants());
        }
        found
    }

    fn add_role(&mut self, role: BorderRole, node: NodeId) {
        match self.border_roles.iter_mut().find(|(r, _)| *r == role) {
            Some((_, nodes)) => {
                nodes.insert(node);
            }
            None => self.border_roles.push((role, BTreeSet::from([node]))),
        }
    }

    /// Register `node` under `role` here and in the child owning it
    pub fn set_border_node(&mut self, node: NodeId, role: BorderRole) {
        self.add_role(role.clone(), node);
        if let DomainKind::Aggregate { children, .. } = &mut self.kind {
            if let Some(child) = children.iter_mut().find(|c| c.contains(node)) {
                child.set_border_node(node, role);
            }
        }
    }

    fn check_names(&self) -> Result<(), HierarchyError> {
        let mut seen = BTreeSet::from([self.name.as_str()]);
        for domain in self.descendants() {
            if !seen.insert(domain.name.as_str()) {
                return Err(HierarchyError::DuplicateDomain(domain.name.clone()));
            }
        }
        Ok(())
    }

    /// Extract leaf subgraphs, discover inter-domain links, and assign
    /// border roles throughout the subtree
    pub fn build_hierarchy(
        &mut self,
        topology: &Topology,
        ingresses: &BTreeSet<NodeId>,
        egresses: &BTreeSet<NodeId>,
    ) -> Result<(), HierarchyError> {
        match &mut self.kind {
            DomainKind::Leaf { nodes, substrate } => {
                if let Some(&missing) = nodes.iter().find(|n| topology.node(**n).is_none()) {
                    return Err(TopologyError::UnknownNode(missing).into());
                }
                let subgraph = topology.induced(nodes);
                debug!(
                    "Leaf {} holds nodes {:?} and {} edges",
                    self.name,
                    nodes,
                    subgraph.edges().len()
                );
                *substrate = Some(subgraph);
            }
            DomainKind::Aggregate {
                children,
                inter_links,
            } => {
                if children.is_empty() {
                    return Err(HierarchyError::EmptyAggregate(self.name.clone()));
                }
                for child in children.iter_mut() {
                    child.build_hierarchy(topology, ingresses, egresses)?;
                }

                let node_sets: Vec<BTreeSet<NodeId>> =
                    children.iter().map(Coordinator::substrate_nodes).collect();
                let mut borders: Vec<(usize, NodeId, BorderRole)> = Vec::new();
                inter_links.clear();

                for i in 0..children.len() {
                    for j in (i + 1)..children.len() {
                        if let Some(&node) = node_sets[i].intersection(&node_sets[j]).next() {
                            return Err(HierarchyError::OverlappingDomains {
                                node,
                                first: children[i].name.clone(),
                                second: children[j].name.clone(),
                            });
                        }
                        let before = inter_links.len();
                        for &a in &node_sets[i] {
                            for &b in &node_sets[j] {
                                if let Some(edge) = topology.find_edge(a, b) {
                                    inter_links.push(InterDomainLink {
                                        id: edge.id,
                                        src: a,
                                        dst: b,
                                        rate: edge.max_rate,
                                        delay: edge.delay,
                                    });
                                    borders.push((i, a, BorderRole::Domain(children[j].name.clone())));
                                }
                                if let Some(edge) = topology.find_edge(b, a) {
                                    inter_links.push(InterDomainLink {
                                        id: edge.id,
                                        src: b,
                                        dst: a,
                                        rate: edge.max_rate,
                                        delay: edge.delay,
                                    });
                                    borders.push((j, b, BorderRole::Domain(children[i].name.clone())));
                                }
                            }
                        }
                        debug!(
                            "Domain {} found {} links between {} and {}",
                            self.name,
                            inter_links.len() - before,
                            children[i].name,
                            children[j].name
                        );
                    }
                }

                for (index, node, role) in borders {
                    children[index].set_border_node(node, role);
                }
            }
        }

        if self.level() == Level::Aggregate {
            self.check_names()?;
        }

        let contained = self.substrate_nodes();
        for &node in ingresses.intersection(&contained) {
            self.add_role(BorderRole::Ingress, node);
        }
        for &node in egresses.intersection(&contained) {
            self.add_role(BorderRole::Egress, node);
        }
        Ok(())
    }

    /// Capacity graph this domain computes its paths over
    fn capacity_graph(&self) -> Result<CapacityGraph, HierarchyError> {
        match &self.kind {
            DomainKind::Leaf { nodes, substrate } => substrate
                .as_ref()
                .map(|topology| CapacityGraph::from_topology(topology, nodes))
                .ok_or_else(|| HierarchyError::NotBuilt(self.name.clone())),
            DomainKind::Aggregate { inter_links, .. } => {
                let mut graph = CapacityGraph::new();
                for path in &self.inherited.paths {
                    graph.add_link(CapacityLink {
                        id: LinkId::Path(path.id),
                        src: path.src,
                        dst: path.dst,
                        max_rate: path.rate,
                        delay: path.delay,
                        cpu: path.cpu,
                    });
                }
                for link in inter_links {
                    graph.add_link(CapacityLink {
                        id: LinkId::Edge(link.id),
                        src: link.src,
                        dst: link.dst,
                        max_rate: link.rate,
                        delay: link.delay,
                        cpu: 0.0,
                    });
                }
                Ok(graph)
            }
        }
    }

    /// Compute the paths and restrictions of this subtree, children first.
    ///
    /// Returns what this domain advertises and the advanced cursor. The root
    /// computes its own paths as well; they are kept for validation only.
    /// Each domain derives its restrictions once, after all of its role pairs.
    pub fn compute_advertised_paths(
        &mut self,
        mut cursor: PathIdCursor,
        config: &CoordinatorConfig,
    ) -> Result<(Advertisement, PathIdCursor), HierarchyError> {
        if let DomainKind::Aggregate { children, .. } = &mut self.kind {
            self.inherited = Advertisement::default();
            for child in children.iter_mut() {
                let (advertised, next) = child.compute_advertised_paths(cursor, config)?;
                cursor = next;
                info!(
                    "Child domain {} returned {} paths, {} cpu and {} routing restrictions",
                    child.name,
                    advertised.paths.len(),
                    advertised.cpu_restrictions.len(),
                    advertised.routing_restrictions.len()
                );
                self.inherited.paths.extend(advertised.paths);
                self.inherited
                    .cpu_restrictions
                    .extend(advertised.cpu_restrictions);
                self.inherited
                    .routing_restrictions
                    .extend(advertised.routing_restrictions);
            }
        }
        self.advertise(cursor, config)
    }

    /// Paths of this domain alone, over what its children already advertised.
    ///
    /// Restrictions are derived once, after every role pair has been computed.
    fn advertise(
        &mut self,
        mut cursor: PathIdCursor,
        config: &CoordinatorConfig,
    ) -> Result<(Advertisement, PathIdCursor), HierarchyError> {
        let level = self.level();
        let mut graph = self.capacity_graph()?;
        let snapshot = graph.clone();
        let mut participation = Participation::default();
        let aggregator = PathAggregator::new(config.path_aggregation);
        let mut paths = Vec::new();

        // the capacity graph is shared, so pairs run in registration order
        for (i, (_, ingresses)) in self.border_roles.iter().enumerate() {
            for (_, egresses) in &self.border_roles[i + 1..] {
                let computer = PathComputer::new(
                    &self.name,
                    level,
                    &self.inherited.routing_restrictions,
                    config,
                );
                let (found, next) =
                    computer.compute(&mut graph, ingresses, egresses, &mut participation, cursor)?;
                cursor = next;
                paths.extend(aggregator.aggregate(found, &participation, &snapshot));
            }
        }

        let (cpu_restrictions, routing_restrictions) = RestrictionPropagator::new(&self.name, level)
            .propagate(
                &paths,
                &participation,
                &snapshot,
                &self.inherited.cpu_restrictions,
                &self.inherited.routing_restrictions,
            );
        let advertisement = Advertisement {
            paths,
            cpu_restrictions,
            routing_restrictions,
        };
        if self.is_root {
            debug!(
                "Root {} computed {} paths for validation",
                self.name,
                advertisement.paths.len()
            );
        }
        self.advertisement = Some(advertisement.clone());
        Ok((advertisement, cursor))
    }

    /// Network this domain exposes to the solver at its own level
    pub fn network_description(&self, topology: &Topology) -> NetworkDescription {
        let mut description = NetworkDescription::default();
        match &self.kind {
            DomainKind::Aggregate {
                children,
                inter_links,
            } => {
                for child in children {
                    let nodes = child
                        .border_nodes()
                        .into_iter()
                        .map(|n| topology.name(n))
                        .collect();
                    description.domain_nodes.insert(child.name.clone(), nodes);
                }
                for link in inter_links {
                    description.insert_link(link, topology);
                }
                for path in &self.inherited.paths {
                    description.insert_path(path, topology);
                }
            }
            DomainKind::Leaf { nodes, .. } => {
                // each substrate node acts as its own domain
                for &node in nodes {
                    let name = topology.name(node);
                    description.domain_nodes.insert(name.clone(), vec![name]);
                }
                for edge in topology
                    .edges()
                    .iter()
                    .filter(|e| nodes.contains(&e.src) && nodes.contains(&e.dst))
                {
                    description.inter_domain_edges.insert(
                        edge.id,
                        EdgeDescription {
                            src: topology.name(edge.src),
                            dst: topology.name(edge.dst),
                            max_rate: edge.max_rate,
                            delay: edge.delay,
                        },
                    );
                }
            }
        }
        description
    }

    /// Restrictions the children advertised to this domain
    pub fn restriction_description(&self) -> RestrictionDescription {
        RestrictionDescription::new(
            &self.inherited.cpu_restrictions,
            &self.inherited.routing_restrictions,
        )
    }

    /// Merge the solutions of this subtree into one in this domain's terms.
    ///
    /// `solutions` holds the solver output of each domain's own level by
    /// domain name and `workloads` what each child was asked to serve. Child
    /// solutions are collected recursively, mapped through the child's
    /// request origins and summed with this level's own solution. Only the
    /// root keeps the placement of request anchors.
    pub fn collect_solution(
        &self,
        solutions: &BTreeMap<String, SolvedAssignment>,
        workloads: &[ChildWorkload],
    ) -> SolvedAssignment {
        let Some(own) = solutions.get(&self.name) else {
            debug!("Domain {} has no solution to collect", self.name);
            return SolvedAssignment::new();
        };
        if self.level() == Level::Leaf {
            return own.clone();
        }

        let mut merged = SolvedAssignment::new();
        for child in self.children() {
            let collected = child.collect_solution(solutions, workloads);
            match workloads.iter().find(|w| w.domain == child.name) {
                Some(workload) => merged.merge(&workload.map_solution(&collected)),
                None => debug!("No workload was handed to {}", child.name),
            }
        }

        let mut own = own.clone();
        own.gamma
            .retain(|placement, _| self.is_root && matches!(placement.vnf, Vnf::Source | Vnf::Sink));
        merged.merge(&own);
        info!(
            "Domain {} collected {} inter-domain flows and {} placements",
            self.name,
            merged.lambda_inter.len(),
            merged.gamma.len()
        );
        merged
    }

    /// Split a solution of this domain's level into one workload per child.
    ///
    /// Each child decomposes its own working copy of `assignment`, since
    /// quantities on shared inter-domain edges are drained from both sides.
    pub fn decompose_solution(
        &self,
        topology: &Topology,
        assignment: &SolvedAssignment,
        requests: &RequestSet,
        config: &CoordinatorConfig,
    ) -> Result<Vec<ChildWorkload>, HierarchyError> {
        let description = self.network_description(topology);
        let mut workloads = Vec::with_capacity(self.children().len());
        for child in self.children() {
            let child_description = child.network_description(topology);
            let mut working = assignment.clone();
            let workload = FlowDecomposer::new(
                &description,
                &child.name,
                &child_description,
                requests,
                config.tolerance,
            )
            .decompose(&mut working)?;
            workloads.push(workload);
        }
        Ok(workloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::graph::max_flow::FlowError;
    use crate::algorithm::traits::{EdgeId, PathId};
    use crate::config::PathAggregation;
    use crate::decomposition::assignment::{ArcKey, FlowKey, Placement, VnfPlacement};
    use crate::decomposition::rate_function::RateFunction;
    use crate::decomposition::workload::{VnfDescriptor, VnfRequest};
    use crate::hierarchy::model::{IntraDomainPath, RoutingRestriction};
    use crate::validation::correctness::{verify_id_pairing, verify_restriction_membership};
    use approx::assert_abs_diff_eq;

    fn set(nodes: &[NodeId]) -> BTreeSet<NodeId> {
        nodes.iter().copied().collect()
    }

    fn forward_between<'a>(
        paths: &'a [IntraDomainPath],
        src: NodeId,
        dst: NodeId,
    ) -> &'a IntraDomainPath {
        paths
            .iter()
            .find(|p| p.src == src && p.dst == dst)
            .unwrap()
    }

    /// A - B in leaf `l1`, C in leaf `l2`, linked B - C
    fn chain_topology() -> (Topology, [NodeId; 3]) {
        let mut topology = Topology::new();
        let a = topology.add_node("A", 2.0).unwrap();
        let b = topology.add_node("B", 3.0).unwrap();
        let c = topology.add_node("C", 4.0).unwrap();
        topology.add_link_pair(EdgeId(0), a, b, 10.0, 1.0).unwrap();
        topology.add_link_pair(EdgeId(2), b, c, 8.0, 2.0).unwrap();
        (topology, [a, b, c])
    }

    fn chain_hierarchy(nodes: [NodeId; 3]) -> Coordinator {
        let [a, b, c] = nodes;
        Coordinator::aggregate(
            "root",
            vec![Coordinator::leaf("l1", [a, b]), Coordinator::leaf("l2", [c])],
        )
        .into_root()
    }

    #[test]
    fn test_single_leaf_root() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut topology = Topology::new();
        let a = topology.add_node("A", 3.0).unwrap();
        let b = topology.add_node("B", 5.0).unwrap();
        topology.add_link_pair(EdgeId(0), a, b, 10.0, 1.0).unwrap();

        let mut root = Coordinator::leaf("root", [a, b]).into_root();
        root.build_hierarchy(&topology, &set(&[a]), &set(&[b])).unwrap();
        let config = CoordinatorConfig::default().with_cutoff(5.0);
        let (advertisement, cursor) = root
            .compute_advertised_paths(PathIdCursor::new(0), &config)
            .unwrap();

        assert_eq!(cursor.peek(), 2);
        assert_eq!(advertisement.paths.len(), 2);
        let forward = &advertisement.paths[0];
        assert_eq!(forward.id.to_string(), "path_0");
        assert_eq!((forward.src, forward.dst), (a, b));
        assert_abs_diff_eq!(forward.rate, 5.0);
        assert_abs_diff_eq!(forward.cpu, 8.0);
        assert_eq!(advertisement.paths[1].id.to_string(), "path_1");
        assert_eq!(root.advertisement(), Some(&advertisement));
    }

    #[test]
    fn test_build_discovers_links_and_roles() {
        let (topology, [a, b, c]) = chain_topology();
        let mut root = chain_hierarchy([a, b, c]);
        root.build_hierarchy(&topology, &set(&[a]), &set(&[c])).unwrap();

        let ids: Vec<_> = root.inter_links().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![EdgeId(2), EdgeId(3)]);

        let l1 = root.find("l1").unwrap();
        let roles: Vec<_> = l1.border_roles().iter().map(|(r, _)| r.to_string()).collect();
        assert_eq!(roles, vec!["ingress", "l2"]);
        assert_eq!(l1.role_nodes(&BorderRole::Domain("l2".into())), Some(&set(&[b])));

        let l2 = root.find("l2").unwrap();
        assert_eq!(l2.role_nodes(&BorderRole::Egress), Some(&set(&[c])));
        assert_eq!(l2.role_nodes(&BorderRole::Domain("l1".into())), Some(&set(&[c])));

        assert_eq!(root.border_roles().len(), 2);
        assert_eq!(root.descendants().len(), 2);
        assert_eq!(root.substrate_nodes(), set(&[a, b, c]));
        assert!(root.contains(c));
    }

    #[test]
    fn test_border_roles_reach_nested_leaves() {
        let mut topology = Topology::new();
        let a = topology.add_node("A", 1.0).unwrap();
        let b = topology.add_node("B", 1.0).unwrap();
        let c = topology.add_node("C", 1.0).unwrap();
        topology.add_link_pair(EdgeId(0), a, b, 5.0, 1.0).unwrap();
        topology.add_link_pair(EdgeId(2), b, c, 5.0, 1.0).unwrap();

        let mid = Coordinator::aggregate(
            "mid",
            vec![Coordinator::leaf("l1", [a]), Coordinator::leaf("l2", [b])],
        );
        let mut root =
            Coordinator::aggregate("root", vec![mid, Coordinator::leaf("l3", [c])]).into_root();
        root.build_hierarchy(&topology, &BTreeSet::new(), &BTreeSet::new())
            .unwrap();

        let l3 = BorderRole::Domain("l3".into());
        assert_eq!(root.find("mid").unwrap().role_nodes(&l3), Some(&set(&[b])));
        let l2 = root.find("l2").unwrap();
        assert_eq!(l2.role_nodes(&l3), Some(&set(&[b])));
        assert_eq!(l2.role_nodes(&BorderRole::Domain("l1".into())), Some(&set(&[b])));
        assert_eq!(root.descendants().len(), 4);
    }

    #[test]
    fn test_shared_edge_yields_routing_restriction() {
        // leaf x: A - C, B - C, C - D with C - D capacity 15; leaf e: E linked to B
        let mut topology = Topology::new();
        let [a, b, c, d, e] = ["A", "B", "C", "D", "E"].map(|n| topology.add_node(n, 1.0).unwrap());
        topology.add_link_pair(EdgeId(0), a, c, 10.0, 1.0).unwrap();
        topology.add_link_pair(EdgeId(2), b, c, 10.0, 1.0).unwrap();
        topology.add_link_pair(EdgeId(4), c, d, 15.0, 1.0).unwrap();
        topology.add_link_pair(EdgeId(6), b, e, 10.0, 1.0).unwrap();

        let mut root = Coordinator::aggregate(
            "root",
            vec![
                Coordinator::leaf("x", [a, b, c, d]),
                Coordinator::leaf("e", [e]),
            ],
        )
        .into_root();
        root.build_hierarchy(&topology, &set(&[a]), &set(&[d])).unwrap();
        let (_, cursor) = root
            .compute_advertised_paths(PathIdCursor::new(0), &CoordinatorConfig::default())
            .unwrap();

        let x = root.find("x").unwrap();
        let advertised = x.advertisement().unwrap();
        assert_eq!(advertised.paths.len(), 6);
        let a_to_d = forward_between(&advertised.paths, a, d).id;
        let b_to_d = forward_between(&advertised.paths, b, d).id;
        let shared = advertised
            .routing_restrictions
            .iter()
            .find(|r| r.paths == vec![a_to_d.min(b_to_d), a_to_d.max(b_to_d)])
            .unwrap();
        assert_abs_diff_eq!(shared.shared_bottleneck, 15.0);
        assert_eq!(shared.domain, "x");

        verify_id_pairing(&advertised.paths).unwrap();
        verify_restriction_membership(
            &advertised.paths,
            &advertised.cpu_restrictions,
            &advertised.routing_restrictions,
        )
        .unwrap();

        // the root sees x's restrictions and computes A -> D over x's paths
        assert_eq!(
            root.restriction_description().routing_restrictions.len(),
            advertised.routing_restrictions.len()
        );
        let root_paths = &root.advertisement().unwrap().paths;
        assert_eq!(root_paths.len(), 2);
        assert_eq!(root_paths[0].id, PathId(6));
        assert_abs_diff_eq!(root_paths[0].rate, 10.0);
        assert_eq!(cursor.peek(), 8);
    }

    #[test]
    fn test_network_description_uses_node_names() {
        let (topology, nodes) = chain_topology();
        let mut root = chain_hierarchy(nodes);
        root.build_hierarchy(&topology, &set(&[nodes[0]]), &set(&[nodes[2]]))
            .unwrap();
        root.compute_advertised_paths(PathIdCursor::new(0), &CoordinatorConfig::default())
            .unwrap();

        let description = root.network_description(&topology);
        assert_eq!(description.domain_nodes["l1"], vec!["A".to_string(), "B".to_string()]);
        assert_eq!(description.domain_nodes["l2"], vec!["C".to_string()]);
        assert_eq!(description.inter_domain_edges[&EdgeId(2)].src, "B");
        let path = &description.intra_domain_paths[&PathId(0)];
        assert_eq!((path.src.as_str(), path.dst.as_str()), ("A", "B"));
        assert_eq!(path.domain, "l1");

        let leaf = root.find("l1").unwrap().network_description(&topology);
        assert_eq!(leaf.domain_nodes["A"], vec!["A".to_string()]);
        assert_eq!(leaf.inter_domain_edges.len(), 2);
        assert!(leaf.intra_domain_paths.is_empty());
    }

    fn fw() -> Vnf {
        Vnf::Function("fw".into())
    }

    /// request0 runs A -> fw -> C at rate 4
    fn chain_requests() -> RequestSet {
        let mut requests = RequestSet::default();
        requests
            .chains
            .insert("chain_0".into(), vec![(Vnf::Source, fw()), (fw(), Vnf::Sink)]);
        requests.vnf_descriptions.insert(
            "fw".into(),
            VnfDescriptor {
                outgoing_rate: RateFunction::Linear { factor: 0.5 },
                cpu_consumption: RateFunction::Identity,
            },
        );
        requests.requests.insert(
            "request0".into(),
            VnfRequest {
                chain: "chain_0".into(),
                ingress: "A".into(),
                ingress_domain: "l1".into(),
                egress: "C".into(),
                egress_domain: "l2".into(),
                initial_rate: 4.0,
            },
        );
        requests
    }

    fn chain_keys() -> (FlowKey, FlowKey) {
        (
            FlowKey::new(
                ArcKey::new("request0", Vnf::Source, fw()),
                Placement::Ingress("A".into()),
                Placement::Path(PathId(0)),
            ),
            FlowKey::new(
                ArcKey::new("request0", fw(), Vnf::Sink),
                Placement::Path(PathId(0)),
                Placement::Egress("C".into()),
            ),
        )
    }

    /// fw placed on path_0 halves the rate, which leaves l1 over edge_2
    fn chain_assignment() -> SolvedAssignment {
        let (first, second) = chain_keys();
        let mut assignment = SolvedAssignment::new();
        assignment.set_total(first, 4.0);
        assignment.set_total(second.clone(), 2.0);
        assignment.set_inter(second, EdgeId(2), 2.0);
        assignment.set_sigma(VnfPlacement::new("request0", fw(), Placement::Path(PathId(0))), 4.0, 2.0);
        assignment
    }

    #[test]
    fn test_decompose_solution_per_child() {
        let (topology, nodes) = chain_topology();
        let mut root = chain_hierarchy(nodes);
        root.build_hierarchy(&topology, &set(&[nodes[0]]), &set(&[nodes[2]]))
            .unwrap();
        let config = CoordinatorConfig::default();
        root.compute_advertised_paths(PathIdCursor::new(0), &config)
            .unwrap();

        let workloads = root
            .decompose_solution(&topology, &chain_assignment(), &chain_requests(), &config)
            .unwrap();
        assert_eq!(workloads.len(), 2);
        assert_eq!(workloads[0].domain, "l1");
        let request = &workloads[0].requests["request0-request0"];
        assert_eq!((request.ingress.as_str(), request.egress.as_str()), ("A", "B"));
        assert_eq!(
            (request.ingress_domain.as_str(), request.egress_domain.as_str()),
            ("A", "B")
        );
        assert_abs_diff_eq!(request.initial_rate, 4.0, epsilon = 1e-4);
        assert!(workloads[1].is_empty());
    }

    #[test]
    fn test_collect_solution_maps_child_flows_back() {
        let (topology, nodes) = chain_topology();
        let mut root = chain_hierarchy(nodes);
        root.build_hierarchy(&topology, &set(&[nodes[0]]), &set(&[nodes[2]]))
            .unwrap();
        let config = CoordinatorConfig::default();
        root.compute_advertised_paths(PathIdCursor::new(0), &config)
            .unwrap();

        let source = VnfPlacement::new("request0", Vnf::Source, Placement::Ingress("A".into()));
        let fw_on_path = VnfPlacement::new("request0", fw(), Placement::Path(PathId(0)));
        let mut assignment = chain_assignment();
        assignment.gamma.insert(source.clone(), 1.0);
        assignment.gamma.insert(fw_on_path.clone(), 1.0);
        let workloads = root
            .decompose_solution(&topology, &assignment, &chain_requests(), &config)
            .unwrap();

        // what the solver of l1 returns for request0-request0 (A -> B)
        let child_key = |from: Vnf, to: Vnf, at: Placement, until: Placement| {
            FlowKey::new(ArcKey::new("request0-request0", from, to), at, until)
        };
        let mut child = SolvedAssignment::new();
        let first = child_key(
            Vnf::Source,
            fw(),
            Placement::Ingress("A".into()),
            Placement::Path(PathId(0)),
        );
        let second = child_key(
            fw(),
            Vnf::Sink,
            Placement::Path(PathId(0)),
            Placement::Egress("B".into()),
        );
        child.set_total(first.clone(), 4.0);
        child.set_inter(first, EdgeId(0), 4.0);
        child.set_inter(second, EdgeId(0), 2.0);
        child.gamma.insert(
            VnfPlacement::new("request0-request0", Vnf::Source, Placement::Ingress("A".into())),
            1.0,
        );
        child.gamma.insert(
            VnfPlacement::new("request0-request0", fw(), Placement::Path(PathId(0))),
            1.0,
        );

        let solutions = BTreeMap::from([
            ("root".to_string(), assignment.clone()),
            ("l1".to_string(), child),
        ]);
        let collected = root.collect_solution(&solutions, &workloads);

        let (parent_first, parent_second) = chain_keys();
        assert_eq!(collected.inter(&parent_first, EdgeId(0)), 4.0);
        assert_eq!(collected.inter(&parent_second, EdgeId(2)), 2.0);
        let mapped_second = FlowKey::new(
            ArcKey::new("request0", fw(), Vnf::Sink),
            Placement::Path(PathId(0)),
            Placement::Egress("B".into()),
        );
        assert_eq!(collected.inter(&mapped_second, EdgeId(0)), 2.0);
        assert_eq!(collected.lambda_inter.len(), 3);

        // child totals stay local; the root's own quantities are kept
        assert_eq!(collected.lambda_total, assignment.lambda_total);
        assert_eq!(collected.sigma(&fw_on_path), (4.0, 2.0));

        // the root keeps its anchors; function placements come from l1
        assert_eq!(collected.gamma.len(), 2);
        assert_eq!(collected.gamma[&source], 1.0);
        assert_eq!(collected.gamma[&fw_on_path], 1.0);

        let mut inner = root.clone();
        inner.is_root = false;
        let collected = inner.collect_solution(&solutions, &workloads);
        assert!(!collected.gamma.contains_key(&source));
        assert_eq!(collected.gamma[&fw_on_path], 1.0);

        assert_eq!(
            root.collect_solution(&BTreeMap::new(), &workloads),
            SolvedAssignment::new()
        );
    }

    #[test]
    fn test_three_level_hierarchy_threads_ids() {
        // A - B in l1 and C in l2, both under mid; D in l3
        let mut topology = Topology::new();
        let [a, b, c, d] = ["A", "B", "C", "D"].map(|n| topology.add_node(n, 1.0).unwrap());
        topology.add_link_pair(EdgeId(0), a, b, 10.0, 1.0).unwrap();
        topology.add_link_pair(EdgeId(2), b, c, 8.0, 1.0).unwrap();
        topology.add_link_pair(EdgeId(4), c, d, 6.0, 1.0).unwrap();

        for policy in [
            PathAggregation::FullExpansion,
            PathAggregation::OnePath,
            PathAggregation::TwoPaths,
        ] {
            let mid = Coordinator::aggregate(
                "mid",
                vec![Coordinator::leaf("l1", [a, b]), Coordinator::leaf("l2", [c])],
            );
            let mut root =
                Coordinator::aggregate("root", vec![mid, Coordinator::leaf("l3", [d])]).into_root();
            root.build_hierarchy(&topology, &set(&[a]), &set(&[d])).unwrap();
            let config = CoordinatorConfig::default().with_aggregation(policy);
            let (_, cursor) = root
                .compute_advertised_paths(PathIdCursor::new(0), &config)
                .unwrap();
            assert_eq!(cursor.peek(), 6);

            let mut seen = BTreeSet::new();
            for name in ["l1", "l2", "mid", "l3", "root"] {
                let advertised = root.find(name).unwrap().advertisement().unwrap();
                verify_id_pairing(&advertised.paths).unwrap();
                verify_restriction_membership(
                    &advertised.paths,
                    &advertised.cpu_restrictions,
                    &advertised.routing_restrictions,
                )
                .unwrap();
                for path in &advertised.paths {
                    assert!(seen.insert(path.id));
                }
            }
            assert_eq!(seen, (0..6).map(PathId).collect());

            let mid = root.find("mid").unwrap().advertisement().unwrap();
            let a_to_c = forward_between(&mid.paths, a, c);
            assert_eq!(a_to_c.id, PathId(2));
            assert_abs_diff_eq!(a_to_c.rate, 8.0);
            assert_eq!(mid.cpu_restrictions[0].paths, vec![PathId(2), PathId(3)]);

            // l1's cpu restriction follows its paths up two levels
            let top = root.advertisement().unwrap();
            let a_to_d = forward_between(&top.paths, a, d);
            assert_eq!(a_to_d.id, PathId(4));
            assert_abs_diff_eq!(a_to_d.rate, 6.0);
            assert_eq!(top.cpu_restrictions.len(), 1);
            assert_eq!(top.cpu_restrictions[0].paths, vec![PathId(4), PathId(5)]);
            assert_eq!(top.cpu_restrictions[0].domain, "root");
        }
    }

    #[test]
    fn test_route_over_restricted_child_paths_is_fatal() {
        // A - B in l1, C - D in l2, linked B - C
        let mut topology = Topology::new();
        let [a, b, c, d] = ["A", "B", "C", "D"].map(|n| topology.add_node(n, 1.0).unwrap());
        topology.add_link_pair(EdgeId(0), a, b, 10.0, 1.0).unwrap();
        topology.add_link_pair(EdgeId(2), b, c, 10.0, 1.0).unwrap();
        topology.add_link_pair(EdgeId(4), c, d, 10.0, 1.0).unwrap();

        let mut root = Coordinator::aggregate(
            "root",
            vec![Coordinator::leaf("l1", [a, b]), Coordinator::leaf("l2", [c, d])],
        )
        .into_root();
        root.build_hierarchy(&topology, &set(&[a]), &set(&[d])).unwrap();
        let config = CoordinatorConfig::default();
        let (_, cursor) = root
            .compute_advertised_paths(PathIdCursor::new(0), &config)
            .unwrap();

        // the only root route A -> D crosses path_0 of l1 and path_3 of l2
        assert_eq!(forward_between(&root.inherited().paths, a, b).id, PathId(0));
        assert_eq!(forward_between(&root.inherited().paths, c, d).id, PathId(3));
        root.inherited.routing_restrictions.push(RoutingRestriction {
            id: "routing_restriction_shared".into(),
            domain: "l1".into(),
            paths: vec![PathId(0), PathId(3)],
            shared_bottleneck: 5.0,
        });

        match root.advertise(cursor, &config) {
            Err(HierarchyError::Path(PathError::Flow(err))) => assert_eq!(
                err,
                FlowError::RestrictionConflict {
                    restriction: "routing_restriction_shared".into(),
                    members: vec![PathId(0), PathId(3)],
                }
            ),
            other => panic!("expected a restriction conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_hierarchies() {
        let (topology, [a, b, c]) = chain_topology();

        let mut unknown = Coordinator::leaf("l", [NodeId(9)]);
        assert!(matches!(
            unknown.build_hierarchy(&topology, &BTreeSet::new(), &BTreeSet::new()),
            Err(HierarchyError::Topology(TopologyError::UnknownNode(NodeId(9))))
        ));

        let mut overlapping = Coordinator::aggregate(
            "root",
            vec![Coordinator::leaf("l1", [a, b]), Coordinator::leaf("l2", [b, c])],
        );
        assert!(matches!(
            overlapping.build_hierarchy(&topology, &BTreeSet::new(), &BTreeSet::new()),
            Err(HierarchyError::OverlappingDomains { .. })
        ));

        let mut duplicate = Coordinator::aggregate(
            "root",
            vec![Coordinator::leaf("l", [a]), Coordinator::leaf("l", [c])],
        );
        assert!(matches!(
            duplicate.build_hierarchy(&topology, &BTreeSet::new(), &BTreeSet::new()),
            Err(HierarchyError::DuplicateDomain(_))
        ));

        let mut empty = Coordinator::aggregate("root", Vec::new());
        assert!(matches!(
            empty.build_hierarchy(&topology, &BTreeSet::new(), &BTreeSet::new()),
            Err(HierarchyError::EmptyAggregate(_))
        ));

        let mut unbuilt = Coordinator::leaf("l", [a, b]);
        assert!(matches!(
            unbuilt.compute_advertised_paths(PathIdCursor::new(0), &CoordinatorConfig::default()),
            Err(HierarchyError::NotBuilt(_))
        ));
    }
}
