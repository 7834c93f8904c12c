//! Bottleneck-Aware Edmonds-Karp Maximum Flow
//!
//! Classic Edmonds-Karp over a folded residual network: shortest augmenting
//! routes are found by bidirectional breadth-first search and saturated one
//! at a time until none remains or a flow cutoff is reached.
//!
//! At aggregate domain levels the residual edges stand for paths a child
//! domain advertised, and a child may have declared that several of those
//! paths share one physical bottleneck. Every augmented route is therefore
//! translated back into the directed path ids it crosses, and:
//!
//! 1. a route drawing on more than one member of the same shared-bottleneck
//!    group is rejected as a modelling inconsistency;
//! 2. the pushed flow is deducted from the residual capacity of every other
//!    member of each group the route touched, clamped at zero.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::BTreeSet;

use log::{debug, warn};
use thiserror::Error;

use crate::algorithm::graph::folding::{FoldedNetwork, SUPER_EGRESS, SUPER_INGRESS};
use crate::algorithm::path_finding::bidirectional::{
    BidirectionalBfs, BidirectionalError, ResidualNetwork, SearchRoute,
};
use crate::algorithm::traits::{LinkId, PathId};

/// Flow capacity type
pub type Capacity = f64;

/// Flow value type
pub type Flow = f64;

/// Max-flow errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    #[error("Invalid endpoint: vertex {0} is not part of the network")]
    InvalidEndpoint(usize),

    #[error("Source and sink are the same vertex: {0}")]
    IdenticalEndpoints(usize),

    #[error("Infinite capacity path, flow unbounded above")]
    Unbounded,

    #[error("Augmenting path uses {members:?} of routing restriction {restriction} simultaneously")]
    RestrictionConflict {
        restriction: String,
        members: Vec<PathId>,
    },
}

impl From<BidirectionalError> for FlowError {
    fn from(err: BidirectionalError) -> Self {
        match err {
            BidirectionalError::VertexOutOfRange { vertex, .. } => FlowError::InvalidEndpoint(vertex),
            BidirectionalError::SameEndpoints(v) => FlowError::IdenticalEndpoints(v),
        }
    }
}

/// A group of advertised paths sharing one bandwidth bottleneck
pub trait SharedBottleneck {
    fn identifier(&self) -> &str;
    fn members(&self) -> &[PathId];
}

/// One augmentation performed by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedPath {
    pub route: SearchRoute,
    pub flow: Flow,
    /// Link ids crossed, oriented in travel direction, super edges excluded
    pub used_links: Vec<LinkId>,
}

/// Bottleneck-aware Edmonds-Karp engine
#[derive(Debug, Clone)]
pub struct AugmentingPathEngine<'a, R: SharedBottleneck> {
    restrictions: &'a [R],
    cutoff: Option<Flow>,
}

impl<'a, R: SharedBottleneck> AugmentingPathEngine<'a, R> {
    pub fn new(restrictions: &'a [R]) -> Self {
        Self {
            restrictions,
            cutoff: None,
        }
    }

    /// Stop once this much flow has been pushed
    pub fn with_cutoff(mut self, cutoff: Option<Flow>) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Run from the super-ingress to the super-egress
    pub fn run(&self, network: &mut FoldedNetwork) -> Result<(Flow, Vec<AugmentedPath>), FlowError> {
        self.run_between(network, SUPER_INGRESS, SUPER_EGRESS)
    }

    /// Run between two arbitrary vertices of the folded network
    pub fn run_between(
        &self,
        network: &mut FoldedNetwork,
        source: usize,
        sink: usize,
    ) -> Result<(Flow, Vec<AugmentedPath>), FlowError> {
        let count = network.vertex_count();
        for vertex in [source, sink] {
            if vertex >= count {
                return Err(FlowError::InvalidEndpoint(vertex));
            }
        }
        if source == sink {
            return Err(FlowError::IdenticalEndpoints(source));
        }

        let epsilon = network.epsilon();
        let bfs = BidirectionalBfs::new();
        let mut flow_value: Flow = 0.0;
        let mut paths = Vec::new();

        loop {
            let remaining = self.cutoff.map(|c| c - flow_value);
            if remaining.is_some_and(|r| r <= epsilon) {
                break;
            }
            let Some(route) = bfs.find(&*network, source, sink)? else {
                break;
            };

            let mut flow = Self::bottleneck(network, &route);
            if let Some(r) = remaining {
                flow = flow.min(r);
            }
            if !flow.is_finite() {
                return Err(FlowError::Unbounded);
            }
            if flow <= epsilon {
                warn!("Augmenting route {:?} carries no usable flow", route.vertices);
                break;
            }

            let used_links = Self::translate(network, &route);
            self.check_conflicts(&used_links)?;

            for (i, &e) in route.edges.iter().enumerate() {
                if let Some(edge) = network.edge_mut(e) {
                    edge.push_from(route.vertices[i], flow);
                }
            }
            self.propagate_bottlenecks(network, &used_links, flow);

            debug!(
                "Augmented route {:?} over links {:?} with flow {}",
                route.vertices, used_links, flow
            );
            flow_value += flow;
            paths.push(AugmentedPath {
                route,
                flow,
                used_links,
            });
        }

        Ok((flow_value, paths))
    }

    fn bottleneck(network: &FoldedNetwork, route: &SearchRoute) -> Capacity {
        route
            .edges
            .iter()
            .enumerate()
            .filter_map(|(i, &e)| network.edge(e).map(|edge| edge.residual_from(route.vertices[i])))
            .fold(f64::INFINITY, f64::min)
    }

    /// Link ids crossed by `route`, substituting the backward twin when an
    /// edge is travelled against its folded orientation
    fn translate(network: &FoldedNetwork, route: &SearchRoute) -> Vec<LinkId> {
        route
            .edges
            .iter()
            .enumerate()
            .filter_map(|(i, &e)| {
                let edge = network.edge(e)?;
                let link = edge.link?;
                Some(if edge.is_aligned(route.vertices[i]) {
                    link.id
                } else {
                    link.id.backward()
                })
            })
            .collect()
    }

    fn used_paths(used_links: &[LinkId]) -> BTreeSet<PathId> {
        used_links.iter().filter_map(|l| l.as_path()).collect()
    }

    fn check_conflicts(&self, used_links: &[LinkId]) -> Result<(), FlowError> {
        let used = Self::used_paths(used_links);
        for restriction in self.restrictions {
            let hits: BTreeSet<PathId> = restriction
                .members()
                .iter()
                .filter(|m| used.contains(m))
                .copied()
                .collect();
            if hits.len() > 1 {
                warn!(
                    "Route over {:?} uses {:?} which share routing restriction {}",
                    used,
                    hits,
                    restriction.identifier()
                );
                return Err(FlowError::RestrictionConflict {
                    restriction: restriction.identifier().to_owned(),
                    members: hits.into_iter().collect(),
                });
            }
        }
        Ok(())
    }

    fn propagate_bottlenecks(&self, network: &mut FoldedNetwork, used_links: &[LinkId], flow: Flow) {
        let used = Self::used_paths(used_links);
        for restriction in self.restrictions {
            if !restriction.members().iter().any(|m| used.contains(m)) {
                continue;
            }
            for &peer in restriction.members() {
                if used.contains(&peer) {
                    continue;
                }
                for edge in network.edges_mut() {
                    let Some(link) = edge.link else { continue };
                    if link.id == LinkId::Path(peer) {
                        edge.cap_forward = (edge.cap_forward - flow).max(0.0);
                    } else if link.id == LinkId::Path(peer.backward()) {
                        edge.cap_backward = (edge.cap_backward - flow).max(0.0);
                    } else {
                        continue;
                    }
                    debug!(
                        "Peer {} of restriction {} charged with {}",
                        peer,
                        restriction.identifier(),
                        flow
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::graph::folding::FlowNetworkFolder;
    use crate::algorithm::traits::{EdgeId, NodeId};
    use crate::data_structures::graph::{CapacityGraph, CapacityLink};
    use approx::assert_abs_diff_eq;

    struct Group {
        id: String,
        members: Vec<PathId>,
    }

    impl SharedBottleneck for Group {
        fn identifier(&self) -> &str {
            &self.id
        }

        fn members(&self) -> &[PathId] {
            &self.members
        }
    }

    fn add(graph: &mut CapacityGraph, id: LinkId, src: usize, dst: usize, rate: f64) {
        graph.add_link(CapacityLink {
            id,
            src: NodeId(src),
            dst: NodeId(dst),
            max_rate: rate,
            delay: 1.0,
            cpu: 0.0,
        });
    }

    fn nodes(ids: &[usize]) -> BTreeSet<NodeId> {
        ids.iter().map(|&n| NodeId(n)).collect()
    }

    #[test]
    fn test_max_flow_on_diamond() {
        let mut graph = CapacityGraph::new();
        add(&mut graph, LinkId::Edge(EdgeId(0)), 0, 1, 4.0);
        add(&mut graph, LinkId::Edge(EdgeId(2)), 0, 2, 3.0);
        add(&mut graph, LinkId::Edge(EdgeId(4)), 1, 3, 2.0);
        add(&mut graph, LinkId::Edge(EdgeId(6)), 2, 3, 5.0);
        let mut network = FlowNetworkFolder::new(1e-9).fold(&graph, &nodes(&[0]), &nodes(&[3]));

        let engine = AugmentingPathEngine::<Group>::new(&[]);
        let (value, paths) = engine.run(&mut network).unwrap();
        assert_abs_diff_eq!(value, 5.0, epsilon = 1e-9);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].used_links.len(), 2);
    }

    #[test]
    fn test_cutoff_bounds_flow() {
        let mut graph = CapacityGraph::new();
        add(&mut graph, LinkId::Edge(EdgeId(0)), 0, 1, 10.0);
        let mut network = FlowNetworkFolder::new(1e-9).fold(&graph, &nodes(&[0]), &nodes(&[1]));
        let engine = AugmentingPathEngine::<Group>::new(&[]).with_cutoff(Some(5.0));
        let (value, paths) = engine.run(&mut network).unwrap();
        assert_abs_diff_eq!(value, 5.0);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].used_links, vec![LinkId::Edge(EdgeId(0))]);
    }

    #[test]
    fn test_reverse_traversal_reports_backward_twin() {
        let mut graph = CapacityGraph::new();
        add(&mut graph, LinkId::Path(PathId(4)), 1, 0, 3.0);
        let mut network = FlowNetworkFolder::new(1e-9).fold(&graph, &nodes(&[0]), &nodes(&[1]));
        let (_, paths) = AugmentingPathEngine::<Group>::new(&[]).run(&mut network).unwrap();
        assert_eq!(paths[0].used_links, vec![LinkId::Path(PathId(5))]);
    }

    #[test]
    fn test_shared_bottleneck_conflict_is_fatal() {
        // X(0) -path_0-> M(1) -path_2-> Y(2), both paths in one group
        let mut graph = CapacityGraph::new();
        add(&mut graph, LinkId::Path(PathId(0)), 0, 1, 10.0);
        add(&mut graph, LinkId::Path(PathId(2)), 1, 2, 10.0);
        let restrictions = vec![Group {
            id: "routing_restriction_d_0".into(),
            members: vec![PathId(0), PathId(2)],
        }];
        let mut network = FlowNetworkFolder::new(1e-9).fold(&graph, &nodes(&[0]), &nodes(&[2]));
        let err = AugmentingPathEngine::new(&restrictions).run(&mut network).unwrap_err();
        assert_eq!(
            err,
            FlowError::RestrictionConflict {
                restriction: "routing_restriction_d_0".into(),
                members: vec![PathId(0), PathId(2)],
            }
        );
    }

    #[test]
    fn test_bottleneck_deduction_limits_peers() {
        // X(0) -path_0-> Y(2) directly and X -path_2-> Z(1) -edge_0-> Y
        let mut graph = CapacityGraph::new();
        add(&mut graph, LinkId::Path(PathId(0)), 0, 2, 10.0);
        add(&mut graph, LinkId::Path(PathId(2)), 0, 1, 10.0);
        add(&mut graph, LinkId::Edge(EdgeId(0)), 1, 2, 10.0);
        let restrictions = vec![Group {
            id: "shared".into(),
            members: vec![PathId(0), PathId(2)],
        }];
        let mut network = FlowNetworkFolder::new(1e-9).fold(&graph, &nodes(&[0]), &nodes(&[2]));
        let (value, paths) = AugmentingPathEngine::new(&restrictions).run(&mut network).unwrap();
        assert_abs_diff_eq!(value, 10.0);
        assert_eq!(paths.len(), 1);

        let unrestricted: Vec<Group> = Vec::new();
        let mut network = FlowNetworkFolder::new(1e-9).fold(&graph, &nodes(&[0]), &nodes(&[2]));
        let (value, _) = AugmentingPathEngine::new(&unrestricted).run(&mut network).unwrap();
        assert_abs_diff_eq!(value, 20.0);
    }

    #[test]
    fn test_invalid_endpoints_rejected() {
        let graph = CapacityGraph::new();
        let mut network = FlowNetworkFolder::new(1e-9).fold(&graph, &BTreeSet::new(), &BTreeSet::new());
        let engine = AugmentingPathEngine::<Group>::new(&[]);
        assert_eq!(
            engine.run_between(&mut network, 0, 0),
            Err(FlowError::IdenticalEndpoints(0))
        );
        assert_eq!(
            engine.run_between(&mut network, 0, 7),
            Err(FlowError::InvalidEndpoint(7))
        );
    }
}
