//! Path computation for one border-role pair
//!
//! Wraps folding and augmentation in an outer loop. At aggregate levels,
//! saturating one parallel link can expose a previously skipped parallel link
//! as the new best orientation, so the multigraph is re-folded and max-flow
//! re-run until a round yields no augmenting path. Leaf substrates carry no
//! duplicate logical edges and run a single round.
//!
//! Every augmenting route becomes a forward `IntraDomainPath` plus its
//! backward twin, with consecutive ids drawn from the global cursor.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::BTreeSet;

use log::{debug, info, warn};
use thiserror::Error;

use crate::algorithm::graph::folding::{FlowNetworkFolder, FlowVertex, FoldedNetwork};
use crate::algorithm::graph::max_flow::{AugmentedPath, AugmentingPathEngine, FlowError};
use crate::algorithm::traits::{LinkId, NodeId, PathId, PathIdCursor};
use crate::config::CoordinatorConfig;
use crate::data_structures::graph::CapacityGraph;
use crate::hierarchy::model::{IntraDomainPath, Participation, RoutingRestriction};

/// Path computation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PathError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("Augmenting route crosses vertex {0} which is not a domain node")]
    UnknownVertex(usize),

    #[error("Residual edge {0} vanished while recording a path")]
    MissingEdge(usize),
}

/// Hierarchy level of the domain being computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Physical substrate partition
    Leaf,
    /// Union of child domains
    Aggregate,
}

impl Level {
    pub const fn is_leaf(self) -> bool {
        matches!(self, Self::Leaf)
    }
}

/// Computes the elementary paths between two border-node sets
#[derive(Debug, Clone)]
pub struct PathComputer<'a> {
    domain: &'a str,
    level: Level,
    restrictions: &'a [RoutingRestriction],
    config: &'a CoordinatorConfig,
}

impl<'a> PathComputer<'a> {
    pub fn new(
        domain: &'a str,
        level: Level,
        restrictions: &'a [RoutingRestriction],
        config: &'a CoordinatorConfig,
    ) -> Self {
        Self {
            domain,
            level,
            restrictions,
            config,
        }
    }

    /// Compute paths from `ingresses` to `egresses`.
    ///
    /// At aggregate level `graph` is charged with every consumed rate, so the
    /// next role pair of the same domain sees the reduced capacity.
    pub fn compute(
        &self,
        graph: &mut CapacityGraph,
        ingresses: &BTreeSet<NodeId>,
        egresses: &BTreeSet<NodeId>,
        participation: &mut Participation,
        mut cursor: PathIdCursor,
    ) -> Result<(Vec<IntraDomainPath>, PathIdCursor), PathError> {
        info!(
            "Domain {} computing paths between {:?} and {:?}",
            self.domain, ingresses, egresses
        );
        let restrictions: &[RoutingRestriction] = match self.level {
            Level::Leaf => &[],
            Level::Aggregate => self.restrictions,
        };
        let epsilon = self.config.capacity_epsilon;

        let mut folder = FlowNetworkFolder::new(epsilon);
        let mut paths = Vec::new();
        let mut pushed = 0.0;
        let mut round = 0;

        loop {
            if round == self.config.max_fold_rounds {
                warn!(
                    "Domain {} stopped after {} fold rounds with capacity left",
                    self.domain, round
                );
                break;
            }
            round += 1;

            let remaining = self.config.flow_cutoff.map(|c| (c - pushed).max(0.0));
            if remaining.is_some_and(|r| r <= epsilon) {
                break;
            }

            let mut network = folder.fold(graph, ingresses, egresses);
            let engine = AugmentingPathEngine::new(restrictions).with_cutoff(remaining);
            let (value, augmented) = engine.run(&mut network)?;
            debug!(
                "Round {} of domain {} pushed {} over {} routes",
                round,
                self.domain,
                value,
                augmented.len()
            );
            pushed += value;

            for path in &augmented {
                if let Some(found) = self.record(path, &network, graph, participation, &mut cursor)? {
                    paths.extend(found);
                }
            }

            if self.level.is_leaf() || augmented.is_empty() {
                break;
            }
        }

        Ok((paths, cursor))
    }

    fn node_at(network: &FoldedNetwork, vertex: usize) -> Result<NodeId, PathError> {
        match network.vertex(vertex) {
            Some(FlowVertex::Node(node)) => Ok(node),
            _ => Err(PathError::UnknownVertex(vertex)),
        }
    }

    /// Turn one augmenting route into a forward/backward path pair
    fn record(
        &self,
        path: &AugmentedPath,
        network: &FoldedNetwork,
        graph: &mut CapacityGraph,
        participation: &mut Participation,
        cursor: &mut PathIdCursor,
    ) -> Result<Option<[IntraDomainPath; 2]>, PathError> {
        let vertices = &path.route.vertices;
        let edges = &path.route.edges;
        if edges.len() < 3 {
            warn!("Skipping route {:?} without interior hops", vertices);
            return Ok(None);
        }

        let (forward, backward) = cursor.allocate_pair();
        let mut cpu = 0.0;
        let mut delay = 0.0;
        let mut used = Vec::with_capacity(edges.len() - 2);

        // strip the super-ingress and super-egress hops
        for (i, &e) in edges.iter().enumerate().take(edges.len() - 1).skip(1) {
            let u = Self::node_at(network, vertices[i])?;
            let v = Self::node_at(network, vertices[i + 1])?;
            let link = network
                .edge(e)
                .and_then(|edge| edge.link)
                .ok_or(PathError::MissingEdge(e))?;
            let oriented = path.used_links[i - 1];
            let id = match self.level {
                Level::Leaf => graph
                    .links()
                    .iter()
                    .find(|l| l.src == u && l.dst == v)
                    .map_or(oriented, |l| l.id),
                Level::Aggregate => oriented,
            };

            delay += link.delay;
            cpu += match self.level {
                Level::Leaf => graph.node_cpu(u),
                Level::Aggregate => link.cpu,
            };
            participation.record_link(id, forward);
            participation.record_link(id.backward(), backward);
            participation.record_node(u, forward, backward);
            used.push(id);
        }

        let src = Self::node_at(network, vertices[1])?;
        let dst = Self::node_at(network, vertices[vertices.len() - 2])?;
        participation.record_node(dst, forward, backward);
        if self.level.is_leaf() {
            cpu += graph.node_cpu(dst);
        } else {
            self.charge(graph, &used, path.flow);
        }
        debug!("Path {} of domain {} uses links {:?}", forward, self.domain, used);

        let forward_path = IntraDomainPath {
            id: forward,
            src,
            dst,
            domain: self.domain.to_owned(),
            cpu,
            delay,
            rate: path.flow,
        };
        let backward_path = forward_path.twin();
        Ok(Some([forward_path, backward_path]))
    }

    /// Deduct a consumed rate from the used links, their twins, and every
    /// restriction peer of a used path
    fn charge(&self, graph: &mut CapacityGraph, used: &[LinkId], rate: f64) {
        let touched: BTreeSet<PathId> = used
            .iter()
            .flat_map(|id| [*id, id.backward()])
            .filter_map(LinkId::as_path)
            .collect();

        for restriction in self.restrictions {
            if !restriction.paths.iter().any(|p| touched.contains(p)) {
                continue;
            }
            for peer in restriction.paths.iter().filter(|p| !touched.contains(p)) {
                if graph.deduct(LinkId::Path(*peer), rate) {
                    debug!(
                        "Restriction {} charged peer {} with {}",
                        restriction.id, peer, rate
                    );
                }
            }
        }

        for id in used {
            graph.deduct(*id, rate);
            graph.deduct(id.backward(), rate);
        }
    }
}
