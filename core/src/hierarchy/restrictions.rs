//! Capacity-sharing restrictions between advertised paths
//!
//! A leaf derives restrictions from the substrate: every node (or edge)
//! traversed by more than one advertised path makes those paths share its
//! CPU budget (or bandwidth). An aggregate never recomputes them; it rewrites
//! the restrictions its children advertised into its own path-id space, since
//! each child path became a link of the aggregate capacity graph.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::algorithm::traits::{LinkId, PathId};
use crate::data_structures::graph::CapacityGraph;
use crate::hierarchy::model::{CpuRestriction, IntraDomainPath, Participation, RoutingRestriction};
use crate::hierarchy::path_computer::Level;

/// Path groups in first-seen order, each with an accumulated amount
#[derive(Debug, Default)]
struct GroupTable {
    groups: Vec<(BTreeSet<PathId>, f64)>,
}

impl GroupTable {
    fn merge(&mut self, group: BTreeSet<PathId>, amount: f64, combine: fn(f64, f64) -> f64) {
        match self.groups.iter_mut().find(|(g, _)| *g == group) {
            Some((_, total)) => *total = combine(*total, amount),
            None => self.groups.push((group, amount)),
        }
    }
}

/// Builds or rewrites the restrictions one domain advertises
#[derive(Debug, Clone)]
pub struct RestrictionPropagator<'a> {
    domain: &'a str,
    level: Level,
}

impl<'a> RestrictionPropagator<'a> {
    pub fn new(domain: &'a str, level: Level) -> Self {
        Self { domain, level }
    }

    /// Restrictions for `advertised`, given the participation recorded while
    /// computing them and the capacity snapshot taken before any deduction.
    pub fn propagate(
        &self,
        advertised: &[IntraDomainPath],
        participation: &Participation,
        snapshot: &CapacityGraph,
        inherited_cpu: &[CpuRestriction],
        inherited_routing: &[RoutingRestriction],
    ) -> (Vec<CpuRestriction>, Vec<RoutingRestriction>) {
        let ids: BTreeSet<PathId> = advertised.iter().map(|p| p.id).collect();
        match self.level {
            Level::Leaf => (
                self.leaf_cpu(&ids, participation, snapshot),
                self.leaf_routing(&ids, participation, snapshot),
            ),
            Level::Aggregate => (
                inherited_cpu
                    .iter()
                    .filter_map(|r| {
                        let paths = self.rewrite(&r.id, &r.paths, &ids, participation)?;
                        Some(CpuRestriction {
                            id: r.id.clone(),
                            domain: self.domain.to_owned(),
                            paths,
                            shared_cpu: r.shared_cpu,
                        })
                    })
                    .collect(),
                inherited_routing
                    .iter()
                    .filter_map(|r| {
                        let paths = self.rewrite(&r.id, &r.paths, &ids, participation)?;
                        Some(RoutingRestriction {
                            id: r.id.clone(),
                            domain: self.domain.to_owned(),
                            paths,
                            shared_bottleneck: r.shared_bottleneck,
                        })
                    })
                    .collect(),
            ),
        }
    }

    fn leaf_cpu(
        &self,
        ids: &BTreeSet<PathId>,
        participation: &Participation,
        snapshot: &CapacityGraph,
    ) -> Vec<CpuRestriction> {
        let mut table = GroupTable::default();
        for (node, paths) in &participation.node_paths {
            let group: BTreeSet<PathId> = paths.iter().filter(|p| ids.contains(p)).copied().collect();
            if group.len() > 1 {
                // nodes inducing the same group pool their budget
                table.merge(group, snapshot.node_cpu(*node), |a, b| a + b);
            }
        }
        table
            .groups
            .into_iter()
            .enumerate()
            .map(|(n, (group, shared_cpu))| CpuRestriction {
                id: format!("cpu_restriction_{}_{}", self.domain, n),
                domain: self.domain.to_owned(),
                paths: group.into_iter().collect(),
                shared_cpu,
            })
            .collect()
    }

    fn leaf_routing(
        &self,
        ids: &BTreeSet<PathId>,
        participation: &Participation,
        snapshot: &CapacityGraph,
    ) -> Vec<RoutingRestriction> {
        let mut table = GroupTable::default();
        for (link, paths) in &participation.link_paths {
            let group: BTreeSet<PathId> = paths.iter().filter(|p| ids.contains(p)).copied().collect();
            if group.len() < 2 {
                continue;
            }
            match snapshot.capacity_of(*link) {
                Some(rate) => table.merge(group, rate, f64::min),
                None => debug!("Link {} missing from the capacity snapshot", link),
            }
        }
        table
            .groups
            .into_iter()
            .enumerate()
            .map(|(n, (group, shared_bottleneck))| RoutingRestriction {
                id: format!("routing_restriction_{}_{}", self.domain, n),
                domain: self.domain.to_owned(),
                paths: group.into_iter().collect(),
                shared_bottleneck,
            })
            .collect()
    }

    /// Map child path ids onto the advertised paths that traverse them
    fn rewrite(
        &self,
        restriction: &str,
        members: &[PathId],
        ids: &BTreeSet<PathId>,
        participation: &Participation,
    ) -> Option<Vec<PathId>> {
        let rewritten: BTreeSet<PathId> = members
            .iter()
            .filter_map(|m| participation.link_paths.get(&LinkId::Path(*m)))
            .flatten()
            .filter(|p| ids.contains(p))
            .copied()
            .collect();
        if rewritten.len() < 2 {
            warn!(
                "Dropping restriction {} in domain {}: {} member(s) left after rewrite",
                restriction,
                self.domain,
                rewritten.len()
            );
            return None;
        }
        debug!("Restriction {} rewritten to {:?}", restriction, rewritten);
        Some(rewritten.into_iter().collect())
    }
}
