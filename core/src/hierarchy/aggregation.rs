//! Advertised path selection
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::BTreeSet;

use log::debug;

use crate::algorithm::traits::{NodeId, PathId};
use crate::config::PathAggregation;
use crate::data_structures::graph::CapacityGraph;
use crate::hierarchy::model::{IntraDomainPath, Participation};

/// Selects the subset of discovered paths a domain advertises
#[derive(Debug, Clone, Copy)]
pub struct PathAggregator {
    policy: PathAggregation,
}

impl PathAggregator {
    pub fn new(policy: PathAggregation) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PathAggregation {
        self.policy
    }

    /// Filter `paths`, keeping discovery order.
    ///
    /// `snapshot` is the capacity graph as it was before any role pair
    /// charged it; shared-link caps under `two_paths` read from it.
    pub fn aggregate(
        &self,
        paths: Vec<IntraDomainPath>,
        participation: &Participation,
        snapshot: &CapacityGraph,
    ) -> Vec<IntraDomainPath> {
        let keep = match self.policy {
            PathAggregation::FullExpansion => return paths,
            PathAggregation::OnePath => Self::one_path(&paths),
            PathAggregation::TwoPaths => Self::two_paths(&paths, participation, snapshot),
        };
        debug!(
            "Aggregation {} keeps {} of {} paths",
            self.policy,
            keep.len(),
            paths.len()
        );
        paths.into_iter().filter(|p| keep.contains(&p.id)).collect()
    }

    /// Paths in the same direction as `(src, dst)`, in discovery order
    fn candidates(paths: &[IntraDomainPath], src: NodeId, dst: NodeId) -> Vec<&IntraDomainPath> {
        paths.iter().filter(|p| p.src == src && p.dst == dst).collect()
    }

    fn one_path(paths: &[IntraDomainPath]) -> BTreeSet<PathId> {
        let mut conducted: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();
        let mut keep = BTreeSet::new();
        for path in paths {
            let pair = (path.src.min(path.dst), path.src.max(path.dst));
            if !conducted.insert(pair) {
                continue;
            }
            let mut best = path;
            for candidate in Self::candidates(paths, path.src, path.dst) {
                if candidate.rate > best.rate {
                    best = candidate;
                }
            }
            keep.extend([best.id, best.id.backward()]);
        }
        keep
    }

    fn two_paths(
        paths: &[IntraDomainPath],
        participation: &Participation,
        snapshot: &CapacityGraph,
    ) -> BTreeSet<PathId> {
        let mut conducted: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();
        let mut keep = BTreeSet::new();
        for path in paths {
            let pair = (path.src.min(path.dst), path.src.max(path.dst));
            if !conducted.insert(pair) {
                continue;
            }
            let candidates = Self::candidates(paths, path.src, path.dst);
            if candidates.len() < 2 {
                keep.extend([path.id, path.id.backward()]);
                continue;
            }

            let mut best: Option<(f64, PathId, PathId)> = None;
            for (i, a) in candidates.iter().enumerate() {
                for b in &candidates[i + 1..] {
                    let combined = participation
                        .shared_links(a.id, b.id)
                        .into_iter()
                        .filter_map(|link| snapshot.capacity_of(link))
                        .fold(a.rate + b.rate, f64::min);
                    if best.map_or(true, |(rate, _, _)| combined > rate) {
                        best = Some((combined, a.id, b.id));
                    }
                }
            }
            if let Some((rate, a, b)) = best {
                debug!("Pair {} and {} carry {} combined", a, b, rate);
                keep.extend([a, a.backward(), b, b.backward()]);
            }
        }
        keep
    }
}
