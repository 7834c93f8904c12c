//! Correctness checks for hierarchy output
//!
//! Each check walks a finished result and reports the first violated
//! invariant. They are cheap enough to run after every domain computation
//! and after every solver round.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use thiserror::Error;

use crate::algorithm::traits::PathId;
use crate::decomposition::assignment::SolvedAssignment;
use crate::hierarchy::model::{CpuRestriction, IntraDomainPath, RoutingRestriction};

/// Invariant violations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Path {0} has no backward twin")]
    MissingTwin(PathId),

    #[error("Path {path} and its backward twin disagree on {field}")]
    TwinMismatch { path: PathId, field: &'static str },

    #[error("Restriction {0} has fewer than two distinct members")]
    DegenerateRestriction(String),

    #[error("Restriction {restriction} names unknown path {path}")]
    UnknownMember { restriction: String, path: PathId },

    #[error("Restriction {restriction} carries {load} over a shared bottleneck of {bottleneck}")]
    Overloaded {
        restriction: String,
        load: f64,
        bottleneck: f64,
    },
}

fn differs(a: f64, b: f64) -> bool {
    (a - b).abs() > f64::EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Every path has its twin, with swapped endpoints and equal attributes
pub fn verify_id_pairing(paths: &[IntraDomainPath]) -> Result<(), ValidationError> {
    let by_id: BTreeMap<PathId, &IntraDomainPath> = paths.iter().map(|p| (p.id, p)).collect();
    for path in paths {
        let twin = by_id
            .get(&path.id.backward())
            .ok_or(ValidationError::MissingTwin(path.id))?;
        let mismatch = |field| ValidationError::TwinMismatch {
            path: path.id,
            field,
        };
        if twin.src != path.dst || twin.dst != path.src {
            return Err(mismatch("endpoints"));
        }
        if differs(twin.cpu, path.cpu) {
            return Err(mismatch("cpu"));
        }
        if differs(twin.delay, path.delay) {
            return Err(mismatch("delay"));
        }
        if differs(twin.rate, path.rate) {
            return Err(mismatch("rate"));
        }
    }
    debug!("{} paths are correctly paired", paths.len());
    Ok(())
}

fn check_members(
    restriction: &str,
    members: &[PathId],
    known: &BTreeSet<PathId>,
) -> Result<(), ValidationError> {
    let distinct: BTreeSet<PathId> = members.iter().copied().collect();
    if distinct.len() < 2 {
        return Err(ValidationError::DegenerateRestriction(restriction.to_owned()));
    }
    match distinct.iter().find(|m| !known.contains(m)) {
        Some(&path) => Err(ValidationError::UnknownMember {
            restriction: restriction.to_owned(),
            path,
        }),
        None => Ok(()),
    }
}

/// Each restriction groups at least two advertised paths
pub fn verify_restriction_membership(
    paths: &[IntraDomainPath],
    cpu: &[CpuRestriction],
    routing: &[RoutingRestriction],
) -> Result<(), ValidationError> {
    let known: BTreeSet<PathId> = paths.iter().map(|p| p.id).collect();
    for restriction in cpu {
        check_members(&restriction.id, &restriction.paths, &known)?;
    }
    for restriction in routing {
        check_members(&restriction.id, &restriction.paths, &known)?;
    }
    Ok(())
}

/// Solved traffic on each restriction's members fits its shared bottleneck
pub fn verify_routing_load(
    assignment: &SolvedAssignment,
    routing: &[RoutingRestriction],
    tolerance: f64,
) -> Result<(), ValidationError> {
    for restriction in routing {
        let members: BTreeSet<PathId> = restriction.paths.iter().copied().collect();
        let load: f64 = members.iter().map(|p| assignment.path_load(*p)).sum();
        debug!(
            "Restriction {} carries {} of {}",
            restriction.id, load, restriction.shared_bottleneck
        );
        if load > restriction.shared_bottleneck + tolerance {
            return Err(ValidationError::Overloaded {
                restriction: restriction.id.clone(),
                load,
                bottleneck: restriction.shared_bottleneck,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::traits::NodeId;
    use crate::decomposition::assignment::{ArcKey, FlowKey, Placement, Vnf};

    fn pair(id: u64) -> [IntraDomainPath; 2] {
        let forward = IntraDomainPath {
            id: PathId(id),
            src: NodeId(0),
            dst: NodeId(1),
            domain: "d".into(),
            cpu: 4.0,
            delay: 2.0,
            rate: 5.0,
        };
        let backward = forward.twin();
        [forward, backward]
    }

    fn routing(paths: Vec<PathId>, bottleneck: f64) -> RoutingRestriction {
        RoutingRestriction {
            id: "routing_restriction_d_0".into(),
            domain: "d".into(),
            paths,
            shared_bottleneck: bottleneck,
        }
    }

    #[test]
    fn test_id_pairing() {
        let paths: Vec<_> = pair(0).into_iter().chain(pair(2)).collect();
        assert_eq!(verify_id_pairing(&paths), Ok(()));

        assert_eq!(
            verify_id_pairing(&paths[..3]),
            Err(ValidationError::MissingTwin(PathId(2)))
        );

        let mut skewed = paths.clone();
        skewed[1].rate = 3.0;
        assert_eq!(
            verify_id_pairing(&skewed),
            Err(ValidationError::TwinMismatch {
                path: PathId(0),
                field: "rate"
            })
        );
    }

    #[test]
    fn test_restriction_membership() {
        let paths: Vec<_> = pair(0).into_iter().chain(pair(2)).collect();
        let ok = routing(vec![PathId(0), PathId(2)], 5.0);
        assert_eq!(verify_restriction_membership(&paths, &[], &[ok]), Ok(()));

        let single = routing(vec![PathId(0), PathId(0)], 5.0);
        assert!(matches!(
            verify_restriction_membership(&paths, &[], &[single]),
            Err(ValidationError::DegenerateRestriction(_))
        ));

        let cpu = CpuRestriction {
            id: "cpu_restriction_d_0".into(),
            domain: "d".into(),
            paths: vec![PathId(1), PathId(7)],
            shared_cpu: 4.0,
        };
        assert_eq!(
            verify_restriction_membership(&paths, &[cpu], &[]),
            Err(ValidationError::UnknownMember {
                restriction: "cpu_restriction_d_0".into(),
                path: PathId(7)
            })
        );
    }

    #[test]
    fn test_routing_load() {
        let key = FlowKey::new(
            ArcKey::new("r0", Vnf::Source, Vnf::Sink),
            Placement::Ingress("A".into()),
            Placement::Egress("B".into()),
        );
        let mut assignment = SolvedAssignment::new();
        assignment.set_intra(key.clone(), PathId(0), 3.0);
        assignment.set_intra(key, PathId(2), 2.0);

        let restriction = routing(vec![PathId(0), PathId(2)], 5.0);
        assert_eq!(
            verify_routing_load(&assignment, std::slice::from_ref(&restriction), 1e-4),
            Ok(())
        );

        let tight = routing(vec![PathId(0), PathId(2)], 4.0);
        assert!(matches!(
            verify_routing_load(&assignment, &[tight], 1e-4),
            Err(ValidationError::Overloaded { .. })
        ));
    }
}
