//! DOMAINFLOW Core
//!
//! Hierarchical path aggregation for nested network domains. Leaf domains
//! own a partition of the substrate topology; aggregate domains own their
//! children and the links between them. Each domain condenses its internal
//! routing into a small set of advertised intra-domain paths, computed with a
//! bottleneck-aware Edmonds-Karp over a folded residual network, together
//! with the CPU and routing restrictions those paths share. A parent solves
//! placement over the advertised view, and the solution is decomposed back
//! into per-child requests.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod algorithm;
pub mod config;
pub mod data_structures;
pub mod decomposition;
pub mod hierarchy;
pub mod validation;

pub use crate::algorithm::traits::{EdgeId, LinkId, NodeId, PathId, PathIdCursor};
pub use crate::config::{ConfigError, CoordinatorConfig, PathAggregation};
pub use crate::data_structures::graph::{CapacityGraph, Topology, TopologyError};
pub use crate::decomposition::{ChildWorkload, DecompositionError, RequestSet, SolvedAssignment};
pub use crate::hierarchy::{Advertisement, BorderRole, Coordinator, HierarchyError};
pub use crate::validation::ValidationError;
