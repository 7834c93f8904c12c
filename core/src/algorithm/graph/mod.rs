//! Multigraph folding and bottleneck-aware maximum flow
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod folding;
pub mod max_flow;

pub use self::folding::{resolve_role_overlap, FlowNetworkFolder, FlowVertex, FoldedNetwork, ResidualEdge};
pub use self::max_flow::{AugmentedPath, AugmentingPathEngine, FlowError, SharedBottleneck};
