//! Graph containers shared by the path computation pipeline
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod graph;

pub use self::graph::{CapacityGraph, CapacityLink, SubstrateEdge, SubstrateNode, Topology, TopologyError};
