//! Decomposition of solved assignments into child-domain requests
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod assignment;
pub mod decomposer;
pub mod rate_function;
pub mod workload;

pub use self::assignment::{ArcKey, FlowKey, Placement, SolvedAssignment, Vnf, VnfPlacement};
pub use self::decomposer::{DecompositionError, FlowDecomposer, Walk};
pub use self::rate_function::RateFunction;
pub use self::workload::{
    Chain, ChildWorkload, RequestOrigin, RequestSet, VnfDescriptor, VnfRequest,
};
