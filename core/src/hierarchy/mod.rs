//! Domain hierarchy: per-domain path computation, filtering and restriction
//! propagation, coordinated over a tree of nested domains
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod aggregation;
pub mod description;
pub mod domain;
pub mod model;
pub mod path_computer;
pub mod restrictions;

pub use self::aggregation::PathAggregator;
pub use self::description::{
    CpuRestrictionDescription, DomainLookup, EdgeDescription, NetworkDescription, PathDescription,
    RestrictionDescription, RoutingRestrictionDescription,
};
pub use self::domain::{BorderRole, Coordinator, HierarchyError};
pub use self::model::{
    Advertisement, CpuRestriction, InterDomainLink, IntraDomainPath, Participation,
    RoutingRestriction,
};
pub use self::path_computer::{Level, PathComputer, PathError};
pub use self::restrictions::RestrictionPropagator;
