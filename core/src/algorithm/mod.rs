//! DOMAINFLOW Algorithm Framework
//! Identifiers, residual search and max-flow used by the domain hierarchy
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod traits;
pub mod path_finding;
pub mod graph;

pub use self::traits::*;
pub use self::path_finding::*;
pub use self::graph::*;
