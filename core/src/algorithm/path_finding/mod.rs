//! Residual-network path search
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod bidirectional;

pub use self::bidirectional::{BidirectionalBfs, BidirectionalError, ResidualNetwork, SearchDirection, SearchRoute};
