//! Core identifier definitions for the domain hierarchy
//!
//! Nodes, physical edges and advertised intra-domain paths are addressed by
//! small newtype identifiers. Edges and paths come in forward/backward twins
//! whose identifiers are paired purely by parity: the backward twin of `n`
//! is `n + 1` when `n` is even and `n - 1` otherwise. Restriction lookups and
//! flow decomposition rely on this arithmetic, so no lookup table exists.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Node identifier ensuring type safety and preventing mixing with other numeric types
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Errors raised while parsing textual identifiers
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Identifier '{value}' does not start with '{prefix}_'")]
    MissingPrefix { value: String, prefix: &'static str },

    #[error("Identifier '{0}' has a non-numeric suffix")]
    InvalidNumber(String),
}

/// Parity pairing shared by every twinned identifier.
#[inline]
pub const fn backward_index(n: u64) -> u64 {
    if n % 2 == 0 {
        n + 1
    } else {
        n - 1
    }
}

fn parse_prefixed(value: &str, prefix: &'static str) -> Result<u64, IdError> {
    let suffix = value
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .ok_or_else(|| IdError::MissingPrefix {
            value: value.to_owned(),
            prefix,
        })?;
    suffix
        .parse::<u64>()
        .map_err(|_| IdError::InvalidNumber(value.to_owned()))
}

macro_rules! twinned_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
        pub struct $name(pub u64);

        impl $name {
            /// Identifier of the twin travelling the opposite direction
            #[inline]
            pub const fn backward(self) -> Self {
                Self(backward_index(self.0))
            }

            /// Whether this is the even (first-allocated) half of its pair
            #[inline]
            pub const fn is_forward(self) -> bool {
                self.0 % 2 == 0
            }

            #[inline]
            pub const fn index(self) -> u64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_prefixed(s, $prefix).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

twinned_id!(
    /// Identifier of an advertised intra-domain path
    PathId,
    "path"
);

twinned_id!(
    /// Identifier of a directed substrate or inter-domain edge
    EdgeId,
    "edge"
);

/// Identifier of a link in a domain's capacity graph.
///
/// Leaf domains route over substrate edges while aggregate domains route over
/// the paths their children advertised, joined by inter-domain edges.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum LinkId {
    Path(PathId),
    Edge(EdgeId),
}

impl LinkId {
    /// Backward twin within the same identifier family
    #[inline]
    pub const fn backward(self) -> Self {
        match self {
            Self::Path(p) => Self::Path(p.backward()),
            Self::Edge(e) => Self::Edge(e.backward()),
        }
    }

    pub fn as_path(self) -> Option<PathId> {
        match self {
            Self::Path(p) => Some(p),
            Self::Edge(_) => None,
        }
    }
}

impl Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => p.fmt(f),
            Self::Edge(e) => e.fmt(f),
        }
    }
}

impl From<PathId> for LinkId {
    fn from(value: PathId) -> Self {
        Self::Path(value)
    }
}

impl From<EdgeId> for LinkId {
    fn from(value: EdgeId) -> Self {
        Self::Edge(value)
    }
}

/// Monotonic cursor over the global path-id space.
///
/// The cursor is threaded by value through the domain recursion and handed
/// back updated, so sibling subtrees never share mutable counter state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathIdCursor(u64);

impl PathIdCursor {
    pub const fn new(start: u64) -> Self {
        // keep forward ids even so parity pairing holds
        Self(start + start % 2)
    }

    /// Allocate a forward id and its backward twin
    pub fn allocate_pair(&mut self) -> (PathId, PathId) {
        let forward = PathId(self.0);
        self.0 += 2;
        (forward, forward.backward())
    }

    pub const fn peek(self) -> u64 {
        self.0
    }
}
