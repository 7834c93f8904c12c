//! Solved flow assignment returned by the external placement solver
//!
//! The solver reports its decision variables as named quantities. They are
//! stored here under typed keys; every setter and deduction clamps at zero so
//! a decomposition can never drive a quantity negative.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::algorithm::traits::{EdgeId, PathId};

/// Stage of a VNF chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vnf {
    Source,
    Sink,
    Function(String),
}

impl Vnf {
    pub fn is_sink(&self) -> bool {
        matches!(self, Self::Sink)
    }
}

impl Display for Vnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("SRC"),
            Self::Sink => f.write_str("DST"),
            Self::Function(name) => f.write_str(name),
        }
    }
}

impl FromStr for Vnf {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "SRC" => Self::Source,
            "DST" => Self::Sink,
            name => Self::Function(name.to_owned()),
        })
    }
}

impl Serialize for Vnf {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Vnf {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_else(|never: Infallible| match never {}))
    }
}

/// One hop of a request's chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArcKey {
    pub request: String,
    pub from: Vnf,
    pub to: Vnf,
}

impl ArcKey {
    pub fn new(request: impl Into<String>, from: Vnf, to: Vnf) -> Self {
        Self {
            request: request.into(),
            from,
            to,
        }
    }
}

impl Display for ArcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}->{}", self.request, self.from, self.to)
    }
}

/// Where the solver placed a VNF.
///
/// `Ingress`/`Egress` are the pseudo placements hosting `SRC` and `DST`
/// at a request's anchor node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placement {
    Path(PathId),
    Ingress(String),
    Egress(String),
}

impl Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(id) => write!(f, "{id}"),
            Self::Ingress(node) => write!(f, "ingress_{node}"),
            Self::Egress(node) => write!(f, "egress_{node}"),
        }
    }
}

/// Traffic of one chain hop between two placements
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    pub arc: ArcKey,
    /// Placement of `arc.from`
    pub from: Placement,
    /// Placement of `arc.to`
    pub to: Placement,
}

impl FlowKey {
    pub fn new(arc: ArcKey, from: Placement, to: Placement) -> Self {
        Self { arc, from, to }
    }
}

impl Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.arc, self.from, self.to)
    }
}

/// A VNF of one request on one placement
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VnfPlacement {
    pub request: String,
    pub vnf: Vnf,
    pub placement: Placement,
}

impl VnfPlacement {
    pub fn new(request: impl Into<String>, vnf: Vnf, placement: Placement) -> Self {
        Self {
            request: request.into(),
            vnf,
            placement,
        }
    }
}

/// Named solver quantities under typed keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolvedAssignment {
    /// `lambda_total[arc, p, p']`
    pub lambda_total: BTreeMap<FlowKey, f64>,
    /// `lambda_inter[arc, p, p', edge]`
    pub lambda_inter: BTreeMap<FlowKey, BTreeMap<EdgeId, f64>>,
    /// `lambda_intra[arc, p, p', path]`
    pub lambda_intra: BTreeMap<FlowKey, BTreeMap<PathId, f64>>,
    pub sigma_in: BTreeMap<VnfPlacement, f64>,
    pub sigma_out: BTreeMap<VnfPlacement, f64>,
    /// 0/1 placement indicator
    pub gamma: BTreeMap<VnfPlacement, f64>,
}

fn accumulate<K: Ord + Clone>(into: &mut BTreeMap<K, f64>, from: &BTreeMap<K, f64>) {
    for (key, value) in from {
        *into.entry(key.clone()).or_default() += value;
    }
}

impl SolvedAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self, key: &FlowKey) -> f64 {
        self.lambda_total.get(key).copied().unwrap_or(0.0)
    }

    pub fn set_total(&mut self, key: FlowKey, value: f64) {
        self.lambda_total.insert(key, value.max(0.0));
    }

    pub fn deduct_total(&mut self, key: &FlowKey, amount: f64) {
        if let Some(value) = self.lambda_total.get_mut(key) {
            *value = (*value - amount).max(0.0);
        }
    }

    pub fn inter(&self, key: &FlowKey, edge: EdgeId) -> f64 {
        self.lambda_inter
            .get(key)
            .and_then(|edges| edges.get(&edge))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set_inter(&mut self, key: FlowKey, edge: EdgeId, value: f64) {
        self.lambda_inter
            .entry(key)
            .or_default()
            .insert(edge, value.max(0.0));
    }

    pub fn deduct_inter(&mut self, key: &FlowKey, edge: EdgeId, amount: f64) {
        if let Some(value) = self.lambda_inter.get_mut(key).and_then(|e| e.get_mut(&edge)) {
            *value = (*value - amount).max(0.0);
        }
    }

    pub fn intra(&self, key: &FlowKey, path: PathId) -> f64 {
        self.lambda_intra
            .get(key)
            .and_then(|paths| paths.get(&path))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set_intra(&mut self, key: FlowKey, path: PathId, value: f64) {
        self.lambda_intra
            .entry(key)
            .or_default()
            .insert(path, value.max(0.0));
    }

    pub fn deduct_intra(&mut self, key: &FlowKey, path: PathId, amount: f64) {
        if let Some(value) = self.lambda_intra.get_mut(key).and_then(|p| p.get_mut(&path)) {
            *value = (*value - amount).max(0.0);
        }
    }

    pub fn set_sigma(&mut self, key: VnfPlacement, sigma_in: f64, sigma_out: f64) {
        self.sigma_in.insert(key.clone(), sigma_in.max(0.0));
        self.sigma_out.insert(key, sigma_out.max(0.0));
    }

    pub fn sigma(&self, key: &VnfPlacement) -> (f64, f64) {
        (
            self.sigma_in.get(key).copied().unwrap_or(0.0),
            self.sigma_out.get(key).copied().unwrap_or(0.0),
        )
    }

    /// Add every quantity of `other` onto this assignment
    pub fn merge(&mut self, other: &SolvedAssignment) {
        accumulate(&mut self.lambda_total, &other.lambda_total);
        for (key, edges) in &other.lambda_inter {
            accumulate(self.lambda_inter.entry(key.clone()).or_default(), edges);
        }
        for (key, paths) in &other.lambda_intra {
            accumulate(self.lambda_intra.entry(key.clone()).or_default(), paths);
        }
        accumulate(&mut self.sigma_in, &other.sigma_in);
        accumulate(&mut self.sigma_out, &other.sigma_out);
        accumulate(&mut self.gamma, &other.gamma);
    }

    /// Total routed over `path` for every hop and placement pair
    pub fn path_load(&self, path: PathId) -> f64 {
        self.lambda_intra
            .values()
            .filter_map(|paths| paths.get(&path))
            .sum()
    }
}
