//! Requests handed to one hierarchy level and synthesized for its children
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::decomposition::assignment::{ArcKey, FlowKey, SolvedAssignment, Vnf, VnfPlacement};
use crate::decomposition::decomposer::DecompositionError;
use crate::decomposition::rate_function::RateFunction;

/// Ordered hops of a VNF chain
pub type Chain = Vec<(Vnf, Vnf)>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VnfDescriptor {
    pub outgoing_rate: RateFunction,
    pub cpu_consumption: RateFunction,
}

/// One chain request between two anchor nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VnfRequest {
    pub chain: String,
    pub ingress: String,
    pub ingress_domain: String,
    pub egress: String,
    pub egress_domain: String,
    pub initial_rate: f64,
}

/// Chains, VNF descriptors, and requests one level was asked to serve
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSet {
    pub chains: BTreeMap<String, Chain>,
    pub vnf_descriptions: BTreeMap<String, VnfDescriptor>,
    pub requests: BTreeMap<String, VnfRequest>,
}

impl RequestSet {
    pub fn chain_of(&self, request: &str) -> Option<&Chain> {
        self.requests
            .get(request)
            .and_then(|r| self.chains.get(&r.chain))
    }

    /// Hop following `arc` in its request's chain
    pub fn next_arc(&self, arc: &ArcKey) -> Option<ArcKey> {
        self.chain_of(&arc.request)?
            .iter()
            .find(|(from, _)| *from == arc.to)
            .map(|(from, to)| ArcKey::new(arc.request.clone(), from.clone(), to.clone()))
    }

    pub fn descriptor(&self, vnf: &Vnf) -> Result<&VnfDescriptor, DecompositionError> {
        match vnf {
            Vnf::Function(name) => self
                .vnf_descriptions
                .get(name)
                .ok_or_else(|| DecompositionError::MissingDescriptor(name.clone())),
            other => Err(DecompositionError::MissingDescriptor(other.to_string())),
        }
    }
}

/// Parent request and stages a child request stands in for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOrigin {
    pub request: String,
    /// Parent stage behind the child's `SRC`
    pub from: Vnf,
    /// Parent stage behind the child's `DST`
    pub to: Vnf,
}

impl RequestOrigin {
    /// Hop of the child request expressed on the parent request
    pub fn map_arc(&self, arc: &ArcKey) -> ArcKey {
        let from = match &arc.from {
            Vnf::Source => self.from.clone(),
            stage => stage.clone(),
        };
        let to = match &arc.to {
            Vnf::Sink => self.to.clone(),
            stage => stage.clone(),
        };
        ArcKey::new(self.request.clone(), from, to)
    }
}

/// Requests synthesized for one child domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkload {
    pub domain: String,
    pub chains: BTreeMap<String, Chain>,
    pub vnf_descriptions: BTreeMap<String, VnfDescriptor>,
    pub requests: BTreeMap<String, VnfRequest>,
    pub origins: BTreeMap<String, RequestOrigin>,
}

impl ChildWorkload {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// Register `chain`, reusing an identical one, and copy its descriptors
    pub fn define_chain(
        &mut self,
        chain: Chain,
        parent: &RequestSet,
    ) -> Result<String, DecompositionError> {
        if let Some((id, _)) = self.chains.iter().find(|(_, c)| **c == chain) {
            return Ok(id.clone());
        }
        for vnf in chain.iter().flat_map(|(a, b)| [a, b]) {
            if let Vnf::Function(name) = vnf {
                if !self.vnf_descriptions.contains_key(name) {
                    let descriptor = parent.descriptor(vnf)?.clone();
                    self.vnf_descriptions.insert(name.clone(), descriptor);
                }
            }
        }
        let id = format!("chain_{}", self.chains.len());
        self.chains.insert(id.clone(), chain);
        Ok(id)
    }

    /// Add a request named after its parent request
    pub fn add_request(&mut self, parent: &str, request: VnfRequest, origin: (Vnf, Vnf)) -> String {
        let id = format!("{}-request{}", parent, self.requests.len());
        info!(
            "Domain {} receives {} from {} to {} at rate {}",
            self.domain, id, request.ingress, request.egress, request.initial_rate
        );
        self.requests.insert(id.clone(), request);
        let (from, to) = origin;
        self.origins.insert(
            id.clone(),
            RequestOrigin {
                request: parent.to_owned(),
                from,
                to,
            },
        );
        id
    }

    /// Rewrite the solution this child's level produced into the parent's terms.
    ///
    /// Only traffic on inter-domain edges and function placements carry
    /// over. Anchor placements of a child request are local to the child.
    /// Quantities landing on the same parent key are summed.
    pub fn map_solution(&self, solution: &SolvedAssignment) -> SolvedAssignment {
        let mut mapped = SolvedAssignment::new();
        for (key, edges) in &solution.lambda_inter {
            let Some(origin) = self.origins.get(&key.arc.request) else {
                warn!("Domain {} solved unknown request {}", self.domain, key.arc.request);
                continue;
            };
            let parent = FlowKey::new(origin.map_arc(&key.arc), key.from.clone(), key.to.clone());
            let carried = mapped.lambda_inter.entry(parent).or_default();
            for (edge, value) in edges {
                *carried.entry(*edge).or_default() += value;
            }
        }
        for (placement, value) in &solution.gamma {
            if matches!(placement.vnf, Vnf::Source | Vnf::Sink) {
                continue;
            }
            let Some(origin) = self.origins.get(&placement.request) else {
                warn!("Domain {} placed unknown request {}", self.domain, placement.request);
                continue;
            };
            let parent = VnfPlacement::new(
                origin.request.clone(),
                placement.vnf.clone(),
                placement.placement.clone(),
            );
            *mapped.gamma.entry(parent).or_default() += value;
        }
        debug!(
            "Domain {} maps {} inter-domain flows and {} placements upward",
            self.domain,
            mapped.lambda_inter.len(),
            mapped.gamma.len()
        );
        mapped
    }

    pub fn total_rate(&self) -> f64 {
        self.requests.values().map(|r| r.initial_rate).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
