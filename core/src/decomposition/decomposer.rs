//! Flow decomposition into child-domain requests
//!
//! Walks a solved assignment depth-first from every border node of one child
//! domain. A walk follows one unit of traffic until it leaves the child over
//! an inter-domain edge or reaches its sink. Intra-domain paths route it to
//! another border node; a VNF placement transforms its rate and continues
//! along the next hop of the chain. Every terminating walk becomes one
//! request for the child.
//!
//! The walk runs on an explicit frame stack. Visited border nodes are kept
//! per chain hop; routing out of a node already visited for the same hop
//! closes a cycle, which is cancelled in place by removing its smallest
//! `lambda_intra` before the walk resumes from the node.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use log::{debug, info};
use thiserror::Error;

use crate::algorithm::traits::{EdgeId, PathId};
use crate::decomposition::assignment::{ArcKey, FlowKey, Placement, SolvedAssignment, Vnf, VnfPlacement};
use crate::decomposition::workload::{Chain, ChildWorkload, RequestSet, VnfRequest};
use crate::hierarchy::description::{DomainLookup, NetworkDescription, PathDescription};

/// Decomposition errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecompositionError {
    #[error("Walk for {arc} stalled at border node {border}")]
    Stalled { border: String, arc: String },

    #[error("Chain of request {request} has no hop after {vnf}")]
    MissingArc { request: String, vnf: String },

    #[error("No VNF descriptor for {0}")]
    MissingDescriptor(String),

    #[error("Path {0} is not part of the network description")]
    UnknownPath(PathId),

    #[error("Node {0} belongs to no domain of the child description")]
    UnknownDomain(String),

    #[error("Rate function of {0} cannot be inverted")]
    NotInvertible(String),

    #[error("Decomposition at border node {border} made no progress")]
    NoProgress { border: String },
}

/// Position of a walk
#[derive(Debug, Clone)]
struct Cursor {
    border: String,
    key: FlowKey,
    rate: f64,
    /// The previous step chained a placement on the path starting here
    on_path: bool,
}

#[derive(Debug)]
enum Frame {
    Routed {
        key: FlowKey,
        path: PathId,
        entry_rate: f64,
    },
    Placed {
        key: FlowKey,
        next_arc: ArcKey,
    },
}

/// Border nodes visited for one chain hop, with the frame depth at arrival
type Segment = Vec<(String, usize)>;

/// A terminated walk
#[derive(Debug, Clone, PartialEq)]
pub struct Walk {
    pub rate: f64,
    pub sink: String,
    /// Hops placed inside the child after the first one
    pub chain: Chain,
}

/// Decomposes one child's share of a solved assignment
#[derive(Debug, Clone)]
pub struct FlowDecomposer<'a> {
    description: &'a NetworkDescription,
    child: &'a str,
    child_description: &'a NetworkDescription,
    requests: &'a RequestSet,
    tolerance: f64,
}

impl<'a> FlowDecomposer<'a> {
    /// `description` is the level the assignment was solved on and
    /// `child_description` the child's own, used to resolve request domains.
    pub fn new(
        description: &'a NetworkDescription,
        child: &'a str,
        child_description: &'a NetworkDescription,
        requests: &'a RequestSet,
        tolerance: f64,
    ) -> Self {
        Self {
            description,
            child,
            child_description,
            requests,
            tolerance,
        }
    }

    fn nonzero(&self, value: f64) -> bool {
        value.abs() >= self.tolerance
    }

    /// Drain every quantity entering the child, consuming it from `assignment`
    pub fn decompose(
        &self,
        assignment: &mut SolvedAssignment,
    ) -> Result<ChildWorkload, DecompositionError> {
        let mut workload = ChildWorkload::new(self.child);
        let mut borders = self.description.border_nodes(self.child).to_vec();
        borders.sort();
        borders.dedup();

        for border in &borders {
            self.drain_ingress(assignment, border, &mut workload)?;
            self.drain_inter(assignment, border, &mut workload)?;
        }
        info!(
            "Domain {} receives {} requests carrying {}",
            self.child,
            workload.requests.len(),
            workload.total_rate()
        );
        Ok(workload)
    }

    /// Requests anchored at `border` whose first hop leaves the ingress
    fn drain_ingress(
        &self,
        assignment: &mut SolvedAssignment,
        border: &str,
        workload: &mut ChildWorkload,
    ) -> Result<(), DecompositionError> {
        let anchor = Placement::Ingress(border.to_owned());
        for (id, request) in &self.requests.requests {
            if request.ingress != border || request.ingress_domain != self.child {
                continue;
            }
            let keys: Vec<FlowKey> = assignment
                .lambda_total
                .keys()
                .filter(|k| k.arc.request == *id && k.arc.from == Vnf::Source && k.from == anchor)
                .cloned()
                .collect();
            for key in keys {
                while self.nonzero(assignment.total(&key)) {
                    let cursor = Cursor {
                        border: border.to_owned(),
                        key: key.clone(),
                        rate: assignment.total(&key),
                        on_path: false,
                    };
                    let walk = self.walk(assignment, cursor)?;
                    self.emit(workload, border, &key.arc, walk)?;
                }
            }
        }
        Ok(())
    }

    /// Traffic arriving at `border` over inter-domain edges
    fn drain_inter(
        &self,
        assignment: &mut SolvedAssignment,
        border: &str,
        workload: &mut ChildWorkload,
    ) -> Result<(), DecompositionError> {
        let edges: Vec<EdgeId> = self
            .description
            .inter_domain_edges
            .iter()
            .filter(|(_, e)| e.dst == border)
            .map(|(id, _)| *id)
            .collect();
        let sources: Vec<(FlowKey, EdgeId)> = assignment
            .lambda_inter
            .iter()
            .flat_map(|(key, carried)| {
                edges
                    .iter()
                    .filter(move |e| carried.contains_key(*e))
                    .map(move |e| (key.clone(), *e))
            })
            .collect();

        for (key, edge) in sources {
            while self.nonzero(assignment.inter(&key, edge)) && self.enters_at(assignment, &key, border)? {
                let cursor = Cursor {
                    border: border.to_owned(),
                    key: key.clone(),
                    rate: assignment.inter(&key, edge),
                    on_path: false,
                };
                let walk = self.walk(assignment, cursor)?;
                assignment.deduct_inter(&key, edge, walk.rate);
                self.emit(workload, border, &key.arc, walk)?;
            }
        }
        Ok(())
    }

    /// Whether traffic of `key` arriving at `border` is handled by the child
    fn enters_at(
        &self,
        assignment: &SolvedAssignment,
        key: &FlowKey,
        border: &str,
    ) -> Result<bool, DecompositionError> {
        if self.starts_at(&key.to, border)? {
            return Ok(true);
        }
        Ok(self
            .description
            .intra_domain_paths
            .iter()
            .filter(|(_, p)| p.domain == self.child && p.src == border)
            .any(|(id, _)| self.nonzero(assignment.intra(key, *id))))
    }

    fn walk(
        &self,
        assignment: &mut SolvedAssignment,
        mut cursor: Cursor,
    ) -> Result<Walk, DecompositionError> {
        let mut frames: Vec<Frame> = Vec::new();
        let mut segments: Vec<Segment> = vec![Vec::new()];
        let mut revisit = Self::arrive(&mut segments, &cursor.border, 0);

        let (mut rate, sink) = loop {
            if let Some((edge, carried)) = self.outgoing_edge(assignment, &cursor) {
                let out = cursor.rate.min(carried);
                debug!("Edge {} carries {} of {} out of {}", edge, out, cursor.key, cursor.border);
                assignment.deduct_inter(&cursor.key, edge, out);
                self.settle(assignment, &cursor.key, segments.last(), out)?;
                break (out, cursor.border);
            }

            if self.starts_at(&cursor.key.to, &cursor.border)? {
                if cursor.key.arc.to.is_sink() {
                    debug!("Sink of {} reached at {}", cursor.key, cursor.border);
                    self.settle(assignment, &cursor.key, segments.last(), cursor.rate)?;
                    break (cursor.rate, cursor.border);
                }
                if self.nonzero(assignment.total(&cursor.key)) {
                    cursor = self.place(assignment, cursor, &mut frames)?;
                    segments.push(Vec::new());
                    revisit = Self::arrive(&mut segments, &cursor.border, frames.len());
                    continue;
                }
            }

            if !cursor.on_path {
                if let Some((path, carried)) = self.outgoing_path(assignment, &cursor) {
                    if let Some(first) = revisit.take() {
                        if let Some(segment) = segments.last_mut() {
                            cursor = self.cancel_cycle(assignment, cursor, first, &mut frames, segment);
                        }
                        continue;
                    }
                    let next = self.path(path)?.dst.clone();
                    debug!(
                        "Path {} routes {} of {} from {} to {}",
                        path,
                        cursor.rate.min(carried),
                        cursor.key,
                        cursor.border,
                        next
                    );
                    frames.push(Frame::Routed {
                        key: cursor.key.clone(),
                        path,
                        entry_rate: cursor.rate,
                    });
                    cursor.rate = cursor.rate.min(carried);
                    cursor.border = next;
                    revisit = Self::arrive(&mut segments, &cursor.border, frames.len());
                    continue;
                }
            }

            return Err(DecompositionError::Stalled {
                border: cursor.border,
                arc: cursor.key.arc.to_string(),
            });
        };

        let mut chain = Chain::new();
        while let Some(frame) = frames.pop() {
            match frame {
                Frame::Routed { key, path, .. } => assignment.deduct_intra(&key, path, rate),
                Frame::Placed { key, next_arc } => {
                    chain.insert(0, (next_arc.from, next_arc.to));
                    let in_rate = self.in_rate(assignment, &key, rate)?;
                    segments.pop();
                    self.settle(assignment, &key, segments.last(), in_rate)?;
                    rate = in_rate;
                }
            }
        }
        Ok(Walk { rate, sink, chain })
    }

    /// Record arrival at `border`, returning the index of an earlier visit
    fn arrive(segments: &mut [Segment], border: &str, depth: usize) -> Option<usize> {
        let segment = segments.last_mut()?;
        let first = segment.iter().position(|(node, _)| node == border);
        segment.push((border.to_owned(), depth));
        first
    }

    /// Remove the cycle closed at the node visited at `first` and rewind to it
    fn cancel_cycle(
        &self,
        assignment: &mut SolvedAssignment,
        mut cursor: Cursor,
        first: usize,
        frames: &mut Vec<Frame>,
        segment: &mut Segment,
    ) -> Cursor {
        let depth = segment[first].1;
        let cycle: Vec<PathId> = frames[depth..]
            .iter()
            .filter_map(|frame| match frame {
                Frame::Routed { path, .. } => Some(*path),
                Frame::Placed { .. } => None,
            })
            .collect();
        let amount = cycle
            .iter()
            .map(|p| assignment.intra(&cursor.key, *p))
            .fold(f64::INFINITY, f64::min);
        if let Some(Frame::Routed { entry_rate, .. }) = frames.get(depth) {
            cursor.rate = *entry_rate;
        }
        for path in &cycle {
            assignment.deduct_intra(&cursor.key, *path, amount);
        }
        debug!(
            "Cancelled cycle {:?} through {} by {}",
            cycle, cursor.border, amount
        );
        frames.truncate(depth);
        segment.truncate(first + 1);
        cursor
    }

    /// Place `cursor.key.arc.to` on the path starting here and move to the next hop
    fn place(
        &self,
        assignment: &SolvedAssignment,
        cursor: Cursor,
        frames: &mut Vec<Frame>,
    ) -> Result<Cursor, DecompositionError> {
        let arc = &cursor.key.arc;
        let next_arc = self
            .requests
            .next_arc(arc)
            .ok_or_else(|| DecompositionError::MissingArc {
                request: arc.request.clone(),
                vnf: arc.to.to_string(),
            })?;
        let (next_to, carried) = assignment
            .lambda_total
            .iter()
            .find(|(k, v)| k.arc == next_arc && k.from == cursor.key.to && self.nonzero(**v))
            .map(|(k, v)| (k.to.clone(), *v))
            .ok_or_else(|| DecompositionError::Stalled {
                border: cursor.border.clone(),
                arc: next_arc.to_string(),
            })?;

        let descriptor = self.requests.descriptor(&arc.to)?;
        let rate = descriptor.outgoing_rate.apply(cursor.rate).min(carried);
        let chained = next_to == cursor.key.to;
        let border = if chained {
            cursor.border.clone()
        } else {
            self.exit_node(&cursor.key.to)?.to_owned()
        };
        debug!(
            "{} placed on {} at {}; {} continues with {} from {}",
            arc.to, cursor.key.to, cursor.border, next_arc, rate, border
        );

        frames.push(Frame::Placed {
            key: cursor.key.clone(),
            next_arc: next_arc.clone(),
        });
        Ok(Cursor {
            border,
            key: FlowKey::new(next_arc, cursor.key.to, next_to),
            rate,
            on_path: chained,
        })
    }

    /// Incoming rate of the VNF placed by `key` given the rate it emitted
    fn in_rate(
        &self,
        assignment: &SolvedAssignment,
        key: &FlowKey,
        out: f64,
    ) -> Result<f64, DecompositionError> {
        let vnf = &key.arc.to;
        let placement = VnfPlacement::new(key.arc.request.clone(), vnf.clone(), key.to.clone());
        let (sigma_in, sigma_out) = assignment.sigma(&placement);
        if self.nonzero(sigma_out) {
            return Ok(sigma_in * out / sigma_out);
        }
        self.requests
            .descriptor(vnf)?
            .outgoing_rate
            .invert(out)
            .ok_or_else(|| DecompositionError::NotInvertible(vnf.to_string()))
    }

    /// Deduct `amount` from `lambda_total[key]` when the hop started in `segment`
    fn settle(
        &self,
        assignment: &mut SolvedAssignment,
        key: &FlowKey,
        segment: Option<&Segment>,
        amount: f64,
    ) -> Result<(), DecompositionError> {
        let start = self.exit_node(&key.from)?;
        if segment.is_some_and(|s| s.iter().any(|(node, _)| node == start)) {
            assignment.deduct_total(key, amount);
        }
        Ok(())
    }

    fn outgoing_edge(&self, assignment: &SolvedAssignment, cursor: &Cursor) -> Option<(EdgeId, f64)> {
        assignment
            .lambda_inter
            .get(&cursor.key)?
            .iter()
            .find(|(id, v)| {
                self.nonzero(**v)
                    && self
                        .description
                        .edge(**id)
                        .is_some_and(|e| e.src == cursor.border)
            })
            .map(|(id, v)| (*id, *v))
    }

    fn outgoing_path(&self, assignment: &SolvedAssignment, cursor: &Cursor) -> Option<(PathId, f64)> {
        assignment
            .lambda_intra
            .get(&cursor.key)?
            .iter()
            .find(|(id, v)| {
                self.nonzero(**v)
                    && self
                        .description
                        .path(**id)
                        .is_some_and(|p| p.domain == self.child && p.src == cursor.border)
            })
            .map(|(id, v)| (*id, *v))
    }

    fn path(&self, id: PathId) -> Result<&PathDescription, DecompositionError> {
        self.description
            .path(id)
            .ok_or(DecompositionError::UnknownPath(id))
    }

    /// Whether `placement` begins at `border`
    fn starts_at(&self, placement: &Placement, border: &str) -> Result<bool, DecompositionError> {
        Ok(match placement {
            Placement::Path(id) => self.path(*id)?.src == border,
            Placement::Egress(node) => node == border,
            Placement::Ingress(_) => false,
        })
    }

    /// Node where traffic leaves `placement`
    fn exit_node<'p>(&'p self, placement: &'p Placement) -> Result<&'p str, DecompositionError> {
        match placement {
            Placement::Path(id) => Ok(&self.path(*id)?.dst),
            Placement::Ingress(node) | Placement::Egress(node) => Ok(node),
        }
    }

    fn domain_of(&self, node: &str) -> Result<String, DecompositionError> {
        self.child_description
            .domain_of(node)
            .map(str::to_owned)
            .ok_or_else(|| DecompositionError::UnknownDomain(node.to_owned()))
    }

    /// Turn a walk started at `border` for `arc` into a child request
    fn emit(
        &self,
        workload: &mut ChildWorkload,
        border: &str,
        arc: &ArcKey,
        walk: Walk,
    ) -> Result<(), DecompositionError> {
        if !self.nonzero(walk.rate) {
            return Err(DecompositionError::NoProgress {
                border: border.to_owned(),
            });
        }
        let mut chain = vec![(Vnf::Source, arc.to.clone())];
        chain.extend(walk.chain);
        let mut last_stage = Vnf::Sink;
        if let Some(last) = chain.last_mut() {
            last_stage = std::mem::replace(&mut last.1, Vnf::Sink);
        }
        if walk.sink == border && chain == [(Vnf::Source, Vnf::Sink)] {
            debug!("Pass-through of {} at {} at rate {}", arc, border, walk.rate);
            return Ok(());
        }

        let chain = workload.define_chain(chain, self.requests)?;
        let request = VnfRequest {
            chain,
            ingress: border.to_owned(),
            ingress_domain: self.domain_of(border)?,
            egress: walk.sink.clone(),
            egress_domain: self.domain_of(&walk.sink)?,
            initial_rate: walk.rate,
        };
        workload.add_request(&arc.request, request, (arc.from.clone(), last_stage));
        Ok(())
    }
}
