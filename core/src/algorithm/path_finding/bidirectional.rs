//! Bidirectional Breadth-First Search over Residual Networks
//!
//! Finds a shortest (fewest-hop) augmenting route between two vertices of a
//! residual network by growing one frontier from the source along residual
//! arcs and one from the sink against them, always expanding the smaller
//! frontier first. The search stops as soon as a vertex is labelled by both
//! frontiers.
//!
//! # Properties
//! - Completeness: if any route with positive residual capacity exists, one
//!   is returned.
//! - Minimality: the returned route has the minimum number of arcs, because
//!   both frontiers advance level by level.
//! - Determinism: neighbours are visited in the order the network reports
//!   them, so repeated searches on equal networks return equal routes.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use log::debug;
use thiserror::Error;

/// Bidirectional search direction enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchDirection {
    /// Forward search from source to target
    Forward,
    /// Backward search from target to source
    Backward,
}

impl SearchDirection {
    /// Get the opposite direction
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    /// Convert to human-readable string
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        }
    }
}

/// Search errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BidirectionalError {
    #[error("Vertex {vertex} is outside the network of {count} vertices")]
    VertexOutOfRange { vertex: usize, count: usize },

    #[error("Source and target are the same vertex: {0}")]
    SameEndpoints(usize),
}

/// A network exposing residual arcs by vertex index.
///
/// Implementors report only arcs whose residual capacity is positive.
pub trait ResidualNetwork {
    fn vertex_count(&self) -> usize;

    /// Arcs `v → w` with residual capacity, as `(w, edge index)`
    fn outgoing(&self, v: usize) -> Vec<(usize, usize)>;

    /// Arcs `w → v` with residual capacity, as `(w, edge index)`
    fn incoming(&self, v: usize) -> Vec<(usize, usize)>;
}

/// Route found by the search: `edges[i]` joins `vertices[i]` and `vertices[i + 1]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRoute {
    pub vertices: Vec<usize>,
    pub edges: Vec<usize>,
}

impl SearchRoute {
    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }
}

/// Frontier labels for one direction
struct Frontier {
    direction: SearchDirection,
    /// `(neighbour towards the frontier origin, edge index)`
    parent: Vec<Option<(usize, usize)>>,
    seen: Vec<bool>,
    queue: Vec<usize>,
}

impl Frontier {
    fn new(direction: SearchDirection, origin: usize, count: usize) -> Self {
        let mut seen = vec![false; count];
        seen[origin] = true;
        Self {
            direction,
            parent: vec![None; count],
            seen,
            queue: vec![origin],
        }
    }

    /// Walk parent pointers from `vertex` back to the origin
    fn trace(&self, vertex: usize) -> (Vec<usize>, Vec<usize>) {
        let mut vertices = vec![vertex];
        let mut edges = Vec::new();
        let mut current = vertex;
        while let Some((next, edge)) = self.parent[current] {
            vertices.push(next);
            edges.push(edge);
            current = next;
        }
        (vertices, edges)
    }
}

/// Bidirectional BFS engine
#[derive(Debug, Clone, Copy, Default)]
pub struct BidirectionalBfs;

impl BidirectionalBfs {
    pub fn new() -> Self {
        Self
    }

    /// Find a shortest residual route from `source` to `target`
    pub fn find<N: ResidualNetwork + ?Sized>(
        &self,
        network: &N,
        source: usize,
        target: usize,
    ) -> Result<Option<SearchRoute>, BidirectionalError> {
        let count = network.vertex_count();
        for vertex in [source, target] {
            if vertex >= count {
                return Err(BidirectionalError::VertexOutOfRange { vertex, count });
            }
        }
        if source == target {
            return Err(BidirectionalError::SameEndpoints(source));
        }

        let mut forward = Frontier::new(SearchDirection::Forward, source, count);
        let mut backward = Frontier::new(SearchDirection::Backward, target, count);

        loop {
            let (grow, other) = if forward.queue.len() <= backward.queue.len() {
                (&mut forward, &backward)
            } else {
                (&mut backward, &forward)
            };

            let mut next = Vec::new();
            let mut meeting = None;
            'expand: for &u in &grow.queue {
                let arcs = match grow.direction {
                    SearchDirection::Forward => network.outgoing(u),
                    SearchDirection::Backward => network.incoming(u),
                };
                for (v, edge) in arcs {
                    if grow.seen[v] {
                        continue;
                    }
                    grow.seen[v] = true;
                    grow.parent[v] = Some((u, edge));
                    if other.seen[v] {
                        meeting = Some(v);
                        break 'expand;
                    }
                    next.push(v);
                }
            }

            if let Some(v) = meeting {
                debug!(
                    "Frontiers met at vertex {} during {} expansion",
                    v,
                    grow.direction.as_str()
                );
                return Ok(Some(Self::join(&forward, &backward, v)));
            }
            if next.is_empty() {
                return Ok(None);
            }
            grow.queue = next;
        }
    }

    fn join(forward: &Frontier, backward: &Frontier, meeting: usize) -> SearchRoute {
        let (mut vertices, mut edges) = forward.trace(meeting);
        vertices.reverse();
        edges.reverse();
        let (tail_vertices, tail_edges) = backward.trace(meeting);
        vertices.extend(tail_vertices.into_iter().skip(1));
        edges.extend(tail_edges);
        SearchRoute { vertices, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plain directed graph where every listed arc has residual capacity
    struct ArcList {
        count: usize,
        arcs: Vec<(usize, usize)>,
    }

    impl ResidualNetwork for ArcList {
        fn vertex_count(&self) -> usize {
            self.count
        }

        fn outgoing(&self, v: usize) -> Vec<(usize, usize)> {
            self.arcs
                .iter()
                .enumerate()
                .filter(|(_, (a, _))| *a == v)
                .map(|(i, (_, b))| (*b, i))
                .collect()
        }

        fn incoming(&self, v: usize) -> Vec<(usize, usize)> {
            self.arcs
                .iter()
                .enumerate()
                .filter(|(_, (_, b))| *b == v)
                .map(|(i, (a, _))| (*a, i))
                .collect()
        }
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(SearchDirection::Forward.opposite(), SearchDirection::Backward);
        assert_eq!(SearchDirection::Backward.as_str(), "backward");
    }

    #[test]
    fn test_finds_shortest_route() {
        // 0 -> 1 -> 2 -> 5 and 0 -> 3 -> 4 -> 6 -> 5
        let network = ArcList {
            count: 7,
            arcs: vec![(0, 1), (1, 2), (2, 5), (0, 3), (3, 4), (4, 6), (6, 5)],
        };
        let route = BidirectionalBfs::new().find(&network, 0, 5).unwrap().unwrap();
        assert_eq!(route.vertices, vec![0, 1, 2, 5]);
        assert_eq!(route.edges, vec![0, 1, 2]);
        assert_eq!(route.hop_count(), 3);
    }

    #[test]
    fn test_respects_arc_direction() {
        let network = ArcList {
            count: 3,
            arcs: vec![(1, 0), (2, 1)],
        };
        assert_eq!(BidirectionalBfs::new().find(&network, 0, 2).unwrap(), None);
        let route = BidirectionalBfs::new().find(&network, 2, 0).unwrap().unwrap();
        assert_eq!(route.vertices, vec![2, 1, 0]);
    }

    #[test]
    fn test_rejects_invalid_endpoints() {
        let network = ArcList { count: 2, arcs: vec![(0, 1)] };
        assert_eq!(
            BidirectionalBfs::new().find(&network, 0, 0),
            Err(BidirectionalError::SameEndpoints(0))
        );
        assert!(matches!(
            BidirectionalBfs::new().find(&network, 0, 9),
            Err(BidirectionalError::VertexOutOfRange { vertex: 9, .. })
        ));
    }
}
