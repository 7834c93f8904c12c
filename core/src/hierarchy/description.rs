//! Descriptions handed to the external placement solver
//!
//! Node references are substrate node names; ids display as `path_N` and
//! `edge_N` so the documents serialize with the same keys the solver reads.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::algorithm::traits::{EdgeId, PathId};
use crate::data_structures::graph::Topology;
use crate::hierarchy::model::{CpuRestriction, InterDomainLink, IntraDomainPath, RoutingRestriction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDescription {
    pub src: String,
    pub dst: String,
    pub max_rate: f64,
    pub delay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathDescription {
    pub src: String,
    pub dst: String,
    pub domain: String,
    pub cpu: f64,
    pub delay: f64,
    pub max_rate: f64,
}

/// Network one level of the hierarchy exposes to the solver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescription {
    pub domain_nodes: BTreeMap<String, Vec<String>>,
    pub inter_domain_edges: BTreeMap<EdgeId, EdgeDescription>,
    pub intra_domain_paths: BTreeMap<PathId, PathDescription>,
}

impl NetworkDescription {
    pub fn insert_link(&mut self, link: &InterDomainLink, topology: &Topology) {
        self.inter_domain_edges.insert(
            link.id,
            EdgeDescription {
                src: topology.name(link.src),
                dst: topology.name(link.dst),
                max_rate: link.rate,
                delay: link.delay,
            },
        );
    }

    pub fn insert_path(&mut self, path: &IntraDomainPath, topology: &Topology) {
        self.intra_domain_paths.insert(
            path.id,
            PathDescription {
                src: topology.name(path.src),
                dst: topology.name(path.dst),
                domain: path.domain.clone(),
                cpu: path.cpu,
                delay: path.delay,
                max_rate: path.rate,
            },
        );
    }

    pub fn edge(&self, id: EdgeId) -> Option<&EdgeDescription> {
        self.inter_domain_edges.get(&id)
    }

    pub fn path(&self, id: PathId) -> Option<&PathDescription> {
        self.intra_domain_paths.get(&id)
    }
}

/// Node and path lookups keyed by domain name
pub trait DomainLookup {
    /// Domain listing `node` among its border nodes
    fn domain_of(&self, node: &str) -> Option<&str>;

    /// Ids of the paths owned by `domain`
    fn paths_in(&self, domain: &str) -> Vec<PathId>;

    fn border_nodes(&self, domain: &str) -> &[String];
}

impl DomainLookup for NetworkDescription {
    fn domain_of(&self, node: &str) -> Option<&str> {
        self.domain_nodes
            .iter()
            .find(|(_, nodes)| nodes.iter().any(|n| n == node))
            .map(|(domain, _)| domain.as_str())
    }

    fn paths_in(&self, domain: &str) -> Vec<PathId> {
        self.intra_domain_paths
            .iter()
            .filter(|(_, p)| p.domain == domain)
            .map(|(id, _)| *id)
            .collect()
    }

    fn border_nodes(&self, domain: &str) -> &[String] {
        self.domain_nodes.get(domain).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuRestrictionDescription {
    pub domain: String,
    pub paths: Vec<PathId>,
    pub shared_cpu: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRestrictionDescription {
    pub domain: String,
    pub paths: Vec<PathId>,
    pub shared_bottleneck: f64,
}

/// Restrictions one level of the hierarchy exposes to the solver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestrictionDescription {
    pub cpu_restrictions: BTreeMap<String, CpuRestrictionDescription>,
    pub routing_restrictions: BTreeMap<String, RoutingRestrictionDescription>,
}

impl RestrictionDescription {
    pub fn new(cpu: &[CpuRestriction], routing: &[RoutingRestriction]) -> Self {
        let cpu_restrictions = cpu
            .iter()
            .map(|r| {
                (
                    r.id.clone(),
                    CpuRestrictionDescription {
                        domain: r.domain.clone(),
                        paths: r.paths.clone(),
                        shared_cpu: r.shared_cpu,
                    },
                )
            })
            .collect();
        let routing_restrictions = routing
            .iter()
            .map(|r| {
                (
                    r.id.clone(),
                    RoutingRestrictionDescription {
                        domain: r.domain.clone(),
                        paths: r.paths.clone(),
                        shared_bottleneck: r.shared_bottleneck,
                    },
                )
            })
            .collect();
        Self {
            cpu_restrictions,
            routing_restrictions,
        }
    }

    /// Restrictions back as typed records, sorted by id
    pub fn routing(&self) -> Vec<RoutingRestriction> {
        self.routing_restrictions
            .iter()
            .map(|(id, r)| RoutingRestriction {
                id: id.clone(),
                domain: r.domain.clone(),
                paths: r.paths.clone(),
                shared_bottleneck: r.shared_bottleneck,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::traits::NodeId;

    fn description() -> NetworkDescription {
        let mut topology = Topology::new();
        let a = topology.add_node("A", 1.0).unwrap();
        let b = topology.add_node("B", 1.0).unwrap();
        let mut description = NetworkDescription::default();
        description.domain_nodes.insert("d1".into(), vec!["A".into()]);
        description.domain_nodes.insert("d2".into(), vec!["B".into()]);
        description.insert_link(
            &InterDomainLink {
                id: EdgeId(4),
                src: a,
                dst: b,
                rate: 10.0,
                delay: 2.0,
            },
            &topology,
        );
        description.insert_path(
            &IntraDomainPath {
                id: PathId(0),
                src: NodeId(0),
                dst: NodeId(0),
                domain: "d1".into(),
                cpu: 1.0,
                delay: 0.0,
                rate: 5.0,
            },
            &topology,
        );
        description
    }

    #[test]
    fn test_lookup() {
        let description = description();
        assert_eq!(description.domain_of("B"), Some("d2"));
        assert_eq!(description.domain_of("Z"), None);
        assert_eq!(description.paths_in("d1"), vec![PathId(0)]);
        assert!(description.paths_in("d2").is_empty());
        assert_eq!(description.border_nodes("d1"), ["A".to_string()]);
        assert!(description.border_nodes("missing").is_empty());
    }

    #[test]
    fn test_json_keys_use_display_ids() {
        let description = description();
        let json = serde_json::to_value(&description).unwrap();
        assert_eq!(json["inter_domain_edges"]["edge_4"]["src"], "A");
        assert_eq!(json["intra_domain_paths"]["path_0"]["max_rate"], 5.0);
        let back: NetworkDescription = serde_json::from_value(json).unwrap();
        assert_eq!(back, description);
    }

    #[test]
    fn test_restriction_description() {
        let routing = vec![RoutingRestriction {
            id: "routing_restriction_d_0".into(),
            domain: "d".into(),
            paths: vec![PathId(0), PathId(2)],
            shared_bottleneck: 15.0,
        }];
        let description = RestrictionDescription::new(&[], &routing);
        let json = serde_json::to_string(&description).unwrap();
        assert!(json.contains(r#""paths":["path_0","path_2"]"#));
        assert_eq!(description.routing(), routing);
    }
}
