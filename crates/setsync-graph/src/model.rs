//! Graph data model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use setsync_core::{Aspect, AuditStatus, ContractId};

use crate::layout::Position;

/// Stroke color of failing edges.
pub const FAILING_STROKE: &str = "#e50914";
/// Stroke color of passing edges.
pub const PASSING_STROKE: &str = "#00d4aa";
/// Label carried by severance edges.
pub const SEVERANCE_LABEL: &str = "SEVERANCE";

/// What a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The contract root.
    Contract,
    /// A pillar or plain field.
    Field,
    /// An extended-layout aspect.
    Aspect(Aspect),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractNodeData {
    pub contract_id: ContractId,
    pub campaign_name: String,
    pub client_name: Option<String>,
    pub fields: BTreeMap<String, Value>,
    pub open_gaps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldNodeData {
    pub label: String,
    /// Campaign field the pillar checks, for pillar nodes.
    pub field_label: Option<String>,
    pub status: AuditStatus,
    pub message: String,
    pub issues: Vec<String>,
    pub value: Option<Value>,
    pub expected: Option<Value>,
    pub has_severance: bool,
    pub remediated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeData {
    Contract(ContractNodeData),
    Field(FieldNodeData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub position: Position,
    pub data: NodeData,
}

/// Presentation hints derived from an edge's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeStyle {
    pub animated: bool,
    pub stroke: &'static str,
    pub dashed: bool,
    pub label: Option<&'static str>,
}

impl EdgeStyle {
    /// Failing edges are static and red; severance edges are also dashed and
    /// labelled.
    pub fn derive(failing: bool, severance: bool) -> Self {
        Self {
            animated: !failing,
            stroke: if failing { FAILING_STROKE } else { PASSING_STROKE },
            dashed: severance,
            label: severance.then_some(SEVERANCE_LABEL),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub failing: bool,
    pub severance: bool,
    pub style: EdgeStyle,
}

/// Nodes and edges of one audit view. The root is always `nodes[0]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl AuditGraph {
    pub fn root(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Contract)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The edge from the root to `target`.
    pub fn edge_to(&self, target: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.target == target)
    }

    pub fn failing_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| e.failing)
    }

    /// SHA-256 hex digest of the graph's JSON form.
    ///
    /// Node data maps are `BTreeMap`s and struct fields serialize in
    /// declaration order, so equal graphs always hash equal.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_style_is_static_and_red() {
        let style = EdgeStyle::derive(true, false);
        assert!(!style.animated);
        assert_eq!(style.stroke, FAILING_STROKE);
        assert!(!style.dashed);
        assert_eq!(style.label, None);
    }

    #[test]
    fn severance_style_is_dashed_and_labelled() {
        let style = EdgeStyle::derive(true, true);
        assert!(style.dashed);
        assert_eq!(style.label, Some(SEVERANCE_LABEL));
    }

    #[test]
    fn passing_style_animates() {
        let style = EdgeStyle::derive(false, false);
        assert!(style.animated);
        assert_eq!(style.stroke, PASSING_STROKE);
    }

    #[test]
    fn empty_graph_fingerprint_is_stable_hex() {
        let graph = AuditGraph {
            nodes: vec![],
            edges: vec![],
        };
        let fp = graph.fingerprint();
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, graph.clone().fingerprint());
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
