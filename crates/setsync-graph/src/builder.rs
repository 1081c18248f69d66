//! # Graph Builder
//!
//! `build(contract, fields, gaps) -> AuditGraph`.
//!
//! - exactly one root node, id `contract`;
//! - plain layout: one node per field, id `field-{key}`;
//! - extended layout: pillars with an aspect become one node per aspect,
//!   id `aspect-{aspect}`; every other field stays a plain field node;
//! - one edge root -> node per sub-node, id `edge-{node id}`;
//! - an edge fails iff its field is FAIL or severed. A field counts as
//!   severed when it carries the flag itself or an open
//!   [`GapKind::AudienceSeverance`] gap names it.
//!
//! Duplicate node ids are a caller error ([`GraphError::DuplicateNodeId`]).

use std::collections::BTreeSet;

use thiserror::Error;

use setsync_core::{AuditField, AuditStatus, Contract, GapKind, StrategicGap};

use crate::layout::Layout;
use crate::model::{
    AuditGraph, ContractNodeData, Edge, EdgeStyle, FieldNodeData, Node, NodeData, NodeKind,
};

/// Id of the contract root node.
pub const ROOT_ID: &str = "contract";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate node id: {0}")]
    DuplicateNodeId(String),
}

/// Builds audit graphs with a fixed layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder {
    layout: Layout,
    extended: bool,
}

impl GraphBuilder {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            extended: false,
        }
    }

    /// Collapse pillars into aspect nodes.
    pub fn extended(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn build(
        &self,
        contract: &Contract,
        fields: &[AuditField],
        gaps: &[StrategicGap],
    ) -> Result<AuditGraph, GraphError> {
        let mut ids = BTreeSet::from([ROOT_ID.to_string()]);
        let mut sub_nodes = Vec::with_capacity(fields.len());
        for field in fields {
            let (id, kind) = self.identify(field);
            if !ids.insert(id.clone()) {
                return Err(GraphError::DuplicateNodeId(id));
            }
            sub_nodes.push((id, kind, field));
        }

        let (root_position, positions) = self.layout.positions(sub_nodes.len());
        let mut nodes = Vec::with_capacity(sub_nodes.len() + 1);
        nodes.push(Node {
            id: ROOT_ID.to_string(),
            kind: NodeKind::Contract,
            position: root_position,
            data: NodeData::Contract(ContractNodeData {
                contract_id: contract.id.clone(),
                campaign_name: contract.campaign_name.clone(),
                client_name: contract.client_name.clone(),
                fields: contract
                    .fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                open_gaps: gaps.iter().map(|g| g.message.clone()).collect(),
            }),
        });

        let mut edges = Vec::with_capacity(sub_nodes.len());
        for ((id, kind, field), position) in sub_nodes.into_iter().zip(positions) {
            let severance = field.has_severance || severed_by_gap(field, gaps);
            let failing = field.status == AuditStatus::Fail || severance;
            edges.push(Edge {
                id: format!("edge-{id}"),
                source: ROOT_ID.to_string(),
                target: id.clone(),
                failing,
                severance,
                style: EdgeStyle::derive(failing, severance),
            });
            nodes.push(Node {
                id,
                kind,
                position,
                data: NodeData::Field(field_data(field, severance)),
            });
        }

        Ok(AuditGraph { nodes, edges })
    }

    fn identify(&self, field: &AuditField) -> (String, NodeKind) {
        if self.extended {
            if let Some(aspect) = field.pillar().and_then(|p| p.aspect()) {
                return (format!("aspect-{aspect}"), NodeKind::Aspect(aspect));
            }
        }
        (format!("field-{}", field.key), NodeKind::Field)
    }
}

fn severed_by_gap(field: &AuditField, gaps: &[StrategicGap]) -> bool {
    gaps.iter()
        .any(|g| g.kind == GapKind::AudienceSeverance && g.fields.contains(&field.key))
}

fn field_data(field: &AuditField, severance: bool) -> FieldNodeData {
    let pillar = field.pillar();
    FieldNodeData {
        label: pillar
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| field.key.to_string()),
        field_label: pillar.map(|p| p.field_label().to_string()),
        status: field.status,
        message: field.message(),
        issues: field.issues.clone(),
        value: field.value.clone(),
        expected: field.expected.clone(),
        has_severance: severance,
        remediated_at: field.remediated_at,
    }
}
