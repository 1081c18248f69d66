//! # setsync-graph — Audit Graph Construction
//!
//! Turns a contract, its audited fields and the open strategic gaps into a
//! node/edge structure for visualization. Construction is a pure function:
//! identical inputs produce structurally identical graphs, and
//! [`AuditGraph::fingerprint`] lets consumers skip re-rendering when
//! nothing changed.
//!
//! Rendering, styling and animation are the consumer's concern. This crate
//! only decides *which* edges fail, which are severed, and where nodes sit.

pub mod builder;
pub mod layout;
pub mod model;

pub use builder::{GraphBuilder, GraphError};
pub use layout::{Layout, Position};
pub use model::{
    AuditGraph, ContractNodeData, Edge, EdgeStyle, FieldNodeData, Node, NodeData, NodeKind,
};
