//! # Graph Subcommand
//!
//! Emits the audit graph (contract root, one node per field, one edge per
//! node) as JSON, to stdout or a file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use setsync_graph::{AuditGraph, Layout};

use crate::session::Session;
use crate::{engine_error, EXIT_OK};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    Columns,
    Radial,
}

impl From<LayoutArg> for Layout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Columns => Layout::Columns,
            LayoutArg::Radial => Layout::Radial,
        }
    }
}

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Node arrangement.
    #[arg(long, value_enum, default_value_t = LayoutArg::Radial)]
    pub layout: LayoutArg,

    /// Collapse pillars into aspect nodes.
    #[arg(long)]
    pub extended: bool,

    /// Write the graph here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub async fn run_graph(args: &GraphArgs, session: &Session) -> Result<u8> {
    session.load().await?;
    let graph = session.engine.graph().map_err(engine_error)?;
    tracing::debug!(fingerprint = %graph.fingerprint(), "graph built");

    match &args.output {
        Some(path) => {
            write_graph(&graph, path)?;
            eprintln!(
                "Wrote {} nodes and {} edges to {}",
                graph.nodes.len(),
                graph.edges.len(),
                path.display()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&graph)?),
    }
    Ok(EXIT_OK)
}

pub fn write_graph(graph: &AuditGraph, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(graph)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use setsync_core::{fallback_dashboard, AuditField};
    use setsync_graph::GraphBuilder;

    #[test]
    fn writes_graph_json() {
        let seed = fallback_dashboard();
        let fields: Vec<AuditField> = seed.fields.into_iter().map(AuditField::from).collect();
        let graph = GraphBuilder::new(Layout::Columns)
            .build(&seed.contract, &fields, &[])
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        write_graph(&graph, &path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["nodes"].as_array().unwrap().len(), fields.len() + 1);
        assert_eq!(written["edges"].as_array().unwrap().len(), fields.len());
        assert_eq!(written["nodes"][0]["id"], "contract");
    }

    #[test]
    fn unwritable_path_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("graph.json");
        let graph = AuditGraph {
            nodes: vec![],
            edges: vec![],
        };
        assert!(write_graph(&graph, &path).is_err());
    }
}
