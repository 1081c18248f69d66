//! # Campaign and contract input files
//!
//! Campaign setups and contract terms are read from YAML. Without a file
//! the documented seed campaign and contract are used.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use setsync_core::{Campaign, ContractId, ContractTerms};

/// The campaign to audit.
pub fn load_campaign(path: Option<&Path>) -> Result<Campaign> {
    match path {
        Some(path) => read_yaml(path),
        None => Ok(Campaign::nike_valentine_seed()),
    }
}

/// Contract terms, with the id overridden by `--contract` when given.
pub fn load_terms(path: Option<&Path>, contract: Option<&str>) -> Result<ContractTerms> {
    let mut terms: ContractTerms = match path {
        Some(path) => read_yaml(path)?,
        None => ContractTerms::nike_valentine(),
    };
    if let Some(id) = contract {
        terms.contract_id = ContractId::new(id).context("invalid --contract")?;
    }
    Ok(terms)
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}
