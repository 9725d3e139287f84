//! Compiled contract artifacts (hardhat or foundry JSON output).

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use serde::Deserialize;

use crate::{DeployError, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    /// Foundry nests the creation code under `object`.
    Object { object: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    #[serde(default)]
    contract_name: Option<String>,
    bytecode: RawBytecode,
}

/// Creation bytecode of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    pub name: String,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// Path of the artifact of `name` inside `artifacts_dir`.
    pub fn path(artifacts_dir: &Path, name: &str) -> PathBuf {
        artifacts_dir.join(format!("{name}.json"))
    }

    /// Load `<artifacts_dir>/<name>.json`.
    pub fn load(artifacts_dir: &Path, name: &str) -> Result<Self> {
        let path = Self::path(artifacts_dir, name);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            DeployError::config(format!("failed to read artifact {}: {e}", path.display()))
        })?;
        Self::from_json(name, &content)
            .map_err(|e| DeployError::config(format!("artifact {}: {e}", path.display())))
    }

    fn from_json(name: &str, content: &str) -> std::result::Result<Self, String> {
        let raw: RawArtifact = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let hex = match raw.bytecode {
            RawBytecode::Hex(hex) => hex,
            RawBytecode::Object { object } => object,
        };

        let bytecode = hex.parse::<Bytes>().map_err(|e| format!("invalid bytecode: {e}"))?;
        if bytecode.is_empty() {
            return Err("bytecode is empty (abstract contract or interface?)".to_string());
        }

        Ok(Self {
            name: raw.contract_name.unwrap_or_else(|| name.to_string()),
            bytecode,
        })
    }

    /// Init code with ABI-encoded constructor arguments appended.
    pub fn init_code(&self, constructor_args: &[u8]) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + constructor_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(constructor_args);
        code.into()
    }
}
