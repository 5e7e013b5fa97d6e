//! Compiled contract artifacts.
//!
//! Artifacts follow the Hardhat layout: every contract `Name` declared in
//! `contracts/Name.sol` is described by `artifacts/contracts/Name.sol/Name.json`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt, Specifier},
    json_abi::JsonAbi,
    primitives::Bytes,
};
use eyre::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::DeployError;

/// Unlinked library reference, e.g. `__$6a9ad2a4d4ea9cc2f18de0c2ed9ab9d3b1$__`.
static LIBRARY_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__\$[0-9a-fA-F]{34}\$__").expect("valid regex"));

/// Looks up compiled contracts by name.
pub trait ArtifactRegistry {
    fn resolve(&self, name: &str) -> Result<Artifact, DeployError>;
}

/// Creation bytecode and interface of a contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: JsonAbi,
    pub bytecode: String,
}

impl Artifact {
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Decoded creation bytecode, rejecting code that cannot be deployed as is.
    pub fn bytecode(&self) -> Result<Vec<u8>, DeployError> {
        let invalid = |reason: &str| DeployError::InvalidArtifact {
            name: self.contract_name.clone(),
            reason: reason.to_owned(),
        };

        if LIBRARY_PLACEHOLDER.is_match(&self.bytecode) {
            return Err(invalid("bytecode references unlinked libraries"));
        }
        let code = self.bytecode.trim();
        let code = code.strip_prefix("0x").unwrap_or(code);
        if code.is_empty() {
            return Err(invalid("bytecode is empty, is it an interface or abstract contract?"));
        }

        hex::decode(code).map_err(|e| invalid(&format!("bytecode is not valid hex: {e}")))
    }

    /// Bytecode followed by the ABI-encoded constructor arguments.
    ///
    /// Each argument is parsed as the type of the matching constructor input,
    /// so `"0x..."` becomes an `address` and `"1000"` a `uint256`.
    pub fn creation_code(&self, args: &[String]) -> Result<Bytes, DeployError> {
        let code = self.bytecode()?;
        let invalid = |reason: String| DeployError::ConstructorArgs {
            name: self.contract_name.clone(),
            reason,
        };

        let Some(constructor) = &self.abi.constructor else {
            if !args.is_empty() {
                return Err(invalid(format!(
                    "contract has no constructor but {} arguments were given",
                    args.len()
                )));
            }
            return Ok(code.into());
        };

        if constructor.inputs.len() != args.len() {
            return Err(invalid(format!(
                "expected {} arguments, got {}",
                constructor.inputs.len(),
                args.len()
            )));
        }

        let values = constructor
            .inputs
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                let ty = param
                    .resolve()
                    .map_err(|e| invalid(format!("unsupported type {}: {e}", param.ty)))?;
                ty.coerce_str(arg)
                    .map_err(|e| invalid(format!("`{arg}` is not a valid {}: {e}", param.ty)))
            })
            .collect::<Result<Vec<DynSolValue>, _>>()?;
        let encoded = constructor
            .abi_encode_input(&values)
            .map_err(|e| invalid(e.to_string()))?;

        Ok([code, encoded].concat().into())
    }

    /// Whether the constructor takes any arguments.
    pub fn has_constructor_inputs(&self) -> bool {
        self.abi
            .constructor
            .as_ref()
            .is_some_and(|c| !c.inputs.is_empty())
    }
}

/// Artifacts written by Hardhat into a directory tree.
pub struct HardhatArtifacts {
    root: PathBuf,
}

impl HardhatArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Every `<Name>.json` under the root whose file stem is `name`.
    fn find(&self, name: &str) -> eyre::Result<Vec<PathBuf>> {
        let file_name = format!("{name}.json");
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).wrap_err_with(|| format!("could not read {}", dir.display()))
                }
            };
            for entry in entries {
                let path = entry?.path();
                if path.is_dir() {
                    if path.file_name().is_some_and(|n| n != "build-info") {
                        pending.push(path);
                    }
                } else if path.file_name().is_some_and(|n| n == file_name.as_str()) {
                    found.push(path);
                }
            }
        }
        found.sort();

        Ok(found)
    }

    fn read(&self, path: &Path) -> eyre::Result<Artifact> {
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("could not read artifact {}", path.display()))?;
        serde_json::from_str(&contents)
            .wrap_err_with(|| format!("malformed artifact {}", path.display()))
    }
}

impl ArtifactRegistry for HardhatArtifacts {
    fn resolve(&self, name: &str) -> Result<Artifact, DeployError> {
        let not_found = || DeployError::ArtifactNotFound {
            name: name.to_owned(),
        };

        if let Some((source, contract)) = name.rsplit_once(':') {
            let path = self.root.join(source).join(format!("{contract}.json"));
            if !path.is_file() {
                return Err(not_found());
            }
            tracing::debug!(path = %path.display(), "resolved artifact");
            return Ok(self.read(&path)?);
        }

        let mut artifacts = self
            .find(name)?
            .iter()
            .map(|path| self.read(path).map(|artifact| (path.clone(), artifact)))
            .collect::<eyre::Result<Vec<_>>>()?;

        match artifacts.len() {
            0 => Err(not_found()),
            1 => {
                let (path, artifact) = artifacts.remove(0);
                tracing::debug!(path = %path.display(), "resolved artifact");
                Ok(artifact)
            }
            _ => Err(DeployError::AmbiguousArtifact {
                name: name.to_owned(),
                candidates: artifacts
                    .iter()
                    .map(|(_, a)| a.fully_qualified_name())
                    .collect(),
            }),
        }
    }
}
