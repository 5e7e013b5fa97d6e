use std::{collections::BTreeMap, fs, path::Path};

use eyre::{bail, Context};
use serde::Deserialize;

use crate::{config::NetworkArgs, formatting::highlight};

/// Private key of the first account of the local development node
/// (`test test test test test test test test test test test junk`).
const DEV_ACCOUNT_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Where transactions are sent and which keys may sign them.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Network {
    pub url: String,
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub accounts: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworksFile {
    #[serde(default)]
    networks: BTreeMap<String, Network>,
}

/// Known networks, keyed by name.
#[derive(Clone, Debug)]
pub struct Networks {
    entries: BTreeMap<String, Network>,
}

impl Default for Networks {
    fn default() -> Self {
        let local = |accounts: Vec<String>| Network {
            url: "http://127.0.0.1:8545".to_owned(),
            chain_id: Some(31337),
            accounts,
        };

        let mut entries = BTreeMap::new();
        entries.insert("localhost".to_owned(), local(Vec::new()));
        entries.insert("hardhat".to_owned(), local(vec![DEV_ACCOUNT_0.to_owned()]));
        entries.insert(
            "arbitrum-sepolia".to_owned(),
            Network {
                url: "https://sepolia-rollup.arbitrum.io/rpc".to_owned(),
                chain_id: Some(421614),
                accounts: Vec::new(),
            },
        );

        Self { entries }
    }
}

impl Networks {
    /// Built-in networks, overridden by the entries of a TOML file.
    pub fn load(path: Option<&Path>) -> eyre::Result<Self> {
        let mut networks = Self::default();
        let Some(path) = path else {
            return Ok(networks);
        };

        let contents = fs::read_to_string(path)
            .wrap_err_with(|| eyre::eyre!("could not read networks file {}", path.display()))?;
        let file: NetworksFile = toml::from_str(&contents)
            .wrap_err_with(|| eyre::eyre!("invalid networks file {}", path.display()))?;
        for (name, network) in file.networks {
            tracing::debug!(%name, url = %network.url, "network from file");
            networks.entries.insert(canonical(&name), network);
        }

        Ok(networks)
    }

    pub fn get(&self, name: &str) -> eyre::Result<&Network> {
        match self.entries.get(&canonical(name)) {
            Some(network) => Ok(network),
            None => bail!(
                "unknown network \"{name}\", expected one of: {}",
                self.names().collect::<Vec<_>>().join(", ")
            ),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Network)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl NetworkArgs {
    /// Prints every known network, marking the selected one. Fails when the
    /// selected network is unknown.
    pub fn list(&self, color: bool) -> eyre::Result<()> {
        let networks = Networks::load(self.networks_file.as_deref())?;
        networks.get(&self.network)?;
        let selected = canonical(&self.network);
        for (name, network) in networks.iter() {
            let marker = if name == selected { "*" } else { " " };
            let chain_id = network
                .chain_id
                .map_or_else(|| "?".to_owned(), |id| id.to_string());
            println!(
                "{marker} {} {chain_id:>8}  {}",
                highlight(format!("{name:<20}"), color),
                network.url
            );
        }

        Ok(())
    }
}

/// `arbitrumSepolia` and `arbitrum_sepolia` both name `arbitrum-sepolia`.
fn canonical(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    for c in name.chars() {
        if c == '_' {
            out.push('-');
        } else if c.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
