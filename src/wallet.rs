use alloy::{
    primitives::Address,
    signers::local::{LocalSigner, PrivateKeySigner},
};
use eyre::{Context, Result};
use std::{fmt, fs};

use crate::config::PrivateKey;

/// An account able to authorize the deployment.
pub trait Identity {
    fn address(&self) -> Address;
}

impl Identity for PrivateKeySigner {
    fn address(&self) -> Address {
        PrivateKeySigner::address(self)
    }
}

/// Where a signing key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    PrivateKey,
    PrivateKeyFile,
    Keystore,
    /// Account `n` of the selected network's configuration.
    Network(usize),
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrivateKey => f.write_str("--private-key/PRIVATE_KEY"),
            Self::PrivateKeyFile => f.write_str("--private-key-path"),
            Self::Keystore => f.write_str("--keystore-path"),
            Self::Network(i) => write!(f, "network account #{i}"),
        }
    }
}

impl PrivateKey {
    /// Resolves the configured key sources followed by the network's own
    /// accounts. An empty list is not an error here: deciding what to do
    /// without a deployer is up to the caller.
    pub fn wallets(&self, network_accounts: &[String]) -> Result<Vec<PrivateKeySigner>> {
        Ok(self
            .sourced_wallets(network_accounts)?
            .into_iter()
            .map(|(_, wallet)| wallet)
            .collect())
    }

    /// Like [`PrivateKey::wallets`], tagging each wallet with its source.
    pub fn sourced_wallets(
        &self,
        network_accounts: &[String],
    ) -> Result<Vec<(KeySource, PrivateKeySigner)>> {
        let mut wallets = Vec::new();

        if let Some(key) = self.private_key.as_deref().and_then(normalize) {
            let wallet = parse_key(&key).wrap_err("invalid private key")?;
            wallets.push((KeySource::PrivateKey, wallet));
        }

        if let Some(file) = &self.private_key_path {
            let key = fs::read_to_string(file).wrap_err("could not open private key file")?;
            let key = normalize(&key).ok_or_else(|| eyre::eyre!("private key file is empty"))?;
            let wallet = parse_key(&key).wrap_err("invalid private key file")?;
            wallets.push((KeySource::PrivateKeyFile, wallet));
        }

        if let Some(keystore) = &self.keystore_path {
            let password = self
                .keystore_password_path
                .as_ref()
                .map(fs::read_to_string)
                .unwrap_or(Ok("".into()))
                .wrap_err("could not read keystore password")?;
            let wallet = LocalSigner::decrypt_keystore(keystore, password.trim_end())
                .wrap_err("could not decrypt keystore")?;
            wallets.push((KeySource::Keystore, wallet));
        }

        for (i, key) in network_accounts.iter().enumerate() {
            let Some(key) = normalize(key) else {
                continue;
            };
            let wallet = parse_key(&key).wrap_err_with(|| format!("invalid network account #{i}"))?;
            wallets.push((KeySource::Network(i), wallet));
        }

        Ok(wallets)
    }
}

fn parse_key(key: &str) -> Result<PrivateKeySigner> {
    Ok(key.parse::<PrivateKeySigner>()?)
}

/// Trims the key and adds a `0x` prefix, treating blank keys as absent.
fn normalize(key: &str) -> Option<String> {
    let key = key.trim();
    let bare = key.strip_prefix("0x").unwrap_or(key);
    if bare.is_empty() {
        return None;
    }
    Some(format!("0x{bare}"))
}
