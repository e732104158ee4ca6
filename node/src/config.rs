//! Node configuration with TOML file support.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use votechain_crypto::{Ed25519Signer, SigningAdapter};
use votechain_ledger::GenesisGrant;
use votechain_store::Party;
use votechain_types::{NodeType, ProtocolParams, PublicKey};

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a votechain node.
///
/// Every field has a default, so an empty file is a valid (if not very
/// useful) regular-node configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub role: NodeType,

    /// Address the peer listener binds to.
    pub listen_address: String,

    /// Node id announced to peers; the bound listen address when unset.
    pub advertise_address: Option<String>,

    /// Where a regular node dials the authority.
    pub authority_address: Option<String>,

    /// Hex public key of the authority. Forge requests must be signed by it.
    /// An authority may leave it unset; its own key is used.
    pub authority_public_key: Option<PublicKey>,

    /// Hex 32-byte ed25519 seed of this node's wallet.
    pub key_seed: Option<String>,

    /// Ledger storage directory.
    pub data_dir: PathBuf,

    /// Seconds between forging rounds (authority only).
    pub forge_interval_secs: u64,

    /// Outbound messages queued per connection before new ones are dropped.
    pub outbound_queue_capacity: usize,

    /// Registered peers needed before the authority starts a round.
    pub min_peers_for_round: usize,

    pub rpc_enabled: bool,
    pub rpc_address: String,

    pub log_format: LogFormat,
    pub log_level: String,

    pub params: ProtocolParams,

    /// Initial distribution and ballot parties (authority only).
    pub genesis: GenesisConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub grants: Vec<GenesisGrant>,
    pub parties: Vec<Party>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: NodeType::Regular,
            listen_address: "0.0.0.0:7100".to_string(),
            advertise_address: None,
            authority_address: None,
            authority_public_key: None,
            key_seed: None,
            data_dir: PathBuf::from("./votechain_data"),
            forge_interval_secs: 30,
            outbound_queue_capacity: 5,
            min_peers_for_round: 2,
            rpc_enabled: false,
            rpc_address: "127.0.0.1:7101".to_string(),
            log_format: LogFormat::Human,
            log_level: "info".to_string(),
            params: ProtocolParams::default(),
            genesis: GenesisConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn is_authority(&self) -> bool {
        self.role == NodeType::Authority
    }

    /// The wallet signer built from `key_seed`.
    pub fn signer(&self) -> Result<Ed25519Signer, NodeError> {
        let seed = self
            .key_seed
            .as_deref()
            .ok_or_else(|| NodeError::Config("key_seed is required".into()))?;
        let bytes = hex::decode(seed.trim())
            .map_err(|e| NodeError::Config(format!("key_seed is not hex: {e}")))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| NodeError::Config("key_seed must be 32 bytes".into()))?;
        Ok(Ed25519Signer::from_seed(&seed))
    }

    /// The authority's public key, given this node's own signer.
    pub fn authority_key(&self, signer: &dyn SigningAdapter) -> Result<PublicKey, NodeError> {
        match (self.authority_public_key, self.is_authority()) {
            (Some(key), true) if key != signer.public_key() => Err(NodeError::Config(
                "authority_public_key does not match key_seed".into(),
            )),
            (Some(key), _) => Ok(key),
            (None, true) => Ok(signer.public_key()),
            (None, false) => Err(NodeError::Config(
                "authority_public_key is required for a regular node".into(),
            )),
        }
    }

    /// Check role-specific requirements.
    pub fn validate(&self) -> Result<(), NodeError> {
        let signer = self.signer()?;
        self.authority_key(&signer)?;
        if self.outbound_queue_capacity == 0 {
            return Err(NodeError::Config("outbound_queue_capacity must be > 0".into()));
        }
        if self.is_authority() {
            if self.forge_interval_secs == 0 {
                return Err(NodeError::Config("forge_interval_secs must be > 0".into()));
            }
        } else if self.authority_address.is_none() {
            return Err(NodeError::Config(
                "authority_address is required for a regular node".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use votechain_types::AddressHash;

    const SEED: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn empty_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").unwrap();
        assert_eq!(config.role, NodeType::Regular);
        assert_eq!(config.forge_interval_secs, 30);
        assert_eq!(config.outbound_queue_capacity, 5);
        assert_eq!(config.min_peers_for_round, 2);
        assert_eq!(config.params, ProtocolParams::default());
        assert_eq!(config.log_format, LogFormat::Human);
    }

    #[test]
    fn authority_file_with_genesis() {
        let address = AddressHash::new([0x11; 32]);
        let toml = format!(
            r#"
            role = "authority"
            key_seed = "{SEED}"
            forge_interval_secs = 5
            log_format = "json"

            [params]
            min_bond = 2

            [[genesis.grants]]
            address = "{address}"
            value = 10

            [[genesis.parties]]
            name = "Green"
            address = "{address}"
            "#
        );
        let config = NodeConfig::from_toml_str(&toml).unwrap();
        assert!(config.is_authority());
        assert_eq!(config.params.min_bond, 2);
        assert_eq!(config.params.vote_value, 1);
        assert_eq!(config.genesis.grants[0].value, 10);
        assert_eq!(config.genesis.parties[0].name, "Green");
        config.validate().unwrap();

        let signer = config.signer().unwrap();
        assert_eq!(config.authority_key(&signer).unwrap(), signer.public_key());
    }

    #[test]
    fn regular_node_needs_the_authority() {
        let mut config = NodeConfig {
            key_seed: Some(SEED.into()),
            ..NodeConfig::default()
        };
        assert!(matches!(config.validate(), Err(NodeError::Config(_))));

        config.authority_public_key = Some(Ed25519Signer::from_seed(&[2; 32]).public_key());
        config.authority_address = Some("127.0.0.1:7100".into());
        config.validate().unwrap();
    }

    #[test]
    fn bad_seed_is_a_config_error() {
        let config = NodeConfig {
            key_seed: Some("abcd".into()),
            ..NodeConfig::default()
        };
        assert!(matches!(config.signer(), Err(NodeError::Config(_))));
    }

    #[test]
    fn toml_roundtrip_keeps_role() {
        let config = NodeConfig {
            role: NodeType::Authority,
            key_seed: Some(SEED.into()),
            ..NodeConfig::default()
        };
        let parsed = NodeConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert!(parsed.is_authority());
        assert_eq!(parsed.key_seed.as_deref(), Some(SEED));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file(Path::new("/nonexistent/votechain.toml"));
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
