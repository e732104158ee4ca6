//! votechain daemon: entry point for running a peer node.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use votechain_node::{init_logging, LogFormat, NodeConfig, VoteNode};
use votechain_types::NodeType;

#[derive(Parser)]
#[command(name = "votechain", about = "Proof-of-stake voting ledger node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node.
    Run(RunArgs),
    /// Print a fresh wallet seed with its public key and address.
    Keygen,
    /// Print the default configuration as TOML.
    DefaultConfig,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to a TOML configuration file. File settings are the base;
    /// flags and env vars override them.
    #[arg(long, env = "VOTECHAIN_CONFIG")]
    config: Option<PathBuf>,

    /// "authority" or "regular".
    #[arg(long, env = "VOTECHAIN_ROLE")]
    role: Option<NodeType>,

    /// Address the peer listener binds to.
    #[arg(long, env = "VOTECHAIN_LISTEN")]
    listen: Option<String>,

    /// Node id announced to peers.
    #[arg(long, env = "VOTECHAIN_ADVERTISE")]
    advertise: Option<String>,

    /// Address of the authority (regular nodes).
    #[arg(long, env = "VOTECHAIN_AUTHORITY")]
    authority: Option<String>,

    /// Hex wallet seed.
    #[arg(long, env = "VOTECHAIN_KEY_SEED", hide_env_values = true)]
    key_seed: Option<String>,

    /// Ledger storage directory.
    #[arg(long, env = "VOTECHAIN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Serve the HTTP API on this address.
    #[arg(long, env = "VOTECHAIN_RPC")]
    rpc: Option<String>,

    /// "trace", "debug", "info", "warn" or "error".
    #[arg(long, env = "VOTECHAIN_LOG_LEVEL")]
    log_level: Option<String>,

    /// "human" or "json".
    #[arg(long, env = "VOTECHAIN_LOG_FORMAT")]
    log_format: Option<String>,
}

impl RunArgs {
    fn into_config(self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => NodeConfig::default(),
        };
        if let Some(role) = self.role {
            config.role = role;
        }
        if let Some(listen) = self.listen {
            config.listen_address = listen;
        }
        if let Some(advertise) = self.advertise {
            config.advertise_address = Some(advertise);
        }
        if let Some(authority) = self.authority {
            config.authority_address = Some(authority);
        }
        if let Some(seed) = self.key_seed {
            config.key_seed = Some(seed);
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(rpc) = self.rpc {
            config.rpc_enabled = true;
            config.rpc_address = rpc;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format.parse::<LogFormat>()?;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Command::Run(args) => run(args.into_config()?).await,
        Command::Keygen => {
            let keypair = votechain_crypto::generate_keypair();
            println!("key_seed = \"{}\"", hex::encode(keypair.private.0));
            println!("public_key = \"{}\"", keypair.public);
            println!(
                "address = \"{}\"",
                votechain_crypto::hash_public_key(&keypair.public)
            );
            Ok(())
        }
        Command::DefaultConfig => {
            print!("{}", NodeConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    init_logging(config.log_format, &config.log_level);

    let node = VoteNode::open(config).context("opening node")?;
    let addr = node.start().await.context("starting node")?;
    tracing::info!(
        %addr,
        role = %node.config().role,
        rpc = node.config().rpc_enabled,
        "votechain node running"
    );

    node.shutdown_controller().wait_for_signal().await;
    node.stop();
    tracing::info!("votechain daemon exited cleanly");
    Ok(())
}
