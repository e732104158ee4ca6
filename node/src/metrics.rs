//! Prometheus metrics for a node.
//!
//! [`NodeMetrics`] owns its own [`Registry`]; the RPC `/metrics` endpoint
//! encodes it in the Prometheus text format.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};

pub struct NodeMetrics {
    pub registry: Registry,

    /// Blocks this node forged and appended.
    pub blocks_forged: IntCounter,
    /// Blocks from other forgers appended to the local chain.
    pub blocks_accepted: IntCounter,
    /// Blocks rejected with the forger punished.
    pub blocks_punished: IntCounter,
    pub stale_blocks: IntCounter,
    /// Transactions newly added to the pending pool from the network.
    pub transactions_received: IntCounter,
    /// Forge requests sent by the authority.
    pub rounds_solicited: IntCounter,

    pub peer_count: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let blocks_forged = register_int_counter_with_registry!(
            Opts::new("votechain_blocks_forged_total", "Blocks forged by this node"),
            registry
        )?;
        let blocks_accepted = register_int_counter_with_registry!(
            Opts::new(
                "votechain_blocks_accepted_total",
                "Blocks from other forgers appended to the chain"
            ),
            registry
        )?;
        let blocks_punished = register_int_counter_with_registry!(
            Opts::new(
                "votechain_blocks_punished_total",
                "Invalid blocks whose forger was punished"
            ),
            registry
        )?;
        let stale_blocks = register_int_counter_with_registry!(
            Opts::new(
                "votechain_stale_blocks_total",
                "Blocks that did not extend the local tip"
            ),
            registry
        )?;
        let transactions_received = register_int_counter_with_registry!(
            Opts::new(
                "votechain_transactions_received_total",
                "Transactions added to the pending pool from peers"
            ),
            registry
        )?;
        let rounds_solicited = register_int_counter_with_registry!(
            Opts::new(
                "votechain_forge_rounds_solicited_total",
                "Forge requests sent to peers"
            ),
            registry
        )?;
        let peer_count = register_int_gauge_with_registry!(
            Opts::new("votechain_peer_count", "Registered peers"),
            registry
        )?;

        Ok(Self {
            registry,
            blocks_forged,
            blocks_accepted,
            blocks_punished,
            stale_blocks,
            transactions_received,
            rounds_solicited,
            peer_count,
        })
    }
}
