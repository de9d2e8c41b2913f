//! Process-level configuration: the construction parameters spec.md §6
//! lists, read from the command line.

use clap::Parser;

/// Starts a single Ben-Or binary-agreement participant, listening on
/// `base-port + node-id`.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// This node's index in `[0, N)`.
    #[arg(long)]
    pub node_id: usize,

    /// Total number of nodes in the cluster.
    #[arg(long)]
    pub n: usize,

    /// Presumed number of faulty nodes, `0 <= F < N`.
    #[arg(long)]
    pub f: usize,

    /// This node's initial proposal, 0 or 1. Ignored if `--faulty` is set.
    #[arg(long, default_value_t = 0)]
    pub initial_value: u8,

    /// Model this node as faulty: it answers only status/state endpoints.
    #[arg(long, default_value_t = false)]
    pub faulty: bool,

    /// The base TCP port; this node binds `base_port + node_id`.
    #[arg(long, default_value_t = 7000)]
    pub base_port: u16,
}
