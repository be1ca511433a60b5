use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kube_registry_sync::SyncConfig;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand, Debug)]
pub enum Commands {
    /// Mirror services, endpoints and pods and answer discovery queries
    Serve(ServeArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Kubeconfig context, the inferred configuration is used when unset
    #[arg(long, env = "KUBE_CONTEXT")]
    pub context: Option<String>,

    /// Listener for discovery queries, readiness and metrics
    #[arg(long, env = "REGISTRY_ADDRESS", default_value = "0.0.0.0:9090")]
    pub address: SocketAddr,

    /// Seconds to wait for the caches to sync, 0 waits until shutdown
    #[arg(long, env = "SYNC_TIMEOUT_SECS", default_value_t = 60)]
    pub sync_timeout_secs: u64,
}

impl ServeArgs {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            timeout: (self.sync_timeout_secs > 0).then(|| Duration::from_secs(self.sync_timeout_secs)),
        }
    }
}
