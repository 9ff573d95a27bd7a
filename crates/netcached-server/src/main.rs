#[cfg(feature = "alloc_mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::atomic::Ordering;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod codec;
mod config;
mod metrics;
mod server;
mod store;

use crate::config::Config;

/// A subset of a memcache server: GET and SET over the binary protocol,
/// with an optional byte budget enforced by oldest-first eviction.
#[derive(Parser, Debug)]
#[command(name = "netcached", version)]
struct Args {
    /// Listening port, default is the widely used 11211
    #[arg(short = 'p', long, env = "NETCACHED_PORT", default_value_t = 11211)]
    port: u16,

    /// Bind address, default is all interfaces
    #[arg(long, env = "NETCACHED_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Size limit of the cache data in bytes; default is 0 to disable limit
    #[arg(long, env = "NETCACHED_LIMIT", default_value_t = 0)]
    limit: u64,

    /// Enable debug level logging; default is info level
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = Config {
        host: args.host,
        port: args.port,
        limit: args.limit,
        verbose: args.verbose,
    };

    let default_level = if cfg.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let ctx = server::Context::new(cfg);

    tokio::select! {
        res = server::run(ctx.clone()) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(
                "shutting down: {} connections, {} hits, {} misses, {} evictions",
                ctx.metrics.connections_total.load(Ordering::Relaxed),
                ctx.metrics.hits_total.load(Ordering::Relaxed),
                ctx.metrics.misses_total.load(Ordering::Relaxed),
                ctx.metrics.evictions_total.load(Ordering::Relaxed),
            );
            Ok(())
        }
    }
}
