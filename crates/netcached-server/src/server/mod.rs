pub mod conn;

use std::sync::Arc;

use anyhow::Context as _;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::metrics::Metrics;
use crate::store::Cache;

/// Shared state handed to every connection task. The cache is the only
/// cross-connection resource; everything else is counters and settings.
pub struct Context {
    pub cache: Arc<Cache>,
    pub metrics: Arc<Metrics>,
    pub cfg: Config,
}

impl Context {
    pub fn new(cfg: Config) -> Arc<Context> {
        let metrics = Arc::new(Metrics::default());
        let cache = Arc::new(Cache::new(cfg.limit, metrics.clone()));
        Arc::new(Context {
            cache,
            metrics,
            cfg,
        })
    }
}

/// Bind the configured address and serve until the task is dropped.
pub async fn run(ctx: Arc<Context>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", ctx.cfg.host, ctx.cfg.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    serve(listener, ctx).await
}

/// Accept loop over an already-bound listener; one task per connection.
pub async fn serve(listener: TcpListener, ctx: Arc<Context>) -> anyhow::Result<()> {
    tracing::info!(
        "listening on {} (limit={})",
        listener.local_addr()?,
        ctx.cfg.limit
    );
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                ctx.metrics.inc_connections();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    tracing::debug!("received connection from {}", peer);
                    match conn::handle_conn(stream, &ctx).await {
                        Ok(()) => tracing::debug!("connection {} closed", peer),
                        Err(e) => tracing::warn!("connection {} error: {:#}", peer, e),
                    }
                });
            }
            Err(e) => tracing::error!("accept error: {}", e),
        }
    }
}
