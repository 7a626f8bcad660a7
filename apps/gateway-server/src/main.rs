mod config;
mod logging;
mod proxy;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use api_gateway::{
    ApiGatewayConfig, AuthState, AuthzState, ResourceExtractor, TracingAuditor,
    apply_security_layers,
};
use authn_resolver::{HttpJwksFetcher, IssuerRegistry, JwkCache, JwtAuthenticator};
use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayServerConfig;
use crate::proxy::Upstream;

/// Authenticating, policy-enforcing gateway in front of the flag management API.
#[derive(Parser)]
#[command(name = "gateway-server", version)]
struct Cli {
    /// YAML configuration file; `GATEWAY__*` environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = GatewayServerConfig::load(cli.config.as_deref())?;
    logging::init(&cfg.logging)?;
    run(cfg).await
}

async fn run(cfg: GatewayServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = cfg
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address '{}'", cfg.server.bind_addr))?;

    let security = &cfg.api_gateway.security;
    let registry = Arc::new(
        IssuerRegistry::from_config(security).context("failed to build issuer registry")?,
    );
    let fetch_timeout = Duration::from_millis(security.key_fetch_timeout_ms);
    let fetcher = Arc::new(HttpJwksFetcher::new(fetch_timeout).context("failed to build JWKS client")?);
    let keys = Arc::new(JwkCache::new(fetcher, fetch_timeout));

    let endpoints = registry.jwks_endpoints();
    let loaded = keys.load_all_endpoints(&endpoints).await;
    tracing::info!(loaded, total = endpoints.len(), issuers = registry.len(), "key sets preloaded");
    keys.refresh_endpoints(
        endpoints,
        Duration::from_secs(security.jwks_refresh_interval_secs),
    );

    let authenticator = JwtAuthenticator::new(registry, keys.clone()).with_leeway(security.leeway_secs);
    let router = build_router(&cfg, Arc::new(authenticator))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, upstream = %cfg.server.upstream_url, "gateway listening");

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    keys.shutdown().await;
    tracing::info!("gateway stopped");
    served
}

fn build_router(
    cfg: &GatewayServerConfig,
    authenticator: Arc<JwtAuthenticator>,
) -> anyhow::Result<Router> {
    let ApiGatewayConfig {
        api_prefix,
        security,
        policy_timeout_ms,
    } = &cfg.api_gateway;

    let authorizer =
        authz_resolver::build_authorizer(&cfg.authorizer).context("failed to build authorizer")?;
    let upstream = Upstream::new(&cfg.server.upstream_url).context("failed to build upstream client")?;

    let authn = AuthState::with_enforce(authenticator, security.enforce);
    let authz = AuthzState {
        authorizer,
        auditor: Arc::new(TracingAuditor::new()),
        extractor: Arc::new(ResourceExtractor::new(api_prefix.as_str())),
        trusted_issuer: security.internal_issuer.clone(),
        policy_timeout: Duration::from_millis(*policy_timeout_ms),
    };

    let protected = Router::new()
        .fallback(proxy::forward)
        .with_state(Arc::new(upstream));
    let protected = apply_security_layers(protected, authn, authz);

    // `Router::layer` makes the last added layer the outermost one:
    // Trace -> BodyLimit -> (healthz | authn -> authz -> forward)
    Ok(Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(cfg.server.body_limit_bytes))
        .layer(TraceLayer::new_for_http()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
