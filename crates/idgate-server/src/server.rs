use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use idgate_auth::federation::{FederationService, ProviderRegistry};
use idgate_auth::identity::{AnonymousAuthenticator, TrustedHeaderAuthenticator, UserAuthenticator};
use idgate_auth::oauth::AuthorizationService;
use idgate_auth::storage::{AuthorizationCodeStorage, InMemoryClientStorage, InMemoryCodeStorage};
use idgate_auth::{AuthResult, AuthState, auth_router};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;

pub struct IdgateServer {
    addr: SocketAddr,
    app: Router,
    codes: Arc<dyn AuthorizationCodeStorage>,
    cleanup_interval: Duration,
}

/// Builds the auth state from configuration: providers through `registry`,
/// in-memory client and code stores, and the configured user source.
pub fn build_state(cfg: &AppConfig, registry: &ProviderRegistry) -> AuthResult<AuthState> {
    let auth = &cfg.auth;

    let federation = FederationService::from_config(registry, &auth.providers)?;

    let clients = InMemoryClientStorage::from_clients(auth.authorization.clients.iter().cloned());
    let authorization = AuthorizationService::new(
        Arc::new(clients),
        Arc::new(InMemoryCodeStorage::new()),
    )
    .with_code_lifetime(auth.authorization.code_lifetime);

    let authenticator: Arc<dyn UserAuthenticator> = match &auth.authorization.trusted_user_header {
        Some(header) => Arc::new(TrustedHeaderAuthenticator::new(header)?),
        None => {
            tracing::warn!("no trusted_user_header configured; authorization requests will be rejected");
            Arc::new(AnonymousAuthenticator)
        }
    };

    Ok(AuthState::new(Arc::new(authorization), Arc::new(federation), authenticator)
        .with_revoke_provider_tokens(auth.revoke_provider_tokens))
}

pub fn build_app(state: AuthState) -> Router {
    auth_router(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<_>| {
                use tracing::field::Empty;
                // Query strings carry authorization codes and state.
                tracing::info_span!(
                    "http.request",
                    http.method = %req.method(),
                    http.path = %req.uri().path(),
                    http.status_code = Empty,
                )
            })
            .on_response(
                |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                    span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                    tracing::info!(
                        http.status = %res.status().as_u16(),
                        elapsed_ms = %latency.as_millis(),
                        "request handled"
                    );
                },
            ),
    )
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self, registry: &ProviderRegistry) -> AuthResult<IdgateServer> {
        let state = build_state(&self.config, registry)?;
        let codes = state.authorization.code_storage();

        Ok(IdgateServer {
            addr: self.addr,
            app: build_app(state),
            codes,
            cleanup_interval: self.config.auth.authorization.cleanup_interval,
        })
    }
}

impl IdgateServer {
    pub async fn run(self) -> anyhow::Result<()> {
        if !self.cleanup_interval.is_zero() {
            tokio::spawn(cleanup_expired_codes(self.codes.clone(), self.cleanup_interval));
        }

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn cleanup_expired_codes(codes: Arc<dyn AuthorizationCodeStorage>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match codes.cleanup_expired().await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "expired authorization codes removed"),
            Err(e) => tracing::warn!(error = %e, "authorization code cleanup failed"),
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
