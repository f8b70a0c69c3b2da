use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    extract::{Host, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{error, info, warn};

use crate::{
    cache::{CachedResponse, MokaResponseCache},
    config::Config,
    keygen::RandomKeyGenerator,
    register::{register, RegisterContext, RegisterError},
    scheme::{ApiResponse, ServerInfo},
    store::{MemoryStore, MySqlStore, RegistrationStore},
};

pub struct AppState {
    pub config: Config,
    pub ctx: RegisterContext,
}

impl AppState {
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn RegistrationStore> = match &config.database_url {
            Some(url) => Arc::new(MySqlStore::connect(url, config.db_max_connections).await?),
            None => {
                warn!("DATABASE_URL is not set, registrations are kept in memory only");
                Arc::new(MemoryStore::new())
            }
        };
        let cache = Arc::new(MokaResponseCache::new(
            config.cache_max_capacity,
            config.cache_ttl,
        ));
        let ctx = RegisterContext::new(store, cache, Arc::new(RandomKeyGenerator));

        Ok(Self { config, ctx })
    }
}

pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let port = config.port;
    let state = Arc::new(AppState::from_config(config).await?);

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    info!("Listening on {}", addr);

    axum::Server::try_bind(&addr)
        .context("Failed to bind")?
        .serve(router(state).into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/favicon.ico", get(|| async {}))
        .route("/ping", get(ping))
        .route("/healthz", get(|| async { "ok" }))
        .route("/info", get(api_info))
        .route("/register", get(api_register))
        .with_state(state)
}

async fn index() -> &'static str {
    "device key registry"
}

async fn ping() -> impl IntoResponse {
    Json(ApiResponse::message(200, "pong"))
}

async fn api_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let devices = state.ctx.store.count().await.unwrap_or_else(|e| {
        warn!("Failed to count devices: {}", e);
        0
    });

    Json(ServerInfo {
        version: env!("CARGO_PKG_VERSION"),
        build: option_env!("BUILD_DATE").unwrap_or(""),
        arch: std::env::consts::ARCH,
        commit: option_env!("GIT_COMMIT").unwrap_or(""),
        devices,
    })
}

/// First value of `name`; repeated parameters are ignored.
fn first_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            self.body,
        )
            .into_response()
    }
}

impl IntoResponse for RegisterError {
    fn into_response(self) -> Response {
        match self {
            RegisterError::Validation(e) => {
                info!("Rejected register request: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::message(400, "missing parameter")),
                )
                    .into_response()
            }
            e => {
                error!("Failed to register: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

async fn api_register(
    State(state): State<Arc<AppState>>,
    Host(host): Host,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<CachedResponse, RegisterError> {
    let origin = match &state.config.public_origin {
        Some(origin) => origin.clone(),
        None => format!("http://{}", host),
    };

    let outcome = register(
        &state.ctx,
        &origin,
        first_param(&params, "key"),
        first_param(&params, "devicetoken"),
    )
    .await?;

    Ok(outcome.response)
}
