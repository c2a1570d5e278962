//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo; one task per connection. Bodies are read
//! in full, then handed to the router as an `ApiRequest`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::actions::Desk;
use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::Store;
use crate::reputation::ReputationPolicy;
use crate::routes::{self, ApiRequest, MAX_BODY_BYTES};
use crate::types::{DeskError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub desk: Desk,
    pub jwt: JwtValidator,
    /// Which store backs the desk, for /health
    pub storage: &'static str,
    pub started_at: Instant,
}

impl AppState {
    /// Build state over `store`. Outside dev mode a JWT secret is required.
    pub fn new(args: Args, store: Arc<dyn Store>, storage: &'static str) -> Result<Self> {
        let jwt = match args.jwt_secret.clone() {
            Some(secret) => JwtValidator::new(secret, args.jwt_expiry_seconds)?,
            None if args.dev_mode => {
                warn!("No JWT_SECRET set, using the dev-mode signing key");
                JwtValidator::new_dev()
            }
            None => {
                return Err(DeskError::Config(
                    "JWT_SECRET is required in production mode".into(),
                ))
            }
        };

        let desk = Desk::new(store, ReputationPolicy::from_args(&args));

        Ok(Self {
            args,
            desk,
            jwt,
            storage,
            started_at: Instant::now(),
        })
    }
}

/// Accept connections until the listener fails
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "doubtdesk listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Read one request and route it
pub async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();

    info!("[{}] {} {}", addr, parts.method, path);

    let body = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let err = DeskError::validation(format!("Failed to read body: {}", e));
            return Ok(routes::error_response(&err));
        }
    };

    let api_request = ApiRequest {
        method: parts.method,
        path,
        query: parts.uri.query().map(str::to_string),
        authorization: parts
            .headers
            .get(hyper::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    };

    Ok(routes::dispatch(&state, api_request).await)
}
