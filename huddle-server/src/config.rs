use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::Parser;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, Clone, Parser)]
#[command(name = "huddle-server", about = "Room-code signaling relay for peer meshes")]
pub struct ServerConfig {
    /// Address the HTTP/websocket listener binds to.
    #[arg(long, env = "HUDDLE_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// tracing-subscriber filter directive.
    #[arg(long = "log", env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,

    /// Single origin allowed by CORS. Any origin when unset.
    #[arg(long, env = "HUDDLE_ALLOW_ORIGIN")]
    pub allow_origin: Option<String>,
}

impl ServerConfig {
    pub fn cors_layer(&self) -> Result<CorsLayer> {
        let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

        match &self.allow_origin {
            Some(origin) => {
                let origin: HeaderValue = origin
                    .parse()
                    .with_context(|| format!("invalid --allow-origin value `{}`", origin))?;
                Ok(cors.allow_origin(origin))
            }
            None => Ok(cors.allow_origin(Any)),
        }
    }
}
