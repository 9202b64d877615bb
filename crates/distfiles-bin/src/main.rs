//! distfiles - accept verified uploads of release artifacts over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use distfiles_upload::config::{DEFAULT_AUTH_REALM, DEFAULT_MAX_UPLOAD_SIZE};
use distfiles_upload::{server, Settings, UploadPipeline};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "distfiles=info,distfiles_upload=info,tower_http=info";

/// Serve the distfiles upload endpoint.
#[derive(Parser, Debug)]
#[command(name = "distfiles", version, about)]
struct Args {
    /// Realm announced to clients that fail authentication.
    #[arg(long, env = "DISTFILES_AUTH_REALM", default_value = DEFAULT_AUTH_REALM)]
    auth_realm: String,

    /// Token clients send as their Basic auth username.
    #[arg(long, env = "DISTFILES_AUTH_TOKEN", hide_env_values = true)]
    auth_token: String,

    /// Address to listen on. A leading `:` listens on all interfaces.
    #[arg(long, env = "DISTFILES_LISTEN_ADDR", default_value = ":8000")]
    listen_addr: String,

    /// Root of the artifact tree.
    #[arg(long, env = "DISTFILES_STORAGE_DIR", default_value = "data")]
    storage_dir: PathBuf,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "DISTFILES_MAX_UPLOAD_SIZE", default_value_t = DEFAULT_MAX_UPLOAD_SIZE)]
    max_upload_size: usize,
}

impl Args {
    fn settings(&self) -> Settings {
        Settings {
            auth_realm: self.auth_realm.clone(),
            auth_token: self.auth_token.clone(),
            storage_dir: self.storage_dir.clone(),
            max_upload_size: self.max_upload_size,
        }
    }
}

/// `:8000` listens on every interface.
fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    let settings = args.settings();
    settings
        .prepare()
        .context("invalid configuration")?;
    tracing::info!("storing artifacts in {}", settings.storage_dir.display());

    let pipeline = Arc::new(UploadPipeline::new(Arc::new(settings)));

    let addr = normalize_listen_addr(&args.listen_addr);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to listen on {addr}"))?;

    server::serve(listener, server::router(pipeline)).await?;
    Ok(())
}
