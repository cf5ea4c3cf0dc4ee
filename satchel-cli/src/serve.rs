//! `satchel serve`: the main-process endpoint.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use satchel::{Endpoint, Router};
use satchel_main::Uploader;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info};

/// Arguments for `satchel serve`.
#[derive(clap::Args)]
pub struct ServeArgs {
    /// Socket path to listen on.
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Ignore HTTP(S)_PROXY when uploading bug reports.
    #[arg(long)]
    pub no_proxy: bool,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let path = args.socket.unwrap_or_else(crate::default_socket);
    let uploader = if args.no_proxy {
        Uploader::direct()
    } else {
        Uploader::new()
    };
    let router = satchel_main::router(uploader)?;

    clear_stale_socket(&path).await?;
    let listener =
        UnixListener::bind(&path).with_context(|| format!("binding {}", path.display()))?;
    info!(
        socket = %path.display(),
        channels = ?router.channels().collect::<Vec<_>>(),
        "main endpoint listening"
    );

    let result = tokio::select! {
        r = accept_loop(&listener, &router) => r,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted; shutting down");
            Ok(())
        }
    };
    let _ = std::fs::remove_file(&path);
    result
}

/// Serves each renderer connection with its own endpoint.
async fn accept_loop(listener: &UnixListener, router: &Router) -> Result<()> {
    loop {
        let (stream, _addr) = listener.accept().await?;
        let endpoint = Endpoint::new(stream, router.clone());
        debug!("renderer connected");
        tokio::spawn(async move {
            endpoint.closed().await;
            debug!("renderer disconnected");
        });
    }
}

/// Removes a socket file left behind by a previous run.
///
/// Fails if another server still answers on it.
async fn clear_stale_socket(path: &Path) -> Result<()> {
    match UnixStream::connect(path).await {
        Ok(_) => anyhow::bail!("{} is already served by another process", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(_) => std::fs::remove_file(path)
            .with_context(|| format!("removing stale socket {}", path.display())),
    }
}
