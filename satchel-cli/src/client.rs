//! Renderer-side commands: report, locale.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use satchel::api::{self, BugReportPayload, HttpMethod, HttpOptions, Scheme, SubmitBugReportRequest};
use satchel::{Endpoint, Registry};
use tokio::net::UnixStream;

/// Connection options shared by renderer-side commands.
#[derive(clap::Args)]
pub struct ConnectArgs {
    /// Socket path of the main process.
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Seconds to wait for the reply.
    #[arg(short = 't', long = "timeout", default_value_t = 30)]
    pub timeout: u64,
}

/// Arguments for `satchel report`.
#[derive(clap::Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Support backend host.
    #[arg(long)]
    pub host: String,

    /// Support backend port (default: 443 with --https, else 80).
    #[arg(long)]
    pub port: Option<u16>,

    /// Request path on the backend.
    #[arg(long, default_value = "/api/bug-report")]
    pub path: String,

    /// Use HTTPS.
    #[arg(long)]
    pub https: bool,

    /// Use PUT instead of POST.
    #[arg(long)]
    pub put: bool,

    /// Reporter's contact address.
    #[arg(long)]
    pub email: String,

    /// Short summary.
    #[arg(long)]
    pub subject: String,

    /// Full problem description.
    #[arg(long)]
    pub problem: String,

    /// Compressed log archive to attach.
    #[arg(long)]
    pub logs: Option<PathBuf>,

    /// Extra environment facts (`KEY=VALUE`).
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,
}

pub async fn report(args: ReportArgs) -> Result<()> {
    let mut environment: std::collections::BTreeMap<String, String> = args
        .env
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .with_context(|| format!("invalid --env {pair:?}, expected KEY=VALUE"))
        })
        .collect::<Result<_>>()?;
    environment
        .entry("os".to_owned())
        .or_insert_with(|| std::env::consts::OS.to_owned());

    let request = SubmitBugReportRequest {
        http_options: HttpOptions {
            scheme: if args.https { Scheme::Https } else { Scheme::Http },
            port: args.port.unwrap_or(if args.https { 443 } else { 80 }),
            hostname: args.host,
            path: args.path,
            method: if args.put {
                HttpMethod::Put
            } else {
                HttpMethod::Post
            },
        },
        request_payload: BugReportPayload {
            product: format!("Satchel {}", env!("CARGO_PKG_VERSION")),
            email: args.email,
            subject: args.subject,
            problem: args.problem,
            compressed_logs_file_path: args.logs,
            environment,
        },
    };

    let endpoint = connect(&args.connect).await?;
    within(
        args.connect.timeout,
        endpoint.call(api::SUBMIT_BUG_REPORT, &request),
    )
    .await
    .context("bug report was not accepted")?;
    println!("bug report submitted");
    Ok(())
}

pub async fn locale(args: ConnectArgs) -> Result<()> {
    let endpoint = connect(&args).await?;
    let locale = within(args.timeout, endpoint.call(api::DETECT_SYSTEM_LOCALE, &())).await?;
    println!("{locale}");
    Ok(())
}

/// Connects to the main process as a renderer with no handlers of its own.
async fn connect(args: &ConnectArgs) -> Result<Endpoint> {
    let path = args.socket.clone().unwrap_or_else(crate::default_socket);
    let stream = UnixStream::connect(&path)
        .await
        .with_context(|| format!("connecting to main process at {}", path.display()))?;
    Ok(Endpoint::new(stream, Registry::new().seal()))
}

/// Awaits `call`, giving up after `secs` seconds.
async fn within<T>(secs: u64, call: impl Future<Output = satchel::Result<T>>) -> Result<T> {
    let result = tokio::time::timeout(Duration::from_secs(secs), call)
        .await
        .with_context(|| format!("no reply from main process within {secs}s"))?;
    Ok(result?)
}
