use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nsxt_policy::{RetryPolicy, RunnerSettings, WaitPolicy, kind_by_name, run_invocation};

#[derive(Parser)]
#[command(name = "nsxt-policy", version)]
#[command(about = "Realize declared NSX-T Policy resources and report a JSON result")]
struct Args {
    /// Resource kind: dhcp-relay-config or dhcp-server-config
    kind: String,

    /// Invocation parameters as a JSON file, `-` for stdin
    #[arg(short, long, default_value = "-")]
    params: String,

    /// Attempts per request for 5xx and connection failures
    #[arg(long, default_value = "3")]
    retry_attempts: u32,

    /// Backoff before the first retry, doubled per attempt
    #[arg(long, default_value = "1000")]
    retry_backoff_ms: u64,

    /// Upper bound for the retry backoff
    #[arg(long, default_value = "8000")]
    retry_max_backoff_ms: u64,

    /// Realization status poll interval
    #[arg(long, default_value = "10")]
    poll_interval_secs: u64,

    /// How long to wait for realization when do_wait_till_create is set
    #[arg(long, default_value = "300")]
    realization_timeout_secs: u64,

    /// Overall deadline for the invocation
    #[arg(long)]
    invocation_timeout_secs: Option<u64>,

    /// Manager URL scheme (http only for lab managers)
    #[arg(long, default_value = "https")]
    scheme: String,
}

async fn read_params(source: &str) -> Result<Value> {
    let text = if source == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read parameters from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read parameters from {}", source))?
    };
    serde_json::from_str(&text).context("Parameters are not valid JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the JSON result; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("nsxt_policy=info".parse()?)
                .add_directive("audit=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let kind = kind_by_name(&args.kind)
        .with_context(|| format!("Unknown resource kind: {}", args.kind))?;

    let settings = RunnerSettings {
        retry: RetryPolicy {
            max_attempts: args.retry_attempts,
            initial_backoff: Duration::from_millis(args.retry_backoff_ms),
            max_backoff: Duration::from_millis(args.retry_max_backoff_ms),
        },
        wait: WaitPolicy {
            poll_interval: Duration::from_secs(args.poll_interval_secs),
            timeout: Duration::from_secs(args.realization_timeout_secs),
        },
        invocation_timeout: args.invocation_timeout_secs.map(Duration::from_secs),
        scheme: args.scheme,
    };

    let params = read_params(&args.params).await?;
    info!("Realizing {}", kind.resource_type());

    let outcome = run_invocation(kind.as_ref(), params, &settings).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome.to_output(kind.output_key()))?
    );

    if outcome.failed() {
        std::process::exit(1);
    }
    Ok(())
}
