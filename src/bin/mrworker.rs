use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use map_reduce_rs::mr::apps;
use map_reduce_rs::mr::coordinator::CoordinatorRpcClient;
use map_reduce_rs::mr::worker::Worker;
use tarpc::{client, tokio_serde::formats::Json};
use tracing::{error, info};

/// Launches a worker process: poll for a task, execute it, report
/// completion, repeat until the coordinator says the job is done.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Coordinator RPC address.
    #[arg(long, default_value = "127.0.0.1:7707")]
    addr: SocketAddr,

    /// Bundled application to run (`wc` or `indexer`).
    #[arg(long, default_value = "wc")]
    app: String,

    /// Seconds to back off after a WAIT reply.
    #[arg(long = "poll-interval-secs", default_value_t = 1)]
    poll_interval_secs: u64,
}

fn verbosity_level() -> tracing::Level {
    match std::env::var("MR_VERBOSITY")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0)
    {
        0 => tracing::Level::WARN,
        _ => tracing::Level::DEBUG,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(verbosity_level())
        .without_time()
        .init();

    let args = Args::parse();
    let (map_fn, reduce_fn) = match apps::lookup(&args.app) {
        Some(pair) => pair,
        None => {
            error!(app = %args.app, "unknown application");
            std::process::exit(1);
        }
    };

    let client_transport = match tarpc::serde_transport::tcp::connect(args.addr, Json::default).await
    {
        Ok(t) => t,
        Err(e) => {
            error!(addr = %args.addr, error = %e, "failed to connect to coordinator");
            std::process::exit(1);
        }
    };
    let client =
        CoordinatorRpcClient::new(client::Config::default(), client_transport).spawn();

    let worker = Worker::new(
        client,
        map_fn,
        reduce_fn,
        std::env::current_dir()?,
        Duration::from_secs(args.poll_interval_secs),
    );

    match worker.run().await {
        Ok(()) => {
            info!("worker exiting cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "worker exiting after fatal error");
            std::process::exit(1);
        }
    }
}
