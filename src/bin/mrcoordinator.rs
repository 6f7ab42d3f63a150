use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use map_reduce_rs::mr::coordinator::{Coordinator, CoordinatorRpc};
use tarpc::{server::incoming::Incoming, tokio_serde::formats::Json};
use tracing::info;

/// Launches the coordinator for a MapReduce job over `input_files`.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input files; one map task is created per file.
    #[arg(required = true)]
    input_files: Vec<String>,

    /// Number of reduce partitions.
    #[arg(short = 'r', long = "nreduce")]
    n_reduce: usize,

    /// Watchdog deadline (seconds) before a stalled task is reassigned.
    #[arg(long = "timeout-secs", default_value_t = 10)]
    timeout_secs: u64,

    /// Address to bind the RPC server on.
    #[arg(long, default_value = "127.0.0.1:7707")]
    addr: SocketAddr,
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
    info!(
        map_tasks = args.input_files.len(),
        n_reduce = args.n_reduce,
        "starting coordinator"
    );

    let coordinator = Coordinator::new(
        args.input_files,
        args.n_reduce,
        Duration::from_secs(args.timeout_secs),
    );

    let server_transport = tarpc::serde_transport::tcp::listen(args.addr, Json::default).await?;
    info!(addr = %args.addr, "rpc server listening");

    tokio::spawn(
        server_transport
            .filter_map(|r| async { r.ok() })
            .map(tarpc::server::BaseChannel::with_defaults)
            .execute(coordinator.clone().serve()),
    );

    while !coordinator.done() {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    info!("job complete");
    Ok(())
}
