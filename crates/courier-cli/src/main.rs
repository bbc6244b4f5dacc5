//! courier - sample sender and consumers over the in-memory transports.
//!
//! ```text
//! courier poll --events 5
//! courier push --events 20 --max-concurrent-calls 4
//! RUST_LOG=courier_core=debug courier poll
//! ```

mod sample;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use courier_core::impls::{HandlerContainer, InMemoryPushQueue, InMemoryQueue};
use courier_core::ports::QueueSender;
use courier_core::{EngineBuilder, MessagingOptions, PollOptions, PushOptions, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::sample::{AcceptEvent, AcceptEventHandler, Progress};

#[derive(Parser, Debug)]
#[command(author, version, about = "Event dispatch samples over in-memory queues", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll consumer with adaptive backoff
    Poll(RunArgs),
    /// Push consumer bound to the transport
    Push(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// TOML file with messaging options; COURIER_* variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many events were handled (0 runs until ctrl-c)
    #[arg(short, long, default_value = "10")]
    events: usize,

    /// Pause between two sends, in milliseconds
    #[arg(long, default_value = "500")]
    send_interval_ms: u64,

    /// Simulated handler work, in milliseconds
    #[arg(long, default_value = "200")]
    work_ms: u64,

    /// Overrides max_concurrent_calls (push only)
    #[arg(long)]
    max_concurrent_calls: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Poll(args) => run(Transport::Poll, args).await,
        Command::Push(args) => run(Transport::Push, args).await,
    }
}

#[derive(Debug, Clone, Copy)]
enum Transport {
    Poll,
    Push,
}

fn load_options(args: &RunArgs) -> anyhow::Result<MessagingOptions> {
    let mut options = match &args.config {
        Some(path) => MessagingOptions::from_file(path)?,
        None => MessagingOptions {
            queue_name: "courier-sample".to_string(),
            ..MessagingOptions::default()
        },
    };
    options.apply_env_overrides()?;
    if let Some(calls) = args.max_concurrent_calls {
        options.max_concurrent_calls = calls;
    }
    options.validate().context("invalid messaging options")?;
    Ok(options)
}

async fn run(transport: Transport, args: RunArgs) -> anyhow::Result<()> {
    let options = load_options(&args)?;
    info!(?transport, queue = %options.queue_name, "starting sample");

    let done = CancellationToken::new();
    let progress = Progress::new(args.events, done.clone());

    let mut container = HandlerContainer::new();
    let work = Duration::from_millis(args.work_ms);
    let handler_progress = progress.clone();
    container.provide(move || AcceptEventHandler {
        work,
        progress: handler_progress.clone(),
    });

    let engine = EngineBuilder::new()
        .subscribe::<AcceptEvent, AcceptEventHandler>()?
        .expect_events(&["Accept"])
        .build(Arc::new(container))?;

    let queue = Arc::new(InMemoryQueue::with_visibility_timeout(
        options.queue_name.clone(),
        options.visibility_timeout(),
    ));
    queue.create_if_absent().await?;
    let sender = engine.sender(queue.clone());
    let send_interval = Duration::from_millis(args.send_interval_ms);
    let producer = tokio::spawn(produce(sender, send_interval, done.clone()));

    match transport {
        Transport::Poll => {
            let consumer = Arc::new(engine.poll_consumer(queue.clone(), PollOptions::from(&options)));
            let handle = consumer.spawn(done.clone());
            wait_for_shutdown(&done).await;
            handle.await.context("poll consumer task panicked")??;
        }
        Transport::Push => {
            let push_queue = Arc::new(InMemoryPushQueue::new(queue.clone(), options.max_concurrent_calls));
            let consumer = engine.push_consumer(push_queue, PushOptions::from(&options));
            consumer.start().await?;
            wait_for_shutdown(&done).await;
            consumer.stop().await?;
        }
    }

    if let Err(err) = producer.await {
        warn!(error = %err, "producer task panicked");
    }
    info!(handled = progress.handled(), left_in_queue = queue.len().await, "sample finished");
    Ok(())
}

async fn produce(sender: Sender, interval: Duration, done: CancellationToken) {
    let mut sequence = 0u64;
    while !done.is_cancelled() {
        sequence += 1;
        let event = AcceptEvent {
            transaction_id: format!("tx-{sequence:05}"),
        };
        match sender.send(&event).await {
            Ok(message_id) => info!(%message_id, transaction_id = %event.transaction_id, "sent"),
            Err(err) => error!(error = %err, "send failed"),
        }
        tokio::select! {
            _ = done.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

async fn wait_for_shutdown(done: &CancellationToken) {
    tokio::select! {
        _ = done.cancelled() => info!("target reached, shutting down"),
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                error!(error = %err, "failed to listen for ctrl-c");
            }
            info!("ctrl-c received, shutting down");
            done.cancel();
        }
    }
}
