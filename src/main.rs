use bytes::Bytes;
use clap::Parser;
use ferrumroute::trace::{FileTraceSink, LogTraceSink, TraceSink};
use ferrumroute::{Registry, Routing, StaticTopics, TcpConnector};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Send one operation through a topic's dispatcher
#[derive(Parser, Debug)]
#[command(name = "ferrumroute", version, about)]
struct Cli {
    /// JSON topic configuration
    #[arg(short, long, default_value = "config/topics.json")]
    config: PathBuf,

    /// Topic to dispatch through
    #[arg(short, long, default_value = "redisBase")]
    topic: String,

    /// Append trace lines to this file (topics with `debug` enabled)
    #[arg(long)]
    trace_file: Option<PathBuf>,

    /// Send to the first node of the pool instead of hashing the key
    #[arg(long)]
    first_node: bool,

    /// Operation followed by its arguments, e.g. `SET user:1 alice`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let topics = match StaticTopics::from_path(&cli.config) {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let trace: Arc<dyn TraceSink> = match &cli.trace_file {
        Some(path) => match FileTraceSink::new(path) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                error!("Failed to open trace file {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Arc::new(LogTraceSink),
    };

    let registry = Registry::new(Arc::new(topics), Arc::new(TcpConnector)).with_trace_sink(trace);

    let dispatcher = match registry.get(&cli.topic) {
        Ok(d) => d,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let Some((op, rest)) = cli.command.split_first() else {
        error!("No operation given");
        std::process::exit(2);
    };
    let args: Vec<Bytes> = rest.iter().map(|a| Bytes::from(a.clone())).collect();
    let routing = if cli.first_node {
        Routing::FirstNode
    } else {
        Routing::Hashed
    };

    info!("Dispatching {} through topic '{}'", op, cli.topic);
    match dispatcher.dispatch_with(op, &args, routing).await {
        Ok(reply) => println!("{}", reply),
        Err(e) => {
            eprintln!("(failed) {}", e);
            std::process::exit(1);
        }
    }
}
