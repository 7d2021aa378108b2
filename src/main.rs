use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod error;
mod partition;
mod probe;
mod retry;
mod store;
mod transfer;
mod utils;

use store::HttpStore;
use transfer::{Outcome, TransferConfig, TransferRequest};

#[derive(Parser)]
#[command(name = "rangeput")]
#[command(about = "Transfers a large remote resource into object storage as a multipart upload")]
#[command(version = "1.0")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Transfer {
        #[arg(long, help = "URL of the source resource")]
        url: String,
        #[arg(long, help = "Destination container")]
        container: String,
        #[arg(long, help = "Destination key, defaults to the URL basename")]
        key: Option<String>,
        #[arg(long, help = "Object store endpoint")]
        store: String,
        #[arg(
            long,
            default_value_t = transfer::DEFAULT_CHUNK_SIZE,
            value_parser = clap::value_parser!(u64).range(1..),
            help = "Bytes per part"
        )]
        chunk_size: u64,
        #[arg(
            long,
            default_value_t = transfer::DEFAULT_CONCURRENCY,
            help = "Maximum concurrent part workers"
        )]
        concurrency: usize,
        #[arg(
            long,
            default_value_t = transfer::DEFAULT_MAX_TASKS,
            help = "Maximum number of parts before the transfer is rejected"
        )]
        max_tasks: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Transfer {
            url,
            container,
            key,
            store,
            chunk_size,
            concurrency,
            max_tasks,
        }) => {
            let request = TransferRequest {
                source_url: url,
                container,
                key,
            };
            let config = TransferConfig {
                chunk_size,
                concurrency,
                max_tasks,
                ..TransferConfig::default()
            };

            let result = transfer::transfer(request, HttpStore::new(store), config).await;
            let failed = result.is_err();
            let outcome = Outcome::from(result);
            println!(
                "{}",
                serde_json::to_string(&outcome).expect("outcome is always serializable")
            );
            if failed {
                std::process::exit(1);
            }
        }
        None => {
            println!("Use --help for available commands");
        }
    }
}
