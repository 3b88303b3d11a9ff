mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "linkhelper-cli")]
#[command(about = "Resolve share links from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the candidate share links found for a page, without resolving them
    Discover {
        /// Page or share URL to inspect
        url: String,
    },
    /// Run the full pipeline and print the reply a chat would receive
    Resolve {
        /// Page or share URL to resolve
        url: String,

        /// Print bare resolved links, one per line
        #[arg(long)]
        raw: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = linkhelper_core::load_pipeline_config()?;
    let pipeline = linkhelper_scraper::Pipeline::from_config(&config)?;

    match cli.command {
        Commands::Discover { url } => commands::discover(&pipeline, &url).await,
        Commands::Resolve { url, raw } => commands::resolve(&pipeline, &url, raw).await,
    }

    Ok(())
}
