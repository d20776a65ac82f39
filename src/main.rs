// src/main.rs
mod browser;
mod extractors;
mod llm;
mod pipeline;
mod storage;
mod utils;

use std::path::PathBuf;

use browser::{ChromeSession, MarkerSpec};
use clap::{Args, Parser, Subcommand};
use llm::{GroqClient, DEFAULT_MODEL};
use pipeline::directory::DEFAULT_BASE_URL;
use pipeline::gatherer::{DEFAULT_CATEGORIES_FILE, DEFAULT_OUTPUT_FILE};
use pipeline::{CompanyGatherer, DirectoryOptions, DirectoryPipeline, GatherOptions};
use storage::StorageManager;
use utils::AppError;

/// Fusion Energy Base supply-chain scraper and Israeli company gatherer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape the supply-chain directory and its company pages
    Scrape(ScrapeArgs),
    /// Ask a language model for Israeli companies in every scraped subcategory
    Gather(GatherArgs),
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    /// Run the browser without a window
    #[arg(long)]
    headless: bool,

    /// Only gather categories and subcategories, do not visit company pages
    #[arg(long)]
    just_gather_categories: bool,

    /// Output directory for CSV and debug files
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Site root; the listing is read from {base_url}/supply-chain
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// CSS selector of category headings
    #[arg(long, default_value = ".h2-responsive")]
    category_selector: String,

    /// CSS selector of subcategory headings
    #[arg(long, default_value = ".h2-bold")]
    subcategory_selector: String,

    /// Debug mode - save an annotated copy of the listing page
    #[arg(short, long)]
    debug: bool,
}

#[derive(Args, Debug)]
struct GatherArgs {
    /// Categories CSV written by `scrape`
    #[arg(long, default_value = DEFAULT_CATEGORIES_FILE)]
    categories_file: PathBuf,

    /// Where to write the gathered companies
    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    output_file: PathBuf,

    /// Limit processing to the first n subcategories
    #[arg(long)]
    limit: Option<usize>,

    /// Groq model id
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Do not echo model answers while they stream
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Environment (.env is optional) and logging (reads RUST_LOG)
    let dotenv = dotenvy::dotenv();
    utils::logging::setup_logging();
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    // 2. Parse CLI arguments
    let cli = Cli::parse();
    tracing::info!("Starting with args: {:?}", cli);

    match cli.command {
        Command::Scrape(args) => scrape(args).await,
        Command::Gather(args) => gather(args).await,
    }
}

async fn scrape(args: ScrapeArgs) -> Result<(), AppError> {
    let options = DirectoryOptions {
        markers: MarkerSpec {
            category_selector: args.category_selector,
            subcategory_selector: args.subcategory_selector,
            ..MarkerSpec::default()
        },
        just_gather_categories: args.just_gather_categories,
        debug: args.debug,
        ..DirectoryOptions::new(args.base_url)
    };
    let mut pipeline = DirectoryPipeline::new(options)?;
    let storage = StorageManager::new(&args.output_dir)?;
    let session = ChromeSession::launch(args.headless).await?;

    let outcome = tokio::select! {
        result = pipeline.run(&session, &storage) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let result = match outcome {
        Some(result) => result,
        None => {
            tracing::warn!("Scraping interrupted by user, saving partial results");
            pipeline.save_companies(&storage).map(|_| ())
        }
    };
    session.close().await;
    result?;
    Ok(())
}

async fn gather(args: GatherArgs) -> Result<(), AppError> {
    let client = GroqClient::from_env(&args.model, !args.quiet)?;
    let mut gatherer = CompanyGatherer::new(GatherOptions {
        limit: args.limit,
        ..GatherOptions::default()
    });

    let interrupted = tokio::select! {
        _ = gatherer.run(&client, &args.categories_file) => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        tracing::warn!("Operation interrupted by user, saving partial results");
    }

    gatherer.save(&args.output_file)?;
    Ok(())
}
