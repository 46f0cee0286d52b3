use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use statpilot_advisor::*;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "statpilot-advise")]
#[command(about = "Ask LLM providers which statistical analysis fits a question")]
struct Cli {
    /// Try the local provider before the remote one
    #[arg(long, global = true)]
    prefer_local: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a structured recommendation as JSON
    Recommend(RequestArgs),
    /// Stream a prose answer to stdout
    Stream(RequestArgs),
    /// Classify which workflow a message belongs to
    Classify {
        /// Message to classify
        message: String,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// Research question
    question: String,

    /// JSON array of data rows
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// JSON validation summary
    #[arg(short, long)]
    validation: Option<PathBuf>,

    /// JSON array of assumption-test outcomes
    #[arg(short, long)]
    assumptions: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AdvisorConfig::load_with_precedence()?;
    if cli.prefer_local {
        config.prefer_local = true;
    }
    let orchestrator = RecommendationOrchestrator::from_config(&config);

    match cli.command {
        Commands::Recommend(args) => run_recommend(&orchestrator, args).await?,
        Commands::Stream(args) => run_stream(&orchestrator, args).await?,
        Commands::Classify { message } => run_classify(&orchestrator, &message).await?,
    }

    Ok(())
}

async fn run_recommend(
    orchestrator: &RecommendationOrchestrator,
    args: RequestArgs,
) -> anyhow::Result<()> {
    let request = build_request(args)?;
    let outcome = orchestrator.recommend(&request).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run_stream(
    orchestrator: &RecommendationOrchestrator,
    args: RequestArgs,
) -> anyhow::Result<()> {
    let request = build_request(args)?;
    let cancel = CancellationToken::new();

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let mut stream = orchestrator.stream(request, cancel);
    let mut stdout = std::io::stdout();
    while let Some(item) = stream.next().await {
        match item {
            StreamItem::Chunk(text) => {
                print!("{}", text);
                stdout.flush()?;
            }
            StreamItem::Done(completion) => {
                println!();
                eprintln!("[{} via {}]", completion.model, completion.provider);
            }
            StreamItem::Error(AdvisorError::Cancelled) => {
                println!();
                eprintln!("Cancelled");
            }
            StreamItem::Error(e) => {
                println!();
                return Err(e.into());
            }
        }
    }

    Ok(())
}

async fn run_classify(
    orchestrator: &RecommendationOrchestrator,
    message: &str,
) -> anyhow::Result<()> {
    match orchestrator.classify_intent(message).await? {
        Some(classification) => println!("{}", serde_json::to_string_pretty(&classification)?),
        None => println!("null"),
    }
    Ok(())
}

fn build_request(args: RequestArgs) -> anyhow::Result<RecommendRequest> {
    let mut request = RecommendRequest::new(args.question);
    if let Some(path) = args.validation {
        request = request.with_validation(read_json(&path)?);
    }
    if let Some(path) = args.assumptions {
        request = request.with_assumptions(read_json(&path)?);
    }
    if let Some(path) = args.data {
        request = request.with_data(read_json(&path)?);
    }
    Ok(request)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
