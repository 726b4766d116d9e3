//! Command-line driver for the staged equity analysis
//!
//! # Usage
//!
//! ```bash
//! export FINNHUB_API_KEY="..."
//! export OPENAI_API_BASE="http://localhost:1234/v1"
//! export OPENAI_MODEL="your-model-name"
//!
//! # One analysis, then a follow-up question
//! equity analyze --ticker AAPL --query "Where is AAPL heading?" --followup "Why?"
//!
//! # Interactive session
//! equity chat
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use equity_analysis::api::{
    FinnhubNewsProvider, OpenAiTextGenerator, RedditSocialProvider, YahooPriceProvider,
};
use equity_analysis::{AnalysisConfig, AnalysisPipeline, InMemoryNewsIndex};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "equity")]
#[command(about = "Multi-stage equity analysis", long_about = None)]
struct Args {
    /// User id that owns the session (random when omitted)
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run all four stages for one ticker and print each result
    Analyze {
        #[arg(short, long)]
        ticker: String,

        #[arg(short, long)]
        query: String,

        /// Follow-up questions asked after the analysis completes
        #[arg(short, long)]
        followup: Vec<String>,
    },
    /// Interactive session: `/analyze <ticker> <question>`, then free-form follow-ups
    Chat,
}

fn build_pipeline(config: AnalysisConfig) -> anyhow::Result<AnalysisPipeline> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("failed to build HTTP client")?;

    let index = Arc::new(InMemoryNewsIndex::new());
    let finnhub = FinnhubNewsProvider::new(
        client.clone(),
        config.require_finnhub_api_key()?,
        config.finnhub_rate_limit,
    )
    .with_index(Arc::clone(&index));
    let reddit = RedditSocialProvider::new(client.clone(), config.reddit_user_agent.clone());
    let generator = OpenAiTextGenerator::new(client, &config);

    let pipeline = AnalysisPipeline::builder()
        .prices(Arc::new(YahooPriceProvider::new()?))
        .news_search(index)
        .bulk_news(Arc::new(finnhub))
        .social(Arc::new(reddit))
        .generator(Arc::new(generator))
        .config(config)
        .build()?;
    Ok(pipeline)
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_stages(
    pipeline: &AnalysisPipeline,
    user_id: &str,
    ticker: &str,
    query: &str,
) -> anyhow::Result<()> {
    print_json(&pipeline.begin_historical(user_id, ticker, query).await?)?;
    print_json(&pipeline.fetch_news(user_id, ticker, query).await?)?;
    print_json(&pipeline.fetch_social(user_id, ticker, query).await?)?;
    print_json(&pipeline.finalize(user_id, ticker, query).await?)?;
    Ok(())
}

async fn chat(pipeline: &AnalysisPipeline, user_id: &str) -> anyhow::Result<()> {
    println!("Commands: /analyze <ticker> <question>, /exit. Other input is a follow-up.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut current: Option<String> = None;

    loop {
        print!("{}> ", current.as_deref().unwrap_or(""));
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/exit" {
            break;
        }

        if let Some(rest) = input.strip_prefix("/analyze") {
            let mut parts = rest.trim().splitn(2, char::is_whitespace);
            let ticker = parts.next().unwrap_or_default().to_uppercase();
            let query = parts.next().unwrap_or_default().trim().to_string();
            if ticker.is_empty() || query.is_empty() {
                println!("Usage: /analyze <ticker> <question>");
                continue;
            }
            match run_stages(pipeline, user_id, &ticker, &query).await {
                Ok(()) => current = Some(ticker),
                Err(e) => eprintln!("Error: {e}"),
            }
            continue;
        }

        let Some(ticker) = current.as_deref() else {
            println!("Run /analyze first");
            continue;
        };
        match pipeline.followup(user_id, ticker, input).await {
            Ok(result) => print_json(&result)?,
            Err(e) => eprintln!("Error: {e}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    equity_utils::init_tracing();
    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!("Failed to load .env: {e}");
        }
    }

    let args = Args::parse();
    let user_id = args.user.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let config = AnalysisConfig::builder().with_env_keys().build()?;
    info!(user_id = %user_id, model = %config.model, "Starting equity analysis");
    let pipeline = build_pipeline(config)?;

    match args.command {
        Command::Analyze {
            ticker,
            query,
            followup,
        } => {
            run_stages(&pipeline, &user_id, &ticker, &query).await?;
            for question in followup {
                print_json(&pipeline.followup(&user_id, &ticker, &question).await?)?;
            }
        }
        Command::Chat => chat(&pipeline, &user_id).await?,
    }

    Ok(())
}
