use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use supply_query::{AssistantConfig, SupplyAssistant};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "supply-query")]
#[command(about = "Ask natural-language questions about a hospital supply log")]
struct Args {
    /// JSON config file (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Supply log CSV, overrides the config value
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Answer a single query and exit
    #[arg(long, short)]
    query: Option<String>,
}

fn load_config(args: &Args) -> Result<AssistantConfig> {
    let mut config = match &args.config {
        Some(path) => AssistantConfig::from_file(path).map_err(|e| anyhow!(e))?,
        None => {
            let mut config = AssistantConfig::default();
            config.apply_env();
            config
        }
    };
    if let Some(csv) = &args.csv {
        config.data.csv_file = csv.clone();
    }
    config.validate().map_err(|e| anyhow!("Invalid config: {}", e))?;
    Ok(config)
}

/// One question, one answer. Errors end the turn, not the session.
async fn run_turn(assistant: &SupplyAssistant, query: &str) {
    let route = match assistant.route(query).await {
        Ok(route) => route,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return;
        }
    };
    println!("Query Type: {}", route);

    match assistant.answer_routed(&route, query).await {
        Ok(reply) => println!("\nAnswer:\n{}", reply),
        Err(e) => eprintln!("Error: {:#}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if !config.data.csv_file.exists() {
        bail!("Missing CSV file: {}", config.data.csv_file.display());
    }

    let assistant = SupplyAssistant::from_config(&config)?;
    if !assistant.llm_ready().await {
        let info = assistant.provider_info();
        tracing::warn!(
            provider = %info.name,
            "LLM provider is not ready, check llm.api_key_env"
        );
    }

    if let Some(query) = &args.query {
        run_turn(&assistant, query).await;
        return Ok(());
    }

    println!("Hospital Supply Query Assistant");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nAsk your query (or type 'exit'): ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") {
            break;
        }
        if query.is_empty() {
            continue;
        }
        run_turn(&assistant, query).await;
    }

    Ok(())
}
