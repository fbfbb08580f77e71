mod config;
mod history;
mod oauth;
mod output;
mod token;

use anyhow::Context;
use chrono::NaiveDate;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, LoginEnvironment, OAuthEnvironment};
use history::search::ConversationSource;
use history::{Extraction, HistoryClient, SearchQuery};

#[derive(StructOpt, Debug)]
#[structopt(
    name = "conversation-history-export",
    about = "Export messaging history conversations to CSV and JSON"
)]
struct Args {
    /// Path to a TOML settings file
    #[structopt(short = "c", long, global = true)]
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Log in to the bot platform and print the bearer token
    Token,

    /// Page through the conversation search and write CSV and JSON output
    Extract {
        /// First day of the range (YYYY-MM-DD)
        #[structopt(long)]
        from: NaiveDate,

        /// Last day of the range (YYYY-MM-DD)
        #[structopt(long)]
        to: NaiveDate,

        /// Restrict the search to a skill; may be repeated
        #[structopt(long = "skill-id")]
        skill_ids: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conversation_history_export=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::from_args();
    let config = Config::load(args.config.as_deref()).await?;
    let http = reqwest::Client::new();

    match args.command {
        Command::Token => {
            let login = LoginEnvironment::from_env()?;
            let outcome = token::fetch_bearer_token(&http, &config.login_url(), &login).await?;
            println!("{outcome}");
        }
        Command::Extract {
            from,
            to,
            skill_ids,
        } => {
            let oauth = OAuthEnvironment::from_env()?.into();
            let client = HistoryClient::new(http, &config.search_url(), oauth)?;
            let query = SearchQuery::new(from, to, skill_ids, config.statuses.clone())?;

            let extraction = run_extraction(&client, &query, &config).await?;
            log_summary(&extraction);
        }
    }

    Ok(())
}

async fn run_extraction<S: ConversationSource>(
    source: &S,
    query: &SearchQuery,
    config: &Config,
) -> anyhow::Result<Extraction> {
    output::write_csv_header(&config.csv_path)?;

    let extraction = history::extract(source, query, config.batch_size).await;

    output::append_csv_batches(
        &config.csv_path,
        &extraction.rows,
        config.batch_size,
        config.batch_delay(),
    )
    .await
    .context("Failed to write CSV output")?;
    output::write_json_snapshot(&config.json_path, &extraction.conversations)
        .context("Failed to write JSON output")?;

    Ok(extraction)
}

fn log_summary(extraction: &Extraction) {
    tracing::info!("Data extraction completed and saved to CSV and JSON.");
    tracing::info!("Total Conversations: {}", extraction.total());
    tracing::info!(
        "Target Conversations (Status: OVERDUE or awaiting agent response): {}",
        extraction.overdue
    );
    tracing::info!("Success Rate: {:.2}%", extraction.success_rate() * 100.0);
}
