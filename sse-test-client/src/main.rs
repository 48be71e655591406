use anyhow::Result;
use clap::Parser;
use colored::*;

mod api_client;
mod output;
mod scenarios;
mod sse_client;

use api_client::ApiClient;
use output::print_test_summary;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "SSE relay integration testing tool")]
struct Cli {
    /// Base URL of the node that holds the stream (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// Base URL of the node that receives posted messages. Point it at a
    /// different node than `--base-url` to exercise cross-node delivery.
    #[arg(long)]
    post_url: Option<String>,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Open a stream and check the handshake
    ConnectionTest,
    /// Post a message and wait for the stream to emit it
    RelayRoundtrip,
    /// Post to a session id nobody holds
    UnknownSession,
    /// Post without a sessionId
    MissingSessionId,
    /// Run every scenario
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    let post_url = cli.post_url.clone().unwrap_or_else(|| cli.base_url.clone());

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());
    println!("{} Streams from {}", "→".blue(), cli.base_url);
    println!("{} Messages to {}", "→".blue(), post_url);

    let api_client = ApiClient::new(reqwest::Client::new(), post_url.clone());

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::ConnectionTest => {
            results.push(scenarios::test_connection(&cli.base_url).await?);
        }
        ScenarioChoice::RelayRoundtrip => {
            results.push(
                scenarios::test_relay_roundtrip(&cli.base_url, &post_url, &api_client).await?,
            );
        }
        ScenarioChoice::UnknownSession => {
            results.push(scenarios::test_unknown_session(&api_client).await?);
        }
        ScenarioChoice::MissingSessionId => {
            results.push(scenarios::test_missing_session_id(&api_client).await?);
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_connection(&cli.base_url).await?);
            results.push(
                scenarios::test_relay_roundtrip(&cli.base_url, &post_url, &api_client).await?,
            );
            results.push(scenarios::test_unknown_session(&api_client).await?);
            results.push(scenarios::test_missing_session_id(&api_client).await?);
        }
    }

    // Print summary
    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
