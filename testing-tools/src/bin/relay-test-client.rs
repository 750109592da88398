use anyhow::Result;
use clap::Parser;
use colored::*;

use testing_tools::api_client::ApiClient;
use testing_tools::output::print_test_summary;
use testing_tools::scenarios;
use testing_tools::ws_client::Connection;

#[derive(Parser)]
#[command(name = "relay-test-client")]
#[command(about = "Relay Integration Testing Tool")]
struct Cli {
    /// Base URL of the ingress API (e.g., http://localhost:3030)
    #[arg(long)]
    base_url: String,

    /// Socket URL (e.g., ws://localhost:3030/socket)
    #[arg(long)]
    socket_url: String,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Test socket connection and keep-alive without sending messages
    ConnectionTest,
    /// Test delivery of a targeted message to one entity
    TargetedDelivery,
    /// Test client-scoped and global broadcasts
    Broadcast,
    /// Run all tests
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

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    let api_client = ApiClient::new(reqwest::Client::new(), cli.base_url.clone());
    let health = api_client.health().await?;
    if health["router"] != true {
        anyhow::bail!("Relay router is not attached: {health}");
    }
    println!("{} Relay is healthy", "✓".green());

    // Unique ids so repeated runs against one relay do not see each other's cache
    let run_id = uuid::Uuid::new_v4().simple().to_string();
    let client1_id = format!("test-client-1-{run_id}");
    let client2_id = format!("test-client-2-{run_id}");
    let entity_type = "test-entity";
    let entity_id = format!("entity-{run_id}");

    println!("\n{} Establishing socket connections...", "→".blue());
    let mut conn1 = Connection::establish(&cli.socket_url, "Client 1".to_string()).await?;
    let mut conn2 = Connection::establish(&cli.socket_url, "Client 2".to_string()).await?;

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();
    results.push(scenarios::test_connection(&api_client, &mut conn1, &mut conn2).await?);

    conn1.register(&client1_id, &[(entity_type, entity_id.as_str())])?;
    conn2.register(&client2_id, &[])?;
    conn1
        .wait_for_update("REGISTER_CONFIRMATION", std::time::Duration::from_secs(5))
        .await?;
    conn2
        .wait_for_update("REGISTER_CONFIRMATION", std::time::Duration::from_secs(5))
        .await?;
    println!("{} Both clients registered", "✓".green());

    match cli.scenario {
        ScenarioChoice::ConnectionTest => {}
        ScenarioChoice::TargetedDelivery => {
            results.push(
                scenarios::test_targeted_delivery(
                    &api_client,
                    &mut conn1,
                    &mut conn2,
                    entity_type,
                    &entity_id,
                )
                .await?,
            );
        }
        ScenarioChoice::Broadcast => {
            results.push(
                scenarios::test_broadcast(&api_client, &mut conn1, &mut conn2, &client2_id).await?,
            );
        }
        ScenarioChoice::All => {
            results.push(
                scenarios::test_targeted_delivery(
                    &api_client,
                    &mut conn1,
                    &mut conn2,
                    entity_type,
                    &entity_id,
                )
                .await?,
            );
            results.push(
                scenarios::test_broadcast(&api_client, &mut conn1, &mut conn2, &client2_id).await?,
            );
        }
    }

    conn1.close()?;
    conn2.close()?;

    // Print summary
    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);
    if !all_passed {
        std::process::exit(1);
    }

    Ok(())
}
