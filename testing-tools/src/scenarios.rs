use anyhow::Result;
use colored::*;
use std::time::{Duration, Instant};

use crate::api_client::ApiClient;
use crate::output::{print_update, TestResult};
use crate::ws_client::Connection;

const WAIT: Duration = Duration::from_secs(5);

pub async fn test_connection(
    api_client: &ApiClient,
    conn1: &mut Connection,
    conn2: &mut Connection,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Connection Test ===".bright_cyan().bold());
    println!(
        "{}",
        "Testing socket connectivity and registration without sending messages".bright_white()
    );

    for conn in [&mut *conn1, &mut *conn2] {
        if let Err(e) = conn.wait_for_update("WELCOME", WAIT).await {
            println!("{} {} never welcomed: {}", "✗".red(), conn.label, e);
            return Ok(TestResult::fail(
                "connection_test",
                format!("{}: {}", conn.label, e),
                start.elapsed(),
            ));
        }
        println!("{} {} welcomed", "✓".green(), conn.label);
    }

    // Wait a bit to ensure connections are stable
    println!(
        "{} Waiting 2 seconds to verify connections stay alive...",
        "→".blue()
    );
    tokio::time::sleep(Duration::from_secs(2)).await;

    let health = api_client.health().await?;
    let connections = health["connections"].as_u64().unwrap_or(0);
    println!("{} Relay reports {} connection(s)", "✓".green(), connections);

    if connections < 2 {
        return Ok(TestResult::fail(
            "connection_test",
            format!("Expected at least 2 live connections, relay reports {connections}"),
            start.elapsed(),
        ));
    }

    Ok(TestResult::pass(
        "connection_test",
        Some("Socket connections established and maintained successfully".to_string()),
        start.elapsed(),
    ))
}

pub async fn test_targeted_delivery(
    api_client: &ApiClient,
    conn1: &mut Connection,
    conn2: &mut Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Targeted Delivery ===".bright_cyan().bold());

    println!("{} Sending STATUS to {} {}...", "→".blue(), entity_type, entity_id);
    let message = format!("status for {entity_id}");
    api_client
        .send_to_entity("STATUS", entity_type, entity_id, &message)
        .await?;

    println!(
        "{} Waiting for {} to receive STATUS update...",
        "→".blue(),
        conn1.label
    );

    let update = match conn1.wait_for_update("STATUS", WAIT).await {
        Ok(update) => update,
        Err(e) => {
            println!("{} Timeout waiting for update: {}", "✗".red(), e);
            return Ok(TestResult::fail(
                "targeted_delivery",
                format!("Timeout: {}", e),
                start.elapsed(),
            ));
        }
    };
    print_update(&conn1.label, &update);

    if update.data["message"] != message.as_str() || update.data["entityId"] != entity_id {
        println!("{} Update data mismatch!", "✗".red());
        return Ok(TestResult::fail(
            "targeted_delivery",
            format!("Expected message={message}, got {}", update.data),
            start.elapsed(),
        ));
    }

    if let Err(e) = conn2.expect_no_update("STATUS", Duration::from_millis(500)).await {
        return Ok(TestResult::fail(
            "targeted_delivery",
            e.to_string(),
            start.elapsed(),
        ));
    }
    println!("{} {} was not addressed", "✓".green(), conn2.label);

    match api_client.latest_message(entity_type, entity_id).await? {
        Some(latest) if latest["message"] == message.as_str() => {
            println!("{} Latest message cached", "✓".green());
            Ok(TestResult::pass("targeted_delivery", None, start.elapsed()))
        }
        other => Ok(TestResult::fail(
            "targeted_delivery",
            format!("Latest message mismatch: {:?}", other),
            start.elapsed(),
        )),
    }
}

pub async fn test_broadcast(
    api_client: &ApiClient,
    conn1: &mut Connection,
    conn2: &mut Connection,
    client2_id: &str,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Broadcast ===".bright_cyan().bold());

    println!("{} Broadcasting to {} only...", "→".blue(), client2_id);
    api_client.broadcast("scoped", Some(client2_id)).await?;

    let scoped = match conn2.wait_for_update("BROADCAST", WAIT).await {
        Ok(update) => update,
        Err(e) => {
            return Ok(TestResult::fail(
                "broadcast",
                format!("Scoped broadcast: {}", e),
                start.elapsed(),
            ))
        }
    };
    print_update(&conn2.label, &scoped);

    println!("{} Broadcasting to everyone...", "→".blue());
    api_client.broadcast("everyone", None).await?;

    // conn1 skipped the scoped broadcast, so its first BROADCAST must be the global one.
    for conn in [&mut *conn1, &mut *conn2] {
        match conn.wait_for_update("BROADCAST", WAIT).await {
            Ok(update) if update.data["message"] == "everyone" => {
                print_update(&conn.label, &update);
            }
            Ok(update) => {
                return Ok(TestResult::fail(
                    "broadcast",
                    format!("{} got unexpected broadcast {}", conn.label, update.data),
                    start.elapsed(),
                ))
            }
            Err(e) => {
                return Ok(TestResult::fail(
                    "broadcast",
                    format!("{}: {}", conn.label, e),
                    start.elapsed(),
                ))
            }
        }
    }

    Ok(TestResult::pass("broadcast", None, start.elapsed()))
}
