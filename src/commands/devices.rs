use anyhow::{bail, Context, Result};
use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use serde_json::Value;

use crate::cli::DeviceAction;
use crate::devices::client::DeviceClient;
use crate::devices::dashboard::Dashboard;
use crate::devices::models::DeviceSnapshot;
use crate::utils::format::{format_clock, relative};

pub async fn execute(action: &DeviceAction) -> Result<()> {
    let ctx = super::build_context()?;
    let store = super::restored_store(&ctx).await;
    super::require_user(&store).await?;

    let client = DeviceClient::new(ctx.api.clone());

    match action {
        DeviceAction::List => {
            let devices = client.list().await.context("Failed to list devices")?;
            if devices.is_empty() {
                println!("{}  No appliances registered", "ℹ".blue());
                return Ok(());
            }

            let mut names: Vec<&String> = devices.keys().collect();
            names.sort();

            let mut table = Table::new();
            table.load_preset(UTF8_FULL).set_header(vec![
                "Name", "Type", "Power", "Status", "Remaining", "Started",
            ]);

            for name in names {
                let device = &devices[name];
                table.add_row(vec![
                    Cell::new(name),
                    Cell::new(device.kind.as_deref().unwrap_or("-")),
                    Cell::new(device.power.as_deref().unwrap_or("-")),
                    Cell::new(device.status.label()),
                    Cell::new(remaining_cell(device)),
                    Cell::new(
                        device
                            .cycle_start_timestamp
                            .map(relative)
                            .unwrap_or_else(|| "-".to_string()),
                    ),
                ]);
            }

            println!("{table}");
        }

        DeviceAction::Watch => {
            println!(
                "{}  Watching appliances ({} to quit)",
                "📺".cyan(),
                "Ctrl-C".bold()
            );
            let dashboard = Dashboard::load(client)
                .await
                .context("Failed to load devices")?;
            dashboard.watch().await.context("Watch loop failed")?;
        }

        DeviceAction::Start { name } => {
            let mut dashboard = Dashboard::load(client)
                .await
                .context("Failed to load devices")?;
            if dashboard.reconciler().get(name).is_none() {
                bail!("Unknown device: {name}");
            }

            match dashboard.start(name).await.context("Start/cancel failed")? {
                Some(device) => {
                    println!(
                        "{}  {} is now {}{}",
                        "✓".green(),
                        name.yellow(),
                        device.status.label().bold(),
                        if device.status.is_operating() {
                            format!(" ({} left)", format_clock(device.remaining_time))
                        } else {
                            String::new()
                        }
                    );
                }
                None => bail!("Server rejected the start/cancel for '{name}'"),
            }
        }

        DeviceAction::Control {
            name,
            command,
            value,
        } => {
            let mut dashboard = Dashboard::load(client.clone())
                .await
                .context("Failed to load devices")?;
            if dashboard.reconciler().get(name).is_none() {
                bail!("Unknown device: {name}");
            }

            let value = parse_value(value);
            let applied = dashboard
                .control(name, command, &value)
                .await
                .context("Control failed")?;

            if applied {
                // Echo the server's authoritative state for the device.
                if let Some(device) = client.get(name).await.ok().flatten() {
                    println!(
                        "{}  {} {} = {} ({})",
                        "✓".green(),
                        name.yellow(),
                        command.cyan(),
                        value.to_string().yellow(),
                        device.status.label()
                    );
                } else {
                    println!(
                        "{}  {} {} = {}",
                        "✓".green(),
                        name.yellow(),
                        command.cyan(),
                        value.to_string().yellow()
                    );
                }
            } else {
                println!(
                    "{}  Control failed for {}; reloaded server state",
                    "!".yellow().bold(),
                    name.yellow()
                );
            }
        }
    }

    Ok(())
}

fn remaining_cell(device: &DeviceSnapshot) -> String {
    if device.status.is_operating() && device.total_time > 0 {
        format_clock(device.remaining_time)
    } else {
        "-".to_string()
    }
}

/// Control values arrive as CLI strings; numbers (temperatures) go out
/// as JSON numbers, everything else as strings.
fn parse_value(raw: &str) -> Value {
    if let Ok(number) = raw.parse::<i64>() {
        Value::from(number)
    } else {
        Value::from(raw)
    }
}
