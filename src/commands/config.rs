use anyhow::Result;
use colored::*;
use url::Url;

use crate::cli::ConfigAction;
use crate::config::Config;

pub async fn execute(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}  Current Configuration:", "⚙️".cyan());

            let config = Config::load()?;

            println!(
                "\n  {} {}",
                "API Endpoint:".white().bold(),
                config.api_endpoint.yellow()
            );
            println!(
                "  {} {}",
                "Color Output:".white().bold(),
                if config.color_output {
                    "enabled".green()
                } else {
                    "disabled".red()
                }
            );
            println!(
                "  {} {}",
                "Verbose:".white().bold(),
                if config.verbose {
                    "true".green()
                } else {
                    "false".white()
                }
            );
            println!(
                "  {} {}",
                "Session Expiry Notice:".white().bold(),
                if config.session_expiry_notice {
                    "enabled".green()
                } else {
                    "disabled".red()
                }
            );

            println!(
                "\n  Config file: {}",
                Config::get_config_path()?.display().to_string().blue()
            );
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;

            match key.as_str() {
                "api_endpoint" => {
                    Url::parse(value)
                        .map_err(|e| anyhow::anyhow!("Invalid URL '{}': {}", value, e))?;
                    config.api_endpoint = value.clone();
                }
                "color_output" => config.color_output = value.parse()?,
                "verbose" => config.verbose = value.parse()?,
                "session_expiry_notice" => config.session_expiry_notice = value.parse()?,
                _ => anyhow::bail!("Unknown configuration key: {}", key),
            }

            config.save()?;
            println!(
                "{}  Configuration updated: {} = {}",
                "✓".green(),
                key.cyan(),
                value.yellow()
            );
        }
        ConfigAction::Reset => {
            Config::reset()?;
            println!("{}  Configuration reset to defaults", "✓".green());
        }
    }

    Ok(())
}
