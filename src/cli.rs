use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser)]
#[command(
    name = "momentbox",
    author = "MomentBox Team",
    version,
    about = "Companion CLI for the MomentBox diary & smart-home API",
    long_about = "Sign in to your MomentBox account, inspect your profile, and watch\nyour simulated smart-home appliances count down in real time."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authenticate with the MomentBox API
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Show the signed-in user's profile
    Profile,

    /// Inspect and drive the smart-home appliance simulator
    Devices {
        #[command(subcommand)]
        action: DeviceAction,
    },

    /// Configure momentbox settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum AuthAction {
    /// Sign in and store the session tokens
    Login {
        /// Account email (prompted when omitted)
        #[arg(long)]
        email: Option<String>,

        /// Account password (prompted when omitted; prefer the prompt)
        #[arg(long)]
        password: Option<String>,
    },
    /// Create a new MomentBox account
    Register {
        /// Account email (prompted when omitted)
        #[arg(long)]
        email: Option<String>,
    },
    /// Clear the stored session
    Logout,
    /// Check authentication status
    Status,
}

#[derive(Subcommand)]
pub enum DeviceAction {
    /// List all appliances and their current state
    List,
    /// Live countdown view; running cycles auto-stop when they finish
    Watch,
    /// Start (or cancel) an appliance cycle
    Start {
        /// Device name, e.g. "Washer1"
        name: String,
    },
    /// Send a control command (power, course, mode, temperature, ...)
    Control {
        /// Device name, e.g. "Washer1"
        name: String,
        /// Command to send
        command: String,
        /// Value for the command
        value: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },
    /// Reset configuration to defaults
    Reset,
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Auth { action } => commands::auth::execute(action).await,
            Commands::Profile => commands::profile::execute().await,
            Commands::Devices { action } => commands::devices::execute(action).await,
            Commands::Config { action } => commands::config::execute(action).await,
            Commands::Completions { shell } => commands::completions::execute(*shell),
        }
    }
}
