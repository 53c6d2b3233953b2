//! portal-client: command-line access to the portal backend.
//!
//! Each invocation loads the persisted session, runs one command and leaves
//! the (possibly refreshed) session behind for the next one.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::error;

use portal_client::config::{load_config_from, print_schema};
use portal_client::startup::build_client;
use portal_client::utils::logger::init_logging;
use portal_client::ApiClient;

#[derive(Parser)]
#[command(name = "portal-client")]
#[command(about = "Authenticated client for the portal backend API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "./config.yaml")]
    config: PathBuf,

    /// Print the client metrics after the command
    #[arg(long)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the JSON schema of the configuration file
    Schema,

    /// Sign in and persist the session
    Login {
        #[arg(short, long)]
        email: String,

        /// Falls back to the PORTAL_PASSWORD environment variable
        #[arg(short, long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show the signed-in user's profile
    Me,

    /// Exchange the refresh cookie for a new access token
    Refresh,

    /// Sign out and forget the persisted session
    Logout,

    /// Send an authenticated GET request and print the JSON response
    Get {
        /// Path relative to the API base URL
        path: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Schema = cli.command {
        print_schema();
        return ExitCode::SUCCESS;
    }

    let config = match load_config_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging);

    let client = match build_client(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to start the client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = match run(&client, cli.command).await {
        Ok(output) => {
            if let Some(output) = output {
                print_json(&output);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    };

    if cli.metrics {
        print!("{}", client.metrics().render());
    }
    code
}

async fn run(
    client: &ApiClient,
    command: Commands,
) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let output = match command {
        Commands::Schema => None,
        Commands::Login { email, password } => {
            let session = client.sign_in(&email, &password).await?;
            Some(serde_json::to_value(&session.user)?)
        }
        Commands::Me => Some(serde_json::to_value(client.me().await?)?),
        Commands::Refresh => match client.refresh().await {
            Some(_) => Some(serde_json::json!({ "refreshed": true })),
            None => return Err("token refresh failed; sign in again".into()),
        },
        Commands::Logout => {
            client.logout().await;
            None
        }
        Commands::Get { path } => Some(client.get::<Value>(&path).await?),
    };
    Ok(output)
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{}", rendered),
        Err(e) => eprintln!("Failed to render response: {}", e),
    }
}
