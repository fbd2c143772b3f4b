//! apple-mail-mcp-rs: Apple Mail MCP server over stdio
//!
//! This server exposes Apple Mail to Model Context Protocol clients. Each tool
//! call is translated into an AppleScript run against the already-running Mail
//! application, and the result is returned as text or key-sorted JSON.
//!
//! # Architecture
//!
//! - [`main`]: Process entry point with env loading, CLI and stdio serving
//! - [`config`]: Environment-driven configuration for the bridge and defaults
//! - [`errors`]: Application error model rendered into error envelopes
//! - [`applescript`]: Escaping, `osascript` runner and result parsing
//! - [`bridge`]: Serialized script execution and result shaping helpers
//! - [`mail`]: One AppleScript-backed method per mail operation
//! - [`catalog`]: Static tool declarations and parameter schemas
//! - [`args`]: Argument coercion and required-parameter validation
//! - [`models`]: Descriptors, operation results and the response envelope
//! - [`server`]: MCP handler and tool dispatcher

mod applescript;
mod args;
mod bridge;
mod catalog;
mod config;
mod errors;
mod mail;
mod models;
mod server;

use std::process::ExitCode;

use applescript::Osascript;
use bridge::ScriptBridge;
use clap::{Parser, Subcommand};
use config::ServerConfig;
use mail::MailController;
use rmcp::ServiceExt;
use rmcp::model::JsonObject;
use rmcp::transport::stdio;
use server::AppleMailServer;
use tracing_subscriber::EnvFilter;

/// Apple Mail MCP server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve MCP over stdio (the default)
    Serve,
    /// Print the tool catalog as JSON
    Tools,
    /// Run a single tool call and print the response envelope
    Call {
        /// Tool name, e.g. `list_accounts`
        tool: String,
        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },
}

/// Application entry point
///
/// Initializes tracing from environment, loads config, and serves the MCP
/// server over stdio unless a subcommand asks for something else. Logs go to
/// stderr because stdout carries the protocol.
///
/// # Environment Variables
///
/// See [`ServerConfig::load_from_env`] for full configuration options.
///
/// # Example
///
/// ```no_run
/// RUST_LOG=debug cargo run
/// cargo run -- call list_emails '{"mailbox":"INBOX","account_name":"iCloud","limit":5}'
/// ```
#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load_from_env()?;
    let runner = Osascript::new(config.osascript_path.clone())?;
    let server = AppleMailServer::new(MailController::new(ScriptBridge::new(runner), &config));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!(app = %config.app_name, "serving Apple Mail MCP over stdio");
            let service = server.serve(stdio()).await?;
            service.waiting().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Tools => {
            println!("{}", serde_json::to_string_pretty(&server.tools())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Call { tool, arguments } => {
            let arguments: JsonObject = serde_json::from_str(&arguments)?;
            let envelope = server.dispatch(&tool, &arguments).await;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(if envelope.is_error {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}
