//! ProForma CLI - Command-line interface for proforma-tools.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use proforma_core::Config;
use proforma_forms::{FormsClient, LegacyFormsClient};
use proforma_mcp::{McpServer, ToolHandler};
use proforma_rank::RankClient;
use tracing_subscriber::EnvFilter;

/// Environment variable carrying the Atlassian API token. The token is never
/// written to the config file.
const TOKEN_ENV: &str = "JIRA_API_TOKEN";

#[derive(Parser)]
#[command(name = "proforma")]
#[command(author, version, about = "ProForma forms and issue ranking for Jira", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server on stdin/stdout
    Serve,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// List forms attached to an issue
    Forms {
        /// Jira issue key, e.g. PROJ-123
        issue_key: String,

        /// Use the legacy entity-properties API instead of the Forms API
        #[arg(long)]
        legacy: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set a configuration value, e.g. `config set jira.url https://x.atlassian.net`
    Set { key: String, value: String },

    /// Get a configuration value
    Get { key: String },

    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging. Everything goes to stderr: when serving, stdout
    // carries the MCP protocol.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Serve) => serve().await,
        Some(Commands::Config { command }) => handle_config(command),
        Some(Commands::Forms { issue_key, legacy }) => list_forms(&issue_key, legacy).await,
        None => {
            println!("ProForma forms and issue ranking for Jira");
            println!("Run with --help for usage information");
            Ok(())
        }
    }
}

/// Build a tool handler from the config file and run the MCP server.
async fn serve() -> anyhow::Result<()> {
    let config = Config::load()?;
    let token = api_token()?;

    let mut handler = ToolHandler::new();

    if let Some(forms) = &config.forms {
        if let Some(jira) = &config.jira {
            handler = handler.with_forms_client(Arc::new(FormsClient::new(
                &forms.cloud_id,
                &jira.email,
                &token,
            )));
        } else {
            tracing::warn!("forms.cloud_id is set but jira.email is missing; Forms API disabled");
        }
    }

    if let Some(jira) = &config.jira {
        handler = handler.with_legacy_client(Arc::new(LegacyFormsClient::new(
            &jira.url, &jira.email, &token,
        )));
        handler = handler.with_rank_client(Arc::new(RankClient::new(
            &jira.url, &jira.email, &token,
        )));
    }

    if config.jira.is_none() && config.forms.is_none() {
        tracing::warn!("No Jira or Forms configuration found; all tools will report errors");
    }

    let mut server = McpServer::new(handler);
    server.run().await?;
    Ok(())
}

fn handle_config(command: ConfigCommands) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("Set {}", key);
        }
        ConfigCommands::Get { key } => {
            let config = Config::load()?;
            match config.get(&key)? {
                Some(value) => println!("{}", value),
                None => println!("{} is not set", key),
            }
        }
        ConfigCommands::Show => {
            let config = Config::load()?;
            let rendered = toml::to_string_pretty(&config)?;
            if rendered.trim().is_empty() {
                println!("No configuration set");
            } else {
                print!("{}", rendered);
            }
        }
    }
    Ok(())
}

async fn list_forms(issue_key: &str, legacy: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let token = api_token()?;
    let jira = config
        .jira
        .as_ref()
        .context("jira.url and jira.email must be configured")?;

    let forms = if legacy {
        let client = LegacyFormsClient::new(&jira.url, &jira.email, &token);
        client.list_forms(issue_key).await?
    } else {
        let cloud_id = config
            .forms
            .as_ref()
            .map(|f| f.cloud_id.as_str())
            .context("forms.cloud_id must be configured (or pass --legacy)")?;
        let client = FormsClient::new(cloud_id, &jira.email, &token);
        client.list_forms(issue_key).await?
    };

    if forms.is_empty() {
        println!("No forms on {}", issue_key);
        return Ok(());
    }

    for form in forms {
        println!("{}", format_form_line(&form));
    }
    Ok(())
}

/// One listing line per form: id, name (or a dash), lifecycle status.
fn format_form_line(form: &proforma_core::Form) -> String {
    format!(
        "{}  {}  [{}]",
        form.id,
        form.name.as_deref().unwrap_or("-"),
        if form.is_submitted() { "submitted" } else { "open" }
    )
}

fn api_token() -> anyhow::Result<String> {
    std::env::var(TOKEN_ENV)
        .with_context(|| format!("{} environment variable is not set", TOKEN_ENV))
}
