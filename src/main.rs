use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use sapphire_agents::config::Settings;
use sapphire_agents::mcp::AppState;
use sapphire_agents::platform::{active_agent_id_by_name, PlatformClient};
use sapphire_agents::publish::ResultPublisher;
use sapphire_agents::{logging, AgentContext, AgentOutcome, QueryRewriter, RewriteMode};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "sapphire")]
#[command(about = "Golden Sapphire agent tools from the command line")]
struct Cli {
    /// Session id forwarded to the file manager
    #[arg(long, global = true)]
    session_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite a SQL statement without executing it
    Rewrite {
        sql: String,
        /// Overrides QUERY_REWRITE_MODE
        #[arg(long, value_enum)]
        mode: Option<RewriteMode>,
    },
    /// Rewrite and run a read-only query against the sales database
    Query {
        sql: String,
        /// Positional parameters as a JSON array or object
        #[arg(long = "args")]
        arguments: Option<String>,
        /// Export the rows as csv or excel
        #[arg(long)]
        export_format: Option<String>,
    },
    /// Generate SQL from a natural-language request
    GenerateSql {
        request: String,
        /// Free-text schema notes; defaults to the alias context
        #[arg(long)]
        schema_context: Option<String>,
        /// DDL file; defaults to GOLDEN_SAPPHIRE_DB_SCHEMA
        #[arg(long)]
        schema_definition: Option<PathBuf>,
    },
    /// Export a JSON array of rows to a local file
    Export {
        input: PathBuf,
        #[arg(long, default_value = "csv")]
        format: String,
    },
    /// Print a signed download link for a stored file
    Sign {
        file_id: String,
        /// Link lifetime in seconds
        #[arg(long)]
        expires_in: Option<i64>,
    },
    /// List platform agents, or resolve one active agent by name
    Agents {
        #[arg(long)]
        name: Option<String>,
    },
    /// Print the schema alias context
    Context,
}

fn print_outcome(outcome: &AgentOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&outcome.to_json())?);
    if outcome.is_success() {
        Ok(())
    } else {
        Err(anyhow!("{}", outcome.message()))
    }
}

async fn invoke(state: &AppState, ctx: &AgentContext, tool: &str, params: Value) -> Result<()> {
    let agent = state
        .registry
        .get(tool)
        .ok_or_else(|| anyhow!("{} is not available with the current configuration", tool))?;
    let outcome = agent.invoke(ctx, params).await;
    print_outcome(&outcome)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let context = Arc::new(settings.schema_context().await?);
    let ctx = AgentContext::new(cli.session_id.clone());

    match cli.command {
        Command::Rewrite { sql, mode } => {
            let rewriter = QueryRewriter::new(context, mode.unwrap_or(settings.rewrite_mode));
            match rewriter.prepare(&sql) {
                Ok(rewritten) => println!("{}", rewritten),
                Err(rejected) => return Err(anyhow!("{}", rejected)),
            }
        }
        Command::Query {
            sql,
            arguments,
            export_format,
        } => {
            let state = AppState::from_settings(&settings, context)?;
            let mut params = json!({ "request": sql });
            if let Some(raw) = arguments {
                let parsed: Value = serde_json::from_str(&raw).context("--args must be JSON")?;
                params["arguments"] = parsed;
            }
            if let Some(format) = export_format {
                params["export_format"] = Value::String(format);
            }
            invoke(&state, &ctx, "postgres_query_agent", params).await?;
        }
        Command::GenerateSql {
            request,
            schema_context,
            schema_definition,
        } => {
            let state = AppState::from_settings(&settings, context)?;
            let mut params = json!({ "request": request });
            if let Some(text) = schema_context {
                params["schema_context"] = Value::String(text);
            }
            if let Some(path) = schema_definition {
                let ddl = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                params["schema_definition"] = Value::String(ddl);
            }
            invoke(&state, &ctx, "gs_sql_generator", params).await?;
        }
        Command::Export { input, format } => {
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let data: Value = serde_json::from_str(&raw)?;
            let state = AppState::from_settings(&settings, context)?;
            invoke(&state, &ctx, "export_result_agent", json!({ "data": data, "format": format })).await?;
        }
        Command::Sign { file_id, expires_in } => {
            let publisher = ResultPublisher::new(
                settings.file_manager(),
                settings.signer(),
                settings.public_base_url.clone(),
                expires_in.unwrap_or(settings.signed_url_ttl_secs),
            );
            println!("{}", publisher.download_link(&file_id));
        }
        Command::Agents { name } => {
            let client = PlatformClient::new(settings.api_base_url.clone(), settings.jwt_token.clone());
            let agents = client.list_agents().await?;
            info!("Platform returned {} agents", agents.len());
            match name {
                Some(name) => match active_agent_id_by_name(&agents, &name) {
                    Some(id) => println!("{}", id),
                    None => return Err(anyhow!("No active agent named {}", name)),
                },
                None => println!("{}", serde_json::to_string_pretty(&agents)?),
            }
        }
        Command::Context => {
            println!("{}", serde_json::to_string_pretty(&context.to_json())?);
        }
    }

    Ok(())
}
