//! Terminal session shell for the human-in-the-loop agent
//!
//! Reads one line per message from stdin. When the agent asks a question the
//! next line is sent back as the answer. Ctrl-C cancels a running turn.

use hitl_agent::config::{self, Config};
use hitl_agent::llm::{LoggingService, OpenAIService};
use hitl_agent::runtime::{ModelGateway, ServiceGateway};
use hitl_agent::system_prompt::SYSTEM_PROMPT;
use hitl_agent::tools::{ToolRegistry, WebSearchTool};
use hitl_agent::{
    Agent, AgentOptions, ConversationId, MemoryCheckpointStore, TurnError, TurnOutcome,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_PREFIX: &str = "hitl_agent";
const LOG_SUFFIX: &str = "log";
/// Current file plus one rotated backup
const LOG_FILES_KEPT: usize = 2;

type ShellAgent = Agent<ServiceGateway, ToolRegistry, MemoryCheckpointStore>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _log_guard = init_logging(Path::new("."))?;

    let path = config::config_path();
    let config = match Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    tracing::info!(
        path = %path.display(),
        model = %config.openai.model,
        search_web = config.tools.search_web,
        recursion_limit = config.agent.recursion_limit,
        "Configuration loaded"
    );
    if let Some(telemetry) = config.telemetry() {
        tracing::info!(
            endpoint = telemetry.langchain_endpoint.as_deref().unwrap_or_default(),
            project = telemetry.langchain_project.as_deref().unwrap_or_default(),
            "Trace export enabled"
        );
    }

    let service = OpenAIService::new(
        config.openai.api_key.as_str(),
        config.openai.model.as_str(),
        config.openai.base_url.as_deref(),
    )?;
    let mut gateway = ServiceGateway::new(Arc::new(LoggingService::new(Arc::new(service))));
    if let Some(max_tokens) = config.openai.max_tokens {
        gateway = gateway.with_max_tokens(max_tokens);
    }

    let search = if config.tools.search_web {
        config
            .tavily_key()
            .map(|key| WebSearchTool::new(key, config.agent.max_search_results))
    } else {
        None
    };
    let tools = ToolRegistry::standard(search);
    tracing::info!(
        model = %gateway.model_id(),
        tools = ?tools.definitions().iter().map(|d| d.name.clone()).collect::<Vec<_>>(),
        "Agent ready"
    );

    let agent = Arc::new(Agent::new(
        gateway,
        tools,
        MemoryCheckpointStore::new(),
        AgentOptions {
            max_rounds: config.agent.recursion_limit,
            system_prompt: SYSTEM_PROMPT.to_string(),
        },
    ));
    let id = agent.create_conversation().await?;

    run_shell(agent, id).await?;
    tracing::info!(conv_id = %id, "Session ended");
    Ok(())
}

/// Daily-rotated log file in `dir`, pruned to the newest files
fn log_appender(dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .max_log_files(LOG_FILES_KEPT)
        .build(dir)
}

/// JSON logs to a file so the terminal stays free for the conversation
fn init_logging(dir: &Path) -> Result<WorkerGuard, InitError> {
    let (non_blocking, guard) = tracing_appender::non_blocking(log_appender(dir)?);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "hitl_agent=debug".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    Ok(guard)
}

async fn run_shell(agent: Arc<ShellAgent>, id: ConversationId) -> std::io::Result<()> {
    println!("Chat with the agent. Ctrl-C cancels a running turn; Ctrl-D or /quit exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // Question the agent is waiting on; the next line answers it
    let mut pending: Option<String> = None;

    loop {
        match &pending {
            Some(query) => print!("\n[agent asks] {query}\nanswer> "),
            None => print!("\nyou> "),
        }
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "/quit" | "/exit" => break,
            "/history" => {
                print_history(&agent, &id).await;
                continue;
            }
            _ => {}
        }

        let watcher = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    agent.cancel(&id);
                }
            })
        };
        let result = if pending.is_some() {
            agent.resume(&id, line).await
        } else {
            agent.submit(&id, line).await
        };
        watcher.abort();

        match result {
            Ok(TurnOutcome::Final { text }) => {
                println!("\nassistant> {text}");
                pending = None;
            }
            Ok(TurnOutcome::Interrupted { query_text }) => pending = Some(query_text),
            Err(e) => {
                report_failure(&e);
                pending = match agent.pending_interrupt(&id).await {
                    Ok(interrupt) => interrupt.map(|i| i.query),
                    Err(e) => {
                        tracing::error!(conv_id = %id, error = %e, "Failed to reload conversation");
                        None
                    }
                };
            }
        }
    }

    Ok(())
}

fn report_failure(err: &TurnError) {
    tracing::error!(error = %err, "Turn failed");
    match err {
        TurnError::Cancelled => println!("\n(cancelled)"),
        TurnError::RecursionLimit { limit } => {
            println!("\nThe agent stopped after {limit} model calls without an answer.");
        }
        _ => println!("\nSomething went wrong handling that message. Please try again."),
    }
}

async fn print_history(agent: &ShellAgent, id: &ConversationId) {
    match agent.history(id).await {
        Ok(messages) => {
            for message in messages {
                println!("[{}] {}", message.role(), message.content());
            }
        }
        Err(e) => println!("Could not load history: {e}"),
    }
}
