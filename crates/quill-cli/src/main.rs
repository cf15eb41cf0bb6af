//! quill - documentation chat from the terminal

mod commands;
mod config;
mod output;
mod utils;

use anyhow::Context;
use clap::Parser;
use quill_chat::{
    AgentPreviewVariant, AnswerMode, ChatVariant, Conversation, ConversationVariant, Pipeline,
    PipelineConfig, PipelineEvent, RetryPolicy, Status, WorkflowPreviewVariant,
};
use quill_wire::{AnswerTransport, HttpTransport, ReplayTransport};
use serde::de::DeserializeOwned;
use std::{path::Path, sync::Arc, time::Duration};
use tokio::sync::broadcast;

use crate::output::AnswerPrinter;

/// quill - ask questions about your documentation
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run in non-interactive mode with a single question
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Answer service base URL
    #[arg(short, long)]
    server: Option<String>,

    /// Knowledge source to answer from
    #[arg(short, long)]
    docs: Option<String>,

    /// Prompt template id
    #[arg(long)]
    prompt_id: Option<String>,

    /// Number of document chunks to retrieve
    #[arg(long)]
    chunks: Option<u32>,

    /// Token budget for conversation history
    #[arg(long)]
    token_limit: Option<u32>,

    /// Retriever to use
    #[arg(long)]
    retriever: Option<String>,

    /// Wait for the full answer instead of streaming it
    #[arg(long)]
    no_stream: bool,

    /// Do not turn a resubmission after a failed answer into a retry
    #[arg(long)]
    no_auto_retry: bool,

    /// Preview an unsaved workflow (JSON file with name, nodes and edges)
    #[arg(long, conflicts_with = "agent")]
    workflow: Option<String>,

    /// Preview an unsaved agent configuration (JSON file)
    #[arg(long)]
    agent: Option<String>,

    /// Answer from a captured response body instead of the service
    #[arg(long)]
    replay: Option<String>,

    /// Delay between replayed chunks, in milliseconds
    #[arg(long, default_value_t = 0)]
    replay_delay: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("quill=debug,quill_wire=debug,quill_chat=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Load config file
    let cfg = config::Config::load();

    // Merge config with CLI args (CLI takes precedence)
    let mut options = cfg.request_options();
    if let Some(docs) = args.docs {
        options.active_docs = Some(docs);
    }
    if let Some(prompt_id) = args.prompt_id {
        options.prompt_id = Some(prompt_id);
    }
    if let Some(retriever) = args.retriever {
        options.retriever = Some(retriever);
    }
    options.chunks = args.chunks.or(options.chunks);
    options.token_limit = args.token_limit.or(options.token_limit);

    let mode = if args.no_stream || !cfg.stream.unwrap_or(true) {
        AnswerMode::Blocking
    } else {
        AnswerMode::Streaming
    };
    let retry_policy = RetryPolicy {
        auto_retry_failed: !args.no_auto_retry && cfg.auto_retry.unwrap_or(true),
    };

    let server_url = args
        .server
        .unwrap_or_else(|| cfg.server_url().to_string());

    let transport: Arc<dyn AnswerTransport> = match args.replay {
        Some(ref path) => {
            let mut replay = ReplayTransport::from_file(path)
                .with_context(|| format!("Failed to read replay file {}", path))?;
            if args.replay_delay > 0 {
                replay = replay.with_chunk_delay(Duration::from_millis(args.replay_delay));
            }
            Arc::new(replay)
        }
        None => Arc::new(HttpTransport::new(server_url.clone())),
    };

    let variant: Arc<dyn ChatVariant> = if let Some(ref path) = args.workflow {
        Arc::new(WorkflowPreviewVariant::new(read_json(path)?))
    } else if let Some(ref path) = args.agent {
        Arc::new(AgentPreviewVariant::new(read_json(path)?))
    } else {
        Arc::new(ConversationVariant)
    };

    let pipeline = Pipeline::new(
        transport,
        variant,
        PipelineConfig {
            options,
            mode,
            retry_policy,
        },
    );

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&pipeline, &command).await;
    }

    let source = match args.replay {
        Some(ref path) => format!("replay {}", path),
        None => server_url,
    };
    run_interactive(&pipeline, &source).await
}

fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

async fn run_command(pipeline: &Pipeline, command: &str) -> anyhow::Result<()> {
    println!("quill> {}", command);
    println!();

    let events = pipeline.subscribe();
    pipeline.submit(command)?;
    let conversation = follow(pipeline, events).await;

    if conversation.status == Status::Failed
        || conversation.last_turn().is_some_and(|turn| turn.is_failed())
    {
        std::process::exit(1);
    }
    Ok(())
}

/// Print a request's output as it arrives, until the request ends.
///
/// Ctrl-C stops the request.
async fn follow(pipeline: &Pipeline, mut events: broadcast::Receiver<PipelineEvent>) -> Conversation {
    use std::io::Write;

    let mut current: Option<u64> = None;
    let mut printer: Option<AnswerPrinter> = None;
    let mut stopped = false;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c, if !stopped => {
                stopped = true;
                if pipeline.stop() {
                    eprintln!("\n[stopped]");
                }
            }
            event = events.recv() => match event {
                Ok(PipelineEvent::RequestStart { generation, index }) => {
                    if current.is_none() {
                        current = Some(generation);
                        printer = Some(AnswerPrinter::new(index));
                    }
                }
                Ok(PipelineEvent::TurnUpdated { index }) => {
                    let Some(printer) = printer.as_mut().filter(|p| p.index() == index) else {
                        continue;
                    };
                    if let Some(turn) = pipeline.snapshot().turns.get(index) {
                        let delta = printer.delta(turn);
                        if !delta.thought.is_empty() {
                            eprint!("{}", delta.thought);
                        }
                        if !delta.response.is_empty() {
                            print!("{}", delta.response);
                            let _ = std::io::stdout().flush();
                        }
                    }
                }
                Ok(PipelineEvent::StepUpdated { node_id }) => {
                    let conversation = pipeline.snapshot();
                    if let Some(step) = conversation
                        .execution_steps
                        .iter()
                        .find(|s| s.node_id == node_id)
                    {
                        eprintln!("{}", output::step_line(step));
                    }
                }
                Ok(PipelineEvent::RequestEnd { generation, .. }) => {
                    if current == Some(generation) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("Output lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    let conversation = pipeline.snapshot();
    println!();
    if let Some(turn) = printer.and_then(|p| conversation.turns.get(p.index())) {
        let summary = output::summary(turn);
        if !summary.is_empty() {
            println!("\n{}", summary);
        }
    }
    conversation
}

async fn run_interactive(pipeline: &Pipeline, source: &str) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let session = uuid::Uuid::new_v4().to_string();

    // Show minimal startup info (only if TTY)
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!(
            "quill ({}, {}) session: {}",
            pipeline.variant_name(),
            source,
            &session[..8]
        );
        eprintln!("Type /help for commands.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let events = pipeline.subscribe();

        // Handle slash commands
        let submitted = if input.starts_with('/') {
            let Some(result) = commands::execute_command(input, &pipeline.snapshot()) else {
                continue;
            };
            match result {
                commands::CommandResult::NewChat => {
                    pipeline.reset();
                    println!("Started a new chat.");
                    continue;
                }
                commands::CommandResult::Exit => {
                    break;
                }
                commands::CommandResult::Message(msg) => {
                    println!("{}", msg);
                    continue;
                }
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                    continue;
                }
                commands::CommandResult::Retry(index) => pipeline.retry(index),
                commands::CommandResult::Edit { index, prompt } => {
                    pipeline.submit_at(&prompt, Some(index), false)
                }
            }
        } else {
            pipeline.submit(input)
        };

        if let Err(e) = submitted {
            eprintln!("Error: {}", e);
            continue;
        }
        follow(pipeline, events).await;
        println!();
    }

    pipeline.stop();
    Ok(())
}
