//! Chronos CLI - knowledge-graph research assistant

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use chronos_core::assistant::{Assistant, AssistantReply};
use chronos_core::config::Config;
use chronos_core::extraction::{ExtractedContent, extract_content};
use chronos_core::knowledge::{Category, KnowledgeCorpus, KnowledgeEntry};
use chronos_core::llm::{CompletionBackend, LlmClient};
use chronos_core::render::PreparedContent;
use chronos_core::retrieval::ActivationRetriever;
use clap::{Parser, Subcommand};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::json;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "chronos")]
#[command(author, version, about = "Knowledge-graph research assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank knowledge entries for a query
    Search {
        /// Free-text query
        query: String,
        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Extract charts, diagrams and images from a reply (file or stdin)
    Parse {
        /// Input file; reads stdin when omitted or "-"
        file: Option<PathBuf>,
    },

    /// Ask a single question
    Ask {
        /// Message to send
        message: String,
    },

    /// Start an interactive conversation
    Chat,

    /// Inspect the knowledge corpus
    Corpus {
        #[command(subcommand)]
        action: CorpusAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CorpusAction {
    /// List entries
    List {
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show entry details
    Show { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // .env is optional
    let _ = dotenvy::dotenv();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("chronos={}", level).parse()?)
                .add_directive(format!("chronos_core={}", level).parse()?),
        )
        .init();

    match cli.command {
        Commands::Search { query, limit } => cmd_search(&query, limit, cli.format, cli.quiet),
        Commands::Parse { file } => cmd_parse(file, cli.format, cli.quiet),
        Commands::Ask { message } => cmd_ask(&message, cli.format, cli.quiet).await,
        Commands::Chat => cmd_chat(cli.format, cli.quiet).await,
        Commands::Corpus { action } => cmd_corpus(action, cli.format, cli.quiet),
        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

fn load_corpus(config: &Config) -> anyhow::Result<KnowledgeCorpus> {
    let corpus = KnowledgeCorpus::load_or_builtin(config.retrieval.corpus_path.as_deref())
        .context("Failed to load knowledge corpus")?;
    debug!(entries = corpus.len(), "Knowledge corpus loaded");
    Ok(corpus)
}

// ============================================================================
// Command Implementations
// ============================================================================

fn cmd_search(query: &str, limit: Option<usize>, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let corpus = load_corpus(&config)?;

    let mut retrieval = config.retrieval.clone();
    if let Some(limit) = limit {
        retrieval.max_results = limit;
    }

    let retriever = ActivationRetriever::with_config(&corpus, &retrieval);
    let result = retriever.retrieve(query);

    if format == OutputFormat::Json {
        let hits: Vec<_> = result
            .hits()
            .iter()
            .map(|hit| {
                json!({
                    "id": hit.entry.id,
                    "title": hit.entry.title,
                    "category": hit.entry.category,
                    "score": hit.score,
                    "directScore": hit.direct_score,
                    "spreadOnly": hit.is_spread_only(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if result.is_empty() {
        if !quiet {
            println!("No matching knowledge entries.");
        }
        return Ok(());
    }

    if !quiet {
        println!("Results for \"{}\":", query);
    }
    for (rank, hit) in result.hits().iter().enumerate() {
        let via = if hit.is_spread_only() { "  (via link)" } else { "" };
        println!(
            "{:>3}. {:<4} {:>8.2}  {}{}",
            rank + 1,
            hit.entry.id,
            hit.score,
            hit.entry.title,
            via
        );
    }

    Ok(())
}

fn cmd_parse(file: Option<PathBuf>, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let text = match file {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };

    let content = extract_content(&text);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&content)?);
        return Ok(());
    }

    let prepared = PreparedContent::prepare(&content);
    print_content(&content, &prepared);
    if !quiet && content.is_plain_text() {
        println!("(no visual content)");
    }

    Ok(())
}

async fn cmd_ask(message: &str, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let mut assistant = connect()?;
    let reply = assistant.send(message).await?;
    let prepared = PreparedContent::prepare(&reply.content);
    print_reply(&reply, &prepared, format, quiet)
}

async fn cmd_chat(format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let mut assistant = connect()?;
    let mut editor = DefaultEditor::new().context("Failed to start line editor")?;

    if !quiet {
        println!("Chronos online. /clear resets the conversation, /exit quits.");
    }

    loop {
        let line = match editor.readline("chronos> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Failed to read input"),
        };

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if let Err(e) = editor.add_history_entry(message) {
            debug!(error = %e, "Could not record history entry");
        }

        match message {
            "/exit" | "/quit" => break,
            "/clear" => {
                assistant.clear_history();
                if !quiet {
                    println!("Conversation cleared.");
                }
                continue;
            }
            _ => {}
        }

        if let Err(e) = chat_turn(&mut assistant, message, format, quiet).await {
            eprintln!("Error: {:#}", e);
        }
    }

    Ok(())
}

/// One chat turn, asking for a corrected visual while the budget allows
async fn chat_turn<B: CompletionBackend>(
    assistant: &mut Assistant<B>,
    message: &str,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut reply = assistant.send(message).await?;

    loop {
        let prepared = PreparedContent::prepare(&reply.content);
        print_reply(&reply, &prepared, format, quiet)?;

        let Some(error) = prepared.errors().last().cloned() else {
            break;
        };
        match assistant.request_correction(&error).await? {
            Some(corrected) => {
                info!(kind = ?error.kind, "Regenerating visual");
                if !quiet {
                    println!("\n(regenerating: {})\n", error.message);
                }
                reply = corrected;
            }
            None => break,
        }
    }

    Ok(())
}

fn connect() -> anyhow::Result<Assistant<LlmClient>> {
    let config = Config::load()?;
    let corpus = Arc::new(load_corpus(&config)?);
    let client = LlmClient::from_config(&config.llm)?;
    debug!(model = client.default_model(), "Assistant ready");
    Ok(Assistant::new(client, corpus, &config))
}

fn print_reply(
    reply: &AssistantReply,
    prepared: &PreparedContent,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(reply)?);
        return Ok(());
    }

    print_content(&reply.content, prepared);
    if !quiet && !reply.context_used.is_empty() {
        let ids: Vec<&str> = reply.context_used.iter().map(|e| e.id.as_str()).collect();
        println!("\n(context: {})", ids.join(", "));
    }
    Ok(())
}

fn print_content(content: &ExtractedContent, prepared: &PreparedContent) {
    let text = content.clean_text.trim();
    if !text.is_empty() {
        println!("{}", text);
    }

    for (chart, series) in content.charts.iter().zip(&prepared.charts) {
        match series {
            Ok(series) => println!(
                "[chart:{}] {} - {} points ({} by {})",
                chart.chart_type,
                series.series_label,
                series.len(),
                series.keys.value_key,
                series.keys.label_key
            ),
            Err(e) => println!("[chart error] {}", e.message),
        }
    }
    for (markup, check) in content.diagrams.iter().zip(&prepared.diagrams) {
        match check {
            Ok(kind) => println!("[diagram:{}] {} lines", kind, markup.lines().count()),
            Err(e) => println!("[diagram error] {}", e.message),
        }
    }
    for layout in &prepared.flows {
        match layout {
            Ok(layout) => println!(
                "[flow:{}] {} nodes, {} edges, {} ranks",
                layout.direction.as_str(),
                layout.nodes.len(),
                layout.edges.len(),
                layout.rank_count()
            ),
            Err(e) => println!("[flow error] {}", e.message),
        }
    }
    for url in &content.images {
        println!("[image] {}", url);
    }
}

fn cmd_corpus(action: CorpusAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let corpus = load_corpus(&config)?;

    match action {
        CorpusAction::List { category } => {
            let filter = match category.as_deref() {
                Some(name) => Some(Category::parse(name).ok_or_else(|| {
                    let known: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
                    anyhow!("Unknown category '{}'. Expected one of: {}", name, known.join(", "))
                })?),
                None => None,
            };
            let entries: Vec<&KnowledgeEntry> = corpus
                .entries()
                .iter()
                .filter(|entry| filter.is_none_or(|c| entry.category == c))
                .collect();

            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if entries.is_empty() {
                if !quiet {
                    println!("No entries found.");
                }
                return Ok(());
            }
            for entry in entries {
                println!("  {:<4} [{}] {}", entry.id, entry.category, entry.title);
            }
        }
        CorpusAction::Show { id } => {
            let entry = corpus.require(&id)?;

            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(entry)?);
                return Ok(());
            }

            println!("Entry: {}", entry.title);
            println!("  ID: {}", entry.id);
            println!("  Category: {}", entry.category);
            if !entry.keywords.is_empty() {
                println!("  Keywords: {}", entry.keywords.join(", "));
            }
            let related = corpus.related_titles(entry);
            if !related.is_empty() {
                println!("  Related: {}", related.join(" -> "));
            }
            println!();
            println!("{}", entry.content);
        }
    }

    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
