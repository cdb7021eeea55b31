//! # docask CLI
//!
//! The `docask` binary answers questions about a single document from the
//! command line.
//!
//! ## Usage
//!
//! ```bash
//! docask --doc ./manual.md <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docask ask "<question>"` | Ask one question and print the answer |
//! | `docask repl` | Interactive question loop |
//! | `docask context "<question>"` | Print the retrieved context, no endpoint call |
//! | `docask chunks` | Show chunking statistics for the document |
//!
//! ## Examples
//!
//! ```bash
//! # One-shot question against a Markdown manual
//! docask --doc ./manual.md ask "How do I rotate the logs?"
//!
//! # Same, with the grounding context printed first
//! docask --doc ./manual.md ask --show-context "How do I rotate the logs?"
//!
//! # Machine-readable outcome for scripts
//! docask --doc ./manual.md ask --json "How do I rotate the logs?"
//!
//! # Inspect what retrieval would feed the model
//! docask --doc ./manual.md context "log rotation"
//!
//! # Interactive session
//! docask --doc ./manual.md repl
//! ```

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use docask::chunk::chunk_text;
use docask::config;
use docask::document;
use docask::session::Session;
use docask::trace::TraceMode;

/// docask — ask questions about a single document, grounded by local
/// retrieval.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; built-in defaults apply when the file does not exist. The document
/// path comes from `--doc` or `[document].path`.
#[derive(Parser)]
#[command(
    name = "docask",
    about = "Ask questions about a single document, grounded by local retrieval",
    version,
    long_about = "docask retrieves the passages of a document most relevant to a question, \
    sends them with the question to an OpenAI-compatible chat completion endpoint, and \
    decodes the streamed reply into a single answer."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./docask.toml`. Built-in defaults are used when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./docask.toml")]
    config: PathBuf,

    /// Path to the document (overrides `[document].path`).
    #[arg(long, global = true)]
    doc: Option<PathBuf>,

    /// API bearer token. Falls back to the `DOCASK_API_TOKEN` environment
    /// variable; requests are sent without authorization when neither is set.
    #[arg(long, global = true)]
    token: Option<String>,

    /// Retrieval backend: `keyword` or `hybrid` (overrides `[retrieval].backend`).
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Trace output on stderr: `off`, `human`, or `json`.
    /// Defaults to `human` when stderr is a TTY, otherwise `off`.
    #[arg(long, global = true)]
    trace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ask one question and print the answer.
    ///
    /// Retrieves context, queries the endpoint, and prints the decoded
    /// answer on stdout. Per-query failures (auth, network, empty reply)
    /// become fixed messages; the exit code stays zero.
    Ask {
        /// The question to answer.
        question: String,

        /// Print the retrieved context before the answer.
        #[arg(long)]
        show_context: bool,

        /// Print the outcome as a JSON object with `answer` and `context`.
        #[arg(long)]
        json: bool,
    },

    /// Interactive question loop. Type `quit` or `exit` to leave.
    ///
    /// The document is chunked once; every question reuses the cached
    /// chunks. Questions are processed one at a time.
    Repl,

    /// Print the retrieved context for a question without calling the endpoint.
    ///
    /// Useful for checking what retrieval would feed the model.
    Context {
        /// The question to retrieve context for.
        question: String,
    },

    /// Show chunking statistics for the configured document.
    Chunks,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config(&cli.config)?;
    if let Some(backend) = cli.backend {
        config.retrieval.backend = backend;
    }

    let doc_path = cli
        .doc
        .or_else(|| config.document.path.clone())
        .context("no document specified: pass --doc or set [document].path in the config")?;

    let token = cli
        .token
        .or_else(|| std::env::var("DOCASK_API_TOKEN").ok());

    let mode = match cli.trace.as_deref() {
        Some(value) => TraceMode::from_flag(value)?,
        None => TraceMode::default_for_tty(),
    };

    match cli.command {
        Commands::Chunks => {
            let doc = document::load_document(&doc_path)?;
            let chunks = chunk_text(
                &doc.text,
                config.retrieval.chunk_size,
                config.retrieval.overlap,
            );

            println!("document: {}", doc_path.display());
            println!("  chars:       {}", doc.text.chars().count());
            println!("  fingerprint: {}", &doc.fingerprint[..12.min(doc.fingerprint.len())]);
            println!("  chunk size:  {}", config.retrieval.chunk_size);
            println!("  overlap:     {}", config.retrieval.overlap);
            println!("  chunks:      {}", chunks.len());
            if let (Some(first), Some(last)) = (chunks.first(), chunks.last()) {
                println!("  first span:  [{}, {})", first.start_char, first.end_char);
                println!("  last span:   [{}, {})", last.start_char, last.end_char);
            }
        }
        Commands::Context { question } => {
            let mut session = Session::new(&config, &doc_path, token, mode.reporter())?;
            println!("{}", session.context_for(&question));
        }
        Commands::Ask {
            question,
            show_context,
            json,
        } => {
            let mut session = Session::new(&config, &doc_path, token, mode.reporter())?;
            let outcome = session.process_query(&question);
            if json {
                println!("{}", serde_json::to_string(&outcome)?);
            } else {
                if show_context {
                    println!("--- Context ---");
                    println!("{}", outcome.context);
                    println!();
                    println!("--- Answer ---");
                }
                println!("{}", outcome.answer);
            }
        }
        Commands::Repl => {
            let mut session = Session::new(&config, &doc_path, token, mode.reporter())?;

            println!("docask — {}", doc_path.display());
            println!("{}", "-".repeat(40));
            println!("Ask a question, or type 'quit' to exit.");

            let stdin = std::io::stdin();
            loop {
                print!("\n> ");
                std::io::stdout().flush()?;

                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if question.eq_ignore_ascii_case("quit") || question.eq_ignore_ascii_case("exit") {
                    break;
                }

                let outcome = session.process_query(question);
                println!("\n{}", outcome.answer);
            }
        }
    }

    Ok(())
}
