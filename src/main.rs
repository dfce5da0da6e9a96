//! qwen3-onnx CLI
//!
//! # Commands
//!
//! - `embed` - Embed a few texts and print a preview of each vector
//! - `compare` - Check pipeline embeddings against the reference fixture
//! - `chat` - Interactive chat with the causal model

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use qwen3_onnx::{
    AppConfig, Availability, CancelFlag, DEMO_TEXTS, Embedder, EmbeddingConfig, ExecutionProvider,
    LanguageModel, LogFormat, OutputMode, ReferenceSet, ReferenceStore,
    embedding::{EmbeddingTokenizer, load_tokenizer},
    format_preview, run_console,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Qwen3 embedding and chat over ONNX Runtime
#[derive(Parser)]
#[command(name = "qwen3-onnx")]
#[command(version, about, long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Execution provider: cpu, cuda[:N] or dml[:N]
    #[arg(short, long, global = true)]
    provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed texts and print the dimension and first values of each vector
    ///
    /// Examples:
    ///   qwen3-onnx embed
    ///   qwen3-onnx embed "Hello world" --provider cuda
    Embed {
        /// Texts to embed (three demo sentences if omitted)
        #[arg(value_name = "TEXT")]
        texts: Vec<String>,

        /// Number of leading values to print
        #[arg(short = 'n', long, default_value = "10")]
        preview: usize,
    },

    /// Compare pipeline embeddings with the Python reference fixture
    Compare {
        /// Fixture JSON (defaults to the configured or bundled one)
        #[arg(short, long, value_name = "FILE")]
        fixture: Option<PathBuf>,

        /// Also run on an accelerator; skipped if it cannot be acquired
        #[arg(long)]
        gpu: bool,
    },

    /// Interactive chat (Ctrl+C aborts the current reply or exits at the prompt, `quit()` exits)
    Chat(ChatArgs),
}

#[derive(Args)]
struct ChatArgs {
    /// Maximum total sequence length, prompt included
    #[arg(short = 'l', long)]
    max_length: Option<usize>,

    /// Deterministic decoding (temperature 0, top_k 1) over the model's own
    /// search settings
    #[arg(long)]
    greedy: bool,

    /// Print the reply once it is complete instead of streaming it
    #[arg(long)]
    buffered: bool,

    /// Seed for sampling
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(provider) = cli.provider {
        config.provider = provider;
        config.validate()?;
    }
    init_tracing(&config);

    match cli.command {
        Commands::Embed { texts, preview } => embed(&config, texts, preview).await,
        Commands::Compare { fixture, gpu } => {
            let failures = compare(&config, fixture, gpu).await?;
            if failures > 0 {
                bail!("{failures} embedding(s) below threshold");
            }
            Ok(())
        }
        Commands::Chat(args) => chat(&config, args).await,
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Opens an embedder on the configured provider, falling back to CPU when the
/// accelerator cannot be acquired.
async fn open_embedder(config: &AppConfig) -> anyhow::Result<Embedder> {
    let provider = config.execution_provider()?;
    let paths = config.model_paths()?;
    let cfg = config.embedding_config(&paths, provider);

    println!("Loading tokenizer...");
    let tokenizer = load_tokenizer(&cfg).await?;
    println!("Loading embedding model on {provider}...");
    let embedder = match Embedder::acquire_with_tokenizer(&cfg, tokenizer.clone())? {
        Availability::Ready(embedder) => embedder,
        Availability::Unavailable { provider, reason } => {
            println!("{provider} unavailable ({reason}), using cpu");
            Embedder::with_tokenizer(&cfg.with_provider(ExecutionProvider::Cpu), tokenizer)?
        }
    };
    println!("Model loaded\n");
    Ok(embedder)
}

async fn embed(config: &AppConfig, texts: Vec<String>, preview: usize) -> anyhow::Result<()> {
    let texts = if texts.is_empty() {
        DEMO_TEXTS.iter().map(|t| t.to_string()).collect()
    } else {
        texts
    };

    let mut embedder = open_embedder(config).await?;
    for text in &texts {
        let embedding = embedder.embed(text)?;
        println!("Text: {text}");
        println!("Embedding dimension: {}", embedding.embedding_dim);
        println!(
            "First {preview} values: {}",
            format_preview(&embedding.vector, preview)
        );
        println!();
    }
    Ok(())
}

/// Returns the number of failed comparisons across every provider that ran.
async fn compare(
    config: &AppConfig,
    fixture: Option<PathBuf>,
    gpu: bool,
) -> anyhow::Result<usize> {
    let store = fixture
        .map(ReferenceStore::new)
        .unwrap_or_else(|| config.reference_store());
    let references = store
        .get()
        .with_context(|| format!("loading {}", store.path().display()))?;
    println!(
        "Loaded {} reference embeddings from {}",
        references.len(),
        store.path().display()
    );

    let paths = config.model_paths()?;
    let cpu_cfg = config.embedding_config(&paths, ExecutionProvider::Cpu);
    let tokenizer = load_tokenizer(&cpu_cfg).await?;

    let mut cpu = Embedder::with_tokenizer(&cpu_cfg, tokenizer.clone())?;
    let mut failures = report(
        &mut cpu,
        references,
        ExecutionProvider::Cpu,
        config.match_threshold(ExecutionProvider::Cpu),
    )?;
    drop(cpu);

    if gpu {
        let provider = match config.execution_provider()? {
            p if p.is_accelerator() => p,
            _ => ExecutionProvider::CUDA_DEFAULT,
        };
        failures += compare_on_accelerator(config, &cpu_cfg, tokenizer, references, provider)?;
    }
    Ok(failures)
}

fn compare_on_accelerator(
    config: &AppConfig,
    cpu_cfg: &EmbeddingConfig,
    tokenizer: EmbeddingTokenizer,
    references: &ReferenceSet,
    provider: ExecutionProvider,
) -> anyhow::Result<usize> {
    match Embedder::acquire_with_tokenizer(&cpu_cfg.with_provider(provider), tokenizer)? {
        Availability::Ready(mut embedder) => report(
            &mut embedder,
            references,
            provider,
            config.match_threshold(provider),
        ),
        Availability::Unavailable { provider, reason } => {
            println!("\n[{provider}] unavailable, skipping: {reason}");
            Ok(0)
        }
    }
}

fn report(
    embedder: &mut Embedder,
    references: &ReferenceSet,
    provider: ExecutionProvider,
    threshold: f64,
) -> anyhow::Result<usize> {
    println!("\n[{provider}] threshold {threshold}");
    let mut failures = 0;
    for text in references.texts() {
        let embedding = embedder.embed(text)?;
        let comparison = references.compare(text, &embedding.vector, threshold)?;
        let verdict = if comparison.passed() { "ok" } else { "FAIL" };
        println!("  {verdict:<4} {:.6}  {text}", comparison.similarity);
        if !comparison.passed() {
            failures += 1;
        }
    }
    info!(%provider, failures, "comparison_complete");
    Ok(failures)
}

async fn chat(config: &AppConfig, args: ChatArgs) -> anyhow::Result<()> {
    let provider = config.execution_provider()?;
    let paths = config.model_paths()?;
    let gen_cfg = config.generation_config(&paths, provider);

    let mode = if args.buffered {
        OutputMode::Buffered
    } else {
        config.generation.output
    };
    let sampling = config.generation.search_options();

    // Ctrl+C aborts a running reply; anywhere else it ends the program.
    let cancel = CancelFlag::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    warn!("ctrl_c_handler_unavailable");
                    break;
                }
                // stdout stays locked by the console for the whole session.
                if !cancel.interrupt() {
                    eprintln!();
                    std::process::exit(130);
                }
            }
        }
    });

    let summary = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        println!("Loading model...");
        let mut model = match LanguageModel::acquire(&gen_cfg)? {
            Availability::Ready(model) => model,
            Availability::Unavailable { provider, reason } => {
                println!("{provider} unavailable ({reason}), using cpu");
                LanguageModel::load(&gen_cfg.with_provider(ExecutionProvider::Cpu))?
            }
        };
        println!("Model loaded on {}", model.provider());

        let mut options = if args.greedy {
            model.search_defaults().into_greedy()
        } else {
            sampling
        };
        if let Some(max_length) = args.max_length {
            options.max_length = max_length;
        }
        if args.seed.is_some() {
            options.seed = args.seed;
        }
        options.validate()?;

        let mut input = io::stdin().lock();
        let mut output = io::stdout().lock();
        let summary = run_console(&mut input, &mut output, mode, &cancel, |text, cancel, sink| {
            model.chat(text, &options, mode, cancel, sink)
        })?;
        output.flush()?;
        Ok(summary)
    })
    .await??;

    watcher.abort();
    info!(
        completed = summary.completed,
        interrupted = summary.interrupted,
        "chat_session_closed"
    );
    Ok(())
}
