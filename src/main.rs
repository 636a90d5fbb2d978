use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use feed_curator::agent::{Orchestrator, OrchestratorDeps, SessionState};
use feed_curator::config::{CuratorConfig, DEFAULT_SYSTEM_PROMPT};
use feed_curator::digest::Summarizer;
use feed_curator::feed::FeedReader;
use feed_curator::llm::{LlmConfig, create_provider};
use feed_curator::publish::{DocumentStore, EmailSink, GitHubStore, Publisher};
use feed_curator::transcript::TranscriptWriter;
use feed_curator::triage::{PreferenceProfile, RelevanceClassifier};

const DEFAULT_MESSAGE: &str = "Read through my top rss feeds and update my reading \
list with anything interesting. Make sure to find interesting articles, summarize \
the abstracts, and upload them to the remote file.";

/// Feed curation agent.
#[derive(Debug, Parser)]
#[command(name = "feed-curator", version, about = "Feed curation agent")]
struct Cli {
    /// User message to the curator.
    #[arg(short, long)]
    message: Option<String>,

    /// User configuration file.
    #[arg(short, long, default_value = "user.toml")]
    config: PathBuf,

    /// Output directory for turn transcripts.
    #[arg(short, long, default_value = "results")]
    output_dir: PathBuf,

    /// Read turns interactively from stdin instead of a one-shot message.
    #[arg(short, long)]
    interactive: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = CuratorConfig::load(&cli.config)?;
    let timeout = config.limits.request_timeout();

    // ── LLM ──────────────────────────────────────────────────────────────
    let llm_config = LlmConfig {
        base_url: config.llm.base_url.clone(),
        api_key: config.llm.api_key()?,
        model: config.llm.model.clone(),
        max_tokens: config.llm.max_tokens,
        temperature: config.llm.temperature,
        timeout,
    };
    let llm = create_provider(&llm_config)?;

    // ── Capabilities ─────────────────────────────────────────────────────
    let store: Arc<dyn DocumentStore> = Arc::new(GitHubStore::new(
        &config.destination,
        config.destination.token()?,
        timeout,
    ));

    let email = match config.email.clone() {
        Some(settings) => {
            let password = settings.password()?;
            eprintln!("   Email: enabled ({} -> {})", settings.smtp_host, settings.recipient);
            Some(EmailSink::new(settings, password, timeout))
        }
        None => {
            eprintln!("   Email: disabled");
            None
        }
    };

    let deps = OrchestratorDeps {
        llm: Arc::clone(&llm),
        reader: FeedReader::new(timeout),
        classifier: RelevanceClassifier::new(
            Arc::clone(&llm),
            PreferenceProfile {
                version: config.user.profile_version.clone(),
                interests: config.user.interests.clone(),
            },
        ),
        summarizer: Summarizer::new(Arc::clone(&llm)),
        publisher: Publisher::new(store, timeout),
        email,
    };

    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Destination: {}:{}", config.destination.repo, config.destination.path);
    eprintln!("   Feeds: {}", config.user.top_feeds.len());

    let mut orchestrator = Orchestrator::new(
        deps,
        config.user.top_feeds.clone(),
        config.limits.clone(),
        DEFAULT_SYSTEM_PROMPT.to_string(),
    );
    let mut session = SessionState::new();
    let transcripts = TranscriptWriter::new(&cli.output_dir);

    if cli.interactive {
        eprintln!("   Type a message and press Enter. /quit to exit.\n");
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        let mut stdout = tokio::io::stdout();

        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                stdout.write_all(b"> ").await?;
                stdout.flush().await?;
                continue;
            }
            let report = orchestrator.handle_turn(&mut session, &line).await?;
            stdout
                .write_all(format!("{}\n", report.reply).as_bytes())
                .await?;
            if report.closed {
                break;
            }
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
        }
    } else {
        let message = cli.message.unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
        let report = orchestrator.handle_turn(&mut session, &message).await?;
        println!("{}", report.reply);

        match transcripts.record(&session, &report.reply).await {
            Ok(path) => tracing::info!(path = %path.display(), "Turn recorded"),
            Err(e) => tracing::warn!("Failed to record transcript: {e}"),
        }
    }

    Ok(())
}
