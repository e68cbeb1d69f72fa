use anyhow::Result;
use clap::{Parser, Subcommand};
use contextiq_core::Acquired;
use contextiq_local::{llm, ocr, Acquirer};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "contextiq")]
#[command(about = "Acquire text from files, webpages, or typed input and analyze it with AI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Acquire a normalized text buffer from one source and print it.
    Acquire(AcquireCmd),
    /// Summarize the acquired buffer (configured chat-completions service).
    Summarize(SourceArgs),
    /// Sentiment/themes/keywords analysis of the acquired buffer (json).
    Analyze(SourceArgs),
    /// One-shot Q&A grounded in the acquired buffer.
    Chat(ChatCmd),
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor,
    /// Print version info.
    Version,
}

#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// Inline text to use as the buffer.
    #[arg(long, conflicts_with_all = ["file", "url"])]
    text: Option<String>,
    /// Read and extract a local file (txt/md/csv/rtf, pdf, docx, or an image for OCR).
    #[arg(long, conflicts_with = "url")]
    file: Option<std::path::PathBuf>,
    /// Fetch and extract a webpage.
    #[arg(long)]
    url: Option<String>,
    /// Maximum upload size in MB for --file.
    #[arg(long, default_value_t = 15)]
    max_upload_mb: u64,
}

#[derive(clap::Args, Debug)]
struct AcquireCmd {
    #[command(flatten)]
    source: SourceArgs,
    /// Output format. Allowed: text, json
    #[arg(long, default_value = "text")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct ChatCmd {
    #[command(flatten)]
    source: SourceArgs,
    /// The question to ask about the acquired content.
    #[arg(long)]
    message: String,
}

fn acquirer_for(args: &SourceArgs) -> Result<Acquirer> {
    let mut acquirer = Acquirer::from_env()?;
    if args.max_upload_mb != acquirer.policy().max_upload_mb {
        let mut policy = acquirer.policy().clone();
        policy.max_upload_mb = args.max_upload_mb;
        acquirer = acquirer.with_policy(policy);
    }
    Ok(acquirer)
}

async fn acquire_from(args: &SourceArgs) -> Result<Acquired> {
    let acquirer = acquirer_for(args)?;

    if let Some(text) = &args.text {
        return Ok(acquirer.acquire_text(text)?);
    }
    if let Some(path) = &args.file {
        let bytes = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload");
        let progress: ocr::Progress = Arc::new(|pct| tracing::debug!(pct, "ocr progress"));
        return Ok(acquirer.acquire_file(name, &bytes, Some(progress)).await?);
    }
    if let Some(url) = &args.url {
        return Ok(acquirer.acquire_url(url).await?);
    }
    anyhow::bail!("pass exactly one of --text, --file, or --url")
}

fn llm_client() -> Result<llm::ChatClient> {
    let client = contextiq_local::http_client()?;
    Ok(llm::ChatClient::from_env(client)?)
}

fn load_env_file() {
    // Optional env-file loader (opt-in). Sets vars only if not already set in
    // the process environment; never logs values.
    let Ok(p) = std::env::var("CONTEXTIQ_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v.trim());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Acquire(args) => {
            let acquired = acquire_from(&args.source).await?;
            match args.output.to_ascii_lowercase().as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&acquired)?),
                _ => println!("{}", acquired.text),
            }
        }
        Commands::Summarize(args) => {
            let acquired = acquire_from(&args).await?;
            let summary = llm_client()?.summarize(&acquired.text).await?;
            println!("{summary}");
        }
        Commands::Analyze(args) => {
            let acquired = acquire_from(&args).await?;
            let analysis = llm_client()?.analyze(&acquired.text).await?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Commands::Chat(args) => {
            let acquired = acquire_from(&args.source).await?;
            let reply = llm_client()?
                .chat(&args.message, Some(&acquired.text), &[])
                .await?;
            println!("{reply}");
        }
        Commands::Doctor => {
            fn has_env(k: &str) -> bool {
                std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
            }

            // Env presence (booleans only; never print values).
            let report = serde_json::json!({
                "ok": true,
                "checks": [
                    {
                        "name": "llm_configured",
                        "ok": has_env("CONTEXTIQ_LLM_BASE_URL") && has_env("CONTEXTIQ_LLM_MODEL"),
                        "hint": "set CONTEXTIQ_LLM_BASE_URL and CONTEXTIQ_LLM_MODEL (CONTEXTIQ_LLM_API_KEY optional)"
                    },
                    {
                        "name": "hosted_scrape_configured",
                        "ok": has_env("CONTEXTIQ_SCRAPE_ENDPOINT"),
                        "hint": "optional; relays are used when unset"
                    },
                    {
                        "name": "tesseract_available",
                        "ok": ocr::has("tesseract"),
                        "hint": "install tesseract-ocr to extract text from images"
                    }
                ],
                "relays": contextiq_local::scrape::ScrapeConfig::from_env()
                    .relays
                    .iter()
                    .map(|r| r.name.clone())
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Version => {
            println!("contextiq {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
