//! # Email Prospector CLI
//!
//! Command-line interface for the Email Prospector library
//! (`email_prospector_core`). This binary parses arguments, sets up
//! configuration, initializes the core pipeline, runs one discovery
//! request and handles output.

use email_prospector_core::{
    check_smtp_connectivity, initialize_prospector, ConfigBuilder, DiscoveryRequest,
    DiscoveryResult, EmailProspector,
};

// Dependencies specific to the CLI binary
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Discovers and verifies topic-scoped contact email addresses.",
    long_about = "Email Prospector runs round-based search against a search backend, extracts \
                  candidate addresses with nearby context, classifies them, verifies \
                  deliverability (DNS + SMTP with catch-all detection) and deduplicates \
                  results across runs per campaign."
)]
struct AppArgs {
    /// Topic (e.g. an industry) to discover contact addresses for.
    topic: String,

    /// Number of new addresses to return.
    #[arg(default_value_t = 5)]
    target_count: usize,

    /// Optional session identifier; scopes the dedup cache to a campaign
    /// instead of the topic alone.
    session_id: Option<String>,

    /// Path to the output JSON file where the result will be saved.
    #[arg(
        short,
        long,
        default_value = "results.json",
        env = "EMAIL_PROSPECTOR_OUTPUT"
    )]
    output: String,

    /// Print the result to standard output instead of a file.
    #[arg(long, default_value = "false", env = "EMAIL_PROSPECTOR_STDOUT")]
    stdout: bool,

    /// Path to a configuration file (TOML). CLI args override file settings.
    #[arg(long, env = "EMAIL_PROSPECTOR_CONFIG")]
    config_file: Option<String>,

    /// Maximum number of concurrent search/fetch/verify tasks per round.
    #[arg(short, long, env = "EMAIL_PROSPECTOR_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Maximum number of search rounds before giving up.
    #[arg(long, env = "EMAIL_PROSPECTOR_MAX_ROUNDS")]
    max_rounds: Option<u32>,

    /// Base URL of the search backend (SearxNG JSON API).
    #[arg(long, env = "EMAIL_PROSPECTOR_SEARCH_URL")]
    search_url: Option<String>,

    /// Directory holding the campaign dedup stores.
    #[arg(long, env = "EMAIL_PROSPECTOR_CACHE_DIR")]
    cache_dir: Option<String>,

    /// Sender email address used in SMTP verification probes.
    #[arg(long, env = "EMAIL_PROSPECTOR_SMTP_SENDER")]
    smtp_sender: Option<String>,

    /// User agent string for HTTP requests.
    #[arg(long, env = "EMAIL_PROSPECTOR_USER_AGENT")]
    user_agent: Option<String>,

    /// SMTP connection/command timeout in seconds.
    #[arg(long, env = "EMAIL_PROSPECTOR_SMTP_TIMEOUT")]
    smtp_timeout: Option<u64>,

    /// HTTP request timeout in seconds.
    #[arg(long, env = "EMAIL_PROSPECTOR_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// DNS resolution timeout in seconds.
    #[arg(long, env = "EMAIL_PROSPECTOR_DNS_TIMEOUT")]
    dns_timeout: Option<u64>,

    /// Comma-separated list of DNS servers to use for lookups.
    #[arg(long, value_delimiter = ',', env = "EMAIL_PROSPECTOR_DNS_SERVERS")]
    dns_servers: Option<Vec<String>>,

    /// Skip the startup outbound port 25 connectivity test.
    #[arg(long, action = clap::ArgAction::SetTrue, env = "EMAIL_PROSPECTOR_SKIP_SMTP_CHECK")]
    skip_connectivity_check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting up tracing subscriber failed")?;

    tracing::info!(
        "Email Prospector CLI v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let args = AppArgs::parse();
    tracing::debug!("Parsed CLI arguments: {:?}", args);

    let mut config_builder = ConfigBuilder::new();
    if let Some(ref path) = args.config_file {
        config_builder = config_builder.config_file(path);
    }
    if let Some(c) = args.concurrency {
        config_builder = config_builder.max_concurrency(c);
    }
    if let Some(r) = args.max_rounds {
        config_builder = config_builder.max_rounds(r);
    }
    if let Some(ref url) = args.search_url {
        config_builder = config_builder.search_backend_url(url);
    }
    if let Some(ref dir) = args.cache_dir {
        config_builder = config_builder.cache_dir(dir);
    }
    if let Some(ref sender) = args.smtp_sender {
        config_builder = config_builder.smtp_sender_email(sender);
    }
    if let Some(ref ua) = args.user_agent {
        config_builder = config_builder.user_agent(ua);
    }
    if let Some(t) = args.smtp_timeout {
        config_builder = config_builder.smtp_timeout(Duration::from_secs(t));
    }
    if let Some(t) = args.request_timeout {
        config_builder = config_builder.request_timeout(Duration::from_secs(t));
    }
    if let Some(t) = args.dns_timeout {
        config_builder = config_builder.dns_timeout(Duration::from_secs(t));
    }
    if let Some(ref servers) = args.dns_servers {
        if !servers.is_empty() {
            config_builder = config_builder.dns_servers(servers.clone());
        }
    }

    let config = match config_builder.build() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Err(anyhow::anyhow!("Failed to build configuration: {}", e));
        }
    };
    tracing::debug!("Effective configuration loaded: {:?}", config);

    let prospector = match initialize_prospector(&config).await {
        Ok(p) => Arc::new(p),
        Err(e) => {
            tracing::error!("Initialization error: {}", e);
            return Err(anyhow::anyhow!(
                "Failed to initialize EmailProspector core: {}",
                e
            ));
        }
    };

    if !args.skip_connectivity_check {
        match check_smtp_connectivity().await {
            Ok(_) => tracing::info!(
                "SMTP connectivity test passed (outbound port 25 likely open)."
            ),
            Err(e) => {
                tracing::warn!("SMTP connectivity test failed: {}", e);
                tracing::warn!(
                    "SMTP verification may be unreliable; ambiguous probes are accepted \
                     with a confidence penalty."
                );
            }
        }
    }

    wire_ctrl_c(&prospector);

    let request = build_request(&args);
    tracing::info!(
        "Discovering up to {} new address(es) for topic '{}'{}...",
        request.target_count,
        request.topic,
        request
            .session_id
            .as_deref()
            .map(|s| format!(" (session '{}')", s))
            .unwrap_or_default()
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Failed to set spinner template")?,
    );
    spinner.set_message("Running discovery rounds...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = prospector.discover(&request).await;
    spinner.finish_and_clear();

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Discovery failed: {}", e);
            return Err(anyhow::anyhow!("Discovery failed: {}", e));
        }
    };

    log_summary(&result);

    if args.stdout {
        print_cli_results(&result);
    } else {
        tracing::info!("Saving result to '{}'...", args.output);
        save_result(&result, &args.output)?;
        tracing::info!("Result saved successfully to '{}'.", args.output);
    }

    Ok(())
}

fn build_request(args: &AppArgs) -> DiscoveryRequest {
    let mut request = DiscoveryRequest::new(args.topic.clone()).with_target(args.target_count);
    if let Some(ref session) = args.session_id {
        request = request.with_session(session.clone());
    }
    request
}

/// Installs a Ctrl-C handler that requests cancellation: no new rounds or
/// fetches are spawned, in-flight work drains naturally.
fn wire_ctrl_c(prospector: &Arc<EmailProspector>) {
    let cancel = prospector.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received; stopping after in-flight work completes.");
            cancel.cancel();
        }
    });
}

/// Saves the discovery result to the specified JSON file.
fn save_result(result: &DiscoveryResult, file_path: &str) -> Result<()> {
    let output_path = Path::new(file_path);
    if let Some(parent_dir) = output_path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            std::fs::create_dir_all(parent_dir).with_context(|| {
                format!(
                    "Failed to create output directory '{}'",
                    parent_dir.display()
                )
            })?;
        }
    }
    let file = File::create(file_path)
        .with_context(|| format!("Failed to create/truncate output file '{}'", file_path))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, result)
        .with_context(|| format!("Failed to serialize result to JSON for '{}'", file_path))?;
    Ok(())
}

/// Logs a summary of the run to the console using `tracing::info`.
fn log_summary(result: &DiscoveryResult) {
    tracing::info!("-------------------- Discovery Summary --------------------");
    tracing::info!("Topic                      : {}", result.topic);
    tracing::info!("New Addresses Returned     : {}", result.total_emails);
    tracing::info!("Target Achieved            : {}", result.target_achieved);
    tracing::info!("Search Rounds              : {}", result.search_rounds);
    tracing::info!("Phrases Dispatched         : {}", result.stats.phrases_dispatched);
    tracing::info!("Pages Fetched              : {}", result.stats.pages_fetched);
    tracing::info!("Candidates Extracted       : {}", result.stats.candidates_extracted);
    tracing::info!("Skipped (Already Returned) : {}", result.stats.skipped_cached);
    tracing::info!("Rejected (Classification)  : {}", result.stats.rejected_classification);
    tracing::info!("Rejected (Verification)    : {}", result.stats.rejected_verification);
    tracing::info!("Total Time Taken           : {:.2}s", result.execution_time);
    tracing::info!("----------------------------------------------------------");
}

/// Prints the result to standard output (stdout mode).
fn print_cli_results(result: &DiscoveryResult) {
    const BLUE: &str = "\x1b[34m";
    const GREEN: &str = "\x1b[32m";
    const YELLOW: &str = "\x1b[33m";
    const RESET: &str = "\x1b[0m";

    println!("\n{BLUE}===== Email Prospector Results ====={RESET}");
    println!("Topic:  {}", result.topic);
    println!("Rounds: {}", result.search_rounds);
    println!("Time:   {:.2}s", result.execution_time);

    if result.emails.is_empty() {
        println!("\n{YELLOW}Status: NO NEW ADDRESSES FOUND{RESET}");
        println!("Hint: try a more specific topic or raise --max-rounds.");
    } else {
        println!(
            "\n{GREEN}Status: {} NEW ADDRESS(ES){RESET}",
            result.total_emails
        );
        for detail in &result.email_details {
            let mut annotations: Vec<String> = Vec::new();
            if let Some(ref name) = detail.name {
                annotations.push(name.clone());
            }
            if let Some(ref title) = detail.title {
                annotations.push(title.clone());
            }
            if let Some(ref department) = detail.department {
                annotations.push(department.clone());
            }
            let context = if annotations.is_empty() {
                String::new()
            } else {
                format!(" [{}]", annotations.join(", "))
            };
            println!(
                "- {GREEN}{}{RESET} (confidence {:.2}, {:?}, round {}){}",
                detail.email, detail.confidence, detail.verification_status, detail.round, context
            );
        }
    }

    if !result.stats.rejection_reasons.is_empty() {
        println!("\n{BLUE}Rejection Reasons:{RESET}");
        let mut reasons: Vec<_> = result.stats.rejection_reasons.iter().collect();
        reasons.sort_by_key(|(reason, _)| reason.as_str().to_string());
        for (reason, count) in reasons {
            println!("- {}: {}", reason, count);
        }
    }

    println!("{BLUE}===================================={RESET}\n");
}
