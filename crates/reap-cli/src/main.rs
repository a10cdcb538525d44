use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reap_client::{AnySink, ChromiumSessionFactory};
use reap_core::traits::NullSink;
use reap_core::{InvocationOutcome, Pipeline, ReapConfig, Runner, invoke};

#[derive(Parser)]
#[command(name = "reap", version, about = "Crawl a forum listing and capture recent posts with their discussions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one crawl to completion; failures exit non-zero
    Run(RunArgs),

    /// Run one crawl and print {"success": bool}; always exits 0
    Invoke(RunArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// DevTools websocket endpoint; when set, details are fetched in concurrent groups
    #[arg(long, env = "BROWSER_WS_ENDPOINT")]
    browser_ws_endpoint: Option<String>,

    /// First listing page to crawl
    #[arg(long, env = "REAP_LISTING_URL")]
    listing_url: Option<String>,

    /// Only capture items posted within this many hours
    #[arg(long, env = "REAP_WINDOW_HOURS")]
    window_hours: Option<usize>,

    /// Items per browser session in concurrent mode
    #[arg(long, env = "REAP_GROUP_SIZE")]
    group_size: Option<usize>,

    /// Upper bound on browser sessions open at once in concurrent mode
    #[arg(long, env = "REAP_MAX_SESSIONS")]
    max_sessions: Option<usize>,

    /// Stop after this many listing pages
    #[arg(long, env = "REAP_MAX_PAGES")]
    max_pages: Option<usize>,

    /// Deepest comment nesting read before a discussion is dropped
    #[arg(long, env = "REAP_MAX_COMMENT_DEPTH")]
    max_comment_depth: Option<usize>,

    /// Per-navigation timeout in seconds
    #[arg(long, env = "REAP_NAV_TIMEOUT_SECS")]
    nav_timeout_secs: Option<usize>,

    /// HTTP endpoint receiving records as JSON; records go to stdout when unset
    #[arg(long, env = "REAP_SINK_URL")]
    sink_url: Option<String>,

    /// Chromium binary for local mode
    #[arg(long, env = "CHROME_BIN")]
    chrome_bin: Option<PathBuf>,

    /// Crawl and fetch but discard every record
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

impl RunArgs {
    /// Flag values under the environment names `ReapConfig` understands.
    fn setting(&self, key: &str) -> Option<String> {
        let number = |v: Option<usize>| v.map(|n| n.to_string());
        match key {
            "BROWSER_WS_ENDPOINT" => self.browser_ws_endpoint.clone(),
            "REAP_LISTING_URL" => self.listing_url.clone(),
            "REAP_WINDOW_HOURS" => number(self.window_hours),
            "REAP_GROUP_SIZE" => number(self.group_size),
            "REAP_MAX_SESSIONS" => number(self.max_sessions),
            "REAP_MAX_PAGES" => number(self.max_pages),
            "REAP_MAX_COMMENT_DEPTH" => number(self.max_comment_depth),
            "REAP_NAV_TIMEOUT_SECS" => number(self.nav_timeout_secs),
            _ => None,
        }
    }

    fn config(&self) -> Result<ReapConfig> {
        ReapConfig::from_lookup(|key| self.setting(key)).context("Invalid configuration")
    }

    fn sink(&self) -> Result<AnySink> {
        if self.dry_run {
            return Ok(AnySink::Null(NullSink));
        }
        AnySink::from_endpoint(self.sink_url.as_deref()).context("Failed to create sink")
    }

    fn pipeline(&self) -> Result<Pipeline<ChromiumSessionFactory, AnySink>> {
        let config = self.config()?;
        let sink = self.sink()?;

        let mut factory = ChromiumSessionFactory::from_config(&config);
        if let Some(bin) = &self.chrome_bin {
            factory = factory.with_chrome_binary(bin);
        }

        tracing::info!(
            listing = %config.listing_url,
            remote = config.mode.is_remote(),
            sink = sink.name(),
            "Configured"
        );
        Ok(Pipeline::new(config, factory, sink))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries records and the invoke result.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("reap=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cmd_run(&args).await?,
        Commands::Invoke(args) => cmd_invoke(&args).await?,
    }

    Ok(())
}

async fn cmd_run(args: &RunArgs) -> Result<()> {
    let pipeline = args.pipeline()?;
    let summary = pipeline
        .run()
        .await
        .context("Run failed")?;

    tracing::info!(
        run_id = %summary.run_id,
        pages = summary.pages_visited,
        stop = %summary.stop_reason,
        items = summary.stubs,
        published = summary.schedule.published,
        failed = summary.schedule.failed,
        failed_groups = summary.schedule.failed_groups,
        "Done"
    );
    Ok(())
}

async fn cmd_invoke(args: &RunArgs) -> Result<()> {
    let outcome = match args.pipeline() {
        Ok(pipeline) => invoke(&pipeline).await,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Run failed");
            InvocationOutcome { success: false }
        }
    };
    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}
