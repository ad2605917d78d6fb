use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use sl_config::EngineConfig;
use sl_lang::plan;
use sl_runtime::Pipeline;
use sl_runtime::tracing_init::init_tracing;

#[derive(Parser)]
#[command(name = "sluice", about = "Streaming windowed-aggregation engine")]
struct Cli {
    /// Binary plan file produced by `sluicec compile`
    #[arg(short = 'p', long = "plan")]
    plan: PathBuf,

    /// Terminate after this many seconds
    #[arg(short = 'x', long = "exit-after")]
    exit_after: u64,

    /// Optional engine config TOML
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let _guard = init_tracing(&config.logging, &std::env::current_dir()?)?;

    let bytes = std::fs::read(&cli.plan)
        .map_err(|e| anyhow::anyhow!("cannot read plan {}: {e}", cli.plan.display()))?;
    let root = plan::decode(&bytes)?;

    let pipeline = Pipeline::new(&root, config)?;
    tracing::info!(
        domain = "sys",
        plan = %cli.plan.display(),
        exit_after = cli.exit_after,
        "engine started"
    );

    // Rows in from stdin, rows out to stdout. EOF drains every stage; the
    // wall-clock timer is a hard stop.
    let run = pipeline.run(std::io::stdin(), std::io::stdout());
    match tokio::time::timeout(Duration::from_secs(cli.exit_after), run).await {
        Ok(result) => {
            result?;
            tracing::info!(domain = "sys", "input drained, engine done");
        }
        Err(_) => {
            tracing::info!(domain = "sys", "exit timer expired");
        }
    }

    Ok(())
}
