use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use sl_catalog::Catalog;
use sl_config::LoggingConfig;
use sl_lang::plan;
use sl_runtime::tracing_init::init_tracing;

#[derive(Parser)]
#[command(name = "sluicec", about = "SLQ compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile SLQ text from stdin into a binary plan on stdout
    Compile {
        /// Path to the binary catalog file
        #[arg(long, default_value = "catalog.bin")]
        catalog: PathBuf,
    },
    /// Render a binary plan from stdin as JSON on stdout
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(&LoggingConfig::default(), &std::env::current_dir()?)?;

    match cli.command {
        Commands::Compile { catalog } => {
            let catalog = Catalog::load(&catalog)?;

            let mut query = String::new();
            std::io::stdin().read_to_string(&mut query)?;
            tracing::debug!(domain = "conf", bytes = query.len(), "query read");

            // Any compile error exits non-zero before a single plan byte
            // reaches stdout.
            let root = sl_lang::compile(&query, &catalog)?;
            let bytes = plan::encode(&root)?;

            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
            tracing::info!(domain = "sys", bytes = bytes.len(), "plan written");
        }
        Commands::Show => {
            let mut bytes = Vec::new();
            std::io::stdin().read_to_end(&mut bytes)?;
            let root = plan::decode(&bytes)?;
            println!("{}", plan::to_pretty_json(&root)?);
        }
    }

    Ok(())
}
