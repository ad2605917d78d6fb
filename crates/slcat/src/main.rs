use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use sl_catalog::{Catalog, write_csv_templates};

/// Catalog transcoder: reads a catalog on stdin, writes it on stdout, and
/// drops one CSV header template per table into the template directory.
#[derive(Parser)]
#[command(name = "slcat", about = "Catalog transcoder and template generator")]
struct Cli {
    /// Input catalog format
    #[arg(short = 'i', long = "input", value_enum)]
    input: Format,

    /// Output catalog format
    #[arg(short = 'o', long = "output", value_enum)]
    output: Format,

    /// Directory receiving one CSV header template per table
    #[arg(short = 't', long = "templates")]
    templates: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Bin,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let stdin = std::io::stdin().lock();
    let catalog = match cli.input {
        Format::Bin => Catalog::read_binary(stdin)?,
        Format::Json => Catalog::read_json(stdin)?,
    };

    let stdout = std::io::stdout().lock();
    match cli.output {
        Format::Bin => catalog.write_binary(stdout)?,
        Format::Json => catalog.write_json(stdout)?,
    }

    write_csv_templates(&catalog, &cli.templates)?;
    Ok(())
}
