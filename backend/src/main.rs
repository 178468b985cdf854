//! Pricelist CLI - Generate derived price lists from base prices and factors
//!
//! # Main Commands
//!
//! ```bash
//! pricelist generate --base base.csv --factors factors.xlsx
//! pricelist generate --base base.csv --factors factors.csv --rm-mapping rm.csv
//! pricelist serve                   # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! pricelist check --base base.csv --factors factors.csv   # Validate + preview
//! pricelist parse input.xlsx                              # Dump a file as JSON
//! ```

use clap::{Parser, Subcommand};
use pricelist::config::{ServerConfig, PREVIEW_ROWS};
use pricelist::{
    check_uploads, generate_pricelists, generate_pricelists_by_rm, load_table_file,
    GenerationOutcome, SampleRow, UploadedFile,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pricelist")]
#[command(
    about = "Generate pricelist files from base prices and pricelist factors",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one CSV per pricelist and pack them into a zip
    Generate {
        /// Base price file (columns: SKU, BasePrice)
        #[arg(short, long)]
        base: PathBuf,

        /// Pricelist factors file (columns: PricelistName, Factor)
        #[arg(short, long)]
        factors: PathBuf,

        /// RM mapping file (columns: PricelistName, RMName); nests output by RM
        #[arg(short, long)]
        rm_mapping: Option<PathBuf>,

        /// Output zip (default: suggested archive name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate uploads and preview them without generating anything
    Check {
        #[arg(short, long)]
        base: PathBuf,

        #[arg(short, long)]
        factors: PathBuf,

        #[arg(short, long)]
        rm_mapping: Option<PathBuf>,
    },

    /// Parse a CSV or spreadsheet and output JSON
    Parse {
        /// Input file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: PRICELIST_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            base,
            factors,
            rm_mapping,
            output,
        } => cmd_generate(&base, &factors, rm_mapping.as_deref(), output.as_deref()),

        Commands::Check {
            base,
            factors,
            rm_mapping,
        } => cmd_check(&base, &factors, rm_mapping.as_deref()),

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_generate(
    base: &Path,
    factors: &Path,
    rm_mapping: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = UploadedFile::from_path(base)?;
    let factors = UploadedFile::from_path(factors)?;

    let result = match rm_mapping {
        Some(path) => {
            let rm = UploadedFile::from_path(path)?;
            generate_pricelists_by_rm(&base, &factors, &rm)
        }
        None => generate_pricelists(&base, &factors),
    };

    match GenerationOutcome::from_result(result)? {
        GenerationOutcome::Success { archive, file_count } => {
            let path = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(&archive.file_name));
            fs::write(&path, &archive.bytes)?;

            if !archive.overwritten.is_empty() {
                eprintln!(
                    "⚠️  Written more than once (last one kept): {}",
                    archive.overwritten.join(", ")
                );
            }
            eprintln!("✅ Generated {} pricelist files successfully.", file_count);
            eprintln!("💾 Archive written to: {}", path.display());
            Ok(())
        }
        GenerationOutcome::ValidationFailure { message, sample, .. } => {
            if let Some((headers, rows)) = sample {
                print_sample(&headers, &rows);
            }
            Err(message.into())
        }
        GenerationOutcome::ParseFailure { message } => Err(message.into()),
    }
}

fn cmd_check(
    base: &Path,
    factors: &Path,
    rm_mapping: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = UploadedFile::from_path(base)?;
    let factors = UploadedFile::from_path(factors)?;
    let rm = rm_mapping.map(UploadedFile::from_path).transpose()?;

    let inputs = match check_uploads(&base, &factors, rm.as_ref()) {
        Ok(inputs) => inputs,
        Err(pricelist::PipelineError::Validation(e)) => {
            if let Some((headers, rows)) = e.sample() {
                print_sample(headers, rows);
            }
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    eprintln!("\n🔍 Preview: Base Price file ({} rows)", inputs.base.len());
    for row in inputs.base.iter().take(PREVIEW_ROWS) {
        println!("   {:<20} {}", row.sku, row.base_price);
    }

    eprintln!("\n🔍 Preview: Pricelist Factors file ({} rows)", inputs.factors.len());
    for row in inputs.factors.iter().take(PREVIEW_ROWS) {
        println!("   {:<20} {}", row.pricelist_name, row.factor);
    }

    if !inputs.rm_mapping.is_empty() {
        eprintln!("\n🔍 Preview: RM Mapping file ({} rows)", inputs.rm_mapping.len());
        for row in inputs.rm_mapping.iter().take(PREVIEW_ROWS) {
            println!("   {:<20} {}", row.pricelist_name, row.rm_name);
        }
    }

    eprintln!("\n✅ Files validated successfully.");
    Ok(())
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let table = load_table_file(input)?;
    eprintln!("   Columns: {}", table.headers.join(", "));
    eprintln!("✅ Parsed {} rows", table.len());

    let json = serde_json::to_string_pretty(&table.to_json_records())?;
    write_output(&json, output)?;

    Ok(())
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env().with_port(port);
    pricelist::server::start_server(config).await
}

/// Print offending rows as a small table
fn print_sample(headers: &[String], rows: &[SampleRow]) {
    eprintln!("\n   line  {}", headers.join(" | "));
    for row in rows {
        eprintln!("   {:>4}  {}", row.line, row.values.join(" | "));
    }
    eprintln!();
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
