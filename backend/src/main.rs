//! scada2protocol CLI - Transform SCADA exports into protocol messages
//!
//! # Main Commands
//!
//! ```bash
//! scada2protocol transform mapping.yaml export.csv           # JSON lines on stdout
//! scada2protocol transform mapping.yaml export.csv -o out.json
//! scada2protocol serve                                        # HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! scada2protocol check mapping.yaml      # Validate a mapping
//! scada2protocol parse export.csv        # Just parse the source to JSON
//! scada2protocol streams                 # Supported streams
//! scada2protocol example-mapping         # Print an example mapping
//! ```

use clap::{Parser, Subcommand};
use scada2protocol::{
    example_mapping, load_mapping, parse_file, transform_files, InputFormat, Message,
    StreamKind, TimestampSeeding, TransformOptions,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const PORT_ENV: &str = "SCADA2PROTOCOL_PORT";
const DEFAULT_PORT: u16 = 3000;

#[derive(Parser)]
#[command(name = "scada2protocol")]
#[command(about = "Transform SCADA spreadsheets into protocol messages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a mapping to a source file
    Transform {
        /// Mapping document (YAML or JSON)
        mapping: PathBuf,

        /// Source file (CSV, Excel workbook or JSON array of objects)
        input: PathBuf,

        /// Output file, pretty JSON array (default: JSON lines on stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Input format (default: from the file extension)
        #[arg(long)]
        format: Option<InputFormat>,

        /// Only seed a turbine's timestamp when the timestamp column comes first
        #[arg(long)]
        legacy_timestamps: bool,
    },

    /// Load and validate a mapping document
    Check {
        /// Mapping document (YAML or JSON)
        mapping: PathBuf,
    },

    /// Parse a source file and output its rows as JSON
    Parse {
        /// Source file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Input format (default: from the file extension)
        #[arg(long)]
        format: Option<InputFormat>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported streams
    Streams,

    /// Show an example telemetry mapping
    ExampleMapping,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: $SCADA2PROTOCOL_PORT or 3000)
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
        Commands::Transform {
            mapping,
            input,
            output,
            delimiter,
            format,
            legacy_timestamps,
        } => {
            let options = TransformOptions {
                seeding: if legacy_timestamps {
                    TimestampSeeding::DeclarationOrder
                } else {
                    TimestampSeeding::RowTimestamp
                },
                delimiter,
                format,
            };
            cmd_transform(&mapping, &input, output.as_deref(), options)
        }

        Commands::Check { mapping } => cmd_check(&mapping),

        Commands::Parse {
            input,
            delimiter,
            format,
            output,
        } => cmd_parse(&input, delimiter, format, output.as_deref()),

        Commands::Streams => cmd_streams(),

        Commands::ExampleMapping => cmd_example_mapping(),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("✗ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_transform(
    mapping: &Path,
    input: &Path,
    output: Option<&Path>,
    options: TransformOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = transform_files(mapping, input, options)?;

    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&result.messages)?;
            write_output(&json, Some(path))?;
        }
        None => write_json_lines(&result.messages)?,
    }

    eprintln!("✨ Done!");
    Ok(())
}

/// One compact JSON message per line.
fn write_json_lines(messages: &[Message]) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    for message in messages {
        serde_json::to_writer(&mut out, message)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn cmd_check(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📐 Checking mapping: {}", path.display());

    let mapping = load_mapping(path)?;
    let kind = mapping.stream_kind()?;

    println!("Stream:   {} ({})", mapping.stream, kind.description());
    println!("Policy:   {}", kind.policy());
    println!("Version:  {}", mapping.version);
    println!("Fields:   {}", mapping.fields.len());
    for (column, field) in &mapping.fields {
        let group = field
            .group_key
            .as_ref()
            .map(|k| format!(" [{}={}]", mapping.group_tag, k))
            .unwrap_or_default();
        let tz = field
            .timezone
            .map(|tz| format!(" ({})", tz.name()))
            .unwrap_or_default();
        println!("  {:<24} → {:<20} {}{}{}", column, field.tag, field.field_type, tz, group);
    }

    eprintln!("✓ Mapping is valid");
    Ok(())
}

fn cmd_parse(
    input: &Path,
    delimiter: Option<char>,
    format: Option<InputFormat>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let result = parse_file(input, format, delimiter)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        scada2protocol::parser::format_delimiter(result.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✓ Parsed {} rows", result.records.len());

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_streams() -> Result<(), Box<dyn std::error::Error>> {
    for kind in StreamKind::ALL {
        println!("{:<8} {:<8} {}", kind.code(), kind.policy().to_string(), kind.description());
    }
    Ok(())
}

fn cmd_example_mapping() -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", example_mapping().to_yaml()?);
    Ok(())
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let port = match port {
        Some(port) => port,
        None => match std::env::var(PORT_ENV) {
            Ok(value) => value
                .parse()
                .map_err(|e| format!("invalid {} '{}': {}", PORT_ENV, value, e))?,
            Err(_) => DEFAULT_PORT,
        },
    };
    scada2protocol::server::start_server(port).await?;
    Ok(())
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
