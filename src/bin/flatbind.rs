//! flatbind CLI - convert flat files described by a YAML mapping to and from JSON

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use flatbind::config::BuiltMapping;
use flatbind::{
    DelimitedReader, DelimitedWriter, JsonArrayWriter, MappingFile, MultiplexedReader,
    MultiplexedWriter, NdjsonReader, NdjsonWriter, Strategy,
};

#[derive(Parser)]
#[command(name = "flatbind")]
#[command(version, about = "Bind flat-file records to entities described by YAML mappings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a mapping file and list its schemas
    Validate {
        /// Path to the YAML mapping file
        #[arg(short, long)]
        mapping: PathBuf,
    },

    /// Read a delimited file and write its records as JSON
    ToJson {
        /// Path to the YAML mapping file
        #[arg(short, long)]
        mapping: PathBuf,

        /// Delimited input file ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// JSON output file ("-" for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Log and skip records that fail to bind
        #[arg(long)]
        skip_errors: bool,

        /// Write one JSON array instead of NDJSON
        #[arg(long)]
        array: bool,

        /// Override the accessor strategy of the mapping file
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
    },

    /// Read NDJSON records and write them as a delimited file
    FromJson {
        /// Path to the YAML mapping file
        #[arg(short, long)]
        mapping: PathBuf,

        /// NDJSON input file ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Delimited output file ("-" for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Write a header line for the layout of the first record
        #[arg(long)]
        header: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Generated,
    Reflection,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Generated => Strategy::Generated,
            StrategyArg::Reflection => Strategy::Reflection,
        }
    }
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { mapping } => validate(&mapping),
        Commands::ToJson {
            mapping,
            input,
            output,
            skip_errors,
            array,
            strategy,
        } => to_json(&mapping, &input, &output, skip_errors, array, strategy),
        Commands::FromJson {
            mapping,
            input,
            output,
            header,
        } => from_json(&mapping, &input, &output, header),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn open_input(path: &Path) -> Result<Box<dyn Read>, String> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    Ok(Box::new(BufReader::new(file)))
}

fn open_output(path: &Path) -> Result<Box<dyn Write>, String> {
    if path == Path::new("-") {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    let file = File::create(path).map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn load_mapping(path: &Path, strategy: Option<StrategyArg>) -> Result<BuiltMapping, String> {
    let mut file = MappingFile::load_from_file(path).map_err(|e| format!("Failed to load mapping: {}", e))?;
    if let Some(strategy) = strategy {
        file.options.strategy = strategy.into();
        file.options.fallback_to_reflection = true;
    }
    file.build().map_err(|e| format!("Failed to build mapping: {}", e))
}

/// Validate a mapping file
fn validate(mapping: &Path) -> Result<(), String> {
    println!("🔍 Validating {}...", mapping.display());

    let built = load_mapping(mapping, None)?;
    for schema in &built.schemas {
        let layout = schema.mapping.schema();
        println!(
            "  ✓ {} ({} columns, {} bound){}",
            schema.name,
            layout.physical_count(),
            layout.logical_count(),
            if schema.is_default() { " [default]" } else { "" }
        );
        for binding in schema.mapping.registry().bindings() {
            let logical = binding
                .logical_index()
                .map(|i| i.to_string())
                .unwrap_or_else(|| "-".to_string());
            let member = match binding.as_member() {
                Some(m) => m.accessor().name().to_string(),
                None if binding.is_ignored() => "(ignored)".to_string(),
                None => "(custom)".to_string(),
            };
            println!(
                "      {:>3} {:>3}  {:<24} {}",
                binding.physical_index(),
                logical,
                binding.column().name(),
                member
            );
        }
    }

    println!("✅ Mapping is valid");
    Ok(())
}

enum JsonSink {
    Lines(NdjsonWriter<Box<dyn Write>>),
    Array(JsonArrayWriter<Box<dyn Write>>),
}

/// Convert a delimited file to JSON
fn to_json(
    mapping: &Path,
    input: &Path,
    output: &Path,
    skip_errors: bool,
    array: bool,
    strategy: Option<StrategyArg>,
) -> Result<(), String> {
    let built = load_mapping(mapping, strategy)?;
    let source = DelimitedReader::new(open_input(input)?, built.codec.clone())
        .with_property("source", &input.display().to_string());
    let reader = MultiplexedReader::new(source, built.dispatcher());

    let out = open_output(output)?;
    let mut sink = if array {
        JsonSink::Array(JsonArrayWriter::new(out).map_err(|e| e.to_string())?)
    } else {
        JsonSink::Lines(NdjsonWriter::new(out))
    };

    let mut written = 0usize;
    let mut skipped = 0usize;
    for record in reader {
        let record = match record {
            Ok(record) => record,
            Err(e) if skip_errors && e.is_record_error() => {
                tracing::warn!(error = %e, "skipping record");
                skipped += 1;
                continue;
            }
            Err(e) => return Err(format!("Failed to read record: {}", e)),
        };
        let result = match &mut sink {
            JsonSink::Lines(w) => w.write(&record),
            JsonSink::Array(w) => w.write(&record),
        };
        result.map_err(|e| e.to_string())?;
        written += 1;
    }

    match sink {
        JsonSink::Lines(mut w) => w.flush().map_err(|e| e.to_string())?,
        JsonSink::Array(w) => {
            w.finish().map_err(|e| e.to_string())?;
        }
    }

    tracing::info!(written, skipped, "converted records to JSON");
    Ok(())
}

/// Convert NDJSON records to a delimited file
fn from_json(mapping: &Path, input: &Path, output: &Path, header: bool) -> Result<(), String> {
    let built = load_mapping(mapping, None)?;
    let records = NdjsonReader::new(BufReader::new(open_input(input)?));
    let sink = DelimitedWriter::new(open_output(output)?, built.codec.clone());
    let mut writer = MultiplexedWriter::new(sink, built.dispatcher());

    let mut written = 0usize;
    for record in records {
        let record = record.map_err(|e| format!("Failed to read JSON: {}", e))?;
        if header && written == 0 {
            writer
                .write_schema_for(&record)
                .map_err(|e| format!("Failed to write header: {}", e))?;
        }
        writer
            .write(&record)
            .map_err(|e| format!("Failed to write record {}: {}", written + 1, e))?;
        written += 1;
    }

    writer
        .into_inner()
        .into_inner()
        .map_err(|e| e.to_string())?
        .flush()
        .map_err(|e| e.to_string())?;

    tracing::info!(written, "converted JSON to delimited records");
    Ok(())
}
