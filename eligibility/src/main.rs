//! Eligibility CLI - normalize partner eligibility files into one table
//!
//! # Commands
//!
//! ```bash
//! eligibility run                      # Process every partner in partners.json
//! eligibility run -o - --rejects drop.csv --report run.json
//! eligibility partners                 # List configured partners
//! eligibility parse acme               # Dump one partner's raw rows as JSON
//! eligibility rules                    # Show per-field normalization rules
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::Table;
use eligibility::config::{ENV_OUTPUT, ENV_REGISTRY, ENV_REJECTS};
use eligibility::logging::{init_logging, LogConfig, LogFormat};
use eligibility::output::DEFAULT_OUTPUT_PATH;
use eligibility::registry::DEFAULT_REGISTRY_PATH;
use eligibility::report::{print_summary, summary_table};
use eligibility::transform::rules_description;
use eligibility::{
    parser, run_pipeline, CsvRejectSink, CsvSink, Destination, NoopRejectSink, PartnerRegistry,
    RejectSink, RowEvent, RunOptions,
};
use serde_json::{json, Value};
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "eligibility")]
#[command(about = "Normalize partner eligibility files into a unified member table", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatArg,

    /// Append logs to this file instead of stderr
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    /// Prefix log lines with timestamps
    #[arg(long = "log-timestamps", global = true)]
    log_timestamps: bool,

    /// Include the module target in log lines
    #[arg(long = "log-target", global = true)]
    log_target: bool,

    /// Allow member values in trace logs
    #[arg(long = "log-data", global = true)]
    log_data: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[derive(Args)]
struct RegistryArg {
    /// Partner registry (JSON)
    #[arg(short, long, env = ENV_REGISTRY, default_value = DEFAULT_REGISTRY_PATH)]
    registry: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every registered partner and write the unified table
    Run {
        #[command(flatten)]
        registry: RegistryArg,

        /// Unified CSV output ("-" for stdout)
        #[arg(short, long, env = ENV_OUTPUT, default_value = DEFAULT_OUTPUT_PATH)]
        output: PathBuf,

        /// Write dropped rows to this CSV
        #[arg(long, env = ENV_REJECTS)]
        rejects: Option<PathBuf>,

        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List configured partners
    Partners {
        #[command(flatten)]
        registry: RegistryArg,
    },

    /// Read one partner file and output its raw rows as JSON
    Parse {
        /// Partner identifier (registry key)
        partner: String,

        #[command(flatten)]
        registry: RegistryArg,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show per-field normalization rules
    Rules,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_config = log_config_from_cli(&cli);
    if let Err(e) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Run {
            registry,
            output,
            rejects,
            report,
        } => cmd_run(&registry.registry, &output, rejects, report),
        Commands::Partners { registry } => cmd_partners(&registry.registry),
        Commands::Parse {
            partner,
            registry,
            output,
        } => cmd_parse(&registry.registry, &partner, output.as_deref()),
        Commands::Rules => cmd_rules(),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    LogConfig::from_verbosity(cli.verbose)
        .with_format(format)
        .with_ansi(cli.log_file.is_none() && io::stderr().is_terminal())
        .with_log_file(cli.log_file.clone())
        .with_log_data(cli.log_data)
        .with_timestamps(cli.log_timestamps)
        .with_target(cli.log_target)
}

fn cmd_run(
    registry: &Path,
    output: &Path,
    rejects: Option<PathBuf>,
    report: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = RunOptions::default()
        .with_registry(registry)
        .with_output(Destination::parse(output))
        .with_rejects(rejects)
        .with_report(report);

    let mut sink = CsvSink::new(options.output.clone());
    let mut reject_sink: Box<dyn RejectSink> = match &options.rejects_path {
        Some(path) => Box::new(CsvRejectSink::to_path(path)),
        None => Box::new(NoopRejectSink),
    };

    let result = run_pipeline(&options, &mut sink, reject_sink.as_mut())?;

    // Keep stdout clean when it carries the table
    if options.output == Destination::Stdout {
        eprintln!("{}", summary_table(&result));
    } else {
        print_summary(&result);
    }

    Ok(())
}

fn cmd_partners(registry: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let registry = PartnerRegistry::load(registry)?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED).set_header(vec![
        "Partner",
        "Code",
        "File",
        "Delimiter",
        "Encoding",
        "Mapping",
    ]);

    for partner in &registry {
        let mapping = partner
            .column_mapping
            .iter()
            .map(|(column, field)| format!("{} -> {}", column, field))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            partner.partner_id.clone(),
            partner.partner_code.clone(),
            partner.file_path.display().to_string(),
            format_delimiter(partner.delimiter),
            partner.encoding.clone().unwrap_or_else(|| "auto".to_string()),
            mapping,
        ]);
    }

    println!("{}", table);
    Ok(())
}

fn cmd_parse(
    registry: &Path,
    partner_id: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = PartnerRegistry::load(registry)?;
    let partner = registry
        .get(partner_id)
        .ok_or_else(|| format!("unknown partner '{}'", partner_id))?;

    eprintln!("Parsing: {}", partner.file_path.display());
    let rows = parser::read(partner)?;
    eprintln!("   Encoding: {}", rows.encoding());
    eprintln!("   Delimiter: '{}'", format_delimiter(partner.delimiter));
    eprintln!("   Columns: {}", rows.headers().join(", "));

    let headers = rows.headers().to_vec();
    let mut records: Vec<Value> = Vec::new();
    let mut skipped: Vec<Value> = Vec::new();
    for event in rows {
        match event {
            RowEvent::Row(row) => records.push(row.to_value()),
            RowEvent::Skipped(skip) => skipped.push(json!({
                "line": skip.line,
                "expected": skip.expected,
                "found": skip.found,
            })),
        }
    }
    eprintln!("Parsed {} rows, {} malformed", records.len(), skipped.len());

    let json = serde_json::to_string_pretty(&json!({
        "partner": partner.partner_id,
        "partner_code": partner.partner_code,
        "headers": headers,
        "rows": records,
        "skipped": skipped,
    }))?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_rules() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", rules_description());
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Saved to: {}", p.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
