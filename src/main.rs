//! gl-clearing CLI
//!
//! Clear General-Ledger open items from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Clear the configured ledger export
//! gl-clearing run --config config.yaml
//!
//! # Clear another export as of a given date, as JSON
//! gl-clearing run --config config.yaml --ledger fbl3n.csv --as-of 2024-06-28 --format json
//!
//! # Check a rules document
//! gl-clearing validate --rules rules.yaml
//!
//! # Inspect the business calendar around a date
//! gl-clearing calendar --config config.yaml --date 2024-12-24
//!
//! # Generate a random ledger export for testing
//! gl-clearing generate --company-codes 1000:DE,2000:FR --items 5000 --output ledger.csv
//! ```

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use gl_clearing::config::AppConfig;
use gl_clearing::core::calendar::parse_date;
use gl_clearing::core::ledger_row::write_ledger_csv;
use gl_clearing::error::Result;
use gl_clearing::pipeline::{run_from_config, RunOptions};
use gl_clearing::rules::rule_set::RuleSet;
use gl_clearing::simulation::ledger_generator::{generate_ledger, LedgerConfig};
use log::info;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::process;

/// Exit code of a run that completed with diagnostics.
const EXIT_DIAGNOSTICS: i32 = 3;

#[derive(Parser)]
#[command(
    name = "gl-clearing",
    version,
    about = "Automated clearing of General-Ledger open items"
)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clear a ledger export
    Run {
        /// Application configuration file
        #[arg(short, long, env = "GL_CLEARING_CONFIG")]
        config: PathBuf,
        /// Ledger export overriding the configured one
        #[arg(short, long)]
        ledger: Option<PathBuf>,
        /// Rules document overriding the configured one
        #[arg(short, long)]
        rules: Option<PathBuf>,
        /// Run date (YYYY-MM-DD or DD.MM.YYYY), defaults to today
        #[arg(long)]
        as_of: Option<String>,
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Write the result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a rules document
    Validate {
        #[arg(short, long)]
        rules: PathBuf,
    },
    /// Show business calendar facts around a date
    Calendar {
        #[arg(short, long, env = "GL_CLEARING_CONFIG")]
        config: PathBuf,
        #[arg(short, long)]
        date: String,
    },
    /// Generate a random ledger export
    Generate {
        /// Comma-separated CODE:COUNTRY entries
        #[arg(long, value_delimiter = ',', default_value = "1000:DE,2000:FR")]
        company_codes: Vec<String>,
        #[arg(short, long, default_value_t = 1000)]
        items: usize,
        #[arg(short, long)]
        seed: Option<u64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn cmd_run(
    config: PathBuf,
    ledger: Option<PathBuf>,
    rules: Option<PathBuf>,
    as_of: Option<String>,
    format: Format,
    output: Option<PathBuf>,
) -> Result<i32> {
    let config = AppConfig::load(&config)?;
    let as_of = match as_of {
        Some(text) => parse_date(&text)?,
        None => Local::now().date_naive(),
    };
    let options = RunOptions {
        as_of,
        ledger_path: ledger,
        rules_path: rules,
    };

    let result = run_from_config(&config, &options)?;
    let rendered = match format {
        Format::Text => result.to_string(),
        Format::Json => serde_json::to_string_pretty(&result)?,
    };

    match output {
        Some(path) => {
            fs::write(&path, rendered)?;
            info!("Result written to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(if result.has_diagnostics() {
        EXIT_DIAGNOSTICS
    } else {
        0
    })
}

fn cmd_validate(rules: PathBuf) -> Result<i32> {
    let set = RuleSet::load_file(&rules)?;
    println!("{}: {} active rules", rules.display(), set.len());
    for rule in set.rules() {
        let keys: Vec<&str> = rule.match_keys.iter().map(|k| k.name()).collect();
        let strategies: Vec<String> = rule.strategies.iter().map(|s| s.to_string()).collect();
        println!(
            "  {:<24} {:<12} keys [{}] tolerance {} strategies [{}]",
            rule.id,
            rule.scope.to_string(),
            keys.join(", "),
            rule.amount_tolerance,
            strategies.join(", ")
        );
    }
    Ok(0)
}

fn cmd_calendar(config: PathBuf, date: String) -> Result<i32> {
    let config = AppConfig::load(&config)?;
    let calendar = config.calendar()?;
    let date: NaiveDate = parse_date(&date)?;

    println!("=== Business Calendar ===");
    println!("Date:              {} ({})", date, date.format("%A"));
    println!("Business day:      {}", calendar.is_business_day(date));
    println!("Holiday:           {}", calendar.is_holiday(date));
    println!("Next business day: {}", calendar.next_business_day(date)?);
    println!("Prev business day: {}", calendar.previous_business_day(date)?);
    println!("Ultimo:            {}", calendar.last_business_day_of_month(date)?);
    println!("Clearing date:     {}", calendar.period_clearing_date(date)?);
    for overlap in calendar.overlapping_holidays() {
        println!("Overlap:           {} is both exact and recurring", overlap);
    }
    Ok(0)
}

fn cmd_generate(
    company_codes: Vec<String>,
    items: usize,
    seed: Option<u64>,
    output: Option<PathBuf>,
) -> Result<i32> {
    let config = LedgerConfig {
        item_count: items,
        seed,
        ..Default::default()
    }
    .with_scope_list(&company_codes);
    let rows = generate_ledger(&config);

    match output {
        Some(path) => {
            write_ledger_csv(&rows, File::create(&path)?)?;
            eprintln!(
                "Generated {} ledger rows across {} company codes → {}",
                rows.len(),
                config.scopes.len(),
                path.display()
            );
        }
        None => write_ledger_csv(&rows, io::stdout().lock())?,
    }
    Ok(0)
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let outcome = match cli.command {
        Commands::Run {
            config,
            ledger,
            rules,
            as_of,
            format,
            output,
        } => cmd_run(config, ledger, rules, as_of, format, output),
        Commands::Validate { rules } => cmd_validate(rules),
        Commands::Calendar { config, date } => cmd_calendar(config, date),
        Commands::Generate {
            company_codes,
            items,
            seed,
            output,
        } => cmd_generate(company_codes, items, seed, output),
    };

    match outcome {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(err.exit_code());
        }
    }
}
