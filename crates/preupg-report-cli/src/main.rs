mod settings;

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use preupg_report_core::{
    render_results, OutputFormat, ReportParser, ScanProgress, XccdfVersion,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "preupg-report",
    author,
    version,
    about = "Post-process XCCDF upgrade assessment reports"
)]
struct Cli {
    /// Settings file (TOML, YAML or JSON) layered under PREUPG_* variables
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reclassify rule results from the risk lines each check printed
    Reclassify {
        report: PathBuf,
        /// Scan result lines (`title:rule_id:result`) to patch and render
        #[arg(long, value_name = "FILE")]
        results: Option<PathBuf>,
        /// Emit changes (or the patched results) as JSON
        #[arg(long)]
        json: bool,
    },
    /// Trim captured output padding and drop debug log lines
    Cleanup { report: PathBuf },
    /// Rewrite the report to another XCCDF namespace version
    Convert {
        report: PathBuf,
        #[arg(long, value_name = "VERSION")]
        to: XccdfVersion,
    },
    /// Wrap check descriptions into details and expected-results tags
    Descriptions { report: PathBuf },
    /// Select exactly the given rules (full ids) in every profile
    Select {
        report: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        rules: Vec<String>,
    },
    /// Print requested rule ids the report does not know
    CheckRules {
        report: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        rules: Vec<String>,
    },
    /// List the rules referenced by profile selections
    ListRules {
        report: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Insert global values and point result paths at the result directory
    Globals { report: PathBuf },
    /// Render result lines as a table, reading stdin when FILE is omitted
    Table {
        file: Option<PathBuf>,
        /// Heading shown above the table; defaults to the configured scenario
        #[arg(long)]
        heading: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Replay a scan's result lines through the progress display
    Replay {
        report: PathBuf,
        results: PathBuf,
        #[arg(long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Reclassify {
            report,
            results,
            json,
        } => reclassify(&report, results.as_deref(), json, &settings)?,
        Commands::Cleanup { report } => {
            open(&report)?
                .strip_whitespaces()?
                .remove_debug_info()
                .with_context(|| format!("failed to clean {}", report.display()))?;
        }
        Commands::Convert { report, to } => {
            open(&report)?
                .rewrite_namespace(to)
                .with_context(|| format!("failed to convert {}", report.display()))?;
            info!(report = %report.display(), version = ?to, "namespace rewritten");
        }
        Commands::Descriptions { report } => {
            open(&report)?
                .update_check_description()
                .with_context(|| format!("failed to update descriptions in {}", report.display()))?;
        }
        Commands::Select { report, rules } => select(&report, &rules)?,
        Commands::CheckRules { report, rules } => {
            for unknown in open(&report)?.check_rules(&rules) {
                println!("{unknown}");
            }
        }
        Commands::ListRules { report, json } => list_rules(&report, json)?,
        Commands::Globals { report } => {
            let values = settings.global_values();
            open(&report)?
                .add_global_tags(&values)?
                .modify_result_path(&settings.result_dir, &settings.scenario)
                .with_context(|| format!("failed to apply globals to {}", report.display()))?;
        }
        Commands::Table {
            file,
            heading,
            json,
        } => {
            let lines = read_lines(file.as_deref())?;
            let heading = heading.unwrap_or_else(|| settings.scenario.clone());
            print!("{}", render_results(&lines, &heading, format(json))?);
        }
        Commands::Replay {
            report,
            results,
            verbose,
        } => replay(&report, &results, verbose || settings.verbose, &settings)?,
    }
    Ok(())
}

fn open(report: &Path) -> Result<ReportParser> {
    ReportParser::open(report).with_context(|| format!("failed to load {}", report.display()))
}

fn format(json: bool) -> OutputFormat {
    if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    }
}

fn reclassify(report: &Path, results: Option<&Path>, json: bool, settings: &Settings) -> Result<()> {
    let parser = open(report)?;
    let Some(results) = results else {
        let (_, changed) = parser
            .replace_inplace_risk(None)
            .with_context(|| format!("failed to reclassify {}", report.display()))?;
        if json {
            println!("{}", serde_json::to_string_pretty(&changed)?);
        } else {
            for change in &changed {
                println!("{} {} ({})", change.rule_id, change.result, change.reason);
            }
        }
        return Ok(());
    };

    let mut lines = read_lines(Some(results))?;
    parser
        .replace_inplace_risk(Some(&mut lines))
        .with_context(|| format!("failed to reclassify {}", report.display()))?;
    print!(
        "{}",
        render_results(&lines, &settings.scenario, format(json))?
    );
    Ok(())
}

fn select(report: &Path, rules: &[String]) -> Result<()> {
    let parser = open(report)?;
    let known = parser.list_rules();
    let unknown: Vec<&str> = rules
        .iter()
        .map(String::as_str)
        .filter(|id| !known.iter().any(|rule| rule == *id))
        .collect();
    if !unknown.is_empty() {
        bail!("unknown rule(s): {}", unknown.join(", "));
    }
    parser
        .select_rules(rules)
        .with_context(|| format!("failed to select rules in {}", report.display()))?;
    Ok(())
}

fn list_rules(report: &Path, json: bool) -> Result<()> {
    let rules = open(report)?.list_rules();
    if json {
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }
    println!("{} rule(s) selected in {}", rules.len(), report.display());
    for rule in rules {
        println!("- {rule}");
    }
    Ok(())
}

fn replay(report: &Path, results: &Path, verbose: bool, settings: &Settings) -> Result<()> {
    let parser = open(report)?;
    let lines = read_lines(Some(results))?;
    if lines.len() != parser.number_of_checks() {
        warn!(
            expected = parser.number_of_checks(),
            recorded = lines.len(),
            "result count differs from selected checks"
        );
    }

    let mut progress = ScanProgress::new(parser.number_of_checks(), verbose);
    progress.set_labels(parser.check_labels());
    progress.begin()?;
    for line in &lines {
        progress.record_completion(line)?;
    }
    println!();
    print!(
        "{}",
        render_results(progress.accumulated_results(), &settings.scenario, OutputFormat::Human)?
    );
    Ok(())
}

fn read_lines(path: Option<&Path>) -> Result<Vec<String>> {
    let text = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read result lines from stdin")?;
            buf
        }
    };
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}
