mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, ProcessArgs};
use dedupper_core::config::{load_configuration, load_configuration_from};
use dedupper_core::report::ReportSummary;
use dedupper_core::storage::Store;
use dedupper_core::{AppConfig, ClassifyType, Collaborators, ProcessEngine, ProcessReport, ReasonType};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let outcome = match args.command {
        Some(Commands::Process(process_args)) => run_process(config, process_args),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(true)
        }
        Some(Commands::TruncateDb { file_type }) => run_truncate(&config, &file_type),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(2),
        Err(err) => {
            error!("Error: {:#}", err);
            process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => {
            let name = path.to_string_lossy();
            load_configuration_from(&name, true)?
        }
        None => load_configuration()?,
    };
    Ok(config)
}

fn run_process(mut config: AppConfig, args: ProcessArgs) -> anyhow::Result<bool> {
    config.dry_run |= args.dry_run;
    config.relocate |= args.relocate;
    config.manual |= args.manual;
    config.keep |= args.keep;
    if let Some(workers) = args.workers {
        config.max_workers = workers;
    }

    let targets: Vec<PathBuf> = if args.paths.is_empty() {
        config.root_paths.iter().map(PathBuf::from).collect()
    } else {
        args.paths
    };
    if targets.is_empty() {
        return Err(anyhow!("no paths given and no root_paths configured"));
    }

    let engine = ProcessEngine::new(config, Collaborators::default())?
        .with_progress(Arc::new(CliReporter::new()));
    let ok = engine.process_all(&targets)?;

    print_summary(engine.report());
    if let Some(path) = args.report {
        write_report(engine.report(), &path)
            .with_context(|| format!("writing report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }
    Ok(ok)
}

fn print_summary(report: &ProcessReport) {
    let summary = report.summary();
    println!();
    for (reason, count) in &summary.counts {
        let label = format!("{:<32}", reason.as_str());
        let label = match reason {
            ReasonType::ProcessError => label.red(),
            ReasonType::NoProblem => label.green(),
            _ if reason.as_str().starts_with("P_HASH") => label.yellow(),
            _ => label.normal(),
        };
        println!("{} {}", label, count);
    }
    println!(
        "{} files judged, {} saved, {} errors",
        format!("{}", summary.total()).cyan(),
        format!("{}", summary.saved).green(),
        format!("{}", summary.errors).red(),
    );
    info!("{}", summary_text(&summary));
}

/// Uncolored summary line for the log file.
fn summary_text(summary: &ReportSummary) -> String {
    format!(
        "{} files judged, {} saved, {} errors",
        summary.total(),
        summary.saved,
        summary.errors
    )
}

fn write_report(report: &ProcessReport, path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["reason", "path"])?;
    for (reason, file) in report.reasons() {
        let file = file.to_string_lossy();
        writer.write_record([reason.as_str(), file.as_ref()])?;
    }
    for saved in report.saved() {
        let saved = saved.to_string_lossy();
        writer.write_record(["SAVED", saved.as_ref()])?;
    }
    writer.flush()?;
    Ok(())
}

fn run_truncate(config: &AppConfig, file_type: &str) -> anyhow::Result<bool> {
    let file_type = ClassifyType::parse(file_type)
        .filter(|t| !t.is_forgettable())
        .ok_or_else(|| anyhow!("unknown store type '{}'", file_type))?;
    let prompt = format!(
        "Are you SURE you want to COMPLETELY DELETE the {} store?",
        file_type
    );
    if !prompt_confirm(&prompt, Some(false))? {
        return Ok(true);
    }
    Store::new(config).with_database(file_type, |db| db.truncate())?;
    println!("{} store truncated", file_type);
    Ok(true)
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_text_is_plain() {
        colored::control::set_override(true);
        let report = ProcessReport::new();
        report.record(ReasonType::NoProblem, Path::new("a.jpg"));
        report.record(ReasonType::ProcessError, Path::new("b.jpg"));
        report.record_saved(Path::new("lib/a.jpg"));

        let text = summary_text(&report.summary());
        assert_eq!(text, "2 files judged, 1 saved, 1 errors");
        assert!(!text.contains('\x1b'));
    }
}
