//! ptp - Parallel PHPUnit Test Processor
//!
//! Runs the test files of a PHP project across a pool of workers. Every
//! worker gets its own database (`DB_DATABASE=<prefix>_<worker>`), so tests
//! that touch the database do not trample each other.
//!
//! ## Features
//!
//! - Dynamic scheduling: idle workers pull the next file from a shared queue
//! - Fail-fast mode that stops dispatching after the first failing file
//! - Structured failure extraction from PHPUnit output, saved as JSON
//! - Rerun of previously failed files
//!
//! ## Usage
//!
//! ```bash
//! # Run every *Test.php under the project with 8 workers
//! ptp run --processors 8
//!
//! # Only files matching a pattern, stopping at the first failure
//! ptp run --filter '*Payment*' --fail-fast
//!
//! # Rerun what failed last time
//! ptp run --failed
//!
//! # Inspect or export the last run's failures
//! ptp failures --export failures.csv
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

mod cli;
mod config;
mod discovery;
mod error;
mod executor;
mod models;
mod output;
mod parser;
mod results;
mod utils;

use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use discovery::{CaseFinder, NameFilter, Scanner};
use executor::{
    phpunit_available, Dispatcher, LogSink, ProcessRunner, ProgressBarSink, ProgressSink,
};
use models::{Failure, RunResult, Unit};
use output::SummaryFormatter;
use parser::PhpUnitParser;
use results::{select_failed, ExportFormat, ResultsStorage, StoredRun};
use utils::logger::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let verbose = args.verbose || env.verbose.unwrap_or(false);
    init_logger(LogLevel::from_flags(verbose, args.quiet));

    let config_path = args
        .config
        .clone()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));
    let mut config = ConfigFile::resolve(config_path.as_deref())?.app;
    config.apply_env(&env);
    if let Some(project) = &args.project {
        config.project_path = project.clone();
    }

    match args.command {
        cli::Command::Run(run_args) => run_tests(config, run_args, args.quiet).await,
        cli::Command::List(list_args) => {
            list_tests(&config, list_args)?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Failures(failures_args) => show_failures(&config, failures_args),
        cli::Command::Config(config_args) => {
            manage_config(&config, config_args)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_tests(
    mut config: AppConfig,
    args: cli::RunArgs,
    quiet: bool,
) -> Result<ExitCode> {
    if let Some(processors) = args.processors {
        config.processors = processors;
    }

    let project = config.project_path.clone();
    let test_root = config.test_root(args.test_path.as_deref());
    let scanner = Scanner::new(config.paths_to_ignore.iter().cloned());
    let filter = NameFilter::new(args.filter.clone().unwrap_or_default());
    let storage = ResultsStorage::new(config.output_path());

    let discover = || -> Result<Vec<PathBuf>> {
        let found = scanner
            .scan(&test_root)
            .with_context(|| format!("Failed to scan {}", test_root.display()))?;
        Ok(filter.apply(found))
    };

    let mut only_failed = None;
    if args.failed {
        match storage.load_optional() {
            Ok(Some(last)) => only_failed = Some(last.failed_keys(&project)),
            Ok(None) => println!("No previous run found. Running all tests."),
            Err(e) => {
                warn!("Could not read the last run: {e:#}");
                println!("No usable previous run. Running all tests.");
            }
        }
    }

    let files = match only_failed {
        Some(keys) if keys.is_empty() => {
            println!("No failed tests in last run. Nothing to run.");
            return Ok(ExitCode::SUCCESS);
        }
        Some(keys) => {
            let files = select_failed(&project, discover()?, &keys);
            if files.is_empty() {
                println!("No matching test files for the last run's failures.");
                return Ok(ExitCode::SUCCESS);
            }
            files
        }
        None => discover()?,
    };

    if files.is_empty() {
        println!("No tests to execute");
        return Ok(ExitCode::SUCCESS);
    }

    let runner_config = config.runner_config();
    if !phpunit_available(&runner_config) {
        warn!(
            "PHPUnit not found at {}; every file will fail to start",
            runner_config.phpunit_path().display()
        );
    }

    let parser = config.parser();
    let runner = Arc::new(ProcessRunner::new(runner_config)?);
    let mut dispatcher = Dispatcher::new(config.processors, runner).with_parser(parser.clone());
    let show_bar = !(args.no_progress || quiet);

    let cases = if show_bar && args.case.is_none() {
        count_test_cases(&files)
    } else {
        0
    };
    dispatcher.set_progress(Some(progress_sink(files.len(), cases, show_bar)));
    let units = project_units(&project, &files, args.case.as_deref());
    let (mut results, mut duration) = dispatcher
        .execute_with_options(units, args.fail_fast)
        .await?;
    let mut failures = collect_failures(&parser, &results);

    if args.rerun_failures {
        let rerun = failed_units(&results);
        if !rerun.is_empty() {
            info!("Rerunning {} failed files", rerun.len());
            dispatcher.set_progress(Some(progress_sink(rerun.len(), 0, show_bar)));
            (results, duration) = dispatcher.execute(rerun).await?;
            failures = collect_failures(&parser, &results);
        }
    }

    let unparsed = unparsed_failures(&parser, &results);
    let run = StoredRun::new(&results, failures, duration, dispatcher.workers());
    storage.save(&run).context("Failed to save test results")?;

    let formatter = SummaryFormatter::for_terminal(io::stdout().is_terminal());
    println!("{}", formatter.format_summary(&run.meta));
    if !run.details.is_empty() {
        println!("{}", formatter.format_failures(&run.details));
    }
    let anomalies = formatter.format_anomalies(&unparsed);
    if !anomalies.is_empty() {
        println!("{anomalies}");
    }

    Ok(if run.meta.is_all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn progress_sink(total: usize, cases: usize, show_bar: bool) -> Arc<dyn ProgressSink> {
    if show_bar {
        Arc::new(ProgressBarSink::new(total, cases))
    } else {
        Arc::new(LogSink::new(total))
    }
}

/// Units whose process failed, parsed failures or not
fn failed_units(results: &[RunResult]) -> Vec<Unit> {
    results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.unit.clone())
        .collect()
}

fn count_test_cases(files: &[PathBuf]) -> usize {
    let finder = CaseFinder::new();
    files
        .iter()
        .filter_map(|file| finder.find(file).ok())
        .map(|cases| cases.len())
        .sum()
}

/// Failures of every failed result, in result order
fn collect_failures(parser: &PhpUnitParser, results: &[RunResult]) -> Vec<Failure> {
    results
        .iter()
        .filter(|r| !r.success)
        .flat_map(|r| parser.parse_failures(r))
        .collect()
}

fn unparsed_failures<'a>(parser: &PhpUnitParser, results: &'a [RunResult]) -> Vec<&'a RunResult> {
    let unparsed: Vec<_> = results
        .iter()
        .filter(|r| !r.success && parser.parse_failures(r).is_empty())
        .collect();
    for result in &unparsed {
        warn!("{} failed without a parsable failure report", result.unit);
    }
    unparsed
}

fn list_tests(config: &AppConfig, args: cli::ListArgs) -> Result<()> {
    let test_root = config.test_root(args.test_path.as_deref());
    let scanner = Scanner::new(config.paths_to_ignore.iter().cloned());
    let filter = NameFilter::new(args.filter.unwrap_or_default());

    let files = filter.apply(
        scanner
            .scan(&test_root)
            .with_context(|| format!("Failed to scan {}", test_root.display()))?,
    );

    if files.is_empty() {
        println!("No test files found under {}", test_root.display());
        return Ok(());
    }

    if !args.test_cases {
        for file in &files {
            println!("{}", relative(&config.project_path, file));
        }
        println!("\n{} test file(s)", files.len());
        return Ok(());
    }

    let finder = CaseFinder::new();
    let mut total = 0;
    for file in &files {
        match finder.find(file) {
            Ok(cases) => {
                println!("{}", relative(&config.project_path, file));
                for case in &cases {
                    println!("  - {case}");
                }
                total += cases.len();
            }
            Err(e) => warn!("Skipping {}: {}", file.display(), e),
        }
    }
    println!("\n{} test case(s) in {} file(s)", total, files.len());

    Ok(())
}

fn show_failures(config: &AppConfig, args: cli::FailuresArgs) -> Result<ExitCode> {
    let storage = ResultsStorage::new(config.output_path());
    let run = storage
        .load()
        .context("No stored results; run `ptp run` first")?;

    if let Some(path) = &args.export {
        let format = match &args.format {
            Some(name) => ExportFormat::from_str(name)
                .ok_or_else(|| anyhow::anyhow!("Unknown export format: {name}"))?,
            None => ExportFormat::from_extension(path).unwrap_or(ExportFormat::Json),
        };
        storage.export(&run, path, format)?;
        println!("✓ Exported {} failure(s) to {}", run.details.len(), path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let formatter = SummaryFormatter::for_terminal(io::stdout().is_terminal());
    println!("{}", formatter.format_summary(&run.meta));
    if !args.summary && !run.details.is_empty() {
        println!("{}", formatter.format_failures(&run.details));
    }

    Ok(if run.meta.is_all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn manage_config(config: &AppConfig, args: cli::ConfigArgs) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            ConfigFile::example().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show => {
            let effective = ConfigFile {
                app: config.clone(),
                ..ConfigFile::default()
            };
            println!("{}", serde_yaml::to_string(&effective)?);
        }

        cli::ConfigAction::Env => {
            config::print_env_help();
            println!();
            let env = EnvConfig::load();
            if env.has_any() {
                env.print_summary();
            } else {
                println!("No {}_* variables are set.", config::ENV_PREFIX);
            }
        }
    }

    Ok(())
}

fn relative(project: &Path, path: &Path) -> String {
    path.strip_prefix(project)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_failed_units_include_unparsed_failures() {
        let results = vec![
            RunResult::completed(
                Unit::file("tests/PassingTest.php"),
                true,
                String::new(),
                Duration::ZERO,
            ),
            RunResult::completed(
                Unit::file("tests/ParsedTest.php"),
                false,
                "1) tests\\ParsedTest::testA\nboom\n".to_string(),
                Duration::ZERO,
            ),
            RunResult::completed(
                Unit::file("tests/FatalTest.php"),
                false,
                "PHP Fatal error: Class not found".to_string(),
                Duration::ZERO,
            ),
            RunResult::spawn_failed(
                Unit::case("tests/MissingTest.php", "testB"),
                "not found",
                Duration::ZERO,
            ),
        ];

        let parser = PhpUnitParser::new();
        assert_eq!(collect_failures(&parser, &results).len(), 1);
        assert_eq!(unparsed_failures(&parser, &results).len(), 2);

        let rerun = failed_units(&results);
        assert_eq!(
            rerun,
            [
                Unit::file("tests/ParsedTest.php"),
                Unit::file("tests/FatalTest.php"),
                Unit::case("tests/MissingTest.php", "testB"),
            ]
        );
    }

    #[test]
    fn test_project_units_are_project_relative() {
        let files = [
            PathBuf::from("/srv/app/tests/Unit/UserTest.php"),
            PathBuf::from("/elsewhere/OtherTest.php"),
        ];
        let units = project_units(Path::new("/srv/app"), &files, Some("testCreate"));
        assert_eq!(units[0], Unit::case("tests/Unit/UserTest.php", "testCreate"));
        assert_eq!(units[1].path(), Path::new("/elsewhere/OtherTest.php"));
    }
}
