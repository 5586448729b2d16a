//! sessioncheck CLI - session API contract verification with fault injection

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use sessioncheck_core::{Config, VerdictPolicy, to_http_file, write_report};
use sessioncheck_runner::{SuiteRunner, UpstreamMock, builtin_suite};

#[derive(Parser)]
#[command(name = "sessioncheck")]
#[command(about = "Session API contract verification with upstream fault injection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Strict mode (warnings become errors). Use --strict=false to disable.
    #[arg(long, global = true, default_value_t = true, action = ArgAction::Set)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the contract suite against the SUT
    Run {
        /// Config file (default: .sessioncheck.toml)
        #[arg(short, long)]
        config: Option<String>,

        /// Stop on first failed scenario (fast-fail for CI)
        #[arg(long)]
        stop_on_failure: bool,

        /// Run only scenarios whose name contains this substring
        #[arg(long)]
        filter: Option<String>,

        /// Write report.json (and repro.http on failures) to this directory
        #[arg(long)]
        report_dir: Option<String>,

        /// Keep secret header values readable in report files
        #[arg(long)]
        no_mask: bool,
    },

    /// List the builtin scenarios without sending requests
    List,

    /// Initialize config file
    Init,

    /// Export JSON Schema for the run report
    Schema,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run {
            config,
            stop_on_failure,
            filter,
            report_dir,
            no_mask,
        } => {
            // Load config
            let cfg = if let Some(path) = config {
                Config::load(std::path::Path::new(&path))?
            } else {
                Config::load_default()?
            };

            if cli.output == OutputFormat::Terminal {
                eprintln!("Config:");
                eprintln!("  base_url:  {}", cfg.base_url);
                eprintln!("  mock_addr: {}", cfg.mock_addr);
                eprintln!();
            }

            let mock = UpstreamMock::start(&cfg.mock_addr)?;
            let runner = SuiteRunner::from_config(&cfg)
                .with_stop_on_failure(stop_on_failure)
                .with_filter(filter)
                .with_quiet(cli.output == OutputFormat::Silent);
            let report = runner.run(&builtin_suite(), &mock)?;

            let policy = VerdictPolicy {
                strict: cli.strict,
                ..Default::default()
            };
            let failures = policy.filter(report.all_failures());
            let verdict = policy.verdict(
                &failures,
                report.total,
                report.passed,
                report.errors.len() as u64,
            );

            // Report files: explicit --report-dir wins over config.
            let dir = report_dir.map(PathBuf::from).or_else(|| {
                cfg.report.then(|| {
                    cfg.report_dir
                        .clone()
                        .unwrap_or_else(|| PathBuf::from(".sessioncheck"))
                })
            });
            if let Some(dir) = dir {
                let path = write_report(&report, &dir, cfg.mask_secrets && !no_mask)?;
                if cli.output == OutputFormat::Terminal {
                    eprintln!("Report: {}", path.display());
                }
                if !failures.is_empty() {
                    let repro_path = dir.join("repro.http");
                    std::fs::write(&repro_path, to_http_file(&failures, "base_url"))?;
                    if cli.output == OutputFormat::Terminal {
                        eprintln!("Repro:  {}", repro_path.display());
                    }
                }
            }

            match cli.output {
                OutputFormat::Terminal => {
                    eprintln!();
                    println!(
                        "{}: {} ({}/{} scenarios passed)",
                        verdict.status, verdict.reason, report.passed, report.total
                    );
                    for failure in &failures {
                        let got = failure
                            .status_code
                            .map_or_else(|| "no response".to_string(), |s| s.to_string());
                        let expected = failure.expected.as_deref().unwrap_or("-");
                        println!(
                            "  [{}] {}: {} got {got}, expected {expected}",
                            failure.severity, failure.scenario, failure.operation
                        );
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Silent => {}
            }

            Ok(verdict.exit_code)
        }

        Commands::List => {
            for scenario in builtin_suite() {
                println!("{} ({} requests)", scenario.name, scenario.request_count());
            }
            Ok(0)
        }

        Commands::Init => {
            let path = std::path::Path::new(".sessioncheck.toml");
            if path.exists() {
                eprintln!(".sessioncheck.toml already exists");
                return Ok(1);
            }
            std::fs::write(path, Config::example())?;
            println!("Created .sessioncheck.toml");
            println!("Edit base_url, api_key and mock_addr, then run: sessioncheck run");
            Ok(0)
        }

        Commands::Schema => {
            let schema = schemars::schema_for!(sessioncheck_core::RunReport);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(0)
        }
    }
}
