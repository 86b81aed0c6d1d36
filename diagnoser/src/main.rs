use std::fs;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use trace2pass_common::AnomalyReport;
use trace2pass_diagnoser::collector_client::fetch_report;
use trace2pass_diagnoser::oracle::{classify, run_subprocess, OracleOutcome};
use trace2pass_diagnoser::pass_bisect::{bisect_passes, parse_pipeline, prefix_text, PassOutcome};
use trace2pass_diagnoser::ub_detector::{detect, Signal};
use trace2pass_diagnoser::verdict::DiagnoserVerdict;
use trace2pass_diagnoser::version_bisect::{bisect_versions, CompilerVersion};

#[derive(Parser, Debug)]
#[command(name = "trace2pass-diagnoser")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize a single submitted report without running any subprocess.
    /// Either `--report` (a local JSON file) or `--collector-url` +
    /// `--fingerprint` (a queued record fetched over REST) must be given.
    AnalyzeReport {
        #[arg(long)]
        report: Option<String>,
        #[arg(long)]
        collector_url: Option<String>,
        #[arg(long)]
        fingerprint: Option<String>,
    },
    /// Weigh sanitizer/opt-level/cross-compiler evidence for a single report.
    UbDetect {
        #[arg(long)]
        sanitizer_clean: Option<f64>,
        #[arg(long)]
        opt_sensitivity: Option<f64>,
        #[arg(long)]
        cross_compiler: Option<f64>,
    },
    /// Binary search an ordered list of toolchain versions for a regression.
    VersionBisect {
        /// Comma-separated, oldest first.
        #[arg(long, value_delimiter = ',')]
        versions: Vec<String>,
        /// Shell command with a `{version}` placeholder, run once per probe.
        #[arg(long)]
        command: String,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Binary search an optimization pipeline for the pass that breaks it.
    PassBisect {
        #[arg(long)]
        pipeline: String,
        /// Shell command with a `{prefix}` placeholder, run once per probe.
        #[arg(long)]
        command: String,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Version-bisect, then pass-bisect the version found to regress.
    FullPipeline {
        #[arg(long, value_delimiter = ',')]
        versions: Vec<String>,
        #[arg(long)]
        version_command: String,
        #[arg(long)]
        pipeline: String,
        #[arg(long)]
        pass_command: String,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let verdict = match cli.command {
        Commands::AnalyzeReport { report, collector_url, fingerprint } => analyze_report(report, collector_url, fingerprint),
        Commands::UbDetect { sanitizer_clean, opt_sensitivity, cross_compiler } => {
            run_ub_detect(sanitizer_clean, opt_sensitivity, cross_compiler)
        }
        Commands::VersionBisect { versions, command, timeout_secs } => {
            run_version_bisect(&versions, &command, Duration::from_secs(timeout_secs))
        }
        Commands::PassBisect { pipeline, command, timeout_secs } => {
            run_pass_bisect(&pipeline, &command, Duration::from_secs(timeout_secs))
        }
        Commands::FullPipeline { versions, version_command, pipeline, pass_command, timeout_secs } => {
            run_full_pipeline(&versions, &version_command, &pipeline, &pass_command, Duration::from_secs(timeout_secs))
        }
    };

    eprintln!("{}", summary_line(&verdict));

    match serde_json::to_string(&verdict) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to serialize verdict: {err}"),
    }

    if verdict.exit_code() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// One colored, human-facing line to stderr — stdout stays pure JSON so
/// piping into other tools is safe.
fn summary_line(verdict: &DiagnoserVerdict) -> String {
    match verdict {
        DiagnoserVerdict::Error { message } => format!("{} {message}", "error:".red().bold()),
        DiagnoserVerdict::CompilerBug { confidence } => {
            format!("{} confidence {confidence:.2}", "likely compiler bug".red().bold())
        }
        DiagnoserVerdict::UserUb { confidence } => {
            format!("{} confidence {confidence:.2}", "likely user undefined behavior".yellow())
        }
        DiagnoserVerdict::Inconclusive { confidence } => {
            format!("{} confidence {confidence:.2}", "inconclusive".dimmed())
        }
        DiagnoserVerdict::VersionBisected { first_bad, last_good } => {
            format!("{} {last_good} -> {first_bad}", "regression bisected:".green().bold())
        }
        DiagnoserVerdict::PassBisected { culprit, index, .. } => {
            format!("{} {culprit} (position {index})", "culprit pass bisected:".green().bold())
        }
        DiagnoserVerdict::AllPass => "all versions pass".green().to_string(),
        DiagnoserVerdict::AllFail => "all versions fail".red().to_string(),
        DiagnoserVerdict::BaselineFails => "unoptimized baseline already fails".red().to_string(),
        DiagnoserVerdict::FullPasses => "full pipeline passes".green().to_string(),
        DiagnoserVerdict::Analyzed { kind, suggested_next, .. } => {
            format!("{kind}: suggested next stage is {}", suggested_next.cyan())
        }
    }
}

fn analyze_report(path: Option<String>, collector_url: Option<String>, fingerprint: Option<String>) -> DiagnoserVerdict {
    let report = match (path, collector_url, fingerprint) {
        (Some(path), _, _) => match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str::<AnomalyReport>(&text)
                .map_err(|err| format!("parsing {path}: {err}")),
            Err(err) => Err(format!("reading {path}: {err}")),
        },
        (None, Some(url), Some(fingerprint)) => {
            fetch_report(&url, &fingerprint).map_err(|err| err.to_string())
        }
        _ => Err("either --report or --collector-url with --fingerprint is required".to_string()),
    };
    let report = match report {
        Ok(report) => report,
        Err(message) => return DiagnoserVerdict::Error { message },
    };

    let weight = trace2pass_common::severity_weight(report.kind);
    let suggested_next = match report.kind {
        trace2pass_common::CheckKind::ArithOverflow
        | trace2pass_common::CheckKind::SignConversion
        | trace2pass_common::CheckKind::BoundsViolation => "ub-detect",
        trace2pass_common::CheckKind::PureInconsistency => "version-bisect",
        _ => "none",
    };

    DiagnoserVerdict::Analyzed {
        kind: report.kind.as_str().to_string(),
        occurrence_weight: weight,
        suggested_next,
    }
}

fn run_ub_detect(sanitizer_clean: Option<f64>, opt_sensitivity: Option<f64>, cross_compiler: Option<f64>) -> DiagnoserVerdict {
    let signal = |v: Option<f64>| v.map(Signal::Available).unwrap_or(Signal::Unavailable);
    detect(signal(sanitizer_clean), signal(opt_sensitivity), signal(cross_compiler)).into()
}

/// Splits a command template on whitespace and substitutes `placeholder`.
/// No shell quoting support — callers must avoid arguments containing
/// spaces.
fn render_command(template: &str, placeholder: &str, value: &str) -> Vec<String> {
    template.split_whitespace().map(|tok| tok.replace(placeholder, value)).collect()
}

fn probe(parts: &[String], timeout: Duration, calls: &std::sync::atomic::AtomicU64) -> OracleOutcome {
    calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let Some((cmd, args)) = parts.split_first() else {
        return OracleOutcome::Skip;
    };
    match run_subprocess(cmd, args, timeout) {
        Ok(result) => classify(&result),
        Err(err) => {
            tracing::warn!(%err, cmd, "oracle probe failed to launch, treating as skip");
            OracleOutcome::Skip
        }
    }
}

fn run_version_bisect(versions: &[String], command: &str, timeout: Duration) -> DiagnoserVerdict {
    if versions.is_empty() {
        return DiagnoserVerdict::Error { message: "no versions supplied".to_string() };
    }
    let started = std::time::Instant::now();
    let calls = std::sync::atomic::AtomicU64::new(0);
    let versions: Vec<CompilerVersion> = versions.iter().cloned().map(CompilerVersion).collect();
    let outcome = bisect_versions(&versions, |v| {
        let parts = render_command(command, "{version}", &v.0);
        probe(&parts, timeout, &calls)
    });
    tracing::info!(
        stage = "version-bisect",
        finished_at = %chrono::Utc::now().to_rfc3339(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        oracle_calls = calls.load(std::sync::atomic::Ordering::Relaxed),
        "stage complete"
    );
    outcome.into()
}

fn run_pass_bisect(pipeline: &str, command: &str, timeout: Duration) -> DiagnoserVerdict {
    let entries = match parse_pipeline(pipeline) {
        Ok(entries) => entries,
        Err(err) => return DiagnoserVerdict::Error { message: err.to_string() },
    };
    let started = std::time::Instant::now();
    let calls = std::sync::atomic::AtomicU64::new(0);
    let outcome = bisect_passes(&entries, |n| {
        let prefix = prefix_text(&entries, n);
        let parts = render_command(command, "{prefix}", &prefix);
        match probe(&parts, timeout, &calls) {
            OracleOutcome::Pass => PassOutcome::Pass,
            _ => PassOutcome::Fail,
        }
    });
    tracing::info!(
        stage = "pass-bisect",
        finished_at = %chrono::Utc::now().to_rfc3339(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        oracle_calls = calls.load(std::sync::atomic::Ordering::Relaxed),
        "stage complete"
    );
    outcome.into()
}

fn run_full_pipeline(
    versions: &[String],
    version_command: &str,
    pipeline: &str,
    pass_command: &str,
    timeout: Duration,
) -> DiagnoserVerdict {
    match run_version_bisect(versions, version_command, timeout) {
        DiagnoserVerdict::VersionBisected { .. } => run_pass_bisect(pipeline, pass_command, timeout),
        other => other,
    }
}
