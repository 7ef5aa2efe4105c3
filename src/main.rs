use anyhow::{bail, Context, Result};
use clap::Parser;
use keyguard::aggregate::rebuild_profile_from_history;
use keyguard::auth::{AuthAttemptResult, AuthOutcome, Authenticator};
use keyguard::capture::CaptureState;
use keyguard::cli::{Cli, Command, OutputFormat};
use keyguard::config::EngineConfig;
use keyguard::enroll::Enrollment;
use keyguard::profile::{unix_timestamp, Profile};
use keyguard::replay::replay_events;
use keyguard::stats::{calculate_error_rates, compare_samples};
use keyguard::store::{JsonProfileStore, ProfileStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Exit status for a completed authentication that did not accept
const EXIT_DENIED: u8 = 2;

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn read_events(path: &Path) -> Result<Vec<keyguard::KeyEvent>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key log {}", path.display()))?;
    replay_events(&text, Instant::now())
        .with_context(|| format!("invalid key log {}", path.display()))
}

fn open_store(dir: &Path) -> Result<JsonProfileStore> {
    JsonProfileStore::open(dir)
        .with_context(|| format!("failed to open profile store {}", dir.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct EnrollReport {
    profile: Uuid,
    session: Uuid,
    runs_kept: usize,
    runs_rejected: usize,
    total_attempts: usize,
    session_mean_ms: f64,
    session_stddev_ms: f64,
    profile_sessions: usize,
    profile_total_runs: usize,
}

fn run_enroll(
    format: OutputFormat,
    store_dir: &Path,
    profile_id: Option<Uuid>,
    events_path: &Path,
    config_path: Option<&PathBuf>,
) -> Result<ExitCode> {
    let config = load_config(config_path.map(PathBuf::as_path))?;
    let events = read_events(events_path)?;
    let mut store = open_store(store_dir)?;

    let mut enrollment = Enrollment::begin(&mut store, profile_id, &config)
        .context("failed to start enrollment")?;

    let mut saved = None;
    for event in events {
        let step = enrollment.handle(event)?;
        if step.saved.is_some() {
            saved = step.saved;
        }
        if enrollment.state() != CaptureState::Collecting {
            break;
        }
    }

    let Some(profile) = saved else {
        let capture = enrollment.capture();
        if capture.state() == CaptureState::Cancelled {
            bail!("enrollment cancelled, profile not updated");
        }
        bail!(
            "key log ended before the session completed ({}/{} runs accepted)",
            capture.accepted_runs(),
            capture.config().max_runs
        );
    };

    let Some(session) = profile.sessions.last() else {
        bail!("saved profile {} has no sessions", profile.id);
    };

    let report = EnrollReport {
        profile: profile.id,
        session: session.id,
        runs_kept: session.run_count(),
        runs_rejected: session.rejected_runs(),
        total_attempts: session.total_attempts,
        session_mean_ms: session.mean,
        session_stddev_ms: session.stddev,
        profile_sessions: profile.session_count(),
        profile_total_runs: profile.total_runs,
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            println!("Profile: {}", report.profile);
            println!("Session: {}", report.session);
            println!(
                "Runs kept: {} ({} rejected as outliers, {} attempts)",
                report.runs_kept, report.runs_rejected, report.total_attempts
            );
            println!(
                "Session dwell: mean {:.2} ms, stddev {:.2} ms",
                report.session_mean_ms, report.session_stddev_ms
            );
            println!(
                "Profile now has {} session(s), {} run(s)",
                report.profile_sessions, report.profile_total_runs
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct AuthReport<'a> {
    profile: Uuid,
    verdict: &'static str,
    failures: usize,
    last_attempt: Option<&'a AuthAttemptResult>,
}

fn run_auth(
    format: OutputFormat,
    store_dir: &Path,
    profile_id: Uuid,
    events_path: &Path,
    config_path: Option<&PathBuf>,
) -> Result<ExitCode> {
    let config = load_config(config_path.map(PathBuf::as_path))?;
    let store = open_store(store_dir)?;
    let profile = store
        .require(profile_id)
        .with_context(|| format!("failed to load profile {}", profile_id))?;
    let events = read_events(events_path)?;

    let mut auth = Authenticator::new(
        &profile,
        config.auth_policy(),
        config.max_mistakes,
        config.significance_level,
        unix_timestamp(),
    )?;

    for event in events {
        if auth.outcome().is_final() {
            break;
        }
        auth.handle(event)?;
    }

    let (verdict, last_attempt, code) = match auth.outcome() {
        AuthOutcome::Accepted(result) => ("accepted", Some(result), ExitCode::SUCCESS),
        AuthOutcome::Rejected { result, .. } => {
            ("rejected", Some(result), ExitCode::from(EXIT_DENIED))
        }
        AuthOutcome::InsufficientData => ("insufficient-data", None, ExitCode::from(EXIT_DENIED)),
        AuthOutcome::Cancelled => ("cancelled", None, ExitCode::from(EXIT_DENIED)),
        AuthOutcome::Collecting | AuthOutcome::Retry { .. } => {
            bail!(
                "key log ended before authentication finished ({} of {} attempts rejected)",
                auth.failures(),
                auth.policy().max_attempts
            );
        }
    };

    let report = AuthReport {
        profile: profile.id,
        verdict,
        failures: auth.failures(),
        last_attempt,
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            println!("Profile: {}", report.profile);
            println!("Verdict: {}", report.verdict.to_uppercase());
            println!("Rejected attempts: {}", report.failures);
            if let Some(result) = report.last_attempt {
                for i in result.failed_positions() {
                    println!(
                        "  position {} {:?}: delta {:.2} ms > threshold {:.2} ms",
                        i,
                        profile.phrase.char_at(i).unwrap_or('?'),
                        result.deltas[i],
                        result.thresholds[i]
                    );
                }
            }
        }
    }

    Ok(code)
}

fn print_profile(format: OutputFormat, profile: &Profile) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(profile);
    }

    println!("Profile: {}", profile.id);
    println!("Phrase: {}", profile.phrase);
    println!(
        "Sessions: {}, runs: {}",
        profile.session_count(),
        profile.total_runs
    );

    let Some(stats) = profile.position_stats() else {
        println!("Not trained");
        return Ok(());
    };

    println!("{:>4}  {:<4} {:>10} {:>10}", "pos", "char", "mean", "stddev");
    for (i, (ch, (mean, sd))) in profile
        .phrase
        .chars()
        .iter()
        .zip(stats.means.iter().zip(stats.stddevs()))
        .enumerate()
    {
        println!("{:>4}  {:<4} {:>10.2} {:>10.2}", i, format!("{:?}", ch), mean, sd);
    }
    Ok(())
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    match args.command {
        Command::Enroll {
            store,
            profile,
            events,
            config,
        } => run_enroll(args.format, &store, profile, &events, config.as_ref()),

        Command::Auth {
            store,
            profile,
            events,
            config,
        } => run_auth(args.format, &store, profile, &events, config.as_ref()),

        Command::Show { store, profile } => {
            let store = open_store(&store)?;
            let profile = store
                .require(profile)
                .with_context(|| format!("failed to load profile {}", profile))?;
            print_profile(args.format, &profile)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Rebuild { store, profile } => {
            let mut store = open_store(&store)?;
            let mut loaded = store
                .require(profile)
                .with_context(|| format!("failed to load profile {}", profile))?;
            rebuild_profile_from_history(&mut loaded)?;
            loaded.updated_at = unix_timestamp();
            store.save(&loaded)?;
            print_profile(args.format, &loaded)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Delete { store, profile } => {
            let mut store = open_store(&store)?;
            store
                .delete(profile)
                .with_context(|| format!("failed to delete profile {}", profile))?;
            match args.format {
                OutputFormat::Json => print_json(&serde_json::json!({ "deleted": profile }))?,
                OutputFormat::Text => println!("Deleted profile {}", profile),
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::ErrorRates { outcomes } => {
            let outcomes: Vec<bool> = read_json(&outcomes)?;
            let rates = calculate_error_rates(&outcomes);
            match args.format {
                OutputFormat::Json => print_json(&rates)?,
                OutputFormat::Text => {
                    println!("Trials: {}", rates.trials);
                    println!("Type I (false reject): {:.4}", rates.type_one);
                    println!("Type II (false accept): {:.4}", rates.type_two);
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Compare { a, b, alpha } => {
            let a: Vec<f64> = read_json(&a)?;
            let b: Vec<f64> = read_json(&b)?;
            let comparison = compare_samples(&a, &b, alpha)?;
            match args.format {
                OutputFormat::Json => print_json(&comparison)?,
                OutputFormat::Text => {
                    let f = &comparison.f_test;
                    let t = &comparison.t_test;
                    println!(
                        "F-test: F = {:.4}, critical = {:.4}, variances {}",
                        f.statistic,
                        f.critical,
                        if f.equal_variances { "equal" } else { "differ" }
                    );
                    println!(
                        "t-test ({:?}): t = {:.4}, df = {:.2}, critical = {:.4}, means {}",
                        t.method,
                        t.statistic,
                        t.df,
                        t.critical,
                        if t.means_equal { "equal" } else { "differ" }
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
