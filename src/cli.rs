//! CLI argument parsing for Keyguard

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "keyguard")]
#[command(version)]
#[command(about = "Keystroke-dynamics enrollment and authentication from recorded key logs", long_about = None)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a key log as one enrollment session and save the profile
    Enroll {
        /// Profile directory
        #[arg(long = "store", value_name = "DIR")]
        store: PathBuf,

        /// Existing profile to extend (a new profile is created if omitted)
        #[arg(long = "profile", value_name = "ID")]
        profile: Option<Uuid>,

        /// Recorded key events (JSON lines)
        #[arg(long = "events", value_name = "FILE")]
        events: PathBuf,

        /// Engine configuration (TOML)
        #[arg(long = "config", value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Replay a key log as an authentication against a stored profile
    Auth {
        #[arg(long = "store", value_name = "DIR")]
        store: PathBuf,

        #[arg(long = "profile", value_name = "ID")]
        profile: Uuid,

        #[arg(long = "events", value_name = "FILE")]
        events: PathBuf,

        #[arg(long = "config", value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Print a stored profile's per-position statistics
    Show {
        #[arg(long = "store", value_name = "DIR")]
        store: PathBuf,

        #[arg(long = "profile", value_name = "ID")]
        profile: Uuid,
    },

    /// Recompute a profile's statistics from its session history
    Rebuild {
        #[arg(long = "store", value_name = "DIR")]
        store: PathBuf,

        #[arg(long = "profile", value_name = "ID")]
        profile: Uuid,
    },

    /// Delete a stored profile (succeeds if it does not exist)
    Delete {
        #[arg(long = "store", value_name = "DIR")]
        store: PathBuf,

        #[arg(long = "profile", value_name = "ID")]
        profile: Uuid,
    },

    /// Type I / Type II error rates from a JSON array of outcomes
    ErrorRates {
        #[arg(long = "outcomes", value_name = "FILE")]
        outcomes: PathBuf,
    },

    /// F-test then t-test on two JSON arrays of samples
    Compare {
        #[arg(long = "a", value_name = "FILE")]
        a: PathBuf,

        #[arg(long = "b", value_name = "FILE")]
        b: PathBuf,

        /// Significance level for both tests
        #[arg(long = "alpha", default_value = "0.05")]
        alpha: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_enroll_without_profile() {
        let cli = Cli::parse_from([
            "keyguard", "enroll", "--store", "profiles", "--events", "keys.jsonl",
        ]);
        match cli.command {
            Command::Enroll {
                store,
                profile,
                events,
                config,
            } => {
                assert_eq!(store, PathBuf::from("profiles"));
                assert!(profile.is_none());
                assert_eq!(events, PathBuf::from("keys.jsonl"));
                assert!(config.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_auth_parses_uuid() {
        let id = Uuid::new_v4();
        let id_text = id.to_string();
        let cli = Cli::parse_from([
            "keyguard", "auth", "--store", "p", "--profile", &id_text, "--events", "k.jsonl",
        ]);
        assert!(matches!(cli.command, Command::Auth { profile, .. } if profile == id));
    }

    #[test]
    fn test_cli_rejects_bad_uuid() {
        let result = Cli::try_parse_from([
            "keyguard", "show", "--store", "p", "--profile", "not-a-uuid",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_format_default_text() {
        let cli = Cli::parse_from(["keyguard", "error-rates", "--outcomes", "o.json"]);
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "keyguard", "error-rates", "--outcomes", "o.json", "--format", "json", "--debug",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.debug);
    }

    #[test]
    fn test_cli_compare_alpha_default() {
        let cli = Cli::parse_from(["keyguard", "compare", "--a", "a.json", "--b", "b.json"]);
        assert!(matches!(cli.command, Command::Compare { alpha, .. } if alpha == 0.05));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["keyguard"]).is_err());
    }
}
