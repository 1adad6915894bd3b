//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Randomized load and correctness test for the price query API
#[derive(Parser, Debug)]
#[command(name = "price-loadtest")]
#[command(version)]
#[command(about = "Load-test the price API and verify every returned price")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run scenarios against the price service
    Run(RunArgs),

    /// List test cases and scenarios
    List(ListArgs),

    /// Print the summary of a saved results file
    Summary(SummaryArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Price service host:port
    #[arg(long)]
    pub host: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Scenario to run (repeatable; default all configured)
    #[arg(short, long)]
    pub scenario: Vec<String>,

    /// Run one constant scenario with this many virtual users
    #[arg(long, requires = "duration")]
    pub vus: Option<u32>,

    /// Duration of the constant scenario (e.g. 30s, 1m30s)
    #[arg(long, requires = "vus")]
    pub duration: Option<String>,

    /// Results file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Seed for reproducible case selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Sleep after each iteration in milliseconds
    #[arg(long)]
    pub pacing_ms: Option<u64>,

    /// Do not fail the process when thresholds are crossed
    #[arg(long)]
    pub no_thresholds: bool,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Show full request parameters
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for summary command
#[derive(Parser, Debug)]
pub struct SummaryArgs {
    /// Results file written by `run`
    #[arg(short, long, default_value = "performance-results.json")]
    pub file: String,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "price-loadtest.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment overrides instead
        #[arg(short, long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (default: discovered file)
        file: Option<String>,
    },

    /// List supported environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "price-loadtest",
            "run",
            "--host",
            "api:8081",
            "-s",
            "normal",
            "-s",
            "spike",
            "--seed",
            "42",
        ]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.host.as_deref(), Some("api:8081"));
                assert_eq!(run.scenario, vec!["normal", "spike"]);
                assert_eq!(run.seed, Some(42));
                assert!(!run.no_thresholds);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_vus_requires_duration() {
        assert!(Args::try_parse_from(["price-loadtest", "run", "--vus", "10"]).is_err());

        let args =
            Args::try_parse_from(["price-loadtest", "run", "--vus", "10", "--duration", "1m"])
                .unwrap();
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.vus, Some(10));
                assert_eq!(run.duration.as_deref(), Some("1m"));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = Args::parse_from(["price-loadtest", "list", "--log-level", "warn", "-v"]);
        assert!(args.verbose);
        assert_eq!(args.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_summary_default_file() {
        let args = Args::parse_from(["price-loadtest", "summary"]);
        match args.command {
            Command::Summary(summary) => assert_eq!(summary.file, "performance-results.json"),
            _ => panic!("Expected Summary command"),
        }
    }

    #[test]
    fn test_config_init() {
        let args = Args::parse_from(["price-loadtest", "config", "init", "--force"]);
        match args.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { output, force },
            }) => {
                assert_eq!(output, "price-loadtest.yaml");
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
