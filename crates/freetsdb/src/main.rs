//! FreeTSDB server - Entry point
//!
//! Resolves the server configuration from defaults, the configuration file
//! and `FREETSDB_*` environment variables, then prints or checks it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use freetsdb_config::{Config, ConfigLoader, DEFAULT_ENV_PREFIX};

/// Environment variable naming the configuration file when `-c` is absent.
const CONFIG_PATH_VAR: &str = "FREETSDB_CONFIG_PATH";

/// What to do with the resolved configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Print the effective configuration as TOML.
    Config,
    /// Load and validate, then report the enabled services.
    Check,
    /// List every environment override key.
    EnvKeys,
}

/// Command-line arguments.
struct Args {
    command: Command,
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut command = None;
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("freetsd {}", env!("CARGO_PKG_VERSION"));
                    std::process::exit(0);
                }
                "config" if command.is_none() => command = Some(Command::Config),
                "check" if command.is_none() => command = Some(Command::Check),
                "env-keys" if command.is_none() => command = Some(Command::EnvKeys),
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        let config = config.or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from));

        Self {
            command: command.unwrap_or(Command::Check),
            config,
        }
    }
}

fn print_help() {
    println!(
        r"FreeTSDB - distributed time series database

USAGE:
    freetsd [COMMAND] [OPTIONS]

COMMANDS:
    check       Load and validate the configuration (default)
    config      Print the effective configuration as TOML
    env-keys    List the environment variables that override the configuration

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    FREETSDB_CONFIG_PATH                  Configuration file used when -c is absent
    FREETSDB_<SECTION>_<FIELD>            Override a field, e.g. FREETSDB_HTTP_BIND_ADDRESS
    FREETSDB_<SECTION>_<INDEX>_<FIELD>    Override a repeated section entry by 1-based
                                          position, e.g. FREETSDB_GRAPHITE_2_PROTOCOL

EXAMPLES:
    # Check a configuration file
    freetsd check --config /etc/freetsdb/freetsdb.conf

    # Show the configuration with environment overrides applied
    FREETSDB_UDP_1_BIND_ADDRESS=:8089 freetsd config -c /etc/freetsdb/freetsdb.conf
"
    );
}

fn loader(path: Option<&PathBuf>) -> Result<ConfigLoader> {
    let loader = ConfigLoader::new()
        .with_dotenv()
        .context("failed to load .env file")?;

    let loader = match path {
        Some(path) => loader
            .with_file(path)
            .with_context(|| format!("failed to read configuration from {}", path.display()))?,
        None => {
            info!("no configuration file given, using defaults");
            loader
        }
    };

    Ok(loader.with_env_prefix(DEFAULT_ENV_PREFIX))
}

fn render(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).context("failed to render configuration")
}

fn run(args: &Args) -> Result<()> {
    let loader = loader(args.config.as_ref())?;

    match args.command {
        Command::Config => {
            let config = loader
                .load_unvalidated()
                .context("failed to apply environment overrides")?;
            print!("{}", render(&config)?);
        }
        Command::Check => {
            let config = loader.load().context("invalid configuration")?;
            info!(
                join = ?config.join_addresses(),
                services = ?config.enabled_services(),
                "configuration is valid"
            );
        }
        Command::EnvKeys => {
            let config = loader
                .load_unvalidated()
                .context("failed to apply environment overrides")?;
            for key in config.env_keys(DEFAULT_ENV_PREFIX) {
                println!("{key}");
            }
        }
    }

    Ok(())
}

fn main() {
    // Logs go to stderr so `config` and `env-keys` output stays clean.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freetsd=info,freetsdb_config=info,warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
