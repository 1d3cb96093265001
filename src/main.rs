//! estate-auth - command line front end for credentials and session tokens.

use std::env;
use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;

use tracing::{debug, error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use estate_auth::auth::{hash_password_async, verify_password_async, SessionClaims};
use estate_auth::config::Settings;
use estate_auth::AuthContext;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_CONFIG_PATH: &str = "/etc/estate-auth/config.toml";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let (config_path, rest) = split_config_arg(&args);

    let settings = match load_settings(config_path.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    debug!("Starting {} v{}", NAME, VERSION);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&settings, &rest)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

/// Run one subcommand. `Ok(false)` means the input was checked and found
/// invalid.
async fn run(settings: &Settings, args: &[String]) -> Result<bool, Box<dyn std::error::Error>> {
    let Some((command, args)) = args.split_first() else {
        print_help();
        return Ok(false);
    };

    match command.as_str() {
        "hash" => {
            let salt = flag_value(args, "--salt");
            let password = read_stdin_line()?;
            let stored = hash_password_async(password, salt).await?;
            println!("{}", stored);
            Ok(true)
        }
        "verify-password" => {
            let stored = positional(args, "verify-password <CREDENTIAL>")?;
            let password = read_stdin_line()?;
            let matched = verify_password_async(password, stored).await;
            println!("{}", if matched { "valid" } else { "invalid" });
            Ok(matched)
        }
        "sign" => {
            let ctx = AuthContext::from_settings(settings)?;
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            let claims: SessionClaims = serde_json::from_str(&input)?;

            let token = match flag_value(args, "--ttl") {
                Some(ttl) => ctx.tokens.sign_with_ttl(&claims, ttl.parse()?)?,
                None => ctx.tokens.sign(&claims)?,
            };
            info!(user_id = %claims.user_id, role = %claims.role, "Issued session token");
            println!("{}", token);
            Ok(true)
        }
        "verify" => {
            let ctx = AuthContext::from_settings(settings)?;
            let token = positional(args, "verify <TOKEN>")?;
            match ctx.tokens.verify(&token) {
                Some(claims) => {
                    println!("{}", serde_json::to_string_pretty(&claims)?);
                    Ok(true)
                }
                None => {
                    println!("invalid");
                    Ok(false)
                }
            }
        }
        other => Err(format!("Unknown command '{}'. See --help.", other).into()),
    }
}

/// Print help message.
fn print_help() {
    println!(
        r#"{} {}
Password credentials and signed session tokens.

USAGE:
    {} [OPTIONS] <COMMAND>

COMMANDS:
    hash [--salt <HEX>]            Hash the password read from stdin
    verify-password <CREDENTIAL>   Check the password read from stdin
    sign [--ttl <SECONDS>]         Issue a token for the claims JSON on stdin
    verify <TOKEN>                 Print the claims of a valid token

OPTIONS:
    -c, --config <PATH>    Path to configuration file
                           [default: {}]
    -h, --help             Print help information
    -V, --version          Print version information

The signing secret is read from $ESTATE_AUTH_TOKEN_SECRET or token.secret_path.
"#,
        NAME, VERSION, NAME, DEFAULT_CONFIG_PATH
    );
}

/// Separate `--config` from the remaining arguments.
fn split_config_arg(args: &[String]) -> (Option<String>, Vec<String>) {
    let mut config = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--config" || arg == "-c" {
            config = iter.next().cloned();
        } else if let Some(path) = arg.strip_prefix("--config=") {
            config = Some(path.to_string());
        } else {
            rest.push(arg.clone());
        }
    }

    (config, rest)
}

/// An explicit path must exist; the default path is optional.
fn load_settings(path: Option<&str>) -> Result<Settings, estate_auth::error::AuthError> {
    match path {
        Some(path) => Settings::load(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Settings::load(DEFAULT_CONFIG_PATH),
        None => Ok(Settings::default()),
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn positional(args: &[String], usage: &str) -> Result<String, String> {
    args.first()
        .filter(|a| !a.starts_with("--"))
        .cloned()
        .ok_or_else(|| format!("Usage: {} {}", NAME, usage))
}

fn read_stdin_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Initialize logging based on settings.
fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    // Command output goes to stdout, so logs go to stderr.
    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}
