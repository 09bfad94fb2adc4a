use std::path::PathBuf;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use clap::{Parser, Subcommand};

use webconf::config::{ConfigStore, EngineSettings};
use webconf::security::conditional::remote_ip;
use webconf::security::{RecordedRedirect, RequestView};

#[derive(Parser)]
#[command(name = "webconf-cli")]
#[command(about = "Inspect and edit a webconf site configuration", long_about = None)]
struct Cli {
    /// Web root containing `appdata/.cfg/.all`.
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the parsed configuration as JSON
    Show,
    /// Replace one value in the config file
    Set {
        /// Section name, or "" for a top-level directive
        section: String,
        key: String,
        value: String,
    },
    /// Run a synthetic request through the validator
    Check {
        #[arg(long, default_value = "/")]
        path: String,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, default_value = "127.0.0.1:50000")]
        remote: String,
        /// Request header as `name: value`; repeatable
        #[arg(long = "header")]
        headers: Vec<String>,
        /// Apply the Host header check
        #[arg(long)]
        validate_host: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Show => {
            let store = ConfigStore::initialize(&cli.root, EngineSettings::default())?;
            println!("{}", store.to_json()?);
        }
        Commands::Set { section, key, value } => {
            let store = ConfigStore::initialize(&cli.root, EngineSettings::default())?;
            if store.update_value(&section, &key, &value)? {
                println!("{}: {} = {}", display_section(&section), key, value);
            } else {
                eprintln!("No `{}` line found in {}", key, display_section(&section));
                std::process::exit(1);
            }
        }
        Commands::Check {
            path,
            method,
            host,
            query,
            remote,
            headers,
            validate_host,
        } => {
            let settings = EngineSettings {
                validate_remote_host: validate_host,
                ..EngineSettings::default()
            };
            let store = ConfigStore::initialize(&cli.root, settings)?;
            let headers = parse_headers(&headers)?;
            let view = RequestView {
                method: &method,
                host: &host,
                path: &path,
                query: &query,
                remote_addr: &remote,
                headers: &headers,
            };

            let snapshot = store.snapshot();
            if snapshot.is_blocked(&remote_ip(&remote)) {
                println!("denied 403 (blocked address)");
                return Ok(());
            }
            if snapshot.maintenance_window_on {
                println!("denied 503 (maintenance window)");
                return Ok(());
            }

            let mut redirect = RecordedRedirect::default();
            let verdict = store.validate_request(&view, &mut redirect);
            match (verdict.allowed, redirect.location) {
                (true, _) => println!("allowed"),
                (false, Some(location)) => println!("redirect {} -> {}", verdict.status_code, location),
                (false, None) => println!("denied {}", verdict.status_code),
            }
        }
    }

    Ok(())
}

fn display_section(section: &str) -> &str {
    if section.is_empty() {
        "<top level>"
    } else {
        section
    }
}

fn parse_headers(raw: &[String]) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    for entry in raw {
        let (name, value) = entry
            .split_once(':')
            .ok_or_else(|| format!("header `{entry}` is not `name: value`"))?;
        headers.append(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    Ok(headers)
}
