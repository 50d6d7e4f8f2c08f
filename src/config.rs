use std::path::PathBuf;

use crate::errors::ConfigError;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the captain form and admin view
    Web,
    /// Print stored submissions grouped by team
    List,
    /// Write CSV exports to a directory
    Export {
        out_dir: PathBuf,
        team: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub admin_username: String,
    pub admin_password: Option<String>,
    pub secure_cookies: bool,
}

impl Config {
    /// Reads the command line (without the program name) and the process
    /// environment.
    pub fn load(args: &[String]) -> Result<Self, ConfigError> {
        Self::parse(args, |key| std::env::var(key).ok())
    }

    pub fn parse<F>(args: &[String], env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut port = DEFAULT_PORT;
        let command = match args.first().map(String::as_str) {
            None | Some("web") => {
                if let Some(p) = args.get(1) {
                    port = p
                        .parse::<u16>()
                        .map_err(|_| ConfigError::InvalidPort(p.clone()))?;
                }
                Command::Web
            }
            Some("list") => Command::List,
            Some("export") => {
                let mut out_dir = PathBuf::from(".");
                let mut team = None;
                let mut rest = args[1..].iter();
                while let Some(arg) = rest.next() {
                    if arg == "--team" {
                        team = Some(rest.next().ok_or(ConfigError::MissingValue("--team"))?.clone());
                    } else {
                        out_dir = PathBuf::from(arg);
                    }
                }
                Command::Export { out_dir, team }
            }
            Some(other) => return Err(ConfigError::UnknownCommand(other.to_string())),
        };

        Ok(Self {
            command,
            port,
            bind: env("ROSTER_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            data_dir: env("ROSTER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            admin_username: env("ADMIN_USERNAME")
                .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string()),
            admin_password: env("ADMIN_PASSWORD").filter(|p| !p.is_empty()),
            secure_cookies: env("ROSTER_SECURE_COOKIES")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

pub const USAGE: &str = "usage: roster-collector [web [port] | list | export [out_dir] [--team NAME]]";
