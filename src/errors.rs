use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("roster error: {0}")]
    Roster(#[from] RosterError),

    #[error("store error: {0}")]
    Sink(#[from] SinkError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Problems with the draft itself. Recovered locally and shown inline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("You can add up to {0} players.")]
    TooManyPlayers(usize),
    #[error("Please complete all required fields.")]
    MissingRequiredFields,
    #[error("A submission is already in progress.")]
    SubmitInFlight,
}

/// The submission store refused or failed to take a roster.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{0}")]
    Rejected(String),
    #[error("could not access submission store: {0}")]
    Io(#[from] std::io::Error),
    #[error("submission store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("not signed in")]
    Missing,
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("admin login is disabled: no admin password configured")]
    Disabled,
    #[error("session storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing value for {0}")]
    MissingValue(&'static str),
}
