mod config;
mod display;
mod errors;
mod form;
mod roster;
mod session;
mod store;
mod web;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Command, Config, USAGE};
use display::{print_team_groups, write_exports};
use form::group_by_team;
use store::{JsonFileStore, SubmissionSource};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            return Err(errors::AppError::from(e).into());
        }
    };

    match config.command.clone() {
        Command::Web => {
            info!(
                port = config.port,
                data_dir = %config.data_dir.display(),
                "Starting web server"
            );
            if config.admin_password.is_none() {
                warn!("ADMIN_PASSWORD is not set; the admin view is disabled");
            }
            println!("Access the site at http://localhost:{}", config.port);
            web::start_server(config).await?;
        }
        Command::List => {
            let store = JsonFileStore::new(&config.data_dir);
            let submissions = store.load_all().await?;
            print_team_groups(&group_by_team(&submissions));
        }
        Command::Export { out_dir, team } => {
            let store = JsonFileStore::new(&config.data_dir);
            let submissions = store.load_all().await?;
            let written = write_exports(&submissions, &out_dir, team.as_deref())?;
            println!("Rosters saved to:");
            for path in written {
                println!("  - {}", path.display());
            }
        }
    }

    Ok(())
}
