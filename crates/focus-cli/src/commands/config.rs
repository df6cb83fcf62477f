use clap::Subcommand;
use focus_core::{Config, Database, PersistedSession};
use tracing::info;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "session.work_minutes", "notifications.enabled")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
}

/// A changed session config invalidates the running session and its alerts.
fn reset_session() -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    PersistedSession::clear(&db)?;
    db.clear_alerts()?;
    info!("session config changed; session reset");
    Ok(())
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("unknown key: {key}");
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            let before = config.session;
            config.set(&key, &value)?;
            if config.session != before {
                reset_session()?;
            }
            println!("ok");
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        ConfigAction::Reset => {
            let before = Config::load_or_default().session;
            let config = Config::default();
            config.save()?;
            if config.session != before {
                reset_session()?;
            }
            println!("config reset to defaults");
        }
    }
    Ok(())
}
