use clap::Subcommand;
use focus_core::Database;

#[derive(Subcommand)]
pub enum AlertsAction {
    /// List the pending alert series
    List,
    /// Drop every pending alert without touching the session
    Clear,
}

pub fn run(action: AlertsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        AlertsAction::List => {
            let alerts = db.pending_alerts()?;
            println!("{}", serde_json::to_string_pretty(&alerts)?);
        }
        AlertsAction::Clear => {
            db.clear_alerts()?;
            println!("ok");
        }
    }
    Ok(())
}
