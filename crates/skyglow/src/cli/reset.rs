//! The `skyglow reset` command.

use clap::Args;
use skyglow_core::{Reducer, SessionId, Store};
use std::path::Path;

/// Arguments for the `reset` command.
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Session to reset (YYYYMMDDHHMMSS)
    #[arg(long, required_unless_present = "latest", conflicts_with = "latest")]
    pub session: Option<SessionId>,

    /// Reset the most recent session
    #[arg(long)]
    pub latest: bool,
}

/// Execute the reset command.
pub fn execute(args: ResetArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let store = Store::open(&config.database_path())?;
    let mut reducer = Reducer::new(store, config);

    let session = match args.session {
        Some(session) => session,
        None => reducer
            .latest_session()?
            .ok_or_else(|| anyhow::anyhow!("The database holds no session yet"))?,
    };

    let reset = reducer.reset(session)?;
    eprintln!("Session {session}: {reset} images reset");
    Ok(())
}
