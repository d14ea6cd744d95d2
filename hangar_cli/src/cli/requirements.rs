use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::Args;
use hangar_app::RequirementsUpdate;

use crate::cli::common::Session;

#[derive(Debug, Args)]
pub(crate) struct SetCommand {
    /// TOML document of `[Ship]` tables mapping item names to quantities.
    file: PathBuf,
}

impl SetCommand {
    pub(crate) async fn run(&self, session: &Session) -> anyhow::Result<()> {
        let document = fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let app = session.open_app().await?;

        match app.set_requirements(&session.user_id, &document).await? {
            RequirementsUpdate::Stored { ship_types } => {
                println!("Requirements set for {ship_types} ship types.");
            }
            RequirementsUpdate::NoLinkedIdentities => {
                println!("You have no authorized characters! Link one with `hangar auth` first.");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub(crate) struct GetCommand {}

impl GetCommand {
    pub(crate) async fn run(&self, session: &Session) -> anyhow::Result<()> {
        let app = session.open_app().await?;
        match app.requirements(&session.user_id).await? {
            Some(document) => print!("{document}"),
            None => println!("No requirements set."),
        }
        Ok(())
    }
}
