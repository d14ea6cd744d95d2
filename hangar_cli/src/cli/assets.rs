use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::Args;
use hangar_app::{StateDocument, StateReport};

use crate::cli::common::Session;

#[derive(Debug, Args)]
pub(crate) struct StateCommand {
    /// Write one `<owner>.toml` per identity here instead of printing.
    #[arg(long)]
    out: Option<PathBuf>,
}

impl StateCommand {
    pub(crate) async fn run(&self, session: &Session) -> anyhow::Result<()> {
        let app = session.open_app().await?;
        let report = app.current_state(&session.user_id).await?;

        match (&self.out, &report) {
            (Some(dir), StateReport::Exported { documents, skipped }) => {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                for document in documents {
                    let path = dir.join(state_file_name(document));
                    fs::write(&path, &document.document)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Wrote {}", path.display());
                }
                for entry in skipped {
                    log::warn!("skipped {}: {:?}", entry.label, entry.reason);
                }
            }
            _ => println!("{report}"),
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub(crate) struct CheckCommand {}

impl CheckCommand {
    pub(crate) async fn run(&self, session: &Session) -> anyhow::Result<()> {
        let app = session.open_app().await?;
        println!("{}", app.check(&session.user_id).await?);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub(crate) struct BuyCommand {}

impl BuyCommand {
    pub(crate) async fn run(&self, session: &Session) -> anyhow::Result<()> {
        let app = session.open_app().await?;
        println!("{}", app.buy(&session.user_id).await?);
        Ok(())
    }
}

fn state_file_name(document: &StateDocument) -> String {
    let stem: String = document
        .owner_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{stem}.toml")
}
