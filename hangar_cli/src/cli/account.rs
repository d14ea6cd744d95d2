use anyhow::Context;
use clap::Args;
use hangar_core::ScopeProfile;

use crate::cli::common::{Session, load_esi_config, wait_for_callback};

#[derive(Debug, Args)]
pub(crate) struct AuthCommand {
    /// Request corporation asset access instead of character access.
    #[arg(long)]
    corporation: bool,
}

impl AuthCommand {
    pub(crate) async fn run(&self, session: &Session) -> anyhow::Result<()> {
        let profile = if self.corporation {
            ScopeProfile::Corporation
        } else {
            ScopeProfile::Character
        };
        let callback_url = load_esi_config()?.callback_url;
        let app = session.open_app().await?;

        let request = app.begin_authorization(&session.user_id, profile).await?;
        println!(
            "Open this URL in your browser:\n\n{}\n",
            request.authorization_url
        );
        println!("Waiting for callback on {callback_url}");

        let callback = wait_for_callback(&callback_url)?;
        let identity = app
            .complete_authorization(&callback.state, &callback.code)
            .await
            .context("authorization was not accepted")?;

        println!("Linked {}", identity.label());
        Ok(())
    }
}

#[derive(Debug, Args)]
pub(crate) struct CharactersCommand {}

impl CharactersCommand {
    pub(crate) async fn run(&self, session: &Session) -> anyhow::Result<()> {
        let app = session.open_app().await?;
        let identities = app.linked_identities(&session.user_id).await?;

        if identities.is_empty() {
            println!("You have no authorized characters!");
            return Ok(());
        }
        for identity in identities {
            println!("{}", identity.display_name());
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub(crate) struct RevokeCommand {}

impl RevokeCommand {
    pub(crate) async fn run(&self, session: &Session) -> anyhow::Result<()> {
        let app = session.open_app().await?;
        let removed = app.revoke(&session.user_id).await?;
        println!("Removed {removed} linked identities for {}.", session.user_id);
        Ok(())
    }
}
