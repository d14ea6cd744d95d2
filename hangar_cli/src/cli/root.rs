use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use hangar_core::UserId;

use crate::cli::{
    account::{AuthCommand, CharactersCommand, RevokeCommand},
    assets::{BuyCommand, CheckCommand, StateCommand},
    common::Session,
    requirements::{GetCommand, SetCommand},
};

pub(crate) fn get_args() -> CliOpts {
    CliOpts::parse()
}

/// Keeps ship fittings across EVE characters and corporations in line with
/// a requirement document.
#[derive(Debug, Parser)]
#[command(version = clap::crate_version!())]
pub(crate) struct CliOpts {
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Account that owns linked identities and requirements.
    #[arg(short, long, global = true, env = "HANGAR_USER", default_value = "local")]
    user: String,

    /// SQLite database holding identities and requirements.
    #[arg(long, global = true, env = "HANGAR_DB", default_value = "hangar.sqlite")]
    db: PathBuf,

    #[command(subcommand)]
    subcmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Link a character, or a corporation through one of its members.
    Auth(AuthCommand),

    /// List linked characters and corporations.
    Characters(CharactersCommand),

    /// Export current fittings as requirement documents.
    State(StateCommand),

    /// Compare fittings against the stored requirements.
    Check(CheckCommand),

    /// Total everything missing into a multibuy list.
    Buy(BuyCommand),

    /// Upload a requirement document.
    Set(SetCommand),

    /// Print the stored requirement document.
    Get(GetCommand),

    /// Forget every linked identity.
    Revoke(RevokeCommand),
}

impl CliOpts {
    pub(crate) fn verbose(&self) -> u8 {
        self.verbose
    }

    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        let session = Session {
            user_id: UserId::new(self.user.clone()),
            db: self.db.clone(),
        };

        match &self.subcmd {
            Command::Auth(cmd) => cmd.run(&session).await,
            Command::Characters(cmd) => cmd.run(&session).await,
            Command::State(cmd) => cmd.run(&session).await,
            Command::Check(cmd) => cmd.run(&session).await,
            Command::Buy(cmd) => cmd.run(&session).await,
            Command::Set(cmd) => cmd.run(&session).await,
            Command::Get(cmd) => cmd.run(&session).await,
            Command::Revoke(cmd) => cmd.run(&session).await,
        }
    }
}
