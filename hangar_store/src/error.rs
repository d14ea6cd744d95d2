#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("invalid scope profile '{0}' in challenge record")]
    InvalidScopeProfile(String),

    #[error("id {0} does not fit into sqlite INTEGER")]
    IdOverflow(u64),

    #[error("id {0} is negative in sqlite record")]
    NegativeId(i64),

    #[error("timestamp {0} is out of range")]
    InvalidEpochMillis(i64),
}
