use std::{path::Path, time::Duration};

use async_trait::async_trait;
use futures_util::TryStreamExt;
use hangar_core::{
    Challenge, CharacterId, CorporationId, Identity, IdentityGrant, IdentityId, IdentityKind,
    IdentityStore, ScopeProfile, Timestamp, UserId,
};
use sqlx::{
    FromRow, Sqlite, SqlitePool, Transaction,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};

use crate::StoreError;

/// SQLite backed identity, challenge and requirement storage.
#[derive(Clone)]
pub struct HangarStore {
    pool: SqlitePool,
}

impl HangarStore {
    pub async fn connect(database_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let connect_options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(connect_options)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    /// Replaces the user's requirement document wholesale, creating the user
    /// record when needed.
    pub async fn set_requirements(&self, user_id: &UserId, document: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, requirements)
            VALUES (?1, ?2)
            ON CONFLICT (user_id) DO UPDATE SET requirements = excluded.requirements
            "#,
        )
        .bind(user_id.as_str())
        .bind(document)
        .execute(&self.pool)
        .await?;

        log::debug!("stored requirements for user {user_id}");
        Ok(())
    }

    pub async fn requirements(&self, user_id: &UserId) -> Result<Option<String>, StoreError> {
        let stored: Option<Option<String>> =
            sqlx::query_scalar("SELECT requirements FROM users WHERE user_id = ?1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(stored.flatten())
    }

    async fn characters(&self, user_id: &UserId) -> Result<Vec<Identity>, StoreError> {
        let mut rows = sqlx::query_as::<_, DbCharacter>(
            r#"
            SELECT id, user_id, character_id, character_name, refresh_token
            FROM characters
            WHERE user_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch(&self.pool);

        let mut identities = Vec::new();
        while let Some(row) = rows.try_next().await? {
            identities.push(Identity::try_from(row)?);
        }

        Ok(identities)
    }

    async fn corporation_characters(&self, user_id: &UserId) -> Result<Vec<Identity>, StoreError> {
        let mut rows = sqlx::query_as::<_, DbCorporationCharacter>(
            r#"
            SELECT id, user_id, character_id, character_name, corporation_id, refresh_token
            FROM corporation_characters
            WHERE user_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch(&self.pool);

        let mut identities = Vec::new();
        while let Some(row) = rows.try_next().await? {
            identities.push(Identity::try_from(row)?);
        }

        Ok(identities)
    }
}

#[async_trait]
impl IdentityStore for HangarStore {
    type Error = StoreError;

    async fn replace_challenge(&self, challenge: &Challenge) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        ensure_user(&mut tx, &challenge.user_id).await?;

        sqlx::query(
            r#"
            INSERT INTO challenges (user_id, state, profile, created_at_epoch_millis)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (user_id) DO UPDATE SET
                state = excluded.state,
                profile = excluded.profile,
                created_at_epoch_millis = excluded.created_at_epoch_millis
            "#,
        )
        .bind(challenge.user_id.as_str())
        .bind(&challenge.state)
        .bind(challenge.profile.as_str())
        .bind(challenge.created_at.as_epoch_millis())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_challenge(&self, state: &str) -> Result<Option<Challenge>, StoreError> {
        sqlx::query_as::<_, DbChallenge>(
            r#"
            SELECT user_id, state, profile, created_at_epoch_millis
            FROM challenges
            WHERE state = ?1
            "#,
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await?
        .map(Challenge::try_from)
        .transpose()
    }

    async fn pending_challenge(&self, user_id: &UserId) -> Result<Option<Challenge>, StoreError> {
        sqlx::query_as::<_, DbChallenge>(
            r#"
            SELECT user_id, state, profile, created_at_epoch_millis
            FROM challenges
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(Challenge::try_from)
        .transpose()
    }

    async fn redeem_challenge(
        &self,
        state: &str,
        grant: &IdentityGrant,
    ) -> Result<Option<Identity>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let redeemed: Option<String> =
            sqlx::query_scalar("DELETE FROM challenges WHERE state = ?1 RETURNING user_id")
                .bind(state)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(user_id) = redeemed else {
            return Ok(None);
        };

        let character_id = id_to_sqlite(grant.character_id.0)?;
        let id: i64 = match grant.kind {
            IdentityKind::Character => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO characters (user_id, character_id, character_name, refresh_token)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT (user_id, character_id) DO UPDATE SET
                        character_name = excluded.character_name,
                        refresh_token = excluded.refresh_token
                    RETURNING id
                    "#,
                )
                .bind(&user_id)
                .bind(character_id)
                .bind(&grant.character_name)
                .bind(&grant.refresh_token)
                .fetch_one(&mut *tx)
                .await?
            }
            IdentityKind::Corporation { corporation_id } => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO corporation_characters (
                        user_id,
                        character_id,
                        character_name,
                        corporation_id,
                        refresh_token
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT (user_id, character_id, corporation_id) DO UPDATE SET
                        character_name = excluded.character_name,
                        refresh_token = excluded.refresh_token
                    RETURNING id
                    "#,
                )
                .bind(&user_id)
                .bind(character_id)
                .bind(&grant.character_name)
                .bind(id_to_sqlite(corporation_id.0)?)
                .bind(&grant.refresh_token)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        Ok(Some(Identity {
            id: IdentityId(id),
            user_id: UserId::new(user_id),
            kind: grant.kind,
            character_id: grant.character_id,
            character_name: grant.character_name.clone(),
            refresh_token: grant.refresh_token.clone(),
        }))
    }

    async fn identities(&self, user_id: &UserId) -> Result<Vec<Identity>, StoreError> {
        let mut identities = self.characters(user_id).await?;
        identities.extend(self.corporation_characters(user_id).await?);
        Ok(identities)
    }

    async fn update_refresh_token(
        &self,
        identity: &Identity,
        refresh_token: &str,
    ) -> Result<(), StoreError> {
        let query = match identity.kind {
            IdentityKind::Character => "UPDATE characters SET refresh_token = ?1 WHERE id = ?2",
            IdentityKind::Corporation { .. } => {
                "UPDATE corporation_characters SET refresh_token = ?1 WHERE id = ?2"
            }
        };

        sqlx::query(query)
            .bind(refresh_token)
            .bind(identity.id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_identity(&self, identity: &Identity) -> Result<bool, StoreError> {
        let query = match identity.kind {
            IdentityKind::Character => "DELETE FROM characters WHERE id = ?1",
            IdentityKind::Corporation { .. } => "DELETE FROM corporation_characters WHERE id = ?1",
        };

        let result = sqlx::query(query)
            .bind(identity.id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_identities(&self, user_id: &UserId) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let characters = sqlx::query("DELETE FROM characters WHERE user_id = ?1")
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await?;
        let corporation_characters =
            sqlx::query("DELETE FROM corporation_characters WHERE user_id = ?1")
                .bind(user_id.as_str())
                .execute(&mut *tx)
                .await?;
        tx.commit().await?;

        Ok(characters.rows_affected() + corporation_characters.rows_affected())
    }
}

async fn ensure_user(tx: &mut Transaction<'_, Sqlite>, user_id: &UserId) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO users (user_id) VALUES (?1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[derive(Debug, FromRow)]
struct DbChallenge {
    user_id: String,
    state: String,
    profile: String,
    created_at_epoch_millis: i64,
}

impl TryFrom<DbChallenge> for Challenge {
    type Error = StoreError;

    fn try_from(value: DbChallenge) -> Result<Self, Self::Error> {
        Ok(Self {
            profile: ScopeProfile::parse(&value.profile)
                .ok_or(StoreError::InvalidScopeProfile(value.profile))?,
            user_id: UserId::new(value.user_id),
            state: value.state,
            created_at: Timestamp::from_epoch_millis(value.created_at_epoch_millis)
                .ok_or(StoreError::InvalidEpochMillis(value.created_at_epoch_millis))?,
        })
    }
}

#[derive(FromRow)]
struct DbCharacter {
    id: i64,
    user_id: String,
    character_id: i64,
    character_name: String,
    refresh_token: String,
}

impl TryFrom<DbCharacter> for Identity {
    type Error = StoreError;

    fn try_from(value: DbCharacter) -> Result<Self, Self::Error> {
        Ok(Self {
            id: IdentityId(value.id),
            user_id: UserId::new(value.user_id),
            kind: IdentityKind::Character,
            character_id: CharacterId(id_from_sqlite(value.character_id)?),
            character_name: value.character_name,
            refresh_token: value.refresh_token,
        })
    }
}

#[derive(FromRow)]
struct DbCorporationCharacter {
    id: i64,
    user_id: String,
    character_id: i64,
    character_name: String,
    corporation_id: i64,
    refresh_token: String,
}

impl TryFrom<DbCorporationCharacter> for Identity {
    type Error = StoreError;

    fn try_from(value: DbCorporationCharacter) -> Result<Self, Self::Error> {
        Ok(Self {
            id: IdentityId(value.id),
            user_id: UserId::new(value.user_id),
            kind: IdentityKind::Corporation {
                corporation_id: CorporationId(id_from_sqlite(value.corporation_id)?),
            },
            character_id: CharacterId(id_from_sqlite(value.character_id)?),
            character_name: value.character_name,
            refresh_token: value.refresh_token,
        })
    }
}

fn id_to_sqlite(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::IdOverflow(id))
}

fn id_from_sqlite(raw: i64) -> Result<u64, StoreError> {
    u64::try_from(raw).map_err(|_| StoreError::NegativeId(raw))
}
