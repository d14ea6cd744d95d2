use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    ids::{CharacterId, CorporationId, UserId},
    time::Timestamp,
};

/// Which set of provider scopes an authorization is requested for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeProfile {
    Character,
    Corporation,
}

impl ScopeProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Corporation => "corporation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "character" => Some(Self::Character),
            "corporation" => Some(Self::Corporation),
            _ => None,
        }
    }
}

impl fmt::Display for ScopeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    Character,
    Corporation { corporation_id: CorporationId },
}

impl IdentityKind {
    pub fn profile(self) -> ScopeProfile {
        match self {
            Self::Character => ScopeProfile::Character,
            Self::Corporation { .. } => ScopeProfile::Corporation,
        }
    }

    pub fn is_corporation(self) -> bool {
        matches!(self, Self::Corporation { .. })
    }

    pub fn corporation_id(self) -> Option<CorporationId> {
        match self {
            Self::Character => None,
            Self::Corporation { corporation_id } => Some(corporation_id),
        }
    }
}

/// Store-assigned row id. Unique within one identity kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityId(pub i64);

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: IdentityId,
    pub user_id: UserId,
    pub kind: IdentityKind,
    pub character_id: CharacterId,
    pub character_name: String,
    pub refresh_token: String,
}

impl Identity {
    pub fn is_corporation(&self) -> bool {
        self.kind.is_corporation()
    }

    /// Short human readable description for logs. Never includes the token.
    pub fn label(&self) -> String {
        match self.kind {
            IdentityKind::Character => {
                format!("character {} ({})", self.character_name, self.character_id)
            }
            IdentityKind::Corporation { corporation_id } => format!(
                "corporation {corporation_id} via {} ({})",
                self.character_name, self.character_id
            ),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("kind", &self.kind)
            .field("character_id", &self.character_id)
            .field("character_name", &self.character_name)
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Everything a successful code exchange yields that is worth persisting.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityGrant {
    pub kind: IdentityKind,
    pub character_id: CharacterId,
    pub character_name: String,
    pub refresh_token: String,
}

impl fmt::Debug for IdentityGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityGrant")
            .field("kind", &self.kind)
            .field("character_id", &self.character_id)
            .field("character_name", &self.character_name)
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge {
    pub user_id: UserId,
    pub state: String,
    pub profile: ScopeProfile,
    pub created_at: Timestamp,
}

/// Persistence for identities and pending challenges.
///
/// `replace_challenge` must leave exactly one challenge for the user, and
/// `redeem_challenge` must delete the challenge and write the identity in one
/// transaction, returning `None` when no challenge matched the state.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn replace_challenge(&self, challenge: &Challenge) -> Result<(), Self::Error>;

    async fn find_challenge(&self, state: &str) -> Result<Option<Challenge>, Self::Error>;

    async fn pending_challenge(&self, user_id: &UserId) -> Result<Option<Challenge>, Self::Error>;

    async fn redeem_challenge(
        &self,
        state: &str,
        grant: &IdentityGrant,
    ) -> Result<Option<Identity>, Self::Error>;

    /// Identities of the user, characters first, each kind in insertion order.
    async fn identities(&self, user_id: &UserId) -> Result<Vec<Identity>, Self::Error>;

    async fn update_refresh_token(
        &self,
        identity: &Identity,
        refresh_token: &str,
    ) -> Result<(), Self::Error>;

    async fn delete_identity(&self, identity: &Identity) -> Result<bool, Self::Error>;

    async fn delete_identities(&self, user_id: &UserId) -> Result<u64, Self::Error>;
}

/// Stable reorder putting character identities ahead of corporation ones.
pub fn characters_first(mut identities: Vec<Identity>) -> Vec<Identity> {
    identities.sort_by_key(Identity::is_corporation);
    identities
}
