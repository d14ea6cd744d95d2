use std::fmt;

use hangar_core::{CharacterId, Identity, IdentityId, IdentityKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub state: String,
}

/// A short-lived access token for one identity. Lives for a single fetch and
/// is never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct EphemeralCredential {
    pub identity_id: IdentityId,
    pub character_id: CharacterId,
    pub kind: IdentityKind,
    access_token: String,
}

impl EphemeralCredential {
    pub fn new(identity: &Identity, access_token: impl Into<String>) -> Self {
        Self {
            identity_id: identity.id,
            character_id: identity.character_id,
            kind: identity.kind,
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn assets_path(&self) -> String {
        match self.kind {
            IdentityKind::Character => format!("/characters/{}/assets/", self.character_id),
            IdentityKind::Corporation { corporation_id } => {
                format!("/corporations/{corporation_id}/assets/")
            }
        }
    }
}

impl fmt::Debug for EphemeralCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralCredential")
            .field("identity_id", &self.identity_id)
            .field("character_id", &self.character_id)
            .field("kind", &self.kind)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// What to do when the provider refuses an identity's stored credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Surface the failure to the caller and keep the identity.
    Propagate,
    /// Delete the identity and carry on without it.
    Deauthorize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnauthorizedPolicy {
    pub character: FailurePolicy,
    pub corporation: FailurePolicy,
}

impl UnauthorizedPolicy {
    pub fn for_kind(self, kind: IdentityKind) -> FailurePolicy {
        match kind {
            IdentityKind::Character => self.character,
            IdentityKind::Corporation { .. } => self.corporation,
        }
    }
}

impl Default for UnauthorizedPolicy {
    fn default() -> Self {
        Self {
            character: FailurePolicy::Propagate,
            corporation: FailurePolicy::Deauthorize,
        }
    }
}
