//! In-memory doubles shared by the unit tests of this crate.

use std::{
    collections::{HashMap, HashSet},
    convert::Infallible,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use hangar_core::{
    Challenge, CharacterId, CorporationId, Identity, IdentityGrant, IdentityId, IdentityStore,
    RawAsset, ScopeProfile, Timestamp, TypeId, UserId, characters_first,
};

use crate::{
    EsiError, EsiResult,
    api::EsiApiClient,
    auth::{Clock, EphemeralCredential},
    client::{GrantedTokens, RefreshedTokens, SsoClient},
    esi_client::check_status,
};

#[derive(Clone, Copy)]
pub(crate) struct FixedClock {
    pub now: Timestamp,
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now
    }
}

pub(crate) fn ts(epoch_secs: i64) -> Timestamp {
    Timestamp::from_epoch_secs(epoch_secs).expect("valid epoch seconds")
}

#[derive(Default)]
struct MemoryState {
    challenges: Vec<Challenge>,
    identities: Vec<Identity>,
    next_id: i64,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn with_identities(identities: Vec<Identity>) -> Self {
        let next_id = identities.iter().map(|identity| identity.id.0).max().unwrap_or(0);
        Self {
            state: Mutex::new(MemoryState {
                challenges: Vec::new(),
                identities,
                next_id,
            }),
        }
    }

    pub fn challenge_count(&self) -> usize {
        self.state.lock().expect("lock").challenges.len()
    }

    pub fn all_identities(&self) -> Vec<Identity> {
        self.state.lock().expect("lock").identities.clone()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    type Error = Infallible;

    async fn replace_challenge(&self, challenge: &Challenge) -> Result<(), Infallible> {
        let mut state = self.state.lock().expect("lock");
        state
            .challenges
            .retain(|existing| existing.user_id != challenge.user_id);
        state.challenges.push(challenge.clone());
        Ok(())
    }

    async fn find_challenge(&self, state_value: &str) -> Result<Option<Challenge>, Infallible> {
        let state = self.state.lock().expect("lock");
        Ok(state
            .challenges
            .iter()
            .find(|challenge| challenge.state == state_value)
            .cloned())
    }

    async fn pending_challenge(&self, user_id: &UserId) -> Result<Option<Challenge>, Infallible> {
        let state = self.state.lock().expect("lock");
        Ok(state
            .challenges
            .iter()
            .find(|challenge| &challenge.user_id == user_id)
            .cloned())
    }

    async fn redeem_challenge(
        &self,
        state_value: &str,
        grant: &IdentityGrant,
    ) -> Result<Option<Identity>, Infallible> {
        let mut state = self.state.lock().expect("lock");
        let Some(position) = state
            .challenges
            .iter()
            .position(|challenge| challenge.state == state_value)
        else {
            return Ok(None);
        };
        let challenge = state.challenges.remove(position);

        if let Some(existing) = state.identities.iter_mut().find(|identity| {
            identity.user_id == challenge.user_id
                && identity.character_id == grant.character_id
                && identity.kind == grant.kind
        }) {
            existing.character_name = grant.character_name.clone();
            existing.refresh_token = grant.refresh_token.clone();
            return Ok(Some(existing.clone()));
        }

        state.next_id += 1;
        let identity = Identity {
            id: IdentityId(state.next_id),
            user_id: challenge.user_id,
            kind: grant.kind,
            character_id: grant.character_id,
            character_name: grant.character_name.clone(),
            refresh_token: grant.refresh_token.clone(),
        };
        state.identities.push(identity.clone());
        Ok(Some(identity))
    }

    async fn identities(&self, user_id: &UserId) -> Result<Vec<Identity>, Infallible> {
        let state = self.state.lock().expect("lock");
        Ok(characters_first(
            state
                .identities
                .iter()
                .filter(|identity| &identity.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn update_refresh_token(
        &self,
        identity: &Identity,
        refresh_token: &str,
    ) -> Result<(), Infallible> {
        let mut state = self.state.lock().expect("lock");
        if let Some(stored) = state
            .identities
            .iter_mut()
            .find(|stored| stored.id == identity.id && stored.kind == identity.kind)
        {
            stored.refresh_token = refresh_token.to_owned();
        }
        Ok(())
    }

    async fn delete_identity(&self, identity: &Identity) -> Result<bool, Infallible> {
        let mut state = self.state.lock().expect("lock");
        let before = state.identities.len();
        state
            .identities
            .retain(|stored| !(stored.id == identity.id && stored.kind == identity.kind));
        Ok(state.identities.len() != before)
    }

    async fn delete_identities(&self, user_id: &UserId) -> Result<u64, Infallible> {
        let mut state = self.state.lock().expect("lock");
        let before = state.identities.len();
        state.identities.retain(|stored| &stored.user_id != user_id);
        Ok((before - state.identities.len()) as u64)
    }
}

#[derive(Default)]
pub(crate) struct MockSsoClient {
    pub grant: Option<GrantedTokens>,
    pub corporation_id: Option<CorporationId>,
    pub rotations: HashMap<String, String>,
    pub rejected_refresh_tokens: HashSet<String>,
    pub refresh_calls: Mutex<Vec<(ScopeProfile, String)>>,
}

impl MockSsoClient {
    pub fn granting(character_id: u64, name: &str, scopes: &[&str]) -> Self {
        Self {
            grant: Some(GrantedTokens {
                character_id: CharacterId(character_id),
                character_name: name.to_owned(),
                scopes: scopes.iter().map(|scope| (*scope).to_owned()).collect(),
                access_token: "initial-access".to_owned(),
                refresh_token: format!("refresh-{character_id}"),
            }),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SsoClient for MockSsoClient {
    fn authorize_url(&self, profile: ScopeProfile, state: &str) -> EsiResult<String> {
        Ok(format!("https://sso.test/authorize?profile={profile}&state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> EsiResult<GrantedTokens> {
        match (&self.grant, code) {
            (Some(grant), "good-code") => Ok(grant.clone()),
            _ => Err(EsiError::message("invalid_grant")),
        }
    }

    async fn refresh(
        &self,
        profile: ScopeProfile,
        refresh_token: &str,
    ) -> EsiResult<RefreshedTokens> {
        self.refresh_calls
            .lock()
            .expect("lock")
            .push((profile, refresh_token.to_owned()));

        if self.rejected_refresh_tokens.contains(refresh_token) {
            return Err(EsiError::CredentialRejected {
                endpoint: "sso token endpoint".to_owned(),
                status: 400,
            });
        }

        Ok(RefreshedTokens {
            access_token: format!("access-{refresh_token}"),
            refresh_token: self
                .rotations
                .get(refresh_token)
                .cloned()
                .unwrap_or_else(|| refresh_token.to_owned()),
        })
    }

    async fn character_corporation(&self, _character_id: CharacterId) -> EsiResult<CorporationId> {
        self.corporation_id
            .ok_or_else(|| EsiError::message("no corporation configured"))
    }
}

pub(crate) enum AssetResponse {
    Assets(Vec<RawAsset>),
    Status(u16),
    Hang,
}

#[derive(Default)]
pub(crate) struct MockApiClient {
    pub assets: HashMap<String, AssetResponse>,
    pub type_names: HashMap<TypeId, String>,
    pub corporation_names: HashMap<CorporationId, String>,
    pub asset_calls: Mutex<Vec<String>>,
}

#[async_trait]
impl EsiApiClient for MockApiClient {
    async fn character_corporation(&self, _character_id: CharacterId) -> EsiResult<CorporationId> {
        Err(EsiError::message("not used by the aggregator"))
    }

    async fn corporation_name(&self, corporation_id: CorporationId) -> EsiResult<String> {
        self.corporation_names
            .get(&corporation_id)
            .cloned()
            .ok_or_else(|| EsiError::message("unknown corporation"))
    }

    async fn assets(&self, credential: &EphemeralCredential) -> EsiResult<Vec<RawAsset>> {
        let path = credential.assets_path();
        self.asset_calls.lock().expect("lock").push(path.clone());

        match self.assets.get(&path) {
            Some(AssetResponse::Assets(assets)) => Ok(assets.clone()),
            Some(AssetResponse::Status(status)) => {
                check_status(&path, *status)?;
                Ok(Vec::new())
            }
            Some(AssetResponse::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn type_names(&self, type_ids: &[TypeId]) -> EsiResult<HashMap<TypeId, String>> {
        Ok(type_ids
            .iter()
            .filter_map(|type_id| {
                self.type_names
                    .get(type_id)
                    .map(|name| (*type_id, name.clone()))
            })
            .collect())
    }
}
