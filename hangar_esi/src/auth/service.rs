use hangar_core::{
    Challenge, Identity, IdentityGrant, IdentityKind, IdentityStore, ScopeProfile, Timestamp,
    UserId, characters_first,
};
use rand::{Rng, distributions::Alphanumeric};

use super::types::{AuthorizationRequest, EphemeralCredential, FailurePolicy, UnauthorizedPolicy};
use crate::{EsiError, EsiResult, client::SsoClient, config::EsiConfig};

/// 86 alphanumeric characters carry a little over 500 bits.
const STATE_LEN: usize = 86;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Session manager: issues anti-replay challenges, turns authorization codes
/// into stored identities and mints ephemeral credentials from them.
pub struct AuthService<C, S, T = SystemClock>
where
    C: SsoClient,
    S: IdentityStore,
    T: Clock,
{
    client: C,
    store: S,
    clock: T,
    policy: UnauthorizedPolicy,
}

impl<C, S> AuthService<C, S, SystemClock>
where
    C: SsoClient,
    S: IdentityStore,
{
    pub fn new(client: C, store: S) -> Self {
        Self::with_clock(client, store, SystemClock)
    }
}

impl<C, S, T> AuthService<C, S, T>
where
    C: SsoClient,
    S: IdentityStore,
    T: Clock,
{
    pub fn with_clock(client: C, store: S, clock: T) -> Self {
        Self {
            client,
            store,
            clock,
            policy: UnauthorizedPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UnauthorizedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> UnauthorizedPolicy {
        self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Issues a fresh state for the user, superseding any earlier one.
    pub async fn generate_challenge(
        &self,
        user_id: &UserId,
        profile: ScopeProfile,
    ) -> EsiResult<String> {
        let challenge = Challenge {
            user_id: user_id.clone(),
            state: random_state(),
            profile,
            created_at: self.clock.now(),
        };
        self.store
            .replace_challenge(&challenge)
            .await
            .map_err(EsiError::store)?;

        log::debug!("issued {profile} authorization challenge for user {user_id}");
        Ok(challenge.state)
    }

    pub fn authorize_url(&self, profile: ScopeProfile, state: &str) -> EsiResult<String> {
        self.client.authorize_url(profile, state)
    }

    pub async fn begin_authorization(
        &self,
        user_id: &UserId,
        profile: ScopeProfile,
    ) -> EsiResult<AuthorizationRequest> {
        let state = self.generate_challenge(user_id, profile).await?;
        let authorization_url = self.authorize_url(profile, &state)?;
        Ok(AuthorizationRequest {
            authorization_url,
            state,
        })
    }

    /// Redeems the challenge named by `state` with the provider's code.
    ///
    /// Unknown, superseded and already used states fail with
    /// `EsiError::InvalidState` before the provider is contacted. A rejected
    /// code leaves the challenge in place.
    pub async fn complete_exchange(&self, state: &str, code: &str) -> EsiResult<Identity> {
        let Some(challenge) = self
            .store
            .find_challenge(state)
            .await
            .map_err(EsiError::store)?
        else {
            log::warn!("rejected authorization callback with unknown state");
            return Err(EsiError::InvalidState);
        };

        let tokens = self
            .client
            .exchange_code(code)
            .await
            .map_err(|err| EsiError::GrantExchange(Box::new(err)))?;

        let missing = missing_required_scopes(&tokens.scopes, challenge.profile);
        if !missing.is_empty() {
            return Err(EsiError::MissingRequiredScopes { missing });
        }

        let kind = match challenge.profile {
            ScopeProfile::Character => IdentityKind::Character,
            ScopeProfile::Corporation => IdentityKind::Corporation {
                corporation_id: self.client.character_corporation(tokens.character_id).await?,
            },
        };
        let grant = IdentityGrant {
            kind,
            character_id: tokens.character_id,
            character_name: tokens.character_name,
            refresh_token: tokens.refresh_token,
        };

        // A concurrent redemption of the same state wins the delete; this one
        // then sees no challenge.
        let identity = self
            .store
            .redeem_challenge(state, &grant)
            .await
            .map_err(EsiError::store)?
            .ok_or(EsiError::InvalidState)?;

        let age = self
            .clock
            .now()
            .elapsed_since(challenge.created_at)
            .unwrap_or_default();
        log::info!(
            "user {} authorized {} after {}s",
            identity.user_id,
            identity.label(),
            age.as_secs()
        );
        Ok(identity)
    }

    pub async fn identities(&self, user_id: &UserId) -> EsiResult<Vec<Identity>> {
        let identities = self
            .store
            .identities(user_id)
            .await
            .map_err(EsiError::store)?;
        Ok(characters_first(identities))
    }

    /// Exchanges the identity's refresh token for an access token, writing a
    /// rotated refresh token back to the store.
    pub async fn ephemeral_credential(&self, identity: &Identity) -> EsiResult<EphemeralCredential> {
        let tokens = self
            .client
            .refresh(identity.kind.profile(), &identity.refresh_token)
            .await?;

        if tokens.refresh_token != identity.refresh_token {
            self.store
                .update_refresh_token(identity, &tokens.refresh_token)
                .await
                .map_err(EsiError::store)?;
            log::debug!("stored rotated refresh token for {}", identity.label());
        }

        Ok(EphemeralCredential::new(identity, tokens.access_token))
    }

    /// Applies the unauthorized policy for the identity's kind. `Ok` means the
    /// identity was deauthorized and the caller may continue without it.
    pub async fn report_unauthorized(&self, identity: &Identity, cause: EsiError) -> EsiResult<()> {
        match self.policy.for_kind(identity.kind) {
            FailurePolicy::Deauthorize => {
                let removed = self
                    .store
                    .delete_identity(identity)
                    .await
                    .map_err(EsiError::store)?;
                log::warn!(
                    "deauthorized {} after credential rejection: {} (removed: {removed})",
                    identity.label(),
                    cause.display_chain()
                );
                Ok(())
            }
            FailurePolicy::Propagate => Err(EsiError::IdentityUnauthorized {
                identity: identity.label(),
                source: Box::new(cause),
            }),
        }
    }

    pub async fn revoke_all(&self, user_id: &UserId) -> EsiResult<u64> {
        let removed = self
            .store
            .delete_identities(user_id)
            .await
            .map_err(EsiError::store)?;
        log::info!("revoked {removed} identities for user {user_id}");
        Ok(removed)
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

fn missing_required_scopes(granted_scopes: &[String], profile: ScopeProfile) -> Vec<String> {
    EsiConfig::scopes_for(profile)
        .iter()
        .filter(|required| !granted_scopes.iter().any(|granted| granted == *required))
        .map(|required| (*required).to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet},
        sync::Arc,
    };

    use hangar_core::{
        CharacterId, CorporationId, Identity, IdentityId, IdentityKind, IdentityStore,
        ScopeProfile, UserId,
    };

    use super::{AuthService, STATE_LEN};
    use crate::{
        EsiError,
        auth::{FailurePolicy, UnauthorizedPolicy},
        config::{CHARACTER_ASSETS_SCOPE, CORPORATION_ASSETS_SCOPE},
        testing::{FixedClock, MemoryStore, MockSsoClient, ts},
    };

    fn service(client: MockSsoClient) -> AuthService<MockSsoClient, MemoryStore, FixedClock> {
        AuthService::with_clock(client, MemoryStore::default(), FixedClock { now: ts(1_000) })
    }

    fn user() -> UserId {
        UserId::new("discord:1234")
    }

    fn stored(id: i64, kind: IdentityKind, refresh_token: &str) -> Identity {
        Identity {
            id: IdentityId(id),
            user_id: user(),
            kind,
            character_id: CharacterId(9000 + id as u64),
            character_name: format!("Pilot {id}"),
            refresh_token: refresh_token.to_owned(),
        }
    }

    #[tokio::test]
    async fn challenges_are_long_and_distinct() {
        let service = service(MockSsoClient::default());

        let first = service
            .generate_challenge(&user(), ScopeProfile::Character)
            .await
            .expect("challenge");
        let second = service
            .generate_challenge(&UserId::new("discord:5678"), ScopeProfile::Character)
            .await
            .expect("challenge");

        assert_eq!(first.len(), STATE_LEN);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_challenges_leave_exactly_one_pending() {
        let service = Arc::new(service(MockSsoClient::default()));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .generate_challenge(&user(), ScopeProfile::Character)
                        .await
                })
            })
            .collect();
        let mut issued = Vec::new();
        for task in tasks {
            issued.push(task.await.expect("join").expect("challenge"));
        }

        assert_eq!(service.store().challenge_count(), 1);
        let pending = service
            .store()
            .pending_challenge(&user())
            .await
            .expect("lookup")
            .expect("pending challenge");
        assert!(issued.contains(&pending.state));
    }

    #[tokio::test]
    async fn new_challenge_supersedes_the_previous_one() {
        let service = service(MockSsoClient::granting(
            90000001,
            "Pilot",
            &[CHARACTER_ASSETS_SCOPE],
        ));

        let old = service
            .generate_challenge(&user(), ScopeProfile::Character)
            .await
            .expect("challenge");
        let new = service
            .generate_challenge(&user(), ScopeProfile::Character)
            .await
            .expect("challenge");

        assert_eq!(service.store().challenge_count(), 1);
        let pending = service
            .store()
            .pending_challenge(&user())
            .await
            .expect("lookup")
            .expect("pending challenge");
        assert_eq!(pending.state, new);
        assert_eq!(pending.created_at, ts(1_000));

        let err = service
            .complete_exchange(&old, "good-code")
            .await
            .expect_err("superseded state");
        assert!(matches!(err, EsiError::InvalidState));
        service
            .complete_exchange(&new, "good-code")
            .await
            .expect("current state redeems");
    }

    #[tokio::test]
    async fn exchange_links_a_character_identity_once() {
        let service = service(MockSsoClient::granting(
            90000001,
            "Pilot",
            &[CHARACTER_ASSETS_SCOPE],
        ));
        let request = service
            .begin_authorization(&user(), ScopeProfile::Character)
            .await
            .expect("begin");
        assert!(request.authorization_url.contains(&request.state));

        let identity = service
            .complete_exchange(&request.state, "good-code")
            .await
            .expect("exchange");

        assert_eq!(identity.user_id, user());
        assert_eq!(identity.kind, IdentityKind::Character);
        assert_eq!(identity.character_id, CharacterId(90000001));
        assert_eq!(identity.character_name, "Pilot");
        assert_eq!(identity.refresh_token, "refresh-90000001");
        assert_eq!(service.store().challenge_count(), 0);

        let replay = service
            .complete_exchange(&request.state, "good-code")
            .await
            .expect_err("replayed state");
        assert!(matches!(replay, EsiError::InvalidState));
        assert_eq!(service.store().all_identities().len(), 1);
    }

    #[tokio::test]
    async fn unknown_state_is_rejected_without_touching_the_store() {
        let service = service(MockSsoClient::granting(1, "Pilot", &[CHARACTER_ASSETS_SCOPE]));
        service
            .generate_challenge(&user(), ScopeProfile::Character)
            .await
            .expect("challenge");

        let err = service
            .complete_exchange("forged-state", "good-code")
            .await
            .expect_err("forged state");

        assert!(matches!(err, EsiError::InvalidState));
        assert_eq!(service.store().challenge_count(), 1);
        assert!(service.store().all_identities().is_empty());
    }

    #[tokio::test]
    async fn rejected_code_keeps_the_challenge() {
        let service = service(MockSsoClient::granting(1, "Pilot", &[CHARACTER_ASSETS_SCOPE]));
        let state = service
            .generate_challenge(&user(), ScopeProfile::Character)
            .await
            .expect("challenge");

        let err = service
            .complete_exchange(&state, "bad-code")
            .await
            .expect_err("bad code");

        assert!(matches!(err, EsiError::GrantExchange(_)));
        assert_eq!(service.store().challenge_count(), 1);
        assert!(service.store().all_identities().is_empty());
    }

    #[tokio::test]
    async fn grant_without_profile_scope_is_rejected() {
        let service = service(MockSsoClient::granting(1, "Pilot", &[CHARACTER_ASSETS_SCOPE]));
        let state = service
            .generate_challenge(&user(), ScopeProfile::Corporation)
            .await
            .expect("challenge");

        let err = service
            .complete_exchange(&state, "good-code")
            .await
            .expect_err("missing corporation scope");

        let EsiError::MissingRequiredScopes { missing } = err else {
            panic!("expected missing scopes, got {err:?}");
        };
        assert_eq!(missing, vec![CORPORATION_ASSETS_SCOPE]);
        assert!(service.store().all_identities().is_empty());
    }

    #[tokio::test]
    async fn corporation_exchange_records_the_corporation() {
        let mut client =
            MockSsoClient::granting(90000002, "Director", &[CORPORATION_ASSETS_SCOPE]);
        client.corporation_id = Some(CorporationId(98000001));
        let service = service(client);
        let state = service
            .generate_challenge(&user(), ScopeProfile::Corporation)
            .await
            .expect("challenge");

        let identity = service
            .complete_exchange(&state, "good-code")
            .await
            .expect("exchange");

        assert_eq!(
            identity.kind,
            IdentityKind::Corporation {
                corporation_id: CorporationId(98000001)
            }
        );
    }

    #[tokio::test]
    async fn reauthorizing_updates_the_existing_identity() {
        let service = service(MockSsoClient::granting(
            90000001,
            "Pilot Renamed",
            &[CHARACTER_ASSETS_SCOPE],
        ));
        for _ in 0..2 {
            let state = service
                .generate_challenge(&user(), ScopeProfile::Character)
                .await
                .expect("challenge");
            service
                .complete_exchange(&state, "good-code")
                .await
                .expect("exchange");
        }

        let identities = service.identities(&user()).await.expect("identities");
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].character_name, "Pilot Renamed");
    }

    #[tokio::test]
    async fn credential_uses_the_identity_profile_and_stores_rotation() {
        let corporation = IdentityKind::Corporation {
            corporation_id: CorporationId(98000001),
        };
        let client = MockSsoClient {
            rotations: HashMap::from([("old-refresh".to_owned(), "new-refresh".to_owned())]),
            ..MockSsoClient::default()
        };
        let service = AuthService::with_clock(
            client,
            MemoryStore::with_identities(vec![stored(1, corporation, "old-refresh")]),
            FixedClock { now: ts(1_000) },
        );
        let identity = service.identities(&user()).await.expect("identities")[0].clone();

        let credential = service
            .ephemeral_credential(&identity)
            .await
            .expect("credential");

        assert_eq!(credential.access_token(), "access-old-refresh");
        assert_eq!(credential.kind, corporation);
        assert_eq!(
            service.store().all_identities()[0].refresh_token,
            "new-refresh"
        );
        assert_eq!(
            service.client.refresh_calls.lock().expect("lock").as_slice(),
            &[(ScopeProfile::Corporation, "old-refresh".to_owned())]
        );
    }

    #[tokio::test]
    async fn rejected_refresh_token_is_unauthorized_and_kept_until_reported() {
        let client = MockSsoClient {
            rejected_refresh_tokens: HashSet::from(["dead".to_owned()]),
            ..MockSsoClient::default()
        };
        let service = AuthService::with_clock(
            client,
            MemoryStore::with_identities(vec![stored(1, IdentityKind::Character, "dead")]),
            FixedClock { now: ts(1_000) },
        );
        let identity = service.identities(&user()).await.expect("identities")[0].clone();

        let err = service
            .ephemeral_credential(&identity)
            .await
            .expect_err("refresh rejected");

        assert!(err.is_unauthorized());
        assert_eq!(service.store().all_identities().len(), 1);
    }

    #[tokio::test]
    async fn unauthorized_policy_is_applied_per_kind() {
        let corporation = IdentityKind::Corporation {
            corporation_id: CorporationId(98000001),
        };
        let service = AuthService::with_clock(
            MockSsoClient::default(),
            MemoryStore::with_identities(vec![
                stored(1, IdentityKind::Character, "a"),
                stored(2, corporation, "b"),
            ]),
            FixedClock { now: ts(1_000) },
        );
        let identities = service.identities(&user()).await.expect("identities");
        let rejection = || EsiError::CredentialRejected {
            endpoint: "/assets/".to_owned(),
            status: 403,
        };

        let err = service
            .report_unauthorized(&identities[0], rejection())
            .await
            .expect_err("characters propagate by default");
        assert!(err.is_unauthorized());
        service
            .report_unauthorized(&identities[1], rejection())
            .await
            .expect("corporations are deauthorized by default");

        let remaining = service.identities(&user()).await.expect("identities");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].kind, IdentityKind::Character);

        let service = service.with_policy(UnauthorizedPolicy {
            character: FailurePolicy::Deauthorize,
            corporation: FailurePolicy::Propagate,
        });
        service
            .report_unauthorized(&remaining[0], rejection())
            .await
            .expect("characters deauthorized when configured");
        assert!(service.identities(&user()).await.expect("identities").is_empty());
    }

    #[tokio::test]
    async fn revoke_all_removes_every_identity_of_the_user() {
        let service = AuthService::with_clock(
            MockSsoClient::default(),
            MemoryStore::with_identities(vec![
                stored(1, IdentityKind::Character, "a"),
                stored(2, IdentityKind::Character, "b"),
            ]),
            FixedClock { now: ts(1_000) },
        );

        assert_eq!(service.revoke_all(&user()).await.expect("revoke"), 2);
        assert!(service.identities(&user()).await.expect("identities").is_empty());
    }
}
