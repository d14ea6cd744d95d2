use std::{collections::VecDeque, time::Duration};

use hangar_core::{AssetSnapshot, Identity, IdentityKind, IdentityStore, UserId, referenced_type_ids};
use tokio::time::timeout;

use crate::{
    EsiError, EsiResult,
    api::EsiApiClient,
    auth::{AuthService, Clock, FailurePolicy, SystemClock},
    client::SsoClient,
};

#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    /// Upper bound on one identity's refresh, listing and naming round trip.
    pub fetch_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Deauthorized,
    TimedOut,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedIdentity {
    pub label: String,
    pub is_corporation: bool,
    pub reason: SkipReason,
}

pub struct AssetAggregator<'a, C, S, A, T = SystemClock>
where
    C: SsoClient,
    S: IdentityStore,
    A: EsiApiClient,
    T: Clock,
{
    auth: &'a AuthService<C, S, T>,
    api: &'a A,
    config: AggregatorConfig,
}

impl<'a, C, S, A, T> AssetAggregator<'a, C, S, A, T>
where
    C: SsoClient,
    S: IdentityStore,
    A: EsiApiClient,
    T: Clock,
{
    pub fn new(auth: &'a AuthService<C, S, T>, api: &'a A, config: AggregatorConfig) -> Self {
        Self { auth, api, config }
    }

    /// Starts a lazy walk over the user's identities, characters first.
    pub async fn collect(&self, user_id: &UserId) -> EsiResult<AssetCollection<'a, C, S, A, T>> {
        let identities = self.auth.identities(user_id).await?;
        log::debug!(
            "collecting assets for user {user_id} across {} identities",
            identities.len()
        );

        Ok(AssetCollection {
            auth: self.auth,
            api: self.api,
            config: self.config.clone(),
            total: identities.len(),
            pending: identities.into(),
            skipped: Vec::new(),
        })
    }
}

/// One snapshot per identity, fetched only when asked for.
///
/// A fatal failure ends the walk: later identities are never contacted and
/// `next` keeps returning `Ok(None)` afterwards.
pub struct AssetCollection<'a, C, S, A, T = SystemClock>
where
    C: SsoClient,
    S: IdentityStore,
    A: EsiApiClient,
    T: Clock,
{
    auth: &'a AuthService<C, S, T>,
    api: &'a A,
    config: AggregatorConfig,
    total: usize,
    pending: VecDeque<Identity>,
    skipped: Vec<SkippedIdentity>,
}

impl<C, S, A, T> AssetCollection<'_, C, S, A, T>
where
    C: SsoClient,
    S: IdentityStore,
    A: EsiApiClient,
    T: Clock,
{
    /// True when the user had no identities at all.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn skipped(&self) -> &[SkippedIdentity] {
        &self.skipped
    }

    pub async fn next(&mut self) -> EsiResult<Option<AssetSnapshot>> {
        while let Some(identity) = self.pending.pop_front() {
            let fetched = match timeout(self.config.fetch_timeout, self.fetch(&identity)).await {
                Ok(result) => result,
                Err(_) => Err(EsiError::Timeout(self.config.fetch_timeout)),
            };

            match fetched {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(err) => match self.recover(&identity, err).await {
                    Ok(skipped) => self.skipped.push(skipped),
                    Err(fatal) => {
                        self.pending.clear();
                        return Err(fatal);
                    }
                },
            }
        }

        Ok(None)
    }

    /// Drains the walk, stopping at the first fatal failure.
    pub async fn collect_all(&mut self) -> EsiResult<Vec<AssetSnapshot>> {
        let mut snapshots = Vec::new();
        while let Some(snapshot) = self.next().await? {
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }

    async fn fetch(&self, identity: &Identity) -> EsiResult<AssetSnapshot> {
        let credential = self.auth.ephemeral_credential(identity).await?;
        let assets = self.api.assets(&credential).await?;

        let type_ids: Vec<_> = referenced_type_ids(&assets).into_iter().collect();
        let type_names = self.api.type_names(&type_ids).await?;

        let owner_name = match identity.kind {
            IdentityKind::Character => identity.character_name.clone(),
            IdentityKind::Corporation { corporation_id } => {
                self.api.corporation_name(corporation_id).await?
            }
        };

        Ok(AssetSnapshot::from_assets(
            owner_name,
            identity.is_corporation(),
            &assets,
            &type_names,
        ))
    }

    async fn recover(&self, identity: &Identity, err: EsiError) -> EsiResult<SkippedIdentity> {
        let skipped = |reason| SkippedIdentity {
            label: identity.label(),
            is_corporation: identity.is_corporation(),
            reason,
        };

        if err.is_unauthorized() {
            return match self.auth.report_unauthorized(identity, err).await {
                Ok(()) => Ok(skipped(SkipReason::Deauthorized)),
                Err(err) => Err(fatal(identity, err)),
            };
        }

        let skippable = self.auth.policy().for_kind(identity.kind) == FailurePolicy::Deauthorize;
        if matches!(err, EsiError::Timeout(_)) && skippable {
            log::warn!("skipping {}: {}", identity.label(), err.display_chain());
            return Ok(skipped(SkipReason::TimedOut));
        }

        Err(fatal(identity, err))
    }
}

fn fatal(identity: &Identity, err: EsiError) -> EsiError {
    log::error!(
        "asset fetch for {} failed: {}",
        identity.label(),
        err.display_chain()
    );
    EsiError::AggregationFatal {
        identity: identity.label(),
        source: Box::new(err),
    }
}
