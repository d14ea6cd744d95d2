use std::path::Path;

use hangar_core::{BuyList, CharacterId, Identity, RequirementSpec, ScopeProfile, UserId};
use hangar_esi::{
    AggregatorConfig, AssetAggregator, AuthService, AuthorizationRequest, EsiApiClient, EsiConfig,
    ReqwestEsiClient, RfesiSsoClient, SsoClient, UnauthorizedPolicy,
};
use hangar_store::HangarStore;

use crate::{
    AppError,
    report::{BuyReport, CheckReport, DeficiencySection, StateDocument, StateReport},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkedIdentity {
    pub character_id: CharacterId,
    pub character_name: String,
    pub corporation_name: Option<String>,
}

impl LinkedIdentity {
    pub fn display_name(&self) -> String {
        match &self.corporation_name {
            Some(corporation) => format!("{corporation} (via {})", self.character_name),
            None => self.character_name.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequirementsUpdate {
    Stored { ship_types: usize },
    NoLinkedIdentities,
}

/// User level actions over the identity store, the session manager and the
/// asset aggregator.
pub struct HangarApp<C = RfesiSsoClient, A = ReqwestEsiClient>
where
    C: SsoClient,
    A: EsiApiClient,
{
    auth: AuthService<C, HangarStore>,
    api: A,
    aggregator: AggregatorConfig,
}

impl HangarApp {
    pub async fn connect(
        database_path: impl AsRef<Path>,
        esi: &EsiConfig,
        aggregator: AggregatorConfig,
    ) -> Result<Self, AppError> {
        let store = HangarStore::connect(database_path).await?;
        let client = RfesiSsoClient::new(esi)?;
        let api = ReqwestEsiClient::new(esi)?;
        Ok(Self::from_parts(store, client, api, aggregator))
    }
}

impl<C, A> HangarApp<C, A>
where
    C: SsoClient,
    A: EsiApiClient,
{
    pub fn from_parts(store: HangarStore, client: C, api: A, aggregator: AggregatorConfig) -> Self {
        Self {
            auth: AuthService::new(client, store),
            api,
            aggregator,
        }
    }

    pub fn with_policy(mut self, policy: UnauthorizedPolicy) -> Self {
        self.auth = self.auth.with_policy(policy);
        self
    }

    pub fn store(&self) -> &HangarStore {
        self.auth.store()
    }

    pub async fn begin_authorization(
        &self,
        user_id: &UserId,
        profile: ScopeProfile,
    ) -> Result<AuthorizationRequest, AppError> {
        Ok(self.auth.begin_authorization(user_id, profile).await?)
    }

    pub async fn complete_authorization(
        &self,
        state: &str,
        code: &str,
    ) -> Result<Identity, AppError> {
        Ok(self.auth.complete_exchange(state, code).await?)
    }

    pub async fn linked_identities(&self, user_id: &UserId) -> Result<Vec<LinkedIdentity>, AppError> {
        let identities = self.auth.identities(user_id).await?;

        let mut linked = Vec::with_capacity(identities.len());
        for identity in identities {
            let corporation_name = match identity.kind.corporation_id() {
                Some(corporation_id) => Some(self.api.corporation_name(corporation_id).await?),
                None => None,
            };
            linked.push(LinkedIdentity {
                character_id: identity.character_id,
                character_name: identity.character_name,
                corporation_name,
            });
        }

        Ok(linked)
    }

    pub async fn revoke(&self, user_id: &UserId) -> Result<u64, AppError> {
        Ok(self.auth.revoke_all(user_id).await?)
    }

    /// Validates and stores a requirement document, replacing any earlier one.
    /// Users without linked identities are turned away.
    pub async fn set_requirements(
        &self,
        user_id: &UserId,
        document: &str,
    ) -> Result<RequirementsUpdate, AppError> {
        let spec = RequirementSpec::parse(document)?;

        if self.auth.identities(user_id).await?.is_empty() {
            return Ok(RequirementsUpdate::NoLinkedIdentities);
        }

        self.store().set_requirements(user_id, document).await?;
        let ship_types = spec.ships().count();
        log::info!("user {user_id} set requirements for {ship_types} ship types");
        Ok(RequirementsUpdate::Stored { ship_types })
    }

    pub async fn requirements(&self, user_id: &UserId) -> Result<Option<String>, AppError> {
        Ok(self.store().requirements(user_id).await?)
    }

    pub async fn current_state(&self, user_id: &UserId) -> Result<StateReport, AppError> {
        let aggregator = self.aggregator();
        let mut collection = aggregator.collect(user_id).await?;
        if collection.is_empty() {
            return Ok(StateReport::NoIdentities);
        }

        let mut documents = Vec::new();
        while let Some(snapshot) = collection.next().await? {
            documents.push(StateDocument {
                document: RequirementSpec::from_snapshot(&snapshot).to_document()?,
                owner_name: snapshot.owner_name,
                is_corporation: snapshot.is_corporation,
            });
        }

        Ok(StateReport::Exported {
            documents,
            skipped: collection.skipped().to_vec(),
        })
    }

    pub async fn check(&self, user_id: &UserId) -> Result<CheckReport, AppError> {
        let spec = self.requirement_spec(user_id).await?;
        let aggregator = self.aggregator();
        let mut collection = aggregator.collect(user_id).await?;
        if collection.is_empty() {
            return Ok(CheckReport::NoIdentities);
        }
        let Some(spec) = spec else {
            return Ok(CheckReport::NoRequirementSet);
        };

        let mut sections = Vec::new();
        while let Some(snapshot) = collection.next().await? {
            let deficiencies: Vec<_> = spec.check(&snapshot).collect();
            log::debug!(
                "{} deficiencies for {}",
                deficiencies.len(),
                snapshot.owner_name
            );
            sections.push(DeficiencySection {
                owner_name: snapshot.owner_name,
                is_corporation: snapshot.is_corporation,
                deficiencies,
            });
        }

        Ok(CheckReport::Checked {
            sections,
            skipped: collection.skipped().to_vec(),
        })
    }

    pub async fn buy(&self, user_id: &UserId) -> Result<BuyReport, AppError> {
        let spec = self.requirement_spec(user_id).await?;
        let aggregator = self.aggregator();
        let mut collection = aggregator.collect(user_id).await?;
        if collection.is_empty() {
            return Ok(BuyReport::NoIdentities);
        }
        let Some(spec) = spec else {
            return Ok(BuyReport::NoRequirementSet);
        };

        let mut buy_list = BuyList::new();
        while let Some(snapshot) = collection.next().await? {
            buy_list = spec.accumulate_buy_list(&snapshot, buy_list);
        }

        Ok(BuyReport::Accumulated {
            buy_list,
            skipped: collection.skipped().to_vec(),
        })
    }

    fn aggregator(&self) -> AssetAggregator<'_, C, HangarStore, A> {
        AssetAggregator::new(&self.auth, &self.api, self.aggregator.clone())
    }

    async fn requirement_spec(&self, user_id: &UserId) -> Result<Option<RequirementSpec>, AppError> {
        match self.requirements(user_id).await? {
            Some(document) => Ok(Some(RequirementSpec::parse(&document)?)),
            None => Ok(None),
        }
    }
}
