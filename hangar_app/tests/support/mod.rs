use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use hangar_app::HangarApp;
use hangar_core::{
    CharacterId, CorporationId, ItemId, RawAsset, ScopeProfile, TypeId, UserId,
};
use hangar_esi::{
    AggregatorConfig, EphemeralCredential, EsiApiClient, EsiError, EsiResult, GrantedTokens,
    RefreshedTokens, SsoClient,
    config::{CHARACTER_ASSETS_SCOPE, CORPORATION_ASSETS_SCOPE},
};
use hangar_store::HangarStore;
use tempfile::TempDir;

pub const STATION: i64 = 60003760;
pub const RIFTER: TypeId = TypeId(587);
pub const AUTOCANNON: TypeId = TypeId(2889);
pub const DAMAGE_CONTROL: TypeId = TypeId(2048);
pub const CORP: CorporationId = CorporationId(98000001);

pub const RIFTER_REQUIREMENTS: &str = r#"
[Rifter]
"220mm AutoCannon II" = 1
"Damage Control II" = 1
"#;

/// Code exchange and refresh keyed by the authorization code: `code-<id>`
/// links character `<id>` with refresh token `refresh-<id>`.
#[derive(Default)]
pub struct MockSso {
    pub corporations: HashMap<CharacterId, CorporationId>,
    pub revoked_refresh_tokens: HashSet<String>,
}

#[async_trait]
impl SsoClient for MockSso {
    fn authorize_url(&self, profile: ScopeProfile, state: &str) -> EsiResult<String> {
        Ok(format!(
            "https://login.test/v2/oauth/authorize?profile={profile}&state={state}"
        ))
    }

    async fn exchange_code(&self, code: &str) -> EsiResult<GrantedTokens> {
        let character_id = code
            .strip_prefix("code-")
            .and_then(|id| id.parse::<u64>().ok())
            .ok_or_else(|| EsiError::message("invalid_grant"))?;

        Ok(GrantedTokens {
            character_id: CharacterId(character_id),
            character_name: format!("Pilot {character_id}"),
            scopes: vec![
                CHARACTER_ASSETS_SCOPE.to_owned(),
                CORPORATION_ASSETS_SCOPE.to_owned(),
            ],
            access_token: "access".to_owned(),
            refresh_token: format!("refresh-{character_id}"),
        })
    }

    async fn refresh(
        &self,
        _profile: ScopeProfile,
        refresh_token: &str,
    ) -> EsiResult<RefreshedTokens> {
        if self.revoked_refresh_tokens.contains(refresh_token) {
            return Err(EsiError::CredentialRejected {
                endpoint: "sso token endpoint".to_owned(),
                status: 400,
            });
        }
        Ok(RefreshedTokens {
            access_token: format!("access-{refresh_token}"),
            refresh_token: refresh_token.to_owned(),
        })
    }

    async fn character_corporation(&self, character_id: CharacterId) -> EsiResult<CorporationId> {
        self.corporations
            .get(&character_id)
            .copied()
            .ok_or_else(|| EsiError::message("character has no corporation"))
    }
}

pub enum Listing {
    Assets(Vec<RawAsset>),
    Rejected,
}

/// Asset listings keyed by endpoint path.
#[derive(Default)]
pub struct MockApi {
    pub listings: HashMap<String, Listing>,
}

impl MockApi {
    pub fn with_listing(mut self, path: &str, listing: Listing) -> Self {
        self.listings.insert(path.to_owned(), listing);
        self
    }
}

#[async_trait]
impl EsiApiClient for MockApi {
    async fn character_corporation(&self, _character_id: CharacterId) -> EsiResult<CorporationId> {
        Err(EsiError::message("unused"))
    }

    async fn corporation_name(&self, corporation_id: CorporationId) -> EsiResult<String> {
        Ok(format!("Corporation {corporation_id}"))
    }

    async fn assets(&self, credential: &EphemeralCredential) -> EsiResult<Vec<RawAsset>> {
        let path = credential.assets_path();
        match self.listings.get(&path) {
            Some(Listing::Assets(assets)) => Ok(assets.clone()),
            Some(Listing::Rejected) => Err(EsiError::CredentialRejected {
                endpoint: path,
                status: 403,
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn type_names(&self, type_ids: &[TypeId]) -> EsiResult<HashMap<TypeId, String>> {
        let known = HashMap::from([
            (RIFTER, "Rifter"),
            (AUTOCANNON, "220mm AutoCannon II"),
            (DAMAGE_CONTROL, "Damage Control II"),
        ]);
        Ok(type_ids
            .iter()
            .filter_map(|type_id| known.get(type_id).map(|name| (*type_id, (*name).to_owned())))
            .collect())
    }
}

/// A Rifter with the given fittings, hull item id `item_id`.
pub fn rifter(item_id: i64, fittings: &[(TypeId, &str)]) -> Vec<RawAsset> {
    let mut assets = vec![asset(item_id, RIFTER, STATION, "Hangar")];
    for (offset, (type_id, flag)) in fittings.iter().enumerate() {
        assets.push(asset(item_id + 1 + offset as i64, *type_id, item_id, flag));
    }
    assets
}

fn asset(item_id: i64, type_id: TypeId, location_id: i64, flag: &str) -> RawAsset {
    RawAsset {
        item_id: ItemId(item_id),
        type_id,
        location_id,
        location_flag: flag.to_owned(),
        quantity: 1,
        is_singleton: true,
    }
}

pub struct TestHarness {
    _temp_dir: TempDir,
    db_path: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let db_path = temp_dir.path().join("hangar.sqlite");
        Self {
            _temp_dir: temp_dir,
            db_path,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub async fn app(&self, sso: MockSso, api: MockApi) -> HangarApp<MockSso, MockApi> {
        let store = HangarStore::connect(self.db_path())
            .await
            .expect("connect store");
        HangarApp::from_parts(store, sso, api, AggregatorConfig::default())
    }
}

pub fn user() -> UserId {
    UserId::new("discord:1234")
}

/// Runs the authorization round trip for `character_id` under `profile`.
pub async fn link(
    app: &HangarApp<MockSso, MockApi>,
    user_id: &UserId,
    profile: ScopeProfile,
    character_id: u64,
) {
    let request = app
        .begin_authorization(user_id, profile)
        .await
        .expect("begin authorization");
    app.complete_authorization(&request.state, &format!("code-{character_id}"))
        .await
        .expect("complete authorization");
}
