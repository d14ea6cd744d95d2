use async_trait::async_trait;
use hangar_core::{CharacterId, CorporationId, ScopeProfile};
use rfesi::prelude::{Esi, EsiBuilder, EsiError as RfesiError, TokenClaims};
use serde::Deserialize;
use url::Url;

use crate::{
    EsiError, EsiResult,
    api::EsiApiClient,
    config::{AUTHORIZE_URL, EsiConfig},
    esi_client::ReqwestEsiClient,
};

const TOKEN_ENDPOINT: &str = "sso token endpoint";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantedTokens {
    pub character_id: CharacterId,
    pub character_name: String,
    pub scopes: Vec<String>,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// The authorization provider: authorize URL, code exchange, refresh and
/// character introspection.
#[async_trait]
pub trait SsoClient: Send + Sync {
    fn authorize_url(&self, profile: ScopeProfile, state: &str) -> EsiResult<String>;

    async fn exchange_code(&self, code: &str) -> EsiResult<GrantedTokens>;

    async fn refresh(&self, profile: ScopeProfile, refresh_token: &str)
    -> EsiResult<RefreshedTokens>;

    async fn character_corporation(&self, character_id: CharacterId) -> EsiResult<CorporationId>;
}

/// EVE SSO through `rfesi`. Every call builds its own `Esi` for the requested
/// scope profile, so no token state outlives a call.
pub struct RfesiSsoClient {
    config: EsiConfig,
    public: ReqwestEsiClient,
}

impl RfesiSsoClient {
    pub fn new(config: &EsiConfig) -> EsiResult<Self> {
        config.validate()?;

        Ok(Self {
            config: config.clone(),
            public: ReqwestEsiClient::new(config)?,
        })
    }

    fn build_esi(&self, profile: ScopeProfile) -> EsiResult<Esi> {
        let esi = EsiBuilder::new()
            .user_agent(&self.config.user_agent)
            .client_id(&self.config.client_id)
            .client_secret(&self.config.client_secret)
            .callback_url(&self.config.callback_url)
            .scope(&EsiConfig::scopes_for_esi(profile))
            .build()?;
        Ok(esi)
    }
}

#[async_trait]
impl SsoClient for RfesiSsoClient {
    fn authorize_url(&self, profile: ScopeProfile, state: &str) -> EsiResult<String> {
        let scopes = EsiConfig::scopes_for_esi(profile);
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("response_type", "code"),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("scope", scopes.as_str()),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> EsiResult<GrantedTokens> {
        let mut esi = self.build_esi(ScopeProfile::Character)?;
        let claims = esi
            .authenticate(code, None)
            .await?
            .ok_or(EsiError::MissingClaims)?;

        let character_id = parse_character_id(&claims)?;
        let scopes = parse_scopes(&claims)?;

        Ok(GrantedTokens {
            character_id,
            character_name: claims.name,
            scopes,
            access_token: read_access_token(&esi)?,
            refresh_token: read_refresh_token(&esi)?,
        })
    }

    async fn refresh(
        &self,
        profile: ScopeProfile,
        refresh_token: &str,
    ) -> EsiResult<RefreshedTokens> {
        let mut esi = self.build_esi(profile)?;
        esi.refresh_access_token(Some(refresh_token))
            .await
            .map_err(refresh_error)?;

        Ok(RefreshedTokens {
            access_token: read_access_token(&esi)?,
            refresh_token: read_refresh_token(&esi)?,
        })
    }

    async fn character_corporation(&self, character_id: CharacterId) -> EsiResult<CorporationId> {
        self.public.character_corporation(character_id).await
    }
}

/// The token endpoint answers `invalid_grant` (400) or 401/403 once a
/// refresh token is revoked or expired. Everything else, rate limits
/// included, is a provider or transport failure.
fn refresh_error(err: RfesiError) -> EsiError {
    match err {
        RfesiError::InvalidStatusCode(status @ (400 | 401 | 403)) => EsiError::CredentialRejected {
            endpoint: TOKEN_ENDPOINT.to_owned(),
            status,
        },
        other => EsiError::Rfesi(other),
    }
}

fn read_access_token(esi: &Esi) -> EsiResult<String> {
    esi.access_token.clone().ok_or(EsiError::MissingAccessToken)
}

fn read_refresh_token(esi: &Esi) -> EsiResult<String> {
    esi.refresh_token
        .clone()
        .ok_or(EsiError::MissingRefreshToken)
}

fn parse_character_id(claims: &TokenClaims) -> EsiResult<CharacterId> {
    let parts: Vec<&str> = claims.sub.split(':').collect();
    if parts.len() != 3 || parts[0] != "CHARACTER" || parts[1] != "EVE" {
        return Err(EsiError::InvalidTokenSubject(claims.sub.clone()));
    }

    parts[2]
        .parse::<u64>()
        .map(CharacterId)
        .map_err(|_| EsiError::InvalidTokenSubject(claims.sub.clone()))
}

fn parse_scopes(claims: &TokenClaims) -> EsiResult<Vec<String>> {
    match claims.scp.clone() {
        None => Ok(Vec::new()),
        Some(value) => {
            let parsed: ScopeClaim = serde_json::from_value(value.clone())
                .map_err(|_| EsiError::InvalidScopeClaim(value.to_string()))?;
            Ok(match parsed {
                ScopeClaim::One(single) => vec![single],
                ScopeClaim::Many(many) => many,
            })
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScopeClaim {
    One(String),
    Many(Vec<String>),
}
