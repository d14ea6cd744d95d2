use std::fmt;

use hangar_core::ScopeProfile;

use crate::{EsiError, EsiResult};

pub const AUTHORIZE_URL: &str = "https://login.eveonline.com/v2/oauth/authorize";
pub const DEFAULT_ESI_BASE_URL: &str = "https://esi.evetech.net/latest";

pub const CHARACTER_ASSETS_SCOPE: &str = "esi-assets.read_assets.v1";
pub const CORPORATION_ASSETS_SCOPE: &str = "esi-assets.read_corporation_assets.v1";

#[derive(Clone, PartialEq, Eq)]
pub struct EsiConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    pub user_agent: String,
    pub esi_base_url: String,
}

impl EsiConfig {
    pub fn validate(&self) -> EsiResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(EsiError::InvalidConfig("CCP_CLIENT_ID must be set"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(EsiError::InvalidConfig("CCP_SECRET_KEY must be set"));
        }
        if self.callback_url.trim().is_empty() {
            return Err(EsiError::InvalidConfig("CCP_REDIRECT_URI must be set"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(EsiError::InvalidConfig("user_agent must be set"));
        }
        if self.esi_base_url.trim().is_empty() {
            return Err(EsiError::InvalidConfig("esi_base_url must be set"));
        }
        Ok(())
    }

    pub fn scopes_for(profile: ScopeProfile) -> &'static [&'static str] {
        match profile {
            ScopeProfile::Character => &[CHARACTER_ASSETS_SCOPE],
            ScopeProfile::Corporation => &[CORPORATION_ASSETS_SCOPE],
        }
    }

    pub fn scopes_for_esi(profile: ScopeProfile) -> String {
        Self::scopes_for(profile).join(" ")
    }
}

impl fmt::Debug for EsiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EsiConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("callback_url", &self.callback_url)
            .field("user_agent", &self.user_agent)
            .field("esi_base_url", &self.esi_base_url)
            .finish()
    }
}
