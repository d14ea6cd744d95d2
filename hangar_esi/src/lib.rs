pub mod aggregator;
pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod esi_client;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{AggregatorConfig, AssetAggregator, AssetCollection, SkipReason, SkippedIdentity};
pub use api::EsiApiClient;
pub use auth::{
    AuthService, AuthorizationRequest, Clock, EphemeralCredential, FailurePolicy, SystemClock,
    UnauthorizedPolicy,
};
pub use client::{GrantedTokens, RefreshedTokens, RfesiSsoClient, SsoClient};
pub use config::EsiConfig;
pub use errors::{EsiError, EsiResult};
pub use esi_client::ReqwestEsiClient;
pub use hangar_core::{CharacterId, CorporationId, TypeId};
