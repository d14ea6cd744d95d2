mod types;

use std::collections::HashMap;

use async_trait::async_trait;
use hangar_core::{CharacterId, CorporationId, RawAsset, TypeId};

pub(crate) use types::{CharacterPublicInfo, CorporationPublicInfo, EsiAsset, UniverseName};

use crate::{EsiResult, auth::EphemeralCredential};

/// The ESI REST endpoints the asset aggregation needs.
#[async_trait]
pub trait EsiApiClient: Send + Sync {
    async fn character_corporation(&self, character_id: CharacterId) -> EsiResult<CorporationId>;

    async fn corporation_name(&self, corporation_id: CorporationId) -> EsiResult<String>;

    /// Every page of the asset listing the credential's identity can see.
    async fn assets(&self, credential: &EphemeralCredential) -> EsiResult<Vec<RawAsset>>;

    /// Names for inventory types. Ids the provider does not know are absent
    /// from the result.
    async fn type_names(&self, type_ids: &[TypeId]) -> EsiResult<HashMap<TypeId, String>>;
}
