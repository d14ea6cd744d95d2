use hangar_core::{ItemId, RawAsset, TypeId};
use serde::Deserialize;

/// `GET /characters/{id}/assets/` and `GET /corporations/{id}/assets/` entry.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct EsiAsset {
    pub item_id: i64,
    pub type_id: i32,
    pub location_id: i64,
    pub location_flag: String,
    pub quantity: i64,
    #[serde(default)]
    pub is_singleton: bool,
}

impl From<EsiAsset> for RawAsset {
    fn from(asset: EsiAsset) -> Self {
        Self {
            item_id: ItemId(asset.item_id),
            type_id: TypeId(asset.type_id),
            location_id: asset.location_id,
            location_flag: asset.location_flag,
            // Blueprint copies report -2 and originals -1 for a single item.
            quantity: u64::try_from(asset.quantity).unwrap_or(1),
            is_singleton: asset.is_singleton,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct CharacterPublicInfo {
    pub corporation_id: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct CorporationPublicInfo {
    pub name: String,
}

/// `POST /universe/names/` entry.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct UniverseName {
    pub id: i64,
    pub name: String,
    pub category: String,
}
