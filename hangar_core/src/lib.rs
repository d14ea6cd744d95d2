pub mod assets;
pub mod identity;
pub mod ids;
pub mod requirements;
pub mod time;

pub use assets::{AssetSnapshot, RawAsset, ShipHoldings, referenced_type_ids};
pub use identity::{
    Challenge, Identity, IdentityGrant, IdentityId, IdentityKind, IdentityStore, ScopeProfile,
    characters_first,
};
pub use ids::{CharacterId, CorporationId, ItemId, TypeId, UserId};
pub use requirements::{BuyList, Deficiency, RequirementParseError, RequirementSpec};
pub use time::Timestamp;
