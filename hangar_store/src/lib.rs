mod error;
mod identity_store;

pub use error::StoreError;
pub use identity_store::HangarStore;
