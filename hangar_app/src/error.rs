#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("store error: {0}")]
    Store(#[from] hangar_store::StoreError),

    #[error("esi error: {0}")]
    Esi(#[from] hangar_esi::EsiError),

    #[error("{0}")]
    InvalidRequirements(#[from] hangar_core::RequirementParseError),
}
