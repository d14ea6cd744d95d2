mod app;
mod error;
mod report;

pub use app::{HangarApp, LinkedIdentity, RequirementsUpdate};
pub use error::AppError;
pub use report::{BuyReport, CheckReport, DeficiencySection, StateDocument, StateReport};
