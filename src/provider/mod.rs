//! Provider onboarding: applications, approval and blocking

mod model;
mod service;

pub use model::{
    ApplicationServiceItem, ApplicationStatus, ApplyRequest, DecideApplicationRequest, Decision,
    ProviderApplication, ProviderDetails, SetActiveRequest, DEFAULT_REJECTION_REASON,
};
pub use service::{ProviderError, ProviderService};
