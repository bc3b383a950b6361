use chrono::{DateTime, Utc};

use crate::{
    error::Result,
    storage::models::{PassRecord, ProviderRole, ProviderStats, VerificationEvent},
};

/// Storage collaborator consumed by the verification runner.
///
/// Every call is independently fallible; the runner decides how a failure
/// affects the rest of the pass.
#[cfg_attr(test, mockall::automock)]
pub trait ProviderStore: Send {
    /// Fresh snapshot of every provider of `role`, with completed booking
    /// counts and average ratings aggregated at read time.
    fn list_providers_with_completed_booking_counts(
        &self,
        role: ProviderRole,
    ) -> Result<Vec<ProviderStats>>;

    fn set_verified_at(&self, provider_id: &str, verified_at: Option<DateTime<Utc>>) -> Result<()>;

    fn record_event(&self, event: &VerificationEvent) -> Result<()>;

    fn record_pass(&self, pass: &PassRecord) -> Result<()>;
}
