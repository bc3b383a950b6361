use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Provider account kinds that carry a verification badge
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    Worker,
    Company,
}

impl ProviderRole {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ProviderRole::Worker => "WORKER",
            ProviderRole::Company => "COMPANY",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "WORKER" => Some(ProviderRole::Worker),
            "COMPANY" => Some(ProviderRole::Company),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderRole::Worker => write!(f, "worker"),
            ProviderRole::Company => write!(f, "company"),
        }
    }
}

impl std::str::FromStr for ProviderRole {
    type Err = crate::error::VerifyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "worker" => Ok(ProviderRole::Worker),
            "company" => Ok(ProviderRole::Company),
            other => Err(crate::error::VerifyError::InvalidRole(other.to_string())),
        }
    }
}

/// Booking lifecycle states; only `Completed` counts towards verification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Read-only snapshot of a provider's aggregate statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub id: String,
    pub completed_bookings: u32,
    /// `None` when the provider has no reviews yet
    pub average_rating: Option<f64>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl ProviderStats {
    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }

    /// Missing ratings count as zero
    pub fn rating(&self) -> f64 {
        self.average_rating.unwrap_or(0.0)
    }
}

/// Provider row with display fields, used by listing commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: String,
    pub name: String,
    pub role: ProviderRole,
    pub stats: ProviderStats,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VerificationAction {
    Granted,
    Revoked,
}

impl std::fmt::Display for VerificationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationAction::Granted => write!(f, "Granted"),
            VerificationAction::Revoked => write!(f, "Revoked"),
        }
    }
}

impl std::str::FromStr for VerificationAction {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Granted" => Ok(VerificationAction::Granted),
            "Revoked" => Ok(VerificationAction::Revoked),
            _ => Err(()),
        }
    }
}

/// What started a verification pass
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Http,
    Cli,
    Auto,
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerSource::Http => write!(f, "http"),
            TriggerSource::Cli => write!(f, "cli"),
            TriggerSource::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for TriggerSource {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "http" => Ok(TriggerSource::Http),
            "cli" => Ok(TriggerSource::Cli),
            "auto" => Ok(TriggerSource::Auto),
            _ => Err(()),
        }
    }
}

/// Audit row for an applied verification transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationEvent {
    pub id: i64,
    pub provider_id: String,
    pub role: ProviderRole,
    pub action: VerificationAction,
    pub completed_bookings: u32,
    pub average_rating: Option<f64>,
    pub source: TriggerSource,
    pub timestamp: DateTime<Utc>,
}

/// Persisted summary of one pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassRecord {
    pub id: i64,
    pub role: ProviderRole,
    pub source: TriggerSource,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub verified: usize,
    pub revoked: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub error: Option<String>,
}
