use serde::Serialize;

use crate::storage::models::ProviderStats;

/// Completed bookings required before a badge can be granted
pub const MIN_COMPLETED_BOOKINGS: u32 = 50;
/// Minimum average rating to earn the badge
pub const GRANT_RATING: f64 = 4.5;
/// Verified providers rated strictly below this lose the badge
pub const REVOKE_RATING: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    Grant,
    Revoke,
    NoChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationDecision {
    pub provider_id: String,
    pub decision: Decision,
}

/// Maps a provider snapshot to a verification transition.
///
/// Implementations must be pure: no I/O, same answer for the same stats.
pub trait EligibilityPolicy: Send + Sync {
    fn decide(&self, stats: &ProviderStats) -> Decision;

    fn evaluate(&self, stats: &ProviderStats) -> VerificationDecision {
        VerificationDecision {
            provider_id: stats.id.clone(),
            decision: self.decide(stats),
        }
    }
}

/// The fixed marketplace policy: 50 completed bookings at 4.5 stars earns the
/// badge, dropping below 4.0 stars loses it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPolicy;

impl EligibilityPolicy for StandardPolicy {
    fn decide(&self, stats: &ProviderStats) -> Decision {
        let rating = stats.rating();

        if stats.is_verified() {
            if rating < REVOKE_RATING {
                Decision::Revoke
            } else {
                Decision::NoChange
            }
        } else if stats.completed_bookings >= MIN_COMPLETED_BOOKINGS && rating >= GRANT_RATING {
            Decision::Grant
        } else {
            Decision::NoChange
        }
    }
}

pub fn evaluate(stats: &ProviderStats) -> VerificationDecision {
    StandardPolicy.evaluate(stats)
}

/// Human-readable reason behind the standard policy's decision
pub fn explain(stats: &ProviderStats) -> String {
    let rating = stats.rating();
    let rating_text = match stats.average_rating {
        Some(r) => format!("{:.2}", r),
        None => "no ratings".to_string(),
    };

    match StandardPolicy.decide(stats) {
        Decision::Grant => format!(
            "Eligible for verification ({} completed bookings, rating {})",
            stats.completed_bookings, rating_text
        ),
        Decision::Revoke => format!(
            "Verification will be revoked (rating {} is below {:.1})",
            rating_text, REVOKE_RATING
        ),
        Decision::NoChange if stats.is_verified() => {
            format!("Verified and in good standing (rating {})", rating_text)
        }
        Decision::NoChange => {
            let mut missing = Vec::new();
            if stats.completed_bookings < MIN_COMPLETED_BOOKINGS {
                missing.push(format!(
                    "needs {} more completed bookings",
                    MIN_COMPLETED_BOOKINGS - stats.completed_bookings
                ));
            }
            if rating < GRANT_RATING {
                missing.push(format!("rating {} is below {:.1}", rating_text, GRANT_RATING));
            }
            format!("Not yet eligible: {}", missing.join(", "))
        }
    }
}
