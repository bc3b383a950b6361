use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, VerifyError},
    storage::{
        models::{PassRecord, ProviderRole, ProviderStats, TriggerSource, VerificationAction, VerificationEvent},
        store::ProviderStore,
    },
    verification::eligibility::{Decision, EligibilityPolicy, StandardPolicy},
};

/// Runs verification passes over one provider role at a time.
///
/// The store sits behind an async mutex held for the whole pass, so two
/// triggers arriving together run one after the other instead of racing on
/// the same `verified_at` field.
pub struct VerificationRunner<S: ProviderStore> {
    store: Mutex<S>,
    policy: Box<dyn EligibilityPolicy>,
    dry_run: bool,
}

impl<S: ProviderStore> VerificationRunner<S> {
    pub fn new(store: S, dry_run: bool) -> Self {
        Self::with_policy(store, Box::new(StandardPolicy), dry_run)
    }

    pub fn with_policy(store: S, policy: Box<dyn EligibilityPolicy>, dry_run: bool) -> Self {
        Self {
            store: Mutex::new(store),
            policy,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Borrow the store between passes.
    pub async fn with_store<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let store = self.store.lock().await;
        f(&store)
    }

    /// Evaluate every provider of `role` and persist the resulting transitions.
    ///
    /// A failed provider list aborts the pass. A failed write for one provider
    /// is counted in `failed` and the pass moves on to the next provider.
    pub async fn run_pass(&self, role: ProviderRole, source: TriggerSource) -> Result<PassSummary> {
        let store = self.store.lock().await;
        let started_at = Utc::now();

        info!(
            "Starting verification pass for {} providers (source: {}, dry run: {})",
            role, source, self.dry_run
        );

        let providers = match store.list_providers_with_completed_booking_counts(role) {
            Ok(providers) => providers,
            Err(e) => {
                error!("Failed to load {} providers: {}", role, e);
                let record = PassRecord {
                    id: 0,
                    role,
                    source,
                    started_at,
                    finished_at: Utc::now(),
                    total: 0,
                    verified: 0,
                    revoked: 0,
                    failed: 0,
                    dry_run: self.dry_run,
                    error: Some(e.to_string()),
                };
                if let Err(record_err) = store.record_pass(&record) {
                    warn!("Failed to record aborted pass: {}", record_err);
                }
                return Err(VerifyError::StorageRead(e.to_string()));
            }
        };

        let mut summary = PassSummary::new(role, source, started_at, self.dry_run);
        summary.total = providers.len();

        for stats in &providers {
            let decision = self.policy.evaluate(stats);
            debug!(
                "Provider {}: {} completed bookings, rating {:?}, verified {} -> {:?}",
                stats.id,
                stats.completed_bookings,
                stats.average_rating,
                stats.is_verified(),
                decision.decision
            );

            let (verified_at, action) = match decision.decision {
                Decision::Grant => (Some(Utc::now()), VerificationAction::Granted),
                Decision::Revoke => (None, VerificationAction::Revoked),
                Decision::NoChange => continue,
            };

            if self.dry_run {
                info!("DRY RUN: Would mark {} as {}", stats.id, action);
                summary.tally(action);
                continue;
            }

            match store.set_verified_at(&stats.id, verified_at) {
                Ok(()) => {
                    info!("{} verification for {} provider {}", action, role, stats.id);
                    summary.tally(action);

                    let event = event_for(stats, role, action, source);
                    if let Err(e) = store.record_event(&event) {
                        warn!("Failed to record verification event for {}: {}", stats.id, e);
                    }
                }
                Err(e) => {
                    let err = VerifyError::StorageWrite {
                        provider_id: stats.id.clone(),
                        reason: e.to_string(),
                    };
                    warn!("{}", err);
                    summary.failed += 1;
                    summary.failures.push(ProviderFailure {
                        provider_id: stats.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        summary.finished_at = Utc::now();

        if let Err(e) = store.record_pass(&summary.to_record()) {
            warn!("Failed to record pass summary: {}", e);
        }

        info!(
            "Verification pass complete: {} providers, {} verified, {} revoked, {} failed",
            summary.total, summary.verified, summary.revoked, summary.failed
        );

        Ok(summary)
    }
}

fn event_for(
    stats: &ProviderStats,
    role: ProviderRole,
    action: VerificationAction,
    source: TriggerSource,
) -> VerificationEvent {
    VerificationEvent {
        id: 0,
        provider_id: stats.id.clone(),
        role,
        action,
        completed_bookings: stats.completed_bookings,
        average_rating: stats.average_rating,
        source,
        timestamp: Utc::now(),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider_id: String,
    pub error: String,
}

/// Counts for one verification pass
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub role: ProviderRole,
    pub source: TriggerSource,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub verified: usize,
    pub revoked: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub failures: Vec<ProviderFailure>,
}

impl PassSummary {
    fn new(role: ProviderRole, source: TriggerSource, started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            role,
            source,
            started_at,
            finished_at: started_at,
            total: 0,
            verified: 0,
            revoked: 0,
            failed: 0,
            dry_run,
            failures: Vec::new(),
        }
    }

    fn tally(&mut self, action: VerificationAction) {
        match action {
            VerificationAction::Granted => self.verified += 1,
            VerificationAction::Revoked => self.revoked += 1,
        }
    }

    pub fn unchanged(&self) -> usize {
        self.total - self.verified - self.revoked - self.failed
    }

    fn to_record(&self) -> PassRecord {
        PassRecord {
            id: 0,
            role: self.role,
            source: self.source,
            started_at: self.started_at,
            finished_at: self.finished_at,
            total: self.total,
            verified: self.verified,
            revoked: self.revoked,
            failed: self.failed,
            dry_run: self.dry_run,
            error: None,
        }
    }

    /// Print a formatted summary to console
    pub fn print_summary(&self) {
        println!("\n=== Verification Pass Summary ({}) ===", self.role);
        println!("Providers:  {}", self.total);
        println!("Verified:   {} ✓", self.verified);
        println!("Revoked:    {} ✗", self.revoked);
        println!("Unchanged:  {}", self.unchanged());
        println!("Failed:     {}", self.failed);
        for failure in &self.failures {
            println!("  - {}: {}", failure.provider_id, failure.error);
        }
        if self.dry_run {
            println!("DRY RUN: no records were changed");
        }
        println!("=====================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{models::BookingStatus, store::MockProviderStore, Database};
    use std::sync::Arc;

    fn provider(id: &str, bookings: u32, rating: Option<f64>, verified: bool) -> ProviderStats {
        ProviderStats {
            id: id.to_string(),
            completed_bookings: bookings,
            average_rating: rating,
            verified_at: verified.then(Utc::now),
        }
    }

    /// A: unverified, 60 bookings, 4.6. B: verified, 3.9. C: verified, 4.2.
    fn scenario_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.add_provider("a", "Alpha Builders", ProviderRole::Company).unwrap();
        db.add_provider("b", "Beta Repairs", ProviderRole::Company).unwrap();
        db.add_provider("c", "Gamma Cleaning", ProviderRole::Company).unwrap();

        for _ in 0..60 {
            db.add_booking("a", BookingStatus::Completed).unwrap();
        }
        for rating in [5.0, 4.6, 4.2] {
            db.add_review("a", rating).unwrap();
        }
        db.add_review("b", 3.9).unwrap();
        db.add_review("c", 4.2).unwrap();

        let verified = Utc::now();
        db.set_verified_at("b", Some(verified)).unwrap();
        db.set_verified_at("c", Some(verified)).unwrap();
        db
    }

    #[tokio::test]
    async fn test_three_provider_scenario() {
        let runner = VerificationRunner::new(scenario_db(), false);
        let before_c = runner
            .with_store(|db| db.get_provider("c").unwrap().unwrap().stats.verified_at)
            .await;

        let summary = runner
            .run_pass(ProviderRole::Company, TriggerSource::Cli)
            .await
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.revoked, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.unchanged(), 1);

        runner
            .with_store(|db| {
                assert!(db.get_provider("a").unwrap().unwrap().stats.verified_at.is_some());
                assert!(db.get_provider("b").unwrap().unwrap().stats.verified_at.is_none());
                assert_eq!(
                    db.get_provider("c").unwrap().unwrap().stats.verified_at,
                    before_c
                );

                let events = db.get_verification_history(None).unwrap();
                assert_eq!(events.len(), 2);

                let passes = db.get_pass_history(None).unwrap();
                assert_eq!(passes.len(), 1);
                assert_eq!(passes[0].verified, 1);
                assert_eq!(passes[0].revoked, 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_second_pass_is_noop() {
        let runner = VerificationRunner::new(scenario_db(), false);
        runner.run_pass(ProviderRole::Company, TriggerSource::Auto).await.unwrap();

        let second = runner
            .run_pass(ProviderRole::Company, TriggerSource::Auto)
            .await
            .unwrap();

        assert_eq!(second.verified, 0);
        assert_eq!(second.revoked, 0);
        assert_eq!(second.unchanged(), 3);
    }

    #[tokio::test]
    async fn test_pass_only_touches_requested_role() {
        let db = scenario_db();
        db.add_provider("w", "Solo Painter", ProviderRole::Worker).unwrap();
        db.set_verified_at("w", Some(Utc::now())).unwrap();

        let runner = VerificationRunner::new(db, false);
        let summary = runner
            .run_pass(ProviderRole::Company, TriggerSource::Cli)
            .await
            .unwrap();
        assert_eq!(summary.total, 3);

        let worker_verified = runner
            .with_store(|db| db.get_provider("w").unwrap().unwrap().stats.verified_at)
            .await;
        assert!(worker_verified.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_passes_are_serialized() {
        let runner = Arc::new(VerificationRunner::new(scenario_db(), false));

        let first = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run_pass(ProviderRole::Company, TriggerSource::Http).await }
        });
        let second = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run_pass(ProviderRole::Company, TriggerSource::Auto).await }
        });

        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();

        assert_eq!(a.verified + b.verified, 1);
        assert_eq!(a.revoked + b.revoked, 1);

        let events = runner
            .with_store(|db| db.get_verification_history(None).unwrap().len())
            .await;
        assert_eq!(events, 2);
    }

    #[tokio::test]
    async fn test_dry_run_counts_without_writing() {
        let mut store = MockProviderStore::new();
        store
            .expect_list_providers_with_completed_booking_counts()
            .times(1)
            .returning(|_| {
                Ok(vec![
                    provider("a", 60, Some(4.6), false),
                    provider("b", 10, Some(3.0), true),
                ])
            });
        store.expect_set_verified_at().times(0);
        store.expect_record_event().times(0);
        store
            .expect_record_pass()
            .times(1)
            .returning(|pass| {
                assert!(pass.dry_run);
                Ok(())
            });

        let runner = VerificationRunner::new(store, true);
        let summary = runner
            .run_pass(ProviderRole::Company, TriggerSource::Cli)
            .await
            .unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.revoked, 1);
    }

    #[tokio::test]
    async fn test_write_failure_does_not_stop_pass() {
        let mut store = MockProviderStore::new();
        store
            .expect_list_providers_with_completed_booking_counts()
            .returning(|_| {
                Ok(vec![
                    provider("a", 60, Some(4.6), false),
                    provider("b", 80, Some(4.8), false),
                    provider("c", 5, Some(2.0), true),
                ])
            });
        store
            .expect_set_verified_at()
            .times(3)
            .returning(|id, _| {
                if id == "b" {
                    Err(VerifyError::ProviderNotFound(id.to_string()))
                } else {
                    Ok(())
                }
            });
        store.expect_record_event().times(2).returning(|_| Ok(()));
        store
            .expect_record_pass()
            .times(1)
            .returning(|pass| {
                assert_eq!(pass.failed, 1);
                Ok(())
            });

        let runner = VerificationRunner::new(store, false);
        let summary = runner
            .run_pass(ProviderRole::Company, TriggerSource::Http)
            .await
            .unwrap();

        assert_eq!(summary.verified, 1);
        assert_eq!(summary.revoked, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].provider_id, "b");
    }

    #[tokio::test]
    async fn test_event_failure_still_counts_transition() {
        let mut store = MockProviderStore::new();
        store
            .expect_list_providers_with_completed_booking_counts()
            .returning(|_| Ok(vec![provider("a", 60, Some(4.6), false)]));
        store.expect_set_verified_at().times(1).returning(|_, _| Ok(()));
        store
            .expect_record_event()
            .returning(|_| Err(VerifyError::Config("audit table missing".to_string())));
        store.expect_record_pass().returning(|_| Ok(()));

        let runner = VerificationRunner::new(store, false);
        let summary = runner
            .run_pass(ProviderRole::Company, TriggerSource::Cli)
            .await
            .unwrap();

        assert_eq!(summary.verified, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_read_failure_aborts_without_writes() {
        let mut store = MockProviderStore::new();
        store
            .expect_list_providers_with_completed_booking_counts()
            .returning(|_| Err(VerifyError::Database(rusqlite::Error::QueryReturnedNoRows)));
        store.expect_set_verified_at().times(0);
        store
            .expect_record_pass()
            .times(1)
            .returning(|pass| {
                assert!(pass.error.is_some());
                assert_eq!(pass.total, 0);
                Ok(())
            });

        let runner = VerificationRunner::new(store, false);
        let err = runner
            .run_pass(ProviderRole::Company, TriggerSource::Http)
            .await
            .unwrap_err();

        assert!(matches!(err, VerifyError::StorageRead(_)));
    }

    #[tokio::test]
    async fn test_custom_policy() {
        struct RevokeEveryone;

        impl EligibilityPolicy for RevokeEveryone {
            fn decide(&self, stats: &ProviderStats) -> Decision {
                if stats.is_verified() {
                    Decision::Revoke
                } else {
                    Decision::NoChange
                }
            }
        }

        let runner = VerificationRunner::with_policy(scenario_db(), Box::new(RevokeEveryone), false);
        let summary = runner
            .run_pass(ProviderRole::Company, TriggerSource::Cli)
            .await
            .unwrap();

        assert_eq!(summary.verified, 0);
        assert_eq!(summary.revoked, 2);
    }
}
