//! Time-windowed, idempotent verification of confirmed incidents.
//!
//! Each sweep looks at incidents confirmed within the verification window
//! that have no [`VerificationRecord`] yet and asks the external
//! [`Verifier`] about them. A positive verdict is recorded exactly once
//! per incident id. Negative verdicts, errors and timeouts record nothing,
//! so the incident is retried on later sweeps until it leaves the window.
//!
//! Before calling the verifier, a sweep claims the incident id under the
//! record lock. Overlapping sweeps skip claimed ids, so the same incident
//! is never verified twice concurrently.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bridge_aid_ai::Verifier;
use bridge_aid_incident_models::{ConfirmedIncident, VerificationRecord};
use chrono::{DateTime, Utc};
use futures::{StreamExt as _, stream};

use crate::IncidentConfig;
use crate::clock::Clock;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Incidents handed to the verifier.
    pub checked: usize,
    /// Incidents that gained a verification record.
    pub verified: usize,
    /// Verifier errors and timeouts.
    pub failed: usize,
}

#[derive(Debug, Default)]
struct SweepState {
    records: BTreeMap<String, VerificationRecord>,
    in_flight: BTreeSet<String>,
}

/// Owner of the verification-record set.
pub struct VerificationSweep {
    verifier: Arc<dyn Verifier>,
    state: Mutex<SweepState>,
    window: chrono::Duration,
    timeout: Duration,
    concurrency: usize,
}

/// Releases an in-flight claim when dropped, even if the sweep future is
/// cancelled mid-call.
struct Claim<'a> {
    state: &'a Mutex<SweepState>,
    incident_id: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .remove(&self.incident_id);
    }
}

enum Outcome {
    Verified,
    Unverified,
    Failed,
}

impl VerificationSweep {
    /// Creates a sweep using `verifier` with the window and timeout from
    /// `config`.
    #[must_use]
    pub fn new(verifier: Arc<dyn Verifier>, config: &IncidentConfig) -> Self {
        Self {
            verifier,
            state: Mutex::new(SweepState::default()),
            window: config.verification_window(),
            timeout: config.verification_timeout(),
            concurrency: config.verification_concurrency.max(1),
        }
    }

    /// Verifies every eligible incident in `confirmed`.
    ///
    /// Verifier calls for different incidents run concurrently, at most
    /// `verification_concurrency` at a time, each bounded by the configured
    /// timeout. Never fails: verification is
    /// advisory.
    pub async fn sweep(&self, confirmed: &[ConfirmedIncident], clock: &dyn Clock) -> SweepSummary {
        let now = clock.now();

        let claims = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let mut claims: Vec<(Claim<'_>, &ConfirmedIncident)> = Vec::new();
            for incident in confirmed
                .iter()
                .filter(|c| within_window(c, now, self.window))
            {
                if state.records.contains_key(&incident.incident_id)
                    || !state.in_flight.insert(incident.incident_id.clone())
                {
                    continue;
                }
                claims.push((
                    Claim {
                        state: &self.state,
                        incident_id: incident.incident_id.clone(),
                    },
                    incident,
                ));
            }
            claims
        };

        if claims.is_empty() {
            return SweepSummary::default();
        }

        log::debug!("Verifying {} confirmed incident(s)", claims.len());

        let outcomes: Vec<Outcome> = stream::iter(claims)
            .map(|(claim, incident)| self.verify_one(claim, incident, clock))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = SweepSummary {
            checked: outcomes.len(),
            ..SweepSummary::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Verified => summary.verified += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Unverified => {}
            }
        }

        log::info!(
            "Verification sweep: {} checked, {} verified, {} failed",
            summary.checked,
            summary.verified,
            summary.failed
        );

        summary
    }

    async fn verify_one(
        &self,
        claim: Claim<'_>,
        incident: &ConfirmedIncident,
        clock: &dyn Clock,
    ) -> Outcome {
        let claim_text = claim_for(incident, self.window.num_hours());

        let verdict = match tokio::time::timeout(self.timeout, self.verifier.verify(&claim_text))
            .await
        {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                log::warn!("Verification of {} failed: {e}", incident.incident_id);
                return Outcome::Failed;
            }
            Err(_) => {
                log::warn!(
                    "Verification of {} timed out after {:?}",
                    incident.incident_id,
                    self.timeout
                );
                return Outcome::Failed;
            }
        };

        if !verdict.verified {
            log::debug!(
                "{} not verified: {}",
                incident.incident_id,
                verdict.summary
            );
            return Outcome::Unverified;
        }

        let record = VerificationRecord {
            incident_id: incident.incident_id.clone(),
            incident_type: incident.incident_type,
            coordinates: incident.coordinates,
            verified_at: clock.now(),
            summary: verdict.summary,
            sources: verdict.sources,
        };

        let mut state = claim.state.lock().unwrap_or_else(PoisonError::into_inner);
        let inserted = !state.records.contains_key(&record.incident_id);
        state
            .records
            .entry(record.incident_id.clone())
            .or_insert(record);
        drop(state);

        if inserted {
            log::info!("Verified incident {}", incident.incident_id);
            Outcome::Verified
        } else {
            Outcome::Unverified
        }
    }

    /// Whether `incident_id` has a verification record.
    #[must_use]
    pub fn is_verified(&self, incident_id: &str) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .contains_key(incident_id)
    }

    /// Copy of every verification record, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<VerificationRecord> {
        let mut records: Vec<VerificationRecord> = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .values()
            .cloned()
            .collect();
        records.sort_by_key(|r| r.verified_at);
        records
    }

    /// Number of verification records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    /// Whether nothing has been verified yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Natural-language claim handed to the verifier.
#[must_use]
pub fn claim_for(incident: &ConfirmedIncident, window_hours: i64) -> String {
    format!(
        "{} near lat {}, lng {} in the past {window_hours} hours. \
         Search credible local/news/government sources.",
        incident.incident_type,
        incident.coordinates.latitude(),
        incident.coordinates.longitude()
    )
}

/// Whether `incident` is still inside the verification window at `now`.
#[must_use]
pub fn within_window(
    incident: &ConfirmedIncident,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> bool {
    incident.created_at >= now - window
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use bridge_aid_ai::{AiError, Verdict};
    use bridge_aid_incident_models::{Coordinates, IncidentType};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Mode {
        Yes,
        No,
        Error,
        Hang,
    }

    struct FakeVerifier {
        mode: Mutex<Mode>,
        calls: AtomicUsize,
    }

    impl FakeVerifier {
        fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                mode: Mutex::new(mode),
                calls: AtomicUsize::new(0),
            })
        }

        fn set(&self, mode: Mode) {
            *self.mode.lock().unwrap() = mode;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Verifier for FakeVerifier {
        async fn verify(&self, claim: &str) -> Result<Verdict, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mode = *self.mode.lock().unwrap();
            match mode {
                Mode::Yes => Ok(Verdict {
                    verified: true,
                    summary: format!("confirmed: {claim}"),
                    sources: vec!["https://example.org/news".to_string()],
                }),
                Mode::No => Ok(Verdict::default()),
                Mode::Error => Err(AiError::Provider {
                    message: "boom".to_string(),
                }),
                Mode::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Verdict::default())
                }
            }
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn incident(lat: f64, created_at: DateTime<Utc>) -> ConfirmedIncident {
        ConfirmedIncident::new(
            IncidentType::Flooding,
            Coordinates::new(lat, -79.8774).unwrap(),
            ["a", "b", "c"].iter().map(ToString::to_string).collect(),
            created_at,
        )
    }

    #[tokio::test]
    async fn sweeping_twice_records_once() {
        let fake = FakeVerifier::new(Mode::Yes);
        let sweep = VerificationSweep::new(fake.clone(), &IncidentConfig::default());
        let clock = ManualClock::new(t0());
        let confirmed = vec![incident(43.5, t0()), incident(44.5, t0())];

        let first = sweep.sweep(&confirmed, &clock).await;
        let second = sweep.sweep(&confirmed, &clock).await;

        assert_eq!(first.verified, 2);
        assert_eq!(second, SweepSummary::default());
        assert_eq!(fake.calls(), 2);
        assert_eq!(sweep.len(), 2);

        let record = &sweep.records()[0];
        assert!(record.summary.contains("Flooding near lat"));
        assert_eq!(record.sources, vec!["https://example.org/news".to_string()]);
    }

    #[tokio::test]
    async fn unverified_stays_eligible() {
        let fake = FakeVerifier::new(Mode::No);
        let sweep = VerificationSweep::new(fake.clone(), &IncidentConfig::default());
        let clock = ManualClock::new(t0());
        let confirmed = vec![incident(43.5, t0())];

        sweep.sweep(&confirmed, &clock).await;
        fake.set(Mode::Error);
        let failed = sweep.sweep(&confirmed, &clock).await;
        assert_eq!(failed.failed, 1);
        assert!(sweep.is_empty());

        fake.set(Mode::Yes);
        let summary = sweep.sweep(&confirmed, &clock).await;
        assert_eq!(summary.verified, 1);
        assert_eq!(fake.calls(), 3);
        assert!(sweep.is_verified(&confirmed[0].incident_id));
    }

    #[tokio::test]
    async fn ignores_incidents_outside_window() {
        let fake = FakeVerifier::new(Mode::Yes);
        let sweep = VerificationSweep::new(fake.clone(), &IncidentConfig::default());
        let clock = ManualClock::new(t0());
        let confirmed = vec![
            incident(43.5, t0() - chrono::Duration::hours(25)),
            incident(44.5, t0() - chrono::Duration::hours(24)),
        ];

        let summary = sweep.sweep(&confirmed, &clock).await;
        assert_eq!(summary.checked, 1);
        assert!(!sweep.is_verified(&confirmed[0].incident_id));
        assert!(sweep.is_verified(&confirmed[1].incident_id));
        assert!(!within_window(&confirmed[0], t0(), chrono::Duration::hours(24)));
    }

    #[tokio::test]
    async fn shared_incident_id_is_checked_once_per_sweep() {
        let fake = FakeVerifier::new(Mode::Yes);
        let sweep = VerificationSweep::new(fake.clone(), &IncidentConfig::default());
        let clock = ManualClock::new(t0());
        let confirmed = vec![incident(43.5, t0()), incident(43.500_01, t0())];
        assert_eq!(confirmed[0].incident_id, confirmed[1].incident_id);

        let summary = sweep.sweep(&confirmed, &clock).await;
        assert_eq!(summary.checked, 1);
        assert_eq!(fake.calls(), 1);
        assert_eq!(sweep.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_sweeps_never_double_verify() {
        let fake = FakeVerifier::new(Mode::Yes);
        let sweep = VerificationSweep::new(fake.clone(), &IncidentConfig::default());
        let clock = ManualClock::new(t0());
        let confirmed: Vec<_> = (0..5)
            .map(|i| incident(40.0 + f64::from(i), t0()))
            .collect();

        let (a, b) = tokio::join!(
            sweep.sweep(&confirmed, &clock),
            sweep.sweep(&confirmed, &clock)
        );

        assert_eq!(a.verified + b.verified, 5);
        assert_eq!(fake.calls(), 5);
        assert_eq!(sweep.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_verifier_times_out_and_releases_claim() {
        let fake = FakeVerifier::new(Mode::Hang);
        let sweep = VerificationSweep::new(fake.clone(), &IncidentConfig::default());
        let clock = ManualClock::new(t0());
        let confirmed = vec![incident(43.5, t0())];

        let summary = sweep.sweep(&confirmed, &clock).await;
        assert_eq!(summary.failed, 1);

        fake.set(Mode::Yes);
        let retry = sweep.sweep(&confirmed, &clock).await;
        assert_eq!(retry.verified, 1);
    }

    /// Sleeps on every call and remembers how many calls overlapped.
    #[derive(Default)]
    struct SlowVerifier {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Verifier for SlowVerifier {
        async fn verify(&self, _claim: &str) -> Result<Verdict, AiError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Verdict {
                verified: true,
                ..Verdict::default()
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn verifier_calls_are_bounded_by_concurrency() {
        let slow = Arc::new(SlowVerifier::default());
        let config = IncidentConfig {
            verification_concurrency: 3,
            ..IncidentConfig::default()
        };
        let sweep = VerificationSweep::new(slow.clone(), &config);
        let clock = ManualClock::new(t0());
        let confirmed: Vec<_> = (0..50)
            .map(|i| incident(40.0 + f64::from(i) * 0.01, t0()))
            .collect();

        let summary = sweep.sweep(&confirmed, &clock).await;

        assert_eq!(summary.verified, 50);
        assert_eq!(slow.peak.load(Ordering::SeqCst), 3);
        assert_eq!(slow.in_flight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn claim_text_names_type_and_place() {
        let text = claim_for(&incident(43.5, t0()), 24);
        assert_eq!(
            text,
            "Flooding near lat 43.5, lng -79.8774 in the past 24 hours. \
             Search credible local/news/government sources."
        );
    }
}
