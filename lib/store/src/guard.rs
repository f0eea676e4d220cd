//! Connectivity guard that blocks startup until the database answers.

use crate::database::Database;
use crate::error::{DatabaseError, StartupError};
use async_trait::async_trait;
use rootcause::prelude::Report;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Ceiling on the delay between two probes.
pub const MAX_BACKOFF: Duration = Duration::from_millis(5000);

/// Attempt count after which the delay stops growing.
const BACKOFF_STEPS: u32 = 4;

/// Something that can be probed for reachability.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Runs one probe.
    async fn probe(&self) -> Result<(), Report<DatabaseError>>;

    /// Describes what is being probed, for logs.
    fn target(&self) -> String;
}

#[async_trait]
impl Probe for Database {
    async fn probe(&self) -> Result<(), Report<DatabaseError>> {
        self.ping().await
    }

    fn target(&self) -> String {
        Database::target(self).to_string()
    }
}

/// Delay after the given (1-based) failed attempt.
///
/// `min(interval * min(attempt, 4), 5s)`
#[must_use]
pub fn backoff_delay(interval: Duration, attempt: u32) -> Duration {
    interval
        .saturating_mul(attempt.clamp(1, BACKOFF_STEPS))
        .min(MAX_BACKOFF)
}

/// Probes until one probe succeeds or `timeout` has elapsed.
///
/// Each probe is bounded by the time left before the deadline, and sleeps are
/// clipped to it, so the call returns shortly after `timeout` even when the
/// database never answers.
///
/// # Errors
///
/// Returns [`StartupError::DatabaseUnreachable`] when the deadline passes
/// without a successful probe. Callers must treat this as fatal.
pub async fn wait_for_ready<P>(
    probe: &P,
    timeout: Duration,
    interval: Duration,
) -> Result<(), Report<StartupError>>
where
    P: Probe + ?Sized,
{
    let start = Instant::now();
    let target = probe.target();
    info!(
        %target,
        timeout_ms = timeout.as_millis() as u64,
        "waiting for database"
    );

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let remaining = timeout.saturating_sub(start.elapsed());

        match tokio::time::timeout(remaining, probe.probe()).await {
            Ok(Ok(())) => {
                info!(%target, attempt, "database connection successful");
                return Ok(());
            }
            Ok(Err(e)) => {
                warn!(%target, attempt, error = %e, "database connection failed");
            }
            Err(_) => {
                warn!(%target, attempt, "database probe timed out");
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            break;
        }

        let delay = backoff_delay(interval, attempt).min(timeout - elapsed);
        tokio::time::sleep(delay).await;

        if start.elapsed() >= timeout {
            break;
        }
    }

    Err(StartupError::DatabaseUnreachable {
        target,
        attempts: attempt,
        elapsed_ms: start.elapsed().as_millis(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Probe that fails a fixed number of times before succeeding.
    struct ScriptedProbe {
        failures: u32,
        calls: AtomicU32,
    }

    impl ScriptedProbe {
        fn failing_forever() -> Self {
            Self::failing(u32::MAX)
        }

        fn failing(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn probe(&self) -> Result<(), Report<DatabaseError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(DatabaseError::Connection {
                    details: "connection refused".to_string(),
                }
                .into())
            } else {
                Ok(())
            }
        }

        fn target(&self) -> String {
            "radius@scripted:5432/radius".to_string()
        }
    }

    #[test]
    fn backoff_grows_then_caps() {
        let interval = Duration::from_millis(500);
        assert_eq!(backoff_delay(interval, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(interval, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(interval, 3), Duration::from_millis(1500));
        assert_eq!(backoff_delay(interval, 4), Duration::from_millis(2000));
        assert_eq!(backoff_delay(interval, 9), Duration::from_millis(2000));
    }

    #[test]
    fn backoff_never_exceeds_five_seconds() {
        let interval = Duration::from_millis(1500);
        assert_eq!(backoff_delay(interval, 3), Duration::from_millis(4500));
        assert_eq!(backoff_delay(interval, 4), MAX_BACKOFF);
        assert_eq!(
            backoff_delay(Duration::from_secs(60), 1),
            MAX_BACKOFF
        );
    }

    #[tokio::test(start_paused = true)]
    async fn returns_once_probe_succeeds() {
        let probe = ScriptedProbe::failing(2);

        wait_for_ready(&probe, Duration::from_secs(60), Duration::from_millis(1500))
            .await
            .expect("database becomes ready");

        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_database_times_out_within_bound() {
        let probe = ScriptedProbe::failing_forever();
        let start = Instant::now();

        let result =
            wait_for_ready(&probe, Duration::from_millis(2000), Duration::from_millis(500)).await;

        let elapsed = start.elapsed();
        assert!(result.is_err());
        assert!(elapsed >= Duration::from_millis(2000), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(2500), "elapsed {elapsed:?}");
        // Probes at 0ms, 500ms and 1500ms; the final sleep ends at the deadline.
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_still_probes_once() {
        let probe = ScriptedProbe::failing(0);

        wait_for_ready(&probe, Duration::ZERO, Duration::from_millis(500))
            .await
            .expect("an immediately ready probe succeeds");

        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn closed_port_fails_within_bound() {
        let mut config = DatabaseConfig::new("postgres://radius@127.0.0.1:1/radius");
        config.acquire_timeout_seconds = 1;
        let db = Database::connect_lazy(&config).expect("valid url");
        let start = std::time::Instant::now();

        let result =
            wait_for_ready(&db, Duration::from_millis(2000), Duration::from_millis(500)).await;

        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_millis(3000));
    }
}
