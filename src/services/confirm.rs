//! Transient observation filter.
//!
//! Screen state flickers between frames, so anything that triggers a cue
//! from a single read gets re-sampled a few times first. The initial
//! observation counts as check one; the policy's remaining checks each wait
//! `delay` and re-sample, and any disagreement aborts the whole
//! confirmation.

use crate::config::ConfirmPolicy;
use crate::error::CaptureError;

/// Outcome of re-sampling an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation<T> {
    Confirmed,
    /// A follow-up sample disagreed. `attempt` is the 1-based index of the
    /// failing follow-up.
    Disputed { attempt: u32, observed: T },
}

impl<T> Confirmation<T> {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Confirmation::Confirmed)
    }
}

/// Re-sample until the policy is satisfied or a sample disagrees.
pub async fn require_stable<T, F>(
    policy: ConfirmPolicy,
    expected: &T,
    mut resample: F,
) -> Result<Confirmation<T>, CaptureError>
where
    T: PartialEq,
    F: FnMut() -> Result<T, CaptureError>,
{
    for attempt in 1..policy.checks {
        tokio::time::sleep(policy.delay).await;
        let observed = resample()?;
        if observed != *expected {
            return Ok(Confirmation::Disputed { attempt, observed });
        }
    }
    Ok(Confirmation::Confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HEALTH_CONFIRMATION;
    use crate::models::labels::HealthColor;

    fn scripted(
        samples: Vec<Result<Option<HealthColor>, CaptureError>>,
    ) -> impl FnMut() -> Result<Option<HealthColor>, CaptureError> {
        let mut queue = samples.into_iter();
        move || queue.next().unwrap_or(Ok(None))
    }

    #[tokio::test(start_paused = true)]
    async fn test_agreeing_samples_confirm() {
        let resample = scripted(vec![
            Ok(Some(HealthColor::Yellow)),
            Ok(Some(HealthColor::Yellow)),
        ]);
        let result = require_stable(HEALTH_CONFIRMATION, &Some(HealthColor::Yellow), resample)
            .await
            .unwrap();
        assert!(result.is_confirmed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_disagreement_aborts() {
        let resample = scripted(vec![Ok(Some(HealthColor::Red))]);
        let result = require_stable(HEALTH_CONFIRMATION, &Some(HealthColor::Yellow), resample)
            .await
            .unwrap();
        assert_eq!(
            result,
            Confirmation::Disputed {
                attempt: 1,
                observed: Some(HealthColor::Red),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_disagreement_reports_attempt() {
        let resample = scripted(vec![Ok(Some(HealthColor::Yellow)), Ok(None)]);
        let result = require_stable(HEALTH_CONFIRMATION, &Some(HealthColor::Yellow), resample)
            .await
            .unwrap();
        assert_eq!(
            result,
            Confirmation::Disputed {
                attempt: 2,
                observed: None,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_error_propagates() {
        let resample = scripted(vec![Err(CaptureError::Grab("display lost".into()))]);
        let result =
            require_stable(HEALTH_CONFIRMATION, &Some(HealthColor::Yellow), resample).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_check_policy_confirms_immediately() {
        let policy = ConfirmPolicy {
            checks: 1,
            delay: std::time::Duration::from_secs(10),
        };
        let resample = scripted(vec![]);
        let result = require_stable(policy, &Some(HealthColor::Yellow), resample)
            .await
            .unwrap();
        assert!(result.is_confirmed());
    }
}
