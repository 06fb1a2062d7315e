//! Stage runner: wall-clock enforcement and failure bookkeeping.

use std::future::Future;
use std::time::{Duration, Instant};

use emptor_types::{EventKind, SagaError, Stage, StageEvent};

use crate::context::{RunContext, round4};

/// Run one stage body under the stage's wall-clock limit.
///
/// On success returns the body's value and the measured `dt` in seconds; the
/// caller records the success event with its own annotations. On error or
/// timeout an `ok=false` event with a `reason` is appended here before the
/// error propagates, so the log faithfully records every failure.
pub(crate) async fn run_stage<T, F>(
    ctx: &mut RunContext,
    stage: Stage,
    kind: EventKind,
    timeout: Duration,
    body: F,
) -> Result<(T, f64), SagaError>
where
    F: Future<Output = Result<T, SagaError>>,
{
    let started = Instant::now();
    tracing::debug!(run_id = %ctx.run_id(), %stage, "stage start");
    match tokio::time::timeout(timeout, body).await {
        Ok(Ok(value)) => {
            let dt = round4(started.elapsed().as_secs_f64());
            tracing::debug!(run_id = %ctx.run_id(), %stage, dt_s = dt, "stage ok");
            Ok((value, dt))
        }
        Ok(Err(err)) => {
            let dt = round4(started.elapsed().as_secs_f64());
            tracing::warn!(run_id = %ctx.run_id(), %stage, error = %err, "stage failed");
            ctx.record_event(StageEvent::failed(kind, dt, ctx.elapsed_ms(), err.to_string()));
            Err(err)
        }
        Err(_elapsed) => {
            let dt = round4(started.elapsed().as_secs_f64());
            tracing::warn!(run_id = %ctx.run_id(), %stage, timeout_s = timeout.as_secs_f64(), "stage timed out");
            ctx.record_event(StageEvent::failed(kind, dt, ctx.elapsed_ms(), "timeout"));
            Err(SagaError::StageTimeout { stage, timeout })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunConfig, RunInputs};
    use std::time::Duration;

    fn ctx() -> RunContext {
        RunContext::new(RunInputs::new("img.jpg"), &RunConfig::default(), None)
    }

    #[tokio::test]
    async fn success_returns_value_and_dt() {
        let mut ctx = ctx();
        let (value, dt) = run_stage(&mut ctx, Stage::S1, EventKind::Capture, Duration::from_secs(5), async {
            Ok(41 + 1)
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert!(dt >= 0.0);
        assert!(ctx.events().is_empty());
    }

    #[tokio::test]
    async fn error_records_failure_event_and_propagates() {
        let mut ctx = ctx();
        let result: Result<((), f64), SagaError> =
            run_stage(&mut ctx, Stage::S3, EventKind::Sourcing, Duration::from_secs(5), async {
                Err(SagaError::NoOffers)
            })
            .await;
        assert!(matches!(result, Err(SagaError::NoOffers)));
        let event = &ctx.events()[0];
        assert!(!event.ok);
        assert_eq!(event.detail["reason"], "no offers matched the intent");
    }

    #[tokio::test]
    async fn timeout_becomes_stage_timeout() {
        let mut ctx = ctx();
        let result: Result<((), f64), SagaError> =
            run_stage(&mut ctx, Stage::S4, EventKind::Trust, Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(SagaError::StageTimeout { stage: Stage::S4, .. })));
        let event = &ctx.events()[0];
        assert_eq!(event.detail["reason"], "timeout");
    }
}
