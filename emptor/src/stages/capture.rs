//! S1 — vision capture.

use std::sync::Arc;

use emptor_types::{AgentMessage, EventKind, SagaError, Stage, StageEvent};

use crate::context::{RunContext, round3};
use crate::runner::run_stage;
use crate::saga::Saga;

impl Saga {
    /// Run S1: detect a product hypothesis from the input image.
    ///
    /// The only hard failure is a detector error; a low-confidence
    /// unknown-object hypothesis flows through and the later stages adapt.
    pub(crate) async fn stage_capture(&self, ctx: &mut RunContext) -> Result<(), SagaError> {
        let vision = Arc::clone(&self.caps.vision);
        let refiner = self
            .config
            .flags
            .vision_refine
            .then(|| self.caps.vision_refiner.clone())
            .flatten();
        let image = ctx.inputs.image.clone();

        let body = async move {
            let mut hypothesis = vision
                .detect(&image)
                .await
                .map_err(|source| SagaError::Provider { stage: Stage::S1, source })?;
            if let Some(refiner) = refiner {
                match refiner.refine(&hypothesis, &image).await {
                    Ok(refined) => hypothesis = refined,
                    Err(err) => {
                        tracing::warn!(error = %err, "vision refinement failed, keeping detector output");
                    }
                }
            }
            Ok(hypothesis)
        };
        let timeout = self.config.timeout(Stage::S1);
        let (hypothesis, dt) = run_stage(ctx, Stage::S1, EventKind::Capture, timeout, body).await?;

        ctx.record_event(
            StageEvent::succeeded(EventKind::Capture, dt, ctx.elapsed_ms())
                .with("label", hypothesis.label.clone())
                .with("brand", hypothesis.brand.clone())
                .with("color", hypothesis.color.clone())
                .with("confidence", round3(hypothesis.confidence)),
        );
        let described = match hypothesis.brand.as_deref() {
            Some(brand) => format!("{brand} {}", hypothesis.label),
            None => hypothesis.label.clone(),
        };
        ctx.record_message(
            AgentMessage::new(
                EventKind::Capture,
                "vision",
                "intent",
                format!("Detected {described}"),
                ctx.elapsed_ms(),
            )
            .with("confidence", round3(hypothesis.confidence)),
        );
        ctx.hypothesis = Some(hypothesis);
        Ok(())
    }
}
