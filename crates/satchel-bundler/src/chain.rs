//! Transform chain executor.
//!
//! Stages run in order, each on the blocking pool under the per-transform
//! timeout. A stage that yields more than one payload ends the chain: every
//! output becomes terminal. A failing `best_effort` stage is skipped and its
//! input flows on unchanged.

use std::sync::Arc;
use std::time::Duration;

use satchel_config::TransformSpec;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::transforms::{Payload, Transform, TransformContext, build_transform};
use crate::{Error, Result};

#[derive(Clone)]
pub struct ChainStage {
    pub transform: Arc<dyn Transform>,
    pub best_effort: bool,
}

impl ChainStage {
    pub fn new(transform: Arc<dyn Transform>) -> Self {
        Self {
            transform,
            best_effort: false,
        }
    }

    pub fn from_spec(spec: &TransformSpec) -> Self {
        Self {
            transform: build_transform(&spec.kind),
            best_effort: spec.best_effort,
        }
    }

    pub fn name(&self) -> &'static str {
        self.transform.name()
    }
}

impl std::fmt::Debug for ChainStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainStage")
            .field("transform", &self.name())
            .field("best_effort", &self.best_effort)
            .finish()
    }
}

/// Terminal payloads of one chain run.
#[derive(Debug, Clone, Default)]
pub struct ChainOutcome {
    pub outputs: Vec<Payload>,
    /// Names of the stages that actually ran.
    pub applied: Vec<&'static str>,
    /// Skipped best-effort failures, already logged.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ChainExecutor {
    timeout: Duration,
}

impl ChainExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn run(
        &self,
        stages: &[ChainStage],
        input: Payload,
        ctx: &TransformContext,
        cancel: &CancellationToken,
    ) -> Result<ChainOutcome> {
        let mut outcome = ChainOutcome::default();
        let mut current = input;

        for stage in stages {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let attempt = self.run_stage(stage, current.clone(), ctx, cancel).await;
            let mut outputs = match attempt {
                Ok(outputs) => {
                    outcome.applied.push(stage.name());
                    outputs
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) if stage.best_effort => {
                    warn!("{} (best effort, input kept)", err);
                    outcome.warnings.push(err.to_string());
                    continue;
                }
                Err(err) => return Err(err),
            };

            trace!(
                "{} on {}: {} output(s)",
                stage.name(),
                ctx.source.display(),
                outputs.len()
            );

            if outputs.len() > 1 {
                outcome.outputs = outputs;
                return Ok(outcome);
            }
            match outputs.pop() {
                Some(next) => current = next,
                None => {
                    return Err(stage_error(stage, ctx, "produced no output".to_string()));
                }
            }
        }

        outcome.outputs = vec![current];
        Ok(outcome)
    }

    async fn run_stage(
        &self,
        stage: &ChainStage,
        payload: Payload,
        ctx: &TransformContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<Payload>> {
        let transform = Arc::clone(&stage.transform);
        let task_ctx = ctx.clone();
        let handle = tokio::task::spawn_blocking(move || transform.apply(payload, &task_ctx));

        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            joined = tokio::time::timeout(self.timeout, handle) => match joined {
                Err(_) => Err(stage_error(
                    stage,
                    ctx,
                    format!("timed out after {}ms", self.timeout.as_millis()),
                )),
                Ok(Err(join)) => Err(stage_error(stage, ctx, format!("panicked: {join}"))),
                Ok(Ok(Err(err))) => Err(stage_error(stage, ctx, format!("{err:#}"))),
                Ok(Ok(Ok(outputs))) => Ok(outputs),
            },
        }
    }
}

fn stage_error(stage: &ChainStage, ctx: &TransformContext, cause: String) -> Error {
    Error::Transform {
        transform: stage.name().to_string(),
        file: ctx.source.clone(),
        cause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Append(&'static str);

    impl Transform for Append {
        fn name(&self) -> &'static str {
            self.0
        }

        fn apply(&self, mut payload: Payload, _ctx: &TransformContext) -> anyhow::Result<Vec<Payload>> {
            payload.bytes.extend_from_slice(self.0.as_bytes());
            Ok(vec![payload])
        }
    }

    struct Split;

    impl Transform for Split {
        fn name(&self) -> &'static str {
            "split"
        }

        fn apply(&self, payload: Payload, _ctx: &TransformContext) -> anyhow::Result<Vec<Payload>> {
            let copy = Payload::new(payload.renamed("copy"), payload.bytes.clone());
            Ok(vec![payload, copy])
        }
    }

    struct Fail;

    impl Transform for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn apply(&self, _payload: Payload, _ctx: &TransformContext) -> anyhow::Result<Vec<Payload>> {
            anyhow::bail!("boom")
        }
    }

    struct Slow;

    impl Transform for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn apply(&self, payload: Payload, _ctx: &TransformContext) -> anyhow::Result<Vec<Payload>> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(vec![payload])
        }
    }

    fn ctx() -> TransformContext {
        TransformContext {
            source: PathBuf::from("/src/a.txt"),
            context_dir: PathBuf::from("/src"),
            source_maps: false,
        }
    }

    fn stage(t: impl Transform + 'static) -> ChainStage {
        ChainStage::new(Arc::new(t))
    }

    async fn run(stages: &[ChainStage]) -> Result<ChainOutcome> {
        ChainExecutor::new(Duration::from_secs(5))
            .run(stages, Payload::new("a.txt", Vec::new()), &ctx(), &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let outcome = run(&[stage(Append("a")), stage(Append("b"))]).await.unwrap();
        assert_eq!(outcome.outputs.len(), 1);
        assert_eq!(outcome.outputs[0].bytes, b"ab");
        assert_eq!(outcome.applied, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_fan_out_is_terminal() {
        let outcome = run(&[stage(Append("a")), stage(Split), stage(Append("never"))])
            .await
            .unwrap();
        assert_eq!(outcome.outputs.len(), 2);
        assert_eq!(outcome.outputs[1].file_name, "a.copy");
        assert!(outcome.outputs.iter().all(|p| p.bytes == b"a"));
    }

    #[tokio::test]
    async fn test_failure_names_transform_and_file() {
        let err = run(&[stage(Append("a")), stage(Fail)]).await.unwrap_err();
        match err {
            Error::Transform {
                transform,
                file,
                cause,
            } => {
                assert_eq!(transform, "fail");
                assert_eq!(file, PathBuf::from("/src/a.txt"));
                assert!(cause.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_best_effort_keeps_input() {
        let mut optional = stage(Fail);
        optional.best_effort = true;

        let outcome = run(&[stage(Append("a")), optional, stage(Append("b"))])
            .await
            .unwrap();
        assert_eq!(outcome.outputs[0].bytes, b"ab");
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.applied, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = ChainExecutor::new(Duration::from_millis(20))
            .run(
                &[stage(Slow)],
                Payload::new("a.txt", Vec::new()),
                &ctx(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transform { ref cause, .. } if cause.contains("timed out")));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ChainExecutor::new(Duration::from_secs(1))
            .run(&[stage(Append("a"))], Payload::new("a.txt", Vec::new()), &ctx(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_stops_running_stage() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = ChainExecutor::new(Duration::from_secs(5))
            .run(
                &[stage(Slow), stage(Append("never"))],
                Payload::new("a.txt", Vec::new()),
                &ctx(),
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled), "{err:?}");
        assert!(started.elapsed() < Duration::from_millis(450));
    }
}
