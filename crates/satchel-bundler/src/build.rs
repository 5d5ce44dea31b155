//! Build orchestration.
//!
//! One build runs four phases in order: discovery and rule matching, chain
//! execution on a bounded worker pool, assembly, and the output swap. The
//! first fatal error stops every in-flight chain; cancellation from the
//! caller does the same and guarantees nothing is written.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use satchel_config::ResolvedConfig;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::artifact::Artifact;
use crate::assemble::Assembler;
use crate::chain::{ChainExecutor, ChainOutcome, ChainStage};
use crate::discovery::Discovery;
use crate::manifest::Manifest;
use crate::matcher::RuleMatcher;
use crate::output::{OutputFile, write_output};
use crate::source::SourceId;
use crate::transforms::{Payload, TransformContext};
use crate::{Error, Result};

/// Where a [`Bundler`] is in its current (or last) build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Idle,
    Matching,
    Transforming,
    Assembling,
    Done,
    Failed,
}

impl BuildPhase {
    pub fn can_transition_to(self, next: BuildPhase) -> bool {
        use BuildPhase::*;
        matches!(
            (self, next),
            (Idle | Done | Failed, Matching)
                | (Matching, Transforming)
                | (Transforming, Assembling)
                | (Assembling, Done)
                | (Matching | Transforming | Assembling, Failed)
        )
    }

    pub fn is_running(self) -> bool {
        matches!(
            self,
            BuildPhase::Matching | BuildPhase::Transforming | BuildPhase::Assembling
        )
    }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub manifest: Manifest,
    /// Every file written, relative to the output directory.
    pub files: Vec<OutputFile>,
    /// Sources discovered, including skipped scanned files.
    pub sources: usize,
    /// Terminal artifacts produced by chains.
    pub artifacts: usize,
    /// Skipped best-effort stages.
    pub warnings: Vec<String>,
    pub duration: Duration,
}

impl BuildReport {
    pub fn total_size(&self) -> usize {
        self.files.iter().map(|f| f.bytes.len()).sum()
    }
}

/// One chain run: a rule applied to a source.
struct Job {
    source: SourceId,
    rule: usize,
    path: PathBuf,
    stages: Arc<[ChainStage]>,
}

pub struct Bundler {
    config: Arc<ResolvedConfig>,
    matcher: RuleMatcher,
    phase: RwLock<BuildPhase>,
}

impl Bundler {
    /// Compiles the rule table; invalid patterns fail here, before any work.
    pub fn new(config: ResolvedConfig) -> Result<Self> {
        let matcher = RuleMatcher::new(&config.rules, config.match_strategy)?;
        Ok(Self {
            config: Arc::new(config),
            matcher,
            phase: RwLock::new(BuildPhase::Idle),
        })
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn phase(&self) -> BuildPhase {
        *self.phase.read()
    }

    fn set_phase(&self, next: BuildPhase) {
        let mut phase = self.phase.write();
        debug_assert!(
            phase.can_transition_to(next),
            "invalid build phase transition {:?} -> {:?}",
            *phase,
            next
        );
        debug!("build phase {:?} -> {:?}", *phase, next);
        *phase = next;
    }

    pub async fn build(&self, cancel: CancellationToken) -> Result<BuildReport> {
        let started = Instant::now();
        self.set_phase(BuildPhase::Matching);

        let result = self.run(&cancel, started).await;
        match &result {
            Ok(report) => {
                self.set_phase(BuildPhase::Done);
                info!(
                    "Build finished: {} file(s) in {}ms",
                    report.files.len(),
                    report.duration.as_millis()
                );
            }
            Err(err) => {
                self.set_phase(BuildPhase::Failed);
                debug!("build failed: {}", err);
            }
        }
        result
    }

    async fn run(&self, cancel: &CancellationToken, started: Instant) -> Result<BuildReport> {
        let config = Arc::clone(&self.config);
        let graph = tokio::task::spawn_blocking(move || Discovery::new(&config).discover())
            .await
            .map_err(|e| Error::io(&self.config.context, std::io::Error::other(e)))??;
        let jobs = self.plan(&graph)?;
        info!(
            "Matched {} source(s) to {} chain run(s)",
            graph.len(),
            jobs.len()
        );

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.set_phase(BuildPhase::Transforming);
        let outcomes = self.transform(jobs, cancel).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.set_phase(BuildPhase::Assembling);
        let mut warnings = Vec::new();
        let mut artifacts = Vec::new();
        for ((source, rule), outcome) in outcomes {
            let compiled = &self.matcher.rules()[rule];
            let path = graph.get(source).path.clone();
            warnings.extend(outcome.warnings);
            for payload in outcome.outputs {
                artifacts.push(Artifact::new(
                    source,
                    path.clone(),
                    compiled,
                    outcome.applied.clone(),
                    payload,
                    &self.config,
                ));
            }
        }
        let artifact_count = artifacts.len();
        let source_count = graph.len();

        let config = Arc::clone(&self.config);
        let assembly =
            tokio::task::spawn_blocking(move || Assembler::new(&config, &graph).assemble(artifacts))
                .await
                .map_err(|e| Error::assembly("worker", format!("assembly task failed: {e}")))??;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let out_dir = self.config.output.dir.clone();
        let files = assembly.files;
        let files = tokio::task::spawn_blocking(move || write_output(&files, &out_dir).map(|_| files))
            .await
            .map_err(|e| Error::WriteFailure(format!("writer task failed: {e}")))??;

        Ok(BuildReport {
            manifest: assembly.manifest,
            files,
            sources: source_count,
            artifacts: artifact_count,
            warnings,
            duration: started.elapsed(),
        })
    }

    /// Select rules for every discovered source.
    fn plan(&self, graph: &crate::source::SourceGraph) -> Result<Vec<Job>> {
        let stages: Vec<Arc<[ChainStage]>> = self
            .matcher
            .rules()
            .iter()
            .map(|rule| rule.rule.chain.iter().map(ChainStage::from_spec).collect())
            .collect();

        let mut jobs = Vec::new();
        for source in graph.sources() {
            let selected = self.matcher.select(&source.rel, source.origin, &source.path)?;
            if selected.is_empty() {
                debug!("no rule for scanned file {}, skipping", source.rel);
                continue;
            }
            for rule in selected {
                jobs.push(Job {
                    source: source.id,
                    rule: rule.index,
                    path: source.path.clone(),
                    stages: Arc::clone(&stages[rule.index]),
                });
            }
        }
        Ok(jobs)
    }

    /// Run every job with at most `concurrency` chains in flight. Results
    /// come back sorted by source, then rule.
    async fn transform(
        &self,
        jobs: Vec<Job>,
        cancel: &CancellationToken,
    ) -> Result<Vec<((SourceId, usize), ChainOutcome)>> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let executor = ChainExecutor::new(self.config.transform_timeout);
        let abort = cancel.child_token();
        let mut tasks = JoinSet::new();

        for job in jobs {
            let semaphore = Arc::clone(&semaphore);
            let abort = abort.clone();
            let ctx = TransformContext {
                source: job.path.clone(),
                context_dir: self.config.context.clone(),
                source_maps: self.config.source_maps,
            };

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    _ = abort.cancelled() => return Err(Error::Cancelled),
                    permit = semaphore.acquire_owned() => permit.map_err(|_| Error::Cancelled)?,
                };

                let bytes = tokio::fs::read(&job.path)
                    .await
                    .map_err(|e| Error::io(&job.path, e))?;
                let file_name = job
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                let outcome = executor
                    .run(&job.stages, Payload::new(file_name, bytes), &ctx, &abort)
                    .await?;
                Ok::<_, Error>(((job.source, job.rule), outcome))
            });
        }

        let mut finished = Vec::new();
        let mut failure: Option<Error> = None;
        while let Some(joined) = tasks.join_next().await {
            let err = match joined {
                Ok(Ok(done)) => {
                    finished.push(done);
                    continue;
                }
                Ok(Err(Error::Cancelled)) => continue,
                Ok(Err(err)) => err,
                Err(join) if join.is_cancelled() => continue,
                Err(join) => Error::Transform {
                    transform: "worker".to_string(),
                    file: self.config.context.clone(),
                    cause: format!("task panicked: {join}"),
                },
            };

            if failure.is_none() {
                debug!("stopping in-flight chains after: {}", err);
                failure = Some(err);
                abort.cancel();
                tasks.abort_all();
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        finished.sort_by_key(|(key, _)| *key);
        Ok(finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        use BuildPhase::*;
        assert!(Idle.can_transition_to(Matching));
        assert!(Matching.can_transition_to(Transforming));
        assert!(Transforming.can_transition_to(Assembling));
        assert!(Assembling.can_transition_to(Done));
        assert!(Transforming.can_transition_to(Failed));
        assert!(Done.can_transition_to(Matching));
        assert!(Failed.can_transition_to(Matching));

        assert!(!Idle.can_transition_to(Assembling));
        assert!(!Assembling.can_transition_to(Transforming));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Failed));
    }

    #[test]
    fn test_running_phases() {
        assert!(BuildPhase::Transforming.is_running());
        assert!(!BuildPhase::Done.is_running());
        assert!(!BuildPhase::Idle.is_running());
    }
}
