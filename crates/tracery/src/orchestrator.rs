//! Run sequencing with last-requested-wins supersession.
//!
//! Every reprocess request takes a [`RunToken`] from
//! [`Orchestrator::request`]. Requesting a token makes every older token
//! stale. A run checks its token between stages and stops early once it
//! is stale, and only the newest token may publish into the latest-result
//! slot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tracery_export::SvgMetadata;
use tracery_pipeline::pipeline::{Advance, Stage};
use tracery_pipeline::{Bitmap, Pipeline, PipelineConfig, PipelineError};

/// Identifies one requested run. Later tokens compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunToken {
    generation: u64,
}

impl RunToken {
    /// Monotonic request number, starting at 1.
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.generation
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum RunOutcome {
    /// The run finished and its SVG was published.
    Completed(String),
    /// A newer run was requested; nothing was published.
    Superseded,
}

impl RunOutcome {
    /// The SVG document of a completed run.
    #[must_use]
    pub fn into_svg(self) -> Option<String> {
        match self {
            Self::Completed(svg) => Some(svg),
            Self::Superseded => None,
        }
    }
}

/// A published SVG document and the run that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// The run that produced the document.
    pub token: RunToken,
    /// The SVG document.
    pub svg: String,
}

/// Sequences pipeline runs and keeps the newest result.
///
/// `Send + Sync`: share it across threads behind an `Arc` (or a scoped
/// borrow) and call [`run`](Self::run) from any of them.
#[derive(Debug, Default)]
pub struct Orchestrator {
    requested: AtomicU64,
    latest: Mutex<Option<Published>>,
}

impl Orchestrator {
    /// Create an orchestrator with no requests and no result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new token, superseding every earlier one.
    #[must_use = "pass the token to Orchestrator::run"]
    pub fn request(&self) -> RunToken {
        let generation = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("orchestrator: requested run {generation}");
        RunToken { generation }
    }

    /// Whether `token` is still the most recently requested one.
    #[must_use]
    pub fn is_current(&self, token: RunToken) -> bool {
        self.requested.load(Ordering::SeqCst) == token.generation
    }

    /// The most recently published result, if any.
    #[must_use]
    pub fn latest(&self) -> Option<Published> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run the pipeline for `token` without SVG metadata.
    ///
    /// # Errors
    ///
    /// See [`run_with_metadata`](Self::run_with_metadata).
    pub fn run(
        &self,
        token: RunToken,
        bitmap: &Bitmap,
        config: &PipelineConfig,
    ) -> Result<RunOutcome, PipelineError> {
        self.run_with_metadata(token, bitmap, config, &SvgMetadata::default())
    }

    /// Run every stage for `token` and publish the SVG if the token is
    /// still current when the run finishes.
    ///
    /// The configuration is cloned into the run and validated before any
    /// stage executes. Supersession is checked before each stage and again
    /// when publishing.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if the configuration is
    /// invalid. A failed run publishes nothing.
    pub fn run_with_metadata(
        &self,
        token: RunToken,
        bitmap: &Bitmap,
        config: &PipelineConfig,
        metadata: &SvgMetadata<'_>,
    ) -> Result<RunOutcome, PipelineError> {
        let config = config.clone();
        config.validate()?;
        let mode = config.mode;

        let mut stage: Stage = Pipeline::new(bitmap.clone(), config).into();
        loop {
            if !self.is_current(token) {
                log::debug!(
                    "orchestrator: run {} superseded before {}",
                    token.generation,
                    stage.name()
                );
                return Ok(RunOutcome::Superseded);
            }
            match stage.advance()? {
                Advance::Next(next) => stage = next,
                Advance::Complete(done) => {
                    stage = done;
                    break;
                }
            }
        }
        let staged = stage.complete()?;
        let svg = tracery_export::assemble(&staged.trace, mode, metadata);
        Ok(self.publish(token, svg))
    }

    fn publish(&self, token: RunToken, svg: String) -> RunOutcome {
        let mut slot = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let newer_published = slot.as_ref().is_some_and(|p| p.token >= token);
        if !self.is_current(token) || newer_published {
            log::debug!(
                "orchestrator: run {} finished but was superseded",
                token.generation
            );
            return RunOutcome::Superseded;
        }
        log::debug!(
            "orchestrator: publishing run {} ({} bytes)",
            token.generation,
            svg.len()
        );
        *slot = Some(Published {
            token,
            svg: svg.clone(),
        });
        RunOutcome::Completed(svg)
    }
}
