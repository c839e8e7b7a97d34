//! Request pipeline: validate, acquire, decode, transform, encode, store,
//! clean up.
//!
//! A [`Pipeline`] is cheap to share; every call to [`Pipeline::run`] owns
//! its documents and temporary files, and only the storage handle is shared
//! between concurrent runs. CPU-bound codec and transform work runs on the
//! blocking pool.

mod resource;
mod stage;

pub use resource::{ResourceCounts, ResourceScope, TemporaryResource};
pub use stage::Stage;

use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::{PipelineConfig, WatermarkStyle};
use crate::error::{Error, ErrorKind, Result};
use crate::pdf::codec;
use crate::request::{Job, Operation, OperationRequest, Response};
use crate::storage::Storage;
use crate::transform::{self, Artifact};

/// Per-process context handed to every run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Parent of each run's `request` span
    pub span: Span,
}

impl PipelineContext {
    pub const fn new(span: Span) -> Self {
        Self { span }
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new(Span::current())
    }
}

/// Outcome of one run with its stage trail and resource counters.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub response: Response,
    pub stages: Vec<Stage>,
    pub resources: ResourceCounts,
}

impl RunReport {
    pub fn final_stage(&self) -> Option<Stage> {
        self.stages.last().copied()
    }
}

pub struct Pipeline {
    storage: Arc<dyn Storage>,
    context: PipelineContext,
    config: PipelineConfig,
    style: WatermarkStyle,
}

impl Pipeline {
    pub fn new(storage: Arc<dyn Storage>, context: PipelineContext, config: PipelineConfig) -> Self {
        Self {
            storage,
            context,
            config,
            style: WatermarkStyle::default(),
        }
    }

    /// Use `style` for watermark overlays.
    #[must_use]
    pub const fn with_watermark_style(mut self, style: WatermarkStyle) -> Self {
        self.style = style;
        self
    }

    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a request to completion. Never fails; errors are in the response.
    pub async fn process(&self, request: &OperationRequest) -> Response {
        self.run(request, &CancellationToken::new()).await.response
    }

    /// Run a request, stopping at the next cancellation point once `cancel`
    /// fires.
    pub async fn run(&self, request: &OperationRequest, cancel: &CancellationToken) -> RunReport {
        let span = info_span!(
            parent: &self.context.span,
            "request",
            operation = %request.operation,
            sources = request.sources.len(),
        );
        self.run_in_span(request, cancel).instrument(span).await
    }

    async fn run_in_span(&self, request: &OperationRequest, cancel: &CancellationToken) -> RunReport {
        let mut stages = vec![Stage::Validating];

        let job = match Operation::from_request(request) {
            Ok(job) => job,
            Err(e) => return finish(stages, Err(e), ResourceCounts::default()),
        };

        let mut scope = match ResourceScope::new(self.config.temp_dir.as_deref()) {
            Ok(scope) => scope,
            Err(e) => return finish(stages, Err(e), ResourceCounts::default()),
        };

        let outcome = self.execute(&job, &mut scope, cancel, &mut stages).await;

        stages.push(Stage::CleaningUp);
        let resources = scope.release_all().await;
        debug!(
            acquired = resources.acquired,
            released = resources.released,
            "released temporary resources"
        );

        finish(stages, outcome, resources)
    }

    async fn execute(
        &self,
        job: &Job,
        scope: &mut ResourceScope,
        cancel: &CancellationToken,
        stages: &mut Vec<Stage>,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        stages.push(Stage::Acquiring);
        let acquired = self.acquire(job, scope, cancel).await?;

        let mut inputs = Vec::with_capacity(acquired.len());
        if job.operation.is_conversion() {
            for resource in &acquired {
                inputs.push(Artifact::Raw(scope.read(resource).await?));
            }
        } else {
            stages.push(Stage::Decoding);
            for resource in &acquired {
                let bytes = scope.read(resource).await?;
                let document = blocking(move || codec::decode(&bytes)).await?;
                inputs.push(Artifact::Document(document));
            }
        }

        stages.push(Stage::Transforming);
        let operation = job.operation.clone();
        let style = self.style;
        let output = blocking(move || transform::apply(&operation, inputs, &style)).await?;

        stages.push(Stage::Encoding);
        let bytes = blocking(move || output.into_bytes()).await?;
        let produced = scope.create("result", &bytes).await?;

        stages.push(Stage::Storing);
        let destination = format!(
            "{}/{}_{}.pdf",
            self.config.result_prefix.trim_end_matches('/'),
            job.operation.name(),
            Uuid::new_v4()
        );
        let data = Bytes::from(scope.read(&produced).await?);
        let locator = self
            .storage
            .store(&destination, data)
            .await
            .map_err(Error::StorageFailed)?;

        debug!(destination = %destination, bytes = produced.len(), "stored result");
        Ok(locator)
    }

    /// Fetch the sources the operation needs, in source order.
    ///
    /// Merge keeps whatever succeeded; other operations need the first
    /// source.
    async fn acquire(
        &self,
        job: &Job,
        scope: &mut ResourceScope,
        cancel: &CancellationToken,
    ) -> Result<Vec<TemporaryResource>> {
        let wanted = if job.operation.takes_all_sources() {
            &job.sources[..]
        } else {
            &job.sources[..1]
        };
        let storage = &self.storage;

        let mut fetches = futures::stream::iter(wanted.iter().enumerate())
            .map(|(position, id)| async move { (position, id, storage.fetch(id).await) })
            .buffered(self.config.fetch_concurrency.max(1));

        let mut acquired = Vec::with_capacity(wanted.len());
        let mut failures = Vec::new();

        while let Some((position, id, result)) = fetches.next().await {
            match result {
                Ok(data) => {
                    debug!(source = %id, bytes = data.len(), "fetched source");
                    acquired.push(scope.create(&format!("source{position}"), &data).await?);
                }
                Err(e) => {
                    warn!(source = %id, "failed to fetch source: {e}");
                    failures.push(format!("{id}: {e}"));
                }
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }

        if acquired.is_empty() {
            return Err(Error::AcquisitionFailed(failures.join("; ")));
        }
        if !failures.is_empty() {
            info!(
                acquired = acquired.len(),
                failed = failures.len(),
                "continuing with the sources that were fetched"
            );
        }
        Ok(acquired)
    }
}

/// Run CPU-bound work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        error!("Blocking task failed: {}", e);
        Error::Internal(format!("blocking task failed: {e}"))
    })?
}

fn finish(mut stages: Vec<Stage>, outcome: Result<String>, resources: ResourceCounts) -> RunReport {
    let response = match outcome {
        Ok(locator) => {
            stages.push(Stage::Done);
            info!(result = %locator, "request completed");
            Response::success(locator)
        }
        Err(e) => {
            let kind = e.kind();
            stages.push(Stage::Failed(kind));
            if kind == ErrorKind::InternalError {
                error!("request failed: {e}");
            } else {
                info!(kind = %kind, "request failed: {e}");
            }
            Response::failure(&e)
        }
    };

    RunReport {
        response,
        stages,
        resources,
    }
}
