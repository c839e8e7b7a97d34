//! PDF Ops Core Library
//!
//! Structural PDF operations driven by storage-backed requests:
//! - Document model and codec over `lopdf`
//! - Transforms: merge, split, rotate, watermark, protect, unlock
//! - Standard Security Handler (RC4, revision 3)
//! - Storage adapters (HTTP object store, local directory, in-memory)
//! - Request pipeline with request-scoped temporary resources

pub mod config;
pub mod error;
pub mod pdf;
pub mod pipeline;
pub mod request;
pub mod storage;
pub mod transform;
pub mod util;

pub use config::{AppConfig, PipelineConfig, StorageBackend, StorageConfig, WatermarkStyle};
pub use error::{Error, ErrorKind, Result, StorageError};
pub use pdf::{Document, MediaBox, Page, PageIndex, Rotation, SecurityState, decode, encode};
pub use pipeline::{Pipeline, PipelineContext, ResourceCounts, RunReport, Stage};
pub use request::{Job, Operation, OperationRequest, RequestOptions, Response, TargetFormat};
pub use storage::{DirStorage, HttpStorage, MemoryStorage, Storage, StorageInfo, create_storage};
pub use transform::Artifact;

use tracing::info;

/// Build a pipeline from configuration
pub fn create_pipeline(config: &AppConfig) -> Result<Pipeline> {
    config.validate()?;
    let storage = create_storage(&config.storage)?;
    info!(
        "Using {} storage at {}",
        storage.info().name,
        storage.info().location
    );
    Ok(Pipeline::new(storage, PipelineContext::default(), config.pipeline.clone())
        .with_watermark_style(config.watermark))
}

/// Apply `operation` to in-memory PDFs and return the encoded result.
///
/// Conversions pass the first input through undecoded.
pub fn apply_to_bytes(operation: &Operation, inputs: &[Vec<u8>], style: &WatermarkStyle) -> Result<Vec<u8>> {
    let artifacts = if operation.is_conversion() {
        inputs.iter().cloned().map(Artifact::Raw).collect()
    } else {
        inputs
            .iter()
            .map(|bytes| decode(bytes).map(Artifact::Document))
            .collect::<Result<Vec<_>>>()?
    };
    transform::apply(operation, artifacts, style)?.into_bytes()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::testing::{PageSpec, build_pdf};

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.result_prefix, "results");
        assert_eq!(config.storage.backend, StorageBackend::Http);
    }

    #[test]
    fn test_apply_to_bytes_merges() {
        let one = build_pdf(&[PageSpec::default()]);
        let two = build_pdf(&[PageSpec::default(), PageSpec::default()]);
        let merged = apply_to_bytes(&Operation::Merge, &[one, two], &WatermarkStyle::default()).unwrap();
        assert_eq!(decode(&merged).unwrap().page_count(), 3);
    }

    #[test]
    fn test_create_pipeline_rejects_bad_config() {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.pipeline.fetch_concurrency = 0;
        assert!(create_pipeline(&config).is_err());
    }
}
