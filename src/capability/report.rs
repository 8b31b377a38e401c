//! Report sink: the one capability implemented locally
//!
//! The model hands over a finished markdown summary and decides whether it
//! should be written to disk or just echoed back into the reply.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{CapabilityDescriptor, CapabilityKind, LocalCapability};
use crate::error::ReportError;

pub const GENERATE_SUMMARY: &str = "generate_cluster_summary";
pub const REPORT_FILE_NAME: &str = "cluster_summary.md";

const GENERATE_SUMMARY_DESCRIPTION: &str =
    "Generate a detailed Markdown summary of the Kubernetes cluster and save it to a file.";

/// Arguments of `generate_cluster_summary`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GenerateSummaryArgs {
    /// The complete cluster summary, formatted as Markdown
    pub summary_markdown: String,
    /// Write the summary to the report directory instead of returning it inline
    pub save_file: bool,
}

/// Persists the cluster summary under a fixed file name
#[derive(Debug, Clone)]
pub struct ReportSink {
    directory: PathBuf,
}

impl ReportSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the single report artifact
    pub fn report_path(&self) -> PathBuf {
        self.directory.join(REPORT_FILE_NAME)
    }

    /// Return `content` inline, or write it and return a confirmation
    ///
    /// Saving overwrites any previous report; the directory is created on
    /// demand.
    pub async fn generate(&self, content: &str, persist: bool) -> Result<String, ReportError> {
        if !persist {
            return Ok(content.to_string());
        }

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| ReportError::CreateDir {
                path: self.directory.clone(),
                source,
            })?;

        let path = self.report_path();
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| ReportError::Write {
                path: path.clone(),
                source,
            })?;

        log::info!("Wrote cluster summary ({} bytes) to {}", content.len(), path.display());

        Ok(format!(
            "Cluster summary document generated: `{}`",
            path.display()
        ))
    }

    /// Descriptor advertised to the model
    pub fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: GENERATE_SUMMARY.to_string(),
            description: GENERATE_SUMMARY_DESCRIPTION.to_string(),
            parameters: summary_parameters_schema(),
            kind: CapabilityKind::Local(LocalCapability::GenerateClusterSummary),
        }
    }
}

fn summary_parameters_schema() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(GenerateSummaryArgs))
        .unwrap_or_else(|_| Value::Object(Default::default()));
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
}
