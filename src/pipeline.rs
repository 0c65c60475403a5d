//! One run: resolve, project, sync, then metrics

use crate::config::Config;
use crate::corpus::{ProjectBundle, Record};
use crate::metrics::{
    compute_advanced, compute_native, select_strategy, AdvancedOutcome, AlgorithmProvider, BuiltinProvider,
    MetricsError, NativeMetricsReport, ProjectionStrategy,
};
use crate::schema::{resolve, SchemaError, Template};
use crate::storage::{GraphStore, StorageError};
use crate::sync::{project_all, SyncEngine, SyncError, SyncResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Fatal run failures, by stage
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("schema resolution failed: {0}")]
    Schema(#[from] SchemaError),

    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("native metrics failed: {0}")]
    Metrics(#[from] MetricsError),

    #[error("store error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub project: String,
    pub records: usize,
    pub mutations: usize,
    pub sync: SyncResult,
    pub native: NativeMetricsReport,
    pub strategy: ProjectionStrategy,
    pub advanced: AdvancedOutcome,
}

impl RunReport {
    /// True when the run succeeded without advanced metrics
    pub fn is_degraded(&self) -> bool {
        !self.advanced.is_computed()
    }
}

pub struct Pipeline {
    store: Arc<dyn GraphStore>,
    provider: Arc<dyn AlgorithmProvider>,
    advanced_timeout: Duration,
    replace: bool,
}

impl Pipeline {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            provider: Arc::new(BuiltinProvider::default()),
            advanced_timeout: Duration::from_secs(30),
            replace: false,
        }
    }

    pub fn from_config(store: Arc<dyn GraphStore>, config: &Config) -> Self {
        Self::new(store)
            .with_provider(config.metrics.provider())
            .with_advanced_timeout(config.metrics.timeout())
            .with_replace(config.store.replace)
    }

    pub fn with_provider(mut self, provider: Arc<dyn AlgorithmProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_advanced_timeout(mut self, timeout: Duration) -> Self {
        self.advanced_timeout = timeout;
        self
    }

    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub async fn run(&self, bundle: &ProjectBundle) -> Result<RunReport, PipelineError> {
        self.run_records(&bundle.project.name, &bundle.template, &bundle.records)
            .await
    }

    /// Schema and sync errors stop the run with the store untouched. Native
    /// metric errors stop it after the commit. Advanced metrics only degrade.
    pub async fn run_records(
        &self,
        project: &str,
        template: &Template,
        records: &[Record],
    ) -> Result<RunReport, PipelineError> {
        let schema = resolve(template)?;
        info!(
            project,
            fields = schema.mappings().len(),
            concept_labels = schema.concept_labels().len(),
            taxonomy_labels = schema.taxonomy_labels().len(),
            "schema resolved"
        );

        let mutations = project_all(records, &schema);
        let mutation_count = mutations.len();
        info!(records = records.len(), mutations = mutation_count, "records projected");

        let sync = SyncEngine::new(self.store.clone())
            .with_project(project)
            .with_replace(self.replace)
            .sync(mutations, &schema)?;

        let native = compute_native(self.store.as_ref(), &schema)?;

        let committed = self.store.relationship_types()?;
        let strategy = select_strategy(&schema, &committed);
        info!(%strategy, "projection strategy selected");

        let advanced = compute_advanced(
            self.store.as_ref(),
            &schema,
            strategy,
            self.provider.as_ref(),
            self.advanced_timeout,
        )
        .await;

        Ok(RunReport {
            project: project.to_string(),
            records: records.len(),
            mutations: mutation_count,
            sync,
            native,
            strategy,
            advanced,
        })
    }
}
