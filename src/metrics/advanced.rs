//! Advanced metrics behind a probed, optional algorithm capability
//!
//! The probe result is explicit: a provider either hands back a usable
//! engine or says why there is none. Every failure after that point
//! (timeout, engine error, bad output, store trouble) ends the stage the
//! same way as a missing capability, with the run still successful.

use super::algorithms::{betweenness, label_propagation, pagerank, PageRankParams};
use super::projection::Projection;
use super::property;
use super::strategy::ProjectionStrategy;
use crate::graph::{GraphSnapshot, NodeKey};
use crate::schema::GraphSchemaDescriptor;
use crate::storage::{GraphStore, PropertyUpdate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Label propagation sweeps for the builtin engine
const COMMUNITY_ITERATIONS: usize = 100;

/// Scores for one projected concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedScores {
    pub key: NodeKey,
    pub pagerank: f64,
    pub betweenness: f64,
    pub community: i64,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine failed: {0}")]
    Failed(String),

    #[error("engine output could not be parsed: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Computes centrality, bridging and community scores over a projection
#[async_trait]
pub trait AlgorithmEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, projection: &Projection) -> Result<Vec<AdvancedScores>, EngineError>;
}

/// Outcome of probing for the algorithms capability
pub enum Capability {
    Available(Arc<dyn AlgorithmEngine>),
    Unavailable(String),
}

/// Source of an [`AlgorithmEngine`], asked once per run
#[async_trait]
pub trait AlgorithmProvider: Send + Sync {
    async fn probe(&self) -> Capability;
}

/// In-process engine: weighted PageRank, Brandes betweenness and label
/// propagation communities.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEngine {
    pub params: PageRankParams,
}

#[async_trait]
impl AlgorithmEngine for BuiltinEngine {
    fn name(&self) -> &str {
        "builtin"
    }

    async fn run(&self, projection: &Projection) -> Result<Vec<AdvancedScores>, EngineError> {
        let adjacency = projection.adjacency();
        let keys = projection.nodes.clone();
        let params = self.params;

        tokio::task::spawn_blocking(move || {
            let ranks = pagerank(&adjacency, params);
            debug!(iterations = ranks.iterations, delta = ranks.delta, "pagerank finished");
            let bridging = betweenness(&adjacency);
            let communities = label_propagation(&adjacency, COMMUNITY_ITERATIONS);

            keys.into_iter()
                .enumerate()
                .map(|(i, key)| AdvancedScores {
                    key,
                    pagerank: ranks.scores[i],
                    betweenness: bridging[i],
                    community: communities[i],
                })
                .collect()
        })
        .await
        .map_err(|e| EngineError::Failed(e.to_string()))
    }
}

/// Always available; hands out a [`BuiltinEngine`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProvider {
    pub params: PageRankParams,
}

impl BuiltinProvider {
    pub fn new(params: PageRankParams) -> Self {
        Self { params }
    }
}

#[async_trait]
impl AlgorithmProvider for BuiltinProvider {
    async fn probe(&self) -> Capability {
        Capability::Available(Arc::new(BuiltinEngine { params: self.params }))
    }
}

/// Never available
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProvider;

#[async_trait]
impl AlgorithmProvider for DisabledProvider {
    async fn probe(&self) -> Capability {
        Capability::Unavailable("advanced metrics are disabled".to_string())
    }
}

/// An external command speaking JSON over stdio.
///
/// The probe runs `<command> --version`. A run writes the projection's
/// wire form to stdin and expects `{"updates": [AdvancedScores, ...]}` on
/// stdout.
#[derive(Debug, Clone)]
pub struct ExternalProvider {
    pub command: String,
    pub args: Vec<String>,
}

impl ExternalProvider {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl AlgorithmProvider for ExternalProvider {
    async fn probe(&self) -> Capability {
        let status = Command::new(&self.command)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;

        match status {
            Ok(s) if s.success() => Capability::Available(Arc::new(ExternalEngine {
                command: self.command.clone(),
                args: self.args.clone(),
            })),
            Ok(s) => Capability::Unavailable(format!("'{} --version' exited with {s}", self.command)),
            Err(e) => Capability::Unavailable(format!("cannot start '{}': {e}", self.command)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExternalResponse {
    updates: Vec<AdvancedScores>,
}

struct ExternalEngine {
    command: String,
    args: Vec<String>,
}

#[async_trait]
impl AlgorithmEngine for ExternalEngine {
    fn name(&self) -> &str {
        &self.command
    }

    async fn run(&self, projection: &Projection) -> Result<Vec<AdvancedScores>, EngineError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let input = projection.to_json().to_string();
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Failed("no stdin available".to_string()))?;
        // Feed stdin while stdout is drained, or an engine that answers
        // before reading everything blocks on a full pipe.
        let writer = tokio::spawn(async move {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await
        });

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed(format!("exited with {}: {}", output.status, stderr.trim())));
        }
        writer
            .await
            .map_err(|e| EngineError::Failed(format!("stdin writer: {e}")))??;

        parse_engine_output(&output.stdout)
    }
}

fn parse_engine_output(stdout: &[u8]) -> Result<Vec<AdvancedScores>, EngineError> {
    let response: ExternalResponse =
        serde_json::from_slice(stdout).map_err(|e| EngineError::Output(e.to_string()))?;
    Ok(response.updates)
}

/// Why advanced metrics are missing from this run
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UnavailableReason {
    #[error("capability unavailable: {0}")]
    Capability(String),

    #[error("projection has no nodes or no edges")]
    EmptyProjection,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("engine failed: {0}")]
    Engine(String),

    #[error("engine returned invalid scores: {0}")]
    InvalidOutput(String),

    #[error("store error: {0}")]
    Store(String),
}

/// A degraded advanced stage. The run is still successful.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvancedMetricsUnavailable {
    pub strategy: ProjectionStrategy,
    pub reason: UnavailableReason,
    /// Properties absent from this run's results
    pub missing: Vec<String>,
    /// Nodes whose stale advanced properties were removed
    pub cleared: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvancedMetricsReport {
    pub strategy: ProjectionStrategy,
    pub engine: String,
    pub nodes: usize,
    pub edges: usize,
    pub communities: usize,
    pub written: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdvancedOutcome {
    Computed(AdvancedMetricsReport),
    Unavailable(AdvancedMetricsUnavailable),
}

impl AdvancedOutcome {
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }
}

/// One bounded attempt at advanced metrics.
///
/// `limit` covers the probe and the computation together. Never fails:
/// problems come back as [`AdvancedOutcome::Unavailable`], after previously
/// written advanced properties have been removed.
pub async fn compute_advanced(
    store: &dyn GraphStore,
    schema: &GraphSchemaDescriptor,
    strategy: ProjectionStrategy,
    provider: &dyn AlgorithmProvider,
    limit: Duration,
) -> AdvancedOutcome {
    match attempt(store, schema, strategy, provider, limit).await {
        Ok(report) => {
            info!(
                %strategy,
                engine = %report.engine,
                nodes = report.nodes,
                edges = report.edges,
                communities = report.communities,
                "advanced metrics written"
            );
            AdvancedOutcome::Computed(report)
        }
        Err(reason) => AdvancedOutcome::Unavailable(degrade(store, strategy, reason)),
    }
}

async fn attempt(
    store: &dyn GraphStore,
    schema: &GraphSchemaDescriptor,
    strategy: ProjectionStrategy,
    provider: &dyn AlgorithmProvider,
    limit: Duration,
) -> Result<AdvancedMetricsReport, UnavailableReason> {
    let deadline = Instant::now() + limit;

    let engine = match timeout_at(deadline, provider.probe()).await {
        Ok(Capability::Available(engine)) => engine,
        Ok(Capability::Unavailable(why)) => return Err(UnavailableReason::Capability(why)),
        Err(_) => return Err(UnavailableReason::Timeout(limit)),
    };

    let stored = store.load_graph().map_err(|e| UnavailableReason::Store(e.to_string()))?;
    let snapshot =
        GraphSnapshot::build(stored.nodes, stored.edges).map_err(|e| UnavailableReason::Store(e.to_string()))?;
    let projection = Projection::build(&snapshot, schema, strategy);
    if projection.is_empty() {
        return Err(UnavailableReason::EmptyProjection);
    }
    debug!(
        %strategy,
        nodes = projection.node_count(),
        edges = projection.edge_count(),
        "projection materialized"
    );

    let scores = match timeout_at(deadline, engine.run(&projection)).await {
        Ok(Ok(scores)) => scores,
        Ok(Err(EngineError::Output(e))) => return Err(UnavailableReason::InvalidOutput(e)),
        Ok(Err(e)) => return Err(UnavailableReason::Engine(e.to_string())),
        Err(_) => return Err(UnavailableReason::Timeout(limit)),
    };
    let updates = to_updates(&projection, scores)?;
    let communities = updates
        .iter()
        .filter_map(|u| u.properties.get(property::COMMUNITY).and_then(|v| v.as_i64()))
        .collect::<BTreeSet<_>>()
        .len();

    // Nodes that dropped out of the projection must not keep old scores.
    store
        .remove_properties(&property::ADVANCED)
        .map_err(|e| UnavailableReason::Store(e.to_string()))?;
    let written = store
        .write_properties(&updates)
        .map_err(|e| UnavailableReason::Store(e.to_string()))?;

    Ok(AdvancedMetricsReport {
        strategy,
        engine: engine.name().to_string(),
        nodes: projection.node_count(),
        edges: projection.edge_count(),
        communities,
        written,
    })
}

fn to_updates(projection: &Projection, scores: Vec<AdvancedScores>) -> Result<Vec<PropertyUpdate>, UnavailableReason> {
    let known: BTreeSet<&NodeKey> = projection.nodes.iter().collect();
    let mut updates = Vec::with_capacity(scores.len());
    for s in scores {
        if !known.contains(&s.key) {
            return Err(UnavailableReason::InvalidOutput(format!("{} is not in the projection", s.key)));
        }
        if !s.pagerank.is_finite() || !s.betweenness.is_finite() {
            return Err(UnavailableReason::InvalidOutput(format!("non-finite score for {}", s.key)));
        }
        updates.push(
            PropertyUpdate::new(s.key)
                .with_property(property::PAGERANK, s.pagerank)
                .with_property(property::BETWEENNESS, s.betweenness)
                .with_property(property::COMMUNITY, s.community),
        );
    }
    Ok(updates)
}

fn degrade(store: &dyn GraphStore, strategy: ProjectionStrategy, reason: UnavailableReason) -> AdvancedMetricsUnavailable {
    let cleared = match store.remove_properties(&property::ADVANCED) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "could not clear stale advanced metrics");
            0
        }
    };
    warn!(%strategy, %reason, cleared, "advanced metrics unavailable; native metrics stand");

    AdvancedMetricsUnavailable {
        strategy,
        reason,
        missing: property::ADVANCED.iter().map(|p| p.to_string()).collect(),
        cleared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyValue;
    use crate::metrics::WeightedEdge;
    use crate::schema::{resolve, FieldDeclaration, FieldKind, Template};
    use crate::storage::{OpenStore, SqliteStore, WriteUnit};
    use crate::sync::Mutation;

    fn schema() -> GraphSchemaDescriptor {
        resolve(&Template::new(vec![FieldDeclaration::new("chain", FieldKind::Chain)])).unwrap()
    }

    fn concept(k: &str) -> NodeKey {
        NodeKey::new("Chain", k)
    }

    /// A -> B -> C as RELATES_TO
    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let mutations = vec![
            Mutation::node(concept("A")),
            Mutation::node(concept("B")),
            Mutation::node(concept("C")),
            Mutation::edge(concept("A"), "RELATES_TO", concept("B")),
            Mutation::edge(concept("B"), "RELATES_TO", concept("C")),
        ];
        store
            .commit(&WriteUnit {
                project: "test",
                mutations: &mutations,
                constraints: &[],
                replace: false,
            })
            .unwrap();
        store
    }

    fn prop(store: &SqliteStore, key: &NodeKey, name: &str) -> Option<PropertyValue> {
        store.load_node(key).unwrap().and_then(|n| n.property(name).cloned())
    }

    struct FailingEngine;

    #[async_trait]
    impl AlgorithmEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run(&self, _projection: &Projection) -> Result<Vec<AdvancedScores>, EngineError> {
            Err(EngineError::Failed("boom".to_string()))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl AlgorithmProvider for FailingProvider {
        async fn probe(&self) -> Capability {
            Capability::Available(Arc::new(FailingEngine))
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl AlgorithmProvider for HangingProvider {
        async fn probe(&self) -> Capability {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Capability::Unavailable("unreachable".to_string())
        }
    }

    async fn run(store: &SqliteStore, provider: &dyn AlgorithmProvider, limit: Duration) -> AdvancedOutcome {
        compute_advanced(store, &schema(), ProjectionStrategy::RelatesTo, provider, limit).await
    }

    #[tokio::test]
    async fn builtin_engine_writes_scores() {
        let store = store();
        let outcome = run(&store, &BuiltinProvider::default(), Duration::from_secs(30)).await;

        let AdvancedOutcome::Computed(report) = outcome else {
            panic!("expected computed outcome");
        };
        assert_eq!(report.nodes, 3);
        assert_eq!(report.edges, 2);
        assert_eq!(report.written, 3);
        assert_eq!(report.engine, "builtin");

        let middle = prop(&store, &concept("B"), property::BETWEENNESS).and_then(|v| v.as_f64());
        assert_eq!(middle, Some(1.0));
        let rank_c = prop(&store, &concept("C"), property::PAGERANK).and_then(|v| v.as_f64()).unwrap();
        let rank_a = prop(&store, &concept("A"), property::PAGERANK).and_then(|v| v.as_f64()).unwrap();
        assert!(rank_c > rank_a);
        assert!(prop(&store, &concept("A"), property::COMMUNITY).is_some());
    }

    #[tokio::test]
    async fn disabled_provider_degrades_and_clears_stale_scores() {
        let store = store();
        assert!(run(&store, &BuiltinProvider::default(), Duration::from_secs(30)).await.is_computed());

        let outcome = run(&store, &DisabledProvider, Duration::from_secs(30)).await;
        let AdvancedOutcome::Unavailable(unavailable) = outcome else {
            panic!("expected unavailable outcome");
        };
        assert!(matches!(unavailable.reason, UnavailableReason::Capability(_)));
        assert_eq!(unavailable.cleared, 3);
        assert_eq!(unavailable.missing, vec!["pagerank", "betweenness", "community"]);
        assert!(prop(&store, &concept("A"), property::PAGERANK).is_none());
    }

    #[tokio::test]
    async fn engine_failure_degrades() {
        let store = store();
        let outcome = run(&store, &FailingProvider, Duration::from_secs(30)).await;
        assert!(matches!(
            outcome,
            AdvancedOutcome::Unavailable(AdvancedMetricsUnavailable {
                reason: UnavailableReason::Engine(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn probe_is_bounded_by_the_limit() {
        let store = store();
        let outcome = run(&store, &HangingProvider, Duration::from_millis(50)).await;
        assert!(matches!(
            outcome,
            AdvancedOutcome::Unavailable(AdvancedMetricsUnavailable {
                reason: UnavailableReason::Timeout(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn empty_projection_degrades() {
        let store = SqliteStore::open_in_memory().unwrap();
        let outcome = run(&store, &BuiltinProvider::default(), Duration::from_secs(30)).await;
        assert!(matches!(
            outcome,
            AdvancedOutcome::Unavailable(AdvancedMetricsUnavailable {
                reason: UnavailableReason::EmptyProjection,
                ..
            })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn external_engine_may_answer_before_reading_its_input() {
        // Large enough on both sides to fill the stdin and stdout pipes.
        let nodes: Vec<NodeKey> = (0..6000).map(|i| NodeKey::new("Code", format!("concept-{i}"))).collect();
        let edges = (1..nodes.len())
            .map(|i| WeightedEdge {
                source: i - 1,
                target: i,
                weight: 1.0,
            })
            .collect();
        let projection = Projection {
            strategy: ProjectionStrategy::RelatesTo,
            nodes,
            edges,
        };
        let engine = ExternalEngine {
            command: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "head -c 200000 /dev/zero | tr '\\0' ' '; cat > /dev/null; echo '{\"updates\":[]}'".to_string(),
            ],
        };

        let scores = tokio::time::timeout(Duration::from_secs(20), engine.run(&projection))
            .await
            .expect("engine run should not deadlock")
            .unwrap();
        assert!(scores.is_empty());
    }

    #[tokio::test]
    async fn missing_external_command_is_unavailable() {
        let provider = ExternalProvider::new("synesis-graph-no-such-engine", Vec::new());
        assert!(matches!(provider.probe().await, Capability::Unavailable(_)));
    }

    #[test]
    fn engine_output_is_parsed_from_updates() {
        let raw = br#"{"updates":[{"key":{"label":"Chain","natural_key":"A"},"pagerank":0.5,"betweenness":0.0,"community":2}]}"#;
        let scores = parse_engine_output(raw).unwrap();
        assert_eq!(scores[0].key, concept("A"));
        assert_eq!(scores[0].community, 2);
        assert!(matches!(parse_engine_output(b"not json"), Err(EngineError::Output(_))));
    }

    #[test]
    fn scores_for_unknown_nodes_are_rejected() {
        let projection = Projection {
            strategy: ProjectionStrategy::RelatesTo,
            nodes: vec![concept("A")],
            edges: Vec::new(),
        };
        let scores = vec![AdvancedScores {
            key: concept("Z"),
            pagerank: 1.0,
            betweenness: 0.0,
            community: 0,
        }];
        assert!(matches!(
            to_updates(&projection, scores),
            Err(UnavailableReason::InvalidOutput(_))
        ));
    }
}
