//! SQLite storage backend

use super::traits::{
    CommitStats, GraphStore, OpenStore, PropertyUpdate, RunRecord, StorageError, StorageResult,
    StoreStats, StoredGraph, UniquenessConstraint, WriteUnit,
};
use crate::graph::{Edge, EdgeKey, Node, NodeKey, Properties};
use crate::schema::is_valid_identifier;
use crate::sync::Mutation;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed property graph
///
/// Nodes are keyed by the deterministic id of `(label, natural_key)`;
/// edges by `(source_id, rel_type, target_id)`. Properties are stored as a
/// JSON object and merged with `json_patch` on upsert, so a re-run leaves
/// metric properties written by earlier runs in place.
///
/// Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                natural_key TEXT NOT NULL,
                properties_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes(label);

            CREATE TABLE IF NOT EXISTS edges (
                source_id TEXT NOT NULL,
                rel_type TEXT NOT NULL,
                target_id TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                PRIMARY KEY (source_id, rel_type, target_id),
                FOREIGN KEY (source_id) REFERENCES nodes(id) ON DELETE CASCADE,
                FOREIGN KEY (target_id) REFERENCES nodes(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);
            CREATE INDEX IF NOT EXISTS idx_edges_rel_type ON edges(rel_type);

            -- One row per committed run
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project TEXT NOT NULL,
                committed_at TEXT NOT NULL,
                replaced INTEGER NOT NULL,
                nodes_upserted INTEGER NOT NULL,
                edges_merged INTEGER NOT NULL
            );

            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn count(tx: &Transaction<'_>, table: &str) -> StorageResult<usize> {
        let n: i64 = tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Partial unique indexes, one per label; returns how many were new
    fn create_constraints(tx: &Transaction<'_>, constraints: &[UniquenessConstraint]) -> StorageResult<usize> {
        let mut created = 0;
        for constraint in constraints {
            // The label is spliced into DDL; only plain identifiers get this far.
            if !is_valid_identifier(&constraint.label) {
                return Err(StorageError::InvalidIdentifier(constraint.label.clone()));
            }
            let name = constraint.name();
            let exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
                params![name],
                |row| row.get(0),
            )?;
            if exists > 0 {
                continue;
            }
            tx.execute(
                &format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {name} ON nodes(natural_key) WHERE label = '{}'",
                    constraint.label
                ),
                [],
            )?;
            created += 1;
        }
        Ok(created)
    }

    fn node_exists(tx: &Transaction<'_>, id: &str) -> StorageResult<bool> {
        let found: Option<i64> = tx
            .query_row("SELECT 1 FROM nodes WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn upsert_node(tx: &Transaction<'_>, key: &NodeKey, properties: &Properties) -> StorageResult<()> {
        tx.execute(
            r#"
            INSERT INTO nodes (id, label, natural_key, properties_json)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                properties_json = json_patch(nodes.properties_json, excluded.properties_json)
            "#,
            params![
                key.node_id().to_string(),
                key.label,
                key.natural_key,
                serde_json::to_string(properties)?,
            ],
        )?;
        Ok(())
    }

    fn merge_edge(tx: &Transaction<'_>, key: &EdgeKey, properties: &Properties) -> StorageResult<()> {
        let source_id = key.from.node_id().to_string();
        let target_id = key.to.node_id().to_string();
        for (id, endpoint) in [(&source_id, &key.from), (&target_id, &key.to)] {
            if !Self::node_exists(tx, id)? {
                return Err(StorageError::MissingEndpoint {
                    edge: key.to_string(),
                    missing: endpoint.to_string(),
                });
            }
        }

        tx.execute(
            r#"
            INSERT INTO edges (source_id, rel_type, target_id, properties_json)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(source_id, rel_type, target_id) DO UPDATE SET
                properties_json = json_patch(edges.properties_json, excluded.properties_json)
            "#,
            params![source_id, key.rel_type, target_id, serde_json::to_string(properties)?],
        )?;
        Ok(())
    }

    /// Deserialize a node from database columns
    fn row_to_node(label: String, natural_key: String, properties_json: String) -> StorageResult<Node> {
        Ok(Node {
            key: NodeKey::new(label, natural_key),
            properties: serde_json::from_str(&properties_json)?,
        })
    }

    /// Endpoint key for an edge row; an unresolved id yields a key that no
    /// node carries, so the snapshot reports the edge as dangling.
    fn endpoint_key(label: Option<String>, natural_key: Option<String>, id: String) -> NodeKey {
        match (label, natural_key) {
            (Some(label), Some(natural_key)) => NodeKey::new(label, natural_key),
            _ => NodeKey::new("", id),
        }
    }

    fn row_to_run(
        id: i64,
        project: String,
        committed_at: String,
        replaced: bool,
        nodes_upserted: i64,
        edges_merged: i64,
    ) -> StorageResult<RunRecord> {
        Ok(RunRecord {
            id,
            project,
            committed_at: DateTime::parse_from_rfc3339(&committed_at)
                .map_err(|e| StorageError::DateParse(e.to_string()))?
                .with_timezone(&Utc),
            replaced,
            nodes_upserted: nodes_upserted as usize,
            edges_merged: edges_merged as usize,
        })
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl GraphStore for SqliteStore {
    // === Write contract ===

    fn commit(&self, unit: &WriteUnit<'_>) -> StorageResult<CommitStats> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        if unit.replace {
            tx.execute("DELETE FROM edges", [])?;
            tx.execute("DELETE FROM nodes", [])?;
        }

        let mut stats = CommitStats {
            constraints_created: Self::create_constraints(&tx, unit.constraints)?,
            ..CommitStats::default()
        };

        let nodes_before = Self::count(&tx, "nodes")?;
        let edges_before = Self::count(&tx, "edges")?;

        // Referential ordering: every node exists before any edge needs it.
        for m in unit.mutations {
            if let Mutation::NodeUpsert { key, properties } = m {
                Self::upsert_node(&tx, key, properties)?;
                stats.nodes_upserted += 1;
            }
        }
        for m in unit.mutations {
            if let Mutation::EdgeMerge { key, properties } = m {
                Self::merge_edge(&tx, key, properties)?;
                stats.edges_merged += 1;
            }
        }

        stats.nodes_created = Self::count(&tx, "nodes")?.saturating_sub(nodes_before);
        stats.edges_created = Self::count(&tx, "edges")?.saturating_sub(edges_before);

        tx.execute(
            r#"
            INSERT INTO runs (project, committed_at, replaced, nodes_upserted, edges_merged)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                unit.project,
                Utc::now().to_rfc3339(),
                unit.replace,
                stats.nodes_upserted as i64,
                stats.edges_merged as i64,
            ],
        )?;
        stats.run_id = tx.last_insert_rowid();

        tx.commit()?;
        Ok(stats)
    }

    fn write_properties(&self, updates: &[PropertyUpdate]) -> StorageResult<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut changed = 0;

        {
            let mut stmt = tx.prepare(
                "UPDATE nodes SET properties_json = json_patch(properties_json, ?2) WHERE id = ?1",
            )?;
            for update in updates {
                let props = serde_json::to_string(&update.properties)?;
                changed += stmt.execute(params![update.key.node_id().to_string(), props])?;
            }
        }

        tx.commit()?;
        Ok(changed)
    }

    fn remove_properties(&self, names: &[&str]) -> StorageResult<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let paths: Vec<String> = names.iter().map(|n| format!("$.\"{n}\"")).collect();
        let mut touched: BTreeSet<String> = BTreeSet::new();
        {
            let mut find = tx.prepare("SELECT id FROM nodes WHERE json_type(properties_json, ?1) IS NOT NULL")?;
            let mut remove = tx.prepare(
                "UPDATE nodes SET properties_json = json_remove(properties_json, ?1)
                 WHERE json_type(properties_json, ?1) IS NOT NULL",
            )?;
            for path in &paths {
                let ids = find.query_map(params![path], |row| row.get::<_, String>(0))?;
                for id in ids {
                    touched.insert(id?);
                }
                remove.execute(params![path])?;
            }
        }

        tx.commit()?;
        Ok(touched.len())
    }

    // === Read contract ===

    fn relationship_types(&self) -> StorageResult<BTreeSet<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT rel_type FROM edges")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut types = BTreeSet::new();
        for row in rows {
            types.insert(row?);
        }
        Ok(types)
    }

    fn load_graph(&self) -> StorageResult<StoredGraph> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT label, natural_key, properties_json FROM nodes ORDER BY label, natural_key",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut nodes = Vec::new();
        for row in rows {
            let (label, natural_key, props) = row?;
            nodes.push(Self::row_to_node(label, natural_key, props)?);
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT s.label, s.natural_key, e.source_id, e.rel_type,
                   t.label, t.natural_key, e.target_id, e.properties_json
            FROM edges e
            LEFT JOIN nodes s ON s.id = e.source_id
            LEFT JOIN nodes t ON t.id = e.target_id
            ORDER BY s.label, s.natural_key, e.rel_type, t.label, t.natural_key
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;
        let mut edges = Vec::new();
        for row in rows {
            let (s_label, s_key, s_id, rel_type, t_label, t_key, t_id, props) = row?;
            edges.push(Edge {
                key: EdgeKey::new(
                    Self::endpoint_key(s_label, s_key, s_id),
                    rel_type,
                    Self::endpoint_key(t_label, t_key, t_id),
                ),
                properties: serde_json::from_str(&props)?,
            });
        }

        Ok(StoredGraph { nodes, edges })
    }

    fn load_node(&self, key: &NodeKey) -> StorageResult<Option<Node>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<String> = conn
            .query_row(
                "SELECT properties_json FROM nodes WHERE id = ?1",
                params![key.node_id().to_string()],
                |row| row.get(0),
            )
            .optional()?;

        row.map(|props| Self::row_to_node(key.label.clone(), key.natural_key.clone(), props))
            .transpose()
    }

    fn stats(&self) -> StorageResult<StoreStats> {
        let conn = self.conn.lock().unwrap();
        let mut stats = StoreStats::default();

        let mut stmt = conn.prepare("SELECT label, COUNT(*) FROM nodes GROUP BY label")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (label, n) = row?;
            stats.nodes_by_label.insert(label, n as usize);
        }

        let mut stmt = conn.prepare("SELECT rel_type, COUNT(*) FROM edges GROUP BY rel_type")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (rel_type, n) = row?;
            stats.edges_by_type.insert(rel_type, n as usize);
        }

        let last: Option<(i64, String, String, bool, i64, i64)> = conn
            .query_row(
                "SELECT id, project, committed_at, replaced, nodes_upserted, edges_merged
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?)),
            )
            .optional()?;
        stats.last_run = last
            .map(|(id, project, at, replaced, n, e)| Self::row_to_run(id, project, at, replaced, n, e))
            .transpose()?;

        Ok(stats)
    }
}
