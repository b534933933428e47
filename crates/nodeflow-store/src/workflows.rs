use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::WorkflowStore;
use nodeflow_core::types::{Workflow, WorkflowDraft};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS workflows (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        nodes_json TEXT NOT NULL,
        edges_json TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );";

const SELECT_COLUMNS: &str =
    "SELECT id, name, description, nodes_json, edges_json, created_at, updated_at FROM workflows";

fn db_err(e: impl std::fmt::Display) -> NodeflowError {
    NodeflowError::Database(e.to_string())
}

type WorkflowRow = (String, String, String, String, String, String, String);

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn into_workflow(row: WorkflowRow) -> Result<Workflow> {
    let (id, name, description, nodes_json, edges_json, created_at, updated_at) = row;
    Ok(Workflow {
        id,
        name,
        description,
        nodes: serde_json::from_str(&nodes_json)?,
        edges: serde_json::from_str(&edges_json)?,
        created_at: parse_time(&created_at),
        updated_at: parse_time(&updated_at),
    })
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkflowRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

/// Workflow documents in SQLite, listed in creation order.
pub struct SqliteWorkflowStore {
    conn: Mutex<Connection>,
}

impl SqliteWorkflowStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    NodeflowError::Database(format!("Failed to create db directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "Workflow store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Workflow>> {
        let row = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                read_row,
            )
            .optional()
            .map_err(db_err)?;
        row.map(into_workflow).transpose()
    }
}

impl WorkflowStore for SqliteWorkflowStore {
    fn list(&self) -> BoxFuture<'_, Result<Vec<Workflow>>> {
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let mut stmt = conn
                .prepare(&format!("{} ORDER BY rowid ASC", SELECT_COLUMNS))
                .map_err(db_err)?;
            let rows = stmt.query_map([], read_row).map_err(db_err)?;

            let mut workflows = Vec::new();
            for row in rows {
                workflows.push(into_workflow(row.map_err(db_err)?)?);
            }
            Ok(workflows)
        })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<Workflow>>> {
        let id = id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            Self::fetch(&conn, &id)
        })
    }

    fn create(&self, draft: WorkflowDraft) -> BoxFuture<'_, Result<Workflow>> {
        Box::pin(async move {
            let now = Utc::now();
            let workflow = Workflow {
                id: uuid::Uuid::new_v4().to_string(),
                name: draft.name,
                description: draft.description,
                created_at: now,
                updated_at: now,
                nodes: draft.nodes,
                edges: draft.edges,
            };

            let nodes_json = serde_json::to_string(&workflow.nodes)?;
            let edges_json = serde_json::to_string(&workflow.edges)?;
            let conn = self.conn.lock().map_err(db_err)?;
            conn.execute(
                "INSERT INTO workflows (id, name, description, nodes_json, edges_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    workflow.id,
                    workflow.name,
                    workflow.description,
                    nodes_json,
                    edges_json,
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .map_err(db_err)?;

            debug!(workflow_id = %workflow.id, "Workflow created");
            Ok(workflow)
        })
    }

    fn update(&self, id: &str, draft: WorkflowDraft) -> BoxFuture<'_, Result<Option<Workflow>>> {
        let id = id.to_string();
        Box::pin(async move {
            let nodes_json = serde_json::to_string(&draft.nodes)?;
            let edges_json = serde_json::to_string(&draft.edges)?;
            let conn = self.conn.lock().map_err(db_err)?;

            let changed = conn
                .execute(
                    "UPDATE workflows
                     SET name = ?2, description = ?3, nodes_json = ?4, edges_json = ?5, updated_at = ?6
                     WHERE id = ?1",
                    params![
                        id,
                        draft.name,
                        draft.description,
                        nodes_json,
                        edges_json,
                        Utc::now().to_rfc3339()
                    ],
                )
                .map_err(db_err)?;

            if changed == 0 {
                return Ok(None);
            }
            debug!(workflow_id = %id, "Workflow updated");
            Self::fetch(&conn, &id)
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, Result<bool>> {
        let id = id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let deleted = conn
                .execute("DELETE FROM workflows WHERE id = ?1", params![id])
                .map_err(db_err)?;
            Ok(deleted > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeflow_core::types::{Edge, Node};

    fn draft(name: &str) -> WorkflowDraft {
        WorkflowDraft {
            name: name.to_string(),
            description: "demo".to_string(),
            nodes: vec![
                Node::new("1", "start", "Start"),
                Node::new("2", "output", "Output").with_position(250.0, 100.0),
            ],
            edges: vec![Edge::new("1", "2")],
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = SqliteWorkflowStore::in_memory().unwrap();
        let created = store.create(draft("First")).await.unwrap();

        assert!(uuid::Uuid::parse_str(&created.id).is_ok());
        assert_eq!(created.created_at, created.updated_at);

        let loaded = store.get(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "First");
        assert_eq!(loaded.nodes, created.nodes);
        assert_eq!(loaded.edges, created.edges);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let store = SqliteWorkflowStore::in_memory().unwrap();
        store.create(draft("a")).await.unwrap();
        store.create(draft("b")).await.unwrap();
        store.create(draft("c")).await.unwrap();

        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_update_replaces_fields() {
        let store = SqliteWorkflowStore::in_memory().unwrap();
        let created = store.create(draft("Old")).await.unwrap();

        let mut next = draft("New");
        next.nodes.truncate(1);
        next.edges.clear();
        let updated = store.update(&created.id, next).await.unwrap().unwrap();

        assert_eq!(updated.name, "New");
        assert_eq!(updated.nodes.len(), 1);
        assert!(updated.edges.is_empty());
        assert!(updated.updated_at >= created.updated_at);

        assert!(store.update("missing", draft("x")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = SqliteWorkflowStore::in_memory().unwrap();
        let created = store.create(draft("gone")).await.unwrap();

        assert!(store.delete(&created.id).await.unwrap());
        assert!(!store.delete(&created.id).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }
}
