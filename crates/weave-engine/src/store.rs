use crate::history::HistoryEntry;
use crate::simulation::Simulation;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use weave_analyzer::ImpactAnalysis;
use weave_common::{Result, WeaveError};
use weave_core::Token;
use weave_graph::{DependencyGraph, Mapping};

/// Everything the engine needs to resume in a later process
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub tokens: Vec<Token>,
    pub graph: DependencyGraph,
    pub mappings: Vec<Mapping>,
    pub simulations: Vec<Simulation>,
    pub history: Vec<HistoryEntry>,
    pub analyses: Vec<ImpactAnalysis>,
}

/// Persistence port for engine state
pub trait StateStore {
    fn load(&self) -> Result<Option<EngineSnapshot>>;
    fn save(&mut self, snapshot: &EngineSnapshot) -> Result<()>;
}

/// Keeps the last saved snapshot in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Option<EngineSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<EngineSnapshot>> {
        Ok(self.snapshot.clone())
    }

    fn save(&mut self, snapshot: &EngineSnapshot) -> Result<()> {
        self.snapshot = Some(snapshot.clone());
        Ok(())
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS simulations (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS history (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    simulation_id TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS analyses (
    id TEXT PRIMARY KEY,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS state (
    key TEXT PRIMARY KEY,
    body TEXT NOT NULL
);
";

fn storage(e: rusqlite::Error) -> WeaveError {
    WeaveError::Storage(e.to_string())
}

/// SQLite-backed store, one JSON document per record
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(storage)?;
        conn.execute_batch(SCHEMA).map_err(storage)?;
        debug!("Opened state store at {}", path.display());
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        conn.execute_batch(SCHEMA).map_err(storage)?;
        Ok(Self { conn })
    }

    fn rows<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(sql).map_err(storage)?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(storage)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(storage)?;
        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(WeaveError::from))
            .collect()
    }

    fn state<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let body: Option<String> = self
            .conn
            .query_row("SELECT body FROM state WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(storage)?;
        body.map(|b| serde_json::from_str(&b).map_err(WeaveError::from))
            .transpose()
    }
}

impl StateStore for SqliteStore {
    fn load(&self) -> Result<Option<EngineSnapshot>> {
        let tokens: Vec<Token> = self.rows("SELECT body FROM tokens ORDER BY id")?;
        let graph: Option<DependencyGraph> = self.state("graph")?;
        if tokens.is_empty() && graph.is_none() {
            return Ok(None);
        }

        Ok(Some(EngineSnapshot {
            tokens,
            graph: graph.unwrap_or_default(),
            mappings: self.state("mappings")?.unwrap_or_default(),
            simulations: self.rows("SELECT body FROM simulations ORDER BY created_at, id")?,
            history: self.rows("SELECT body FROM history ORDER BY seq")?,
            analyses: self.rows("SELECT body FROM analyses ORDER BY id")?,
        }))
    }

    fn save(&mut self, snapshot: &EngineSnapshot) -> Result<()> {
        let tx = self.conn.transaction().map_err(storage)?;
        tx.execute_batch(
            "DELETE FROM tokens; DELETE FROM simulations; DELETE FROM history;
             DELETE FROM analyses; DELETE FROM state;",
        )
        .map_err(storage)?;

        for token in &snapshot.tokens {
            tx.execute(
                "INSERT INTO tokens (id, body) VALUES (?1, ?2)",
                params![token.id, serde_json::to_string(token)?],
            )
            .map_err(storage)?;
        }
        for sim in &snapshot.simulations {
            tx.execute(
                "INSERT INTO simulations (id, created_at, body) VALUES (?1, ?2, ?3)",
                params![sim.id, sim.created_at.to_rfc3339(), serde_json::to_string(sim)?],
            )
            .map_err(storage)?;
        }
        for entry in &snapshot.history {
            tx.execute(
                "INSERT INTO history (simulation_id, body) VALUES (?1, ?2)",
                params![entry.simulation_id, serde_json::to_string(entry)?],
            )
            .map_err(storage)?;
        }
        for analysis in &snapshot.analyses {
            tx.execute(
                "INSERT INTO analyses (id, body) VALUES (?1, ?2)",
                params![analysis.id, serde_json::to_string(analysis)?],
            )
            .map_err(storage)?;
        }
        tx.execute(
            "INSERT INTO state (key, body) VALUES ('graph', ?1), ('mappings', ?2)",
            params![
                serde_json::to_string(&snapshot.graph)?,
                serde_json::to_string(&snapshot.mappings)?
            ],
        )
        .map_err(storage)?;

        tx.commit().map_err(storage)?;
        info!(
            "Saved state: {} tokens, {} simulations, {} history entries",
            snapshot.tokens.len(),
            snapshot.simulations.len(),
            snapshot.history.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::SimulationStatus;
    use chrono::Utc;
    use weave_core::TokenType;

    fn snapshot() -> EngineSnapshot {
        EngineSnapshot {
            tokens: vec![Token::new("spacing-md", "md", TokenType::Spacing, "16px")],
            history: vec![
                HistoryEntry {
                    simulation_id: "sim-1".to_string(),
                    timestamp: Utc::now(),
                    status: SimulationStatus::Simulated,
                    token_id: "spacing-md".to_string(),
                    summary: "simulated".to_string(),
                },
                HistoryEntry {
                    simulation_id: "sim-1".to_string(),
                    timestamp: Utc::now(),
                    status: SimulationStatus::Applied,
                    token_id: "spacing-md".to_string(),
                    summary: "applied".to_string(),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_sqlite_store_keeps_history_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.save(&snapshot()).unwrap();
            // saving again replaces, never duplicates
            store.save(&snapshot()).unwrap();
        }

        let loaded = SqliteStore::open(&path).unwrap().load().unwrap().unwrap();
        assert_eq!(loaded.tokens.len(), 1);
        let statuses: Vec<_> = loaded.history.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![SimulationStatus::Simulated, SimulationStatus::Applied]
        );
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());
        store.save(&snapshot()).unwrap();
        assert_eq!(store.load().unwrap().unwrap().history.len(), 2);
    }
}
