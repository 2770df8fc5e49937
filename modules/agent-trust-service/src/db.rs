//! SQLite index of emitted registry events.
//!
//! Registry state lives in memory; this index only mirrors the event stream
//! for off-chain consumers. Each service start opens a new deployment row and
//! tags its events with it, so sequence numbers never collide across runs.

use agent_trust_types::EventEntry;
use parking_lot::Mutex;
use rusqlite::Result as SqliteResult;

pub struct Db {
    conn: Mutex<rusqlite::Connection>,
}

impl Db {
    pub fn open(path: &str) -> SqliteResult<Self> {
        let conn = if path == ":memory:" {
            rusqlite::Connection::open_in_memory()?
        } else {
            rusqlite::Connection::open(path)?
        };
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> SqliteResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS deployments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                config TEXT NOT NULL,
                started_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS registry_events (
                deployment_id INTEGER NOT NULL REFERENCES deployments(id),
                seq INTEGER NOT NULL,
                height INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (deployment_id, seq)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_registry_events_type
             ON registry_events(deployment_id, event_type)",
            [],
        )?;
        Ok(())
    }

    /// Record a new deployment and return its ID
    pub fn start_deployment(&self, config_json: &str) -> Result<i64, String> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO deployments (config) VALUES (?1)",
            rusqlite::params![config_json],
        )
        .map_err(|e| format!("Failed to record deployment: {}", e))?;
        Ok(conn.last_insert_rowid())
    }

    /// Store an event. Re-inserting a known sequence number is a no-op.
    pub fn insert_event(&self, deployment_id: i64, entry: &EventEntry) -> Result<(), String> {
        let conn = self.conn.lock();
        let payload = serde_json::to_string(&entry.payload)
            .map_err(|e| format!("Failed to encode event payload: {}", e))?;
        conn.execute(
            "INSERT OR IGNORE INTO registry_events
                (deployment_id, seq, height, event_type, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                deployment_id,
                entry.seq as i64,
                entry.height as i64,
                entry.event_type,
                payload,
                entry.recorded_at
            ],
        )
        .map_err(|e| format!("Failed to insert event: {}", e))?;
        Ok(())
    }

    /// Highest stored sequence number, 0 when none
    pub fn latest_seq(&self, deployment_id: i64) -> Result<u64, String> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM registry_events WHERE deployment_id = ?1",
            rusqlite::params![deployment_id],
            |r| r.get::<_, i64>(0),
        )
        .map(|seq| seq as u64)
        .map_err(|e| format!("Database error: {}", e))
    }

    /// Events with `seq > since`, oldest first
    pub fn events_since(
        &self,
        deployment_id: i64,
        since: u64,
        limit: u32,
    ) -> Result<Vec<EventEntry>, String> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT seq, height, event_type, payload, recorded_at
                 FROM registry_events
                 WHERE deployment_id = ?1 AND seq > ?2
                 ORDER BY seq ASC
                 LIMIT ?3",
            )
            .map_err(|e| format!("Failed to prepare query: {}", e))?;

        let rows = stmt
            .query_map(
                rusqlite::params![deployment_id, since as i64, limit],
                |row| row_to_event(row),
            )
            .map_err(|e| format!("Failed to query: {}", e))?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(|e| format!("Failed to read event: {}", e))?);
        }
        Ok(events)
    }

    pub fn count_events(&self, deployment_id: i64) -> Result<u64, String> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM registry_events WHERE deployment_id = ?1",
            rusqlite::params![deployment_id],
            |r| r.get::<_, i64>(0),
        )
        .map(|n| n as u64)
        .map_err(|e| format!("Database error: {}", e))
    }
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<EventEntry> {
    let payload: String = row.get(3)?;
    let payload = serde_json::from_str(&payload).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(EventEntry {
        seq: row.get::<_, i64>(0)? as u64,
        height: row.get::<_, i64>(1)? as u64,
        event_type: row.get(2)?,
        payload,
        recorded_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(seq: u64, event_type: &str) -> EventEntry {
        EventEntry {
            seq,
            height: seq * 2,
            event_type: event_type.to_string(),
            recorded_at: "2026-01-01T00:00:00Z".to_string(),
            payload: json!({ "type": event_type, "agent_id": seq }),
        }
    }

    #[test]
    fn test_events_round_trip() {
        let db = Db::open(":memory:").unwrap();
        let run = db.start_deployment("{}").unwrap();

        assert_eq!(db.latest_seq(run).unwrap(), 0);
        for seq in 1..=3 {
            db.insert_event(run, &entry(seq, "agent_registered")).unwrap();
        }
        assert_eq!(db.latest_seq(run).unwrap(), 3);
        assert_eq!(db.count_events(run).unwrap(), 3);

        let tail = db.events_since(run, 1, 100).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0], entry(2, "agent_registered"));
        assert_eq!(db.events_since(run, 0, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_seq_ignored() {
        let db = Db::open(":memory:").unwrap();
        let run = db.start_deployment("{}").unwrap();
        db.insert_event(run, &entry(1, "agent_registered")).unwrap();
        db.insert_event(run, &entry(1, "agent_updated")).unwrap();

        let all = db.events_since(run, 0, 10).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].event_type, "agent_registered");
    }

    #[test]
    fn test_deployments_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        let path = path.to_str().unwrap();

        let first = {
            let db = Db::open(path).unwrap();
            let run = db.start_deployment("{}").unwrap();
            db.insert_event(run, &entry(1, "agent_registered")).unwrap();
            run
        };

        // Reopen the file as a restarted service would
        let db = Db::open(path).unwrap();
        let second = db.start_deployment("{}").unwrap();
        assert_ne!(first, second);
        assert_eq!(db.count_events(first).unwrap(), 1);
        assert_eq!(db.latest_seq(second).unwrap(), 0);
        db.insert_event(second, &entry(1, "feedback_authorized")).unwrap();
        assert_eq!(db.events_since(second, 0, 10).unwrap()[0].event_type, "feedback_authorized");
    }
}
