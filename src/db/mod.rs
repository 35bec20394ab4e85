use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{Note, NoteKind, ReminderRule};

const NOTE_COLUMNS: &str = "id, text, kind, done, has_countdown, countdown_seconds, countdown_end_at,
     reminder_rule, specific_offset_seconds, fixed_reminder_at, created_at, updated_at";

/// 便签存储
///
/// 所有修改操作都返回修改后的完整快照，调度器直接拿快照做对账。
pub struct NoteStore {
    conn: Connection,
}

impl NoteStore {
    /// 打开或创建数据库
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// 初始化数据库schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY NOT NULL,
                text TEXT NOT NULL,
                kind INTEGER NOT NULL DEFAULT 0,
                done INTEGER NOT NULL DEFAULT 0,
                has_countdown INTEGER NOT NULL DEFAULT 0,
                countdown_seconds INTEGER NOT NULL DEFAULT 0,
                countdown_end_at TEXT,
                reminder_rule INTEGER NOT NULL DEFAULT 0,
                specific_offset_seconds INTEGER NOT NULL DEFAULT 0,
                fixed_reminder_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notes_countdown_end ON notes(countdown_end_at);
            "#,
        )?;
        Ok(())
    }

    /// 获取所有便签，按创建顺序
    pub fn list(&self) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY CAST(id AS INTEGER) ASC, id ASC"
        ))?;

        let rows = stmt
            .query_map([], StoredNote::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(StoredNote::into_note).collect()
    }

    pub fn get(&self, id: &str) -> Result<Option<Note>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
                params![id],
                StoredNote::from_row,
            )
            .optional()?;

        row.map(StoredNote::into_note).transpose()
    }

    /// 新建或覆盖便签
    pub fn upsert(&self, note: &Note) -> Result<Vec<Note>> {
        self.conn.execute(
            "INSERT INTO notes (id, text, kind, done, has_countdown, countdown_seconds, countdown_end_at,
                                reminder_rule, specific_offset_seconds, fixed_reminder_at,
                                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                kind = excluded.kind,
                done = excluded.done,
                has_countdown = excluded.has_countdown,
                countdown_seconds = excluded.countdown_seconds,
                countdown_end_at = excluded.countdown_end_at,
                reminder_rule = excluded.reminder_rule,
                specific_offset_seconds = excluded.specific_offset_seconds,
                fixed_reminder_at = excluded.fixed_reminder_at,
                updated_at = excluded.updated_at",
            params![
                note.id,
                note.text,
                note.kind as i32,
                note.done,
                note.has_countdown,
                to_sql_seconds(note.countdown_seconds),
                note.countdown_end_at.map(|d| d.to_rfc3339()),
                note.reminder_rule as i32,
                to_sql_seconds(note.specific_offset_seconds),
                note.fixed_reminder_at.map(|d| d.to_rfc3339()),
                note.created_at.to_rfc3339(),
                note.updated_at.to_rfc3339(),
            ],
        )?;
        tracing::debug!("Stored note {}", note.id);
        self.list()
    }

    /// 删除便签
    pub fn remove(&self, id: &str) -> Result<Vec<Note>> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(Error::NoteNotFound(id.to_string()));
        }
        tracing::debug!("Removed note {}", id);
        self.list()
    }

    pub fn set_done(&self, id: &str, done: bool, now: DateTime<Utc>) -> Result<Vec<Note>> {
        let changed = self.conn.execute(
            "UPDATE notes SET done = ?1, updated_at = ?2 WHERE id = ?3",
            params![done, now.to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(Error::NoteNotFound(id.to_string()));
        }
        self.list()
    }

    /// 生成新便签ID：创建时的毫秒时间戳，保证严格大于已有ID
    pub fn next_id(&self, now: DateTime<Utc>) -> Result<String> {
        let latest: Option<i64> = self.conn.query_row(
            "SELECT MAX(CAST(id AS INTEGER)) FROM notes",
            [],
            |row| row.get(0),
        )?;
        let candidate = now.timestamp_millis();
        let id = match latest {
            Some(latest) if latest >= candidate => latest + 1,
            _ => candidate,
        };
        Ok(id.to_string())
    }
}

fn to_sql_seconds(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX)
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Timestamp(format!("{raw}: {e}")))
}

fn parse_optional_instant(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_instant).transpose()
}

/// 数据库原始行，时间字段在 `into_note` 里再解析
struct StoredNote {
    id: String,
    text: String,
    kind: i32,
    done: bool,
    has_countdown: bool,
    countdown_seconds: i64,
    countdown_end_at: Option<String>,
    reminder_rule: i32,
    specific_offset_seconds: i64,
    fixed_reminder_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl StoredNote {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            text: row.get(1)?,
            kind: row.get(2)?,
            done: row.get(3)?,
            has_countdown: row.get(4)?,
            countdown_seconds: row.get(5)?,
            countdown_end_at: row.get(6)?,
            reminder_rule: row.get(7)?,
            specific_offset_seconds: row.get(8)?,
            fixed_reminder_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_note(self) -> Result<Note> {
        Ok(Note {
            id: self.id,
            text: self.text,
            kind: NoteKind::from_i32(self.kind),
            done: self.done,
            has_countdown: self.has_countdown,
            countdown_seconds: u64::try_from(self.countdown_seconds).unwrap_or(0),
            countdown_end_at: parse_optional_instant(self.countdown_end_at)?,
            reminder_rule: ReminderRule::from_i32(self.reminder_rule),
            specific_offset_seconds: u64::try_from(self.specific_offset_seconds).unwrap_or(0),
            fixed_reminder_at: parse_optional_instant(self.fixed_reminder_at)?,
            created_at: parse_instant(&self.created_at)?,
            updated_at: parse_instant(&self.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn countdown_note(id: &str, now: DateTime<Utc>) -> Note {
        let mut note = Note::new(id.to_string(), "Pay rent".to_string(), now);
        note.has_countdown = true;
        note.countdown_seconds = 7200;
        note.countdown_end_at = Some(now + Duration::seconds(7200));
        note.reminder_rule = ReminderRule::OneHourBefore;
        note
    }

    #[test]
    fn upsert_returns_snapshot_and_roundtrips_fields() {
        let store = NoteStore::open_in_memory().unwrap();
        let mut note = countdown_note("100", t0());
        note.kind = NoteKind::Todo;
        note.fixed_reminder_at = Some(t0() + Duration::days(2));

        let snapshot = store.upsert(&note).unwrap();
        assert_eq!(snapshot, vec![note.clone()]);
        assert_eq!(store.get("100").unwrap(), Some(note));
    }

    #[test]
    fn upsert_same_id_replaces() {
        let store = NoteStore::open_in_memory().unwrap();
        let mut note = countdown_note("100", t0());
        store.upsert(&note).unwrap();

        note.text = "Pay rent today".to_string();
        note.has_countdown = false;
        note.countdown_end_at = None;
        let snapshot = store.upsert(&note).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].text, "Pay rent today");
        assert_eq!(snapshot[0].countdown_end_at, None);
    }

    #[test]
    fn list_is_in_creation_order() {
        let store = NoteStore::open_in_memory().unwrap();
        store.upsert(&Note::new("900".into(), "b".into(), t0())).unwrap();
        store.upsert(&Note::new("1000".into(), "c".into(), t0())).unwrap();
        store.upsert(&Note::new("80".into(), "a".into(), t0())).unwrap();

        let ids: Vec<String> = store.list().unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["80", "900", "1000"]);
    }

    #[test]
    fn remove_unknown_id_is_not_found() {
        let store = NoteStore::open_in_memory().unwrap();
        let err = store.remove("missing").unwrap_err();
        assert!(matches!(err, Error::NoteNotFound(id) if id == "missing"));
    }

    #[test]
    fn remove_returns_remaining_notes() {
        let store = NoteStore::open_in_memory().unwrap();
        store.upsert(&countdown_note("1", t0())).unwrap();
        store.upsert(&countdown_note("2", t0())).unwrap();

        let snapshot = store.remove("1").unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "2");
    }

    #[test]
    fn set_done_toggles_flag() {
        let store = NoteStore::open_in_memory().unwrap();
        store.upsert(&countdown_note("1", t0())).unwrap();

        let later = t0() + Duration::minutes(5);
        let snapshot = store.set_done("1", true, later).unwrap();
        assert!(snapshot[0].done);
        assert_eq!(snapshot[0].updated_at, later);
        assert!(matches!(
            store.set_done("2", true, later),
            Err(Error::NoteNotFound(_))
        ));
    }

    #[test]
    fn next_id_is_strictly_increasing() {
        let store = NoteStore::open_in_memory().unwrap();
        let first = store.next_id(t0()).unwrap();
        assert_eq!(first, t0().timestamp_millis().to_string());

        store.upsert(&Note::new(first.clone(), "a".into(), t0())).unwrap();
        // 同一毫秒内再创建
        let second = store.next_id(t0()).unwrap();
        assert_eq!(
            second.parse::<i64>().unwrap(),
            first.parse::<i64>().unwrap() + 1
        );
    }

    #[test]
    fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.db");
        {
            let store = NoteStore::open(&path).unwrap();
            store.upsert(&countdown_note("7", t0())).unwrap();
        }
        let store = NoteStore::open(&path).unwrap();
        assert_eq!(store.list().unwrap(), vec![countdown_note("7", t0())]);
    }
}
