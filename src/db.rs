use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::calc::{ComponentScores, CourseMark};
use crate::records::{FormDraft, RecordStore, StoreError, StoredRecord};

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("edusync.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS records(
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            attrs TEXT NOT NULL,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_marks(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            student_name TEXT NOT NULL,
            course_code TEXT NOT NULL,
            course_name TEXT NOT NULL,
            semester_id TEXT NOT NULL,
            semester_seq INTEGER NOT NULL,
            credits INTEGER NOT NULL,
            class_test_1 REAL NOT NULL,
            class_test_2 REAL NOT NULL,
            attendance REAL NOT NULL,
            assessment REAL NOT NULL,
            final_exam REAL NOT NULL,
            total_marks REAL NOT NULL,
            grade_point REAL NOT NULL,
            letter_grade TEXT NOT NULL,
            updated_at TEXT,
            UNIQUE(student_id, course_code, semester_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_marks_student ON course_marks(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_marks_semester ON course_marks(semester_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        None => Ok(None),
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET json = excluded.json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn now_utc() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn parse_attrs(raw: &str) -> Result<BTreeMap<String, String>, StoreError> {
    serde_json::from_str(raw)
        .map_err(|e| StoreError::new("bad_record", format!("stored attrs unreadable: {}", e)))
}

/// Insertion-ordered list of one kind's records.
pub fn records_list(conn: &Connection, kind: &str) -> anyhow::Result<Vec<StoredRecord>> {
    let mut stmt =
        conn.prepare("SELECT id, attrs FROM records WHERE kind = ? ORDER BY rowid")?;
    let rows = stmt
        .query_map([kind], |r| {
            let id: String = r.get(0)?;
            let attrs: String = r.get(1)?;
            Ok((id, attrs))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let mut out = Vec::with_capacity(rows.len());
    for (id, raw) in rows {
        let attrs = parse_attrs(&raw).map_err(|e| anyhow::anyhow!(e.message))?;
        out.push(StoredRecord { id, attrs });
    }
    Ok(out)
}

pub fn records_get(
    conn: &Connection,
    kind: &str,
    id: &str,
) -> anyhow::Result<Option<StoredRecord>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT attrs FROM records WHERE kind = ? AND id = ?",
            (kind, id),
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        None => Ok(None),
        Some(raw) => {
            let attrs = parse_attrs(&raw).map_err(|e| anyhow::anyhow!(e.message))?;
            Ok(Some(StoredRecord {
                id: id.to_string(),
                attrs,
            }))
        }
    }
}

/// SQLite-backed implementation of the record manager's persistence
/// contract. Attributes are stored as one JSON object per row.
pub struct SqliteRecords<'a> {
    pub conn: &'a Connection,
}

impl RecordStore for SqliteRecords<'_> {
    fn create(&mut self, kind: &str, draft: &FormDraft) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let attrs = serde_json::to_string(draft)
            .map_err(|e| StoreError::new("db_insert_failed", e.to_string()))?;
        let now = now_utc();
        self.conn
            .execute(
                "INSERT INTO records(id, kind, attrs, created_at, updated_at)
                 VALUES(?, ?, ?, ?, ?)",
                (&id, kind, &attrs, &now, &now),
            )
            .map_err(|e| StoreError::new("db_insert_failed", e.to_string()))?;
        Ok(id)
    }

    fn update(&mut self, kind: &str, id: &str, draft: &FormDraft) -> Result<(), StoreError> {
        let attrs = serde_json::to_string(draft)
            .map_err(|e| StoreError::new("db_update_failed", e.to_string()))?;
        let changed = self
            .conn
            .execute(
                "UPDATE records SET attrs = ?, updated_at = ? WHERE kind = ? AND id = ?",
                (&attrs, &now_utc(), kind, id),
            )
            .map_err(|e| StoreError::new("db_update_failed", e.to_string()))?;
        if changed == 0 {
            return Err(StoreError::new("not_found", "record not found"));
        }
        Ok(())
    }
}

/// Replace-by-key save: at most one mark per (student, course, semester),
/// a resave supersedes the prior row.
pub fn upsert_course_mark(conn: &Connection, mark: &CourseMark) -> anyhow::Result<()> {
    let mark_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO course_marks(
            id, student_id, student_name, course_code, course_name,
            semester_id, semester_seq, credits,
            class_test_1, class_test_2, attendance, assessment, final_exam,
            total_marks, grade_point, letter_grade, updated_at
         )
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
         ON CONFLICT(student_id, course_code, semester_id) DO UPDATE SET
           student_name = excluded.student_name,
           course_name = excluded.course_name,
           semester_seq = excluded.semester_seq,
           credits = excluded.credits,
           class_test_1 = excluded.class_test_1,
           class_test_2 = excluded.class_test_2,
           attendance = excluded.attendance,
           assessment = excluded.assessment,
           final_exam = excluded.final_exam,
           total_marks = excluded.total_marks,
           grade_point = excluded.grade_point,
           letter_grade = excluded.letter_grade,
           updated_at = excluded.updated_at",
        rusqlite::params![
            mark_id,
            mark.student_id,
            mark.student_name,
            mark.course_code,
            mark.course_name,
            mark.semester_id,
            mark.semester_seq,
            mark.credits,
            mark.components.class_test_1,
            mark.components.class_test_2,
            mark.components.attendance,
            mark.components.assessment,
            mark.components.final_exam,
            mark.total_marks,
            mark.grade_point,
            mark.letter_grade,
            now_utc(),
        ],
    )?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct MarkFilter<'a> {
    pub student_id: Option<&'a str>,
    pub semester_id: Option<&'a str>,
    pub course_code: Option<&'a str>,
}

/// Marks in insertion order, optionally narrowed by student, semester or
/// course. Aggregation relies on the stable order here.
pub fn list_course_marks(conn: &Connection, filter: &MarkFilter<'_>) -> anyhow::Result<Vec<CourseMark>> {
    let mut sql = String::from(
        "SELECT student_id, student_name, course_code, course_name,
                semester_id, semester_seq, credits,
                class_test_1, class_test_2, attendance, assessment, final_exam,
                total_marks, grade_point, letter_grade
         FROM course_marks WHERE 1=1",
    );
    let mut binds: Vec<&str> = Vec::new();
    if let Some(v) = filter.student_id {
        sql.push_str(" AND student_id = ?");
        binds.push(v);
    }
    if let Some(v) = filter.semester_id {
        sql.push_str(" AND semester_id = ?");
        binds.push(v);
    }
    if let Some(v) = filter.course_code {
        sql.push_str(" AND course_code = ?");
        binds.push(v);
    }
    sql.push_str(" ORDER BY rowid");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(binds), |r| {
            Ok(CourseMark {
                student_id: r.get(0)?,
                student_name: r.get(1)?,
                course_code: r.get(2)?,
                course_name: r.get(3)?,
                semester_id: r.get(4)?,
                semester_seq: r.get(5)?,
                credits: r.get(6)?,
                components: ComponentScores {
                    class_test_1: r.get(7)?,
                    class_test_2: r.get(8)?,
                    attendance: r.get(9)?,
                    assessment: r.get(10)?,
                    final_exam: r.get(11)?,
                },
                total_marks: r.get(12)?,
                grade_point: r.get(13)?,
                letter_grade: r.get(14)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}
