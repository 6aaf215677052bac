use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

use exam_extract::DocumentResult;

pub const DEFAULT_DB_PATH: &str = "data/exams.sqlite";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id          INTEGER PRIMARY KEY,
            pdf_path    TEXT NOT NULL,
            asset_dir   TEXT NOT NULL,
            page_count  INTEGER NOT NULL,
            exam_type   TEXT NOT NULL CHECK(exam_type IN ('JEE','NEET','UNKNOWN')),
            subject     TEXT NOT NULL,
            image_count INTEGER NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS questions (
            id          INTEGER PRIMARY KEY,
            run_id      INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            number      INTEGER NOT NULL,
            label       TEXT NOT NULL,
            text        TEXT NOT NULL,
            has_diagram BOOLEAN NOT NULL DEFAULT 0,
            UNIQUE(run_id, number)
        );
        CREATE INDEX IF NOT EXISTS idx_questions_run ON questions(run_id);

        CREATE TABLE IF NOT EXISTS diagrams (
            id              INTEGER PRIMARY KEY,
            run_id          INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            question_number INTEGER NOT NULL,
            asset_path      TEXT NOT NULL,
            position        INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_diagrams_run ON diagrams(run_id, question_number);
        ",
    )?;
    Ok(())
}

// ── Runs ──

/// Store one extraction run. Returns the new run id.
pub fn save_run(conn: &Connection, pdf_path: &str, asset_dir: &str, result: &DocumentResult) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO runs (pdf_path, asset_dir, page_count, exam_type, subject, image_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            pdf_path,
            asset_dir,
            result.page_count as i64,
            result.exam_type.as_str(),
            result.subject.as_str(),
            result.image_count as i64,
            Utc::now().to_rfc3339(),
        ],
    )?;
    let run_id = tx.last_insert_rowid();
    {
        let mut q_stmt = tx.prepare(
            "INSERT INTO questions (run_id, number, label, text, has_diagram)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut d_stmt = tx.prepare(
            "INSERT INTO diagrams (run_id, question_number, asset_path, position)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for q in &result.questions {
            q_stmt.execute(rusqlite::params![run_id, q.number, q.label, q.text, q.has_diagram])?;
            for (pos, path) in q.diagram_asset_paths.iter().enumerate() {
                d_stmt.execute(rusqlite::params![run_id, q.number, path, pos as i64])?;
            }
        }
    }
    tx.commit()?;
    Ok(run_id)
}

pub struct RunRow {
    pub id: i64,
    pub pdf_path: String,
    pub page_count: i64,
    pub exam_type: String,
    pub subject: String,
    pub image_count: i64,
    pub question_count: i64,
    pub created_at: String,
}

pub fn fetch_runs(conn: &Connection, limit: usize) -> Result<Vec<RunRow>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.pdf_path, r.page_count, r.exam_type, r.subject, r.image_count,
                (SELECT COUNT(*) FROM questions q WHERE q.run_id = r.id),
                r.created_at
         FROM runs r
         ORDER BY r.id DESC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(RunRow {
                id: row.get(0)?,
                pdf_path: row.get(1)?,
                page_count: row.get(2)?,
                exam_type: row.get(3)?,
                subject: row.get(4)?,
                image_count: row.get(5)?,
                question_count: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Questions ──

pub struct QuestionRow {
    pub number: u32,
    pub label: String,
    pub text: String,
    pub diagrams: Vec<String>,
}

pub fn fetch_questions(conn: &Connection, run_id: i64) -> Result<Vec<QuestionRow>> {
    let mut stmt = conn.prepare(
        "SELECT number, label, text FROM questions WHERE run_id = ?1 ORDER BY id",
    )?;
    let mut rows = stmt
        .query_map([run_id], |row| {
            Ok(QuestionRow {
                number: row.get(0)?,
                label: row.get(1)?,
                text: row.get(2)?,
                diagrams: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut d_stmt = conn.prepare(
        "SELECT question_number, asset_path FROM diagrams WHERE run_id = ?1 ORDER BY question_number, position",
    )?;
    let diagrams = d_stmt
        .query_map([run_id], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (number, path) in diagrams {
        if let Some(q) = rows.iter_mut().find(|q| q.number == number) {
            q.diagrams.push(path);
        }
    }
    Ok(rows)
}

// ── Tests ──
