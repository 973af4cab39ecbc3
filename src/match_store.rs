//! SQLite store of normalized matches plus the match-level Parquet export.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config;
use crate::match_record::MatchRecord;
use crate::normalize::{NormalizeReport, OutcomePolicy, normalize_batch};
use crate::parquet_io::{self, Column, ColumnData};

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub db_path: PathBuf,
    pub run_id: i64,
    pub files_total: usize,
    pub files_unreadable: usize,
    pub matches_upserted: usize,
    pub report: NormalizeReport,
}

pub fn default_db_path() -> Option<PathBuf> {
    config::default_data_dir().map(|dir| dir.join(config::MATCH_DB_FILE))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            match_id TEXT PRIMARY KEY,
            patch TEXT NOT NULL,
            blue_win INTEGER NOT NULL,
            blue_team TEXT NOT NULL,
            red_team TEXT NOT NULL,
            blue_runes TEXT NOT NULL,
            red_runes TEXT NOT NULL,
            blue_summoners TEXT NOT NULL,
            red_summoners TEXT NOT NULL,
            bans_blue TEXT NOT NULL,
            bans_red TEXT NOT NULL,
            region TEXT NULL,
            queue INTEGER NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_patch ON matches(patch);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            source_dir TEXT NOT NULL,
            outcome_policy TEXT NOT NULL,
            files_total INTEGER NOT NULL,
            documents INTEGER NOT NULL,
            accepted INTEGER NOT NULL,
            degraded INTEGER NOT NULL,
            malformed INTEGER NOT NULL,
            missing_outcome INTEGER NOT NULL,
            rejected_participants INTEGER NOT NULL,
            matches_upserted INTEGER NOT NULL,
            report_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// `*.json` files under `dir`, sorted so runs are reproducible.
pub fn raw_match_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow!("raw match directory {} does not exist", dir.display()));
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("json"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}

/// Normalizes every raw document under `dir` and upserts the accepted
/// records. One `ingest_runs` row records the batch counters.
pub fn ingest_raw_dir(
    conn: &mut Connection,
    db_path: PathBuf,
    dir: &Path,
    policy: OutcomePolicy,
) -> Result<IngestSummary> {
    let files = raw_match_files(dir)?;
    let started_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, source_dir, outcome_policy, files_total,
             documents, accepted, degraded, malformed, missing_outcome, rejected_participants,
             matches_upserted, report_json)
         VALUES (?1, NULL, ?2, ?3, ?4, 0, 0, 0, 0, 0, 0, 0, '{}')",
        params![
            started_at,
            dir.display().to_string(),
            policy.to_string(),
            files.len() as i64
        ],
    )
    .context("insert ingest run")?;
    let run_id = conn.last_insert_rowid();

    let mut documents: Vec<(String, String)> = Vec::with_capacity(files.len());
    let mut unreadable: Vec<String> = Vec::new();
    for path in &files {
        match fs::read_to_string(path) {
            Ok(raw) => documents.push((path.display().to_string(), raw)),
            Err(err) => unreadable.push(format!("{}: {err}", path.display())),
        }
    }

    let (records, mut report) = normalize_batch(
        documents.iter().map(|(label, raw)| (label.as_str(), raw.as_str())),
        policy,
    );
    report.malformed += unreadable.len();
    report.documents += unreadable.len();
    report.errors.extend(unreadable.iter().cloned());

    let matches_upserted = upsert_records(conn, &records)?;

    let finished_at = Utc::now().to_rfc3339();
    let report_json = serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string());
    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, documents = ?2, accepted = ?3, degraded = ?4, malformed = ?5,
             missing_outcome = ?6, rejected_participants = ?7, matches_upserted = ?8,
             report_json = ?9
         WHERE run_id = ?10",
        params![
            finished_at,
            report.documents as i64,
            report.accepted as i64,
            report.degraded as i64,
            report.malformed as i64,
            report.missing_outcome as i64,
            report.rejected_participants() as i64,
            matches_upserted as i64,
            report_json,
            run_id
        ],
    )
    .context("update ingest run")?;
    info!(
        run_id,
        files = files.len(),
        accepted = report.accepted,
        degraded = report.degraded,
        malformed = report.malformed,
        "ingest run finished"
    );

    Ok(IngestSummary {
        db_path,
        run_id,
        files_total: files.len(),
        files_unreadable: unreadable.len(),
        matches_upserted,
        report,
    })
}

pub fn upsert_records(conn: &mut Connection, records: &[MatchRecord]) -> Result<usize> {
    let tx = conn.transaction().context("begin ingest transaction")?;
    for record in records {
        upsert_record(&tx, record)?;
    }
    tx.commit().context("commit ingest transaction")?;
    Ok(records.len())
}

fn upsert_record(tx: &rusqlite::Transaction<'_>, m: &MatchRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO matches (
            match_id, patch, blue_win, blue_team, red_team,
            blue_runes, red_runes, blue_summoners, red_summoners,
            bans_blue, bans_red, region, queue, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13, ?14
        )
        ON CONFLICT(match_id) DO UPDATE SET
            patch = excluded.patch,
            blue_win = excluded.blue_win,
            blue_team = excluded.blue_team,
            red_team = excluded.red_team,
            blue_runes = excluded.blue_runes,
            red_runes = excluded.red_runes,
            blue_summoners = excluded.blue_summoners,
            red_summoners = excluded.red_summoners,
            bans_blue = excluded.bans_blue,
            bans_red = excluded.bans_red,
            region = excluded.region,
            queue = excluded.queue,
            updated_at = excluded.updated_at
        "#,
        params![
            m.match_id,
            m.patch,
            i64::from(m.blue_win),
            to_json(&m.blue_team)?,
            to_json(&m.red_team)?,
            to_json(&m.blue_runes)?,
            to_json(&m.red_runes)?,
            to_json(&m.blue_summoners)?,
            to_json(&m.red_summoners)?,
            to_json(&m.bans_blue)?,
            to_json(&m.bans_red)?,
            m.region,
            m.queue,
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| format!("upsert match {}", m.match_id))?;
    Ok(())
}

/// All stored records, optionally limited to one patch, ordered by match id.
pub fn load_records(conn: &Connection, patch: Option<&str>) -> Result<Vec<MatchRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                match_id, patch, blue_win, blue_team, red_team,
                blue_runes, red_runes, blue_summoners, red_summoners,
                bans_blue, bans_red, region, queue
            FROM matches
            WHERE ?1 IS NULL OR patch = ?1
            ORDER BY match_id ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map(params![patch], |row| {
            Ok(StoredRow {
                match_id: row.get(0)?,
                patch: row.get(1)?,
                blue_win: row.get::<_, i64>(2)? != 0,
                json: [
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                ],
                region: row.get(11)?,
                queue: row.get(12)?,
            })
        })
        .context("query load matches")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode match row")?.into_record()?);
    }
    Ok(out)
}

pub fn count_matches(conn: &Connection) -> Result<usize> {
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM matches", [], |row| row.get(0))
        .context("count matches")?;
    Ok(usize::try_from(n).unwrap_or(0))
}

/// Structured columns travel as JSON text, in the order
/// blue_team, red_team, blue_runes, red_runes, blue_summoners,
/// red_summoners, bans_blue, bans_red.
struct StoredRow {
    match_id: String,
    patch: String,
    blue_win: bool,
    json: [String; 8],
    region: Option<String>,
    queue: Option<i64>,
}

impl StoredRow {
    fn into_record(self) -> Result<MatchRecord> {
        let id = &self.match_id;
        let [bt, rt, br, rr, bs, rs, bb, rb] = &self.json;
        Ok(MatchRecord {
            blue_team: from_json(bt, id, "blue_team")?,
            red_team: from_json(rt, id, "red_team")?,
            blue_runes: from_json(br, id, "blue_runes")?,
            red_runes: from_json(rr, id, "red_runes")?,
            blue_summoners: from_json(bs, id, "blue_summoners")?,
            red_summoners: from_json(rs, id, "red_summoners")?,
            bans_blue: from_json(bb, id, "bans_blue")?,
            bans_red: from_json(rb, id, "bans_red")?,
            match_id: self.match_id,
            patch: self.patch,
            blue_win: self.blue_win,
            region: self.region,
            queue: self.queue,
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("serialize match column")
}

/// Empty or `null` text reads as the column's empty value.
fn from_json<T: DeserializeOwned + Default>(raw: &str, match_id: &str, column: &str) -> Result<T> {
    if raw.trim().is_empty() || raw.trim() == "null" {
        return Ok(T::default());
    }
    serde_json::from_str(raw).with_context(|| format!("decode {column} of match {match_id}"))
}

const STRUCTURED_COLUMNS: [&str; 8] = [
    "blue_team",
    "red_team",
    "blue_runes",
    "red_runes",
    "blue_summoners",
    "red_summoners",
    "bans_blue",
    "bans_red",
];

/// One row per match; structured values are stored as JSON strings.
pub fn write_matches_parquet(records: &[MatchRecord], path: &Path) -> Result<usize> {
    let mut json_columns: [Vec<String>; 8] = Default::default();
    for m in records {
        let values = [
            to_json(&m.blue_team)?,
            to_json(&m.red_team)?,
            to_json(&m.blue_runes)?,
            to_json(&m.red_runes)?,
            to_json(&m.blue_summoners)?,
            to_json(&m.red_summoners)?,
            to_json(&m.bans_blue)?,
            to_json(&m.bans_red)?,
        ];
        for (column, value) in json_columns.iter_mut().zip(values) {
            column.push(value);
        }
    }

    let mut columns = vec![
        Column::new(
            "match_id",
            ColumnData::Utf8(records.iter().map(|m| m.match_id.clone()).collect()),
        ),
        Column::new(
            "patch",
            ColumnData::Utf8(records.iter().map(|m| m.patch.clone()).collect()),
        ),
        Column::new(
            "blue_win",
            ColumnData::Bool(records.iter().map(|m| m.blue_win).collect()),
        ),
    ];
    for (name, values) in STRUCTURED_COLUMNS.iter().zip(json_columns) {
        columns.push(Column::new(*name, ColumnData::Utf8(values)));
    }
    columns.push(Column::new(
        "region",
        ColumnData::OptUtf8(records.iter().map(|m| m.region.clone()).collect()),
    ));
    columns.push(Column::new(
        "queue",
        ColumnData::OptInt64(records.iter().map(|m| m.queue).collect()),
    ));
    parquet_io::write_table(path, "matches", &columns)
        .with_context(|| format!("write matches {}", path.display()))
}

pub fn read_matches_parquet(path: &Path) -> Result<Vec<MatchRecord>> {
    let rows = parquet_io::read_rows(path)?;
    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let match_id = parquet_io::field_str(row, "match_id")
            .ok_or_else(|| anyhow!("matches row missing match_id"))?;
        let mut json: [String; 8] = Default::default();
        for (slot, name) in json.iter_mut().zip(STRUCTURED_COLUMNS) {
            *slot = parquet_io::field_str(row, name).unwrap_or_default();
        }
        let stored = StoredRow {
            patch: parquet_io::field_str(row, "patch").unwrap_or_default(),
            blue_win: parquet_io::field_bool(row, "blue_win")
                .ok_or_else(|| anyhow!("match {match_id} missing blue_win"))?,
            json,
            region: parquet_io::field_str(row, "region"),
            queue: parquet_io::field_i64(row, "queue"),
            match_id,
        };
        out.push(stored.into_record()?);
    }
    info!(path = %path.display(), matches = out.len(), "matches loaded");
    Ok(out)
}
