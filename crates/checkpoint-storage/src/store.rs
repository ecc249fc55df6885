//! Line-oriented flat-file store.
//!
//! Each record family lives in its own text file, one comma-separated record
//! per line, with `#` comment lines. The format has no random-access update,
//! so every mutation reads the whole file, transforms it and writes it all
//! back. [`FlatFileStore`] is the single owner of that cycle: all appends and
//! rewrites take its writer lock, so two mutations can never interleave
//! between read and write.
//!
//! # Documents
//!
//! A file is loaded as a [`Document`]: its lines in order, each either a
//! parsed record or a verbatim line (comment, blank or malformed row).
//! Rewrites keep verbatim lines where they were, so a row the store cannot
//! interpret is never silently dropped. Malformed rows are reported once per
//! process on the [`FaultChannel`].
//!
//! # Examples
//!
//! ```no_run
//! use checkpoint_storage::{FlatFileStore, StoreConfig, FaultChannel};
//! use checkpoint_storage::models::ViolationRecord;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FlatFileStore::open(StoreConfig::new("/var/lib/checkpoint"), FaultChannel::default()).await?;
//!
//! let total = store
//!     .rewrite_all(|doc: &mut checkpoint_storage::store::Document<ViolationRecord>| {
//!         doc.records().map(|r| r.count).sum::<u32>()
//!     })
//!     .await?;
//! println!("{total} violations on record");
//! # Ok(())
//! # }
//! ```

use crate::config::StoreConfig;
use crate::error::StorageResult;
use crate::events::{FaultChannel, FaultKind, StorageFault};
use checkpoint_core::constants::COMMENT_PREFIX;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::io::{ErrorKind, SeekFrom};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The files the store manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// `id,role,name[,status]`
    Roster,
    /// Special Pass registrations, 12 columns
    Visitors,
    /// `personId,count`
    Violations,
    /// `timestamp,id,action,status`, append-only
    AccessLog,
    /// Student/teacher check-ins, one row per card
    Attendance,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Roster,
        RecordKind::Visitors,
        RecordKind::Violations,
        RecordKind::AccessLog,
        RecordKind::Attendance,
    ];

    /// Comment lines written when the file is created
    pub fn header(self) -> &'static str {
        match self {
            RecordKind::Roster => "# Roster\n# Format: ID,ROLE,NAME,STATUS\n",
            RecordKind::Visitors => {
                "# Visitor Database\n# Format: NAME,CONTACT,VISITING_AS,PURPOSE,VISITING,ID_TYPE,SPECIAL_PASS,CREATED_AT,EXPIRES_AT,STATUS,CHECK_IN_TIME,CHECK_OUT_TIME\n"
            }
            RecordKind::Violations => "# Person ID, Violation Count\n",
            RecordKind::AccessLog => "# Access Log\n# Format: TIMESTAMP,ID,ACTION,STATUS\n",
            RecordKind::Attendance => {
                "# Attendance\n# Format: CARD_ID,ROLE,NAME,CREATED_AT,CHECK_IN_TIME,CHECK_OUT_TIME\n"
            }
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            RecordKind::Roster => "roster",
            RecordKind::Visitors => "visitors",
            RecordKind::Violations => "violations",
            RecordKind::AccessLog => "access_log",
            RecordKind::Attendance => "attendance",
        };
        f.write_str(name)
    }
}

/// A record that maps to exactly one line of one file
pub trait LineRecord: Sized {
    /// File this record family lives in
    const KIND: RecordKind;

    /// Parse a non-comment, non-blank line.
    ///
    /// An error marks the line as malformed; it is kept verbatim.
    fn parse_line(line: &str) -> StorageResult<Self>;

    /// Render the record as a line, without the trailing newline.
    fn to_line(&self) -> String;

    /// Something about a parsed record worth reporting, such as a timestamp
    /// column that does not parse.
    fn anomaly(&self) -> Option<String> {
        None
    }
}

/// One line of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<R> {
    Record(R),
    /// Comment, blank, or malformed row, written back untouched
    Verbatim(String),
}

/// A whole file, in line order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document<R> {
    lines: Vec<Line<R>>,
    malformed: Vec<(usize, String)>,
    line_ending: &'static str,
    dirty: bool,
}

impl<R> Default for Document<R> {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            malformed: Vec::new(),
            line_ending: "\n",
            dirty: false,
        }
    }
}

impl<R: LineRecord> Document<R> {
    /// Parse file content.
    ///
    /// A file that uses CRLF anywhere is rendered back with CRLF throughout.
    pub fn parse(text: &str) -> Self {
        let mut doc = Document::default();
        if text.contains("\r\n") {
            doc.line_ending = "\r\n";
        }

        for (index, raw) in text.lines().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
                doc.lines.push(Line::Verbatim(raw.to_string()));
                continue;
            }

            match R::parse_line(trimmed) {
                Ok(record) => doc.lines.push(Line::Record(record)),
                Err(e) => {
                    doc.malformed.push((index + 1, format!("{e}: {trimmed}")));
                    doc.lines.push(Line::Verbatim(raw.to_string()));
                }
            }
        }

        doc
    }

    /// Render the document as file content.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Record(record) => out.push_str(&record.to_line()),
                Line::Verbatim(raw) => out.push_str(raw),
            }
            out.push_str(self.line_ending);
        }
        out
    }
}

impl<R> Document<R> {
    /// Parsed records, in file order.
    pub fn records(&self) -> impl Iterator<Item = &R> {
        self.lines.iter().filter_map(|line| match line {
            Line::Record(record) => Some(record),
            Line::Verbatim(_) => None,
        })
    }

    /// Mutable access to every record. Marks the document for writing.
    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut R> {
        self.dirty = true;
        self.lines.iter_mut().filter_map(|line| match line {
            Line::Record(record) => Some(record),
            Line::Verbatim(_) => None,
        })
    }

    /// Mutable access to the `index`-th record (counting records only).
    pub fn record_mut(&mut self, index: usize) -> Option<&mut R> {
        let record = self
            .lines
            .iter_mut()
            .filter_map(|line| match line {
                Line::Record(record) => Some(record),
                Line::Verbatim(_) => None,
            })
            .nth(index);
        if record.is_some() {
            self.dirty = true;
        }
        record
    }

    /// Drop records for which `keep` returns `false`. Returns how many went.
    pub fn retain(&mut self, mut keep: impl FnMut(&R) -> bool) -> usize {
        let before = self.lines.len();
        self.lines.retain(|line| match line {
            Line::Record(record) => keep(record),
            Line::Verbatim(_) => true,
        });
        let removed = before - self.lines.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Add a record at the end of the file.
    pub fn push(&mut self, record: R) {
        self.lines.push(Line::Record(record));
        self.dirty = true;
    }

    pub fn record_count(&self) -> usize {
        self.records().count()
    }

    /// Malformed rows as `(line number, detail)`.
    pub fn malformed(&self) -> &[(usize, String)] {
        &self.malformed
    }

    /// Whether a mutation happened since load.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn into_records(self) -> Vec<R> {
        self.lines
            .into_iter()
            .filter_map(|line| match line {
                Line::Record(record) => Some(record),
                Line::Verbatim(_) => None,
            })
            .collect()
    }
}

/// Single-writer owner of the backing files
#[derive(Debug)]
pub struct FlatFileStore {
    config: StoreConfig,
    write_lock: Mutex<()>,
    faults: FaultChannel,
    reported: std::sync::Mutex<HashSet<(RecordKind, String)>>,
}

impl FlatFileStore {
    /// Open the store, creating the directory and missing files (with their
    /// headers) when `create_if_missing` is set.
    pub async fn open(config: StoreConfig, faults: FaultChannel) -> StorageResult<Self> {
        config.validate()?;

        if config.create_if_missing {
            fs::create_dir_all(&config.data_dir).await?;

            for kind in RecordKind::ALL {
                let path = config.path_for(kind);
                if fs::try_exists(&path).await? {
                    continue;
                }
                fs::write(&path, kind.header()).await?;
                info!(file = %path.display(), "Created {} file", kind);
            }
        }

        Ok(Self {
            config,
            write_lock: Mutex::new(()),
            faults,
            reported: std::sync::Mutex::new(HashSet::new()),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn faults(&self) -> &FaultChannel {
        &self.faults
    }

    pub fn path(&self, kind: RecordKind) -> PathBuf {
        self.config.path_for(kind)
    }

    /// Load a whole file. A missing file is an empty document.
    pub async fn load<R: LineRecord>(&self) -> StorageResult<Document<R>> {
        let path = self.path(R::KIND);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let doc = Document::<R>::parse(&text);
        debug!(
            file = %R::KIND,
            records = doc.record_count(),
            malformed = doc.malformed().len(),
            "Loaded"
        );
        self.report_anomalies(&doc);
        Ok(doc)
    }

    /// Load every parseable record of a file.
    pub async fn load_all<R: LineRecord>(&self) -> StorageResult<Vec<R>> {
        Ok(self.load::<R>().await?.into_records())
    }

    /// Append one record as a new line.
    ///
    /// A last line left without its newline is terminated first, and a CRLF
    /// file gets a CRLF line.
    pub async fn append<R: LineRecord>(&self, record: &R) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;

        let path = self.path(R::KIND);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;

        let (terminate, line_ending) = match tail(&mut file).await? {
            Tail::Empty | Tail::Lf => (false, "\n"),
            Tail::CrLf => (false, "\r\n"),
            Tail::Unterminated => (true, "\n"),
        };

        let mut line = String::new();
        if terminate {
            line.push_str(line_ending);
        }
        line.push_str(&record.to_line());
        line.push_str(line_ending);
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read, transform and write back a whole file as one critical section.
    ///
    /// The file is only rewritten when `transform` mutated the document. The
    /// new content goes to a sibling temp file that is renamed over the old
    /// one, so readers never see a half-written file.
    pub async fn rewrite_all<R, T, F>(&self, transform: F) -> StorageResult<T>
    where
        R: LineRecord,
        F: FnOnce(&mut Document<R>) -> T,
    {
        let _guard = self.write_lock.lock().await;

        let mut doc = self.load::<R>().await?;
        let result = transform(&mut doc);

        if doc.is_dirty() {
            self.write_document(R::KIND, &doc).await?;
        }

        Ok(result)
    }

    async fn write_document<R: LineRecord>(
        &self,
        kind: RecordKind,
        doc: &Document<R>,
    ) -> StorageResult<()> {
        let path = self.path(kind);
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, doc.render()).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(file = %kind, records = doc.record_count(), "Rewrote");
        Ok(())
    }

    fn report_anomalies<R: LineRecord>(&self, doc: &Document<R>) {
        let mut pending = Vec::new();
        for (line_no, detail) in doc.malformed() {
            pending.push((FaultKind::MalformedRow, format!("line {line_no}: {detail}")));
        }
        for record in doc.records() {
            if let Some(detail) = record.anomaly() {
                pending.push((FaultKind::InvalidTimestamp, detail));
            }
        }
        if pending.is_empty() {
            return;
        }

        let mut reported = self
            .reported
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (kind, detail) in pending {
            if reported.insert((R::KIND, detail.clone())) {
                self.faults
                    .report(StorageFault::new(kind, Some(R::KIND), detail));
            }
        }
    }
}

/// How a file ends
enum Tail {
    Empty,
    Lf,
    CrLf,
    Unterminated,
}

async fn tail(file: &mut fs::File) -> StorageResult<Tail> {
    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(Tail::Empty);
    }

    let take = len.min(2);
    file.seek(SeekFrom::End(-(take as i64))).await?;
    let mut buf = [0u8; 2];
    let buf = &mut buf[..take as usize];
    file.read_exact(buf).await?;

    Ok(match buf {
        [b'\r', b'\n'] => Tail::CrLf,
        [.., b'\n'] => Tail::Lf,
        _ => Tail::Unterminated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ViolationRecord;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, FlatFileStore) {
        let dir = TempDir::new().unwrap();
        let store = FlatFileStore::open(StoreConfig::new(dir.path()), FaultChannel::new(16))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_open_creates_files_with_headers() {
        let (dir, _store) = open_store().await;

        for kind in RecordKind::ALL {
            let path = StoreConfig::new(dir.path()).path_for(kind);
            let text = std::fs::read_to_string(path).unwrap();
            assert_eq!(text, kind.header());
        }
    }

    #[tokio::test]
    async fn test_open_keeps_existing_files() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path());
        std::fs::write(config.path_for(RecordKind::Violations), "P1,3\n").unwrap();

        let store = FlatFileStore::open(config, FaultChannel::default()).await.unwrap();
        let records: Vec<ViolationRecord> = store.load_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].count, 3);
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path()).create_if_missing(false);
        let store = FlatFileStore::open(config, FaultChannel::default()).await.unwrap();

        let doc = store.load::<ViolationRecord>().await.unwrap();
        assert_eq!(doc.record_count(), 0);
    }

    #[tokio::test]
    async fn test_append_then_load() {
        let (_dir, store) = open_store().await;

        store.append(&ViolationRecord::new("P1", 1)).await.unwrap();
        store.append(&ViolationRecord::new("P2", 4)).await.unwrap();

        let records: Vec<ViolationRecord> = store.load_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].person_id.as_str(), "P2");
    }

    #[tokio::test]
    async fn test_append_terminates_unfinished_last_line() {
        let (_dir, store) = open_store().await;
        let path = store.path(RecordKind::Violations);
        std::fs::write(&path, "# Person ID, Violation Count\nP1,2").unwrap();

        store.append(&ViolationRecord::new("P2", 1)).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# Person ID, Violation Count\nP1,2\nP2,1\n"
        );
        let records: Vec<ViolationRecord> = store.load_all().await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_append_to_crlf_file_uses_crlf() {
        let (_dir, store) = open_store().await;
        let path = store.path(RecordKind::Violations);
        std::fs::write(&path, "P1,2\r\n").unwrap();

        store.append(&ViolationRecord::new("P2", 1)).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "P1,2\r\nP2,1\r\n");
    }

    #[tokio::test]
    async fn test_rewrite_keeps_crlf_line_endings() {
        let (_dir, store) = open_store().await;
        let path = store.path(RecordKind::Violations);
        std::fs::write(&path, "# header\r\nP1,2\r\nP2,5\r\n").unwrap();

        store
            .rewrite_all(|doc: &mut Document<ViolationRecord>| {
                doc.retain(|r| r.person_id.as_str() != "P1");
            })
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# header\r\nP2,5\r\n");
    }

    #[tokio::test]
    async fn test_rewrite_keeps_comments_and_malformed_rows() {
        let (_dir, store) = open_store().await;
        let path = store.path(RecordKind::Violations);
        std::fs::write(&path, "# header\nP1,2\nnot-a-row\nP2,5\n").unwrap();

        store
            .rewrite_all(|doc: &mut Document<ViolationRecord>| {
                doc.retain(|r| r.person_id.as_str() != "P1");
            })
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "# header\nnot-a-row\nP2,5\n");
    }

    #[tokio::test]
    async fn test_rewrite_without_mutation_leaves_file_alone() {
        let (_dir, store) = open_store().await;
        let path = store.path(RecordKind::Violations);
        // Irregular spacing would be normalised by a rewrite
        std::fs::write(&path, "P1, 2\n").unwrap();

        let total = store
            .rewrite_all(|doc: &mut Document<ViolationRecord>| {
                doc.records().map(|r| r.count).sum::<u32>()
            })
            .await
            .unwrap();

        assert_eq!(total, 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "P1, 2\n");
    }

    #[tokio::test]
    async fn test_malformed_rows_reported_once() {
        let (_dir, store) = open_store().await;
        std::fs::write(store.path(RecordKind::Violations), "P1,many\n").unwrap();

        store.load::<ViolationRecord>().await.unwrap();
        store.load::<ViolationRecord>().await.unwrap();

        assert_eq!(store.faults().counts().malformed_rows, 1);
    }

    #[tokio::test]
    async fn test_concurrent_rewrites_lose_no_updates() {
        let (_dir, store) = open_store().await;
        let store = Arc::new(store);

        const TASKS: u32 = 20;
        let mut handles = vec![];
        for _ in 0..TASKS {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .rewrite_all(|doc: &mut Document<ViolationRecord>| {
                        let found = doc.records().position(|r| r.person_id.as_str() == "P1");
                        match found {
                            Some(index) => {
                                if let Some(record) = doc.record_mut(index) {
                                    record.count += 1;
                                }
                            }
                            None => doc.push(ViolationRecord::new("P1", 1)),
                        }
                    })
                    .await
                    .unwrap();
            }));
        }
        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }

        let records: Vec<ViolationRecord> = store.load_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].count, TASKS);
    }
}
