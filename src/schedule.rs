use csv::{ReaderBuilder, StringRecord};
use indexmap::IndexMap;
use log::{debug, error, info};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Columns a schedule export must carry. Any order, extra columns are ignored.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "Subject",
    "Catalog",
    "Section",
    "Component",
    "Session",
    "Units",
    "TotEnrl",
    "CapEnrl",
    "Instructor",
];

/// Two-line header printed above every listing.
pub const LISTING_HEADER: &str = "\
Subject  Catalog Section  Component  Session Units TotEnrl  CapEnrl Instructor
-------  ------- -------- ---------- ------- ----- -------- ------- ----------";

const BOM: char = '\u{feff}';

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("schedule file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to open schedule file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not read header row: {source}")]
    Header {
        #[source]
        source: csv::Error,
    },

    #[error("required column '{column}' missing from header")]
    MissingColumn { column: String },

    /// `row` is 1-based and does not count the header.
    #[error("could not parse data row {row}: {source}")]
    Parse {
        row: usize,
        #[source]
        source: csv::Error,
    },
}

impl ScheduleError {
    fn open(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            ScheduleError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ScheduleError::Open {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// The source could not be opened at all.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ScheduleError::NotFound { .. } | ScheduleError::Open { .. }
        )
    }

    /// The source was opened but its content was rejected.
    pub fn is_parse(&self) -> bool {
        !self.is_not_found()
    }
}

pub type Result<T> = std::result::Result<T, ScheduleError>;

/// One course offering, i.e. one row of the schedule export.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Record {
    #[serde(rename = "Subject")]
    subject: String,
    #[serde(rename = "Catalog")]
    catalog: String,
    #[serde(rename = "Section")]
    section: String,
    #[serde(rename = "Component")]
    component: String,
    #[serde(rename = "Session")]
    session: String,
    #[serde(rename = "Units", deserialize_with = "integer_field")]
    units: u32,
    #[serde(rename = "TotEnrl", deserialize_with = "integer_field")]
    total_enrolled: u32,
    #[serde(rename = "CapEnrl", deserialize_with = "integer_field")]
    capacity: u32,
    #[serde(rename = "Instructor")]
    instructor: String,
}

// Surrounding blanks are tolerated in numeric columns, nothing else is.
fn integer_field<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .parse()
        .map_err(|_| serde::de::Error::custom(format!("invalid integer {:?}", raw)))
}

impl Record {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subject: impl Into<String>,
        catalog: impl Into<String>,
        section: impl Into<String>,
        component: impl Into<String>,
        session: impl Into<String>,
        units: u32,
        total_enrolled: u32,
        capacity: u32,
        instructor: impl Into<String>,
    ) -> Self {
        Record {
            subject: subject.into(),
            catalog: catalog.into(),
            section: section.into(),
            component: component.into(),
            session: session.into(),
            units,
            total_enrolled,
            capacity,
            instructor: instructor.into(),
        }
    }

    /// `subject_catalog_section`, e.g. `BIO_141_D01`.
    pub fn key(&self) -> String {
        format!("{}_{}_{}", self.subject, self.catalog, self.section)
    }

    /// Fixed-width listing line, see [`LISTING_HEADER`].
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn units(&self) -> u32 {
        self.units
    }

    pub fn total_enrolled(&self) -> u32 {
        self.total_enrolled
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn instructor(&self) -> &str {
        &self.instructor
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<7} {:<7} {:<8} {:<10} {:<7} {:<5} {:<8} {:<7} {}",
            self.subject,
            self.catalog,
            self.section,
            self.component,
            self.session,
            self.units,
            self.total_enrolled,
            self.capacity,
            self.instructor
        )
    }
}

/// In-memory schedule keyed by [`Record::key`].
///
/// Iteration follows the order in which keys were first added. Adding a
/// record whose key is already present replaces the stored record in place.
#[derive(Debug, Default)]
pub struct Catalog {
    records: IndexMap<String, Record>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            records: IndexMap::new(),
        }
    }

    pub fn add(&mut self, record: Record) {
        if let Some(previous) = self.records.insert(record.key(), record) {
            debug!("course '{}' replaced by a later row", previous.key());
        }
    }

    /// Loads every row of the CSV file at `path`, returning the number of rows read.
    ///
    /// Nothing is added unless the whole file parses.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ScheduleError::open(path, source))?;
        let mut input = BufReader::new(file);
        // opening a directory succeeds, the first read does not
        input
            .fill_buf()
            .map_err(|source| ScheduleError::open(path, source))?;
        self.load_from_reader(input)
            .map_err(|err| {
                error!("could not load '{}': {}", path.display(), err);
                err
            })
    }

    pub fn load_from_reader<R: Read>(&mut self, source: R) -> Result<usize> {
        let mut reader = ReaderBuilder::new().from_reader(source);
        let headers = checked_headers(&mut reader)?;
        reader.set_headers(headers);

        let mut staged = Vec::new();
        for (index, row) in reader.deserialize::<Record>().enumerate() {
            let record = row.map_err(|source| ScheduleError::Parse {
                row: index + 1,
                source,
            })?;
            staged.push(record);
        }

        let rows = staged.len();
        staged.into_iter().for_each(|record| self.add(record));
        info!("loaded {} rows, {} courses stored", rows, self.len());
        Ok(rows)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn all(&self) -> Vec<&Record> {
        self.records.values().collect()
    }

    pub fn find_by_subject(&self, subject: &str) -> Vec<&Record> {
        let subject = subject.to_lowercase();
        self.records
            .values()
            .filter(|record| record.subject.to_lowercase() == subject)
            .collect()
    }

    /// Subject is matched case-insensitively, catalog number exactly.
    pub fn find_by_subject_catalog(&self, subject: &str, catalog: &str) -> Vec<&Record> {
        let subject = subject.to_lowercase();
        self.records
            .values()
            .filter(|record| record.subject.to_lowercase() == subject && record.catalog == catalog)
            .collect()
    }

    /// Instructors are stored as `Last,First`, so a case-insensitive prefix
    /// test on the whole string selects by last name.
    pub fn find_by_instructor_last_name_prefix(&self, prefix: &str) -> Vec<&Record> {
        let prefix = prefix.to_lowercase();
        self.records
            .values()
            .filter(|record| record.instructor.to_lowercase().starts_with(&prefix))
            .collect()
    }

    pub fn write_results<T: io::Write>(&self, target: T) -> io::Result<()> {
        write_listing(target, self.records.values())
    }
}

fn checked_headers<R: Read>(reader: &mut csv::Reader<R>) -> Result<StringRecord> {
    let mut headers = reader
        .headers()
        .map_err(|source| ScheduleError::Header { source })?
        .clone();
    if headers.get(0).map_or(false, |first| first.starts_with(BOM)) {
        headers = headers.iter().map(|h| h.trim_start_matches(BOM)).collect();
    }
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(ScheduleError::MissingColumn {
                column: column.to_string(),
            });
        }
    }
    Ok(headers)
}

/// Writes [`LISTING_HEADER`] followed by one rendered line per record.
pub fn write_listing<'a, T, I>(mut target: T, records: I) -> io::Result<()>
where
    T: io::Write,
    I: IntoIterator<Item = &'a Record>,
{
    writeln!(target, "{}", LISTING_HEADER)?;
    for record in records {
        writeln!(target, "{}", record)?;
    }
    target.flush()
}
