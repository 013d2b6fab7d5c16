use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use chrono::NaiveDateTime;
use crate::{Event, EventCode, EventSet, Field, Record};

pub const HEADER: [&str; 5] = ["timestamp", "event_code", "source_address", "user", "raw_message"];
/// Column names found in older datasets; accepted on load only.
const LEGACY_HEADER: [&str; 5] = ["Timestamp", "EventId", "SourceIP", "User", "RawMessage"];
/// Syslog stamps carry no year; one is assigned at load time.
pub const STAMP_FORMAT: &str = "%b %d %H:%M:%S";
pub const DEFAULT_REFERENCE_YEAR: i32 = 2024;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("dataset not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read dataset {}: {source}", path.display())]
    Unreadable { path: PathBuf, source: io::Error },
    #[error("failed to load dataset (row {row}): {reason}")]
    Malformed { row: u64, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub fn write_records<W: io::Write>(records: &[Record], w: W) -> Result<(), StoreError> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(HEADER)?;
    for r in records {
        wtr.write_record([r.timestamp.as_str(), r.event_code.as_str(), r.source_address.as_str(), r.user.as_str(), r.raw_message.as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save(records: &[Record], path: &Path) -> Result<(), StoreError> {
    write_records(records, std::fs::File::create(path)?)
}

/// Writes loaded events back in the persisted layout; the year is dropped.
pub fn save_events(events: &[Event], path: &Path) -> Result<(), StoreError> {
    let records: Vec<Record> = events.iter().map(to_record).collect();
    save(&records, path)
}

pub fn to_record(e: &Event) -> Record {
    Record {
        timestamp: Field::Value(e.timestamp.format(STAMP_FORMAT).to_string()),
        event_code: e.event_code,
        source_address: e.source_address.clone(),
        user: e.user.clone(),
        raw_message: e.raw_message.clone(),
    }
}

/// Dates a syslog stamp such as `"Jun 14 12:00:01"` in `year`.
pub fn parse_stamp(stamp: &str, year: i32) -> Option<NaiveDateTime> {
    let stamp = stamp.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&format!("{} {}", year, stamp), &format!("%Y {}", STAMP_FORMAT)).ok()
}

/// Reads a persisted dataset. Structural problems and unparseable values fail
/// the whole load; rows whose timestamp is the `None` marker are skipped
/// since they cannot be placed on the timeline.
pub fn read_events<R: io::Read>(r: R, reference_year: i32) -> Result<EventSet, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).flexible(false).from_reader(r);
    let headers = rdr.headers().map_err(|e| malformed(&e, 1))?.clone();
    let names: Vec<&str> = headers.iter().map(str::trim).collect();
    if names != HEADER && names != LEGACY_HEADER {
        return Err(LoadError::Malformed { row: 1, reason: format!("unexpected header: {}", names.join(",")) });
    }
    let mut events: EventSet = Vec::new();
    let mut skipped = 0usize;
    for (i, rec) in rdr.records().enumerate() {
        let row = i as u64 + 2;
        let rec = rec.map_err(|e| malformed(&e, row))?;
        let stamp = Field::from_text(&rec[0]);
        let Some(stamp) = stamp.value() else { skipped += 1; continue };
        let timestamp = parse_stamp(stamp, reference_year)
            .ok_or_else(|| LoadError::Malformed { row, reason: format!("unparseable timestamp '{}'", stamp) })?;
        let event_code: EventCode = rec[1].parse().map_err(|e| LoadError::Malformed { row, reason: format!("{}", e) })?;
        events.push(Event { timestamp, event_code, source_address: Field::from_text(&rec[2]), user: Field::from_text(&rec[3]), raw_message: rec[4].to_string() });
    }
    if skipped > 0 { log::warn!("skipped {} rows without a timestamp", skipped); }
    events.sort_by_key(|e| e.timestamp);
    Ok(events)
}

pub fn load(path: &Path, reference_year: i32) -> Result<EventSet, LoadError> {
    let data = read_source(path)?;
    read_events(data.as_slice(), reference_year)
}

fn read_source(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Unreadable { path: path.to_path_buf(), source: e },
    })
}

fn malformed(e: &csv::Error, fallback_row: u64) -> LoadError {
    let row = e.position().map(|p| p.line()).unwrap_or(fallback_row);
    LoadError::Malformed { row, reason: e.to_string() }
}

struct CacheEntry {
    hash: u64,
    year: i32,
    events: EventSet,
}

/// Memoizes loads per path. An entry is reused only while the file content
/// hash and the reference year are unchanged.
#[derive(Default)]
pub struct DatasetCache {
    entries: HashMap<PathBuf, CacheEntry>,
}

impl DatasetCache {
    pub fn new() -> Self { Self::default() }

    pub fn get_or_load(&mut self, path: &Path, reference_year: i32) -> Result<EventSet, LoadError> {
        let data = match read_source(path) {
            Ok(d) => d,
            Err(e) => { self.entries.remove(path); return Err(e); }
        };
        let hash = content_hash(&data);
        if let Some(entry) = self.entries.get(path) && entry.hash == hash && entry.year == reference_year {
            log::debug!("dataset cache hit for {}", path.display());
            return Ok(entry.events.clone());
        }
        let events = read_events(data.as_slice(), reference_year)?;
        self.entries.insert(path.to_path_buf(), CacheEntry { hash, year: reference_year, events: events.clone() });
        Ok(events)
    }

    /// Saves through the cache so the next load re-reads the file.
    pub fn save_records(&mut self, records: &[Record], path: &Path) -> Result<(), StoreError> {
        save(records, path)?;
        self.invalidate(path);
        Ok(())
    }

    pub fn invalidate(&mut self, path: &Path) { self.entries.remove(path); }

    pub fn clear(&mut self) { self.entries.clear(); }

    pub fn is_cached(&self, path: &Path) -> bool { self.entries.contains_key(path) }
}

fn content_hash(data: &[u8]) -> u64 {
    let mut h = DefaultHasher::new();
    data.hash(&mut h);
    h.finish()
}
