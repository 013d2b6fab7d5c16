use std::path::{Path, PathBuf};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use walkdir::WalkDir;
use crate::parser::{LogParser, ParseStats};
use crate::Record;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("log path not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("invalid file glob: {0}")]
    Glob(#[from] globset::Error),
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SourceScan {
    pub files: Vec<String>,
    pub records: Vec<Record>,
    pub stats: ParseStats,
}

#[derive(Clone, Debug, Default)]
pub struct ScanOptions {
    pub file_glob: Option<String>,
    pub recursive: bool,
    pub progress: bool,
}

fn glob_set(g: &str) -> Result<GlobSet, globset::Error> {
    let mut gs = GlobSetBuilder::new();
    gs.add(GlobBuilder::new(g).case_insensitive(true).literal_separator(false).build()?);
    gs.build()
}

/// Log files under `root`: the file itself, or the directory's files
/// (matching the glob if one is given), in path order.
pub fn collect_files(root: &Path, opts: &ScanOptions) -> Result<Vec<PathBuf>, SourceError> {
    if !root.exists() { return Err(SourceError::NotFound(root.to_path_buf())); }
    if root.is_file() { return Ok(vec![root.to_path_buf()]); }
    let set = opts.file_glob.as_deref().map(glob_set).transpose()?;
    let wd = if opts.recursive { WalkDir::new(root) } else { WalkDir::new(root).max_depth(1) };
    let mut files: Vec<PathBuf> = vec![];
    for de in wd.sort_by_file_name().follow_links(false).into_iter().filter_map(Result::ok) {
        let p = de.path();
        if !p.is_file() { continue; }
        if let Some(set) = &set && !p.file_name().is_some_and(|n| set.is_match(n)) { continue; }
        files.push(p.to_path_buf());
    }
    Ok(files)
}

/// Parses every collected file. Unreadable files are logged and skipped.
pub fn scan(root: &Path, parser: &LogParser, opts: &ScanOptions) -> Result<SourceScan, SourceError> {
    let files = collect_files(root, opts)?;
    let pb = if opts.progress { Some(indicatif::ProgressBar::new_spinner()) } else { None };
    let mut out = SourceScan::default();
    for f in files {
        let name = f.to_string_lossy().into_owned();
        if let Some(ref pb) = pb { pb.set_message(format!("Parsing {}", name)); pb.tick(); }
        let bytes = match std::fs::read(&f) { Ok(b) => b, Err(e) => { log::error!("Failed to read log {}: {}", name, e); continue } };
        let (records, stats) = parser.parse_with_stats(&crate::parser::decode_lossy(&bytes));
        log::info!("{}: {} sshd lines of {}", name, stats.kept, stats.lines);
        out.stats.lines += stats.lines;
        out.stats.kept += stats.kept;
        out.stats.skipped += stats.skipped;
        out.records.extend(records);
        out.files.push(name);
    }
    if let Some(pb) = pb { pb.finish_and_clear(); }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir(name: &str) -> PathBuf {
        let d = std::env::temp_dir().join(format!("sshmon_src_{}_{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&d);
        std::fs::create_dir_all(d.join("old")).unwrap();
        d
    }

    #[test]
    fn directory_scan_honours_glob_and_depth() {
        let d = tmp_dir("glob");
        std::fs::write(d.join("auth.log"), "Jun 14 12:00:02 h sshd[1]: Connection closed by 1.1.1.1\n").unwrap();
        std::fs::write(d.join("auth.log.1"), "Jun 13 12:00:02 h sshd[1]: Connection closed by 2.2.2.2\nJun 13 12:00:03 h cron[2]: x\n").unwrap();
        std::fs::write(d.join("syslog"), "Jun 14 12:00:02 h sshd[1]: Connection closed by 3.3.3.3\n").unwrap();
        std::fs::write(d.join("old").join("auth.log.2"), "Jun 10 12:00:02 h sshd[1]: Connection closed by 4.4.4.4\n").unwrap();
        let parser = LogParser::default();
        let opts = ScanOptions { file_glob: Some("auth.log*".to_string()), ..Default::default() };
        let s = scan(&d, &parser, &opts).unwrap();
        assert_eq!(s.files.len(), 2);
        assert_eq!(s.records.len(), 2);
        assert_eq!(s.stats, ParseStats { lines: 3, kept: 2, skipped: 1 });
        let opts = ScanOptions { file_glob: Some("AUTH.LOG*".to_string()), recursive: true, ..Default::default() };
        assert_eq!(scan(&d, &parser, &opts).unwrap().records.len(), 3);
        let _ = std::fs::remove_dir_all(&d);
    }

    #[test]
    fn single_file_and_missing_path() {
        let d = tmp_dir("single");
        let f = d.join("secure");
        std::fs::write(&f, "Jun 14 12:00:02 h sshd[1]: Connection closed by 1.1.1.1\n").unwrap();
        assert_eq!(collect_files(&f, &ScanOptions::default()).unwrap(), vec![f.clone()]);
        assert!(matches!(collect_files(&d.join("nope"), &ScanOptions::default()), Err(SourceError::NotFound(_))));
        assert!(matches!(collect_files(&d, &ScanOptions { file_glob: Some("[".to_string()), ..Default::default() }), Err(SourceError::Glob(_))));
        let _ = std::fs::remove_dir_all(&d);
    }
}
