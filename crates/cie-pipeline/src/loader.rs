//! Repo loader: walk the source tree, apply exclusion globs and
//! size/binary filters, and yield file descriptors plus a reason-tallied skip
//! report.

use cie_core::config::CieConfig;
use cie_core::error::{CieError, CieResult};
use cie_parser::languages::Language;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Bytes sniffed for the NUL-byte binary heuristic.
const BINARY_SNIFF_BYTES: usize = 8 * 1024;

/// A file that survived every filter. `language` is `None` for files outside
/// the extractor bundle; they are still enumerated and recorded, they just
/// produce an empty parse.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Repo-relative, forward-slash path.
    pub path: String,
    pub full_path: PathBuf,
    pub size: u64,
    pub language: Option<Language>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Excluded,
    Oversized,
    Binary,
    Symlink,
    Unreadable,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excluded => "excluded",
            Self::Oversized => "oversized",
            Self::Binary => "binary",
            Self::Symlink => "symlink",
            Self::Unreadable => "unreadable",
        }
    }
}

#[derive(Debug, Default)]
pub struct LoadOutput {
    /// Sorted by path.
    pub files: Vec<SourceFile>,
    /// Skip-reason histogram.
    pub skipped: BTreeMap<String, u64>,
}

impl LoadOutput {
    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason.as_str().to_string()).or_insert(0) += 1;
    }
}

/// Compile the configured exclusion globs once per run.
pub fn build_exclusions(globs: &[String]) -> CieResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in globs {
        let glob = Glob::new(pattern)
            .map_err(|e| CieError::Other(anyhow::anyhow!("invalid exclude glob {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| CieError::Other(anyhow::anyhow!("exclude glob set: {e}")))
}

/// Test one already-walked file against the per-file filters. Returns its
/// size when eligible. Used by the loader and by the delta post-filter pass
/// so both apply identical rules.
pub fn check_eligible(
    rel_path: &str,
    full_path: &Path,
    exclusions: &GlobSet,
    max_file_size: u64,
) -> Result<u64, SkipReason> {
    if exclusions.is_match(rel_path) {
        return Err(SkipReason::Excluded);
    }
    let meta = std::fs::symlink_metadata(full_path).map_err(|_| SkipReason::Unreadable)?;
    if meta.file_type().is_symlink() {
        return Err(SkipReason::Symlink);
    }
    if !meta.is_file() {
        // a directory masquerading as a file candidate
        return Err(SkipReason::Unreadable);
    }
    if meta.len() > max_file_size {
        return Err(SkipReason::Oversized);
    }
    if looks_binary(full_path) {
        return Err(SkipReason::Binary);
    }
    Ok(meta.len())
}

/// NUL byte anywhere in the first 8 KiB.
fn looks_binary(path: &Path) -> bool {
    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };
    let mut buf = [0u8; BINARY_SNIFF_BYTES];
    let mut handle = file.take(BINARY_SNIFF_BYTES as u64);
    let Ok(n) = handle.read(&mut buf) else {
        return false;
    };
    buf[..n].contains(&0)
}

/// Walk the whole tree under `root` and return every eligible file, sorted by
/// path, plus the skip histogram.
pub fn load_repo(root: &Path, config: &CieConfig) -> CieResult<LoadOutput> {
    let exclusions = build_exclusions(&config.exclude_globs)?;
    let mut out = LoadOutput::default();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => {
                out.skip(SkipReason::Unreadable);
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();
        let rel = cie_core::ids::normalize_path(&rel);
        match check_eligible(&rel, entry.path(), &exclusions, config.max_file_size) {
            Ok(size) => out.files.push(make_source_file(rel, entry.path().to_path_buf(), size)),
            Err(reason) => out.skip(reason),
        }
    }

    out.files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(
        files = out.files.len(),
        skipped = out.skipped.values().sum::<u64>(),
        "repo walk complete"
    );
    Ok(out)
}

/// Load a specific set of repo-relative paths (the incremental path), applying
/// the same filters as the full walk. Ineligible paths are tallied, not fatal.
pub fn load_paths(root: &Path, paths: &[String], config: &CieConfig) -> CieResult<LoadOutput> {
    let exclusions = build_exclusions(&config.exclude_globs)?;
    let mut out = LoadOutput::default();
    for rel in paths {
        let rel = cie_core::ids::normalize_path(rel);
        let full = root.join(&rel);
        match check_eligible(&rel, &full, &exclusions, config.max_file_size) {
            Ok(size) => out.files.push(make_source_file(rel, full, size)),
            Err(reason) => out.skip(reason),
        }
    }
    out.files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

fn make_source_file(path: String, full_path: PathBuf, size: u64) -> SourceFile {
    let language = Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(Language::from_extension);
    SourceFile { path, full_path, size, language }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CieConfig {
        CieConfig::default()
    }

    #[test]
    fn walk_yields_sorted_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/b.go"), "package b\n").unwrap();
        std::fs::write(tmp.path().join("src/a.go"), "package a\n").unwrap();
        std::fs::write(tmp.path().join("README.md"), "hi\n").unwrap();

        let out = load_repo(tmp.path(), &config()).unwrap();
        let paths: Vec<&str> = out.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src/a.go", "src/b.go"]);
        assert_eq!(out.files[1].language, Some(Language::Go));
        assert_eq!(out.files[0].language, None);
    }

    #[test]
    fn excluded_directories_are_tallied_not_listed() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("vendor/dep")).unwrap();
        std::fs::write(tmp.path().join("vendor/dep/lib.go"), "package dep\n").unwrap();
        std::fs::write(tmp.path().join("main.go"), "package main\n").unwrap();

        let out = load_repo(tmp.path(), &config()).unwrap();
        assert_eq!(out.files.len(), 1);
        assert_eq!(out.skipped.get("excluded"), Some(&1));
    }

    #[test]
    fn oversized_and_binary_files_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config();
        cfg.max_file_size = 16;
        std::fs::write(tmp.path().join("big.go"), "x".repeat(64)).unwrap();
        std::fs::write(tmp.path().join("blob.go"), b"abc\0def").unwrap();
        std::fs::write(tmp.path().join("ok.go"), "package m\n").unwrap();

        let out = load_repo(tmp.path(), &cfg).unwrap();
        assert_eq!(out.files.len(), 1);
        assert_eq!(out.files[0].path, "ok.go");
        assert_eq!(out.skipped.get("oversized"), Some(&1));
        assert_eq!(out.skipped.get("binary"), Some(&1));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("real.go"), "package m\n").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real.go"), tmp.path().join("link.go")).unwrap();

        let out = load_repo(tmp.path(), &config()).unwrap();
        assert_eq!(out.files.len(), 1);
        assert_eq!(out.skipped.get("symlink"), Some(&1));
    }

    #[test]
    fn load_paths_applies_the_same_filters() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.go"), "package a\n").unwrap();

        let out = load_paths(
            tmp.path(),
            &["a.go".to_string(), "missing.go".to_string()],
            &config(),
        )
        .unwrap();
        assert_eq!(out.files.len(), 1);
        assert_eq!(out.skipped.get("unreadable"), Some(&1));
    }
}
