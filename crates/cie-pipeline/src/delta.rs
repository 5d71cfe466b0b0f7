//! Delta detectors: a VCS delta driven by repository tooling and
//! a content-hash delta against stored hashes. Both yield the same shape and
//! go through the same post-filter pass as the loader.

use crate::loader::{self, SourceFile};
use cie_core::error::{CieError, CieResult};
use globset::GlobSet;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

/// The well-known empty-tree identifier, standing in for "initial ingestion"
/// when no base ref is recorded.
pub const EMPTY_TREE_ID: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// File changes between two states, all lists sorted and deduplicated.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    /// `(old_path, new_path)` pairs.
    pub renamed: Vec<(String, String)>,
    pub base: String,
    pub head: String,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.renamed.is_empty()
    }

    /// Paths whose stored entities must be deleted before re-indexing:
    /// modified ∪ deleted ∪ renamed-from.
    pub fn affected_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .modified
            .iter()
            .chain(self.deleted.iter())
            .cloned()
            .chain(self.renamed.iter().map(|(old, _)| old.clone()))
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Paths to re-parse: added ∪ modified ∪ renamed-to.
    pub fn changed_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .added
            .iter()
            .chain(self.modified.iter())
            .cloned()
            .chain(self.renamed.iter().map(|(_, new)| new.clone()))
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    fn normalize(&mut self) {
        self.added.sort();
        self.added.dedup();
        self.modified.sort();
        self.modified.dedup();
        self.deleted.sort();
        self.deleted.dedup();
        self.renamed.sort();
        self.renamed.dedup();
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Commit id of `HEAD`, if `root` is a repository with at least one commit.
pub fn current_head(root: &Path) -> CieResult<String> {
    let repo = git2::Repository::open(root)
        .map_err(|_| CieError::NotARepository(root.to_path_buf()))?;
    let commit = repo
        .head()
        .and_then(|h| h.peel_to_commit())
        .map_err(|e| CieError::Other(anyhow::anyhow!("cannot resolve HEAD: {e}")))?;
    Ok(commit.id().to_string())
}

/// VCS delta between `base` and `head` with rename detection enabled.
/// An empty `base` means initial ingestion and diffs from the empty tree;
/// `head` defaults to `HEAD` when empty. Copies become additions at the new
/// path. The rename similarity threshold is whatever the VCS
/// client defaults to.
pub fn git_delta(root: &Path, base: &str, head: &str) -> CieResult<Delta> {
    let repo = git2::Repository::open(root)
        .map_err(|_| CieError::NotARepository(root.to_path_buf()))?;

    let head_commit = if head.is_empty() || head == "HEAD" {
        repo.head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| CieError::Other(anyhow::anyhow!("cannot resolve HEAD: {e}")))?
    } else {
        repo.revparse_single(head)
            .and_then(|o| o.peel_to_commit())
            .map_err(|e| CieError::Other(anyhow::anyhow!("cannot resolve head ref {head:?}: {e}")))?
    };
    let head_tree = head_commit
        .tree()
        .map_err(|e| CieError::Other(anyhow::anyhow!("head tree: {e}")))?;

    let (base_id, base_tree) = if base.is_empty() {
        let oid = repo
            .treebuilder(None)
            .and_then(|b| b.write())
            .map_err(|e| CieError::Other(anyhow::anyhow!("empty tree: {e}")))?;
        let tree = repo
            .find_tree(oid)
            .map_err(|e| CieError::Other(anyhow::anyhow!("empty tree lookup: {e}")))?;
        (EMPTY_TREE_ID.to_string(), tree)
    } else {
        let commit = repo
            .revparse_single(base)
            .and_then(|o| o.peel_to_commit())
            .map_err(|e| CieError::Other(anyhow::anyhow!("cannot resolve base ref {base:?}: {e}")))?;
        let id = commit.id().to_string();
        let tree = commit
            .tree()
            .map_err(|e| CieError::Other(anyhow::anyhow!("base tree: {e}")))?;
        (id, tree)
    };

    let mut diff = repo
        .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)
        .map_err(|e| CieError::Other(anyhow::anyhow!("diff: {e}")))?;
    let mut find = git2::DiffFindOptions::new();
    find.renames(true).copies(true);
    diff.find_similar(Some(&mut find))
        .map_err(|e| CieError::Other(anyhow::anyhow!("rename detection: {e}")))?;

    let mut delta = Delta {
        base: base_id,
        head: head_commit.id().to_string(),
        ..Delta::default()
    };

    for change in diff.deltas() {
        let old_path = change
            .old_file()
            .path()
            .map(|p| cie_core::ids::normalize_path(&p.to_string_lossy()));
        let new_path = change
            .new_file()
            .path()
            .map(|p| cie_core::ids::normalize_path(&p.to_string_lossy()));
        match change.status() {
            git2::Delta::Added | git2::Delta::Copied => {
                if let Some(p) = new_path {
                    delta.added.push(p);
                }
            }
            git2::Delta::Deleted => {
                if let Some(p) = old_path {
                    delta.deleted.push(p);
                }
            }
            git2::Delta::Modified | git2::Delta::Typechange => {
                if let Some(p) = new_path {
                    delta.modified.push(p);
                }
            }
            git2::Delta::Renamed => {
                if let (Some(old), Some(new)) = (old_path, new_path) {
                    delta.renamed.push((old, new));
                }
            }
            _ => {}
        }
    }

    delta.normalize();
    Ok(delta)
}

/// Content-hash delta: classify each current file against the stored
/// `path → content_hash` map. No renames are detected.
pub fn hash_delta(stored: &HashMap<String, String>, current: &[SourceFile]) -> Delta {
    let mut delta = Delta::default();
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();

    for file in current {
        seen.insert(&file.path);
        let Ok(bytes) = std::fs::read(&file.full_path) else {
            continue;
        };
        let hash = sha256_hex(&bytes);
        match stored.get(&file.path) {
            None => delta.added.push(file.path.clone()),
            Some(prev) if *prev != hash => delta.modified.push(file.path.clone()),
            Some(_) => {}
        }
    }

    for path in stored.keys() {
        if !seen.contains(&path.as_str()) {
            delta.deleted.push(path.clone());
        }
    }

    delta.normalize();
    delta
}

/// Re-apply the loader's eligibility rules to a delta: ineligible
/// additions are dropped, ineligible modifications become deletions of the
/// path, and renames whose new path is ineligible become deletions of the old
/// path.
pub fn post_filter(mut delta: Delta, root: &Path, exclusions: &GlobSet, max_file_size: u64) -> Delta {
    let eligible =
        |rel: &str| loader::check_eligible(rel, &root.join(rel), exclusions, max_file_size).is_ok();

    delta.added.retain(|p| eligible(p));

    let mut still_modified = Vec::new();
    for path in delta.modified.drain(..) {
        if eligible(&path) {
            still_modified.push(path);
        } else {
            delta.deleted.push(path);
        }
    }
    delta.modified = still_modified;

    let mut still_renamed = Vec::new();
    for (old, new) in delta.renamed.drain(..) {
        if eligible(&new) {
            still_renamed.push((old, new));
        } else {
            delta.deleted.push(old);
        }
    }
    delta.renamed = still_renamed;

    delta.normalize();
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::build_exclusions;
    use cie_core::config::CieConfig;

    fn source_file(root: &Path, rel: &str) -> SourceFile {
        SourceFile {
            path: rel.to_string(),
            full_path: root.join(rel),
            size: 0,
            language: None,
        }
    }

    #[test]
    fn hash_delta_classifies_added_modified_deleted() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("same.go"), "package a\n").unwrap();
        std::fs::write(tmp.path().join("changed.go"), "package b2\n").unwrap();
        std::fs::write(tmp.path().join("new.go"), "package c\n").unwrap();

        let stored = HashMap::from([
            ("same.go".to_string(), sha256_hex(b"package a\n")),
            ("changed.go".to_string(), sha256_hex(b"package b\n")),
            ("gone.go".to_string(), sha256_hex(b"package d\n")),
        ]);
        let current = vec![
            source_file(tmp.path(), "same.go"),
            source_file(tmp.path(), "changed.go"),
            source_file(tmp.path(), "new.go"),
        ];

        let delta = hash_delta(&stored, &current);
        assert_eq!(delta.added, vec!["new.go"]);
        assert_eq!(delta.modified, vec!["changed.go"]);
        assert_eq!(delta.deleted, vec!["gone.go"]);
        assert!(delta.renamed.is_empty());
    }

    #[test]
    fn post_filter_converts_ineligible_rename_target_to_deletion() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("vendor")).unwrap();
        std::fs::write(tmp.path().join("vendor/lib.go"), "package v\n").unwrap();

        let delta = Delta {
            renamed: vec![("lib.go".to_string(), "vendor/lib.go".to_string())],
            ..Delta::default()
        };
        let exclusions = build_exclusions(&CieConfig::default().exclude_globs).unwrap();
        let filtered = post_filter(delta, tmp.path(), &exclusions, 1024);

        assert!(filtered.renamed.is_empty());
        assert_eq!(filtered.deleted, vec!["lib.go"]);
    }

    #[test]
    fn post_filter_drops_ineligible_additions_and_demotes_modifications() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("huge.go"), "x".repeat(64)).unwrap();

        let delta = Delta {
            added: vec!["missing.go".to_string()],
            modified: vec!["huge.go".to_string()],
            ..Delta::default()
        };
        let exclusions = build_exclusions(&[]).unwrap();
        let filtered = post_filter(delta, tmp.path(), &exclusions, 16);

        assert!(filtered.added.is_empty());
        assert!(filtered.modified.is_empty());
        assert_eq!(filtered.deleted, vec!["huge.go"]);
    }

    #[test]
    fn affected_and_changed_paths_partition_the_delta() {
        let delta = Delta {
            added: vec!["a.go".to_string()],
            modified: vec!["m.go".to_string()],
            deleted: vec!["d.go".to_string()],
            renamed: vec![("old.go".to_string(), "new.go".to_string())],
            base: String::new(),
            head: String::new(),
        };
        assert_eq!(delta.affected_paths(), vec!["d.go", "m.go", "old.go"]);
        assert_eq!(delta.changed_paths(), vec!["a.go", "m.go", "new.go"]);
    }

    #[test]
    fn non_repository_is_reported_as_such() {
        let tmp = tempfile::tempdir().unwrap();
        let err = git_delta(tmp.path(), "", "HEAD").unwrap_err();
        assert!(matches!(err, CieError::NotARepository(_)));
    }
}
