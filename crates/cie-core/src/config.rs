//! Pipeline configuration.
//!
//! Load order: `<repo>/.cie/config.toml` → environment variables → defaults.
//! Every tunable named in the design notes (worker counts, size limits,
//! exclusion globs, embedding dimension, delta/batch behavior) arrives through
//! this single structure, assembled once at the orchestrator boundary.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

const CIE_DIR: &str = ".cie";
const CONFIG_FILE: &str = "config.toml";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CieConfig {
    /// Parser worker pool size.
    pub parse_workers: usize,
    /// Embedding worker pool size.
    pub embed_workers: usize,
    /// Reject files larger than this many bytes.
    pub max_file_size: u64,
    /// Truncate stored code text beyond this many bytes.
    pub max_code_text: u64,
    /// Fixed dimensionality of stored embedding vectors.
    pub embedding_dimensions: usize,
    /// Glob patterns excluded at load and delta time.
    pub exclude_globs: Vec<String>,
    /// Prefer a VCS delta over a content-hash delta when both are available.
    pub use_vcs_delta: bool,
    /// Ignore stored state and force a full run.
    pub force_reindex: bool,
    /// Target number of mutations per write-batch transaction.
    pub batch_target_mutations: usize,
    /// Which embedding provider to construct (`"local"`, `"noop"`).
    pub embedding_provider: String,
    /// Path (relative to the project root) of the embedded datalog store.
    pub store_path: String,
}

impl Default for CieConfig {
    fn default() -> Self {
        Self {
            parse_workers: 4,
            embed_workers: 8,
            max_file_size: 1024 * 1024,
            max_code_text: 100 * 1024,
            embedding_dimensions: 768,
            exclude_globs: default_exclude_globs(),
            use_vcs_delta: true,
            force_reindex: false,
            batch_target_mutations: 2000,
            embedding_provider: "local".to_string(),
            store_path: format!("{CIE_DIR}/store.db"),
        }
    }
}

/// Defaults covering VCS metadata, lockfiles, vendor/build directories,
/// binaries, minified assets, and the tool's own state directory.
fn default_exclude_globs() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/.cie/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/vendor/**".to_string(),
        "**/target/**".to_string(),
        "**/dist/**".to_string(),
        "**/build/**".to_string(),
        "**/*.lock".to_string(),
        "**/*.min.js".to_string(),
        "**/*.min.css".to_string(),
        "**/*.{png,jpg,jpeg,gif,ico,woff,woff2,ttf,eot,pdf,zip,tar,gz}".to_string(),
    ]
}

/// Parse an env var and apply it to a config field, ignoring unparsable values.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl CieConfig {
    pub fn cie_dir(project_root: &Path) -> std::path::PathBuf {
        project_root.join(CIE_DIR)
    }

    /// Load config from `.cie/config.toml` in the project root, with env var
    /// overrides layered on top. Falls back to defaults if no file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = Self::cie_dir(project_root).join(CONFIG_FILE);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override("CIE_PARSE_WORKERS", &mut config.parse_workers);
        env_override("CIE_EMBED_WORKERS", &mut config.embed_workers);
        env_override("CIE_MAX_FILE_SIZE", &mut config.max_file_size);
        env_override("CIE_MAX_CODE_TEXT", &mut config.max_code_text);
        env_override("CIE_EMBEDDING_DIMENSIONS", &mut config.embedding_dimensions);
        env_override("CIE_USE_VCS_DELTA", &mut config.use_vcs_delta);
        env_override("CIE_FORCE_REINDEX", &mut config.force_reindex);
        env_override(
            "CIE_BATCH_TARGET_MUTATIONS",
            &mut config.batch_target_mutations,
        );
        if let Ok(provider) = std::env::var("CIE_EMBEDDING_PROVIDER") {
            config.embedding_provider = provider;
        }

        if config.max_code_text > config.max_file_size {
            anyhow::bail!(
                "max_code_text ({}) must not exceed max_file_size ({})",
                config.max_code_text,
                config.max_file_size,
            );
        }
        if config.parse_workers == 0 || config.embed_workers == 0 {
            anyhow::bail!("parse_workers and embed_workers must be at least 1");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_design_notes() {
        let config = CieConfig::default();
        assert_eq!(config.parse_workers, 4);
        assert_eq!(config.embed_workers, 8);
        assert_eq!(config.max_file_size, 1024 * 1024);
        assert_eq!(config.max_code_text, 100 * 1024);
        assert_eq!(config.embedding_dimensions, 768);
        assert!(config.use_vcs_delta);
        assert!(!config.force_reindex);
        assert_eq!(config.batch_target_mutations, 2000);
    }

    #[test]
    fn config_from_toml_overrides_only_given_fields() {
        let toml_str = r#"
parse_workers = 2
embedding_dimensions = 1536
"#;
        let config: CieConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.parse_workers, 2);
        assert_eq!(config.embedding_dimensions, 1536);
        assert_eq!(config.embed_workers, 8);
        assert_eq!(config.max_file_size, 1024 * 1024);
    }

    #[test]
    fn config_load_nonexistent_falls_back_to_defaults() {
        let config = CieConfig::load(Path::new("/nonexistent/path")).unwrap();
        assert_eq!(config.parse_workers, 4);
    }

    #[test]
    fn config_load_rejects_contradictory_limits() {
        let tmp = tempfile::tempdir().unwrap();
        let cie_dir = tmp.path().join(".cie");
        std::fs::create_dir_all(&cie_dir).unwrap();
        std::fs::write(
            cie_dir.join("config.toml"),
            "max_file_size = 100\nmax_code_text = 200\n",
        )
        .unwrap();

        let err = CieConfig::load(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("max_code_text"));
    }

    #[test]
    fn config_load_reads_toml_from_project_root() {
        let tmp = tempfile::tempdir().unwrap();
        let cie_dir = tmp.path().join(".cie");
        std::fs::create_dir_all(&cie_dir).unwrap();
        std::fs::write(cie_dir.join("config.toml"), "embed_workers = 16\n").unwrap();

        let config = CieConfig::load(tmp.path()).unwrap();
        assert_eq!(config.embed_workers, 16);
    }
}
