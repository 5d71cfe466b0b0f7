//! Language detection and tree-sitter grammar loading.

use std::path::Path;

/// Languages covered by the AST-based extractor bundle. Go is the
/// reference language for the resolver's export-convention and package-dir
/// heuristics; the rest reuse the same machinery with a best-effort notion of
/// "package" (module-relative directory, declared package clause, and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Go,
    Rust,
    Python,
    TypeScript,
    JavaScript,
    Java,
}

impl Language {
    /// Detect language from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "go" => Some(Self::Go),
            "rs" => Some(Self::Rust),
            "py" => Some(Self::Python),
            "ts" | "tsx" => Some(Self::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    /// Languages present under a root, ordered by file count descending.
    /// Extensions outside the bundle are simply never emitted here; the
    /// loader still enumerates those files, they just never reach
    /// a language-specific extractor.
    pub fn detect_all(root: &Path) -> Vec<Self> {
        let mut counts: std::collections::HashMap<Self, usize> = std::collections::HashMap::new();

        let walker = ignore::WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .add_custom_ignore_filename(".cieignore")
            .build();

        for entry in walker.flatten() {
            if let Some(ext) = entry.path().extension().and_then(|e| e.to_str())
                && let Some(lang) = Self::from_extension(ext)
            {
                *counts.entry(lang).or_insert(0) += 1;
            }
        }

        let mut langs: Vec<(Self, usize)> = counts.into_iter().collect();
        langs.sort_by(|a, b| b.1.cmp(&a.1));
        langs.into_iter().map(|(lang, _)| lang).collect()
    }

    /// Display name stored on `FileEntity::language`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Java => "java",
        }
    }

    /// The tree-sitter grammar backing this language's extractor.
    pub fn ts_language(&self) -> tree_sitter::Language {
        match self {
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping_covers_the_full_bundle() {
        assert_eq!(Language::from_extension("go"), Some(Language::Go));
        assert_eq!(Language::from_extension("rs"), Some(Language::Rust));
        assert_eq!(Language::from_extension("tsx"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("mjs"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension("unknownext"), None);
    }
}
