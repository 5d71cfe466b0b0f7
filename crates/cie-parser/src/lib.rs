//! Tree-sitter based code parsing: the parser dispatcher and per-language
//! extractors.

pub mod calls;
pub mod entities;
pub mod languages;
pub mod signature;
pub mod treesitter;

use cie_core::model::{
    CallsEdge, DefinesEdge, DefinesTypeEdge, FieldEntity, FunctionEntity, ImportEntity, TypeEntity,
    UnresolvedCall,
};
use languages::Language;
use std::path::Path;

/// Everything a single file's syntactic pass produces.
#[derive(Debug, Default)]
pub struct ParseResult {
    pub functions: Vec<FunctionEntity>,
    pub types: Vec<TypeEntity>,
    pub fields: Vec<FieldEntity>,
    pub imports: Vec<ImportEntity>,
    pub defines: Vec<DefinesEdge>,
    pub defines_types: Vec<DefinesTypeEdge>,
    pub calls: Vec<CallsEdge>,
    pub unresolved_calls: Vec<UnresolvedCall>,
    pub package_name: Option<String>,
    pub had_syntax_error: bool,
    /// Number of entity code texts truncated to `max_code_text`.
    pub code_text_truncated: u64,
}

/// Parse one file end to end: entity extraction, then import/call extraction
/// over the same tree. Syntax errors are tolerated: whatever the
/// tree-sitter grammar recovered is still extracted.
pub fn parse_file(
    path: &Path,
    source: &[u8],
    language: Language,
    max_code_text: u64,
) -> ParseResult {
    let Ok(tree) = treesitter::parse_file(path, source, language) else {
        return ParseResult::default();
    };
    let had_syntax_error = treesitter::has_error_nodes(&tree);
    if had_syntax_error {
        tracing::debug!(path = %path.display(), "syntax errors recovered during parse");
    }

    let rel_path = path.to_string_lossy().to_string();
    let normalized = cie_core::ids::normalize_path(&rel_path);
    let file_id = cie_core::ids::file_id(&normalized);

    let extracted = entities::extract(&tree, source, &rel_path, language, max_code_text);

    let defines = extracted
        .functions
        .iter()
        .map(|f| DefinesEdge {
            file_id: file_id.clone(),
            function_id: f.id.clone(),
        })
        .collect();
    let defines_types = extracted
        .types
        .iter()
        .map(|t| DefinesTypeEdge {
            file_id: file_id.clone(),
            type_id: t.id.clone(),
        })
        .collect();

    let dep_result = calls::extract(&tree, source, &rel_path, language, &extracted.functions);

    ParseResult {
        functions: extracted.functions,
        types: extracted.types,
        fields: extracted.fields,
        imports: dep_result.imports,
        defines,
        defines_types,
        calls: dep_result.calls,
        unresolved_calls: dep_result.unresolved_calls,
        package_name: extracted.package_name,
        had_syntax_error,
        code_text_truncated: extracted.truncated,
    }
}
