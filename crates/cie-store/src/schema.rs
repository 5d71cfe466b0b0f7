//! Knowledge-graph relation schema.

/// Key under `project_meta` holding the last successfully indexed VCS ref.
pub const LAST_INDEXED_REF_KEY: &str = "last_indexed_ref";

/// Key under `project_meta` holding the JSON summary of the last run.
pub const LAST_RUN_KEY: &str = "last_run";

/// `:create` statements for every relation, in creation order. `dimensions`
/// fixes the vector column width of the two embedding relations.
pub fn create_statements(dimensions: usize) -> Vec<String> {
    vec![
        ":create cie_file {id: String => path: String, content_hash: String, language: String, size: Int}"
            .to_string(),
        ":create cie_function {id: String => name: String, signature: String, file_path: String, start_line: Int, end_line: Int, start_col: Int, end_col: Int}"
            .to_string(),
        ":create cie_function_code {id: String => code_text: String}".to_string(),
        format!(":create cie_function_embedding {{id: String => embedding: <F32; {dimensions}>}}"),
        ":create cie_type {id: String => name: String, kind: String, file_path: String, start_line: Int, end_line: Int}"
            .to_string(),
        ":create cie_type_code {id: String => code_text: String}".to_string(),
        format!(":create cie_type_embedding {{id: String => embedding: <F32; {dimensions}>}}"),
        ":create cie_defines {file_id: String, function_id: String}".to_string(),
        ":create cie_defines_type {file_id: String, type_id: String}".to_string(),
        ":create cie_calls {caller_id: String, callee_id: String => call_line: Int default 0}"
            .to_string(),
        ":create cie_import {id: String => file_path: String, import_path: String, alias: String, start_line: Int}"
            .to_string(),
        ":create cie_field {id: String => struct_name: String, field_name: String, field_type: String, file_path: String, line: Int}"
            .to_string(),
        ":create cie_implements {id: String => type_name: String, interface_name: String, file_path: String}"
            .to_string(),
        ":create project_meta {key: String => value: String}".to_string(),
    ]
}

/// `::hnsw` index-creation statements for the two embedding relations.
/// Creation is soft-fail tolerated by the writer.
pub fn hnsw_statements(dimensions: usize) -> Vec<String> {
    let spec = format!(
        "{{dim: {dimensions}, dtype: F32, fields: [embedding], distance: Cosine, m: 32, ef_construction: 50}}"
    );
    vec![
        format!("::hnsw create cie_function_embedding:semantic {spec}"),
        format!("::hnsw create cie_type_embedding:semantic {spec}"),
    ]
}
