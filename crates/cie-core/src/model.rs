//! The entity/edge knowledge-graph data model.

use serde::{Deserialize, Serialize};

/// A source file that survived the loader's filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntity {
    pub id: String,
    pub path: String,
    pub content_hash: String,
    pub language: String,
    pub size: u64,
}

impl FileEntity {
    pub fn new(path: &str, content_hash: String, language: String, size: u64) -> Self {
        let normalized = crate::ids::normalize_path(path);
        let id = crate::ids::file_id(&normalized);
        Self {
            id,
            path: normalized,
            content_hash,
            language,
            size,
        }
    }
}

/// 1-indexed, end-inclusive source range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub end_line: u32,
    pub start_col: u32,
    pub end_col: u32,
}

/// A function, method, or anonymous closure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEntity {
    pub id: String,
    pub name: String,
    pub signature: String,
    pub file_path: String,
    pub code_text: String,
    pub range: Range,
    /// Set by the embedding generator; empty until then.
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl FunctionEntity {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_path: &str,
        name: &str,
        signature: String,
        code_text: String,
        range: Range,
    ) -> Self {
        let file_path = crate::ids::normalize_path(file_path);
        let id = crate::ids::function_id(
            &file_path,
            name,
            range.start_line,
            range.end_line,
            range.start_col,
            range.end_col,
        );
        Self {
            id,
            name: name.to_string(),
            signature,
            file_path,
            code_text,
            range,
            embedding: Vec::new(),
        }
    }

    /// True if this function was produced for an external call target rather
    /// than parsed from a real file.
    pub fn is_external_stub(&self) -> bool {
        self.file_path == "<external>"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Struct,
    Interface,
    Class,
    TypeAlias,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeEntity {
    pub id: String,
    pub name: String,
    pub kind: TypeKind,
    pub file_path: String,
    pub code_text: String,
    pub range: Range,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl TypeEntity {
    pub fn new(file_path: &str, name: &str, kind: TypeKind, code_text: String, range: Range) -> Self {
        let file_path = crate::ids::normalize_path(file_path);
        let id = crate::ids::type_id(&file_path, name, range.start_line, range.end_line);
        Self {
            id,
            name: name.to_string(),
            kind,
            file_path,
            code_text,
            range,
            embedding: Vec::new(),
        }
    }
}

/// A named, user-typed field on a struct/class. Primitive-typed fields are
/// discarded upstream and wrapper types unwrapped to their base name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntity {
    pub id: String,
    pub struct_name: String,
    pub field_name: String,
    pub field_type: String,
    pub file_path: String,
    pub line: u32,
}

impl FieldEntity {
    pub fn new(file_path: &str, struct_name: &str, field_name: &str, field_type: &str, line: u32) -> Self {
        let file_path = crate::ids::normalize_path(file_path);
        let id = crate::ids::field_id(&file_path, struct_name, field_name);
        Self {
            id,
            struct_name: struct_name.to_string(),
            field_name: field_name.to_string(),
            field_type: field_type.to_string(),
            file_path,
            line,
        }
    }
}

/// Alias encoding: empty string, an explicit alias, `"."` (dot import), or
/// `"_"` (blank import).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportEntity {
    pub id: String,
    pub file_path: String,
    pub import_path: String,
    pub alias: String,
    pub start_line: u32,
}

impl ImportEntity {
    pub fn new(file_path: &str, import_path: &str, alias: String, start_line: u32) -> Self {
        let file_path = crate::ids::normalize_path(file_path);
        let id = crate::ids::import_id(&file_path, import_path);
        Self {
            id,
            file_path,
            import_path: import_path.to_string(),
            alias,
            start_line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinesEdge {
    pub file_id: String,
    pub function_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinesTypeEdge {
    pub file_id: String,
    pub type_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallsEdge {
    pub caller_id: String,
    pub callee_id: String,
    pub call_line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementsEdge {
    pub id: String,
    pub type_name: String,
    pub interface_name: String,
    pub file_path: String,
}

impl ImplementsEdge {
    pub fn new(type_name: &str, interface_name: &str, file_path: &str) -> Self {
        Self {
            id: crate::ids::implements_id(type_name, interface_name),
            type_name: type_name.to_string(),
            interface_name: interface_name.to_string(),
            file_path: crate::ids::normalize_path(file_path),
        }
    }
}

/// A call site whose callee could not be bound to an in-file function by
/// simple-name lookup alone; carried forward to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedCall {
    pub caller_id: String,
    /// Full textual form of the callee (`pkg.Func`, `recv.method`, `a.b.c`).
    pub callee_name: String,
    pub file_path: String,
    pub line: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_id_excludes_signature_but_includes_range() {
        let a = FunctionEntity::new(
            "a.go",
            "Do",
            "func (a *A) Do()".to_string(),
            "func (a *A) Do() {}".to_string(),
            Range { start_line: 1, end_line: 1, start_col: 1, end_col: 20 },
        );
        let b = FunctionEntity::new(
            "a.go",
            "Do",
            "func (a *A) Do() int".to_string(),
            "func (a *A) Do() {}".to_string(),
            Range { start_line: 1, end_line: 1, start_col: 1, end_col: 20 },
        );
        assert_eq!(a.id, b.id, "signature must not affect the id");
    }

    #[test]
    fn external_stub_is_flagged() {
        let f = FunctionEntity::new(
            "<external>",
            "DB.Query",
            String::new(),
            String::new(),
            Range { start_line: 0, end_line: 0, start_col: 0, end_col: 0 },
        );
        assert!(f.is_external_stub());
    }
}
