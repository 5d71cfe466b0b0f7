//! Translate in-memory entities and edges into datalog mutation statements.
//!
//! Every statement is append/replace-by-key (`:put`) so re-running a batch is
//! idempotent. Statements carry their row count so the writer can group them
//! into transactions close to `batch_target_mutations` rows each.

use cie_core::model::{
    CallsEdge, DefinesEdge, DefinesTypeEdge, FieldEntity, FileEntity, FunctionEntity,
    ImplementsEdge, ImportEntity, TypeEntity, TypeKind,
};

/// Rows per `:put` statement. Keeps individual scripts small without
/// inflating the statement count.
const ROWS_PER_STATEMENT: usize = 100;

/// One executable mutation statement plus the number of rows it writes.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub script: String,
    pub rows: usize,
}

/// A cozo string literal. Cozo strings use JSON escaping rules, so the JSON
/// encoder is the exact literal syntax.
fn str_lit(s: &str) -> String {
    // Serializing a &str to JSON cannot fail.
    serde_json::to_string(s).expect("string serialization is infallible")
}

fn kind_name(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Struct => "struct",
        TypeKind::Interface => "interface",
        TypeKind::Class => "class",
        TypeKind::TypeAlias => "type_alias",
    }
}

#[derive(Debug, Default)]
pub struct MutationBuilder {
    out: Vec<Mutation>,
}

impl MutationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Vec<Mutation> {
        self.out
    }

    /// Emit `?[cols...] <- [rows...] :put relation {key_cols => val_cols}`
    /// statements, `ROWS_PER_STATEMENT` rows at a time.
    fn put_rows(&mut self, relation: &str, header: &str, spec: &str, rows: Vec<String>) {
        for chunk in rows.chunks(ROWS_PER_STATEMENT) {
            let script = format!(
                "?[{header}] <- [{}] :put {relation} {{{spec}}}",
                chunk.join(", ")
            );
            self.out.push(Mutation { script, rows: chunk.len() });
        }
    }

    pub fn files(&mut self, files: &[FileEntity]) {
        let rows = files
            .iter()
            .map(|f| {
                format!(
                    "[{}, {}, {}, {}, {}]",
                    str_lit(&f.id),
                    str_lit(&f.path),
                    str_lit(&f.content_hash),
                    str_lit(&f.language),
                    f.size
                )
            })
            .collect();
        self.put_rows(
            "cie_file",
            "id, path, content_hash, language, size",
            "id => path, content_hash, language, size",
            rows,
        );
    }

    /// Functions are split across three relations: metadata, code text, and
    /// (when present) the embedding vector.
    pub fn functions(&mut self, functions: &[FunctionEntity]) {
        let meta_rows = functions
            .iter()
            .map(|f| {
                format!(
                    "[{}, {}, {}, {}, {}, {}, {}, {}]",
                    str_lit(&f.id),
                    str_lit(&f.name),
                    str_lit(&f.signature),
                    str_lit(&f.file_path),
                    f.range.start_line,
                    f.range.end_line,
                    f.range.start_col,
                    f.range.end_col
                )
            })
            .collect();
        self.put_rows(
            "cie_function",
            "id, name, signature, file_path, start_line, end_line, start_col, end_col",
            "id => name, signature, file_path, start_line, end_line, start_col, end_col",
            meta_rows,
        );

        let code_rows = functions
            .iter()
            .map(|f| format!("[{}, {}]", str_lit(&f.id), str_lit(&f.code_text)))
            .collect();
        self.put_rows("cie_function_code", "id, code_text", "id => code_text", code_rows);

        for f in functions {
            self.embedding("cie_function_embedding", &f.id, &f.embedding);
        }
    }

    pub fn types(&mut self, types: &[TypeEntity]) {
        let meta_rows = types
            .iter()
            .map(|t| {
                format!(
                    "[{}, {}, {}, {}, {}, {}]",
                    str_lit(&t.id),
                    str_lit(&t.name),
                    str_lit(kind_name(t.kind)),
                    str_lit(&t.file_path),
                    t.range.start_line,
                    t.range.end_line
                )
            })
            .collect();
        self.put_rows(
            "cie_type",
            "id, name, kind, file_path, start_line, end_line",
            "id => name, kind, file_path, start_line, end_line",
            meta_rows,
        );

        let code_rows = types
            .iter()
            .map(|t| format!("[{}, {}]", str_lit(&t.id), str_lit(&t.code_text)))
            .collect();
        self.put_rows("cie_type_code", "id, code_text", "id => code_text", code_rows);

        for t in types {
            self.embedding("cie_type_embedding", &t.id, &t.embedding);
        }
    }

    /// An empty vector means "no embedding" (provider failed or declined);
    /// the row is simply not written, the entity itself still is.
    fn embedding(&mut self, relation: &str, id: &str, vector: &[f32]) {
        if vector.is_empty() {
            return;
        }
        let components: Vec<String> = vector.iter().map(|v| format!("{v}")).collect();
        let script = format!(
            "?[id, embedding] := id = {}, embedding = vec([{}]) :put {relation} {{id => embedding}}",
            str_lit(id),
            components.join(", ")
        );
        self.out.push(Mutation { script, rows: 1 });
    }

    pub fn fields(&mut self, fields: &[FieldEntity]) {
        let rows = fields
            .iter()
            .map(|f| {
                format!(
                    "[{}, {}, {}, {}, {}, {}]",
                    str_lit(&f.id),
                    str_lit(&f.struct_name),
                    str_lit(&f.field_name),
                    str_lit(&f.field_type),
                    str_lit(&f.file_path),
                    f.line
                )
            })
            .collect();
        self.put_rows(
            "cie_field",
            "id, struct_name, field_name, field_type, file_path, line",
            "id => struct_name, field_name, field_type, file_path, line",
            rows,
        );
    }

    pub fn imports(&mut self, imports: &[ImportEntity]) {
        let rows = imports
            .iter()
            .map(|i| {
                format!(
                    "[{}, {}, {}, {}, {}]",
                    str_lit(&i.id),
                    str_lit(&i.file_path),
                    str_lit(&i.import_path),
                    str_lit(&i.alias),
                    i.start_line
                )
            })
            .collect();
        self.put_rows(
            "cie_import",
            "id, file_path, import_path, alias, start_line",
            "id => file_path, import_path, alias, start_line",
            rows,
        );
    }

    pub fn defines(&mut self, edges: &[DefinesEdge]) {
        let rows = edges
            .iter()
            .map(|e| format!("[{}, {}]", str_lit(&e.file_id), str_lit(&e.function_id)))
            .collect();
        self.put_rows("cie_defines", "file_id, function_id", "file_id, function_id", rows);
    }

    pub fn defines_types(&mut self, edges: &[DefinesTypeEdge]) {
        let rows = edges
            .iter()
            .map(|e| format!("[{}, {}]", str_lit(&e.file_id), str_lit(&e.type_id)))
            .collect();
        self.put_rows("cie_defines_type", "file_id, type_id", "file_id, type_id", rows);
    }

    pub fn calls(&mut self, edges: &[CallsEdge]) {
        let rows = edges
            .iter()
            .map(|e| {
                format!(
                    "[{}, {}, {}]",
                    str_lit(&e.caller_id),
                    str_lit(&e.callee_id),
                    e.call_line
                )
            })
            .collect();
        self.put_rows(
            "cie_calls",
            "caller_id, callee_id, call_line",
            "caller_id, callee_id => call_line",
            rows,
        );
    }

    pub fn implements(&mut self, edges: &[ImplementsEdge]) {
        let rows = edges
            .iter()
            .map(|e| {
                format!(
                    "[{}, {}, {}, {}]",
                    str_lit(&e.id),
                    str_lit(&e.type_name),
                    str_lit(&e.interface_name),
                    str_lit(&e.file_path)
                )
            })
            .collect();
        self.put_rows(
            "cie_implements",
            "id, type_name, interface_name, file_path",
            "id => type_name, interface_name, file_path",
            rows,
        );
    }
}

/// Group statements into write batches whose summed row counts stay near
/// `target_rows`. A single oversized
/// statement still gets its own batch rather than being split.
pub fn batch_mutations(mutations: Vec<Mutation>, target_rows: usize) -> Vec<Vec<Mutation>> {
    let target = target_rows.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<Mutation> = Vec::new();
    let mut current_rows = 0usize;
    for m in mutations {
        if current_rows > 0 && current_rows + m.rows > target {
            batches.push(std::mem::take(&mut current));
            current_rows = 0;
        }
        current_rows += m.rows;
        current.push(m);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use cie_core::model::Range;

    fn range() -> Range {
        Range { start_line: 1, end_line: 3, start_col: 1, end_col: 2 }
    }

    #[test]
    fn string_literals_are_json_escaped() {
        assert_eq!(str_lit(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn function_without_embedding_skips_the_vector_relation() {
        let f = FunctionEntity::new("a.go", "Do", "func Do()".into(), "func Do() {}".into(), range());
        let mut b = MutationBuilder::new();
        b.functions(std::slice::from_ref(&f));
        let muts = b.finish();
        assert_eq!(muts.len(), 2); // metadata + code, no embedding
        assert!(muts.iter().all(|m| !m.script.contains("cie_function_embedding")));
    }

    #[test]
    fn function_with_embedding_writes_a_vec_literal() {
        let mut f =
            FunctionEntity::new("a.go", "Do", "func Do()".into(), "func Do() {}".into(), range());
        f.embedding = vec![0.5, -0.5];
        let mut b = MutationBuilder::new();
        b.functions(std::slice::from_ref(&f));
        let muts = b.finish();
        let emb = muts
            .iter()
            .find(|m| m.script.contains("cie_function_embedding"))
            .unwrap();
        assert!(emb.script.contains("vec([0.5, -0.5])"));
    }

    #[test]
    fn large_row_sets_split_into_multiple_statements() {
        let files: Vec<FileEntity> = (0..250)
            .map(|i| FileEntity::new(&format!("f{i}.go"), "h".into(), "go".into(), 1))
            .collect();
        let mut b = MutationBuilder::new();
        b.files(&files);
        let muts = b.finish();
        assert_eq!(muts.len(), 3);
        assert_eq!(muts.iter().map(|m| m.rows).sum::<usize>(), 250);
    }

    #[test]
    fn batching_respects_the_row_target() {
        let muts: Vec<Mutation> = (0..10)
            .map(|i| Mutation { script: format!("s{i}"), rows: 30 })
            .collect();
        let batches = batch_mutations(muts, 100);
        assert_eq!(batches.len(), 4);
        assert!(batches.iter().take(3).all(|b| b.iter().map(|m| m.rows).sum::<usize>() == 90));
    }
}
