//! Function, type and field extraction.
//!
//! One recursive AST-walk function per language, dispatched by [`Language`].
//! Each walk tracks a running `$anon_<N>` counter (N increments per file in
//! traversal order) and truncates `code_text` to `max_code_text` bytes.

use crate::languages::Language;
use crate::signature;
use cie_core::model::{FieldEntity, FunctionEntity, Range, TypeEntity, TypeKind};
use tree_sitter::{Node, Tree};

#[derive(Debug, Default)]
pub struct Extracted {
    pub functions: Vec<FunctionEntity>,
    pub types: Vec<TypeEntity>,
    pub fields: Vec<FieldEntity>,
    pub package_name: Option<String>,
    /// Number of function/type code texts truncated to `max_code_text`.
    pub truncated: u64,
}

pub fn extract(
    tree: &Tree,
    source: &[u8],
    file_path: &str,
    language: Language,
    max_code_text: u64,
) -> Extracted {
    let mut ctx = Ctx {
        source,
        file_path,
        max_code_text,
        anon_counter: 0,
        out: Extracted::default(),
    };
    let root = tree.root_node();
    match language {
        Language::Go => walk_go(&mut ctx, root),
        Language::Rust => walk_rust(&mut ctx, root),
        Language::Python => walk_python(&mut ctx, root),
        Language::TypeScript | Language::JavaScript => walk_js_like(&mut ctx, root),
        Language::Java => walk_java(&mut ctx, root),
    }
    ctx.out
}

struct Ctx<'a> {
    source: &'a [u8],
    file_path: &'a str,
    max_code_text: u64,
    anon_counter: u32,
    out: Extracted,
}

impl Ctx<'_> {
    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }

    fn range_of(&self, node: Node) -> Range {
        let start = node.start_position();
        let end = node.end_position();
        Range {
            start_line: start.row as u32 + 1,
            end_line: end.row as u32 + 1,
            start_col: start.column as u32 + 1,
            end_col: end.column as u32 + 1,
        }
    }

    /// Truncate to `max_code_text` bytes on a UTF-8 boundary, counting the truncation.
    fn code_text(&mut self, node: Node) -> String {
        let raw = self.text(node);
        let limit = self.max_code_text as usize;
        if raw.len() <= limit {
            return raw;
        }
        self.out.truncated += 1;
        let mut end = limit;
        while end > 0 && !raw.is_char_boundary(end) {
            end -= 1;
        }
        raw[..end].to_string()
    }

    fn next_anon_name(&mut self) -> String {
        self.anon_counter += 1;
        format!("$anon_{}", self.anon_counter)
    }

    fn push_function(&mut self, name: &str, signature: String, node: Node) {
        let code_text = self.code_text(node);
        let range = self.range_of(node);
        self.out
            .functions
            .push(FunctionEntity::new(self.file_path, name, signature, code_text, range));
    }

    fn push_type(&mut self, name: &str, kind: TypeKind, node: Node) {
        let code_text = self.code_text(node);
        let range = self.range_of(node);
        self.out
            .types
            .push(TypeEntity::new(self.file_path, name, kind, code_text, range));
    }

    fn push_field(&mut self, struct_name: &str, field_name: &str, field_type: &str, line: u32) {
        if let Some(base) = unwrap_field_type(field_type) {
            self.out
                .fields
                .push(FieldEntity::new(self.file_path, struct_name, field_name, &base, line));
        }
    }
}

/// Strip `*`, `[]`, `[N]`, `<...>` and a leading `pkg.` qualifier, then reject
/// primitive/builtin base types.
fn unwrap_field_type(raw: &str) -> Option<String> {
    let mut t = raw.trim();
    loop {
        let stripped = t
            .strip_prefix('*')
            .or_else(|| t.strip_prefix("[]"))
            .map(str::trim_start);
        if let Some(s) = stripped {
            t = s;
            continue;
        }
        if let Some(rest) = t.strip_prefix('[') {
            if let Some(close) = rest.find(']') {
                t = rest[close + 1..].trim_start();
                continue;
            }
        }
        break;
    }
    if let Some(angle) = t.find('<') {
        t = &t[..angle];
    }
    let base = t.rsplit('.').next().unwrap_or(t).trim();
    if base.is_empty() || is_primitive(base) {
        return None;
    }
    Some(base.to_string())
}

fn is_primitive(name: &str) -> bool {
    matches!(
        name,
        "int" | "int8"
            | "int16"
            | "int32"
            | "int64"
            | "uint"
            | "uint8"
            | "uint16"
            | "uint32"
            | "uint64"
            | "uintptr"
            | "byte"
            | "rune"
            | "float32"
            | "float64"
            | "bool"
            | "string"
            | "error"
            | "any"
            | "void"
            | "str"
            | "bytes"
            | "number"
            | "boolean"
            | "char"
            | "short"
            | "long"
            | "double"
            | "usize"
            | "isize"
            | "u8"
            | "u16"
            | "u32"
            | "u64"
            | "i8"
            | "i16"
            | "i32"
            | "i64"
            | "f32"
            | "f64"
    )
}

// ---------------------------------------------------------------------------
// Go
// ---------------------------------------------------------------------------

fn walk_go(ctx: &mut Ctx, node: Node) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "package_clause" => {
                // the package identifier is the clause's only named child
                if let Some(ident) = child.named_child(0) {
                    ctx.out.package_name = Some(ctx.text(ident));
                }
            }
            "function_declaration" => go_function(ctx, child),
            "method_declaration" => go_method(ctx, child),
            "type_declaration" => go_type_declaration(ctx, child),
            _ => walk_go_children(ctx, child),
        }
    }
}

fn walk_go_children(ctx: &mut Ctx, node: Node) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "func_literal" => go_closure(ctx, child),
            _ => walk_go_children(ctx, child),
        }
    }
}

fn go_closure(ctx: &mut Ctx, node: Node) {
    let name = ctx.next_anon_name();
    let params = node
        .child_by_field_name("parameters")
        .map(|p| ctx.text(p))
        .unwrap_or_default();
    let params = strip_parens(&params);
    let result = node
        .child_by_field_name("result")
        .map(|r| ctx.text(r))
        .unwrap_or_default();
    let signature = signature::closure_signature(&params, &result);
    ctx.push_function(&name, signature, node);
    if let Some(body) = node.child_by_field_name("body") {
        walk_go_children(ctx, body);
    }
}

fn go_function(ctx: &mut Ctx, node: Node) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = ctx.text(name_node);
    let type_params = node
        .child_by_field_name("type_parameters")
        .map(|p| ctx.text(p))
        .unwrap_or_default();
    let params = node
        .child_by_field_name("parameters")
        .map(|p| strip_parens(&ctx.text(p)))
        .unwrap_or_default();
    let result = node
        .child_by_field_name("result")
        .map(|r| ctx.text(r))
        .unwrap_or_default();
    let signature = signature::function_signature(&name, &strip_brackets(&type_params), &params, &result);
    ctx.push_function(&name, signature, node);
    if let Some(body) = node.child_by_field_name("body") {
        walk_go_children(ctx, body);
    }
}

fn go_method(ctx: &mut Ctx, node: Node) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let method_name = ctx.text(name_node);
    let receiver_node = node.child_by_field_name("receiver");
    let receiver_text = receiver_node.map(|r| ctx.text(r)).unwrap_or_default();
    let receiver_type = receiver_node
        .and_then(|r| go_receiver_type(ctx, r))
        .unwrap_or_else(|| "_".to_string());
    let qualified = format!("{receiver_type}.{method_name}");

    let params = node
        .child_by_field_name("parameters")
        .map(|p| strip_parens(&ctx.text(p)))
        .unwrap_or_default();
    let result = node
        .child_by_field_name("result")
        .map(|r| ctx.text(r))
        .unwrap_or_default();
    let signature = signature::method_signature(receiver_text.trim(), &method_name, "", &params, &result);
    ctx.push_function(&qualified, signature, node);
    if let Some(body) = node.child_by_field_name("body") {
        walk_go_children(ctx, body);
    }
}

/// Pull the bare receiver type name out of `(b *Backend)` / `(b Backend)`.
fn go_receiver_type(ctx: &Ctx, receiver: Node) -> Option<String> {
    let mut cursor = receiver.walk();
    for param in receiver.children(&mut cursor) {
        if param.kind() == "parameter_declaration" {
            if let Some(ty) = param.child_by_field_name("type") {
                let text = ctx.text(ty);
                return Some(text.trim_start_matches('*').to_string());
            }
        }
    }
    None
}

fn go_type_declaration(ctx: &mut Ctx, node: Node) {
    let mut cursor = node.walk();
    for spec in node.children(&mut cursor) {
        if spec.kind() != "type_spec" {
            continue;
        }
        let Some(name_node) = spec.child_by_field_name("name") else { continue };
        let name = ctx.text(name_node);
        let Some(type_node) = spec.child_by_field_name("type") else { continue };
        match type_node.kind() {
            "struct_type" => {
                ctx.push_type(&name, TypeKind::Struct, node);
                go_struct_fields(ctx, &name, type_node);
            }
            "interface_type" => {
                ctx.push_type(&name, TypeKind::Interface, node);
            }
            _ => {
                ctx.push_type(&name, TypeKind::TypeAlias, node);
            }
        }
    }
}

fn go_struct_fields(ctx: &mut Ctx, struct_name: &str, struct_type: Node) {
    let Some(body) = struct_type.child_by_field_name("body") else { return };
    let mut cursor = body.walk();
    for field_decl in body.children(&mut cursor) {
        if field_decl.kind() != "field_declaration" {
            continue;
        }
        let Some(type_node) = field_decl.child_by_field_name("type") else { continue };
        let field_type = ctx.text(type_node);
        let line = field_decl.start_position().row as u32 + 1;

        let mut name_cursor = field_decl.walk();
        for piece in field_decl.children(&mut name_cursor) {
            if piece.kind() == "field_identifier" {
                let field_name = ctx.text(piece);
                ctx.push_field(struct_name, &field_name, &field_type, line);
            }
        }
        // Embedded (nameless) fields have no `field_identifier` child and are
        // simply never reported; only named fields are tracked.
    }
}

fn strip_parens(s: &str) -> String {
    s.trim().trim_start_matches('(').trim_end_matches(')').to_string()
}

fn strip_brackets(s: &str) -> String {
    s.trim().trim_start_matches('[').trim_end_matches(']').to_string()
}

// ---------------------------------------------------------------------------
// Rust
// ---------------------------------------------------------------------------

fn walk_rust(ctx: &mut Ctx, node: Node) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_item" => rust_function(ctx, child, None),
            "struct_item" => rust_struct(ctx, child),
            "trait_item" => rust_trait(ctx, child),
            "impl_item" => rust_impl(ctx, child),
            _ => walk_rust(ctx, child),
        }
    }
}

fn rust_function(ctx: &mut Ctx, node: Node, receiver_type: Option<&str>) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = ctx.text(name_node);
    let params = node
        .child_by_field_name("parameters")
        .map(|p| strip_parens(&ctx.text(p)))
        .unwrap_or_default();
    let result = node
        .child_by_field_name("return_type")
        .map(|r| format!("-> {}", ctx.text(r)))
        .unwrap_or_default();

    let (qualified, signature) = match receiver_type {
        Some(recv) => (
            format!("{recv}.{name}"),
            signature::method_signature(recv, &name, "", &params, &result),
        ),
        None => (name.clone(), signature::function_signature(&name, "", &params, &result)),
    };
    ctx.push_function(&qualified, signature, node);
    if let Some(body) = node.child_by_field_name("body") {
        walk_rust_closures(ctx, body);
    }
}

fn walk_rust_closures(ctx: &mut Ctx, node: Node) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "closure_expression" {
            let name = ctx.next_anon_name();
            let params = child
                .child_by_field_name("parameters")
                .map(|p| ctx.text(p))
                .unwrap_or_default();
            let signature = signature::closure_signature(&params, "");
            ctx.push_function(&name, signature, child);
        }
        walk_rust_closures(ctx, child);
    }
}

fn rust_struct(ctx: &mut Ctx, node: Node) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = ctx.text(name_node);
    ctx.push_type(&name, TypeKind::Struct, node);
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for field in body.children(&mut cursor) {
            if field.kind() == "field_declaration" {
                if let (Some(fname), Some(ftype)) = (
                    field.child_by_field_name("name"),
                    field.child_by_field_name("type"),
                ) {
                    let line = field.start_position().row as u32 + 1;
                    let ftype_text = ctx.text(ftype);
                    ctx.push_field(&name, &ctx.text(fname), &ftype_text, line);
                }
            }
        }
    }
}

fn rust_trait(ctx: &mut Ctx, node: Node) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = ctx.text(name_node);
    ctx.push_type(&name, TypeKind::Interface, node);
}

fn rust_impl(ctx: &mut Ctx, node: Node) {
    let Some(type_node) = node.child_by_field_name("type") else { return };
    let receiver_type = ctx.text(type_node);
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for item in body.children(&mut cursor) {
            if item.kind() == "function_item" {
                rust_function(ctx, item, Some(&receiver_type));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

fn walk_python(ctx: &mut Ctx, node: Node) {
    python_body(ctx, node, None);
}

fn python_body(ctx: &mut Ctx, node: Node, class_name: Option<&str>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" => python_function(ctx, child, class_name),
            "class_definition" => python_class(ctx, child),
            "decorated_definition" => {
                if let Some(inner) = child.child_by_field_name("definition") {
                    match inner.kind() {
                        "function_definition" => python_function(ctx, inner, class_name),
                        "class_definition" => python_class(ctx, inner),
                        _ => {}
                    }
                }
            }
            _ => python_body(ctx, child, class_name),
        }
    }
}

fn python_function(ctx: &mut Ctx, node: Node, class_name: Option<&str>) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = ctx.text(name_node);
    let params = node
        .child_by_field_name("parameters")
        .map(|p| strip_parens(&ctx.text(p)))
        .unwrap_or_default();
    let result = node
        .child_by_field_name("return_type")
        .map(|r| format!("-> {}", ctx.text(r)))
        .unwrap_or_default();

    let (qualified, signature) = match class_name {
        Some(cls) => (
            format!("{cls}.{name}"),
            signature::method_signature(cls, &name, "", &params, &result),
        ),
        None => (name.clone(), signature::function_signature(&name, "", &params, &result)),
    };
    ctx.push_function(&qualified, signature, node);

    if let Some(body) = node.child_by_field_name("body") {
        python_nested_functions_and_lambdas(ctx, body);
    }
}

fn python_nested_functions_and_lambdas(ctx: &mut Ctx, node: Node) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "lambda" => {
                let name = ctx.next_anon_name();
                let params = child
                    .child_by_field_name("parameters")
                    .map(|p| ctx.text(p))
                    .unwrap_or_default();
                let signature = signature::closure_signature(&params, "");
                ctx.push_function(&name, signature, child);
            }
            _ => python_nested_functions_and_lambdas(ctx, child),
        }
    }
}

fn python_class(ctx: &mut Ctx, node: Node) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = ctx.text(name_node);
    ctx.push_type(&name, TypeKind::Class, node);
    if let Some(body) = node.child_by_field_name("body") {
        python_body(ctx, body, Some(&name));
    }
}

// ---------------------------------------------------------------------------
// JavaScript / TypeScript
// ---------------------------------------------------------------------------

fn walk_js_like(ctx: &mut Ctx, node: Node) {
    js_body(ctx, node, None);
}

fn js_body(ctx: &mut Ctx, node: Node, class_name: Option<&str>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" => js_function(ctx, child, None),
            "class_declaration" => js_class(ctx, child),
            "interface_declaration" => js_interface(ctx, child),
            "method_definition" => js_function(ctx, child, class_name),
            "arrow_function" | "function_expression" => js_closure(ctx, child),
            _ => js_body(ctx, child, class_name),
        }
    }
}

fn js_function(ctx: &mut Ctx, node: Node, class_name: Option<&str>) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = ctx.text(name_node);
    let params = node
        .child_by_field_name("parameters")
        .map(|p| strip_parens(&ctx.text(p)))
        .unwrap_or_default();
    let result = node
        .child_by_field_name("return_type")
        .map(|r| ctx.text(r))
        .unwrap_or_default();

    let (qualified, signature) = match class_name {
        Some(cls) => (
            format!("{cls}.{name}"),
            signature::method_signature(cls, &name, "", &params, &result),
        ),
        None => (name.clone(), signature::function_signature(&name, "", &params, &result)),
    };
    ctx.push_function(&qualified, signature, node);
    if let Some(body) = node.child_by_field_name("body") {
        js_body(ctx, body, None);
    }
}

fn js_closure(ctx: &mut Ctx, node: Node) {
    let name = ctx.next_anon_name();
    let params = node
        .child_by_field_name("parameters")
        .or_else(|| node.child_by_field_name("parameter"))
        .map(|p| strip_parens(&ctx.text(p)))
        .unwrap_or_default();
    let signature = signature::closure_signature(&params, "");
    ctx.push_function(&name, signature, node);
    if let Some(body) = node.child_by_field_name("body") {
        js_body(ctx, body, None);
    }
}

fn js_class(ctx: &mut Ctx, node: Node) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = ctx.text(name_node);
    ctx.push_type(&name, TypeKind::Class, node);
    if let Some(body) = node.child_by_field_name("body") {
        js_body(ctx, body, Some(&name));
    }
}

fn js_interface(ctx: &mut Ctx, node: Node) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = ctx.text(name_node);
    ctx.push_type(&name, TypeKind::Interface, node);
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            if member.kind() == "property_signature" {
                if let Some(prop_name) = member.child_by_field_name("name") {
                    let field_type = member
                        .child_by_field_name("type")
                        .map(|t| ctx.text(t))
                        .unwrap_or_default();
                    let line = member.start_position().row as u32 + 1;
                    ctx.push_field(&name, &ctx.text(prop_name), &field_type, line);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Java
// ---------------------------------------------------------------------------

fn walk_java(ctx: &mut Ctx, node: Node) {
    java_body(ctx, node, None);
}

fn java_body(ctx: &mut Ctx, node: Node, class_name: Option<&str>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "package_declaration" => {
                if let Some(scoped) = child.named_child(0) {
                    ctx.out.package_name = Some(ctx.text(scoped));
                }
            }
            "class_declaration" => java_class(ctx, child),
            "interface_declaration" => java_interface(ctx, child),
            "method_declaration" | "constructor_declaration" => java_method(ctx, child, class_name),
            "lambda_expression" => java_lambda(ctx, child),
            _ => java_body(ctx, child, class_name),
        }
    }
}

fn java_method(ctx: &mut Ctx, node: Node, class_name: Option<&str>) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = ctx.text(name_node);
    let params = node
        .child_by_field_name("parameters")
        .map(|p| strip_parens(&ctx.text(p)))
        .unwrap_or_default();
    let result = node
        .child_by_field_name("type")
        .map(|r| ctx.text(r))
        .unwrap_or_default();

    let (qualified, signature) = match class_name {
        Some(cls) => (
            format!("{cls}.{name}"),
            signature::method_signature(cls, &name, "", &params, &result),
        ),
        None => (name.clone(), signature::function_signature(&name, "", &params, &result)),
    };
    ctx.push_function(&qualified, signature, node);
    if let Some(body) = node.child_by_field_name("body") {
        java_body(ctx, body, None);
    }
}

fn java_lambda(ctx: &mut Ctx, node: Node) {
    let name = ctx.next_anon_name();
    let params = node
        .child_by_field_name("parameters")
        .map(|p| strip_parens(&ctx.text(p)))
        .unwrap_or_default();
    let signature = signature::closure_signature(&params, "");
    ctx.push_function(&name, signature, node);
}

fn java_class(ctx: &mut Ctx, node: Node) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = ctx.text(name_node);
    ctx.push_type(&name, TypeKind::Class, node);
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            if member.kind() == "field_declaration" {
                if let Some(type_node) = member.child_by_field_name("type") {
                    let field_type = ctx.text(type_node);
                    let mut decl_cursor = member.walk();
                    for declarator in member.children(&mut decl_cursor) {
                        if declarator.kind() == "variable_declarator" {
                            if let Some(fname) = declarator.child_by_field_name("name") {
                                let line = member.start_position().row as u32 + 1;
                                ctx.push_field(&name, &ctx.text(fname), &field_type, line);
                            }
                        }
                    }
                }
            }
        }
        java_body(ctx, body, Some(&name));
    }
}

fn java_interface(ctx: &mut Ctx, node: Node) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = ctx.text(name_node);
    ctx.push_type(&name, TypeKind::Interface, node);
    if let Some(body) = node.child_by_field_name("body") {
        java_body(ctx, body, Some(&name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treesitter;
    use std::path::Path;

    fn extract_src(src: &str, lang: Language) -> Extracted {
        let tree = treesitter::parse_file(Path::new("f"), src.as_bytes(), lang).unwrap();
        extract(&tree, src.as_bytes(), "f", lang, 100_000)
    }

    #[test]
    fn go_two_methods_same_simple_name_different_receivers() {
        let src = "package main\ntype A struct{}\nfunc (a *A) Do(){}\ntype B struct{}\nfunc (b *B) Do(){ a := A{}; a.Do() }\n";
        let out = extract_src(src, Language::Go);
        let names: Vec<&str> = out.functions.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"A.Do"));
        assert!(names.contains(&"B.Do"));
        assert_eq!(out.package_name.as_deref(), Some("main"));
    }

    #[test]
    fn go_struct_fields_unwrap_pointer_and_skip_primitives() {
        let src = "package main\ntype Backend struct{ db *DB; count int }\n";
        let out = extract_src(src, Language::Go);
        assert_eq!(out.fields.len(), 1);
        assert_eq!(out.fields[0].field_name, "db");
        assert_eq!(out.fields[0].field_type, "DB");
    }

    #[test]
    fn go_empty_interface_has_no_methods_but_is_still_emitted() {
        let src = "package main\ntype Empty interface{}\n";
        let out = extract_src(src, Language::Go);
        assert_eq!(out.types.len(), 1);
        assert_eq!(out.types[0].kind, TypeKind::Interface);
    }

    #[test]
    fn python_class_methods_are_qualified() {
        let src = "class A:\n    def do(self):\n        pass\n";
        let out = extract_src(src, Language::Python);
        assert_eq!(out.functions[0].name, "A.do");
    }

    #[test]
    fn python_lambda_gets_anon_name() {
        let src = "def outer():\n    f = lambda x: x\n";
        let out = extract_src(src, Language::Python);
        assert!(out.functions.iter().any(|f| f.name == "$anon_1"));
    }

    #[test]
    fn rust_impl_methods_qualified_by_type() {
        let src = "struct A;\nimpl A {\n    fn do_it(&self) {}\n}\n";
        let out = extract_src(src, Language::Rust);
        assert!(out.functions.iter().any(|f| f.name == "A.do_it"));
    }

    #[test]
    fn code_text_truncates_and_counts() {
        let src = "package main\nfunc Big() {\n// padding\n}\n";
        let tree = treesitter::parse_file(Path::new("f"), src.as_bytes(), Language::Go).unwrap();
        let out = extract(&tree, src.as_bytes(), "f", Language::Go, 5);
        assert_eq!(out.truncated, 1);
        assert!(out.functions[0].code_text.len() <= 5);
    }
}
