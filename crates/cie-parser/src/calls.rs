//! Import and call-site extraction.
//!
//! Import statements are flattened to one [`ImportEntity`] per imported path.
//! Call sites are split into two buckets at parse time. A call whose callee
//! has at most one selector (`helper()`, `a.Do()`) resolves locally and
//! immediately if its simple name matches exactly one *other* function
//! declared in the same file. This also covers two receivers declaring a
//! same-named method (`A.Do` / `B.Do`), since the caller's own id is excluded
//! from the candidate set before checking uniqueness. A call whose callee is
//! a longer selector chain (`b.db.Query`, `pkg.sub.Func`) is always left as
//! an [`UnresolvedCall`], since resolving a field/package access needs
//! type/import context this pass doesn't have, even when the chain's final
//! segment happens to match the caller's own name (the "self-name-via-field"
//! case).

use crate::languages::Language;
use cie_core::model::{CallsEdge, FunctionEntity, ImportEntity, UnresolvedCall};
use std::collections::HashMap;
use tree_sitter::{Node, Tree};

#[derive(Debug, Default)]
pub struct DepsResult {
    pub imports: Vec<ImportEntity>,
    pub calls: Vec<CallsEdge>,
    pub unresolved_calls: Vec<UnresolvedCall>,
}

pub fn extract(
    tree: &Tree,
    source: &[u8],
    file_path: &str,
    language: Language,
    functions: &[FunctionEntity],
) -> DepsResult {
    let mut ctx = Ctx {
        source,
        file_path,
        simple_names: simple_name_index(functions),
        seen_local: std::collections::HashSet::new(),
        seen_unresolved: std::collections::HashSet::new(),
        out: DepsResult::default(),
    };
    let root = tree.root_node();

    match language {
        Language::Go => {
            go_imports(&mut ctx, root);
        }
        Language::Rust => {
            rust_imports(&mut ctx, root, None);
        }
        Language::Python => {
            python_imports(&mut ctx, root);
        }
        Language::TypeScript | Language::JavaScript => {
            js_imports(&mut ctx, root);
        }
        Language::Java => {
            java_imports(&mut ctx, root);
        }
    }

    for function in functions {
        let Some(body) = find_function_body(root, function, language) else {
            continue;
        };
        walk_calls(&mut ctx, body, function, language);
    }

    ctx.out
}

/// simple name (final segment of a declared function's name, e.g. `Do` for
/// both `A.Do` and `B.Do`) → every in-file function declared under that
/// name. Ambiguity is resolved per call site, not here, since the caller
/// itself is excluded from its own candidate set before uniqueness is
/// checked (see [`Ctx::record_call`]).
fn simple_name_index(functions: &[FunctionEntity]) -> HashMap<String, Vec<&FunctionEntity>> {
    let mut idx: HashMap<String, Vec<&FunctionEntity>> = HashMap::new();
    for f in functions {
        if f.name.starts_with("$anon_") {
            continue;
        }
        let simple = f.name.rsplit('.').next().unwrap_or(&f.name).to_string();
        idx.entry(simple).or_default().push(f);
    }
    idx
}

struct Ctx<'a> {
    source: &'a [u8],
    file_path: &'a str,
    simple_names: HashMap<String, Vec<&'a FunctionEntity>>,
    seen_local: std::collections::HashSet<(String, String)>,
    seen_unresolved: std::collections::HashSet<(String, String)>,
    out: DepsResult,
}

impl Ctx<'_> {
    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }

    fn push_import(&mut self, import_path: &str, alias: String, line: u32) {
        self.out
            .imports
            .push(ImportEntity::new(self.file_path, import_path, alias, line));
    }

    /// `full_text` is the complete callee expression text, e.g. `helper`,
    /// `a.Do`, or `b.db.Query`.
    fn record_call(&mut self, caller: &FunctionEntity, full_text: &str, line: u32) {
        let selector_depth = full_text.matches('.').count();
        if selector_depth < 2 {
            let simple = full_text.rsplit('.').next().unwrap_or(full_text);
            if let Some(candidates) = self.simple_names.get(simple) {
                let others: Vec<&FunctionEntity> =
                    candidates.iter().copied().filter(|f| f.id != caller.id).collect();
                if let [target] = others.as_slice() {
                    let key = (caller.id.clone(), target.id.clone());
                    if self.seen_local.insert(key) {
                        self.out.calls.push(CallsEdge {
                            caller_id: caller.id.clone(),
                            callee_id: target.id.clone(),
                            call_line: line,
                        });
                    }
                    return;
                }
            }
        }
        let key = (caller.id.clone(), full_text.to_string());
        if self.seen_unresolved.insert(key) {
            self.out.unresolved_calls.push(UnresolvedCall {
                caller_id: caller.id.clone(),
                callee_name: full_text.to_string(),
                file_path: self.file_path.to_string(),
                line,
            });
        }
    }
}

/// Find the body node previously extracted for `function`, by matching its
/// byte range, cheaper than re-running the per-language entity walk.
fn find_function_body<'t>(root: Node<'t>, function: &FunctionEntity, language: Language) -> Option<Node<'t>> {
    let start_row = function.range.start_line.saturating_sub(1) as usize;
    let target = find_node_starting_at_row(root, start_row)?;
    match language {
        Language::Go => target
            .child_by_field_name("body")
            .or_else(|| target.child_by_field_name("result")),
        _ => target.child_by_field_name("body"),
    }
    .or(Some(target))
}

fn find_node_starting_at_row(node: Node, row: usize) -> Option<Node> {
    if node.start_position().row == row
        && matches!(
            node.kind(),
            "function_declaration"
                | "method_declaration"
                | "func_literal"
                | "function_item"
                | "closure_expression"
                | "function_definition"
                | "lambda"
                | "class_declaration"
                | "method_definition"
                | "arrow_function"
                | "function_expression"
                | "lambda_expression"
                | "constructor_declaration"
        )
    {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_node_starting_at_row(child, row) {
            return Some(found);
        }
    }
    None
}

fn walk_calls(ctx: &mut Ctx, node: Node, caller: &FunctionEntity, language: Language) {
    let call_kind = match language {
        Language::Go => "call_expression",
        Language::Rust => "call_expression",
        Language::Python => "call",
        Language::TypeScript | Language::JavaScript => "call_expression",
        Language::Java => "method_invocation",
    };
    if node.kind() == call_kind {
        if let Some(callee) = callee_of(node, ctx, language) {
            let line = node.start_position().row as u32 + 1;
            ctx.record_call(caller, &callee, line);
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_calls(ctx, child, caller, language);
    }
}

/// Extract the full callee expression text for a call node, e.g. `helper`,
/// `a.Do`, or `b.db.Query`.
fn callee_of(call: Node, ctx: &Ctx, language: Language) -> Option<String> {
    if language == Language::Java {
        // method_invocation splits the receiver into an "object" field; the
        // "name" field is always the bare method identifier.
        let name_text = ctx.text(call.child_by_field_name("name")?);
        return Some(match call.child_by_field_name("object") {
            Some(object) => format!("{}.{name_text}", ctx.text(object)),
            None => name_text,
        });
    }
    let callee = call.child_by_field_name("function")?;
    match callee.kind() {
        "identifier" | "field_identifier" => Some(ctx.text(callee)),
        "selector_expression" | "member_expression" | "attribute" | "field_access" | "scoped_identifier" => {
            Some(ctx.text(callee))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Go imports
// ---------------------------------------------------------------------------

fn go_imports(ctx: &mut Ctx, node: Node) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_declaration" {
            go_import_decl(ctx, child);
        }
    }
}

fn go_import_decl(ctx: &mut Ctx, decl: Node) {
    let mut cursor = decl.walk();
    for child in decl.children(&mut cursor) {
        if child.kind() == "import_spec" {
            go_import_spec(ctx, child);
        } else if child.kind() == "import_spec_list" {
            let mut inner = child.walk();
            for spec in child.children(&mut inner) {
                if spec.kind() == "import_spec" {
                    go_import_spec(ctx, spec);
                }
            }
        }
    }
}

fn go_import_spec(ctx: &mut Ctx, spec: Node) {
    let Some(path_node) = spec.child_by_field_name("path") else { return };
    let raw_path = ctx.text(path_node);
    let import_path = raw_path.trim_matches('"').to_string();
    let alias = spec
        .child_by_field_name("name")
        .map(|n| ctx.text(n))
        .unwrap_or_default();
    let line = spec.start_position().row as u32 + 1;
    ctx.push_import(&import_path, alias, line);
}

// ---------------------------------------------------------------------------
// Rust imports
// ---------------------------------------------------------------------------

fn rust_imports(ctx: &mut Ctx, node: Node, prefix: Option<&str>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "use_declaration" {
            if let Some(arg) = child.child_by_field_name("argument") {
                let line = child.start_position().row as u32 + 1;
                rust_use_tree(ctx, arg, String::new(), line);
            }
        } else {
            rust_imports(ctx, child, prefix);
        }
    }
}

fn rust_use_tree(ctx: &mut Ctx, node: Node, prefix: String, line: u32) {
    match node.kind() {
        "scoped_identifier" | "identifier" | "crate" | "self" | "super" => {
            let path = join_path(&prefix, &ctx.text(node));
            ctx.push_import(&path, String::new(), line);
        }
        "use_as_clause" => {
            let Some(path_node) = node.child_by_field_name("path") else { return };
            let Some(alias_node) = node.child_by_field_name("alias") else { return };
            let path = join_path(&prefix, &ctx.text(path_node));
            ctx.push_import(&path, ctx.text(alias_node), line);
        }
        "use_wildcard" => {
            let inner = node.named_child(0).map(|n| ctx.text(n)).unwrap_or_default();
            let path = join_path(&prefix, &inner);
            ctx.push_import(&path, ".".to_string(), line);
        }
        "use_list" => {
            let new_prefix = prefix;
            let mut cursor = node.walk();
            for item in node.children(&mut cursor) {
                if item.is_named() {
                    rust_use_tree(ctx, item, new_prefix.clone(), line);
                }
            }
        }
        "scoped_use_list" => {
            let Some(path_node) = node.child_by_field_name("path") else { return };
            let Some(list_node) = node.child_by_field_name("list") else { return };
            let new_prefix = join_path(&prefix, &ctx.text(path_node));
            rust_use_tree(ctx, list_node, new_prefix, line);
        }
        _ => {
            let path = join_path(&prefix, &ctx.text(node));
            if !path.is_empty() {
                ctx.push_import(&path, String::new(), line);
            }
        }
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}::{segment}")
    }
}

// ---------------------------------------------------------------------------
// Python imports
// ---------------------------------------------------------------------------

fn python_imports(ctx: &mut Ctx, node: Node) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_statement" => python_import_statement(ctx, child),
            "import_from_statement" => python_import_from(ctx, child),
            _ => python_imports(ctx, child),
        }
    }
}

fn python_import_statement(ctx: &mut Ctx, node: Node) {
    let line = node.start_position().row as u32 + 1;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => ctx.push_import(&ctx.text(child), String::new(), line),
            "aliased_import" => {
                let Some(name) = child.child_by_field_name("name") else { continue };
                let Some(alias) = child.child_by_field_name("alias") else { continue };
                ctx.push_import(&ctx.text(name), ctx.text(alias), line);
            }
            _ => {}
        }
    }
}

fn python_import_from(ctx: &mut Ctx, node: Node) {
    let line = node.start_position().row as u32 + 1;
    let Some(module) = node.child_by_field_name("module_name") else { return };
    let module_path = ctx.text(module);
    let mut cursor = node.walk();
    let mut had_names = false;
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" if child.id() != module.id() => {
                had_names = true;
                ctx.push_import(&format!("{module_path}.{}", ctx.text(child)), String::new(), line);
            }
            "aliased_import" => {
                had_names = true;
                let Some(name) = child.child_by_field_name("name") else { continue };
                let Some(alias) = child.child_by_field_name("alias") else { continue };
                ctx.push_import(&format!("{module_path}.{}", ctx.text(name)), ctx.text(alias), line);
            }
            "wildcard_import" => {
                had_names = true;
                ctx.push_import(&module_path, ".".to_string(), line);
            }
            _ => {}
        }
    }
    if !had_names {
        ctx.push_import(&module_path, String::new(), line);
    }
}

// ---------------------------------------------------------------------------
// JavaScript / TypeScript imports
// ---------------------------------------------------------------------------

fn js_imports(ctx: &mut Ctx, node: Node) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_statement" {
            js_import_statement(ctx, child);
        } else {
            js_imports(ctx, child);
        }
    }
}

fn js_import_statement(ctx: &mut Ctx, node: Node) {
    let line = node.start_position().row as u32 + 1;
    let Some(source) = node.child_by_field_name("source") else { return };
    let module_path = ctx.text(source).trim_matches('"').trim_matches('\'').to_string();

    // import_clause is a plain child, not a field
    let mut clause_cursor = node.walk();
    let clause = node
        .children(&mut clause_cursor)
        .find(|c| c.kind() == "import_clause");
    let Some(clause) = clause else {
        ctx.push_import(&module_path, String::new(), line);
        return;
    };
    let mut cursor = clause.walk();
    let mut had_any = false;
    for child in clause.children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                had_any = true;
                ctx.push_import(&module_path, ctx.text(child), line);
            }
            "namespace_import" => {
                had_any = true;
                ctx.push_import(&module_path, ".".to_string(), line);
            }
            "named_imports" => {
                had_any = true;
                let mut inner = child.walk();
                for spec in child.children(&mut inner) {
                    if spec.kind() == "import_specifier" {
                        let local = spec
                            .child_by_field_name("alias")
                            .or_else(|| spec.child_by_field_name("name"))
                            .map(|n| ctx.text(n))
                            .unwrap_or_default();
                        ctx.push_import(&module_path, local, line);
                    }
                }
            }
            _ => {}
        }
    }
    if !had_any {
        ctx.push_import(&module_path, String::new(), line);
    }
}

// ---------------------------------------------------------------------------
// Java imports
// ---------------------------------------------------------------------------

fn java_imports(ctx: &mut Ctx, node: Node) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_declaration" {
            let line = child.start_position().row as u32 + 1;
            if let Some(path_node) = child.named_child(0) {
                let path = ctx.text(path_node);
                let is_wildcard = ctx.text(child).trim_end_matches(';').ends_with(".*");
                let alias = if is_wildcard { ".".to_string() } else { String::new() };
                ctx.push_import(&path, alias, line);
            }
        } else {
            java_imports(ctx, child);
        }
    }
}
