//! Two-phase cross-unit call resolution.

use crate::implements::ImplementsIndex;
use cie_core::model::{CallsEdge, FieldEntity, FunctionEntity, ImportEntity, Range, UnresolvedCall};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

/// Everything the resolver needs, already parsed.
pub struct ResolveInput<'a> {
    pub functions: &'a [FunctionEntity],
    pub fields: &'a [FieldEntity],
    pub imports: &'a [ImportEntity],
    pub unresolved: &'a [UnresolvedCall],
    /// `file_path → package_name`, for languages whose grammar declares one
    /// (Go, Java); `None` falls back to directory-as-package.
    pub file_packages: &'a HashMap<String, Option<String>>,
    pub implements: &'a ImplementsIndex,
}

pub struct ResolveOutput {
    pub calls: Vec<CallsEdge>,
    pub external_stubs: Vec<FunctionEntity>,
}

struct Indexes<'a> {
    functions_by_id: HashMap<&'a str, &'a FunctionEntity>,
    qualified_functions: HashMap<String, &'a str>,
    package_of_file: HashMap<&'a str, String>,
    globals: HashMap<String, HashMap<String, Option<&'a str>>>,
    file_imports: HashMap<&'a str, HashMap<String, String>>,
    dot_import_targets: HashMap<&'a str, Vec<String>>,
    fields: HashMap<&'a str, HashMap<&'a str, &'a str>>,
    implementors: &'a HashMap<String, Vec<String>>,
    known_dirs: Vec<String>,
    import_cache: RwLock<HashMap<String, Option<String>>>,
    stubs: Mutex<HashMap<String, FunctionEntity>>,
}

pub fn resolve(input: ResolveInput) -> ResolveOutput {
    let idx = build_indexes(&input);

    let resolved: Vec<Vec<CallsEdge>> = if input.unresolved.len() < 1000 {
        input.unresolved.iter().map(|call| resolve_one(&idx, call)).collect()
    } else {
        let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).min(8);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .expect("thread pool construction cannot fail with a valid thread count");
        pool.install(|| input.unresolved.par_iter().map(|call| resolve_one(&idx, call)).collect())
    };

    let mut seen = std::collections::HashSet::new();
    let mut calls = Vec::new();
    for edge in resolved.into_iter().flatten() {
        if seen.insert((edge.caller_id.clone(), edge.callee_id.clone())) {
            calls.push(edge);
        }
    }

    let external_stubs: Vec<FunctionEntity> =
        idx.stubs.into_inner().unwrap_or_default().into_values().collect();
    tracing::debug!(
        unresolved = input.unresolved.len(),
        resolved_edges = calls.len(),
        stubs = external_stubs.len(),
        "cross-unit resolution complete"
    );
    ResolveOutput { calls, external_stubs }
}

fn build_indexes<'a>(input: &ResolveInput<'a>) -> Indexes<'a> {
    let functions_by_id: HashMap<&str, &FunctionEntity> =
        input.functions.iter().map(|f| (f.id.as_str(), f)).collect();

    let qualified_functions: HashMap<String, &str> = input
        .functions
        .iter()
        .filter(|f| f.name.contains('.'))
        .map(|f| (f.name.clone(), f.id.as_str()))
        .collect();

    let package_of_file: HashMap<&str, String> = input
        .functions
        .iter()
        .map(|f| f.file_path.as_str())
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .map(|path| {
            let declared = input.file_packages.get(path).and_then(|p| p.clone());
            let dir = declared.unwrap_or_else(|| parent_dir(path));
            (path, dir)
        })
        .collect();

    let mut globals: HashMap<String, HashMap<String, Option<&str>>> = HashMap::new();
    for f in input.functions {
        let Some(dir) = package_of_file.get(f.file_path.as_str()) else { continue };
        if f.name.contains('.') || f.name.starts_with("$anon_") {
            continue;
        }
        let slot = globals.entry(dir.clone()).or_default();
        slot.entry(f.name.clone())
            .and_modify(|v| *v = None)
            .or_insert(Some(f.id.as_str()));
    }

    let mut file_imports: HashMap<&str, HashMap<String, String>> = HashMap::new();
    let mut dot_import_targets: HashMap<&str, Vec<String>> = HashMap::new();
    for imp in input.imports {
        if imp.alias == "_" {
            continue; // blank imports dropped
        }
        if imp.alias == "." {
            dot_import_targets
                .entry(imp.file_path.as_str())
                .or_default()
                .push(imp.import_path.clone());
            continue;
        }
        let alias = if imp.alias.is_empty() {
            imp.import_path.rsplit('/').next().unwrap_or(&imp.import_path).to_string()
        } else {
            imp.alias.clone()
        };
        file_imports
            .entry(imp.file_path.as_str())
            .or_default()
            .insert(alias, imp.import_path.clone());
    }

    let mut fields: HashMap<&str, HashMap<&str, &str>> = HashMap::new();
    for field in input.fields {
        fields
            .entry(field.struct_name.as_str())
            .or_default()
            .insert(field.field_name.as_str(), field.field_type.as_str());
    }

    let known_dirs: Vec<String> = package_of_file.values().cloned().collect::<std::collections::HashSet<_>>().into_iter().collect();

    Indexes {
        functions_by_id,
        qualified_functions,
        package_of_file,
        globals,
        file_imports,
        dot_import_targets,
        fields,
        implementors: &input.implements.implementors,
        known_dirs,
        import_cache: RwLock::new(HashMap::new()),
        stubs: Mutex::new(HashMap::new()),
    }
}

fn parent_dir(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

/// `import_path → package_dir`: exact match against a known directory, else
/// longest path-segment suffix match, else give up. Memoized.
fn resolve_import_to_dir(idx: &Indexes, import_path: &str) -> Option<String> {
    if let Some(hit) = idx.import_cache.read().unwrap().get(import_path) {
        return hit.clone();
    }
    let resolved = if idx.known_dirs.iter().any(|d| d == import_path) {
        Some(import_path.to_string())
    } else {
        let import_segments: Vec<&str> = import_path.split('/').collect();
        idx.known_dirs
            .iter()
            .filter_map(|dir| {
                let dir_segments: Vec<&str> = dir.split('/').collect();
                let common = import_segments
                    .iter()
                    .rev()
                    .zip(dir_segments.iter().rev())
                    .take_while(|(a, b)| a == b)
                    .count();
                (common > 0).then_some((common, dir))
            })
            .max_by_key(|(common, _)| *common)
            .map(|(_, dir)| dir.clone())
    };
    idx.import_cache.write().unwrap().insert(import_path.to_string(), resolved.clone());
    resolved
}

fn resolve_one(idx: &Indexes, call: &UnresolvedCall) -> Vec<CallsEdge> {
    if let Some(edges) = qualified_call_attempt(idx, call) {
        return edges;
    }
    if let Some(edges) = dot_import_attempt(idx, call) {
        return edges;
    }
    if let Some(edges) = field_dispatch_attempt(idx, call) {
        return edges;
    }
    if let Some(edges) = parameter_dispatch_attempt(idx, call) {
        return edges;
    }
    Vec::new()
}

fn qualified_call_attempt(idx: &Indexes, call: &UnresolvedCall) -> Option<Vec<CallsEdge>> {
    let (alias, rest) = call.callee_name.split_once('.')?;
    let final_ident = rest.rsplit('.').next().unwrap_or(rest);
    if !is_exported(final_ident) {
        return None;
    }
    let import_path = idx.file_imports.get(call.file_path.as_str())?.get(alias)?;
    let dir = resolve_import_to_dir(idx, import_path)?;
    let fid = idx.globals.get(&dir)?.get(final_ident).copied().flatten()?;
    Some(vec![CallsEdge {
        caller_id: call.caller_id.clone(),
        callee_id: fid.to_string(),
        call_line: call.line,
    }])
}

fn dot_import_attempt(idx: &Indexes, call: &UnresolvedCall) -> Option<Vec<CallsEdge>> {
    let targets = idx.dot_import_targets.get(call.file_path.as_str())?;
    let simple_name = call.callee_name.rsplit('.').next().unwrap_or(&call.callee_name);
    if !is_exported(simple_name) {
        return None;
    }
    for import_path in targets {
        let Some(dir) = resolve_import_to_dir(idx, import_path) else { continue };
        if let Some(Some(fid)) = idx.globals.get(&dir).and_then(|g| g.get(simple_name)) {
            return Some(vec![CallsEdge {
                caller_id: call.caller_id.clone(),
                callee_id: fid.to_string(),
                call_line: call.line,
            }]);
        }
    }
    None
}

fn field_dispatch_attempt(idx: &Indexes, call: &UnresolvedCall) -> Option<Vec<CallsEdge>> {
    let caller = idx.functions_by_id.get(call.caller_id.as_str())?;
    let (struct_name, _) = caller.name.split_once('.')?;
    let struct_fields = idx.fields.get(struct_name)?;

    let segments: Vec<&str> = call.callee_name.split('.').collect();
    if segments.len() < 2 {
        return None;
    }
    let method = segments[segments.len() - 1];
    for segment in segments[..segments.len() - 1].iter().rev() {
        if let Some(field_type) = struct_fields.get(segment) {
            let edges = resolve_to_implementations(idx, &call.caller_id, field_type, method, call.line);
            if !edges.is_empty() {
                return Some(edges);
            }
        }
    }
    None
}

fn parameter_dispatch_attempt(idx: &Indexes, call: &UnresolvedCall) -> Option<Vec<CallsEdge>> {
    let caller = idx.functions_by_id.get(call.caller_id.as_str())?;
    let params = cie_parser::signature::parse_params(&caller.signature);
    if params.is_empty() {
        return None;
    }
    let segments: Vec<&str> = call.callee_name.split('.').collect();
    if segments.len() < 2 {
        return None;
    }
    let method = segments[segments.len() - 1];
    for segment in segments[..segments.len() - 1].iter().rev() {
        if let Some(param) = params.iter().find(|p| p.name == *segment) {
            let base_type = unwrap_type(&param.type_name);
            let edges = resolve_to_implementations(idx, &call.caller_id, &base_type, method, call.line);
            if !edges.is_empty() {
                return Some(edges);
            }
        }
    }
    None
}

/// Strip `*`/`[]`/`<...>` wrappers off a raw parameter type string (the
/// entity extractor only unwraps field types, not parameter types, so the
/// resolver does it here before interface/type lookup).
fn unwrap_type(raw: &str) -> String {
    let mut t = raw.trim();
    loop {
        if let Some(s) = t.strip_prefix('*').or_else(|| t.strip_prefix("[]")) {
            t = s.trim_start();
            continue;
        }
        break;
    }
    if let Some(angle) = t.find('<') {
        t = &t[..angle];
    }
    t.to_string()
}

fn is_primitive(name: &str) -> bool {
    matches!(
        name,
        "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16" | "uint32" | "uint64"
            | "byte" | "rune" | "float32" | "float64" | "bool" | "string" | "error" | "any" | "void"
            | "str" | "number" | "boolean" | "char" | "double" | "usize" | "isize" | "u8" | "u16" | "u32"
            | "u64" | "i8" | "i16" | "i32" | "i64" | "f32" | "f64" | ""
    )
}

/// `resolveToImplementations`: fan out to every known
/// implementor, fall back to a direct match, and finally mint an external
/// stub rather than drop the call entirely.
fn resolve_to_implementations(idx: &Indexes, caller_id: &str, type_name: &str, method: &str, line: u32) -> Vec<CallsEdge> {
    if let Some(implementors) = idx.implementors.get(type_name) {
        let edges: Vec<CallsEdge> = implementors
            .iter()
            .filter_map(|impl_name| {
                idx.qualified_functions
                    .get(&format!("{impl_name}.{method}"))
                    .map(|fid| CallsEdge {
                        caller_id: caller_id.to_string(),
                        callee_id: fid.to_string(),
                        call_line: line,
                    })
            })
            .collect();
        if !edges.is_empty() {
            return edges;
        }
    }

    let direct_key = format!("{type_name}.{method}");
    if let Some(fid) = idx.qualified_functions.get(&direct_key) {
        return vec![CallsEdge {
            caller_id: caller_id.to_string(),
            callee_id: fid.to_string(),
            call_line: line,
        }];
    }

    if is_primitive(type_name) {
        return Vec::new();
    }

    let stub_id = cie_core::ids::external_stub_id(type_name, method);
    idx.stubs.lock().unwrap().entry(stub_id.clone()).or_insert_with(|| FunctionEntity {
        id: stub_id.clone(),
        name: format!("{type_name}.{method}"),
        signature: String::new(),
        file_path: "<external>".to_string(),
        code_text: String::new(),
        range: Range { start_line: 0, end_line: 0, start_col: 0, end_col: 0 },
        embedding: Vec::new(),
    });
    vec![CallsEdge {
        caller_id: caller_id.to_string(),
        callee_id: stub_id,
        call_line: line,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implements::ImplementsIndex;
    use cie_core::model::{TypeEntity, TypeKind};

    fn range() -> Range {
        Range { start_line: 1, end_line: 5, start_col: 1, end_col: 1 }
    }

    fn empty_implements() -> ImplementsIndex {
        ImplementsIndex { implementors: HashMap::new(), edges: Vec::new() }
    }

    #[test]
    fn qualified_call_resolves_exported_function_through_import() {
        let functions = vec![
            FunctionEntity::new("caller.go", "Run", String::new(), String::new(), range()),
            FunctionEntity::new("pkg/util.go", "Helper", String::new(), String::new(), range()),
        ];
        let imports = vec![ImportEntity::new("caller.go", "example.com/pkg", String::new(), 2)];
        let unresolved = vec![UnresolvedCall {
            caller_id: functions[0].id.clone(),
            callee_name: "pkg.Helper".to_string(),
            file_path: "caller.go".to_string(),
            line: 10,
        }];
        let file_packages = HashMap::new();
        let implements = empty_implements();
        let input = ResolveInput {
            functions: &functions,
            fields: &[],
            imports: &imports,
            unresolved: &unresolved,
            file_packages: &file_packages,
            implements: &implements,
        };
        let out = resolve(input);
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].callee_id, functions[1].id);
    }

    #[test]
    fn unexported_cross_package_name_is_not_resolved() {
        let functions = vec![
            FunctionEntity::new("caller.go", "Run", String::new(), String::new(), range()),
            FunctionEntity::new("pkg/util.go", "helper", String::new(), String::new(), range()),
        ];
        let imports = vec![ImportEntity::new("caller.go", "example.com/pkg", String::new(), 2)];
        let unresolved = vec![UnresolvedCall {
            caller_id: functions[0].id.clone(),
            callee_name: "pkg.helper".to_string(),
            file_path: "caller.go".to_string(),
            line: 10,
        }];
        let file_packages = HashMap::new();
        let implements = empty_implements();
        let input = ResolveInput {
            functions: &functions,
            fields: &[],
            imports: &imports,
            unresolved: &unresolved,
            file_packages: &file_packages,
            implements: &implements,
        };
        let out = resolve(input);
        assert!(out.calls.is_empty());
    }

    #[test]
    fn field_dispatch_mints_external_stub_for_unknown_type() {
        let functions = vec![FunctionEntity::new("b.go", "Backend.Query", String::new(), String::new(), range())];
        let fields = vec![FieldEntity::new("b.go", "Backend", "db", "DB", 3)];
        let unresolved = vec![UnresolvedCall {
            caller_id: functions[0].id.clone(),
            callee_name: "b.db.Exec".to_string(),
            file_path: "b.go".to_string(),
            line: 12,
        }];
        let file_packages = HashMap::new();
        let implements = empty_implements();
        let input = ResolveInput {
            functions: &functions,
            fields: &fields,
            imports: &[],
            unresolved: &unresolved,
            file_packages: &file_packages,
            implements: &implements,
        };
        let out = resolve(input);
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.external_stubs.len(), 1);
        assert_eq!(out.external_stubs[0].name, "DB.Exec");
    }

    #[test]
    fn interface_field_dispatch_fans_out_to_every_implementor() {
        let types = vec![TypeEntity::new(
            "t.go",
            "Notifier",
            TypeKind::Interface,
            "interface {\n\tNotify()\n}".to_string(),
            range(),
        )];
        let functions = vec![
            FunctionEntity::new("b.go", "Backend.Broadcast", String::new(), String::new(), range()),
            FunctionEntity::new("e.go", "EmailNotifier.Notify", String::new(), String::new(), range()),
            FunctionEntity::new("s.go", "SmsNotifier.Notify", String::new(), String::new(), range()),
        ];
        let fields = vec![FieldEntity::new("b.go", "Backend", "notifier", "Notifier", 3)];
        let unresolved = vec![UnresolvedCall {
            caller_id: functions[0].id.clone(),
            callee_name: "b.notifier.Notify".to_string(),
            file_path: "b.go".to_string(),
            line: 20,
        }];
        let implements = crate::implements::build(&types, &functions);
        let file_packages = HashMap::new();
        let input = ResolveInput {
            functions: &functions,
            fields: &fields,
            imports: &[],
            unresolved: &unresolved,
            file_packages: &file_packages,
            implements: &implements,
        };
        let out = resolve(input);
        assert_eq!(out.calls.len(), 2);
    }
}
