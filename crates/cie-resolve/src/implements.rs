//! Structural subtyping by method-set matching.

use cie_core::model::{FunctionEntity, ImplementsEdge, TypeEntity, TypeKind};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// A small table of well-known platform interfaces for embedded-interface
/// resolution when the embedded name isn't one of the project's own
/// interfaces.
fn builtin_interfaces() -> &'static HashMap<&'static str, &'static [&'static str]> {
    static TABLE: OnceLock<HashMap<&'static str, &'static [&'static str]>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert("io.Reader", &["Read"]);
        m.insert("io.Writer", &["Write"]);
        m.insert("io.Closer", &["Close"]);
        m.insert("io.ReadWriter", &["Read", "Write"]);
        m.insert("io.ReadCloser", &["Read", "Close"]);
        m.insert("fmt.Stringer", &["String"]);
        m.insert("error", &["Error"]);
        m.insert("sort.Interface", &["Len", "Less", "Swap"]);
        m
    })
}

fn method_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([A-Z][A-Za-z0-9_]*)\s*\(").unwrap())
}

/// A bare identifier alone on its own line: an embedded interface reference.
fn embed_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_.]*)\s*$").unwrap())
}

/// Declared method names plus names of any embedded interfaces referenced
/// directly in the body text, before transitive resolution.
fn scan_interface_body(code_text: &str) -> (Vec<String>, Vec<String>) {
    let mut methods = Vec::new();
    let mut embeds = Vec::new();
    for line in code_text.lines() {
        if let Some(caps) = method_line_re().captures(line) {
            methods.push(caps[1].to_string());
        } else if let Some(caps) = embed_line_re().captures(line) {
            let token = caps[1].to_string();
            if token != "interface" && token != "}" {
                embeds.push(token);
            }
        }
    }
    (methods, embeds)
}

/// Resolve one interface's full (declared + transitively inherited) method
/// set, guarding against embed cycles.
fn resolve_method_set(
    name: &str,
    raw: &HashMap<String, (Vec<String>, Vec<String>)>,
    cache: &mut HashMap<String, HashSet<String>>,
    visiting: &mut HashSet<String>,
) -> HashSet<String> {
    if let Some(cached) = cache.get(name) {
        return cached.clone();
    }
    if !visiting.insert(name.to_string()) {
        return HashSet::new();
    }
    let mut set = HashSet::new();
    if let Some((methods, embeds)) = raw.get(name) {
        set.extend(methods.iter().cloned());
        for embed in embeds {
            if raw.contains_key(embed) {
                set.extend(resolve_method_set(embed, raw, cache, visiting));
            } else if let Some(builtin) = builtin_interfaces().get(embed.as_str()) {
                set.extend(builtin.iter().map(|s| s.to_string()));
            }
        }
    }
    visiting.remove(name);
    cache.insert(name.to_string(), set.clone());
    set
}

pub struct ImplementsIndex {
    /// interface_name → concrete type names that implement it.
    pub implementors: HashMap<String, Vec<String>>,
    pub edges: Vec<ImplementsEdge>,
}

pub fn build(types: &[TypeEntity], functions: &[FunctionEntity]) -> ImplementsIndex {
    let interface_names: HashSet<&str> = types
        .iter()
        .filter(|t| t.kind == TypeKind::Interface)
        .map(|t| t.name.as_str())
        .collect();

    let raw: HashMap<String, (Vec<String>, Vec<String>)> = types
        .iter()
        .filter(|t| t.kind == TypeKind::Interface)
        .map(|t| (t.name.clone(), scan_interface_body(&t.code_text)))
        .collect();

    let mut cache = HashMap::new();
    let interface_methods: HashMap<String, HashSet<String>> = raw
        .keys()
        .map(|name| {
            let mut visiting = HashSet::new();
            (name.clone(), resolve_method_set(name, &raw, &mut cache, &mut visiting))
        })
        .collect();

    // concrete type → (method set, a file path that contributes a method).
    let mut concrete: HashMap<String, (HashSet<String>, String)> = HashMap::new();
    for f in functions {
        let Some((type_name, method_name)) = f.name.split_once('.') else { continue };
        if interface_names.contains(type_name) {
            continue; // interfaces never "implement" anything
        }
        let entry = concrete
            .entry(type_name.to_string())
            .or_insert_with(|| (HashSet::new(), f.file_path.clone()));
        entry.0.insert(method_name.to_string());
    }

    let mut implementors: HashMap<String, Vec<String>> = HashMap::new();
    let mut edges = Vec::new();
    for (interface_name, required) in &interface_methods {
        if required.is_empty() {
            continue; // empty interfaces emit no edges
        }
        for (type_name, (methods, file_path)) in &concrete {
            if required.is_subset(methods) {
                implementors
                    .entry(interface_name.clone())
                    .or_default()
                    .push(type_name.clone());
                edges.push(ImplementsEdge::new(type_name, interface_name, file_path));
            }
        }
    }

    ImplementsIndex { implementors, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cie_core::model::Range;

    fn range() -> Range {
        Range { start_line: 1, end_line: 1, start_col: 1, end_col: 1 }
    }

    #[test]
    fn superset_method_set_implements_interface() {
        let types = vec![TypeEntity::new(
            "a.go",
            "Reader",
            TypeKind::Interface,
            "interface {\n\tRead(p []byte) (int, error)\n}".to_string(),
            range(),
        )];
        let functions = vec![
            FunctionEntity::new("a.go", "File.Read", String::new(), String::new(), range()),
            FunctionEntity::new("a.go", "File.Close", String::new(), String::new(), range()),
        ];
        let index = build(&types, &functions);
        assert_eq!(index.implementors["Reader"], vec!["File".to_string()]);
        assert_eq!(index.edges.len(), 1);
    }

    #[test]
    fn empty_interface_emits_no_edges() {
        let types = vec![TypeEntity::new(
            "a.go",
            "Empty",
            TypeKind::Interface,
            "interface {\n}".to_string(),
            range(),
        )];
        let functions = vec![FunctionEntity::new("a.go", "Anything.Do", String::new(), String::new(), range())];
        let index = build(&types, &functions);
        assert!(index.edges.is_empty());
    }

    #[test]
    fn embedded_builtin_interface_pulls_in_its_methods() {
        let types = vec![TypeEntity::new(
            "a.go",
            "ReadWriteCloser",
            TypeKind::Interface,
            "interface {\n\tio.ReadCloser\n\tWrite(p []byte) (int, error)\n}".to_string(),
            range(),
        )];
        let functions = vec![
            FunctionEntity::new("a.go", "Conn.Read", String::new(), String::new(), range()),
            FunctionEntity::new("a.go", "Conn.Write", String::new(), String::new(), range()),
            FunctionEntity::new("a.go", "Conn.Close", String::new(), String::new(), range()),
        ];
        let index = build(&types, &functions);
        assert_eq!(index.implementors["ReadWriteCloser"], vec!["Conn".to_string()]);
    }

    #[test]
    fn interfaces_never_implement_other_interfaces() {
        let types = vec![
            TypeEntity::new("a.go", "Reader", TypeKind::Interface, "interface {\n\tRead()\n}".to_string(), range()),
        ];
        // A (bogus) "Reader.Read" function would make Reader look like a concrete
        // implementor of itself if the interface-name guard were missing.
        let functions = vec![FunctionEntity::new("a.go", "Reader.Read", String::new(), String::new(), range())];
        let index = build(&types, &functions);
        assert!(index.implementors.get("Reader").is_none());
    }
}
