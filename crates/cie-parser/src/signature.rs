//! Signature strings as structured data.
//!
//! Signatures are kept as opaque strings everywhere except the resolver's
//! parameter-dispatch rule, which needs `(name, type)` pairs back out. This
//! module owns both directions so the string format is defined exactly once.

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub type_name: String,
}

/// Build a function signature string: `func NAME[TYPE_PARAMS](PARAMS) RESULT`.
pub fn function_signature(name: &str, type_params: &str, params: &str, result: &str) -> String {
    format(None, name, type_params, params, result)
}

/// Build a method signature string: `func RECEIVER NAME[TYPE_PARAMS](PARAMS) RESULT`.
pub fn method_signature(
    receiver: &str,
    name: &str,
    type_params: &str,
    params: &str,
    result: &str,
) -> String {
    format(Some(receiver), name, type_params, params, result)
}

/// Build a closure signature string: `func(PARAMS) RESULT`.
pub fn closure_signature(params: &str, result: &str) -> String {
    let mut s = format!("func({params})");
    if !result.is_empty() {
        s.push(' ');
        s.push_str(result);
    }
    s
}

fn format(receiver: Option<&str>, name: &str, type_params: &str, params: &str, result: &str) -> String {
    let mut s = String::from("func ");
    if let Some(r) = receiver {
        s.push_str(r);
        s.push(' ');
    }
    s.push_str(name);
    if !type_params.is_empty() {
        s.push('[');
        s.push_str(type_params);
        s.push(']');
    }
    s.push('(');
    s.push_str(params);
    s.push(')');
    if !result.is_empty() {
        s.push(' ');
        s.push_str(result);
    }
    s
}

/// Parse the `(PARAMS)` segment of a signature string back into `(name, type)`
/// pairs. Conservative and robust to nested generics/brackets: a comma only
/// splits a new parameter when bracket/paren/angle depth is zero, so
/// `a map[string]int, b Pair<int, int>` splits into exactly two parameters.
pub fn parse_params(signature: &str) -> Vec<Param> {
    let Some(params_str) = extract_paren_group(signature) else {
        return Vec::new();
    };
    if params_str.trim().is_empty() {
        return Vec::new();
    }

    split_top_level(&params_str, ',')
        .into_iter()
        .filter_map(|raw| parse_one_param(raw.trim()))
        .collect()
}

/// Find the first top-level `(...)` group (the parameter list), skipping any
/// `[...]` type-parameter list that precedes it.
fn extract_paren_group(signature: &str) -> Option<String> {
    let bytes = signature.as_bytes();
    let mut depth_brackets = 0i32;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => depth_brackets += 1,
            b']' => depth_brackets -= 1,
            b'(' if depth_brackets == 0 => {
                let start = i + 1;
                let mut depth = 1i32;
                let mut j = start;
                while j < bytes.len() && depth > 0 {
                    match bytes[j] {
                        b'(' => depth += 1,
                        b')' => depth -= 1,
                        _ => {}
                    }
                    j += 1;
                }
                return Some(signature[start..j.saturating_sub(1)].to_string());
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn split_top_level(s: &str, delim: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '(' | '[' | '<' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '>' | '}' => {
                depth -= 1;
                current.push(c);
            }
            c if c == delim && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Parse one `name type` or `name, name2 type` (Go-style grouped params are
/// split upstream by the extractor; here each entry is already one binding)
/// into a `Param`. Falls back to treating the whole thing as a type with an
/// empty name when no separating whitespace is found (e.g. a bare type in a
/// positional-only ecosystem).
fn parse_one_param(raw: &str) -> Option<Param> {
    if raw.is_empty() {
        return None;
    }
    match raw.split_once(char::is_whitespace) {
        Some((name, ty)) if !name.is_empty() && !ty.trim().is_empty() => Some(Param {
            name: name.trim().to_string(),
            type_name: ty.trim().to_string(),
        }),
        _ => Some(Param {
            name: String::new(),
            type_name: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_function_and_method_signatures() {
        assert_eq!(
            function_signature("Do", "", "a int", "error"),
            "func Do(a int) error"
        );
        assert_eq!(
            method_signature("(b *Backend)", "Query", "", "", ""),
            "func (b *Backend) Query()"
        );
        assert_eq!(closure_signature("x int", ""), "func(x int)");
    }

    #[test]
    fn parses_simple_params() {
        let params = parse_params("func Do(a int, b string) error");
        assert_eq!(
            params,
            vec![
                Param { name: "a".into(), type_name: "int".into() },
                Param { name: "b".into(), type_name: "string".into() },
            ]
        );
    }

    #[test]
    fn parses_params_with_nested_generics_without_splitting_inside() {
        let params = parse_params("func Do(a map[string]int, b Pair<int, int>) void");
        assert_eq!(
            params,
            vec![
                Param { name: "a".into(), type_name: "map[string]int".into() },
                Param { name: "b".into(), type_name: "Pair<int, int>".into() },
            ]
        );
    }

    #[test]
    fn empty_param_list_yields_no_params() {
        assert!(parse_params("func Do() error").is_empty());
    }
}
