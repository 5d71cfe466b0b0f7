//! Deterministic identifier minting.
//!
//! Every entity and edge id is derived from its defining inputs via a truncated
//! SHA-256 digest, never from insertion order or a counter, so re-indexing
//! unchanged source yields byte-identical ids.

use sha2::{Digest, Sha256};

/// Truncate a 256-bit digest of the pipe-delimited parts to 16 bytes (32 hex chars).
fn hash16(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// Normalize a path to platform-neutral forward slashes with no leading `./`.
pub fn normalize_path(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    replaced.strip_prefix("./").unwrap_or(&replaced).to_string()
}

pub fn file_id(normalized_path: &str) -> String {
    format!("file:{}", hash16(&[normalized_path]))
}

pub fn function_id(
    file_path: &str,
    name: &str,
    start_line: u32,
    end_line: u32,
    start_col: u32,
    end_col: u32,
) -> String {
    let start_line = start_line.to_string();
    let end_line = end_line.to_string();
    let start_col = start_col.to_string();
    let end_col = end_col.to_string();
    format!(
        "func:{}",
        hash16(&[file_path, name, &start_line, &end_line, &start_col, &end_col])
    )
}

pub fn type_id(file_path: &str, name: &str, start_line: u32, end_line: u32) -> String {
    let range = format!("{}-{}", start_line, end_line);
    format!("typ:{}", hash16(&[file_path, name, &range]))
}

pub fn field_id(file_path: &str, struct_name: &str, field_name: &str) -> String {
    format!("fld:{}", hash16(&[file_path, struct_name, field_name]))
}

pub fn import_id(file_path: &str, import_path: &str) -> String {
    format!("imp:{}", hash16(&[file_path, import_path]))
}

pub fn implements_id(type_name: &str, interface_name: &str) -> String {
    format!("impl:{}", hash16(&[type_name, interface_name]))
}

/// Id for a synthetic external stub minted for a call target whose defining
/// type lives outside the indexed corpus.
pub fn external_stub_id(type_name: &str, method_name: &str) -> String {
    let target = format!("_external_:{}.{}", type_name, method_name);
    format!("func:{}", hash16(&[&target]))
}
