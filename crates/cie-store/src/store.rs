//! The embedded graph store: schema management, batched transactional writes,
//! and the narrow read/delete operations the orchestrator uses.

use crate::mutation::Mutation;
use crate::schema;
use cie_core::error::{CieError, CieResult};
use cozo::{DataValue, DbInstance, Num, ScriptMutability};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Tabular result of a read query.
#[derive(Debug, Clone)]
pub struct QueryRows {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub struct GraphStore {
    db: DbInstance,
}

fn storage_err(e: impl std::fmt::Display) -> CieError {
    CieError::Storage(e.to_string())
}

fn render_value(v: &DataValue) -> String {
    match v {
        DataValue::Null => "null".to_string(),
        DataValue::Bool(b) => b.to_string(),
        DataValue::Num(Num::Int(i)) => i.to_string(),
        DataValue::Num(Num::Float(f)) => f.to_string(),
        DataValue::Str(s) => s.to_string(),
        other => format!("{other:?}"),
    }
}

impl GraphStore {
    /// Open (creating if needed) a sqlite-backed store at `path`.
    pub fn open(path: &Path) -> CieResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(storage_err)?;
        }
        let db = DbInstance::new("sqlite", path, "").map_err(storage_err)?;
        Ok(Self { db })
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> CieResult<Self> {
        let db = DbInstance::new("mem", "", "").map_err(storage_err)?;
        Ok(Self { db })
    }

    fn run_mut(&self, script: &str, params: BTreeMap<String, DataValue>) -> CieResult<()> {
        self.db
            .run_script(script, params, ScriptMutability::Mutable)
            .map_err(storage_err)?;
        Ok(())
    }

    /// Ensure every relation exists and the HNSW indexes are in place.
    /// "Already exists" is benign on both counts; index creation failures
    /// beyond that are soft (semantic search degrades, indexing continues).
    pub fn ensure_schema(&self, dimensions: usize) -> CieResult<()> {
        for stmt in schema::create_statements(dimensions) {
            match self.run_mut(&stmt, BTreeMap::new()) {
                Ok(()) => {}
                Err(e) if is_already_exists(&e) => {}
                Err(e) => return Err(e),
            }
        }
        for stmt in schema::hnsw_statements(dimensions) {
            if let Err(e) = self.run_mut(&stmt, BTreeMap::new()) {
                if !is_already_exists(&e) {
                    tracing::warn!(error = %e, "HNSW index creation failed, continuing without it");
                }
            }
        }
        Ok(())
    }

    /// Execute one batch of mutations as a single transaction.
    pub fn apply(&self, batch: &[Mutation]) -> CieResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let script: String = batch
            .iter()
            .map(|m| format!("{{{}}}", m.script))
            .collect::<Vec<_>>()
            .join("\n");
        self.run_mut(&script, BTreeMap::new())
    }

    /// Run a raw read query and render the rows for display.
    pub fn query(&self, script: &str) -> CieResult<QueryRows> {
        let out = self
            .db
            .run_script(script, BTreeMap::new(), ScriptMutability::Immutable)
            .map_err(storage_err)?;
        Ok(QueryRows {
            headers: out.headers,
            rows: out
                .rows
                .iter()
                .map(|row| row.iter().map(render_value).collect())
                .collect(),
        })
    }

    /// Delete every entity and edge belonging to one file path, in one
    /// transaction. Edge rows go first: the entity relations are still
    /// queryable inside the transaction while the edge blocks join on them.
    pub fn delete_entities_for_file(&self, path: &str) -> CieResult<()> {
        let script = "\
{?[caller_id, callee_id] := *cie_calls{caller_id, callee_id}, *cie_function{id: caller_id, file_path}, file_path = $path :rm cie_calls {caller_id, callee_id}}
{?[caller_id, callee_id] := *cie_calls{caller_id, callee_id}, *cie_function{id: callee_id, file_path}, file_path = $path :rm cie_calls {caller_id, callee_id}}
{?[file_id, function_id] := *cie_defines{file_id, function_id}, *cie_file{id: file_id, path}, path = $path :rm cie_defines {file_id, function_id}}
{?[file_id, type_id] := *cie_defines_type{file_id, type_id}, *cie_file{id: file_id, path}, path = $path :rm cie_defines_type {file_id, type_id}}
{?[id] := *cie_function{id, file_path}, file_path = $path :rm cie_function_code {id}}
{?[id] := *cie_function{id, file_path}, file_path = $path :rm cie_function_embedding {id}}
{?[id] := *cie_function{id, file_path}, file_path = $path :rm cie_function {id}}
{?[id] := *cie_type{id, file_path}, file_path = $path :rm cie_type_code {id}}
{?[id] := *cie_type{id, file_path}, file_path = $path :rm cie_type_embedding {id}}
{?[id] := *cie_type{id, file_path}, file_path = $path :rm cie_type {id}}
{?[id] := *cie_import{id, file_path}, file_path = $path :rm cie_import {id}}
{?[id] := *cie_field{id, file_path}, file_path = $path :rm cie_field {id}}
{?[id] := *cie_implements{id, file_path}, file_path = $path :rm cie_implements {id}}
{?[id] := *cie_file{id, path}, path = $path :rm cie_file {id}}";
        let mut params = BTreeMap::new();
        params.insert("path".to_string(), DataValue::from(path));
        self.run_mut(script, params)
    }

    pub fn get_project_meta(&self, key: &str) -> CieResult<Option<String>> {
        let mut params = BTreeMap::new();
        params.insert("key".to_string(), DataValue::from(key));
        let out = self
            .db
            .run_script(
                "?[value] := *project_meta{key, value}, key = $key",
                params,
                ScriptMutability::Immutable,
            )
            .map_err(storage_err)?;
        Ok(out.rows.first().and_then(|row| match row.first() {
            Some(DataValue::Str(s)) => Some(s.to_string()),
            _ => None,
        }))
    }

    pub fn set_project_meta(&self, key: &str, value: &str) -> CieResult<()> {
        let mut params = BTreeMap::new();
        params.insert("key".to_string(), DataValue::from(key));
        params.insert("value".to_string(), DataValue::from(value));
        self.run_mut(
            "?[key, value] := key = $key, value = $value :put project_meta {key => value}",
            params,
        )
    }

    pub fn last_indexed_ref(&self) -> CieResult<Option<String>> {
        self.get_project_meta(schema::LAST_INDEXED_REF_KEY)
    }

    pub fn set_last_indexed_ref(&self, commit: &str) -> CieResult<()> {
        self.set_project_meta(schema::LAST_INDEXED_REF_KEY, commit)
    }

    /// `path → content_hash` for every stored file; the hash delta detector's
    /// view of the previous run.
    pub fn stored_file_hashes(&self) -> CieResult<HashMap<String, String>> {
        let out = self
            .db
            .run_script(
                "?[path, content_hash] := *cie_file{path, content_hash}",
                BTreeMap::new(),
                ScriptMutability::Immutable,
            )
            .map_err(storage_err)?;
        Ok(out
            .rows
            .iter()
            .filter_map(|row| match (row.first(), row.get(1)) {
                (Some(DataValue::Str(p)), Some(DataValue::Str(h))) => {
                    Some((p.to_string(), h.to_string()))
                }
                _ => None,
            })
            .collect())
    }

    /// Every file path that currently has entities, used by status reporting.
    pub fn file_paths(&self) -> CieResult<Vec<String>> {
        let out = self.query("?[path] := *cie_file{path}")?;
        Ok(out.rows.into_iter().filter_map(|mut r| r.pop()).collect())
    }
}

fn is_already_exists(e: &CieError) -> bool {
    let msg = e.to_string();
    msg.contains("exist") || msg.contains("conflict")
}
