//! Writer behavior against a real in-memory store: schema idempotency,
//! transactional batches, per-file deletion, and project metadata.

use cie_core::model::{
    CallsEdge, DefinesEdge, FileEntity, FunctionEntity, ImplementsEdge, ImportEntity, Range,
    TypeEntity, TypeKind,
};
use cie_store::{GraphStore, MutationBuilder, batch_mutations};

const DIMS: usize = 4;

fn range() -> Range {
    Range { start_line: 1, end_line: 3, start_col: 1, end_col: 2 }
}

/// One file defining two functions with a call between them, plus a type.
fn seed(store: &GraphStore, path: &str) -> (FileEntity, Vec<FunctionEntity>) {
    let file = FileEntity::new(path, "hash0".into(), "go".into(), 64);
    let caller = FunctionEntity::new(path, "Run", "func Run()".into(), "func Run() { helper() }".into(), range());
    let mut callee =
        FunctionEntity::new(path, "helper", "func helper()".into(), "func helper() {}".into(), Range {
            start_line: 5,
            end_line: 6,
            start_col: 1,
            end_col: 2,
        });
    callee.embedding = vec![0.1, 0.2, 0.3, 0.4];
    let ty = TypeEntity::new(path, "Widget", TypeKind::Struct, "type Widget struct{}".into(), range());

    let mut b = MutationBuilder::new();
    b.files(std::slice::from_ref(&file));
    b.functions(&[caller.clone(), callee.clone()]);
    b.types(std::slice::from_ref(&ty));
    b.imports(&[ImportEntity::new(path, "example.com/dep", String::new(), 2)]);
    b.defines(&[
        DefinesEdge { file_id: file.id.clone(), function_id: caller.id.clone() },
        DefinesEdge { file_id: file.id.clone(), function_id: callee.id.clone() },
    ]);
    b.calls(&[CallsEdge {
        caller_id: caller.id.clone(),
        callee_id: callee.id.clone(),
        call_line: 2,
    }]);
    b.implements(&[ImplementsEdge::new("Widget", "Runner", path)]);

    for batch in batch_mutations(b.finish(), 2000) {
        store.apply(&batch).unwrap();
    }
    (file, vec![caller, callee])
}

/// Row count via the relation's full key (projection is set-semantics, so
/// counting a prefix of the key would collapse rows).
fn count(store: &GraphStore, relation: &str, key: &str) -> usize {
    store
        .query(&format!("?[{key}] := *{relation}{{{key}}}"))
        .unwrap()
        .rows
        .len()
}

#[test]
fn schema_creation_is_idempotent() {
    let store = GraphStore::open_in_memory().unwrap();
    store.ensure_schema(DIMS).unwrap();
    store.ensure_schema(DIMS).unwrap();
}

#[test]
fn written_entities_are_queryable() {
    let store = GraphStore::open_in_memory().unwrap();
    store.ensure_schema(DIMS).unwrap();
    seed(&store, "pkg/a.go");

    assert_eq!(count(&store, "cie_file", "id"), 1);
    assert_eq!(count(&store, "cie_function", "id"), 2);
    assert_eq!(count(&store, "cie_function_code", "id"), 2);
    // only the function with a non-empty vector lands in the embedding relation
    assert_eq!(count(&store, "cie_function_embedding", "id"), 1);
    assert_eq!(count(&store, "cie_type", "id"), 1);
    assert_eq!(count(&store, "cie_import", "id"), 1);
    assert_eq!(count(&store, "cie_defines", "file_id, function_id"), 2);
    assert_eq!(count(&store, "cie_calls", "caller_id, callee_id"), 1);
    assert_eq!(count(&store, "cie_implements", "id"), 1);
}

#[test]
fn rewriting_the_same_entities_does_not_duplicate() {
    let store = GraphStore::open_in_memory().unwrap();
    store.ensure_schema(DIMS).unwrap();
    seed(&store, "pkg/a.go");
    seed(&store, "pkg/a.go");

    assert_eq!(count(&store, "cie_function", "id"), 2);
    assert_eq!(count(&store, "cie_calls", "caller_id, callee_id"), 1);
}

#[test]
fn call_line_round_trips() {
    let store = GraphStore::open_in_memory().unwrap();
    store.ensure_schema(DIMS).unwrap();
    seed(&store, "pkg/a.go");

    let out = store
        .query("?[call_line] := *cie_calls{call_line}")
        .unwrap();
    assert_eq!(out.rows, vec![vec!["2".to_string()]]);
}

#[test]
fn delete_entities_for_file_removes_the_whole_subgraph() {
    let store = GraphStore::open_in_memory().unwrap();
    store.ensure_schema(DIMS).unwrap();
    seed(&store, "pkg/a.go");
    let (other_file, _) = seed(&store, "pkg/b.go");

    store.delete_entities_for_file("pkg/a.go").unwrap();

    // pkg/a.go is gone across every relation
    let remaining = store.file_paths().unwrap();
    assert_eq!(remaining, vec!["pkg/b.go".to_string()]);
    assert_eq!(count(&store, "cie_function", "id"), 2);
    assert_eq!(count(&store, "cie_function_code", "id"), 2);
    assert_eq!(count(&store, "cie_function_embedding", "id"), 1);
    assert_eq!(count(&store, "cie_type", "id"), 1);
    assert_eq!(count(&store, "cie_import", "id"), 1);
    assert_eq!(count(&store, "cie_calls", "caller_id, callee_id"), 1);
    assert_eq!(count(&store, "cie_implements", "id"), 1);

    // and pkg/b.go's subgraph still references its own file id
    let defines = store
        .query("?[file_id] := *cie_defines{file_id}")
        .unwrap();
    assert!(defines.rows.iter().all(|r| r[0] == other_file.id));
}

#[test]
fn project_meta_and_last_indexed_ref_round_trip() {
    let store = GraphStore::open_in_memory().unwrap();
    store.ensure_schema(DIMS).unwrap();

    assert_eq!(store.last_indexed_ref().unwrap(), None);
    store.set_last_indexed_ref("abc123").unwrap();
    assert_eq!(store.last_indexed_ref().unwrap(), Some("abc123".to_string()));
    store.set_last_indexed_ref("def456").unwrap();
    assert_eq!(store.last_indexed_ref().unwrap(), Some("def456".to_string()));

    store.set_project_meta("project_id", "proj:42").unwrap();
    assert_eq!(store.get_project_meta("project_id").unwrap().as_deref(), Some("proj:42"));
}

#[test]
fn stored_file_hashes_feed_the_hash_delta() {
    let store = GraphStore::open_in_memory().unwrap();
    store.ensure_schema(DIMS).unwrap();
    seed(&store, "pkg/a.go");
    seed(&store, "pkg/b.go");

    let hashes = store.stored_file_hashes().unwrap();
    assert_eq!(hashes.len(), 2);
    assert_eq!(hashes.get("pkg/a.go").map(String::as_str), Some("hash0"));
}
