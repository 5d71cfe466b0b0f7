//! Pipeline orchestrator: single-threaded control with bounded
//! worker pools for parsing and embedding.
//!
//! A run moves through `load → (incremental?) → parse → resolve → embed →
//! validate → write → record_ref`. Parse and embedding failures are counted
//! in the result and never abort; storage errors and cancellation do.

use crate::delta::{self, Delta};
use crate::loader::{self, SourceFile};
use crate::log::IndexLog;
use crate::result::{DeltaCounts, IngestionResult, RunMode};
use cie_core::config::CieConfig;
use cie_core::error::{CieError, CieResult};
use cie_core::model::{
    CallsEdge, DefinesEdge, DefinesTypeEdge, FieldEntity, FileEntity, FunctionEntity,
    ImplementsEdge, ImportEntity, TypeEntity, UnresolvedCall,
};
use cie_embed::{EmbeddingGenerator, EmbeddingProvider};
use cie_store::schema::LAST_RUN_KEY;
use cie_store::{GraphStore, MutationBuilder, batch_mutations};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Load,
    Parse,
    Resolve,
    Embed,
    Write,
}

/// `(phase, done, total)` callback fired as work completes.
pub type ProgressFn = dyn Fn(Phase, u64, u64) + Send + Sync;

/// Cooperative cancellation flag, polled on each orchestrator loop iteration
/// and before every pool submission. In-flight parses finish their current
/// file; no partial batch commits beyond the last completed transaction.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a run accumulates between parse and write.
#[derive(Default)]
struct Corpus {
    files: Vec<FileEntity>,
    functions: Vec<FunctionEntity>,
    types: Vec<TypeEntity>,
    fields: Vec<FieldEntity>,
    imports: Vec<ImportEntity>,
    defines: Vec<DefinesEdge>,
    defines_types: Vec<DefinesTypeEdge>,
    calls: Vec<CallsEdge>,
    unresolved: Vec<UnresolvedCall>,
    implements: Vec<ImplementsEdge>,
    file_packages: HashMap<String, Option<String>>,
}

enum ParseOutcome {
    Parsed(Box<(FileEntity, cie_parser::ParseResult)>),
    Unreadable,
    Cancelled,
}

pub struct Pipeline {
    config: CieConfig,
    store: GraphStore,
    provider: Arc<dyn EmbeddingProvider>,
    cancel: CancelToken,
    progress: Option<Box<ProgressFn>>,
}

impl Pipeline {
    pub fn new(config: CieConfig, store: GraphStore, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            config,
            store,
            provider,
            cancel: CancelToken::default(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Box<ProgressFn>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    fn report(&self, phase: Phase, done: u64, total: u64) {
        if let Some(progress) = &self.progress {
            progress(phase, done, total);
        }
    }

    fn check_cancelled(&self) -> CieResult<()> {
        if self.cancel.is_cancelled() {
            return Err(CieError::Cancelled);
        }
        Ok(())
    }

    /// Entry point: incremental when the preconditions hold, full otherwise.
    pub fn run(&self, root: &Path) -> CieResult<IngestionResult> {
        let log = IndexLog::new(root);
        self.store.ensure_schema(self.config.embedding_dimensions)?;

        if self.config.force_reindex {
            log.append("run_started mode=full reason=force_reindex");
            return self.finish(self.run_full(root, &log), &log);
        }

        match self.plan_incremental(root) {
            Ok(delta) => {
                log.append(&format!(
                    "run_started mode=incremental base={} head={}",
                    delta.base, delta.head
                ));
                self.finish(self.run_incremental(root, delta, &log), &log)
            }
            Err(reason) => {
                tracing::info!(reason = %reason, "incremental preconditions not met, running full");
                log.append(&format!("run_started mode=full reason={reason}"));
                self.finish(self.run_full(root, &log), &log)
            }
        }
    }

    fn finish(
        &self,
        outcome: CieResult<IngestionResult>,
        log: &IndexLog,
    ) -> CieResult<IngestionResult> {
        match outcome {
            Ok(result) => {
                if let Ok(json) = serde_json::to_string(&result) {
                    self.store.set_project_meta(LAST_RUN_KEY, &json)?;
                }
                log.append(&format!(
                    "run_completed files={} functions={} types={} calls={} parse_errors={} embedding_errors={}",
                    result.files_processed,
                    result.functions_extracted,
                    result.types_extracted,
                    result.calls_edges,
                    result.parse_errors,
                    result.embedding_errors,
                ));
                Ok(result)
            }
            Err(err) => {
                log.append(&format!("run_failed error={err}"));
                Err(err)
            }
        }
    }

    /// Check the incremental preconditions and compute the delta. Any failure
    /// here is a reason to fall back to a full run, never a hard error.
    fn plan_incremental(&self, root: &Path) -> CieResult<Delta> {
        if self.config.use_vcs_delta {
            let stored = self
                .store
                .last_indexed_ref()
                .ok()
                .flatten()
                .ok_or_else(|| CieError::NoPriorReference(root.to_path_buf()))?;
            let delta = delta::git_delta(root, &stored, "HEAD")?;
            let exclusions = loader::build_exclusions(&self.config.exclude_globs)?;
            Ok(delta::post_filter(delta, root, &exclusions, self.config.max_file_size))
        } else {
            let stored = self.store.stored_file_hashes()?;
            if stored.is_empty() {
                return Err(CieError::NoPriorReference(root.to_path_buf()));
            }
            let load = loader::load_repo(root, &self.config)?;
            Ok(delta::hash_delta(&stored, &load.files))
        }
    }

    fn run_full(&self, root: &Path, log: &IndexLog) -> CieResult<IngestionResult> {
        let mut result =
            IngestionResult::new(project_id(root), new_run_id(), RunMode::Full);

        let t = Instant::now();
        let load = loader::load_repo(root, &self.config)?;
        result.skipped = load.skipped;
        result.timings.load_ms = elapsed_ms(t);
        self.report(Phase::Load, load.files.len() as u64, load.files.len() as u64);
        self.check_cancelled()?;

        let mut corpus = self.parse_files(&load.files, &mut result)?;
        self.resolve_corpus(&mut corpus, &mut result)?;
        self.embed_corpus(&mut corpus, &mut result)?;

        // A full run resets every path it knows about: current paths collapse
        // stale rows from earlier content, stored-but-vanished paths are
        // dropped entirely.
        let mut delete_paths: HashSet<String> =
            self.store.stored_file_hashes()?.into_keys().collect();
        delete_paths.extend(corpus.files.iter().map(|f| f.path.clone()));
        let mut delete_paths: Vec<String> = delete_paths.into_iter().collect();
        delete_paths.sort();

        let t = Instant::now();
        self.write_corpus(&corpus, &delete_paths, &mut result)?;
        result.timings.write_ms = elapsed_ms(t);

        self.record_ref(root, &mut result)?;
        log.append(&format!("write_committed files={}", result.files_processed));
        Ok(result)
    }

    fn run_incremental(
        &self,
        root: &Path,
        delta: Delta,
        log: &IndexLog,
    ) -> CieResult<IngestionResult> {
        let mut result =
            IngestionResult::new(project_id(root), new_run_id(), RunMode::Incremental);
        result.delta = Some(DeltaCounts {
            added: delta.added.len() as u64,
            modified: delta.modified.len() as u64,
            deleted: delta.deleted.len() as u64,
            renamed: delta.renamed.len() as u64,
        });
        log.append(&format!(
            "delta_computed added={} modified={} deleted={} renamed={}",
            delta.added.len(),
            delta.modified.len(),
            delta.deleted.len(),
            delta.renamed.len()
        ));

        if delta.is_empty() {
            // No-op run: still advance the recorded reference.
            self.record_ref(root, &mut result)?;
            return Ok(result);
        }

        let t = Instant::now();
        let changed = loader::load_paths(root, &delta.changed_paths(), &self.config)?;
        result.skipped = changed.skipped;
        result.timings.load_ms = elapsed_ms(t);
        self.report(Phase::Load, changed.files.len() as u64, changed.files.len() as u64);

        for path in delta.affected_paths() {
            self.check_cancelled()?;
            self.store.delete_entities_for_file(&path)?;
        }

        let mut corpus = self.parse_files(&changed.files, &mut result)?;
        // Resolution deliberately sees only the changed-file corpus.
        self.resolve_corpus(&mut corpus, &mut result)?;
        self.embed_corpus(&mut corpus, &mut result)?;

        let t = Instant::now();
        self.write_corpus(&corpus, &[], &mut result)?;
        result.timings.write_ms = elapsed_ms(t);

        self.record_ref(root, &mut result)?;
        log.append(&format!("write_committed files={}", result.files_processed));
        Ok(result)
    }

    /// Parse every file on the worker pool, aggregating in path order (the
    /// input is pre-sorted and the parallel map preserves index order).
    fn parse_files(
        &self,
        files: &[SourceFile],
        result: &mut IngestionResult,
    ) -> CieResult<Corpus> {
        let t = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.parse_workers)
            .build()
            .expect("thread pool construction cannot fail with a valid thread count");

        let max_code_text = self.config.max_code_text;
        let cancel = self.cancel.clone();
        let progress = self.progress.as_deref();
        let done = AtomicU64::new(0);
        let total = files.len() as u64;

        let outcomes: Vec<ParseOutcome> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    if cancel.is_cancelled() {
                        return ParseOutcome::Cancelled;
                    }
                    let Ok(bytes) = std::fs::read(&file.full_path) else {
                        return ParseOutcome::Unreadable;
                    };
                    let content_hash = delta::sha256_hex(&bytes);
                    let language_name = file.language.map_or("unknown", |l| l.name());
                    let entity = FileEntity::new(
                        &file.path,
                        content_hash,
                        language_name.to_string(),
                        file.size,
                    );
                    let parsed = match file.language {
                        Some(language) => cie_parser::parse_file(
                            Path::new(&file.path),
                            &bytes,
                            language,
                            max_code_text,
                        ),
                        None => cie_parser::ParseResult::default(),
                    };
                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(progress) = progress {
                        progress(Phase::Parse, finished, total);
                    }
                    ParseOutcome::Parsed(Box::new((entity, parsed)))
                })
                .collect()
        });
        self.check_cancelled()?;

        let mut corpus = Corpus::default();
        for outcome in outcomes {
            match outcome {
                ParseOutcome::Parsed(boxed) => {
                    let (entity, parsed) = *boxed;
                    if parsed.had_syntax_error {
                        result.parse_errors += 1;
                    }
                    result.code_text_truncated += parsed.code_text_truncated;
                    corpus
                        .file_packages
                        .insert(entity.path.clone(), parsed.package_name.clone());
                    corpus.files.push(entity);
                    corpus.functions.extend(parsed.functions);
                    corpus.types.extend(parsed.types);
                    corpus.fields.extend(parsed.fields);
                    corpus.imports.extend(parsed.imports);
                    corpus.defines.extend(parsed.defines);
                    corpus.defines_types.extend(parsed.defines_types);
                    corpus.calls.extend(parsed.calls);
                    corpus.unresolved.extend(parsed.unresolved_calls);
                }
                ParseOutcome::Unreadable => {
                    *result.skipped.entry("unreadable".to_string()).or_insert(0) += 1;
                }
                ParseOutcome::Cancelled => return Err(CieError::Cancelled),
            }
        }

        result.files_processed = corpus.files.len() as u64;
        result.timings.parse_ms = elapsed_ms(t);
        Ok(corpus)
    }

    fn resolve_corpus(&self, corpus: &mut Corpus, result: &mut IngestionResult) -> CieResult<()> {
        self.check_cancelled()?;
        let t = Instant::now();
        let total = corpus.unresolved.len() as u64;
        self.report(Phase::Resolve, 0, total);

        let implements_index =
            cie_resolve::build_implements_index(&corpus.types, &corpus.functions);
        let out = cie_resolve::resolve(cie_resolve::ResolveInput {
            functions: &corpus.functions,
            fields: &corpus.fields,
            imports: &corpus.imports,
            unresolved: &corpus.unresolved,
            file_packages: &corpus.file_packages,
            implements: &implements_index,
        });

        corpus.calls.extend(out.calls);
        corpus.functions.extend(out.external_stubs);
        corpus.implements = implements_index.edges;

        // set semantics across the parse-time and resolved edges
        let mut seen = HashSet::new();
        corpus
            .calls
            .retain(|e| seen.insert((e.caller_id.clone(), e.callee_id.clone())));

        result.timings.resolve_ms = elapsed_ms(t);
        self.report(Phase::Resolve, total, total);
        Ok(())
    }

    /// Embed function code texts, then type code texts. Failures
    /// leave empty vectors behind and bump `embedding_errors`.
    fn embed_corpus(&self, corpus: &mut Corpus, result: &mut IngestionResult) -> CieResult<()> {
        self.check_cancelled()?;
        let t = Instant::now();
        let generator = EmbeddingGenerator::new(self.provider.clone(), self.config.embed_workers);
        let dimensions = self.config.embedding_dimensions;

        let fn_idx: Vec<usize> = corpus
            .functions
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.is_external_stub() && !f.code_text.is_empty())
            .map(|(i, _)| i)
            .collect();
        let ty_idx: Vec<usize> = corpus
            .types
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.code_text.is_empty())
            .map(|(i, _)| i)
            .collect();
        let total = (fn_idx.len() + ty_idx.len()) as u64;

        let fn_texts: Vec<String> =
            fn_idx.iter().map(|&i| corpus.functions[i].code_text.clone()).collect();
        let outcome = generator.embed_texts(&fn_texts, &|done| {
            self.report(Phase::Embed, done, total);
        });
        result.embedding_errors += outcome.errors;
        for (&i, vector) in fn_idx.iter().zip(outcome.vectors) {
            corpus.functions[i].embedding = checked_vector(vector, dimensions, result);
        }

        self.check_cancelled()?;
        let offset = fn_idx.len() as u64;
        let ty_texts: Vec<String> =
            ty_idx.iter().map(|&i| corpus.types[i].code_text.clone()).collect();
        let outcome = generator.embed_texts(&ty_texts, &|done| {
            self.report(Phase::Embed, offset + done, total);
        });
        result.embedding_errors += outcome.errors;
        for (&i, vector) in ty_idx.iter().zip(outcome.vectors) {
            corpus.types[i].embedding = checked_vector(vector, dimensions, result);
        }

        result.timings.embed_ms = elapsed_ms(t);
        Ok(())
    }

    /// Validate referential integrity, then translate and write in one or
    /// more transactions near the configured batch size.
    fn write_corpus(
        &self,
        corpus: &Corpus,
        delete_paths: &[String],
        result: &mut IngestionResult,
    ) -> CieResult<()> {
        self.check_cancelled()?;
        let (defines, defines_types, calls) = validate_edges(corpus);

        result.functions_extracted = corpus.functions.len() as u64;
        result.types_extracted = corpus.types.len() as u64;
        result.fields_extracted = corpus.fields.len() as u64;
        result.imports_extracted = corpus.imports.len() as u64;
        result.defines_edges = defines.len() as u64;
        result.defines_type_edges = defines_types.len() as u64;
        result.calls_edges = calls.len() as u64;
        result.implements_edges = corpus.implements.len() as u64;

        for path in delete_paths {
            self.check_cancelled()?;
            self.store.delete_entities_for_file(path)?;
        }

        let mut builder = MutationBuilder::new();
        builder.files(&corpus.files);
        builder.functions(&corpus.functions);
        builder.types(&corpus.types);
        builder.fields(&corpus.fields);
        builder.imports(&corpus.imports);
        builder.defines(&defines);
        builder.defines_types(&defines_types);
        builder.calls(&calls);
        builder.implements(&corpus.implements);

        let batches = batch_mutations(builder.finish(), self.config.batch_target_mutations);
        let total = batches.len() as u64;
        for (i, batch) in batches.iter().enumerate() {
            self.check_cancelled()?;
            self.store.apply(batch)?;
            self.report(Phase::Write, i as u64 + 1, total);
        }
        Ok(())
    }

    fn record_ref(&self, root: &Path, result: &mut IngestionResult) -> CieResult<()> {
        if let Ok(head) = delta::current_head(root) {
            self.store.set_last_indexed_ref(&head)?;
            result.last_indexed_ref = Some(head);
        }
        Ok(())
    }
}

/// Drop edges whose endpoints are missing from the corpus. Self-call edges
/// are dropped on the same pass.
fn validate_edges(
    corpus: &Corpus,
) -> (Vec<DefinesEdge>, Vec<DefinesTypeEdge>, Vec<CallsEdge>) {
    let file_ids: HashSet<&str> = corpus.files.iter().map(|f| f.id.as_str()).collect();
    let function_ids: HashSet<&str> = corpus.functions.iter().map(|f| f.id.as_str()).collect();
    let type_ids: HashSet<&str> = corpus.types.iter().map(|t| t.id.as_str()).collect();

    let mut dropped = 0usize;
    let defines: Vec<DefinesEdge> = corpus
        .defines
        .iter()
        .filter(|e| {
            let ok = file_ids.contains(e.file_id.as_str())
                && function_ids.contains(e.function_id.as_str());
            dropped += usize::from(!ok);
            ok
        })
        .cloned()
        .collect();
    let defines_types: Vec<DefinesTypeEdge> = corpus
        .defines_types
        .iter()
        .filter(|e| {
            let ok =
                file_ids.contains(e.file_id.as_str()) && type_ids.contains(e.type_id.as_str());
            dropped += usize::from(!ok);
            ok
        })
        .cloned()
        .collect();
    let calls: Vec<CallsEdge> = corpus
        .calls
        .iter()
        .filter(|e| {
            let ok = e.caller_id != e.callee_id
                && function_ids.contains(e.caller_id.as_str())
                && function_ids.contains(e.callee_id.as_str());
            dropped += usize::from(!ok);
            ok
        })
        .cloned()
        .collect();

    if dropped > 0 {
        tracing::warn!(dropped, "dropped edges with missing endpoints during validation");
    }
    (defines, defines_types, calls)
}

/// Clamp a returned vector to the configured dimensionality: a mismatched
/// vector cannot be stored in the fixed-width column, so it degrades to "no
/// embedding" and counts as an error.
fn checked_vector(vector: Vec<f32>, dimensions: usize, result: &mut IngestionResult) -> Vec<f32> {
    if vector.is_empty() || vector.len() == dimensions {
        vector
    } else {
        result.embedding_errors += 1;
        Vec::new()
    }
}

fn project_id(root: &Path) -> String {
    let canonical = root
        .canonicalize()
        .unwrap_or_else(|_| root.to_path_buf())
        .to_string_lossy()
        .replace('\\', "/");
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("proj:{}", hex::encode(&hasher.finalize()[..16]))
}

fn new_run_id() -> String {
    format!("run-{}", chrono::Utc::now().timestamp_millis())
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cie_core::model::Range;

    fn range() -> Range {
        Range { start_line: 1, end_line: 2, start_col: 1, end_col: 1 }
    }

    #[test]
    fn validation_drops_dangling_and_self_edges() {
        let file = FileEntity::new("a.go", "h".into(), "go".into(), 1);
        let f = FunctionEntity::new("a.go", "Do", String::new(), String::new(), range());
        let corpus = Corpus {
            defines: vec![
                DefinesEdge { file_id: file.id.clone(), function_id: f.id.clone() },
                DefinesEdge { file_id: file.id.clone(), function_id: "func:missing".into() },
            ],
            calls: vec![
                CallsEdge { caller_id: f.id.clone(), callee_id: f.id.clone(), call_line: 1 },
                CallsEdge { caller_id: f.id.clone(), callee_id: "func:gone".into(), call_line: 2 },
            ],
            files: vec![file],
            functions: vec![f],
            ..Corpus::default()
        };

        let (defines, _, calls) = validate_edges(&corpus);
        assert_eq!(defines.len(), 1);
        assert!(calls.is_empty());
    }

    #[test]
    fn project_id_is_stable_for_a_path() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(project_id(tmp.path()), project_id(tmp.path()));
        assert!(project_id(tmp.path()).starts_with("proj:"));
    }

    #[test]
    fn mismatched_vector_degrades_to_no_embedding() {
        let mut result = IngestionResult::new("p".into(), "r".into(), RunMode::Full);
        assert_eq!(checked_vector(vec![1.0, 2.0], 4, &mut result), Vec::<f32>::new());
        assert_eq!(result.embedding_errors, 1);
        assert_eq!(checked_vector(vec![1.0; 4], 4, &mut result).len(), 4);
        assert!(checked_vector(Vec::new(), 4, &mut result).is_empty());
        assert_eq!(result.embedding_errors, 1);
    }

    #[test]
    fn cancel_token_flips_once_and_stays() {
        let token = CancelToken::default();
        assert!(!token.is_cancelled());
        token.clone().cancel();
        assert!(token.is_cancelled());
    }
}
