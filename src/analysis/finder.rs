//! The interprocedural exception-flow driver.
//!
//! [`ExceptionFinder`] owns one analysis context: the code source, an optional
//! documentation provider, the active [`AnalysisOptions`] and the [`AnalysisCache`].
//! An analysis pass walks a root method with the symbolic interpreter, descending into
//! every call site the policy filter admits, and merges each callee's escaping
//! exceptions into the caller unless a handler around the call site catches them.
//! The call chain is kept on an explicit stack of suspended interpreter cursors, so
//! its length is bounded by [`MAX_CALL_DEPTH`] rather than by the thread's stack.
//!
//! # Architecture
//!
//! - Passes are serialized by the analysis lock; a second `analyze` call blocks until
//!   the running one finishes
//! - Cycles are cut by state: a callee found `Analysing` is on the current call chain
//!   and contributes whatever it has found so far
//! - A chain longer than [`MAX_CALL_DEPTH`] fails the pass with
//!   [`Error::RecursionLimit`]
//! - Completed methods are reported to the [`ChangeSink`] in batches
//!
//! # Usage Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use throwscope::prelude::*;
//!
//! let mut builder = ProgramBuilder::with_framework();
//! let ioe = builder.constructor_of("System.InvalidOperationException")?;
//! let widget = builder.class("App", "App.Widget", "System.Object");
//! let fail = builder.method(widget, "Fail").body(|b| {
//!     b.newobj(ioe)?;
//!     b.throw()
//! })?;
//! let program = Arc::new(builder.build()?);
//!
//! let finder = ExceptionFinder::new(program, AnalysisOptions::default());
//! finder.analyze(fail, &CancellationToken::new())?;
//!
//! let escaping = finder.unhandled_exceptions(fail)?.unwrap_or_default();
//! assert_eq!(escaping.len(), 1);
//! assert_eq!(escaping[0].exception_type.fullname(), "System.InvalidOperationException");
//! # Ok::<(), throwscope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`ExceptionFinder`] is [`Send`] and [`Sync`]. Run `analyze` on a worker thread and
//! read results from any other thread; results are authoritative once the method's
//! state is [`AnalysisState::Complete`].

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, RwLock,
};

use crate::{
    analysis::{
        cache::{AnalysisCache, AnalysisState, CacheStats, ClassEntry, MethodEntry},
        interpreter::{Cursor, InterpreterEvent},
        notify::{ChangeSink, Notifier},
        options::{AnalysisOptions, DocumentationMode},
        path,
        policy::{self, PolicyDecision},
        source::CodeSource,
        thrown::{ThrownException, Unhandled, DOCUMENTED_OFFSET},
    },
    assembly::MethodBody,
    docs::DocumentationProvider,
    metadata::{
        exceptions::is_caught,
        identity::{ClassId, MethodId},
        member::{ClassDesc, MethodDesc},
    },
    utils::synchronization::CancellationToken,
    Error, Result,
};

/// Maximum length of the call chain followed by one pass.
///
/// A pass reaching it fails with [`Error::RecursionLimit`]; the methods it left
/// unfinished revert to `NotStarted` rather than completing with partial results.
pub const MAX_CALL_DEPTH: usize = 1024;

/// What a finished pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    /// The method or class the pass was started for
    pub root: MethodId,
    /// Methods that reached `Complete` during this pass, in completion order
    pub completed: Vec<MethodId>,
    /// Cache generation the results belong to
    pub generation: u64,
}

/// Interprocedural exception-flow analysis over one [`CodeSource`].
pub struct ExceptionFinder {
    source: Arc<dyn CodeSource>,
    docs: Option<Arc<dyn DocumentationProvider>>,
    sink: Option<Arc<dyn ChangeSink>>,
    options: RwLock<AnalysisOptions>,
    cache: AnalysisCache,
    pass: Mutex<Notifier>,
    abort: AtomicBool,
}

impl ExceptionFinder {
    /// Creates a finder without documentation provider or change sink.
    #[must_use]
    pub fn new(source: Arc<dyn CodeSource>, options: AnalysisOptions) -> Self {
        ExceptionFinder {
            source,
            docs: None,
            sink: None,
            options: RwLock::new(options),
            cache: AnalysisCache::new(),
            pass: Mutex::new(Notifier::default()),
            abort: AtomicBool::new(false),
        }
    }

    /// Attaches a documentation provider.
    ///
    /// Without one the documentation mode behaves as [`DocumentationMode::Never`].
    #[must_use]
    pub fn with_documentation(mut self, docs: Arc<dyn DocumentationProvider>) -> Self {
        self.docs = Some(docs);
        self
    }

    /// Attaches a sink receiving batches of completed methods.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The code source analyzed by this finder.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn CodeSource> {
        &self.source
    }

    /// The cache holding every result of the current generation.
    #[must_use]
    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// A snapshot of the active options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the options lock was poisoned.
    pub fn options(&self) -> Result<AnalysisOptions> {
        Ok(read_lock!(self.options)?.clone())
    }

    /// Replaces the options and invalidates every cached result.
    ///
    /// A running pass is cancelled first; the swap happens once the analysis lock is
    /// free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if a lock was poisoned.
    pub fn set_options(&self, options: AnalysisOptions) -> Result<()> {
        self.abort.store(true, Ordering::Release);
        let guard = lock!(self.pass);
        self.abort.store(false, Ordering::Release);
        let mut notifier = guard?;

        *write_lock!(self.options)? = options;
        notifier.discard();
        self.cache.reset()
    }

    /// Invalidates every cached result.
    ///
    /// Waits for a running pass to finish. Every entry reverts to `NotStarted` and the
    /// cache generation advances.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if a lock was poisoned.
    pub fn reset(&self) -> Result<()> {
        let mut notifier = lock!(self.pass)?;
        notifier.discard();
        self.cache.reset()
    }

    /// Analyzes `method` and every callee the policy admits.
    ///
    /// Returns immediately if the method is already complete. Blocks while another pass
    /// holds the analysis lock.
    ///
    /// # Arguments
    ///
    /// * `method` - Root of the pass
    /// * `token` - Polled once per instruction; cancelling aborts the pass
    ///
    /// # Errors
    ///
    /// - [`Error::MemberNotFound`] if the code source does not know `method`
    /// - [`Error::Cancelled`] if the token fired; methods left unfinished revert to
    ///   `NotStarted`
    /// - [`Error::RecursionLimit`] if a call chain grows past [`MAX_CALL_DEPTH`]; methods
    ///   left unfinished revert to `NotStarted`
    /// - [`Error::LockError`] if a lock was poisoned
    pub fn analyze(&self, method: MethodId, token: &CancellationToken) -> Result<AnalysisOutcome> {
        let desc = self.source.method(&method)?;

        self.run_pass(method, token, |pass| {
            pass.visit_root(&desc)?;
            Ok(())
        })
    }

    /// Analyzes every own member of `class` and aggregates them into a [`ClassEntry`].
    ///
    /// Nested types are included when [`AnalysisOptions::include_nested_types`] is set.
    ///
    /// # Errors
    ///
    /// Same as [`ExceptionFinder::analyze`]; a class unknown to the code source yields
    /// [`Error::MemberNotFound`].
    pub fn analyze_class(
        &self,
        class: ClassId,
        token: &CancellationToken,
    ) -> Result<AnalysisOutcome> {
        let desc = self.source.class(&class)?;

        self.run_pass(class, token, |pass| {
            pass.visit_class(&desc)?;
            Ok(())
        })
    }

    fn run_pass<F>(&self, root: MethodId, token: &CancellationToken, body: F) -> Result<AnalysisOutcome>
    where
        F: FnOnce(&mut Pass<'_>) -> Result<()>,
    {
        let mut notifier = lock!(self.pass)?;
        let options = self.options()?;
        let sink = self.sink.as_deref();

        let mut pass = Pass {
            finder: self,
            options: &options,
            token,
            notifier: &mut *notifier,
            started: Vec::new(),
            completed: Vec::new(),
        };

        log::trace!("analysis pass for {root} started");
        let result = body(&mut pass);
        let Pass {
            started, completed, ..
        } = pass;

        if let Err(e) = result {
            for entry in started.iter().filter(|entry| !entry.is_complete()) {
                entry.clear()?;
            }
            notifier.flush(sink);
            log::debug!(
                "analysis pass for {root} aborted after {} methods: {e}",
                completed.len()
            );
            return Err(e);
        }

        notifier.flush(sink);
        log::trace!(
            "analysis pass for {root} finished, {} methods completed",
            completed.len()
        );

        Ok(AnalysisOutcome {
            root,
            completed,
            generation: self.cache.generation(),
        })
    }

    /// The entry of `method`, if it was ever referenced.
    #[must_use]
    pub fn method_entry(&self, method: MethodId) -> Option<Arc<MethodEntry>> {
        self.cache.get_method(method)
    }

    /// The aggregated entry of `class`, if it was ever analyzed.
    #[must_use]
    pub fn class_entry(&self, class: ClassId) -> Option<Arc<ClassEntry>> {
        self.cache.get_class(class)
    }

    /// Completion state of `method`; never-referenced methods are `NotStarted`.
    #[must_use]
    pub fn state(&self, method: MethodId) -> AnalysisState {
        self.cache
            .get_method(method)
            .map_or(AnalysisState::NotStarted, |entry| entry.state())
    }

    /// Exceptions `method` lets escape, one per thrower and type.
    ///
    /// Returns `None` unless the method is complete: unfinished results are unknown, not
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the entry's lock was poisoned.
    pub fn unhandled_exceptions(&self, method: MethodId) -> Result<Option<Vec<ThrownException>>> {
        match self.cache.get_method(method) {
            Some(entry) if entry.is_complete() => Ok(Some(entry.unhandled_exceptions()?)),
            _ => Ok(None),
        }
    }

    /// Every escaping occurrence of `method` with the offset it escapes at.
    ///
    /// Returns `None` unless the method is complete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the entry's lock was poisoned.
    pub fn unhandled(&self, method: MethodId) -> Result<Option<Vec<Unhandled>>> {
        match self.cache.get_method(method) {
            Some(entry) if entry.is_complete() => Ok(Some(entry.unhandled()?)),
            _ => Ok(None),
        }
    }

    /// Statically resolved callees of `method`.
    ///
    /// Returns `None` unless the method is complete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the entry's lock was poisoned.
    pub fn called_methods(&self, method: MethodId) -> Result<Option<Vec<MethodId>>> {
        match self.cache.get_method(method) {
            Some(entry) if entry.is_complete() => Ok(Some(entry.called_methods()?)),
            _ => Ok(None),
        }
    }

    /// Offsets in `caller` of the instructions calling `callee`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the entry's lock was poisoned.
    pub fn call_sites(&self, caller: MethodId, callee: MethodId) -> Result<Vec<u32>> {
        match self.cache.get_method(caller) {
            Some(entry) => entry.call_sites(callee),
            None => Ok(Vec::new()),
        }
    }

    /// Offsets in `method` at which `thrown` escapes: its throw offsets, or the call
    /// sites it arrives through.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the entry's lock was poisoned.
    pub fn escape_offsets(&self, method: MethodId, thrown: &ThrownException) -> Result<Vec<u32>> {
        match self.cache.get_method(method) {
            Some(entry) => entry.escape_offsets(thrown),
            None => Ok(Vec::new()),
        }
    }

    /// Shortest call chain from `from` to `to`, both ends included.
    ///
    /// Only edges into complete callees that are `to` or that let an exception thrown by
    /// `to` escape are followed. Returns an empty chain if `to` is unreachable that way or
    /// `from` is not complete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if an entry's lock was poisoned.
    pub fn find_shortest_path(&self, from: MethodId, to: MethodId) -> Result<Vec<MethodId>> {
        path::shortest_path(&self.cache, from, to)
    }

    /// Shortest call chain from `from` to the method throwing `thrown`, following only
    /// edges that carry that exception.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if an entry's lock was poisoned.
    pub fn find_exception_path(
        &self,
        from: MethodId,
        thrown: &ThrownException,
    ) -> Result<Vec<MethodId>> {
        path::exception_path(&self.cache, from, thrown)
    }

    /// Entry counts of the current generation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if an entry's lock was poisoned.
    pub fn stats(&self) -> Result<CacheStats> {
        self.cache.stats()
    }

    /// Current cache generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }
}

impl std::fmt::Debug for ExceptionFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionFinder")
            .field("documentation", &self.docs.is_some())
            .field("sink", &self.sink.is_some())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// State of one running analysis pass.
struct Pass<'f> {
    finder: &'f ExceptionFinder,
    options: &'f AnalysisOptions,
    token: &'f CancellationToken,
    notifier: &'f mut Notifier,
    started: Vec<Arc<MethodEntry>>,
    completed: Vec<MethodId>,
}

/// A method on the current call chain.
struct Activation {
    entry: Arc<MethodEntry>,
    /// `None` when the body is not interpreted
    cursor: Option<Cursor>,
    documented: Vec<ThrownException>,
    /// The callee being analyzed on top of this activation, and its call-site offset
    waiting: Option<(u32, Arc<MethodEntry>)>,
}

impl Pass<'_> {
    fn checkpoint(&self) -> Result<()> {
        self.token.check()?;
        if self.finder.abort.load(Ordering::Acquire) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Root methods have no referencing type; only context-free exclusions apply.
    fn visit_root(&mut self, desc: &MethodDesc) -> Result<Arc<MethodEntry>> {
        match policy::evaluate(desc, None, self.options) {
            PolicyDecision::Skip(reason) => {
                log::debug!("{desc} excluded from analysis ({reason})");
                let entry = self.finder.cache.method(desc.id);
                if entry.try_start() {
                    self.started.push(entry.clone());
                    self.complete(&entry);
                }
                Ok(entry)
            }
            decision => self.visit(desc, decision),
        }
    }

    fn visit_class(&mut self, class: &ClassDesc) -> Result<()> {
        let mut members = Vec::new();
        self.collect_members(class, &mut members, 0)?;

        let class_entry = self.finder.cache.class(class.id);
        let mut entries = Vec::with_capacity(members.len());
        for member in members {
            self.checkpoint()?;
            match self.finder.source.method(&member) {
                Ok(desc) => entries.push(self.visit_root(&desc)?),
                Err(e) => log::debug!("member {member} of {} unavailable: {e}", class.type_ref),
            }
        }

        class_entry.aggregate(&entries)?;
        if entries.iter().all(|entry| entry.is_complete()) {
            class_entry.set_state(AnalysisState::Complete);
        }
        Ok(())
    }

    fn collect_members(
        &self,
        class: &ClassDesc,
        members: &mut Vec<MethodId>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_CALL_DEPTH {
            return Err(Error::RecursionLimit(MAX_CALL_DEPTH));
        }
        members.extend(class.methods.iter().copied());
        if !self.options.include_nested_types {
            return Ok(());
        }
        for nested in &class.nested_types {
            match self.finder.source.class(nested) {
                Ok(nested) => self.collect_members(&nested, members, depth + 1)?,
                Err(e) => log::debug!("nested type {nested} of {} unavailable: {e}", class.type_ref),
            }
        }
        Ok(())
    }

    /// Analyzes `desc` and every admitted callee unless it was already started in this
    /// generation.
    ///
    /// The call chain lives in an explicit stack of activations: a call event suspends
    /// the caller's cursor, the callee runs on top, and its escaping exceptions are
    /// merged at the call site once it completes.
    fn visit(&mut self, desc: &MethodDesc, decision: PolicyDecision) -> Result<Arc<MethodEntry>> {
        let entry = self.finder.cache.method(desc.id);
        let Some(root) = self.activate(desc, decision)? else {
            return Ok(entry);
        };

        let finder = self.finder;
        let source: &dyn CodeSource = &*finder.source;
        let mut chain = vec![root];
        loop {
            let depth = chain.len();
            let Some(top) = chain.last_mut() else {
                break;
            };
            if let Some((offset, callee)) = top.waiting.take() {
                self.merge(top, offset, &callee)?;
            }

            let event = match top.cursor.as_mut() {
                Some(cursor) => cursor.next_event(source, &|| self.checkpoint())?,
                None => None,
            };

            match event {
                None => {
                    if let Some(done) = chain.pop() {
                        self.finish(done)?;
                    }
                }
                Some(InterpreterEvent::Throw(thrown)) => {
                    if escapes(finder, top, thrown.offset, &thrown) {
                        let site = thrown.offset;
                        top.entry.add_unhandled(Unhandled::new(thrown, site))?;
                    }
                }
                Some(InterpreterEvent::Call {
                    offset,
                    opcode,
                    callee,
                }) => {
                    let caller = top.entry.id();
                    let referencing = top
                        .cursor
                        .as_ref()
                        .map(|cursor| cursor.method().declaring_type.clone());
                    let decision = policy::evaluate(&callee, referencing.as_ref(), self.options);
                    if let PolicyDecision::Skip(reason) = decision {
                        log::debug!(
                            "{caller} IL_{offset:04x}: not descending into {callee} ({reason})"
                        );
                        continue;
                    }
                    top.entry.add_call(callee.id, offset)?;

                    if depth >= MAX_CALL_DEPTH {
                        log::warn!(
                            "{caller} IL_{offset:04x}: call chain deeper than {MAX_CALL_DEPTH} at {callee} ({opcode})"
                        );
                        return Err(Error::RecursionLimit(MAX_CALL_DEPTH));
                    }

                    match self.activate(&callee, decision)? {
                        Some(activation) => {
                            top.waiting = Some((offset, activation.entry.clone()));
                            chain.push(activation);
                        }
                        None => {
                            // already complete, or on the chain with partial results
                            let callee_entry = self.finder.cache.method(callee.id);
                            self.merge(top, offset, &callee_entry)?;
                        }
                    }
                }
            }
        }

        Ok(entry)
    }

    /// Starts `desc`, returning `None` if its entry was already started.
    fn activate(&mut self, desc: &MethodDesc, decision: PolicyDecision) -> Result<Option<Activation>> {
        let entry = self.finder.cache.method(desc.id);
        if !entry.try_start() {
            return Ok(None);
        }
        self.started.push(entry.clone());
        log::trace!("analysing {desc}");

        let mode = self.documentation_mode(decision);
        let documented = self.documented(desc, mode);
        entry.set_documented(documented.clone())?;

        let interprets = match mode {
            DocumentationMode::Never | DocumentationMode::Combine => true,
            DocumentationMode::Prefer => documented.is_empty(),
            DocumentationMode::Only => false,
        };
        let cursor = if interprets && !desc.is_bodyless() {
            self.body(desc).map(|body| Cursor::new(desc.clone(), body))
        } else {
            None
        };

        Ok(Some(Activation {
            entry,
            cursor,
            documented,
            waiting: None,
        }))
    }

    /// Adds the exceptions escaping `callee` that no handler around `offset` catches.
    fn merge(&self, caller: &Activation, offset: u32, callee: &MethodEntry) -> Result<()> {
        for thrown in callee.unhandled_exceptions()? {
            if escapes(self.finder, caller, offset, &thrown) {
                caller.entry.add_unhandled(Unhandled::new(thrown, offset))?;
            }
        }
        Ok(())
    }

    fn finish(&mut self, activation: Activation) -> Result<()> {
        for thrown in activation.documented {
            activation
                .entry
                .add_unhandled(Unhandled::new(thrown, DOCUMENTED_OFFSET))?;
        }
        self.complete(&activation.entry);
        Ok(())
    }

    fn complete(&mut self, entry: &Arc<MethodEntry>) {
        entry.set_state(AnalysisState::Complete);
        self.completed.push(entry.id());
        self.notifier.push(
            entry.id(),
            self.options.batch_size(),
            self.finder.sink.as_deref(),
        );
    }

    fn documentation_mode(&self, decision: PolicyDecision) -> DocumentationMode {
        if self.finder.docs.is_none() {
            DocumentationMode::Never
        } else if decision == PolicyDecision::DocumentedOnly {
            DocumentationMode::Only
        } else {
            self.options.documentation_mode
        }
    }

    fn documented(&self, desc: &MethodDesc, mode: DocumentationMode) -> Vec<ThrownException> {
        if mode == DocumentationMode::Never {
            return Vec::new();
        }
        let Some(docs) = &self.finder.docs else {
            return Vec::new();
        };

        match docs.exceptions(desc) {
            Ok(types) => types
                .into_iter()
                .map(|ty| ThrownException::documented(desc.id, ty))
                .collect(),
            Err(e) => {
                log::debug!("documentation lookup for {desc} failed: {e}");
                Vec::new()
            }
        }
    }

    fn body(&self, desc: &MethodDesc) -> Option<Arc<MethodBody>> {
        match self.finder.source.body(&desc.id) {
            Ok(body) => body,
            Err(e) => {
                log::debug!("body of {desc} cannot be decoded: {e}");
                None
            }
        }
    }
}

/// Returns `true` unless a handler of `activation`'s body around `offset` catches `thrown`.
fn escapes(
    finder: &ExceptionFinder,
    activation: &Activation,
    offset: u32,
    thrown: &ThrownException,
) -> bool {
    let Some(cursor) = &activation.cursor else {
        return true;
    };
    !is_caught(
        &cursor.body().handlers,
        &*finder.source,
        offset,
        &thrown.exception_type,
    )
}
