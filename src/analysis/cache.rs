//! Memoized per-method and per-class analysis records.
//!
//! Every callable unit the analysis touches gets exactly one [`MethodEntry`] per cache
//! generation, keyed by its [`MethodId`]. The entry carries a completion state machine
//! (`NotStarted -> Analysing -> Complete`) which doubles as the cycle breaker of the
//! driver: a method found `Analysing` is on the current call chain and is not
//! re-entered.
//!
//! # Thread Safety
//!
//! Entries are only written by the thread running an analysis pass (which holds the
//! finder's analysis lock). Readers may inspect any entry at any time; results are
//! authoritative only once the entry reports [`AnalysisState::Complete`].

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc, RwLock,
    },
};

use dashmap::DashMap;
use serde::Serialize;
use strum::Display;

use crate::{
    analysis::thrown::{ThrownException, Unhandled, DOCUMENTED_OFFSET},
    metadata::identity::{ClassId, MethodId},
    Result,
};

/// Completion state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum AnalysisState {
    /// Never analyzed, or invalidated
    NotStarted = 0,
    /// On the current analysis call chain
    Analysing = 1,
    /// Results are authoritative
    Complete = 2,
}

impl AnalysisState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => AnalysisState::Analysing,
            2 => AnalysisState::Complete,
            _ => AnalysisState::NotStarted,
        }
    }
}

/// Mutable part of a [`MethodEntry`].
#[derive(Debug, Default)]
struct MethodData {
    called_methods: Vec<MethodId>,
    call_sites: HashMap<MethodId, Vec<u32>>,
    unhandled: Vec<Unhandled>,
    seen: HashSet<Unhandled>,
    documented: Vec<ThrownException>,
}

/// The analysis record of one method, constructor or accessor.
#[derive(Debug)]
pub struct MethodEntry {
    id: MethodId,
    state: AtomicU8,
    data: RwLock<MethodData>,
}

impl MethodEntry {
    fn new(id: MethodId) -> Self {
        MethodEntry {
            id,
            state: AtomicU8::new(AnalysisState::NotStarted as u8),
            data: RwLock::new(MethodData::default()),
        }
    }

    /// Identity of the method.
    #[must_use]
    pub fn id(&self) -> MethodId {
        self.id
    }

    /// Current completion state.
    #[must_use]
    pub fn state(&self) -> AnalysisState {
        AnalysisState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` once results are authoritative.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state() == AnalysisState::Complete
    }

    /// Statically resolved callees in call-site encounter order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the entry's lock was poisoned.
    pub fn called_methods(&self) -> Result<Vec<MethodId>> {
        with_read!(self.data, |data: &MethodData| data.called_methods.clone())
    }

    /// Returns `true` if `callee` is a direct callee.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the entry's lock was poisoned.
    pub fn calls(&self, callee: MethodId) -> Result<bool> {
        with_read!(self.data, |data: &MethodData| data
            .call_sites
            .contains_key(&callee))
    }

    /// Offsets of every call instruction targeting `callee`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the entry's lock was poisoned.
    pub fn call_sites(&self, callee: MethodId) -> Result<Vec<u32>> {
        with_read!(self.data, |data: &MethodData| data
            .call_sites
            .get(&callee)
            .cloned()
            .unwrap_or_default())
    }

    /// Every occurrence of an exception escaping this method, with its escape site.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the entry's lock was poisoned.
    pub fn unhandled(&self) -> Result<Vec<Unhandled>> {
        with_read!(self.data, |data: &MethodData| data.unhandled.clone())
    }

    /// Distinct exceptions escaping this method, compared by thrower and type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the entry's lock was poisoned.
    pub fn unhandled_exceptions(&self) -> Result<Vec<ThrownException>> {
        with_read!(self.data, |data: &MethodData| distinct(
            data.unhandled.iter().map(|u| &u.thrown)
        ))
    }

    /// Returns `true` if some escaping exception matches `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the entry's lock was poisoned.
    pub fn any_unhandled<F>(&self, predicate: F) -> Result<bool>
    where
        F: Fn(&ThrownException) -> bool,
    {
        with_read!(self.data, |data: &MethodData| data
            .unhandled
            .iter()
            .any(|u| predicate(&u.thrown)))
    }

    /// Exceptions attributed to this method by documentation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the entry's lock was poisoned.
    pub fn documented_exceptions(&self) -> Result<Vec<ThrownException>> {
        with_read!(self.data, |data: &MethodData| data.documented.clone())
    }

    /// Offsets in this method at which `thrown` escapes: its own throw offsets, or the
    /// call sites through which it arrives. Documentation-only occurrences have no offset.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the entry's lock was poisoned.
    pub fn escape_offsets(&self, thrown: &ThrownException) -> Result<Vec<u32>> {
        with_read!(self.data, |data: &MethodData| {
            let mut offsets: Vec<u32> = data
                .unhandled
                .iter()
                .filter(|u| &u.thrown == thrown && u.site != DOCUMENTED_OFFSET)
                .map(|u| u.site)
                .collect();
            offsets.sort_unstable();
            offsets.dedup();
            offsets
        })
    }

    pub(crate) fn set_state(&self, state: AnalysisState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Moves `NotStarted -> Analysing`. Returns `false` if the entry was already started.
    pub(crate) fn try_start(&self) -> bool {
        self.state
            .compare_exchange(
                AnalysisState::NotStarted as u8,
                AnalysisState::Analysing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Records a call site; the callee is added to the called methods on first sight.
    pub(crate) fn add_call(&self, callee: MethodId, offset: u32) -> Result<()> {
        let mut data = write_lock!(self.data)?;
        let sites = data.call_sites.entry(callee).or_default();
        let first = sites.is_empty();
        if !sites.contains(&offset) {
            sites.push(offset);
        }
        if first {
            data.called_methods.push(callee);
        }
        Ok(())
    }

    /// Adds an escaping occurrence unless it is already present.
    pub(crate) fn add_unhandled(&self, occurrence: Unhandled) -> Result<bool> {
        let mut data = write_lock!(self.data)?;
        if data.seen.insert(occurrence.clone()) {
            data.unhandled.push(occurrence);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) fn set_documented(&self, documented: Vec<ThrownException>) -> Result<()> {
        let mut data = write_lock!(self.data)?;
        data.documented = documented;
        Ok(())
    }

    /// Drops all results and returns to `NotStarted`.
    pub(crate) fn clear(&self) -> Result<()> {
        let mut data = write_lock!(self.data)?;
        *data = MethodData::default();
        drop(data);
        self.set_state(AnalysisState::NotStarted);
        Ok(())
    }
}

/// Mutable part of a [`ClassEntry`].
#[derive(Debug, Default)]
struct ClassData {
    members: Vec<MethodId>,
    called_methods: Vec<MethodId>,
    unhandled: Vec<ThrownException>,
    documented: Vec<ThrownException>,
}

/// The aggregated analysis record of one type: unions over its own members.
#[derive(Debug)]
pub struct ClassEntry {
    id: ClassId,
    state: AtomicU8,
    data: RwLock<ClassData>,
}

impl ClassEntry {
    fn new(id: ClassId) -> Self {
        ClassEntry {
            id,
            state: AtomicU8::new(AnalysisState::NotStarted as u8),
            data: RwLock::new(ClassData::default()),
        }
    }

    /// Identity of the class.
    #[must_use]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Current completion state. A class completes when all of its members complete.
    #[must_use]
    pub fn state(&self) -> AnalysisState {
        AnalysisState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` once results are authoritative.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state() == AnalysisState::Complete
    }

    /// Members whose results were aggregated.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the entry's lock was poisoned.
    pub fn members(&self) -> Result<Vec<MethodId>> {
        with_read!(self.data, |data: &ClassData| data.members.clone())
    }

    /// Union of the members' called methods.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the entry's lock was poisoned.
    pub fn called_methods(&self) -> Result<Vec<MethodId>> {
        with_read!(self.data, |data: &ClassData| data.called_methods.clone())
    }

    /// Union of the members' escaping exceptions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the entry's lock was poisoned.
    pub fn unhandled_exceptions(&self) -> Result<Vec<ThrownException>> {
        with_read!(self.data, |data: &ClassData| data.unhandled.clone())
    }

    /// Union of the members' documented exceptions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the entry's lock was poisoned.
    pub fn documented_exceptions(&self) -> Result<Vec<ThrownException>> {
        with_read!(self.data, |data: &ClassData| data.documented.clone())
    }

    pub(crate) fn set_state(&self, state: AnalysisState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Replaces the aggregate with the union over `members`.
    pub(crate) fn aggregate(&self, members: &[Arc<MethodEntry>]) -> Result<()> {
        let mut called = Vec::new();
        let mut called_seen = HashSet::new();
        let mut unhandled = Vec::new();
        let mut documented = Vec::new();

        for member in members {
            for callee in member.called_methods()? {
                if called_seen.insert(callee) {
                    called.push(callee);
                }
            }
            unhandled.extend(member.unhandled_exceptions()?);
            documented.extend(member.documented_exceptions()?);
        }

        let mut data = write_lock!(self.data)?;
        data.members = members.iter().map(|m| m.id()).collect();
        data.called_methods = called;
        data.unhandled = distinct(unhandled.iter());
        data.documented = distinct(documented.iter());
        Ok(())
    }

    pub(crate) fn clear(&self) -> Result<()> {
        let mut data = write_lock!(self.data)?;
        *data = ClassData::default();
        drop(data);
        self.set_state(AnalysisState::NotStarted);
        Ok(())
    }
}

/// Counts describing the current contents of an [`AnalysisCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    /// Cache generation, incremented on every reset
    pub generation: u64,
    /// Method entries not yet analyzed
    pub not_started: usize,
    /// Method entries on an unfinished call chain
    pub analysing: usize,
    /// Method entries with authoritative results
    pub complete: usize,
    /// Completed class entries
    pub classes_complete: usize,
    /// Escaping occurrences over all method entries
    pub unhandled_occurrences: usize,
}

/// The method and class entry maps of one analysis context.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    methods: DashMap<MethodId, Arc<MethodEntry>>,
    classes: DashMap<ClassId, Arc<ClassEntry>>,
    generation: AtomicU64,
}

impl AnalysisCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `id`, creating it on first reference.
    ///
    /// Repeated lookups of the same id within a generation return the same entry.
    #[must_use]
    pub fn method(&self, id: MethodId) -> Arc<MethodEntry> {
        self.methods
            .entry(id)
            .or_insert_with(|| Arc::new(MethodEntry::new(id)))
            .value()
            .clone()
    }

    /// Returns the entry for `id` if it was ever referenced.
    #[must_use]
    pub fn get_method(&self, id: MethodId) -> Option<Arc<MethodEntry>> {
        self.methods.get(&id).map(|entry| entry.value().clone())
    }

    /// Returns the class entry for `id`, creating it on first reference.
    #[must_use]
    pub fn class(&self, id: ClassId) -> Arc<ClassEntry> {
        self.classes
            .entry(id)
            .or_insert_with(|| Arc::new(ClassEntry::new(id)))
            .value()
            .clone()
    }

    /// Returns the class entry for `id` if it was ever referenced.
    #[must_use]
    pub fn get_class(&self, id: ClassId) -> Option<Arc<ClassEntry>> {
        self.classes.get(&id).map(|entry| entry.value().clone())
    }

    /// Number of method entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns `true` if no method was referenced yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Current generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Invalidates everything.
    ///
    /// Entries still held by readers revert to `NotStarted` with empty results, then both
    /// maps are emptied and the generation advances.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if an entry's lock was poisoned.
    pub fn reset(&self) -> Result<()> {
        let methods: Vec<Arc<MethodEntry>> =
            self.methods.iter().map(|e| e.value().clone()).collect();
        for entry in methods {
            entry.clear()?;
        }
        let classes: Vec<Arc<ClassEntry>> =
            self.classes.iter().map(|e| e.value().clone()).collect();
        for entry in classes {
            entry.clear()?;
        }

        self.methods.clear();
        self.classes.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Counts entries per state.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if an entry's lock was poisoned.
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats {
            generation: self.generation(),
            ..CacheStats::default()
        };

        let methods: Vec<Arc<MethodEntry>> =
            self.methods.iter().map(|e| e.value().clone()).collect();
        for entry in methods {
            match entry.state() {
                AnalysisState::NotStarted => stats.not_started += 1,
                AnalysisState::Analysing => stats.analysing += 1,
                AnalysisState::Complete => stats.complete += 1,
            }
            stats.unhandled_occurrences += with_read!(entry.data, |data: &MethodData| data
                .unhandled
                .len())?;
        }
        stats.classes_complete = self
            .classes
            .iter()
            .filter(|e| e.value().is_complete())
            .count();

        Ok(stats)
    }
}

/// Deduplicates exceptions by thrower and type, keeping first occurrences in order.
fn distinct<'a>(items: impl Iterator<Item = &'a ThrownException>) -> Vec<ThrownException> {
    let mut seen = HashSet::new();
    items
        .filter(|thrown| seen.insert(*thrown))
        .cloned()
        .collect()
}
