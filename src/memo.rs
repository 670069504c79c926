//! Session-scoped cache of gate pre-activations.
//!
//! Both sides of the factorized cell cost O(n_h × n_f) per gate. Within one
//! request the input side only depends on the token, and within one round
//! the hidden side only depends on which expansion produced the state, so
//! both are shared across beam branches. Entries are keyed by
//! `(ensemble member, identity)`. An identity of `None` marks the start
//! step and is never stored.

use std::collections::HashMap;
use std::rc::Rc;

use crate::state::GatePreacts;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheCounts {
    pub hits: usize,
    pub misses: usize,
}

/// Lookup counts since the last [`StepMemo::begin_request`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoStats {
    pub input: CacheCounts,
    pub hidden: CacheCounts,
}

#[derive(Debug)]
pub struct StepMemo {
    enabled: bool,
    /// lives for a whole request
    by_token: HashMap<(usize, usize), Rc<GatePreacts>>,
    /// lives for one expansion round
    by_slot: HashMap<(usize, usize), Rc<GatePreacts>>,
    stats: MemoStats,
}

impl StepMemo {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            by_token: HashMap::new(),
            by_slot: HashMap::new(),
            stats: MemoStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Drops everything, counts included; call before a new request.
    pub fn begin_request(&mut self) {
        self.by_token.clear();
        self.by_slot.clear();
        self.stats = MemoStats::default();
    }

    /// Drops hidden-side entries; call at every round boundary.
    pub fn begin_round(&mut self) {
        self.by_slot.clear();
    }

    pub fn input_side<F>(
        &mut self,
        member: usize,
        token: Option<usize>,
        compute: F,
    ) -> Rc<GatePreacts>
    where
        F: FnOnce() -> GatePreacts,
    {
        Self::lookup(
            self.enabled,
            &mut self.by_token,
            &mut self.stats.input,
            member,
            token,
            compute,
        )
    }

    pub fn hidden_side<F>(
        &mut self,
        member: usize,
        slot: Option<usize>,
        compute: F,
    ) -> Rc<GatePreacts>
    where
        F: FnOnce() -> GatePreacts,
    {
        Self::lookup(
            self.enabled,
            &mut self.by_slot,
            &mut self.stats.hidden,
            member,
            slot,
            compute,
        )
    }

    pub fn stats(&self) -> MemoStats {
        self.stats
    }

    fn lookup<F>(
        enabled: bool,
        table: &mut HashMap<(usize, usize), Rc<GatePreacts>>,
        stats: &mut CacheCounts,
        member: usize,
        id: Option<usize>,
        compute: F,
    ) -> Rc<GatePreacts>
    where
        F: FnOnce() -> GatePreacts,
    {
        let key = match id {
            Some(id) if enabled => (member, id),
            _ => return Rc::new(compute()),
        };
        if let Some(hit) = table.get(&key) {
            stats.hits += 1;
            return Rc::clone(hit);
        }
        stats.misses += 1;
        let value = Rc::new(compute());
        table.insert(key, Rc::clone(&value));
        value
    }
}
