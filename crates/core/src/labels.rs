//! Label tables: local/global label ids and PC-label ids, each backed by a flat array whose
//! entries double as forward-reference chain heads or resolved definitions.
//!
//! An entry's sign carries its meaning:
//! - `0`: unused, never referenced or defined.
//! - `> 0`: a forward-reference chain head — the [crate::section::BufPos] packed value of the
//!   most recently recorded pending reference.
//! - `< 0`: a definition — the negation of the packed definition position.
//!
//! A chain and a definition never coexist for one id: defining a label walks and collapses any
//! existing chain, overwriting it with the (negated) definition.

use crate::error::{EncodeError, Result};
use crate::section::BufPos;

/// The outcome of recording a reference to a label id via [LabelTable::reference].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelLookup {
    /// The label is already defined; the payload is its def-slot position.
    Defined(BufPos),
    /// The label isn't defined yet; the payload is the prior chain head (`0` if this is the
    /// first reference), to be stored at the reference site as the "previous head" link.
    Chained(i32),
}

/// Ids `1..=9` are local labels, freely rebound. Ids `10..=19` are reserved (chain/definition
/// bookkeeping only, no external visibility). Ids `>= GLOBAL_BIAS` are globals, written out to
/// the caller's globals array at `id - GLOBAL_BIAS` once defined.
pub const LOCAL_MAX: u16 = 9;
pub const RESERVED_MAX: u16 = 19;
pub const GLOBAL_BIAS: u16 = RESERVED_MAX + 1;

#[derive(Debug, Default)]
pub struct LabelTable {
    entries: Vec<i32>,
}

impl LabelTable {
    pub fn new(capacity: usize) -> Self {
        LabelTable { entries: vec![0; capacity] }
    }

    pub fn grow_to(&mut self, min_len: usize) {
        if self.entries.len() < min_len {
            self.entries.resize(min_len, 0);
        }
    }

    pub fn reset(&mut self) {
        for e in &mut self.entries {
            *e = 0;
        }
    }

    fn check_id(&self, id: u16) -> Result<usize> {
        let idx = id as usize;
        if idx >= self.entries.len() {
            return Err(EncodeError::RangeLg(id as u32));
        }
        Ok(idx)
    }

    /// Records a reference to `id` at `site`. If `id` is already defined, returns the def-slot
    /// position to patch against immediately. Otherwise threads `site` onto the existing chain
    /// (or starts a new one, if this is the first reference) and returns the prior raw entry
    /// (`0` if there wasn't one) so the caller can store it at `site` as the chain's "previous
    /// head" link.
    pub fn reference(&mut self, id: u16, site: BufPos) -> Result<LabelLookup> {
        let idx = self.check_id(id)?;
        let entry = self.entries[idx];
        if entry < 0 {
            return Ok(LabelLookup::Defined(BufPos(-entry)));
        }
        self.entries[idx] = site.0;
        Ok(LabelLookup::Chained(entry))
    }

    /// Defines `id` at `site`, returning the prior chain head (a positive raw entry), if any, so
    /// the caller can walk and retarget it.
    pub fn define(&mut self, id: u16, site: BufPos) -> Result<Option<i32>> {
        let idx = self.check_id(id)?;
        let entry = self.entries[idx];
        self.entries[idx] = -site.0;
        if entry > 0 {
            Ok(Some(entry))
        } else {
            Ok(None)
        }
    }

    /// `Some(pos)` if `id` is defined, `None` if it's unused or still a pending chain.
    pub fn definition(&self, id: u16) -> Option<BufPos> {
        let entry = *self.entries.get(id as usize)?;
        if entry < 0 {
            Some(BufPos(-entry))
        } else {
            None
        }
    }

    /// True if `id` still holds an unresolved forward-reference chain.
    pub fn is_pending(&self, id: u16) -> bool {
        matches!(self.entries.get(id as usize), Some(&v) if v > 0)
    }

    pub fn raw(&self, id: u16) -> i32 {
        self.entries.get(id as usize).copied().unwrap_or(0)
    }

    pub fn set_raw(&mut self, id: u16, value: i32) -> Result<()> {
        let idx = self.check_id(id)?;
        self.entries[idx] = value;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn is_global(id: u16) -> bool {
    id >= GLOBAL_BIAS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_before_definition_threads_a_chain() {
        let mut t = LabelTable::new(32);
        let site_a = BufPos::new(0, 4);
        let site_b = BufPos::new(0, 10);

        assert_eq!(t.reference(5, site_a).unwrap(), LabelLookup::Chained(0));
        assert!(t.is_pending(5));
        assert_eq!(t.reference(5, site_b).unwrap(), LabelLookup::Chained(site_a.0));
        // The chain head is now site_b; site_b's slot (in the real buffer) would hold site_a's
        // packed value so the chain can be walked later — that wiring is the encoder's job.
        assert_eq!(t.raw(5), site_b.0);
    }

    #[test]
    fn reference_after_definition_returns_definition_immediately() {
        let mut t = LabelTable::new(32);
        let def_site = BufPos::new(0, 2);
        t.define(7, def_site).unwrap();

        let resolved = t.reference(7, BufPos::new(0, 99)).unwrap();
        assert_eq!(resolved, LabelLookup::Defined(def_site));
    }

    #[test]
    fn define_returns_prior_chain_head_for_retargeting() {
        let mut t = LabelTable::new(32);
        let pending = BufPos::new(0, 3);
        t.reference(1, pending).unwrap();

        let prior = t.define(1, BufPos::new(0, 50)).unwrap();
        assert_eq!(prior, Some(pending.0));
        assert_eq!(t.definition(1), Some(BufPos::new(0, 50)));
        assert!(!t.is_pending(1));
    }

    #[test]
    fn out_of_range_id_is_a_range_error() {
        let mut t = LabelTable::new(4);
        assert_eq!(t.reference(99, BufPos::new(0, 0)), Err(EncodeError::RangeLg(99)));
    }
}
