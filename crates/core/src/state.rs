//! The [Encoder]: owns every section buffer and label table, and drives the three passes.
//!
//! Passes 1 and 3 both walk the action list starting from a recorded re-entry offset; pass 3
//! doesn't take fresh arguments the way pass 1 does; instead it reads back the very values pass 1
//! persisted into the section buffer at each action site, in the same left-to-right order pass 1
//! wrote them, which is why the two loops are structured so similarly.

use log::{debug, trace};

use crate::action::{Action, ActionKind, ImmField, ESCAPE};
use crate::error::{EncodeError, Result};
use crate::imm::thumb_expand_imm;
use crate::labels::LabelTable;
use crate::reloc;
use crate::section::{BufPos, Section};

/// Resolves an external relocation (`REL_EXT`) to a target byte offset.
///
/// The default hook (installed when the caller doesn't supply one) always fails, since this
/// crate does not model an upstream multi-translation-unit linker.
pub trait ExternalRelocator {
    fn resolve(&self, symbol_id: u16) -> Result<i32>;
}

struct NoExternalRelocator;

impl ExternalRelocator for NoExternalRelocator {
    fn resolve(&self, symbol_id: u16) -> Result<i32> {
        Err(EncodeError::RangeRel(symbol_id as u32))
    }
}

pub struct Encoder<'a> {
    action_list: &'a [u16],
    sections: Vec<Section>,
    active: usize,
    lglabels: LabelTable,
    pclabels: LabelTable,
    globals: Vec<usize>,
    status: Option<EncodeError>,
}

impl<'a> Encoder<'a> {
    pub fn new(max_sections: u8) -> Self {
        let sections = (0..max_sections.max(1)).map(Section::new).collect();
        Encoder {
            action_list: &[],
            sections,
            active: 0,
            lglabels: LabelTable::new(20),
            pclabels: LabelTable::new(0),
            globals: Vec::new(),
            status: None,
        }
    }

    /// Installs the globals output array and sizes the local/global label table for ids up to
    /// `max_global_id`.
    pub fn setup_global(&mut self, max_global_id: u16) {
        self.globals = vec![0; max_global_id as usize + 1];
        self.lglabels.grow_to(crate::labels::GLOBAL_BIAS as usize + max_global_id as usize + 1);
    }

    /// Ensures the PC-label table holds at least `max_pc` ids.
    pub fn grow_pc(&mut self, max_pc: u16) {
        self.pclabels.grow_to(max_pc as usize);
    }

    /// Resets positions and label tables, selects section 0, and installs a new action list.
    pub fn setup(&mut self, action_list: &'a [u16]) {
        self.action_list = action_list;
        self.active = 0;
        self.status = None;
        self.lglabels.reset();
        self.pclabels.reset();
        for s in &mut self.sections {
            s.reset();
        }
        trace!("encoder reset with a {}-word action list", action_list.len());
    }

    fn fail<T>(&mut self, err: EncodeError) -> Result<T> {
        self.status = Some(err);
        Err(err)
    }

    fn active_mut(&mut self) -> &mut Section {
        &mut self.sections[self.active]
    }

    // ---- pass 1 ------------------------------------------------------------------------------

    /// Walks the action list from `start`, consuming `args` in action order, and records the
    /// encoded actions and label links needed by [Encoder::link] and [Encoder::encode].
    pub fn put(&mut self, start: u16, args: &[i32]) -> Result<()> {
        if let Some(e) = self.status {
            return Err(e);
        }

        let mut args = args.iter().copied();
        let list = self.action_list;
        let mut ip = start as usize;

        self.active_mut().reserve();
        self.active_mut().push(start as i32);

        loop {
            let word = list[ip];
            ip += 1;
            if word != ESCAPE {
                self.active_mut().ofs += 2;
                continue;
            }

            let action_word = list[ip];
            ip += 1;
            let action = match Action::decode(action_word) {
                Some(a) => a,
                None => return self.fail(EncodeError::RangeSec((action_word >> 12) as u32)),
            };

            self.active_mut().reserve();
            match action.kind {
                ActionKind::Stop => break,
                ActionKind::Section => {
                    let idx = action.payload as usize;
                    if idx >= self.sections.len() {
                        return self.fail(EncodeError::RangeSec(idx as u32));
                    }
                    self.active = idx;
                }
                ActionKind::Esc => {
                    ip += 1;
                    self.active_mut().ofs += 2;
                }
                ActionKind::RelExt => {}
                ActionKind::Align => {
                    let mask = action.payload as i32;
                    let ofs = self.active_mut().ofs;
                    self.active_mut().push(ofs);
                    self.active_mut().ofs += mask;
                }
                ActionKind::RelLg | ActionKind::RelPc => {
                    let is_pc = action.kind == ActionKind::RelPc;
                    let id = if is_pc {
                        match args.next() {
                            Some(v) => v as u16,
                            None => return self.fail(EncodeError::RangeI(action_word as u32)),
                        }
                    } else {
                        action.payload
                    };
                    let site = self.active_mut().pos();
                    let table = if is_pc { &mut self.pclabels } else { &mut self.lglabels };
                    let lookup = table.reference(id, site);
                    let lookup = match lookup {
                        Ok(l) => l,
                        Err(e) => return self.fail(e),
                    };
                    match lookup {
                        crate::labels::LabelLookup::Defined(def_slot) => {
                            self.active_mut().push(def_slot.0);
                        }
                        crate::labels::LabelLookup::Chained(prev) => {
                            self.active_mut().push(prev);
                        }
                    }
                }
                ActionKind::LabelLg | ActionKind::LabelPc => {
                    let is_pc = action.kind == ActionKind::LabelPc;
                    let id = if is_pc {
                        match args.next() {
                            Some(v) => v as u16,
                            None => return self.fail(EncodeError::RangeI(action_word as u32)),
                        }
                    } else {
                        action.payload
                    };
                    let ofs = self.active_mut().ofs;
                    let slot = self.active_mut().push(ofs);
                    let table = if is_pc { &mut self.pclabels } else { &mut self.lglabels };
                    let prior = match table.define(id, slot) {
                        Ok(p) => p,
                        Err(e) => return self.fail(e),
                    };
                    if let Some(head) = prior {
                        self.retarget_chain(head, slot.0);
                    }
                    debug!("label {id} (pc={is_pc}) defined at ofs {ofs}");
                }
                ActionKind::Imm => {
                    let n = match args.next() {
                        Some(v) => v,
                        None => return self.fail(EncodeError::RangeI(action_word as u32)),
                    };
                    let field = ImmField::from_payload(action.payload);
                    if let Err(e) = check_imm_range(field, n) {
                        return self.fail(e);
                    }
                    self.active_mut().push(n);
                }
                ActionKind::ImmShift => {
                    let n = match args.next() {
                        Some(v) => v,
                        None => return self.fail(EncodeError::RangeI(action_word as u32)),
                    };
                    if !(0..=31).contains(&n) {
                        return self.fail(EncodeError::RangeI(action_word as u32));
                    }
                    self.active_mut().push(n);
                }
                ActionKind::ImmLong => {
                    let n = match args.next() {
                        Some(v) => v,
                        None => return self.fail(EncodeError::RangeI(action_word as u32)),
                    };
                    if !(0..=0xFFFF).contains(&n) {
                        return self.fail(EncodeError::RangeI(action_word as u32));
                    }
                    self.active_mut().push(n);
                }
                ActionKind::ImmThumb => {
                    let n = match args.next() {
                        Some(v) => v,
                        None => return self.fail(EncodeError::RangeI(action_word as u32)),
                    };
                    if thumb_expand_imm(n as u32).is_none() {
                        return self.fail(EncodeError::RangeI(action_word as u32));
                    }
                    self.active_mut().push(n);
                }
            }
        }

        debug_assert_eq!(self.active_mut().ofs % 2, 0);
        Ok(())
    }

    /// Retargets every site in the chain rooted at `head` to point at `resolved`, following each
    /// site's stored "previous head" link until it bottoms out at `0`.
    fn retarget_chain(&mut self, head: i32, resolved: i32) {
        let mut pos = head;
        while pos > 0 {
            let bp = BufPos(pos);
            let sec = bp.section() as usize;
            let local = bp.local();
            let next = self.sections[sec].get(local);
            self.sections[sec].set(local, resolved);
            pos = next;
        }
    }

    /// Walks a still-pending global label's reference chain, writing `-id` into every site
    /// instead of a resolved offset. `encode`'s `REL_LG` handling treats any non-positive slot
    /// as unresolved, so this defers the failure to pass 3 rather than raising it here.
    fn mark_external(&mut self, id: u16) {
        let mut pos = self.lglabels.raw(id);
        while pos > 0 {
            let bp = BufPos(pos);
            let sec = bp.section() as usize;
            let local = bp.local();
            let next = self.sections[sec].get(local);
            self.sections[sec].set(local, -(id as i32));
            pos = next;
        }
    }

    // ---- pass 2 --------------------------------------------------------------------------------

    /// Resolves alignment slack and label offsets, and returns the final code size.
    pub fn link(&mut self) -> Result<usize> {
        if let Some(e) = self.status {
            return Err(e);
        }

        for id in 0..self.pclabels.len() as u16 {
            if self.pclabels.is_pending(id) {
                return self.fail(EncodeError::UndefPc(id as u32));
            }
        }
        // Local and reserved ids (1..=RESERVED_MAX) aren't in scope here: a pending local label
        // is a caller bug caught earlier by `checkstep`, not a link-time condition. Only globals
        // still holding a chain get converted to an external-resolution marker, deferring the
        // failure to `encode`.
        for id in crate::labels::GLOBAL_BIAS..self.lglabels.len() as u16 {
            if self.lglabels.is_pending(id) {
                self.mark_external(id);
            }
        }

        let mut total_ofs: i32 = 0;
        for sec_idx in 0..self.sections.len() {
            let local_len = self.sections[sec_idx].local_pos();
            let mut local = 0i32;
            while local < local_len {
                let start = self.sections[sec_idx].get(local) as u16;
                local += 1;
                local = match self.replay_link(sec_idx, start, local, &mut total_ofs) {
                    Ok(l) => l,
                    Err(e) => return self.fail(e),
                };
            }
        }
        trace!("link produced codesize {total_ofs}");
        Ok(total_ofs as usize)
    }

    /// Replays one `put` chunk (from `start`) for pass 2's bookkeeping, returning the buffer
    /// cursor just past this chunk's STOP.
    fn replay_link(
        &mut self,
        sec_idx: usize,
        start: u16,
        mut local: i32,
        total_ofs: &mut i32,
    ) -> Result<i32> {
        let list = self.action_list;
        let mut ip = start as usize;
        loop {
            let word = list[ip];
            ip += 1;
            if word != ESCAPE {
                continue;
            }
            let action_word = list[ip];
            ip += 1;
            let action = Action::decode(action_word).ok_or(EncodeError::RangeSec(0))?;
            match action.kind {
                ActionKind::Stop => break,
                ActionKind::Section => {}
                ActionKind::Esc => {
                    ip += 1;
                }
                ActionKind::RelExt => {}
                ActionKind::Align => {
                    let mask = action.payload as i32;
                    let estimate = self.sections[sec_idx].get(local);
                    local += 1;
                    let slack = (estimate + *total_ofs) & mask;
                    *total_ofs -= slack;
                }
                ActionKind::RelLg | ActionKind::RelPc => {
                    local += 1;
                }
                ActionKind::LabelLg | ActionKind::LabelPc => {
                    let estimate = self.sections[sec_idx].get(local);
                    self.sections[sec_idx].set(local, estimate + *total_ofs);
                    local += 1;
                }
                ActionKind::Imm
                | ActionKind::ImmShift
                | ActionKind::ImmLong
                | ActionKind::ImmThumb => {
                    local += 1;
                }
            }
        }
        *total_ofs += self.sections[sec_idx].ofs;
        Ok(local)
    }

    // ---- pass 3 --------------------------------------------------------------------------------

    /// Writes final Thumb-2 half-words into `dest` (sized to the `codesize` [Encoder::link]
    /// returned), using a no-op external relocator.
    pub fn encode(&mut self, dest: &mut [u16]) -> Result<()> {
        self.encode_with(dest, &NoExternalRelocator)
    }

    pub fn encode_with(&mut self, dest: &mut [u16], ext: &dyn ExternalRelocator) -> Result<()> {
        if let Some(e) = self.status {
            return Err(e);
        }

        let base = 0usize;
        let mut cursor = base;
        for sec_idx in 0..self.sections.len() {
            let local_len = self.sections[sec_idx].local_pos();
            let mut local = 0i32;
            while local < local_len {
                let start = self.sections[sec_idx].get(local) as u16;
                local += 1;
                local = match self.replay_encode(sec_idx, start, local, dest, &mut cursor, base, ext) {
                    Ok(l) => l,
                    Err(e) => return self.fail(e),
                };
            }
        }

        if cursor != dest.len() {
            return self.fail(EncodeError::Phase);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn replay_encode(
        &mut self,
        sec_idx: usize,
        start: u16,
        mut local: i32,
        dest: &mut [u16],
        cursor: &mut usize,
        base: usize,
        ext: &dyn ExternalRelocator,
    ) -> Result<i32> {
        let list = self.action_list;
        let mut ip = start as usize;
        loop {
            let word = list[ip];
            ip += 1;
            if word != ESCAPE {
                dest[*cursor] = word;
                *cursor += 1;
                continue;
            }

            let action_word = list[ip];
            ip += 1;
            let action = Action::decode(action_word).ok_or(EncodeError::RangeSec(0))?;
            match action.kind {
                ActionKind::Stop => break,
                ActionKind::Section => {}
                ActionKind::Esc => {
                    dest[*cursor] = list[ip];
                    ip += 1;
                    *cursor += 1;
                }
                ActionKind::RelExt => {
                    let n = ext.resolve(action.payload)?;
                    self.patch_out(dest, *cursor, n)?;
                }
                ActionKind::Align => {
                    // The pass-1 estimate was only needed by pass 2's slack computation.
                    local += 1;
                    let align_bytes = action.payload as usize + 1;
                    let align_halfwords = (align_bytes / 2).max(1);
                    while *cursor % align_halfwords != 0 {
                        dest[*cursor] = 0xBF00;
                        *cursor += 1;
                    }
                }
                ActionKind::RelLg | ActionKind::RelPc => {
                    let v = self.sections[sec_idx].get(local);
                    local += 1;
                    if v <= 0 {
                        return Err(EncodeError::UndefLg(v.unsigned_abs()));
                    }
                    let def_slot = BufPos(v);
                    let label_offset =
                        self.sections[def_slot.section() as usize].get(def_slot.local());
                    let n = label_offset - (*cursor as i32 - base as i32) - 4;
                    self.patch_out(dest, *cursor, n)?;
                }
                ActionKind::LabelLg => {
                    let resolved_ofs = self.sections[sec_idx].get(local);
                    local += 1;
                    if crate::labels::is_global(action.payload) {
                        let idx = (action.payload - crate::labels::GLOBAL_BIAS) as usize;
                        if idx < self.globals.len() {
                            self.globals[idx] = base + resolved_ofs as usize;
                        }
                    }
                }
                ActionKind::LabelPc => {
                    local += 1;
                }
                ActionKind::Imm => {
                    let n = self.sections[sec_idx].get(local);
                    local += 1;
                    let field = ImmField::from_payload(action.payload);
                    patch_imm(dest, *cursor, field, n)?;
                }
                ActionKind::ImmLong => {
                    let n = self.sections[sec_idx].get(local);
                    local += 1;
                    patch_imm_long(dest, *cursor, n as u32)?;
                }
                ActionKind::ImmThumb => {
                    let n = self.sections[sec_idx].get(local);
                    local += 1;
                    let field = thumb_expand_imm(n as u32).ok_or(EncodeError::RangeI(n as u32))?;
                    patch_imm_long_field(dest, *cursor, field);
                }
                ActionKind::ImmShift => {
                    let n = self.sections[sec_idx].get(local);
                    local += 1;
                    patch_imm_shift(dest, *cursor, n);
                }
            }
        }
        Ok(local)
    }

    fn patch_out(&self, dest: &mut [u16], cursor: usize, n: i32) -> Result<()> {
        reloc::patch(dest, cursor, n)
    }

    /// Returns the byte offset of a defined PC label, `-1` if undefined, `-2` if `pc_id` is out
    /// of range.
    pub fn get_pclabel(&self, pc_id: u16) -> i32 {
        if pc_id as usize >= self.pclabels.len() {
            return -2;
        }
        match self.pclabels.definition(pc_id) {
            Some(def_slot) => self.sections[def_slot.section() as usize].get(def_slot.local()),
            None => -1,
        }
    }

    /// Debug sanity check: the active section matches `expected_section`, and no local label
    /// (1..=9) is still a pending forward reference.
    pub fn checkstep(&mut self, expected_section: u8) -> Result<()> {
        if self.active != expected_section as usize {
            let err = EncodeError::MatchSec(expected_section as u32);
            self.status = Some(err);
            return Err(err);
        }
        for id in 1..=crate::labels::LOCAL_MAX {
            if self.lglabels.is_pending(id) {
                let err = EncodeError::UndefLg(id as u32);
                self.status = Some(err);
                return Err(err);
            }
        }
        Ok(())
    }
}

fn check_imm_range(field: ImmField, n: i32) -> Result<()> {
    let max = field.max_magnitude();
    if field.signed != 0 {
        let mag = n.unsigned_abs() as i64;
        if field.scale != 0 && mag % (1i64 << field.scale) != 0 {
            return Err(EncodeError::RangeI(n as u32));
        }
        let scaled = mag >> field.scale;
        if scaled > max as i64 {
            return Err(EncodeError::RangeI(n as u32));
        }
    } else {
        let mag = n as i64;
        if mag < 0 || (field.scale != 0 && mag % (1i64 << field.scale) != 0) {
            return Err(EncodeError::RangeI(n as u32));
        }
        if (mag >> field.scale) > max as i64 {
            return Err(EncodeError::RangeI(n as u32));
        }
    }
    Ok(())
}

fn patch_imm(dest: &mut [u16], cursor: usize, field: ImmField, n: i32) -> Result<()> {
    let mut mag = n;
    if field.signed != 0 && n < 0 {
        mag = -n;
        if field.signed == 2 {
            dest[cursor - 2] |= 1 << 7;
        } else {
            dest[cursor - 1] |= 1 << 9;
        }
    }
    let scaled = (mag as u32) >> field.scale;
    let mask = (1u32 << field.bits) - 1;
    let bits = (scaled & mask) << field.shift;
    dest[cursor - 1] |= bits as u16;
    Ok(())
}

fn patch_imm_long(dest: &mut [u16], cursor: usize, n: u32) -> Result<()> {
    let i = (n >> 11) & 1;
    let imm3 = (n >> 8) & 0x7;
    let imm8 = n & 0xFF;
    dest[cursor - 2] |= (i as u16) << 10;
    dest[cursor - 1] |= (imm3 as u16) << 12;
    dest[cursor - 1] |= imm8 as u16;
    Ok(())
}

fn patch_imm_long_field(dest: &mut [u16], cursor: usize, field: u16) {
    patch_imm_long(dest, cursor, field as u32).ok();
}

fn patch_imm_shift(dest: &mut [u16], cursor: usize, n: i32) {
    let n = n as u32;
    dest[cursor - 1] |= (((n >> 2) & 0x7) as u16) << 12;
    dest[cursor - 1] |= ((n & 0x3) as u16) << 6;
}
