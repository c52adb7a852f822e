//! Thumb-2 "modified immediate" constant encoders.
//!
//! Thumb-2 data-processing instructions that accept an immediate operand (`AND`, `ORR`, `ADD`,
//! `MOV`, ...) don't take an arbitrary 32-bit value. They take a 12-bit field that expands to one
//! of a handful of bit patterns: Table A5-11 of the ARM Architecture Reference Manual. This module
//! has two encoders for that field, used at different points in the pipeline:
//!
//! - [thumb_expand_imm] implements Table A5-11 directly: it checks each of the five patterns (a
//!   bare byte, two replicated-byte forms, and a rotated byte with an implicit leading one) in
//!   turn and returns the first match. Used by pass 3 to validate an `IMMTHUMB` action.
//! - [k12] implements the coarser constant folder the high-level data-processing helpers use: it
//!   only tries the bare-byte and rotated-byte patterns (the two an instruction selector can reach
//!   for just about any "load this constant into a register" call site), and on failure retries
//!   against the bitwise complement or arithmetic negation of the value, trying every inverse
//!   instruction that could stand in for the original one (`ADD` via `SUB`, `AND` via `BIC`, and
//!   so on).

/// One of the five patterns a 12-bit modified-immediate field can expand to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    /// `00000000 00000000 00000000 abcdefgh`
    Bare,
    /// `00000000 abcdefgh 00000000 abcdefgh`
    Repeat16,
    /// `abcdefgh 00000000 abcdefgh 00000000`
    Repeat16Shifted,
    /// `abcdefgh abcdefgh abcdefgh abcdefgh`
    Repeat8,
}

/// Expands a 12-bit modified-immediate field (as found in a Thumb-2 instruction's
/// `i:imm3:imm8` bits) to the 32-bit constant it represents.
///
/// `imm12` must fit in 12 bits; any higher bits are ignored.
pub fn thumb_expand_imm_decode(imm12: u16) -> u32 {
    let imm12 = (imm12 & 0x0fff) as u32;
    let abcde = imm12 >> 7;
    let low7 = imm12 & 0x7f;
    if abcde >> 3 == 0 {
        let a = abcde & 1;
        let byte = (a << 7) | low7;
        match abcde >> 1 {
            0 => byte,
            1 => (byte << 16) | byte,
            2 => (byte << 24) | (byte << 8),
            3 => (byte << 24) | (byte << 16) | (byte << 8) | byte,
            _ => unreachable!(),
        }
    } else {
        let rotate = abcde;
        let unrotated = 0x80 | low7;
        unrotated.rotate_right(rotate)
    }
}

/// Finds a 12-bit modified-immediate encoding for `val`, per ARM ARM Table A5-11.
///
/// Returns `None` if `val` cannot be expressed as any of the five patterns; most 32-bit values
/// cannot.
pub fn thumb_expand_imm(val: u32) -> Option<u16> {
    let byte = val & 0xff;

    if val == byte {
        return Some(encode_pattern(Pattern::Bare, (byte >> 7) & 1, byte));
    }
    if val == (byte << 16) | byte {
        return Some(encode_pattern(Pattern::Repeat16, (byte >> 7) & 1, byte));
    }
    let byte_hi = (val >> 8) & 0xff;
    if val == (byte_hi << 24) | (byte_hi << 8) {
        return Some(encode_pattern(Pattern::Repeat16Shifted, (byte_hi >> 7) & 1, byte_hi));
    }
    if val == (byte << 24) | (byte << 16) | (byte << 8) | byte {
        return Some(encode_pattern(Pattern::Repeat8, (byte >> 7) & 1, byte));
    }

    let mut trunc = val;
    for rotate in (8..=31).rev() {
        if trunc & 0x80 != 0 && trunc & 0xffff_ff00 == 0 {
            let low7 = trunc & 0x7f;
            return Some(((rotate as u16) << 7) | low7 as u16);
        }
        trunc >>= 1;
    }
    None
}

fn encode_pattern(pattern: Pattern, a: u32, byte: u32) -> u16 {
    let base = match pattern {
        Pattern::Bare => 0,
        Pattern::Repeat16 => 2,
        Pattern::Repeat16Shifted => 4,
        Pattern::Repeat8 => 6,
    };
    let abcde = base + a;
    ((abcde << 7) | (byte & 0x7f)) as u16
}

/// The outcome of a successful [k12] lookup: the 12-bit field to place in the instruction, and,
/// if the original opcode family couldn't represent the value directly, the paired inverse
/// family the caller must emit instead (e.g. `SUB` in place of `ADD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct K12 {
    pub field: u16,
    pub inverted: Option<OpFamily>,
}

/// A data-processing opcode family, used to look up the inverse opcode K12 can fall back to.
///
/// Mirrors the `emit_invai` table: each family names the instruction whose immediate form can
/// stand in for this one when the operand's bitwise complement (or arithmetic negation) is
/// representable but the operand itself isn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpFamily {
    AndTst,
    Bic,
    MovOrr,
    MvnOrn,
    EorTeq,
    AddCmn,
    Adc,
    Sbc,
    SubCmp,
    Rsb,
    /// `RSC` has no modified-immediate form on Thumb-2 and no usable inverse; always fails.
    Rsc,
}

impl OpFamily {
    fn inverse(self) -> Option<(OpFamily, bool)> {
        match self {
            OpFamily::AndTst => Some((OpFamily::Bic, false)),
            OpFamily::Bic => Some((OpFamily::AndTst, false)),
            OpFamily::MovOrr => Some((OpFamily::MvnOrn, false)),
            OpFamily::MvnOrn => Some((OpFamily::MovOrr, false)),
            OpFamily::EorTeq => None,
            OpFamily::AddCmn => Some((OpFamily::SubCmp, true)),
            OpFamily::Adc => Some((OpFamily::Sbc, false)),
            OpFamily::Sbc => Some((OpFamily::Adc, false)),
            OpFamily::SubCmp => Some((OpFamily::AddCmn, true)),
            OpFamily::Rsb => None,
            OpFamily::Rsc => None,
        }
    }
}

/// Tries to fold `n` into a K12 immediate for an instruction in `family`.
///
/// First tries the bare-byte and rotated-byte patterns against `n` directly. Failing that, it
/// retries against `!n` (or, for the additive/subtractive families, `-n`) using the paired
/// inverse instruction, exactly as a peephole that turns `ADD r0, r0, #-1` into `SUB r0, r0, #1`
/// would. Returns `None` if neither the value nor its inverse-family counterpart fits.
pub fn k12(family: OpFamily, n: i32) -> Option<K12> {
    if let Some(field) = k12_rotate(n as u32) {
        return Some(K12 { field, inverted: None });
    }
    let (inverse, negate) = family.inverse()?;
    let m = if negate { (!n).wrapping_add(1) } else { !n };
    k12_rotate(m as u32).map(|field| K12 { field, inverted: Some(inverse) })
}

/// The bare-byte / rotated-byte subset of [thumb_expand_imm]: patterns `Bare` and the final
/// rotate-with-implicit-leading-one case only, reached by rotating `m` left one bit at a time and
/// testing whether the low byte fits.
fn k12_rotate(n: u32) -> Option<u16> {
    let mut m = n;
    for step in 0..32u32 {
        if m <= 0xff {
            if step == 0 {
                return Some(m as u16);
            }
            if m & 0x80 != 0 {
                // `m` is `n` rotated left by `step`; Table A5-11's rotate-right-by-ABCDE
                // recovers `n` from `m` when ABCDE == step.
                return Some(((step as u16) << 7) | (m as u16 & 0x7f));
            }
        }
        m = m.rotate_left(1);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumb_expand_imm_round_trips_bare_byte() {
        let enc = thumb_expand_imm(0x42).unwrap();
        assert_eq!(thumb_expand_imm_decode(enc), 0x42);
    }

    #[test]
    fn thumb_expand_imm_round_trips_all_replication_patterns() {
        for val in [0x0000_4242u32, 0x4200_4200u32, 0x4242_4242u32] {
            let enc = thumb_expand_imm(val).unwrap();
            assert_eq!(thumb_expand_imm_decode(enc), val, "value {val:#x}");
        }
    }

    #[test]
    fn thumb_expand_imm_round_trips_rotated_byte() {
        // 0xff000000: byte 0xff rotated so that it sits at bits 31:24.
        let val = 0xff00_0000u32;
        let enc = thumb_expand_imm(val).unwrap();
        assert_eq!(thumb_expand_imm_decode(enc), val);
    }

    #[test]
    fn thumb_expand_imm_rejects_unrepresentable_values() {
        assert_eq!(thumb_expand_imm(0x1234_5678), None);
    }

    #[test]
    fn k12_direct_hit_for_small_constant() {
        let k = k12(OpFamily::AddCmn, 42).unwrap();
        assert_eq!(k.inverted, None);
        assert_eq!(thumb_expand_imm_decode(k.field), 42);
    }

    #[test]
    fn k12_falls_back_to_inverse_instruction_for_add_of_negative_one() {
        // ADD r0, r0, #-1 has no direct K12 form (0xffffffff isn't a rotated byte), but
        // SUB r0, r0, #1 does.
        let k = k12(OpFamily::AddCmn, -1).unwrap();
        assert_eq!(k.inverted, Some(OpFamily::SubCmp));
        assert_eq!(thumb_expand_imm_decode(k.field), 1);
    }

    #[test]
    fn k12_fails_for_rsc_family_with_no_inverse() {
        assert_eq!(k12(OpFamily::Rsc, -1), None);
    }

    #[test]
    fn k12_fails_when_neither_value_nor_inverse_fit() {
        assert_eq!(k12(OpFamily::AddCmn, 0x1234_5678), None);
    }
}
