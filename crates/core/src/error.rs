//! All errors that can be _generated_ by the encoder.
use std::fmt;

/// Result type threaded through the encoder's pass 1/2/3 API.
pub type Result<T> = std::result::Result<T, EncodeError>;

/// Any error that occurs while driving [crate::Encoder] through its passes.
///
/// Each variant (other than [EncodeError::NoMem] and [EncodeError::Phase], which carry no
/// action-list position) carries the action-list offset or label id that was being processed
/// when the error was detected, mirroring the original encoder's practice of latching a single
/// `status` word and never attempting partial recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// Growing a section buffer or label table failed.
    NoMem,
    /// Pass 2's computed code size disagreed with pass 3's final cursor position.
    Phase,
    /// The active section at a [crate::Encoder::checkstep] call did not match the expected one.
    MatchSec(u32),
    /// An immediate argument did not fit its declared bit width/scale, or a value could not be
    /// expressed as a Thumb-2 modified immediate.
    RangeI(u32),
    /// A `SECTION` action named a section index outside `0..max_sections`.
    RangeSec(u32),
    /// A local/global label id fell outside the `lglabels` table.
    RangeLg(u32),
    /// A PC label id fell outside the `pclabels` table.
    RangePc(u32),
    /// A branch or load target was outside the reach of its classified instruction form, or the
    /// instruction preceding a relocation site did not match any known form.
    RangeRel(u32),
    /// Pass 3 reached a local/global label reference that was never defined.
    UndefLg(u32),
    /// Pass 3 (or pass 2) reached a PC label reference that was never defined.
    UndefPc(u32),
}

/// The top-byte "kind" of a packed status word, as produced by [EncodeError::to_raw].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorKind {
    NoMem = 0x01,
    Phase = 0x02,
    MatchSec = 0x03,
    RangeI = 0x11,
    RangeSec = 0x12,
    RangeLg = 0x13,
    RangePc = 0x14,
    RangeRel = 0x15,
    UndefLg = 0x21,
    UndefPc = 0x22,
}

impl EncodeError {
    /// The packed `kind<<24 | payload` form the original encoder reports through its `status`
    /// field, for interoperability with tooling that expects that shape.
    pub fn to_raw(self) -> u32 {
        let (kind, payload) = match self {
            EncodeError::NoMem => (ErrorKind::NoMem, 0),
            EncodeError::Phase => (ErrorKind::Phase, 0),
            EncodeError::MatchSec(n) => (ErrorKind::MatchSec, n),
            EncodeError::RangeI(n) => (ErrorKind::RangeI, n),
            EncodeError::RangeSec(n) => (ErrorKind::RangeSec, n),
            EncodeError::RangeLg(n) => (ErrorKind::RangeLg, n),
            EncodeError::RangePc(n) => (ErrorKind::RangePc, n),
            EncodeError::RangeRel(n) => (ErrorKind::RangeRel, n),
            EncodeError::UndefLg(n) => (ErrorKind::UndefLg, n),
            EncodeError::UndefPc(n) => (ErrorKind::UndefPc, n),
        };
        ((kind as u32) << 24) | (payload & 0x00ff_ffff)
    }

    /// Recovers an [EncodeError] from a packed status word, or `None` if `raw` is `0` (OK) or
    /// names a kind this encoder doesn't produce.
    pub fn from_raw(raw: u32) -> Option<Self> {
        let payload = raw & 0x00ff_ffff;
        let kind = raw >> 24;
        Some(match kind {
            0x01 => EncodeError::NoMem,
            0x02 => EncodeError::Phase,
            0x03 => EncodeError::MatchSec(payload),
            0x11 => EncodeError::RangeI(payload),
            0x12 => EncodeError::RangeSec(payload),
            0x13 => EncodeError::RangeLg(payload),
            0x14 => EncodeError::RangePc(payload),
            0x15 => EncodeError::RangeRel(payload),
            0x21 => EncodeError::UndefLg(payload),
            0x22 => EncodeError::UndefPc(payload),
            _ => return None,
        })
    }

    pub fn message(&self) -> &'static str {
        match self {
            EncodeError::NoMem => "allocation failure while growing an encoder buffer",
            EncodeError::Phase => "pass 2 and pass 3 disagreed on the final code size",
            EncodeError::MatchSec(_) => "active section did not match the expected section",
            EncodeError::RangeI(_) => "immediate argument out of range for its declared encoding",
            EncodeError::RangeSec(_) => "section index out of range",
            EncodeError::RangeLg(_) => "local/global label id out of range",
            EncodeError::RangePc(_) => "PC label id out of range",
            EncodeError::RangeRel(_) => "relocation target out of range, or unrecognized branch form",
            EncodeError::UndefLg(_) => "reference to an undefined local/global label",
            EncodeError::UndefPc(_) => "reference to an undefined PC label",
        }
    }
}

impl std::error::Error for EncodeError {}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "error[{:06x}]: {}", self.to_raw() & 0x00ff_ffff, self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trips_through_each_variant() {
        let cases = [
            EncodeError::NoMem,
            EncodeError::Phase,
            EncodeError::MatchSec(3),
            EncodeError::RangeI(0x123),
            EncodeError::RangeSec(7),
            EncodeError::RangeLg(42),
            EncodeError::RangePc(9),
            EncodeError::RangeRel(0xabcdef),
            EncodeError::UndefLg(11),
            EncodeError::UndefPc(99),
        ];
        for err in cases {
            let raw = err.to_raw();
            assert_eq!(Some(err), EncodeError::from_raw(raw));
        }
    }

    #[test]
    fn raw_kind_byte_matches_documented_status_codes() {
        assert_eq!(EncodeError::NoMem.to_raw(), 0x0100_0000);
        assert_eq!(EncodeError::Phase.to_raw(), 0x0200_0000);
        assert_eq!(EncodeError::MatchSec(0).to_raw(), 0x0300_0000);
        assert_eq!(EncodeError::RangeI(0).to_raw(), 0x1100_0000);
        assert_eq!(EncodeError::RangeSec(0).to_raw(), 0x1200_0000);
        assert_eq!(EncodeError::RangeLg(0).to_raw(), 0x1300_0000);
        assert_eq!(EncodeError::RangePc(0).to_raw(), 0x1400_0000);
        assert_eq!(EncodeError::RangeRel(0).to_raw(), 0x1500_0000);
        assert_eq!(EncodeError::UndefLg(0).to_raw(), 0x2100_0000);
        assert_eq!(EncodeError::UndefPc(0).to_raw(), 0x2200_0000);
    }
}
