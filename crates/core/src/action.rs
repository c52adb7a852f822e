//! The action-stream bytecode: action kinds, the escape-word format, and a small builder for
//! constructing action lists in Rust instead of depending on an external DSL compiler.
//!
//! An action list is a sequence of 16-bit half-words. A half-word that isn't the escape marker
//! [ESCAPE] is a literal instruction half-word, copied straight into the output. [ESCAPE] (the
//! value `0xFFFF`, which never occurs as the first half-word of any real Thumb-2 instruction)
//! introduces an *action word*: the high 4 bits name an [ActionKind], the low 12 bits carry a
//! kind-specific payload.

/// Marks the next half-word as an action word rather than literal instruction data.
pub const ESCAPE: u16 = 0xFFFF;

/// The sixteen-way dispatch tag carried in bits 15:12 of an action word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActionKind {
    Stop = 0,
    Section = 1,
    Esc = 2,
    RelExt = 3,
    Align = 4,
    RelLg = 5,
    LabelLg = 6,
    RelPc = 7,
    LabelPc = 8,
    Imm = 9,
    ImmShift = 10,
    ImmLong = 11,
    ImmThumb = 12,
}

impl ActionKind {
    pub fn from_u16(tag: u16) -> Option<Self> {
        Some(match tag {
            0 => ActionKind::Stop,
            1 => ActionKind::Section,
            2 => ActionKind::Esc,
            3 => ActionKind::RelExt,
            4 => ActionKind::Align,
            5 => ActionKind::RelLg,
            6 => ActionKind::LabelLg,
            7 => ActionKind::RelPc,
            8 => ActionKind::LabelPc,
            9 => ActionKind::Imm,
            10 => ActionKind::ImmShift,
            11 => ActionKind::ImmLong,
            12 => ActionKind::ImmThumb,
            _ => return None,
        })
    }

    /// Whether this action consumes one entry from `put`'s argument slice.
    pub fn takes_arg(self) -> bool {
        matches!(
            self,
            ActionKind::RelPc
                | ActionKind::LabelPc
                | ActionKind::Imm
                | ActionKind::ImmShift
                | ActionKind::ImmLong
                | ActionKind::ImmThumb
        )
    }
}

/// An action word split into its kind and 12-bit payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub payload: u16,
}

impl Action {
    pub fn new(kind: ActionKind, payload: u16) -> Self {
        debug_assert!(payload <= 0x0fff);
        Action { kind, payload: payload & 0x0fff }
    }

    /// Decodes the half-word following an [ESCAPE] marker.
    pub fn decode(word: u16) -> Option<Self> {
        let kind = ActionKind::from_u16(word >> 12)?;
        Some(Action { kind, payload: word & 0x0fff })
    }

    /// Encodes this action back to the 16-bit word that would follow [ESCAPE].
    pub fn encode(self) -> u16 {
        ((self.kind as u16) << 12) | self.payload
    }
}

/// Field layout for an `IMM` action's 12-bit payload: `signed(2):bits(5):shift(4):scale(1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmField {
    /// 0 = unsigned, 1 = sign bit lives at bit 9 of the target half-word, 2 = sign bit lives at
    /// bit 7 of the half-word preceding the target.
    pub signed: u8,
    /// Width in bits of the value once scaled down.
    pub bits: u8,
    /// Bit position within the target instruction half-word where the low bit of the value
    /// lands.
    pub shift: u8,
    /// Effective additional shift applied to the value before range-checking: 0 or 2.
    pub scale: u8,
}

impl ImmField {
    pub fn from_payload(payload: u16) -> Self {
        let signed = ((payload >> 10) & 0x3) as u8;
        let bits = ((payload >> 5) & 0x1f) as u8;
        let shift = ((payload >> 1) & 0xf) as u8;
        let scale = if payload & 1 != 0 { 2 } else { 0 };
        ImmField { signed, bits, shift, scale }
    }

    pub fn to_payload(self) -> u16 {
        let scale_bit = if self.scale != 0 { 1 } else { 0 };
        ((self.signed as u16 & 0x3) << 10)
            | ((self.bits as u16 & 0x1f) << 5)
            | ((self.shift as u16 & 0xf) << 1)
            | scale_bit
    }

    /// The inclusive magnitude bound this field can hold, after scaling.
    pub fn max_magnitude(self) -> i32 {
        (1i32 << self.bits) - 1
    }
}

/// Builds action lists in Rust, the role an external DSL compiler would otherwise play.
///
/// Each `push_*` method appends exactly what `put` expects to find at that offset: literal
/// half-words go straight into the list, actions go in as `ESCAPE` followed by the encoded
/// action word.
#[derive(Debug, Default, Clone)]
pub struct ActionListBuilder {
    words: Vec<u16>,
}

impl ActionListBuilder {
    pub fn new() -> Self {
        ActionListBuilder::default()
    }

    /// Appends a literal instruction half-word.
    pub fn literal(&mut self, half_word: u16) -> &mut Self {
        debug_assert_ne!(half_word, ESCAPE, "a real instruction half-word can't be 0xffff");
        self.words.push(half_word);
        self
    }

    pub fn action(&mut self, kind: ActionKind, payload: u16) -> &mut Self {
        self.words.push(ESCAPE);
        self.words.push(Action::new(kind, payload).encode());
        self
    }

    pub fn stop(&mut self) -> &mut Self {
        self.action(ActionKind::Stop, 0)
    }

    pub fn section(&mut self, index: u16) -> &mut Self {
        self.action(ActionKind::Section, index)
    }

    pub fn align(&mut self, mask_bytes_minus_one: u16) -> &mut Self {
        self.action(ActionKind::Align, mask_bytes_minus_one)
    }

    pub fn rel_lg(&mut self, label_id: u16) -> &mut Self {
        self.action(ActionKind::RelLg, label_id)
    }

    pub fn label_lg(&mut self, label_id: u16) -> &mut Self {
        self.action(ActionKind::LabelLg, label_id)
    }

    pub fn rel_pc(&mut self) -> &mut Self {
        self.action(ActionKind::RelPc, 0)
    }

    pub fn label_pc(&mut self) -> &mut Self {
        self.action(ActionKind::LabelPc, 0)
    }

    pub fn imm(&mut self, field: ImmField) -> &mut Self {
        self.action(ActionKind::Imm, field.to_payload())
    }

    pub fn imm_shift(&mut self) -> &mut Self {
        self.action(ActionKind::ImmShift, 0)
    }

    pub fn imm_long(&mut self) -> &mut Self {
        self.action(ActionKind::ImmLong, 0)
    }

    pub fn imm_thumb(&mut self) -> &mut Self {
        self.action(ActionKind::ImmThumb, 0)
    }

    /// Appends a trailing `STOP` and returns the finished action list.
    pub fn finish(&mut self) -> Vec<u16> {
        self.stop();
        std::mem::take(&mut self.words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trips_through_encode_decode() {
        let action = Action::new(ActionKind::RelLg, 0x123);
        let word = action.encode();
        assert_eq!(Action::decode(word), Some(action));
    }

    #[test]
    fn imm_field_round_trips_through_payload() {
        let field = ImmField { signed: 1, bits: 8, shift: 6, scale: 2 };
        let payload = field.to_payload();
        assert_eq!(ImmField::from_payload(payload), field);
    }

    #[test]
    fn builder_emits_escape_before_every_action() {
        let mut b = ActionListBuilder::new();
        b.literal(0x4601).rel_lg(1);
        let list = b.finish();
        assert_eq!(list[0], 0x4601);
        assert_eq!(list[1], ESCAPE);
        assert_eq!(Action::decode(list[2]), Some(Action::new(ActionKind::RelLg, 1)));
    }

    #[test]
    fn action_kinds_take_the_documented_arguments() {
        assert!(ActionKind::Imm.takes_arg());
        assert!(ActionKind::RelPc.takes_arg());
        assert!(!ActionKind::RelLg.takes_arg());
        assert!(!ActionKind::Stop.takes_arg());
    }
}
