//! End-to-end `put` → `link` → `encode` scenarios, exercised through the public API the way a
//! real caller (an IR lowering pass, say) would drive it: build an action list, feed it runtime
//! arguments, link to get a code size, then encode into a caller-owned buffer.

use thumbjit_core::action::ActionListBuilder;
use thumbjit_core::error::EncodeError;
use thumbjit_core::labels::GLOBAL_BIAS;
use thumbjit_core::state::Encoder;

fn assemble(action_list: &[u16], args: &[i32]) -> Vec<u16> {
    let mut enc = Encoder::new(1);
    enc.setup(action_list);
    enc.put(0, args).unwrap();
    let codesize = enc.link().unwrap();
    let mut dest = vec![0u16; codesize / 2];
    enc.encode(&mut dest).unwrap();
    dest
}

#[test]
fn loads_an_expandable_immediate_through_the_thumb_modified_immediate_path() {
    // MOV.W R2, #<n>: hi/lo halfwords with Rd already baked in, immediate bits left zero for
    // IMMTHUMB to patch in pass 3.
    let mut b = ActionListBuilder::new();
    b.literal(0xF04F).literal(0x0200).imm_thumb();
    let list = b.finish();

    let dest = assemble(&list, &[42]);

    // Matches MOV.W R2, #42 byte-for-byte.
    assert_eq!(dest, vec![0xF04F, 0x022A]);
}

#[test]
fn patches_a_backward_unconditional_branch_to_an_already_defined_label() {
    let mut b = ActionListBuilder::new();
    b.label_lg(1).literal(0x46C0).literal(0xE000).rel_lg(1);
    let list = b.finish();

    let dest = assemble(&list, &[]);

    // Displacement from the branch (halfword index 1) back to the label (halfword index 0) is
    // -4 bytes of PC bias plus -2 bytes back to the label: n = 0 - 2*2 - 4 = -6, i.e. imm11
    // encodes -3 halfwords, +1-biased to -2 (0x7FE). The leading NOP is untouched.
    assert_eq!(dest[0], 0x46C0);
    assert_eq!(dest[1], 0xE7FE);
}

#[test]
fn link_defers_an_undefined_global_label_to_an_encode_time_error() {
    // Label id 1 is local (ids 1..=9), so it plays no part in this scenario: pick a genuine
    // global id instead, since only globals get deferred to an external-resolution marker.
    let mut b = ActionListBuilder::new();
    b.literal(0x46C0).rel_lg(GLOBAL_BIAS);
    let list = b.finish();

    let mut enc = Encoder::new(1);
    enc.setup_global(0);
    enc.setup(&list);
    enc.put(0, &[]).unwrap();

    // link() doesn't error on a still-pending global label — it marks the reference site as
    // needing external resolution, and only encode() reports the failure.
    let codesize = enc.link().unwrap();
    let mut dest = vec![0u16; codesize / 2];
    assert_eq!(enc.encode(&mut dest), Err(EncodeError::UndefLg(GLOBAL_BIAS as u32)));
}

#[test]
fn encoded_buffer_survives_the_writable_to_executable_transition() {
    let mut b = ActionListBuilder::new();
    b.literal(0xF04F).literal(0x0200).imm_thumb();
    let list = b.finish();
    let dest = assemble(&list, &[42]);

    let bytes: Vec<u8> = dest.iter().flat_map(|h| h.to_le_bytes()).collect();
    let exec = mmap_jit::examples::load_into_executable_region(&bytes).unwrap();

    let readback = unsafe { std::slice::from_raw_parts(exec.addr(), bytes.len()) };
    assert_eq!(readback, &bytes[..]);
}
