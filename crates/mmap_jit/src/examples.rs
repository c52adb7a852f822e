//! Convenience helpers for exercising this crate from other crates' test suites.

use crate::{ExecutableRegion, WritableRegion};

/// Copies `bytes` into a freshly allocated writable region, then transitions the region to
/// executable.
///
/// This never calls the result as a function — the bytes may target an instruction set the
/// test host cannot run — it only proves that a buffer survives the `mprotect` transition from
/// writable to executable byte-for-byte.
pub fn load_into_executable_region(bytes: &[u8]) -> crate::Result<ExecutableRegion> {
    let mut mem = WritableRegion::allocate(bytes.len())?;
    mem[..bytes.len()].copy_from_slice(bytes);
    mem.into_executable()
}
