//! Map some memory for writing and (carefully) executing.
//!
//! This crate is a small wrapper around `mmap(2)`, `mprotect(2)`, and `munmap(2)` that uses
//! Rust's type system to enforce what you can and can't do with a dynamically mapped region of
//! memory: a [MappedRegion] is read-only until turned into a [WritableRegion], which in turn must
//! be consumed to produce an [ExecutableRegion]. The intent is to allocate memory in order to
//! inject machine code into the running process and run it — the building block for a JIT.
//!
//! # Examples
//!
//! ```
//! use mmap_jit::{MappedRegion, as_function};
//!
//! // Allocate some amount of memory.
//! let mem = MappedRegion::allocate(4096).unwrap();
//!
//! // Make it writable.
//! let mut mem = mmap_jit::WritableRegion::from(mem).unwrap();
//!
//! // Write to your memory!
//! mem[0] = 0xC3;
//!
//! // Make it executable.
//! let code = mem.into_executable().unwrap();
//! ```

extern crate errno;
extern crate libc;

mod error;
mod executable_region;
mod mapped_region;
mod writable_region;

pub mod examples;

pub use crate::executable_region::ExecutableRegion;
pub use crate::mapped_region::MappedRegion;
pub use crate::writable_region::WritableRegion;

pub use crate::error::{MappingError, Result};

/// Cast an [ExecutableRegion] to a function pointer of your choosing.
///
/// # Safety
///
/// This is incredibly `unsafe`! You are responsible for writing a program that obeys the target
/// platform's ABI and additionally, does not invalidate any of Rust's assumptions about the state
/// of memory.
#[macro_export]
macro_rules! as_function {
    ($region: expr, $fn_type: ty) => {
        std::mem::transmute::<*const u8, $fn_type>($region.addr())
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    const MAPPING_SIZE: usize = 4096;

    #[test]
    fn mapping_gives_a_valid_address() -> Result<()> {
        use libc::c_void;

        let region = MappedRegion::allocate(MAPPING_SIZE)?;
        assert_eq!(MAPPING_SIZE, region.len());
        assert_ne!(region.addr() as *const c_void, ptr::null());
        Ok(())
    }

    #[test]
    fn can_write_to_writable_mapping() -> Result<()> {
        let region = MappedRegion::allocate(MAPPING_SIZE)?;
        let mut p = WritableRegion::from(region)?;
        let memory = &mut p[..];

        memory[0] = 42;
        assert_eq!(42, p[0]);

        Ok(())
    }

    #[test]
    fn convert_writable_region_to_executable_preserves_bytes() -> Result<()> {
        let bytes = [0xde, 0xad, 0xbe, 0xef];
        let exec = examples::load_into_executable_region(&bytes)?;

        let readback = unsafe { std::slice::from_raw_parts(exec.addr(), bytes.len()) };
        assert_eq!(&bytes[..], readback);

        Ok(())
    }

    #[test]
    fn should_error_if_mapping_entire_address_space() {
        use errno::Errno;

        match MappedRegion::allocate(usize::MAX) {
            Ok(_) => panic!("that should not have worked..."),
            Err(MappingError::Internal(Errno(c))) => {
                assert!(c > 0, "expected an error value, such as EINVAL");
            }
        }
    }
}
