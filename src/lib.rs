/*!
Assembly of patch-token kernel binaries.

A kernel binary is a fixed header followed by the kernel name, the kernel heap, the general,
dynamic and surface state heaps, and a patch list of self-describing `[token][size][payload]`
records the driver walks at load time.

```no_run
use krnl_patch::{binary::{build_kernel_binary, KernelInputs}, caps::BuildContext, types::kernel::KernelInfo};
# fn main() -> krnl_patch::result::Result<()> {
let info = KernelInfo {
    name: "fill".into(),
    ..Default::default()
};
let inputs = KernelInputs::new(vec![0; 64]);
let binary = build_kernel_binary(&info, inputs, &BuildContext::default())?;
assert_eq!(binary.as_bytes().len() % 4, 0);
# Ok(())
# }
```
*/
#![forbid(unsafe_op_in_unsafe_fn)]

#[doc(inline)]
pub use krnl_patch_types as types;

pub mod error {
    /// Failure of a build or a read.
    ///
    /// The first failure aborts the whole build, no partial binary is returned.
    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("write of {len} bytes at offset {offset} failed: {reason}")]
        WriteFailure {
            offset: usize,
            len: usize,
            reason: &'static str,
        },
        #[error("invalid metadata: {0}")]
        InvalidMetadata(String),
        #[error("unsupported: {0}")]
        Unsupported(String),
        #[error("truncated {what}: need {need} bytes, found {found}")]
        Truncated {
            what: &'static str,
            need: usize,
            found: usize,
        },
        #[error("checksum mismatch: header {stored:#010x}, computed {computed:#010x}")]
        ChecksumMismatch { stored: u32, computed: u32 },
    }

    macro_rules! invalid_metadata {
        ($($arg:tt)*) => {
            $crate::error::Error::InvalidMetadata(format!($($arg)*))
        };
    }
    pub(crate) use invalid_metadata;

    macro_rules! unsupported {
        ($($arg:tt)*) => {
            $crate::error::Error::Unsupported(format!($($arg)*))
        };
    }
    pub(crate) use unsupported;
}

pub mod result {
    pub type Result<T, E = crate::error::Error> = std::result::Result<T, E>;
}

pub mod binary;
pub mod caps;
pub mod debug_data;
pub mod heap;
pub mod hw;
pub mod layout;
pub mod patch;
pub mod program;
pub mod reader;
pub mod stream;
