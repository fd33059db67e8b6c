use crate::{
    address::{AddressSpace, KernelType},
    kernel::FunctionTable,
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Program scope annotations, shared by every kernel of a program.
#[derive(Default, Clone, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct ProgramInfo {
    pub constant_initializer: Option<Initializer>,
    pub global_initializer: Option<Initializer>,
    pub global_pointers: Vec<PointerRelocation>,
    pub constant_pointers: Vec<PointerRelocation>,
    pub kernel_types: Vec<KernelTypeAnnotation>,
    pub legacy_symbol_table: FunctionTable,
}

impl ProgramInfo {
    pub fn from_bincode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
    pub fn to_bincode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }
}

/// Initial contents of a program scope buffer.
///
/// `alloc_size` may exceed the inline data, the tail is zero filled.
#[derive(Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Initializer {
    pub inline_data: Vec<u8>,
    pub alloc_size: u32,
}

impl Debug for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Initializer({}B / {}B)",
            self.inline_data.len(),
            self.alloc_size
        )
    }
}

/// A pointer stored in a program scope buffer that must be relocated at load time.
#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct PointerRelocation {
    pub pointer_buffer_index: u32,
    pub pointer_offset: u64,
    pub pointee_address_space: AddressSpace,
    pub pointee_buffer_index: u32,
}

#[derive(Default, Clone, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct KernelTypeAnnotation {
    pub kernel_type: KernelType,
    pub kernel_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializer_debug() {
        let init = Initializer {
            inline_data: vec![1; 12],
            alloc_size: 64,
        };
        assert_eq!(format!("{init:?}"), "Initializer(12B / 64B)");
    }
}
