//! Kernel binary assembly.

use crate::{
    caps::BuildContext,
    error::unsupported,
    heap::{build_dynamic_state_heap, build_kernel_heap, build_surface_state_heap},
    layout::{LayoutContext, Phase},
    patch::build_patch_list,
    result::Result,
    stream::{align_up, BinaryStream},
    types::kernel::{KernelInfo, KernelProgram},
};
use bytemuck::{Pod, Zeroable};
use std::mem::size_of;
use tracing::{debug, warn};

/// Fixed header of a kernel binary.
#[repr(C, packed)]
#[derive(Default, Clone, Copy, Pod, Zeroable, Debug)]
pub struct KernelBinaryHeader {
    pub check_sum: u32,
    pub shader_hash_code: u64,
    pub kernel_name_size: u32,
    pub patch_list_size: u32,
    pub kernel_heap_size: u32,
    pub general_state_heap_size: u32,
    pub dynamic_state_heap_size: u32,
    pub surface_state_heap_size: u32,
    pub kernel_unpadded_size: u32,
}

impl KernelBinaryHeader {
    /// Bytes following the header.
    pub fn payload_size(&self) -> usize {
        [
            self.kernel_name_size,
            self.kernel_heap_size,
            self.general_state_heap_size,
            self.dynamic_state_heap_size,
            self.surface_state_heap_size,
            self.patch_list_size,
        ]
        .iter()
        .map(|x| *x as usize)
        .sum()
    }
}

pub const KERNEL_BINARY_HEADER_SIZE: usize = size_of::<KernelBinaryHeader>();

fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    macro_rules! step {
        ($x:ident, $y:ident, $z:ident, $op:tt $shift:literal) => {
            *$x = $x.wrapping_sub(*$y).wrapping_sub(*$z);
            *$x ^= *$z $op $shift;
        };
    }
    step!(a, b, c, >> 13);
    step!(b, c, a, << 8);
    step!(c, a, b, >> 13);
    step!(a, b, c, >> 12);
    step!(b, c, a, << 16);
    step!(c, a, b, >> 5);
    step!(a, b, c, >> 3);
    step!(b, c, a, << 10);
    step!(c, a, b, >> 15);
}

fn hash_words(words: impl IntoIterator<Item = u32>) -> u64 {
    let (mut a, mut hi, mut lo) = (0x428a2f98u32, 0x71374491u32, 0xb5c0fbcfu32);
    for word in words {
        a ^= word;
        mix(&mut a, &mut hi, &mut lo);
    }
    ((hi as u64) << 32) | lo as u64
}

/// Jenkins mix hash over `words`.
pub fn hash(words: &[u32]) -> u64 {
    hash_words(words.iter().copied())
}

/// Low 32 bits of [`hash`] over the native endian dwords of `payload`.
///
/// Trailing bytes that do not fill a dword are ignored.
pub fn checksum(payload: &[u8]) -> u32 {
    let words = payload
        .chunks_exact(4)
        .map(bytemuck::pod_read_unaligned::<u32>);
    hash_words(words) as u32
}

/// The streams of one kernel, in binary order.
#[derive(Default, Debug)]
pub struct KernelHeaps {
    pub kernel: BinaryStream,
    pub general_state: BinaryStream,
    pub dynamic_state: BinaryStream,
    pub surface_state: BinaryStream,
    pub patch_list: BinaryStream,
}

/// Concatenates the header, name and heaps and backpatches the checksum.
pub fn combine(
    kernel: &KernelInfo,
    heaps: &KernelHeaps,
    unpadded_size: u32,
) -> Result<BinaryStream> {
    let name_len = u32::try_from(kernel.name.len())
        .map_err(|_| unsupported!("kernel name of {} bytes", kernel.name.len()))?;
    let mut header = KernelBinaryHeader {
        check_sum: 0,
        shader_hash_code: kernel.shader_hash,
        kernel_name_size: align_up(name_len + 1, 4),
        patch_list_size: heaps.patch_list.offset(),
        kernel_heap_size: heaps.kernel.offset(),
        general_state_heap_size: heaps.general_state.offset(),
        dynamic_state_heap_size: heaps.dynamic_state.offset(),
        surface_state_heap_size: heaps.surface_state.offset(),
        kernel_unpadded_size: unpadded_size,
    };
    let mut binary = BinaryStream::new();
    binary.write_pod(&header)?;
    binary.write(kernel.name.as_bytes())?;
    binary.write(&[0])?;
    binary.align(4)?;
    for heap in [
        &heaps.kernel,
        &heaps.general_state,
        &heaps.dynamic_state,
        &heaps.surface_state,
        &heaps.patch_list,
    ] {
        binary.append(heap)?;
    }
    let payload = &binary.as_bytes()[KERNEL_BINARY_HEADER_SIZE..];
    if payload.len() % 4 != 0 {
        return Err(unsupported!(
            "kernel binary payload of {} bytes is not dword aligned",
            payload.len()
        ));
    }
    debug_assert_eq!(header.payload_size(), payload.len());
    header.check_sum = checksum(payload);
    binary.write_at(&header, 0)?;
    Ok(binary)
}

/// Owned inputs of a kernel build.
#[derive(Default, Clone, Debug)]
pub struct KernelInputs {
    pub isa: Vec<u8>,
    pub system_kernel: Option<Vec<u8>>,
    /// Defaults to the length of `isa`.
    pub unpadded_size: Option<u32>,
    pub program: KernelProgram,
}

impl KernelInputs {
    pub fn new(isa: Vec<u8>) -> Self {
        Self {
            isa,
            ..Default::default()
        }
    }
    pub fn with_system_kernel(self, system_kernel: Vec<u8>) -> Self {
        Self {
            system_kernel: Some(system_kernel),
            ..self
        }
    }
    pub fn with_unpadded_size(self, unpadded_size: u32) -> Self {
        Self {
            unpadded_size: Some(unpadded_size),
            ..self
        }
    }
    pub fn with_program(self, program: KernelProgram) -> Self {
        Self { program, ..self }
    }
}

/// A finished kernel binary and the layout it was built with.
#[derive(Clone, Debug)]
pub struct KernelBinary {
    bytes: Vec<u8>,
    layout: LayoutContext,
}

impl KernelBinary {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
    pub fn layout(&self) -> &LayoutContext {
        &self.layout
    }
    pub fn header(&self) -> KernelBinaryHeader {
        bytemuck::pod_read_unaligned(&self.bytes[..KERNEL_BINARY_HEADER_SIZE])
    }
}

/// Builds the kernel binary of `kernel`.
///
/// The first failure aborts the build.
pub fn build_kernel_binary(
    kernel: &KernelInfo,
    inputs: KernelInputs,
    context: &BuildContext,
) -> Result<KernelBinary> {
    let result = build(kernel, inputs, context);
    if let Err(error) = result.as_ref() {
        warn!(kernel = %kernel.name, %error, "kernel binary build failed");
    }
    result
}

fn build(kernel: &KernelInfo, inputs: KernelInputs, context: &BuildContext) -> Result<KernelBinary> {
    context.platform.validate()?;
    let KernelInputs {
        isa,
        system_kernel,
        unpadded_size,
        mut program,
    } = inputs;
    let unpadded_size = match unpadded_size {
        Some(size) => size,
        None => u32::try_from(isa.len())
            .map_err(|_| unsupported!("kernel isa of {} bytes", isa.len()))?,
    };
    let mut layout = LayoutContext::new();
    let kernel_heap = build_kernel_heap(
        &mut layout,
        &isa,
        system_kernel.as_deref(),
        kernel,
        context,
    )?;
    let surface_state = build_surface_state_heap(&mut layout, kernel, context)?;
    let dynamic_state = build_dynamic_state_heap(&mut layout, kernel, context)?;
    let tables = program.take(kernel.execution_environment.compiled_simd_size);
    let patch_list = build_patch_list(&mut layout, kernel, tables, context)?;
    let heaps = KernelHeaps {
        kernel: kernel_heap,
        general_state: BinaryStream::new(),
        dynamic_state,
        surface_state,
        patch_list,
    };
    let binary = combine(kernel, &heaps, unpadded_size)?;
    layout.advance(Phase::Combined)?;
    debug!(kernel = %kernel.name, size = binary.len(), "kernel binary");
    Ok(KernelBinary {
        bytes: binary.into_bytes(),
        layout,
    })
}
