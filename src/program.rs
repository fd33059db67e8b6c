//! Program scope patch list and the program binary.
//!
//! Initializer and ctor/dtor records carry inline data after their payload that the record size
//! does not include, readers skip it using `InlineDataSize`.

use crate::{
    binary::KernelBinary,
    caps::Platform,
    error::{invalid_metadata, unsupported},
    patch::{
        record::{
            AllocateConstantMemorySurfaceProgramBinaryInfo,
            AllocateGlobalMemorySurfaceProgramBinaryInfo, ConstantPointerProgramBinaryInfo,
            GlobalPointerProgramBinaryInfo, KernelTypeProgramBinaryInfo, SymbolTableInfo,
        },
        PatchListWriter,
    },
    result::Result,
    stream::BinaryStream,
    types::{
        address::AddressSpace,
        program::{Initializer, PointerRelocation, ProgramInfo},
    },
};
use bytemuck::{Pod, Zeroable};
use tracing::debug;

/// "INTC"
pub const PROGRAM_MAGIC: u32 = 0x494E5443;
pub const PROGRAM_VERSION: u32 = 1081;

/// Buffer kinds of pointer relocations.
pub const PROGRAM_SCOPE_GLOBAL_BUFFER: u32 = 0;
pub const PROGRAM_SCOPE_CONSTANT_BUFFER: u32 = 1;

/// Global initializer stored inline after its record.
const GLOBAL_BUFFER_TYPE_INLINE: u32 = 0;

#[repr(C)]
#[derive(Default, Clone, Copy, Eq, PartialEq, Pod, Zeroable, Debug)]
pub struct ProgramBinaryHeader {
    pub magic: u32,
    pub version: u32,
    pub device: u32,
    pub gpu_pointer_size_in_bytes: u32,
    pub number_of_kernels: u32,
    pub stepping_id: u32,
    pub patch_list_size: u32,
}

/// Returns the zero padding that follows the inline data of `init`.
fn initializer_padding(init: &Initializer, what: &str) -> Result<usize> {
    let len = init.inline_data.len();
    let alloc_size = init.alloc_size as usize;
    if len > alloc_size {
        return Err(invalid_metadata!(
            "{what} initializer has {len} bytes of inline data, more than its allocation of {alloc_size}"
        ));
    }
    Ok(alloc_size - len)
}

fn buffer_type(pointer: &PointerRelocation) -> u32 {
    if pointer.pointee_address_space == AddressSpace::Global {
        PROGRAM_SCOPE_GLOBAL_BUFFER
    } else {
        PROGRAM_SCOPE_CONSTANT_BUFFER
    }
}

/// Emits the program scope records of `program`.
pub fn build_program_patch_list(program: &ProgramInfo) -> Result<BinaryStream> {
    let mut writer = PatchListWriter::new();
    if let Some(init) = program.constant_initializer.as_ref() {
        let padding = initializer_padding(init, "constant")?;
        writer.add_with_inline_data(
            &AllocateConstantMemorySurfaceProgramBinaryInfo {
                constant_buffer_index: 0,
                inline_data_size: init.alloc_size,
            },
            &init.inline_data,
            padding,
        )?;
    }
    if let Some(init) = program.global_initializer.as_ref() {
        let padding = initializer_padding(init, "global")?;
        writer.add_with_inline_data(
            &AllocateGlobalMemorySurfaceProgramBinaryInfo {
                global_buffer_type: GLOBAL_BUFFER_TYPE_INLINE,
                global_buffer_index: 0,
                inline_data_size: init.alloc_size,
            },
            &init.inline_data,
            padding,
        )?;
    }
    for annotation in program.kernel_types.iter() {
        let name = annotation.kernel_name.as_bytes();
        let inline_data_size = u32::try_from(name.len())
            .map_err(|_| unsupported!("kernel name of {} bytes", name.len()))?;
        writer.add_with_inline_data(
            &KernelTypeProgramBinaryInfo {
                kernel_type: annotation.kernel_type.as_u32(),
                inline_data_size,
            },
            name,
            0,
        )?;
    }
    for pointer in program.global_pointers.iter() {
        writer.add(&GlobalPointerProgramBinaryInfo {
            global_buffer_index: pointer.pointer_buffer_index,
            global_pointer_offset: pointer.pointer_offset,
            buffer_type: buffer_type(pointer),
            buffer_index: pointer.pointee_buffer_index,
        })?;
    }
    for pointer in program.constant_pointers.iter() {
        writer.add(&ConstantPointerProgramBinaryInfo {
            constant_buffer_index: pointer.pointer_buffer_index,
            constant_pointer_offset: pointer.pointer_offset,
            buffer_type: buffer_type(pointer),
            buffer_index: pointer.pointee_buffer_index,
        })?;
    }
    let table = &program.legacy_symbol_table;
    if !table.is_empty() {
        let mut record = SymbolTableInfo {
            num_entries: table.entries,
        };
        writer.add_deferred(&mut record, |_, stream| stream.write(&table.data))?;
    }
    debug!(size = writer.len(), "program patch list");
    Ok(writer.into_stream())
}

/// Writes the program header, the program patch list and `kernels` in order.
pub fn build_program_binary(
    platform: &Platform,
    program: &ProgramInfo,
    kernels: &[KernelBinary],
) -> Result<BinaryStream> {
    let patch_list = build_program_patch_list(program)?;
    let number_of_kernels = u32::try_from(kernels.len())
        .map_err(|_| unsupported!("{} kernels", kernels.len()))?;
    let header = ProgramBinaryHeader {
        magic: PROGRAM_MAGIC,
        version: PROGRAM_VERSION,
        device: platform.device,
        gpu_pointer_size_in_bytes: platform.gpu_pointer_size,
        number_of_kernels,
        stepping_id: platform.stepping_id,
        patch_list_size: patch_list.offset(),
    };
    let mut binary = BinaryStream::new();
    binary.write_pod(&header)?;
    binary.append(&patch_list)?;
    for kernel in kernels {
        binary.write(kernel.as_bytes())?;
    }
    debug!(kernels = number_of_kernels, size = binary.len(), "program binary");
    Ok(binary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        patch::{record::PatchItemHeader, PatchToken},
        types::{address::KernelType, kernel::FunctionTable, program::KernelTypeAnnotation},
    };
    use std::mem::size_of;

    fn header_at(bytes: &[u8], offset: usize) -> PatchItemHeader {
        bytemuck::pod_read_unaligned(&bytes[offset..offset + 8])
    }

    #[test]
    fn constant_initializer_is_zero_padded() {
        let program = ProgramInfo {
            constant_initializer: Some(Initializer {
                inline_data: vec![0xAB; 5],
                alloc_size: 16,
            }),
            ..Default::default()
        };
        let bytes = build_program_patch_list(&program).unwrap().into_bytes();
        let header = header_at(&bytes, 0);
        assert_eq!(
            header.token,
            PatchToken::AllocateConstantMemorySurfaceProgramBinaryInfo.as_u32()
        );
        assert_eq!(header.size, 16);
        assert_eq!(bytes.len(), 16 + 16);
        assert_eq!(&bytes[16..21], &[0xAB; 5]);
        assert!(bytes[21..].iter().all(|x| *x == 0));
    }

    #[test]
    fn oversized_initializer_is_invalid() {
        let program = ProgramInfo {
            global_initializer: Some(Initializer {
                inline_data: vec![1; 9],
                alloc_size: 8,
            }),
            ..Default::default()
        };
        let err = build_program_patch_list(&program).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidMetadata(_)));
    }

    #[test]
    fn record_order() {
        let program = ProgramInfo {
            global_initializer: Some(Initializer {
                inline_data: vec![1, 2, 3, 4],
                alloc_size: 4,
            }),
            kernel_types: vec![KernelTypeAnnotation {
                kernel_type: KernelType::Destructor,
                kernel_name: "fini".into(),
            }],
            global_pointers: vec![PointerRelocation {
                pointer_buffer_index: 0,
                pointer_offset: 0x1_0000_0008,
                pointee_address_space: AddressSpace::Constant,
                pointee_buffer_index: 2,
            }],
            legacy_symbol_table: FunctionTable::new(vec![0; 8], 1),
            ..Default::default()
        };
        let bytes = build_program_patch_list(&program).unwrap().into_bytes();
        let global = header_at(&bytes, 0);
        assert_eq!(global.size, 20);
        let kernel_type = header_at(&bytes, 24);
        assert_eq!(
            kernel_type.token,
            PatchToken::ConstructorDestructorKernelProgramBinaryInfo.as_u32()
        );
        assert_eq!(&bytes[40..44], b"fini");
        let pointer = header_at(&bytes, 44);
        assert_eq!(pointer.size, 28);
        let info: GlobalPointerProgramBinaryInfo =
            bytemuck::pod_read_unaligned(&bytes[52..52 + size_of::<GlobalPointerProgramBinaryInfo>()]);
        assert_eq!({ info.global_pointer_offset }, 0x1_0000_0008);
        assert_eq!({ info.buffer_type }, PROGRAM_SCOPE_CONSTANT_BUFFER);
        assert_eq!({ info.buffer_index }, 2);
        let table = header_at(&bytes, 72);
        assert_eq!(table.token, PatchToken::ProgramSymbolTable.as_u32());
        assert_eq!(table.size, 20);
        assert_eq!(bytes.len(), 92);
    }

    #[test]
    fn empty_program_binary() {
        let platform = Platform::default();
        let binary = build_program_binary(&platform, &ProgramInfo::default(), &[]).unwrap();
        let header: ProgramBinaryHeader = bytemuck::pod_read_unaligned(binary.as_bytes());
        assert_eq!(binary.len(), size_of::<ProgramBinaryHeader>());
        assert_eq!(header.magic, PROGRAM_MAGIC);
        assert_eq!(header.version, 1081);
        assert_eq!(header.gpu_pointer_size_in_bytes, 8);
        assert_eq!(header.number_of_kernels, 0);
        assert_eq!(header.patch_list_size, 0);
    }
}
