use crate::{
    error::unsupported,
    result::Result,
    stream::{align_up, BinaryStream},
};
use bytemuck::{Pod, Zeroable};
use tracing::debug;

#[repr(C)]
#[derive(Default, Clone, Copy, Eq, PartialEq, Pod, Zeroable, Debug)]
pub struct KernelDebugDataHeader {
    pub kernel_name_size: u32,
    pub size_visa_dbg_in_bytes: u32,
    pub size_gen_isa_dbg_in_bytes: u32,
}

fn section_len(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len)
        .ok()
        .filter(|len| *len <= u32::MAX - 4)
        .ok_or_else(|| unsupported!("{what} of {len} bytes"))
}

/// Packs the debug info of a kernel.
///
/// `[header][name NUL padded to 4][visa padded to 4][gen isa padded to 4]`
pub fn build_kernel_debug_data(name: &str, visa: &[u8], gen_isa: &[u8]) -> Result<BinaryStream> {
    let header = KernelDebugDataHeader {
        kernel_name_size: align_up(section_len(name.len(), "kernel name")? + 1, 4),
        size_visa_dbg_in_bytes: align_up(section_len(visa.len(), "visa debug info")?, 4),
        size_gen_isa_dbg_in_bytes: align_up(section_len(gen_isa.len(), "gen isa debug info")?, 4),
    };
    let mut data = BinaryStream::new();
    data.write_pod(&header)?;
    data.write(name.as_bytes())?;
    data.write(&[0])?;
    data.align(4)?;
    for section in [visa, gen_isa] {
        data.write(section)?;
        data.align(4)?;
    }
    debug!(kernel = name, size = data.len(), "kernel debug data");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_are_dword_aligned() {
        let data = build_kernel_debug_data("copy", &[1, 2, 3, 4, 5], &[9; 3]).unwrap();
        let bytes = data.as_bytes();
        let header: KernelDebugDataHeader = bytemuck::pod_read_unaligned(&bytes[..12]);
        assert_eq!(header.kernel_name_size, 8);
        assert_eq!(header.size_visa_dbg_in_bytes, 8);
        assert_eq!(header.size_gen_isa_dbg_in_bytes, 4);
        assert_eq!(bytes.len(), 12 + 8 + 8 + 4);
        assert_eq!(&bytes[12..20], b"copy\0\0\0\0");
        assert_eq!(&bytes[20..28], &[1, 2, 3, 4, 5, 0, 0, 0]);
        assert_eq!(&bytes[28..], &[9, 9, 9, 0]);
    }

    #[test]
    fn empty_sections() {
        let data = build_kernel_debug_data("abc", &[], &[]).unwrap();
        assert_eq!(data.len(), 12 + 4);
        let header: KernelDebugDataHeader = bytemuck::pod_read_unaligned(&data.as_bytes()[..12]);
        assert_eq!(header.kernel_name_size, 4);
        assert_eq!(header.size_visa_dbg_in_bytes, 0);
    }
}
