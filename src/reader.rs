/*!
Read side of kernel binaries and patch lists.

```no_run
# use krnl_patch::reader::KernelBinaryView;
# fn dump(bytes: &[u8]) -> krnl_patch::result::Result<()> {
let view = KernelBinaryView::parse(bytes)?;
for item in view.patch_items() {
    let item = item?;
    println!("{} {}", item.token(), item.size());
}
# Ok(())
# }
```
*/

use crate::{
    binary::{checksum, KernelBinaryHeader, KERNEL_BINARY_HEADER_SIZE},
    error::{invalid_metadata, Error},
    patch::{record::PatchItemHeader, PatchRecord, PatchToken},
    result::Result,
};
use std::mem::size_of;

const PATCH_ITEM_HEADER_SIZE: usize = size_of::<PatchItemHeader>();

fn truncated(what: &'static str, need: usize, found: usize) -> Error {
    Error::Truncated { what, need, found }
}

fn split_off<'a>(rest: &mut &'a [u8], size: u32) -> &'a [u8] {
    let (section, tail) = std::mem::take(rest).split_at(size as usize);
    *rest = tail;
    section
}

/// A validated kernel binary, sliced into its sections.
#[derive(Clone, Copy, Debug)]
pub struct KernelBinaryView<'a> {
    header: KernelBinaryHeader,
    name: &'a [u8],
    kernel_heap: &'a [u8],
    general_state_heap: &'a [u8],
    dynamic_state_heap: &'a [u8],
    surface_state_heap: &'a [u8],
    patch_list: &'a [u8],
}

impl<'a> KernelBinaryView<'a> {
    /// Checks the header sizes and the checksum of `bytes`.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < KERNEL_BINARY_HEADER_SIZE {
            return Err(truncated(
                "kernel binary header",
                KERNEL_BINARY_HEADER_SIZE,
                bytes.len(),
            ));
        }
        let (header_bytes, payload) = bytes.split_at(KERNEL_BINARY_HEADER_SIZE);
        let header: KernelBinaryHeader = bytemuck::pod_read_unaligned(header_bytes);
        let need = header.payload_size();
        if payload.len() < need {
            return Err(truncated("kernel binary", need, payload.len()));
        }
        let payload = &payload[..need];
        let computed = checksum(payload);
        let stored = header.check_sum;
        if stored != computed {
            return Err(Error::ChecksumMismatch { stored, computed });
        }
        let mut rest = payload;
        Ok(Self {
            header,
            name: split_off(&mut rest, header.kernel_name_size),
            kernel_heap: split_off(&mut rest, header.kernel_heap_size),
            general_state_heap: split_off(&mut rest, header.general_state_heap_size),
            dynamic_state_heap: split_off(&mut rest, header.dynamic_state_heap_size),
            surface_state_heap: split_off(&mut rest, header.surface_state_heap_size),
            patch_list: split_off(&mut rest, header.patch_list_size),
        })
    }
    pub fn header(&self) -> &KernelBinaryHeader {
        &self.header
    }
    /// The kernel name without its NUL padding.
    pub fn name(&self) -> Result<&'a str> {
        let end = self
            .name
            .iter()
            .position(|x| *x == 0)
            .unwrap_or(self.name.len());
        std::str::from_utf8(&self.name[..end])
            .map_err(|e| invalid_metadata!("kernel name is not utf8: {e}"))
    }
    pub fn kernel_heap(&self) -> &'a [u8] {
        self.kernel_heap
    }
    pub fn general_state_heap(&self) -> &'a [u8] {
        self.general_state_heap
    }
    pub fn dynamic_state_heap(&self) -> &'a [u8] {
        self.dynamic_state_heap
    }
    pub fn surface_state_heap(&self) -> &'a [u8] {
        self.surface_state_heap
    }
    pub fn patch_list(&self) -> &'a [u8] {
        self.patch_list
    }
    pub fn patch_items(&self) -> PatchItems<'a> {
        PatchItems::new(self.patch_list)
    }
}

/// One record of a patch list.
#[derive(Clone, Copy, Debug)]
pub struct PatchItem<'a> {
    token: PatchToken,
    offset: usize,
    /// Header, payload and any uncounted inline data.
    bytes: &'a [u8],
    size: u32,
}

impl<'a> PatchItem<'a> {
    pub fn token(&self) -> PatchToken {
        self.token
    }
    /// Offset of the record within its patch list.
    pub fn offset(&self) -> usize {
        self.offset
    }
    /// The size field of the record header.
    pub fn size(&self) -> u32 {
        self.size
    }
    /// Everything following the record header.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[PATCH_ITEM_HEADER_SIZE..]
    }
    /// Reads the fixed payload as `T`, which must match the token.
    pub fn decode<T: PatchRecord>(&self) -> Result<T> {
        if self.token != T::TOKEN {
            return Err(invalid_metadata!(
                "record at offset {} is {}, not {}",
                self.offset,
                self.token,
                T::TOKEN
            ));
        }
        let payload = self.payload();
        let need = size_of::<T>();
        if payload.len() < need {
            return Err(truncated("patch record", need, payload.len()));
        }
        Ok(bytemuck::pod_read_unaligned(&payload[..need]))
    }
    /// The trailing payload after the fixed `T` record.
    pub fn trailing<T: PatchRecord>(&self) -> &'a [u8] {
        self.payload().get(size_of::<T>()..).unwrap_or_default()
    }
}

/// Iterates the records of a patch list.
///
/// Stops after the first error.
#[derive(Clone, Debug)]
pub struct PatchItems<'a> {
    bytes: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> PatchItems<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            failed: false,
        }
    }
    fn next_item(&mut self) -> Result<PatchItem<'a>> {
        let rest = &self.bytes[self.offset..];
        if rest.len() < PATCH_ITEM_HEADER_SIZE {
            return Err(truncated("patch item header", PATCH_ITEM_HEADER_SIZE, rest.len()));
        }
        let header: PatchItemHeader =
            bytemuck::pod_read_unaligned(&rest[..PATCH_ITEM_HEADER_SIZE]);
        let token = PatchToken::try_from(header.token).map_err(|e| {
            invalid_metadata!("record at offset {}: {e}", self.offset)
        })?;
        let size = header.size as usize;
        if size < PATCH_ITEM_HEADER_SIZE {
            return Err(invalid_metadata!(
                "record {token} at offset {} has size {size}",
                self.offset
            ));
        }
        let mut len = size;
        if token.has_uncounted_inline_data() {
            // InlineDataSize is the last dword of the fixed record
            if size < PATCH_ITEM_HEADER_SIZE + 4 || rest.len() < size {
                return Err(truncated("patch record", size.max(PATCH_ITEM_HEADER_SIZE + 4), rest.len()));
            }
            let inline_data_size: u32 = bytemuck::pod_read_unaligned(&rest[size - 4..size]);
            len += inline_data_size as usize;
        }
        if rest.len() < len {
            return Err(truncated("patch record", len, rest.len()));
        }
        let item = PatchItem {
            token,
            offset: self.offset,
            bytes: &rest[..len],
            size: header.size,
        };
        self.offset += len;
        Ok(item)
    }
}

impl<'a> Iterator for PatchItems<'a> {
    type Item = Result<PatchItem<'a>>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }
        let item = self.next_item();
        self.failed = item.is_err();
        Some(item)
    }
}
