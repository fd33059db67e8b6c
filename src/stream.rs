use crate::{
    error::{unsupported, Error},
    result::Result,
};
use bytemuck::Pod;
use std::fmt::{self, Debug};

/// Smallest multiple of `alignment` not less than `value`.
pub fn align_up(value: u32, alignment: u32) -> u32 {
    match value % alignment {
        0 => value,
        rem => value + (alignment - rem),
    }
}

/// [`align_up`], or `None` if the result does not fit in a `u32`.
pub fn checked_align_up(value: u32, alignment: u32) -> Option<u32> {
    match value % alignment {
        0 => Some(value),
        rem => value.checked_add(alignment - rem),
    }
}

/// Append only byte buffer with backpatching.
///
/// Offsets are `u32` on the wire, so a stream never grows past `u32::MAX` bytes.
#[derive(Default, Clone, Eq, PartialEq)]
pub struct BinaryStream {
    bytes: Vec<u8>,
}

impl BinaryStream {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
    /// The current size as a wire offset.
    pub fn offset(&self) -> u32 {
        // write keeps len within u32
        self.bytes.len() as u32
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
    fn reserve(&mut self, len: usize) -> Result<()> {
        let offset = self.bytes.len();
        let fail = |reason| Error::WriteFailure {
            offset,
            len,
            reason,
        };
        match offset.checked_add(len) {
            Some(end) if end <= u32::MAX as usize => (),
            _ => return Err(fail("stream exceeds u32::MAX bytes")),
        }
        self.bytes
            .try_reserve(len)
            .map_err(|_| fail("allocation failed"))
    }
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }
    pub fn write_pod<T: Pod>(&mut self, value: &T) -> Result<()> {
        self.write(bytemuck::bytes_of(value))
    }
    /// Overwrites `size_of::<T>()` bytes at `offset`.
    ///
    /// The range must already be written, the size is unchanged.
    pub fn write_at<T: Pod>(&mut self, value: &T, offset: usize) -> Result<()> {
        let bytes = bytemuck::bytes_of(value);
        let len = self.bytes.len();
        let dst = offset
            .checked_add(bytes.len())
            .and_then(|end| self.bytes.get_mut(offset..end))
            .ok_or(Error::WriteFailure {
                offset,
                len: bytes.len(),
                reason: "range past end of stream",
            })?;
        dst.copy_from_slice(bytes);
        debug_assert_eq!(self.bytes.len(), len);
        Ok(())
    }
    /// Appends `len` zero bytes.
    pub fn add_padding(&mut self, len: usize) -> Result<()> {
        self.reserve(len)?;
        self.bytes.resize(self.bytes.len() + len, 0);
        Ok(())
    }
    /// Appends zero bytes until the size is a multiple of `alignment`.
    pub fn align(&mut self, alignment: u32) -> Result<()> {
        if alignment == 0 {
            return Err(unsupported!("alignment of 0"));
        }
        let len = align_up(self.offset(), alignment) - self.offset();
        self.add_padding(len as usize)
    }
    pub fn append(&mut self, other: &BinaryStream) -> Result<()> {
        self.write(other.as_bytes())
    }
}

impl Debug for BinaryStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BinaryStream({}B)", self.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_pads_with_zeros() {
        let mut stream = BinaryStream::new();
        stream.write(&[1, 2, 3]).unwrap();
        stream.align(8).unwrap();
        assert_eq!(stream.as_bytes(), &[1, 2, 3, 0, 0, 0, 0, 0]);
        stream.align(8).unwrap();
        assert_eq!(stream.len(), 8);
        assert!(stream.align(0).is_err());
    }

    #[test]
    fn write_at_backpatches() {
        let mut stream = BinaryStream::new();
        stream.write_pod(&0u32).unwrap();
        stream.write_pod(&7u32).unwrap();
        stream.write_at(&0xAABBCCDDu32, 0).unwrap();
        assert_eq!(stream.len(), 8);
        assert_eq!(&stream.as_bytes()[..4], &0xAABBCCDDu32.to_ne_bytes());
    }

    #[test]
    fn write_at_past_end() {
        let mut stream = BinaryStream::new();
        stream.write_pod(&0u32).unwrap();
        let err = stream.write_at(&0u64, 0).unwrap_err();
        assert!(matches!(err, Error::WriteFailure { offset: 0, len: 8, .. }));
        assert!(stream.write_at(&0u32, usize::MAX).is_err());
        assert_eq!(stream.len(), 4);
    }

    #[test]
    fn align_up_values() {
        assert_eq!(align_up(0, 32), 0);
        assert_eq!(align_up(1, 32), 32);
        assert_eq!(align_up(64, 32), 64);
        assert_eq!(align_up(65, 4), 68);
        assert_eq!(checked_align_up(65, 4), Some(68));
        assert_eq!(checked_align_up(u32::MAX - 31, 32), Some(u32::MAX - 31));
        assert_eq!(checked_align_up(u32::MAX - 30, 32), None);
    }

    #[test]
    fn stream_debug() {
        let mut stream = BinaryStream::new();
        stream.add_padding(128).unwrap();
        assert_eq!(format!("{stream:?}"), "BinaryStream(128B)");
    }
}
