//! Gen8 hardware state records.
//!
//! Each record is a DWORD array written verbatim into a heap.

use crate::{
    caps::{Platform, Workarounds},
    error::unsupported,
    result::Result,
    types::{
        image::ImageType,
        sampler::{AddressMode, CompareFunc, MapFilter, MipFilter},
    },
};
use bytemuck::{Pod, Zeroable};

fn set_bits(dword: &mut u32, lo: u32, width: u32, value: u32) {
    let mask = ((1u64 << width) - 1) as u32;
    *dword = (*dword & !(mask << lo)) | ((value & mask) << lo);
}

/// Reads `width` bits starting at `lo`.
pub fn get_bits(dword: u32, lo: u32, width: u32) -> u32 {
    let mask = ((1u64 << width) - 1) as u32;
    (dword >> lo) & mask
}

/// `offset` in units of `align`.
fn granules(offset: u32, align: u32, what: &str) -> Result<u32> {
    offset
        .checked_div(align)
        .ok_or_else(|| unsupported!("{what} of 0"))
}

/// Converts `value` to unsigned fixed point with `whole.fractional` bits.
fn float_to_fixed(value: f32, whole: u32, fractional: u32) -> Result<u32> {
    let max = ((1u64 << (whole + fractional)) - 1) as f32;
    let fixed = (value * (1u32 << fractional) as f32).round();
    if !(0. ..=max).contains(&fixed) {
        return Err(unsupported!(
            "{value} does not fit in {whole}.{fractional} fixed point"
        ));
    }
    Ok(fixed as u32)
}

/// Abstract surface kind of a surface state entry.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum SurfaceKind {
    Buffer,
    Surface1D,
    Surface1DArray,
    Surface2D,
    Surface2DArray,
    Surface3D,
    Cube,
    CubeArray,
    Media2D,
    MediaBlock2D,
    Null,
}

impl SurfaceKind {
    /// Surface kind of an image argument and whether it is multisampled.
    ///
    /// Returns `None` for [`ImageType::Invalid`].
    pub fn from_image_type(image_type: ImageType) -> Option<(Self, bool)> {
        use ImageType::*;
        let kind = match image_type {
            Invalid => return None,
            Buffer => (Self::Buffer, false),
            Image1D => (Self::Surface1D, false),
            Image1DArray => (Self::Surface1DArray, false),
            Image2D | Image2DDepth => (Self::Surface2D, false),
            Image2DArray | Image2DArrayDepth => (Self::Surface2DArray, false),
            Image3D => (Self::Surface3D, false),
            Cube => (Self::Cube, false),
            CubeArray => (Self::CubeArray, false),
            Image2DMsaa | Image2DMsaaDepth => (Self::Surface2D, true),
            Image2DArrayMsaa | Image2DArrayMsaaDepth => (Self::Surface2DArray, true),
            Image2DMedia => (Self::Media2D, false),
            Image2DMediaBlock => (Self::MediaBlock2D, false),
        };
        Some(kind)
    }
    /// Hardware SurfaceType and SurfaceArray.
    fn hardware(self) -> (u32, bool) {
        use SurfaceKind::*;
        match self {
            Surface1D => (0, false),
            Surface1DArray => (0, true),
            Surface2D | Media2D | MediaBlock2D => (1, false),
            Surface2DArray => (1, true),
            Surface3D => (2, false),
            Cube | CubeArray => (3, false),
            Buffer => (4, false),
            Null => (7, false),
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum SurfaceFormat {
    Unknown,
    Raw,
}

impl SurfaceFormat {
    fn hardware(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::Raw => 0x1FF,
        }
    }
}

#[repr(transparent)]
#[derive(Default, Clone, Copy, Eq, PartialEq, Pod, Zeroable, Debug)]
pub struct SurfaceState {
    pub dwords: [u32; 16],
}

impl SurfaceState {
    /// A linear surface.
    ///
    /// The buffer dimensions encode `buffer_length - 1`, wrapping for empty buffers.
    pub fn new(kind: SurfaceKind, format: SurfaceFormat, buffer_length: u32, msaa: bool) -> Self {
        let mut state = Self::default();
        let (surface_type, surface_array) = kind.hardware();
        let dw = &mut state.dwords;
        set_bits(&mut dw[0], 12, 2, 0);
        set_bits(&mut dw[0], 18, 9, format.hardware());
        set_bits(&mut dw[0], 28, 1, surface_array as u32);
        set_bits(&mut dw[0], 29, 3, surface_type);
        if kind == SurfaceKind::Buffer {
            let len = buffer_length.wrapping_sub(1);
            set_bits(&mut dw[2], 0, 14, len & 0x7F);
            set_bits(&mut dw[2], 16, 14, (len >> 7) & 0x1FFF);
            set_bits(&mut dw[3], 21, 11, (len >> 20) & 0x7F);
        }
        set_bits(&mut dw[4], 6, 1, msaa as u32);
        state
    }
    pub fn surface_type(&self) -> u32 {
        get_bits(self.dwords[0], 29, 3)
    }
    pub fn surface_format(&self) -> u32 {
        get_bits(self.dwords[0], 18, 9)
    }
    pub fn is_array(&self) -> bool {
        get_bits(self.dwords[0], 28, 1) != 0
    }
    pub fn is_multisampled(&self) -> bool {
        get_bits(self.dwords[4], 6, 1) != 0
    }
}

fn map_filter(filter: MapFilter) -> u32 {
    match filter {
        MapFilter::Point => 0,
        MapFilter::Linear => 1,
        MapFilter::Anisotropic => 2,
        MapFilter::Mono => 6,
    }
}

fn mip_filter(filter: MipFilter) -> u32 {
    match filter {
        MipFilter::None => 0,
        MipFilter::Point => 1,
        MipFilter::Linear => 3,
    }
}

fn compare_func(func: CompareFunc) -> u32 {
    use CompareFunc::*;
    match func {
        Always => 0,
        Never => 1,
        Less => 2,
        Equal => 3,
        LessEqual => 4,
        Greater => 5,
        NotEqual => 6,
        GreaterEqual => 7,
    }
}

fn address_mode(mode: AddressMode) -> u32 {
    use AddressMode::*;
    match mode {
        Wrap => 0,
        Mirror => 1,
        Clamp => 2,
        Border => 4,
        MirrorOnce => 5,
        Mirror101 => 7,
    }
}

/// Parameters of an enabled texture sampler.
#[derive(Clone, Copy, Debug)]
pub struct SamplerDesc {
    /// X, Y and Z.
    pub address_modes: [AddressMode; 3],
    pub mag_filter: MapFilter,
    pub min_filter: MapFilter,
    pub mip_filter: MipFilter,
    pub normalized_coords: bool,
    pub compare_func: CompareFunc,
    /// Dynamic state heap offset of the border color.
    pub border_color_offset: u32,
}

#[repr(transparent)]
#[derive(Default, Clone, Copy, Eq, PartialEq, Pod, Zeroable, Debug)]
pub struct SamplerState {
    pub dwords: [u32; 4],
}

impl SamplerState {
    pub fn new(desc: &SamplerDesc, platform: &Platform, workarounds: &Workarounds) -> Result<Self> {
        let mut state = Self::default();
        let min = map_filter(desc.min_filter);
        let mag = map_filter(desc.mag_filter);
        let [tcx, tcy, tcz] = desc.address_modes.map(address_mode);
        let max_lod = float_to_fixed(platform.sample_lod_max, 4, 8)?;
        let dw = &mut state.dwords;
        set_bits(&mut dw[0], 14, 3, min);
        set_bits(&mut dw[0], 17, 3, mag);
        set_bits(&mut dw[0], 20, 2, mip_filter(desc.mip_filter));
        set_bits(&mut dw[0], 31, 1, 0);

        set_bits(&mut dw[1], 1, 3, compare_func(desc.compare_func));
        set_bits(&mut dw[1], 8, 12, max_lod);
        set_bits(&mut dw[1], 20, 12, 0);

        set_bits(
            &mut dw[2],
            6,
            18,
            granules(
                desc.border_color_offset,
                platform.default_color_pointer_align_size,
                "default_color_pointer_align_size",
            )?,
        );

        set_bits(&mut dw[3], 0, 3, tcz);
        set_bits(&mut dw[3], 3, 3, tcy);
        set_bits(&mut dw[3], 6, 3, tcx);
        set_bits(&mut dw[3], 10, 1, !desc.normalized_coords as u32);
        if desc.mag_filter != MapFilter::Point {
            for bit in [14, 16, 18] {
                set_bits(&mut dw[3], bit, 1, 1);
            }
        }
        if desc.min_filter != MapFilter::Point {
            for bit in [13, 15, 17] {
                set_bits(&mut dw[3], bit, 1, 1);
            }
        }
        if workarounds.wa_22012532006 && desc.address_modes[0] == AddressMode::Mirror && min == 0
        {
            set_bits(&mut dw[3], 13, 1, 1);
            set_bits(&mut dw[3], 14, 1, 1);
        }
        Ok(state)
    }
    pub fn min_filter(&self) -> u32 {
        get_bits(self.dwords[0], 14, 3)
    }
    pub fn mag_filter(&self) -> u32 {
        get_bits(self.dwords[0], 17, 3)
    }
    pub fn max_lod(&self) -> u32 {
        get_bits(self.dwords[1], 8, 12)
    }
    /// Border color offset in units of the default color alignment.
    pub fn indirect_state_pointer(&self) -> u32 {
        get_bits(self.dwords[2], 6, 18)
    }
    /// Rounding enables, bit 0 is R min.
    pub fn rounding(&self) -> u32 {
        get_bits(self.dwords[3], 13, 6)
    }
}

/// Border color of one sampler.
#[repr(C)]
#[derive(Default, Clone, Copy, PartialEq, Pod, Zeroable, Debug)]
pub struct BorderColor {
    pub rgba: [f32; 4],
    pub reserved: [u32; 8],
}

impl BorderColor {
    pub fn new(rgba: [f32; 4]) -> Self {
        Self {
            rgba,
            reserved: [0; 8],
        }
    }
}

#[derive(Default, Clone, Copy, Debug)]
pub struct InterfaceDescriptorDesc {
    /// Kernel heap offset of the kernel.
    pub kernel_offset: u32,
    pub single_program_flow: bool,
    pub sampler_count: u32,
    pub sampler_array_offset: u32,
    pub binding_table_count: u32,
    pub binding_table_offset: u32,
    pub constant_read_length: u32,
}

#[repr(transparent)]
#[derive(Default, Clone, Copy, Eq, PartialEq, Pod, Zeroable, Debug)]
pub struct InterfaceDescriptor {
    pub dwords: [u32; 8],
}

impl InterfaceDescriptor {
    pub fn new(desc: &InterfaceDescriptorDesc, platform: &Platform) -> Result<Self> {
        let mut idd = Self::default();
        let dw = &mut idd.dwords;
        set_bits(
            &mut dw[0],
            6,
            26,
            granules(
                desc.kernel_offset,
                platform.kernel_pointer_align_size,
                "kernel_pointer_align_size",
            )?,
        );
        set_bits(&mut dw[2], 16, 1, 0);
        set_bits(&mut dw[2], 17, 1, 0);
        set_bits(&mut dw[2], 18, 1, desc.single_program_flow as u32);
        set_bits(&mut dw[3], 2, 3, desc.sampler_count);
        set_bits(
            &mut dw[3],
            5,
            27,
            granules(
                desc.sampler_array_offset,
                platform.sampler_state_pointer_align_size,
                "sampler_state_pointer_align_size",
            )?,
        );
        set_bits(&mut dw[4], 0, 5, desc.binding_table_count);
        set_bits(
            &mut dw[4],
            5,
            11,
            granules(
                desc.binding_table_offset,
                platform.binding_table_state_pointer_align_size,
                "binding_table_state_pointer_align_size",
            )?,
        );
        set_bits(&mut dw[7], 0, 8, desc.constant_read_length);
        Ok(idd)
    }
}

#[repr(transparent)]
#[derive(Default, Clone, Copy, Eq, PartialEq, Pod, Zeroable, Debug)]
pub struct BindingTableEntry(pub u32);

impl BindingTableEntry {
    pub fn new(surface_offset: u32, platform: &Platform) -> Result<Self> {
        let mut dword = 0;
        set_bits(
            &mut dword,
            5,
            27,
            granules(
                surface_offset,
                platform.surface_state_pointer_align_size,
                "surface_state_pointer_align_size",
            )?,
        );
        Ok(Self(dword))
    }
    pub fn surface_state_pointer(&self) -> u32 {
        get_bits(self.0, 5, 27)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(address: AddressMode, min: MapFilter, mag: MapFilter) -> SamplerDesc {
        SamplerDesc {
            address_modes: [address; 3],
            mag_filter: mag,
            min_filter: min,
            mip_filter: MipFilter::None,
            normalized_coords: true,
            compare_func: CompareFunc::Never,
            border_color_offset: 128,
        }
    }

    #[test]
    fn buffer_surface_wraps_empty_length() {
        let state = SurfaceState::new(SurfaceKind::Buffer, SurfaceFormat::Raw, 0, false);
        assert_eq!(state.surface_type(), 4);
        assert_eq!(state.surface_format(), 0x1FF);
        assert_eq!(get_bits(state.dwords[2], 0, 14), 0x7F);
        assert_eq!(get_bits(state.dwords[2], 16, 14), 0x1FFF);
        assert_eq!(get_bits(state.dwords[3], 21, 11), 0x7F);
        assert!(!state.is_multisampled());
    }

    #[test]
    fn image_surfaces() {
        let (kind, msaa) = SurfaceKind::from_image_type(ImageType::Image2DArrayMsaa).unwrap();
        let state = SurfaceState::new(kind, SurfaceFormat::Unknown, 0, msaa);
        assert_eq!(state.surface_type(), 1);
        assert!(state.is_array());
        assert!(state.is_multisampled());
        assert_eq!(state.dwords[2], 0);
        assert!(SurfaceKind::from_image_type(ImageType::Invalid).is_none());
        let (kind, _) = SurfaceKind::from_image_type(ImageType::CubeArray).unwrap();
        assert_eq!(SurfaceState::new(kind, SurfaceFormat::Unknown, 0, false).surface_type(), 3);
    }

    #[test]
    fn sampler_state_fields() {
        let desc = SamplerDesc {
            mip_filter: MipFilter::Linear,
            compare_func: CompareFunc::GreaterEqual,
            ..texture(AddressMode::Border, MapFilter::Linear, MapFilter::Mono)
        };
        let state =
            SamplerState::new(&desc, &Platform::default(), &Workarounds::default()).unwrap();
        assert_eq!(state.min_filter(), 1);
        assert_eq!(state.mag_filter(), 6);
        assert_eq!(get_bits(state.dwords[0], 20, 2), 3);
        assert_eq!(get_bits(state.dwords[1], 1, 3), 7);
        assert_eq!(state.max_lod(), 3584);
        assert_eq!(state.indirect_state_pointer(), 2);
        assert_eq!(get_bits(state.dwords[3], 0, 9), 0b100_100_100);
        assert_eq!(state.rounding(), 0b111111);
    }

    #[test]
    fn sampler_state_mirror_workaround() {
        let desc = texture(AddressMode::Mirror, MapFilter::Point, MapFilter::Point);
        let platform = Platform::default();
        let plain = SamplerState::new(&desc, &platform, &Workarounds::default()).unwrap();
        assert_eq!(plain.rounding(), 0);
        let workarounds = Workarounds {
            wa_22012532006: true,
        };
        let patched = SamplerState::new(&desc, &platform, &workarounds).unwrap();
        assert_eq!(patched.rounding(), 0b11);
    }

    #[test]
    fn sampler_lod_out_of_range() {
        let platform = Platform {
            sample_lod_max: 20.,
            ..Platform::default()
        };
        let desc = texture(AddressMode::Clamp, MapFilter::Point, MapFilter::Point);
        assert!(SamplerState::new(&desc, &platform, &Workarounds::default()).is_err());
    }

    #[test]
    fn interface_descriptor_fields() {
        let desc = InterfaceDescriptorDesc {
            kernel_offset: 256,
            single_program_flow: true,
            sampler_count: 3,
            sampler_array_offset: 192,
            binding_table_count: 2,
            binding_table_offset: 128,
            constant_read_length: 5,
        };
        let idd = InterfaceDescriptor::new(&desc, &Platform::default()).unwrap();
        assert_eq!(get_bits(idd.dwords[0], 6, 26), 4);
        assert_eq!(get_bits(idd.dwords[2], 18, 1), 1);
        assert_eq!(get_bits(idd.dwords[3], 2, 3), 3);
        assert_eq!(get_bits(idd.dwords[3], 5, 27), 6);
        assert_eq!(idd.dwords[4], 2 | (4 << 5));
        assert_eq!(idd.dwords[7], 5);
    }

    #[test]
    fn binding_table_entry() {
        let entry = BindingTableEntry::new(128, &Platform::default()).unwrap();
        assert_eq!(entry.0, 2 << 5);
        assert_eq!(entry.surface_state_pointer(), 2);
    }

    #[test]
    fn zero_alignment_is_unsupported() {
        let platform = Platform {
            surface_state_pointer_align_size: 0,
            kernel_pointer_align_size: 0,
            default_color_pointer_align_size: 0,
            ..Platform::default()
        };
        assert!(BindingTableEntry::new(128, &platform).is_err());
        let desc = InterfaceDescriptorDesc {
            kernel_offset: 64,
            single_program_flow: false,
            sampler_count: 0,
            sampler_array_offset: 0,
            binding_table_count: 0,
            binding_table_offset: 0,
            constant_read_length: 0,
        };
        assert!(InterfaceDescriptor::new(&desc, &platform).is_err());
        let desc = texture(AddressMode::Clamp, MapFilter::Point, MapFilter::Point);
        assert!(SamplerState::new(&desc, &platform, &Workarounds::default()).is_err());
    }

    #[test]
    fn record_sizes() {
        assert_eq!(std::mem::size_of::<SurfaceState>(), 64);
        assert_eq!(std::mem::size_of::<SamplerState>(), 16);
        assert_eq!(std::mem::size_of::<BorderColor>(), 48);
        assert_eq!(std::mem::size_of::<InterfaceDescriptor>(), 32);
    }
}
