use crate::wire_enum;
use std::str::FromStr;

pub mod error {
    #[derive(Debug, thiserror::Error)]
    #[error("unknown SamplerType `{}`", .input)]
    pub struct SamplerTypeFromStrError {
        pub(super) input: String,
    }
}
use error::*;

wire_enum! {
    /// Kind of sampler object bound to a sampler argument.
    pub enum SamplerType {
        Invalid = 0,
        Texture = 1,
        Sample8x8 = 2,
        Sample8x8Convolve2D = 3,
        Sample8x8Erode = 4,
        Sample8x8Dilate = 5,
        Sample8x8MinMaxFilter = 6,
        Vme = 7,
        Sample8x8MinMax = 8,
        Sample8x8Centroid = 9,
        Sample8x8BoolCentroid = 10,
        Sample8x8BoolSum = 11,
        Ve = 12,
        Vd = 13,
    }
}

impl Default for SamplerType {
    fn default() -> Self {
        Self::Texture
    }
}

impl SamplerType {
    pub fn name(&self) -> &'static str {
        use SamplerType::*;
        match self {
            Invalid => "invalid",
            Texture => "texture",
            Sample8x8 => "sample_8x8",
            Sample8x8Convolve2D => "sample_8x8_2dconvolve",
            Sample8x8Erode => "sample_8x8_erode",
            Sample8x8Dilate => "sample_8x8_dilate",
            Sample8x8MinMaxFilter => "sample_8x8_minmaxfilter",
            Vme => "vme",
            Sample8x8MinMax => "sample_8x8_minmax",
            Sample8x8Centroid => "sample_8x8_centroid",
            Sample8x8BoolCentroid => "sample_8x8_bool_centroid",
            Sample8x8BoolSum => "sample_8x8_bool_sum",
            Ve => "ve",
            Vd => "vd",
        }
    }
}

impl FromStr for SamplerType {
    type Err = SamplerTypeFromStrError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|x| x.name().eq_ignore_ascii_case(input))
            .ok_or_else(|| SamplerTypeFromStrError {
                input: input.to_string(),
            })
    }
}

wire_enum! {
    /// Texture coordinate addressing of an inline sampler.
    pub enum AddressMode {
        Wrap = 0,
        Mirror = 1,
        Clamp = 2,
        Border = 3,
        MirrorOnce = 4,
        Mirror101 = 5,
    }
}

impl Default for AddressMode {
    fn default() -> Self {
        Self::Clamp
    }
}

wire_enum! {
    pub enum MapFilter {
        Point = 0,
        Linear = 1,
        Anisotropic = 2,
        Mono = 3,
    }
}

impl Default for MapFilter {
    fn default() -> Self {
        Self::Point
    }
}

wire_enum! {
    pub enum MipFilter {
        None = 0,
        Point = 1,
        Linear = 2,
    }
}

impl Default for MipFilter {
    fn default() -> Self {
        Self::None
    }
}

wire_enum! {
    /// Shadow compare function.
    pub enum CompareFunc {
        Always = 0,
        Never = 1,
        Less = 2,
        Equal = 3,
        LessEqual = 4,
        Greater = 5,
        NotEqual = 6,
        GreaterEqual = 7,
    }
}

impl Default for CompareFunc {
    fn default() -> Self {
        Self::Never
    }
}
