use crate::wire_enum;
use std::str::FromStr;

pub mod error {
    #[derive(Debug, thiserror::Error)]
    #[error("unknown ImageType `{}`", .input)]
    pub struct ImageTypeFromStrError {
        pub(super) input: String,
    }
}
use error::*;

wire_enum! {
    /// Dimensionality and sample kind of an image argument.
    pub enum ImageType {
        Invalid = 0,
        Buffer = 1,
        Image1D = 2,
        Image1DArray = 3,
        Image2D = 4,
        Image2DArray = 5,
        Image3D = 6,
        Cube = 7,
        CubeArray = 8,
        Image2DDepth = 9,
        Image2DArrayDepth = 10,
        Image2DMsaa = 11,
        Image2DMsaaDepth = 12,
        Image2DArrayMsaa = 13,
        Image2DArrayMsaaDepth = 14,
        Image2DMedia = 15,
        Image2DMediaBlock = 16,
    }
}

impl Default for ImageType {
    fn default() -> Self {
        Self::Invalid
    }
}

impl ImageType {
    /// Name of the type.
    ///
    /// Lowercase, ie "image2d_array", "buffer", etc.
    pub fn name(&self) -> &'static str {
        use ImageType::*;
        match self {
            Invalid => "invalid",
            Buffer => "buffer",
            Image1D => "image1d",
            Image1DArray => "image1d_array",
            Image2D => "image2d",
            Image2DArray => "image2d_array",
            Image3D => "image3d",
            Cube => "cube",
            CubeArray => "cube_array",
            Image2DDepth => "image2d_depth",
            Image2DArrayDepth => "image2d_array_depth",
            Image2DMsaa => "image2d_msaa",
            Image2DMsaaDepth => "image2d_msaa_depth",
            Image2DArrayMsaa => "image2d_array_msaa",
            Image2DArrayMsaaDepth => "image2d_array_msaa_depth",
            Image2DMedia => "image2d_media",
            Image2DMediaBlock => "image2d_media_block",
        }
    }
    pub fn is_msaa(&self) -> bool {
        use ImageType::*;
        matches!(
            self,
            Image2DMsaa | Image2DMsaaDepth | Image2DArrayMsaa | Image2DArrayMsaaDepth
        )
    }
}

impl FromStr for ImageType {
    type Err = ImageTypeFromStrError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|x| x.name().eq_ignore_ascii_case(input))
            .ok_or_else(|| ImageTypeFromStrError {
                input: input.to_string(),
            })
    }
}
