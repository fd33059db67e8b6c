use crate::wire_enum;

wire_enum! {
    /// Address space of a pointer argument or pointer input.
    ///
    /// The last three are internal spaces used by device enqueue.
    pub enum AddressSpace {
        Private = 0,
        Global = 1,
        Constant = 2,
        Local = 3,
        DeviceQueue = 4,
        DefaultDeviceQueue = 5,
        EventPool = 6,
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::Global
    }
}

wire_enum! {
    /// Kind of a program-scope kernel annotation.
    pub enum KernelType {
        Constructor = 0,
        Destructor = 1,
    }
}

impl Default for KernelType {
    fn default() -> Self {
        Self::Constructor
    }
}

wire_enum! {
    /// Semantic of a data-parameter-buffer entry in the cross-thread payload.
    pub enum DataParameterType {
        Unknown = 0,
        KernelArgument = 1,
        LocalWorkSize = 2,
        GlobalWorkSize = 3,
        NumWorkGroups = 4,
        WorkDimensions = 5,
        LocalId = 6,
        ExecutionMask = 7,
        SumOfLocalMemoryObjectArgumentSizes = 8,
        ImageWidth = 9,
        ImageHeight = 10,
        ImageDepth = 11,
        ImageChannelDataType = 12,
        ImageChannelOrder = 13,
        SamplerAddressMode = 14,
        SamplerNormalizedCoords = 15,
        GlobalWorkOffset = 16,
        NumHardwareThreads = 17,
        ImageArraySize = 18,
        PrintfSurfaceSize = 19,
        ImageNumSamples = 20,
        SamplerCoordinateSnapWaRequired = 21,
        ParentEvent = 22,
        VmeMbBlockType = 23,
        VmeSubpixelMode = 24,
        VmeSadAdjustMode = 25,
        VmeSearchPathType = 26,
        ImageNumMipLevels = 27,
        EnqueuedLocalWorkSize = 28,
        MaxWorkgroupSize = 29,
        PreferredWorkgroupMultiple = 30,
        LocalMemoryStatelessWindowStartAddress = 31,
        LocalMemoryStatelessWindowSize = 32,
        PrivateMemoryStatelessSize = 33,
        SimdSize = 34,
        ObjectId = 35,
        VmeImageType = 36,
        VmeMbSkipBlockType = 37,
        ChildBlockSimdSize = 38,
        ImageSrgbChannelOrder = 39,
        StageInGridOrigin = 40,
        StageInGridSize = 41,
        BufferOffset = 42,
        BufferStateful = 43,
        FlatImageBaseOffset = 44,
        FlatImageWidth = 45,
        FlatImageHeight = 46,
        FlatImagePitch = 47,
        RtStackId = 48,
        ImplArgBuffer = 49,
    }
}

impl Default for DataParameterType {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Size of a scalar data parameter in bytes.
pub const DATA_PARAMETER_DATA_SIZE: u32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_parameter_values_are_dense() {
        for (i, x) in DataParameterType::VARIANTS.iter().enumerate() {
            assert_eq!(x.as_u32(), i as u32);
        }
        assert_eq!(DataParameterType::VARIANTS.len(), 50);
        assert!(DataParameterType::try_from(50).is_err());
    }

    #[test]
    fn address_space_from_wire() {
        assert_eq!(AddressSpace::try_from(4).unwrap(), AddressSpace::DeviceQueue);
        let err = AddressSpace::try_from(9).unwrap_err();
        assert_eq!(err.to_string(), "unknown AddressSpace value 9");
    }
}
