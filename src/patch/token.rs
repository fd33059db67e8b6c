use krnl_patch_types::wire_enum;

wire_enum! {
    /// Identifies the payload of a patch list record.
    ///
    /// Ids marked unused are reserved, the builder never emits them.
    pub enum PatchToken {
        Unknown = 0,
        MediaStatePointers = 1,
        StateSip = 2,
        CsUrbState = 3,
        ConstantBuffer = 4,
        SamplerStateArray = 5,
        InterfaceDescriptor = 6,
        VfeState = 7,
        BindingTableState = 8,
        AllocateScratchSurface = 9,
        AllocateSipSurface = 10,
        GlobalMemoryObjectKernelArgument = 11,
        ImageMemoryObjectKernelArgument = 12,
        ConstantMemoryObjectKernelArgument = 13,
        AllocateSurfaceWithInitialization = 14,
        AllocateLocalSurface = 15,
        SamplerKernelArgument = 16,
        DataParameterBuffer = 17,
        MediaVfeState = 18,
        MediaInterfaceDescriptorLoad = 19,
        MediaCurbeLoad = 20,
        InterfaceDescriptorData = 21,
        ThreadPayload = 22,
        ExecutionEnvironment = 23,
        AllocatePrivateMemory = 24,
        DataParameterStream = 25,
        KernelArgumentInfo = 26,
        KernelAttributesInfo = 27,
        String = 28,
        AllocatePrintfSurface = 29,
        StatelessGlobalMemoryObjectKernelArgument = 30,
        StatelessConstantMemoryObjectKernelArgument = 31,
        AllocateStatelessSurfaceWithInitialization = 32,
        AllocateStatelessPrintfSurface = 33,
        CbMapping = 34,
        Cb2CrGatherTable = 35,
        AllocateStatelessEventPoolSurface = 36,
        NullSurfaceLocation = 37,
        AllocateStatelessPrivateMemory = 38,
        AllocateConstantMemorySurfaceWithInitialization = 39,
        AllocateGlobalMemorySurfaceWithInitialization = 40,
        AllocateGlobalMemorySurfaceProgramBinaryInfo = 41,
        AllocateConstantMemorySurfaceProgramBinaryInfo = 42,
        AllocateStatelessGlobalMemorySurfaceWithInitialization = 43,
        AllocateStatelessConstantMemorySurfaceWithInitialization = 44,
        AllocateStatelessDefaultDeviceQueueSurface = 45,
        StatelessDeviceQueueKernelArgument = 46,
        GlobalPointerProgramBinaryInfo = 47,
        ConstantPointerProgramBinaryInfo = 48,
        ConstructorDestructorKernelProgramBinaryInfo = 49,
        InlineVmeSamplerInfo = 50,
        GtpinFreeGrfInfo = 51,
        GtpinInfo = 52,
        ProgramSymbolTable = 53,
        ProgramRelocationTable = 54,
        MediaVfeStateSlot1 = 55,
        AllocateSyncBuffer = 56,
        GlobalHostAccessTable = 57,
        AllocateRtGlobalBuffer = 58,
    }
}

impl PatchToken {
    /// Program scope records whose payload is followed by `InlineDataSize` bytes not counted in
    /// the record size.
    pub fn has_uncounted_inline_data(self) -> bool {
        matches!(
            self,
            Self::AllocateGlobalMemorySurfaceProgramBinaryInfo
                | Self::AllocateConstantMemorySurfaceProgramBinaryInfo
                | Self::ConstructorDestructorKernelProgramBinaryInfo
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_ids_are_dense() {
        assert_eq!(PatchToken::VARIANTS.len(), 59);
        for (i, token) in PatchToken::VARIANTS.iter().enumerate() {
            assert_eq!(token.as_u32(), i as u32);
        }
        assert_eq!(PatchToken::try_from(58).unwrap(), PatchToken::AllocateRtGlobalBuffer);
        assert!(PatchToken::try_from(59).is_err());
    }
}
