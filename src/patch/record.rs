//! Payloads of patch list records, laid out as read by the driver.
//!
//! Every record is preceded on the wire by a [`PatchItemHeader`]. Records holding a `u64` are
//! packed, read their fields by value.

use super::{PatchRecord, PatchToken};
use bytemuck::{Pod, Zeroable};

/// `[token][size]`, size includes the header.
#[repr(C)]
#[derive(Default, Clone, Copy, Eq, PartialEq, Pod, Zeroable, Debug)]
pub struct PatchItemHeader {
    pub token: u32,
    pub size: u32,
}

macro_rules! patch_records {
    ($(
        $(#[$meta:meta])*
        $token:ident => pub struct $name:ident {
            $($(#[$fmeta:meta])* pub $field:ident: $ty:ty,)*
        }
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Default, Clone, Copy, Eq, PartialEq, Pod, Zeroable, Debug)]
            pub struct $name {
                $($(#[$fmeta])* pub $field: $ty,)*
            }

            impl PatchRecord for $name {
                const TOKEN: PatchToken = PatchToken::$token;
            }
        )*
    };
}

patch_records! {
    #[repr(C)]
    StateSip => pub struct StateSip {
        pub system_kernel_offset: u32,
    }

    #[repr(C)]
    MediaVfeState => pub struct MediaVfeState {
        pub scratch_space_offset: u32,
        pub per_thread_scratch_space: u32,
    }

    #[repr(C)]
    MediaVfeStateSlot1 => pub struct MediaVfeStateSlot1 {
        pub scratch_space_offset: u32,
        pub per_thread_scratch_space: u32,
    }

    #[repr(C)]
    MediaInterfaceDescriptorLoad => pub struct MediaInterfaceDescriptorLoad {
        pub interface_descriptor_data_offset: u32,
    }

    /// Header only marker.
    #[repr(C)]
    InlineVmeSamplerInfo => pub struct InlineVmeSamplerInfo {}

    #[repr(C)]
    SamplerStateArray => pub struct SamplerStateArray {
        pub offset: u32,
        pub count: u32,
        pub border_color_offset: u32,
    }

    #[repr(C)]
    SamplerKernelArgument => pub struct SamplerKernelArgument {
        pub argument_number: u32,
        pub sampler_type: u32,
        pub offset: u32,
        pub location_index: u32,
        pub location_index2: u32,
        pub need_bindless_handle: u32,
        pub texture_mask: u32,
        pub is_emulation_argument: u32,
        pub bti_offset: u32,
    }

    #[repr(C)]
    InterfaceDescriptorData => pub struct InterfaceDescriptorData {
        pub offset: u32,
        pub sampler_state_offset: u32,
        pub kernel_offset: u32,
        pub binding_table_offset: u32,
    }

    #[repr(C)]
    BindingTableState => pub struct BindingTableState {
        pub offset: u32,
        pub count: u32,
        pub surface_state_offset: u32,
    }

    #[repr(C)]
    ImageMemoryObjectKernelArgument => pub struct ImageMemoryObjectKernelArgument {
        pub argument_number: u32,
        pub image_type: u32,
        pub offset: u32,
        pub location_index: u32,
        pub location_index2: u32,
        pub writeable: u32,
        pub transformable: u32,
        pub need_bindless_handle: u32,
        pub is_emulation_argument: u32,
        pub bti_offset: u32,
    }

    #[repr(C)]
    AllocateLocalSurface => pub struct AllocateLocalSurface {
        pub offset: u32,
        pub total_inline_local_memory_size: u32,
    }

    #[repr(C)]
    AllocateSipSurface => pub struct AllocateSystemThreadSurface {
        pub offset: u32,
        pub per_thread_system_thread_surface_size: u32,
        pub bti: u32,
    }

    #[repr(C)]
    DataParameterBuffer => pub struct DataParameterBuffer {
        pub parameter_type: u32,
        pub argument_number: u32,
        pub offset: u32,
        pub data_size: u32,
        pub source_offset: u32,
        pub location_index: u32,
        pub location_index2: u32,
        pub is_emulation_argument: u32,
    }

    #[repr(C)]
    StatelessGlobalMemoryObjectKernelArgument => pub struct StatelessGlobalMemoryObjectKernelArgument {
        pub argument_number: u32,
        pub surface_state_heap_offset: u32,
        pub data_param_offset: u32,
        pub data_param_size: u32,
        pub location_index: u32,
        pub location_index2: u32,
        pub is_emulation_argument: u32,
    }

    #[repr(C)]
    StatelessConstantMemoryObjectKernelArgument => pub struct StatelessConstantMemoryObjectKernelArgument {
        pub argument_number: u32,
        pub surface_state_heap_offset: u32,
        pub data_param_offset: u32,
        pub data_param_size: u32,
        pub location_index: u32,
        pub location_index2: u32,
        pub is_emulation_argument: u32,
    }

    #[repr(C)]
    StatelessDeviceQueueKernelArgument => pub struct StatelessDeviceQueueKernelArgument {
        pub argument_number: u32,
        pub surface_state_heap_offset: u32,
        pub data_param_offset: u32,
        pub data_param_size: u32,
        pub location_index: u32,
        pub location_index2: u32,
        pub is_emulation_argument: u32,
    }

    #[repr(C)]
    AllocateStatelessPrintfSurface => pub struct AllocateStatelessPrintfSurface {
        pub printf_surface_index: u32,
        pub surface_state_heap_offset: u32,
        pub data_param_offset: u32,
        pub data_param_size: u32,
    }

    #[repr(C)]
    AllocateSyncBuffer => pub struct AllocateSyncBuffer {
        pub surface_state_heap_offset: u32,
        pub data_param_offset: u32,
        pub data_param_size: u32,
    }

    #[repr(C)]
    AllocateRtGlobalBuffer => pub struct AllocateRtGlobalBuffer {
        pub surface_state_heap_offset: u32,
        pub data_param_offset: u32,
        pub data_param_size: u32,
    }

    #[repr(C)]
    AllocateStatelessConstantMemorySurfaceWithInitialization => pub struct AllocateStatelessConstantMemorySurfaceWithInitialization {
        pub constant_buffer_index: u32,
        pub surface_state_heap_offset: u32,
        pub data_param_offset: u32,
        pub data_param_size: u32,
    }

    #[repr(C)]
    AllocateStatelessGlobalMemorySurfaceWithInitialization => pub struct AllocateStatelessGlobalMemorySurfaceWithInitialization {
        pub global_buffer_index: u32,
        pub surface_state_heap_offset: u32,
        pub data_param_offset: u32,
        pub data_param_size: u32,
    }

    #[repr(C)]
    AllocateStatelessPrivateMemory => pub struct AllocateStatelessPrivateSurface {
        pub surface_state_heap_offset: u32,
        pub data_param_offset: u32,
        pub data_param_size: u32,
        pub per_thread_private_memory_size: u32,
        /// Allocated per SIMT lane instead of per hardware thread.
        pub is_simt_thread: u32,
    }

    #[repr(C)]
    AllocateStatelessDefaultDeviceQueueSurface => pub struct AllocateStatelessDefaultDeviceQueueSurface {
        pub surface_state_heap_offset: u32,
        pub data_param_offset: u32,
        pub data_param_size: u32,
    }

    #[repr(C)]
    AllocateStatelessEventPoolSurface => pub struct AllocateStatelessEventPoolSurface {
        pub event_pool_surface_index: u32,
        pub surface_state_heap_offset: u32,
        pub data_param_offset: u32,
        pub data_param_size: u32,
    }

    #[repr(C)]
    DataParameterStream => pub struct DataParameterStream {
        pub data_parameter_stream_size: u32,
    }

    #[repr(C)]
    ThreadPayload => pub struct ThreadPayload {
        pub header_present: u32,
        pub local_idx_present: u32,
        pub local_idy_present: u32,
        pub local_idz_present: u32,
        pub local_id_flattened_present: u32,
        pub indirect_payload_storage: u32,
        pub unused_per_thread_constant_present: u32,
        pub get_local_id_present: u32,
        pub get_group_id_present: u32,
        pub get_global_offset_present: u32,
        pub stage_in_grid_origin_present: u32,
        pub stage_in_grid_size_present: u32,
        pub offset_to_skip_per_thread_data_load: u32,
        pub offset_to_skip_set_ffid_gp: u32,
        pub pass_inline_data: u32,
        pub rt_stack_id_present: u32,
        pub generate_local_id: u32,
        pub emit_local_mask: u32,
        pub walk_order: u32,
        pub tile_y: u32,
    }

    #[repr(C, packed)]
    ExecutionEnvironment => pub struct ExecutionEnvironment {
        pub required_work_group_size_x: u32,
        pub required_work_group_size_y: u32,
        pub required_work_group_size_z: u32,
        pub largest_compiled_simd_size: u32,
        pub compiled_sub_groups_number: u32,
        pub has_barriers: u32,
        pub disable_mid_thread_preemption: u32,
        pub compiled_simd8: u32,
        pub compiled_simd16: u32,
        pub compiled_simd32: u32,
        pub has_device_enqueue: u32,
        pub may_access_undeclared_resource: u32,
        pub uses_fences_for_read_write_images: u32,
        pub uses_stateless_spill_fill: u32,
        pub uses_multi_scratch_spaces: u32,
        pub is_coherent: u32,
        pub is_initializer: u32,
        pub is_finalizer: u32,
        pub subgroup_independent_forward_progress_required: u32,
        pub compiled_for_greater_than_4gb_buffers: u32,
        pub num_grf_required: u32,
        /// dim0 in bits 0..2, dim1 in 2..4, dim2 in 4..6.
        pub workgroup_walk_order_dims: u32,
        pub has_global_atomics: u32,
        pub has_dpas: u32,
        pub has_rt_calls: u32,
        pub num_threads_required: u32,
        pub stateless_writes_count: u32,
        pub indirect_stateless_count: u32,
        pub use_bindless_mode: u32,
        pub has_stack_calls: u32,
        pub simd_info: u64,
        pub require_disable_eu_fusion: u32,
    }

    #[repr(C)]
    KernelAttributesInfo => pub struct KernelAttributesInfo {
        pub attributes_size: u32,
    }

    #[repr(C)]
    KernelArgumentInfo => pub struct KernelArgumentInfo {
        pub argument_number: u32,
        pub address_qualifier_size: u32,
        pub access_qualifier_size: u32,
        pub argument_name_size: u32,
        pub type_name_size: u32,
        pub type_qualifier_size: u32,
    }

    #[repr(C)]
    String => pub struct StringInfo {
        pub index: u32,
        pub string_size: u32,
    }

    /// Header only, the opaque payload follows.
    #[repr(C)]
    GtpinInfo => pub struct GtpinInfo {}

    #[repr(C)]
    ProgramSymbolTable => pub struct SymbolTableInfo {
        pub num_entries: u32,
    }

    #[repr(C)]
    ProgramRelocationTable => pub struct RelocationTableInfo {
        pub num_entries: u32,
    }

    #[repr(C)]
    GlobalHostAccessTable => pub struct GlobalHostAccessTableInfo {
        pub num_entries: u32,
    }

    #[repr(C)]
    AllocateConstantMemorySurfaceProgramBinaryInfo => pub struct AllocateConstantMemorySurfaceProgramBinaryInfo {
        pub constant_buffer_index: u32,
        pub inline_data_size: u32,
    }

    #[repr(C)]
    AllocateGlobalMemorySurfaceProgramBinaryInfo => pub struct AllocateGlobalMemorySurfaceProgramBinaryInfo {
        pub global_buffer_type: u32,
        pub global_buffer_index: u32,
        pub inline_data_size: u32,
    }

    #[repr(C)]
    ConstructorDestructorKernelProgramBinaryInfo => pub struct KernelTypeProgramBinaryInfo {
        pub kernel_type: u32,
        pub inline_data_size: u32,
    }

    #[repr(C, packed)]
    GlobalPointerProgramBinaryInfo => pub struct GlobalPointerProgramBinaryInfo {
        pub global_buffer_index: u32,
        pub global_pointer_offset: u64,
        pub buffer_type: u32,
        pub buffer_index: u32,
    }

    #[repr(C, packed)]
    ConstantPointerProgramBinaryInfo => pub struct ConstantPointerProgramBinaryInfo {
        pub constant_buffer_index: u32,
        pub constant_pointer_offset: u64,
        pub buffer_type: u32,
        pub buffer_index: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn payload_sizes() {
        assert_eq!(size_of::<PatchItemHeader>(), 8);
        assert_eq!(size_of::<ExecutionEnvironment>(), 132);
        assert_eq!(size_of::<ThreadPayload>(), 80);
        assert_eq!(size_of::<ImageMemoryObjectKernelArgument>(), 40);
        assert_eq!(size_of::<SamplerKernelArgument>(), 36);
        assert_eq!(size_of::<DataParameterBuffer>(), 32);
        assert_eq!(size_of::<KernelArgumentInfo>(), 24);
        assert_eq!(size_of::<StatelessGlobalMemoryObjectKernelArgument>(), 28);
        assert_eq!(size_of::<GlobalPointerProgramBinaryInfo>(), 20);
        assert_eq!(size_of::<InlineVmeSamplerInfo>(), 0);
    }
}
