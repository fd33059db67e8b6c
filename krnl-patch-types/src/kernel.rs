use crate::{
    address::{AddressSpace, DataParameterType},
    image::ImageType,
    sampler::{AddressMode, CompareFunc, MapFilter, MipFilter, SamplerType},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{self, Debug},
};

/// Compiler output and annotations of one kernel.
///
/// Produced upstream by the code generator, read only by the binary builder. The
/// per-SIMD tables travel separately in [`KernelProgram`] because they are consumed.
#[derive(Default, Clone, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct KernelInfo {
    pub name: String,
    pub shader_hash: u64,
    pub pointer_inputs: Vec<PointerInput>,
    pub pointer_arguments: Vec<PointerArgument>,
    pub local_pointer_arguments: Vec<LocalPointerArgument>,
    /// Inline samplers declared in the kernel body.
    pub sampler_inputs: Vec<SamplerInput>,
    pub sampler_arguments: Vec<SamplerArgument>,
    pub constant_inputs: Vec<ConstantInput>,
    pub constant_arguments: Vec<ConstantArgument>,
    pub image_arguments: Vec<ImageArgument>,
    pub argument_infos: Vec<ArgumentInfo>,
    pub printf_strings: Vec<PrintfString>,
    pub printf_buffer: Option<PrintfBuffer>,
    pub sync_buffer: Option<ImplicitBuffer>,
    pub rt_global_buffer: Option<ImplicitBuffer>,
    pub start_gas: Option<StartGas>,
    pub window_size_gas: Option<PayloadSlot>,
    pub private_mem_size: Option<PayloadSlot>,
    /// Free-form attribute string, ie "reqd_work_group_size(8,1,1) vec_type_hint(float4)".
    pub attributes: String,
    pub has_inline_vme_samplers: bool,
    /// Maps argument numbers to binding table indices.
    pub arg_index_map: BTreeMap<u32, u32>,
    pub thread_payload: ThreadPayload,
    pub execution_environment: ExecutionEnvironment,
    pub constant_buffer_length: u32,
}

impl KernelInfo {
    pub fn from_bincode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
    pub fn to_bincode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }
    /// The binding table index of `argument_number`, if bound.
    pub fn binding_table_index(&self, argument_number: u32) -> Option<u32> {
        self.arg_index_map.get(&argument_number).copied()
    }
}

/// A pointer input with an initializer (constant/global buffers, private memory, queues, event pool).
#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct PointerInput {
    pub argument_number: u32,
    pub address_space: AddressSpace,
    pub is_stateless: bool,
    pub payload_position: u32,
    pub payload_size: u32,
    /// Only meaningful for [`AddressSpace::Private`].
    pub per_thread_private_memory_size: u32,
}

#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct PointerArgument {
    pub argument_number: u32,
    pub address_space: AddressSpace,
    pub is_stateless: bool,
    pub is_bindless_access: bool,
    pub binding_table_index: u32,
    pub payload_position: u32,
    pub payload_size: u32,
    pub second_payload_size: u32,
    pub location_index: u32,
    pub location_count: u32,
    pub is_emulation_argument: bool,
}

#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct LocalPointerArgument {
    pub argument_number: u32,
    pub payload_position: u32,
    pub payload_size: u32,
    pub alignment: u32,
    pub location_index: u32,
    pub location_count: u32,
}

#[derive(Default, Clone, Copy, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct SamplerInput {
    pub sampler_table_index: u32,
    pub sampler_type: SamplerType,
    pub tcx_address_mode: AddressMode,
    pub tcy_address_mode: AddressMode,
    pub tcz_address_mode: AddressMode,
    pub mag_filter: MapFilter,
    pub min_filter: MapFilter,
    pub mip_filter: MipFilter,
    pub normalized_coords: bool,
    pub compare_func: CompareFunc,
    /// RGBA.
    pub border_color: [f32; 4],
}

#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct SamplerArgument {
    pub argument_number: u32,
    pub sampler_type: SamplerType,
    pub sampler_table_index: u32,
    pub payload_position: u32,
    pub is_bindless_access: bool,
    pub location_index: u32,
    pub location_count: u32,
    pub is_emulation_argument: bool,
}

/// An implicit scalar the runtime writes into the payload (work sizes, parent event, ...).
#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct ConstantInput {
    pub argument_number: u32,
    pub constant_type: DataParameterType,
    pub offset: u32,
    pub payload_position: u32,
    pub payload_size: u32,
    pub location_index: u32,
    pub location_count: u32,
}

#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct ConstantArgument {
    pub argument_number: u32,
    pub offset: u32,
    pub payload_position: u32,
    pub payload_size: u32,
    pub location_index: u32,
    pub location_count: u32,
    pub is_emulation_argument: bool,
}

#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct ImageArgument {
    pub argument_number: u32,
    pub image_type: ImageType,
    pub is_fixed_binding_table_index: bool,
    pub is_bindless_access: bool,
    pub payload_position: u32,
    pub writeable: bool,
    pub location_index: u32,
    pub location_count: u32,
    pub is_emulation_argument: bool,
    pub accessed_by_int_coords: bool,
    pub accessed_by_float_coords: bool,
}

/// Reflection strings of a declared kernel argument.
#[derive(Default, Clone, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct ArgumentInfo {
    pub address_qualifier: String,
    pub access_qualifier: String,
    pub argument_name: String,
    pub type_name: String,
    pub type_qualifier: String,
}

#[derive(Default, Clone, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct PrintfString {
    pub index: u32,
    pub string: String,
}

#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct PrintfBuffer {
    pub argument_number: u32,
    pub index: u32,
    pub payload_position: u32,
    pub data_size: u32,
}

/// Sync and ray tracing global buffers.
#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct ImplicitBuffer {
    pub argument_number: u32,
    pub payload_position: u32,
    pub data_size: u32,
}

#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct StartGas {
    pub offset: u32,
    pub gpu_pointer_size: u32,
}

#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct PayloadSlot {
    pub offset: u32,
}

#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct ThreadPayload {
    pub has_local_id_x: bool,
    pub has_local_id_y: bool,
    pub has_local_id_z: bool,
    pub has_local_id: bool,
    pub has_global_id_offset: bool,
    pub has_group_id: bool,
    pub has_stage_in_grid_origin: bool,
    pub has_stage_in_grid_size: bool,
    pub compiled_for_indirect_payload_storage: bool,
    pub unused_per_thread_constant_present: bool,
    pub offset_to_skip_per_thread_data_load: u32,
    pub offset_to_skip_set_ffid_gp: u32,
    pub pass_inline_data_size: u32,
    pub has_rt_stack_id: bool,
    pub generate_local_id: bool,
    pub emit_local_mask: u32,
    pub walk_order: u32,
    pub tile_y: bool,
}

#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct ExecutionEnvironment {
    pub fixed_work_group_size: Option<[u32; 3]>,
    pub workgroup_walk_order: [u32; 3],
    /// 1 (CM kernels), 8, 16 or 32.
    pub compiled_simd_size: u32,
    pub compiled_sub_groups_number: u32,
    /// Number of named barriers used, 0 if none.
    pub has_barriers: u32,
    pub disable_mid_thread_preemption: bool,
    pub per_thread_scratch_space: u32,
    pub per_thread_scratch_space_slot1: u32,
    pub sum_fixed_tgsm_sizes: u32,
    pub has_read_write_images: bool,
    pub is_initializer: bool,
    pub is_finalizer: bool,
    pub subgroup_independent_forward_progress_required: bool,
    pub compiled_for_greater_than_4gb_buffers: bool,
    pub num_grf_required: u32,
    pub has_global_atomics: bool,
    pub has_dpas: bool,
    pub has_rt_calls: bool,
    pub num_threads: u32,
    pub stateless_writes_count: u32,
    pub indirect_stateless_count: u32,
    pub use_bindless_mode: bool,
    pub has_stack_calls: bool,
    pub simd_info: u64,
    pub require_disable_eu_fusion: bool,
    pub is_single_program_flow: bool,
}

/// An opaque table emitted verbatim after its patch header.
#[derive(Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionTable {
    pub data: Vec<u8>,
    pub entries: u32,
}

impl FunctionTable {
    pub fn new(data: Vec<u8>, entries: u32) -> Self {
        Self { data, entries }
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FunctionTable({} entries, {}B)", self.entries, self.data.len())
    }
}

/// Tables produced for one SIMD width.
#[derive(Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimdOutput {
    pub gtpin: Vec<u8>,
    pub symbol_table: FunctionTable,
    pub relocation_table: FunctionTable,
    pub global_host_access_table: FunctionTable,
}

impl Debug for SimdOutput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SimdOutput")
            .field("gtpin", &format_args!("{}B", self.gtpin.len()))
            .field("symbol_table", &self.symbol_table)
            .field("relocation_table", &self.relocation_table)
            .field("global_host_access_table", &self.global_host_access_table)
            .finish()
    }
}

/// Per-SIMD-width outputs, handed to the builder by value.
#[derive(Default, Clone, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct KernelProgram {
    pub simd1: SimdOutput,
    pub simd8: SimdOutput,
    pub simd16: SimdOutput,
    pub simd32: SimdOutput,
}

impl KernelProgram {
    /// Takes the outputs compiled for `simd_size`, leaving the slot empty.
    ///
    /// Returns an empty output for sizes other than 1, 8, 16 and 32.
    pub fn take(&mut self, simd_size: u32) -> SimdOutput {
        let slot = match simd_size {
            1 => &mut self.simd1,
            8 => &mut self.simd8,
            16 => &mut self.simd16,
            32 => &mut self.simd32,
            _ => return SimdOutput::default(),
        };
        std::mem::take(slot)
    }
}
