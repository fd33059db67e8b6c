/*!
Patch list records and the kernel patch list builder.

A patch list is a sequence of `[token][size][payload]` records. `size` counts the header and
every trailing byte, except for the program scope records listed by
[`PatchToken::has_uncounted_inline_data`].
*/

use crate::{
    caps::BuildContext,
    error::invalid_metadata,
    heap::argument_bti,
    layout::{LayoutContext, Phase},
    result::Result,
    stream::{align_up, checked_align_up, BinaryStream},
    types::{
        address::{AddressSpace, DataParameterType, DATA_PARAMETER_DATA_SIZE},
        image::ImageType,
        kernel::{FunctionTable, KernelInfo, SimdOutput},
        sampler::{AddressMode, MapFilter, SamplerType},
    },
};
use bytemuck::Pod;
use std::mem::size_of;
use tracing::{debug, trace};

pub mod record;
mod token;

use record::*;
pub use token::PatchToken;

/// A record payload with a fixed token.
pub trait PatchRecord: Pod {
    const TOKEN: PatchToken;
}

/// Appends records to a patch list.
#[derive(Default, Debug)]
pub struct PatchListWriter {
    stream: BinaryStream,
}

impl PatchListWriter {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.stream.len()
    }
    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }
    pub fn into_stream(self) -> BinaryStream {
        self.stream
    }
    /// Writes a record with no trailing payload.
    pub fn add<T: PatchRecord>(&mut self, record: &T) -> Result<()> {
        let size = size_of::<PatchItemHeader>() + size_of::<T>();
        let header = PatchItemHeader {
            token: T::TOKEN.as_u32(),
            size: size as u32,
        };
        self.stream.write_pod(&header)?;
        self.stream.write_pod(record)?;
        trace!(token = %T::TOKEN, size, "patch");
        Ok(())
    }
    /// Writes a record followed by a payload produced by `f`.
    ///
    /// `f` may fill in size fields of `record`, which is rewritten along with the final size
    /// once the payload is written.
    pub fn add_deferred<T, F>(&mut self, record: &mut T, f: F) -> Result<()>
    where
        T: PatchRecord,
        F: FnOnce(&mut T, &mut BinaryStream) -> Result<()>,
    {
        let start = self.stream.len();
        let mut header = PatchItemHeader {
            token: T::TOKEN.as_u32(),
            size: 0,
        };
        self.stream.write_pod(&header)?;
        self.stream.write_pod(record)?;
        f(record, &mut self.stream)?;
        let size = self.stream.len() - start;
        header.size = size as u32;
        self.stream.write_at(&header, start)?;
        self.stream
            .write_at(record, start + size_of::<PatchItemHeader>())?;
        trace!(token = %T::TOKEN, size, "patch");
        Ok(())
    }
    /// Writes a record followed by inline data that its size does not count.
    pub fn add_with_inline_data<T: PatchRecord>(
        &mut self,
        record: &T,
        data: &[u8],
        padding: usize,
    ) -> Result<()> {
        self.add(record)?;
        self.stream.write(data)?;
        self.stream.add_padding(padding)
    }
}

/// Writes `string` NUL padded to `align_up(len + 1, 4)` bytes and returns the padded size.
pub fn pad_string(stream: &mut BinaryStream, string: &str) -> Result<u32> {
    let len = string.len();
    let padded = align_up(len as u32 + 1, 4);
    stream.write(string.as_bytes())?;
    stream.add_padding(padded as usize - len)?;
    Ok(padded)
}

/// `value` if it is a power of two or 0, otherwise the next power of two.
pub fn round_pow2(value: u32) -> Result<u32> {
    if value == 0 {
        return Ok(0);
    }
    value
        .checked_next_power_of_two()
        .ok_or_else(|| invalid_metadata!("{value} does not round to a u32 power of two"))
}

/// End of a payload slot within the data parameter stream.
fn payload_end(offset: u32, size: u32) -> Result<u32> {
    offset
        .checked_add(size)
        .ok_or_else(|| invalid_metadata!("payload end {offset} + {size} overflows"))
}

/// Encodes a barrier count for the execution environment.
///
/// 0 and 1 encode as themselves, larger counts pass through up to 255.
pub fn encode_num_barriers(count: u32) -> Result<u32> {
    match count {
        0..=255 => Ok(count),
        _ => Err(invalid_metadata!("{count} barriers")),
    }
}

const SYSTEM_THREAD_SURFACE_SIZE: u32 = 0x1800;
const MIN_SCRATCH_SPACE_SIZE: u32 = 1024;

const KERNEL_ATTRIBUTES: [&str; 4] = [
    "reqd_sub_group_size",
    "reqd_work_group_size",
    "vec_type_hint",
    "work_group_size_hint",
];

/// The driver visible subset of a kernel attribute string.
pub fn filter_kernel_attributes(attributes: &str) -> String {
    attributes
        .split_whitespace()
        .filter(|x| KERNEL_ATTRIBUTES.iter().any(|attr| x.contains(attr)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn inline_samplers_allow_3d_image_transform(kernel: &KernelInfo) -> bool {
    kernel
        .sampler_inputs
        .iter()
        .filter(|x| x.sampler_type == SamplerType::Texture)
        .all(|x| {
            !x.normalized_coords
                && [x.tcx_address_mode, x.tcy_address_mode, x.tcz_address_mode]
                    .iter()
                    .all(|mode| *mode == AddressMode::Clamp)
                && x.mag_filter == MapFilter::Point
                && x.min_filter == MapFilter::Point
        })
}

fn add_table<T: PatchRecord>(
    writer: &mut PatchListWriter,
    mut record: T,
    table: FunctionTable,
) -> Result<()> {
    if table.is_empty() {
        return Ok(());
    }
    writer.add_deferred(&mut record, |_, stream| stream.write(&table.data))
}

/// Device enqueue usage collected while writing data parameters.
#[derive(Default, Debug)]
struct DeviceEnqueue {
    has_parent_event: bool,
    has_default_queue: bool,
    has_queue_arg: bool,
}

impl DeviceEnqueue {
    fn enabled(&self) -> bool {
        self.has_parent_event && (self.has_default_queue || self.has_queue_arg)
    }
}

/// Emits the kernel patch list.
///
/// `tables` are the outputs of the compiled SIMD width, consumed here.
pub fn build_patch_list(
    layout: &mut LayoutContext,
    kernel: &KernelInfo,
    tables: SimdOutput,
    context: &BuildContext,
) -> Result<BinaryStream> {
    layout.expect(Phase::DynamicHeapBuilt)?;
    let platform = &context.platform;
    let options = &context.options;
    let env = &kernel.execution_environment;
    let mut writer = PatchListWriter::new();
    let mut data_parameter_stream_size = 0u32;
    let mut widen = |end: u32| data_parameter_stream_size = data_parameter_stream_size.max(end);
    let mut device_enqueue = DeviceEnqueue::default();

    if let Some(system_kernel_offset) = layout.kernel.system_kernel_offset {
        writer.add(&StateSip {
            system_kernel_offset,
        })?;
    }
    if env.per_thread_scratch_space > 0 {
        writer.add(&MediaVfeState {
            scratch_space_offset: 0,
            per_thread_scratch_space: round_pow2(
                env.per_thread_scratch_space.max(MIN_SCRATCH_SPACE_SIZE),
            )?,
        })?;
    }
    if env.per_thread_scratch_space_slot1 > 0 {
        writer.add(&MediaVfeStateSlot1 {
            scratch_space_offset: 0,
            per_thread_scratch_space: round_pow2(
                env.per_thread_scratch_space_slot1
                    .max(MIN_SCRATCH_SPACE_SIZE),
            )?,
        })?;
    }
    writer.add(&MediaInterfaceDescriptorLoad {
        interface_descriptor_data_offset: layout.dynamic.interface_descriptor_offset,
    })?;
    if kernel.has_inline_vme_samplers {
        writer.add(&InlineVmeSamplerInfo {})?;
    }

    if layout.dynamic.sampler_count > 0 {
        writer.add(&SamplerStateArray {
            offset: layout.dynamic.sampler_array_offset,
            count: layout.dynamic.sampler_count,
            border_color_offset: layout.dynamic.border_color_offset,
        })?;
        for sampler in kernel.sampler_arguments.iter() {
            let sampler_offset = layout.sampler_offset(sampler.sampler_table_index)?;
            let offset = if sampler.is_bindless_access {
                widen(payload_end(sampler.payload_position, 8)?);
                sampler.payload_position
            } else {
                sampler_offset
            };
            writer.add(&SamplerKernelArgument {
                argument_number: sampler.argument_number,
                sampler_type: sampler.sampler_type.as_u32(),
                offset,
                location_index: sampler.location_index,
                location_index2: sampler.location_count,
                need_bindless_handle: sampler.is_bindless_access as u32,
                texture_mask: 0,
                is_emulation_argument: sampler.is_emulation_argument as u32,
                bti_offset: sampler_offset,
            })?;
        }
    }

    writer.add(&InterfaceDescriptorData {
        offset: layout.dynamic.interface_descriptor_offset,
        sampler_state_offset: layout.dynamic.sampler_array_offset,
        kernel_offset: layout.kernel.kernel_offset,
        binding_table_offset: layout.surface.binding_table_offset,
    })?;
    writer.add(&BindingTableState {
        offset: layout.surface.binding_table_offset,
        count: layout.surface.binding_table_count,
        surface_state_offset: layout.surface.surface_array_offset,
    })?;

    let transformable =
        platform.allows_3d_image_transform && inline_samplers_allow_3d_image_transform(kernel);
    for image in kernel.image_arguments.iter() {
        let surface_offset = layout.surface_offset(argument_bti(kernel, image.argument_number)?)?;
        let offset = if image.is_bindless_access {
            widen(payload_end(image.payload_position, 8)?);
            image.payload_position
        } else {
            surface_offset
        };
        let transformable = transformable
            && image.accessed_by_int_coords
            && !image.accessed_by_float_coords
            && image.image_type == ImageType::Image3D;
        writer.add(&ImageMemoryObjectKernelArgument {
            argument_number: image.argument_number,
            image_type: image.image_type.as_u32(),
            offset,
            location_index: image.location_index,
            location_index2: image.location_count,
            writeable: image.writeable as u32,
            transformable: transformable as u32,
            need_bindless_handle: image.is_bindless_access as u32,
            is_emulation_argument: image.is_emulation_argument as u32,
            bti_offset: surface_offset,
        })?;
    }

    if env.sum_fixed_tgsm_sizes > 0 {
        writer.add(&AllocateLocalSurface {
            offset: 0,
            total_inline_local_memory_size: env.sum_fixed_tgsm_sizes,
        })?;
    }
    if options.debuggable {
        writer.add(&AllocateSystemThreadSurface {
            offset: layout.surface_offset(options.system_thread_bti)?,
            per_thread_system_thread_surface_size: SYSTEM_THREAD_SURFACE_SIZE,
            bti: options.system_thread_bti,
        })?;
    }

    for local in kernel.local_pointer_arguments.iter() {
        writer.add(&DataParameterBuffer {
            parameter_type: DataParameterType::SumOfLocalMemoryObjectArgumentSizes.as_u32(),
            argument_number: local.argument_number,
            offset: local.payload_position,
            data_size: local.payload_size,
            source_offset: local.alignment,
            location_index: local.location_index,
            location_index2: local.location_count,
            is_emulation_argument: 0,
        })?;
        widen(payload_end(local.payload_position, local.payload_size)?);
    }
    for input in kernel.constant_inputs.iter() {
        if input.constant_type == DataParameterType::ParentEvent {
            device_enqueue.has_parent_event = true;
        }
        writer.add(&DataParameterBuffer {
            parameter_type: input.constant_type.as_u32(),
            argument_number: input.argument_number,
            offset: input.payload_position,
            data_size: input.payload_size,
            source_offset: input.offset,
            location_index: input.location_index,
            location_index2: input.location_count,
            is_emulation_argument: 0,
        })?;
        widen(payload_end(input.payload_position, input.payload_size)?);
    }
    for argument in kernel.pointer_arguments.iter() {
        if !(argument.is_stateless || argument.is_bindless_access) {
            return Err(invalid_metadata!(
                "pointer argument {} is neither stateless nor bindless",
                argument.argument_number
            ));
        }
        let bti = argument_bti(kernel, argument.argument_number)?;
        let data_param_offset = argument.payload_position;
        let data_param_size = argument.payload_size;
        let location_index = argument.location_index;
        let location_index2 = argument.location_count;
        let is_emulation_argument = argument.is_emulation_argument as u32;
        match argument.address_space {
            AddressSpace::Global => {
                let surface_state_heap_offset =
                    if options.bindless_mode && !options.bindless_legacy_mode {
                        widen(payload_end(
                            argument.binding_table_index,
                            argument.second_payload_size,
                        )?);
                        argument.binding_table_index
                    } else {
                        layout.surface_offset(bti)?
                    };
                writer.add(&StatelessGlobalMemoryObjectKernelArgument {
                    argument_number: argument.argument_number,
                    surface_state_heap_offset,
                    data_param_offset,
                    data_param_size,
                    location_index,
                    location_index2,
                    is_emulation_argument,
                })?;
            }
            AddressSpace::Constant => {
                writer.add(&StatelessConstantMemoryObjectKernelArgument {
                    argument_number: argument.argument_number,
                    surface_state_heap_offset: layout.surface_offset(bti)?,
                    data_param_offset,
                    data_param_size,
                    location_index,
                    location_index2,
                    is_emulation_argument,
                })?;
            }
            AddressSpace::DeviceQueue => {
                device_enqueue.has_queue_arg = true;
                writer.add(&StatelessDeviceQueueKernelArgument {
                    argument_number: argument.argument_number,
                    surface_state_heap_offset: layout.surface_offset(bti)?,
                    data_param_offset,
                    data_param_size,
                    location_index,
                    location_index2,
                    is_emulation_argument,
                })?;
            }
            address_space => {
                return Err(invalid_metadata!(
                    "pointer argument {} in address space {address_space}",
                    argument.argument_number
                ))
            }
        }
        widen(payload_end(data_param_offset, data_param_size)?);
    }

    if let Some(printf) = kernel.printf_buffer.as_ref() {
        writer.add(&AllocateStatelessPrintfSurface {
            printf_surface_index: printf.index,
            surface_state_heap_offset: layout
                .surface_offset(argument_bti(kernel, printf.argument_number)?)?,
            data_param_offset: printf.payload_position,
            data_param_size: printf.data_size,
        })?;
        widen(payload_end(printf.payload_position, printf.data_size)?);
    }
    if let Some(sync) = kernel.sync_buffer.as_ref() {
        writer.add(&AllocateSyncBuffer {
            surface_state_heap_offset: layout
                .surface_offset(argument_bti(kernel, sync.argument_number)?)?,
            data_param_offset: sync.payload_position,
            data_param_size: sync.data_size,
        })?;
        widen(payload_end(sync.payload_position, sync.data_size)?);
    }
    if let Some(rt) = kernel.rt_global_buffer.as_ref() {
        writer.add(&AllocateRtGlobalBuffer {
            surface_state_heap_offset: layout
                .surface_offset(argument_bti(kernel, rt.argument_number)?)?,
            data_param_offset: rt.payload_position,
            data_param_size: rt.data_size,
        })?;
        widen(payload_end(rt.payload_position, rt.data_size)?);
    }

    for input in kernel.pointer_inputs.iter() {
        if !input.is_stateless {
            return Err(invalid_metadata!(
                "pointer input {} is not stateless",
                input.argument_number
            ));
        }
        let surface_state_heap_offset =
            layout.surface_offset(argument_bti(kernel, input.argument_number)?)?;
        let data_param_offset = input.payload_position;
        let data_param_size = input.payload_size;
        match input.address_space {
            AddressSpace::Constant => {
                writer.add(&AllocateStatelessConstantMemorySurfaceWithInitialization {
                    constant_buffer_index: 0,
                    surface_state_heap_offset,
                    data_param_offset,
                    data_param_size,
                })?;
            }
            AddressSpace::Global => {
                writer.add(&AllocateStatelessGlobalMemorySurfaceWithInitialization {
                    global_buffer_index: 0,
                    surface_state_heap_offset,
                    data_param_offset,
                    data_param_size,
                })?;
            }
            AddressSpace::Private => {
                writer.add(&AllocateStatelessPrivateSurface {
                    surface_state_heap_offset,
                    data_param_offset,
                    data_param_size,
                    per_thread_private_memory_size: options
                        .force_per_thread_private_memory_size
                        .max(input.per_thread_private_memory_size),
                    is_simt_thread: 1,
                })?;
            }
            AddressSpace::DefaultDeviceQueue => {
                device_enqueue.has_default_queue = true;
                writer.add(&AllocateStatelessDefaultDeviceQueueSurface {
                    surface_state_heap_offset,
                    data_param_offset,
                    data_param_size,
                })?;
            }
            AddressSpace::EventPool => {
                writer.add(&AllocateStatelessEventPoolSurface {
                    event_pool_surface_index: 0,
                    surface_state_heap_offset,
                    data_param_offset,
                    data_param_size,
                })?;
            }
            address_space => {
                return Err(invalid_metadata!(
                    "pointer input {} in address space {address_space}",
                    input.argument_number
                ))
            }
        }
        widen(payload_end(data_param_offset, data_param_size)?);
    }

    for argument in kernel.constant_arguments.iter() {
        writer.add(&DataParameterBuffer {
            parameter_type: DataParameterType::KernelArgument.as_u32(),
            argument_number: argument.argument_number,
            offset: argument.payload_position,
            data_size: argument.payload_size,
            source_offset: argument.offset,
            location_index: argument.location_index,
            location_index2: argument.location_count,
            is_emulation_argument: argument.is_emulation_argument as u32,
        })?;
        widen(payload_end(argument.payload_position, argument.payload_size)?);
    }

    if let Some(start_gas) = kernel.start_gas.as_ref() {
        writer.add(&DataParameterBuffer {
            parameter_type: DataParameterType::LocalMemoryStatelessWindowStartAddress.as_u32(),
            offset: start_gas.offset,
            data_size: start_gas.gpu_pointer_size,
            ..Default::default()
        })?;
        widen(payload_end(start_gas.offset, start_gas.gpu_pointer_size)?);
    }
    let slots = [
        (
            kernel.window_size_gas.as_ref(),
            DataParameterType::LocalMemoryStatelessWindowSize,
        ),
        (
            kernel.private_mem_size.as_ref(),
            DataParameterType::PrivateMemoryStatelessSize,
        ),
    ];
    for (slot, parameter_type) in slots {
        if let Some(slot) = slot {
            writer.add(&DataParameterBuffer {
                parameter_type: parameter_type.as_u32(),
                offset: slot.offset,
                data_size: DATA_PARAMETER_DATA_SIZE,
                ..Default::default()
            })?;
            widen(payload_end(slot.offset, DATA_PARAMETER_DATA_SIZE)?);
        }
    }

    let data_parameter_stream_size =
        checked_align_up(data_parameter_stream_size, 32).ok_or_else(|| {
            invalid_metadata!("data parameter stream of {data_parameter_stream_size} bytes")
        })?;
    writer.add(&DataParameterStream {
        data_parameter_stream_size,
    })?;

    let payload = &kernel.thread_payload;
    writer.add(&ThreadPayload {
        header_present: 0,
        local_idx_present: payload.has_local_id_x as u32,
        local_idy_present: payload.has_local_id_y as u32,
        local_idz_present: payload.has_local_id_z as u32,
        local_id_flattened_present: 0,
        indirect_payload_storage: payload.compiled_for_indirect_payload_storage as u32,
        unused_per_thread_constant_present: payload.unused_per_thread_constant_present as u32,
        get_local_id_present: payload.has_local_id as u32,
        get_group_id_present: payload.has_group_id as u32,
        get_global_offset_present: payload.has_global_id_offset as u32,
        stage_in_grid_origin_present: payload.has_stage_in_grid_origin as u32,
        stage_in_grid_size_present: payload.has_stage_in_grid_size as u32,
        offset_to_skip_per_thread_data_load: payload.offset_to_skip_per_thread_data_load,
        offset_to_skip_set_ffid_gp: payload.offset_to_skip_set_ffid_gp,
        pass_inline_data: (payload.pass_inline_data_size != 0) as u32,
        rt_stack_id_present: payload.has_rt_stack_id as u32,
        generate_local_id: payload.generate_local_id as u32,
        emit_local_mask: payload.emit_local_mask,
        walk_order: payload.walk_order,
        tile_y: payload.tile_y as u32,
    })?;

    let [x, y, z] = env.fixed_work_group_size.unwrap_or_default();
    let simd = env.compiled_simd_size;
    let largest_compiled_simd_size = match simd {
        1 => 1,
        32 => 32,
        16 => 16,
        _ => 8,
    };
    let (uses_stateless_spill_fill, uses_multi_scratch_spaces) =
        if platform.has_scratch_surface && options.separate_spill_pvt_scratch_space {
            (false, true)
        } else {
            (env.per_thread_scratch_space > 0, false)
        };
    let [walk0, walk1, walk2] = env.workgroup_walk_order;
    writer.add(&ExecutionEnvironment {
        required_work_group_size_x: x,
        required_work_group_size_y: y,
        required_work_group_size_z: z,
        largest_compiled_simd_size,
        compiled_sub_groups_number: env.compiled_sub_groups_number,
        has_barriers: encode_num_barriers(env.has_barriers)?,
        disable_mid_thread_preemption: env.disable_mid_thread_preemption as u32,
        compiled_simd8: (simd == 8) as u32,
        compiled_simd16: (simd == 16) as u32,
        compiled_simd32: (simd == 32) as u32,
        has_device_enqueue: device_enqueue.enabled() as u32,
        may_access_undeclared_resource: 0,
        uses_fences_for_read_write_images: env.has_read_write_images as u32,
        uses_stateless_spill_fill: uses_stateless_spill_fill as u32,
        uses_multi_scratch_spaces: uses_multi_scratch_spaces as u32,
        is_coherent: 0,
        is_initializer: env.is_initializer as u32,
        is_finalizer: env.is_finalizer as u32,
        subgroup_independent_forward_progress_required: env
            .subgroup_independent_forward_progress_required
            as u32,
        compiled_for_greater_than_4gb_buffers: env.compiled_for_greater_than_4gb_buffers as u32,
        num_grf_required: env.num_grf_required,
        workgroup_walk_order_dims: walk0 | (walk1 << 2) | (walk2 << 4),
        has_global_atomics: env.has_global_atomics as u32,
        has_dpas: env.has_dpas as u32,
        has_rt_calls: env.has_rt_calls as u32,
        num_threads_required: env.num_threads,
        stateless_writes_count: env.stateless_writes_count,
        indirect_stateless_count: env.indirect_stateless_count,
        use_bindless_mode: env.use_bindless_mode as u32,
        has_stack_calls: env.has_stack_calls as u32,
        simd_info: env.simd_info,
        require_disable_eu_fusion: env.require_disable_eu_fusion as u32,
    })?;

    let attributes = filter_kernel_attributes(&kernel.attributes);
    if !attributes.is_empty() {
        writer.add_deferred(&mut KernelAttributesInfo::default(), |record, stream| {
            record.attributes_size = pad_string(stream, &attributes)?;
            Ok(())
        })?;
    }
    for (argument_number, info) in kernel.argument_infos.iter().enumerate() {
        let mut record = KernelArgumentInfo {
            argument_number: argument_number as u32,
            ..Default::default()
        };
        writer.add_deferred(&mut record, |record, stream| {
            record.address_qualifier_size = pad_string(stream, &info.address_qualifier)?;
            record.access_qualifier_size = pad_string(stream, &info.access_qualifier)?;
            record.argument_name_size = pad_string(stream, &info.argument_name)?;
            record.type_name_size = pad_string(stream, &info.type_name)?;
            record.type_qualifier_size = pad_string(stream, &info.type_qualifier)?;
            Ok(())
        })?;
    }
    for string in kernel.printf_strings.iter() {
        let mut record = StringInfo {
            index: string.index,
            string_size: 0,
        };
        writer.add_deferred(&mut record, |record, stream| {
            record.string_size = pad_string(stream, &string.string)?;
            Ok(())
        })?;
    }

    let SimdOutput {
        gtpin,
        symbol_table,
        relocation_table,
        global_host_access_table,
    } = tables;
    if !gtpin.is_empty() {
        writer.add_deferred(&mut GtpinInfo {}, |_, stream| stream.write(&gtpin))?;
    }
    add_table(
        &mut writer,
        SymbolTableInfo {
            num_entries: symbol_table.entries,
        },
        symbol_table,
    )?;
    add_table(
        &mut writer,
        RelocationTableInfo {
            num_entries: relocation_table.entries,
        },
        relocation_table,
    )?;
    add_table(
        &mut writer,
        GlobalHostAccessTableInfo {
            num_entries: global_host_access_table.entries,
        },
        global_host_access_table,
    )?;

    debug!(
        kernel = %kernel.name,
        size = writer.len(),
        data_parameter_stream_size,
        "patch list"
    );
    layout.advance(Phase::PatchListBuilt)?;
    Ok(writer.into_stream())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        heap::{build_dynamic_state_heap, build_kernel_heap, build_surface_state_heap},
        types::kernel::{
            ArgumentInfo, ConstantArgument, ConstantInput, ImageArgument, ImplicitBuffer,
            PayloadSlot, PointerArgument, PointerInput, PrintfBuffer, StartGas,
        },
    };

    fn records(bytes: &[u8]) -> Vec<(PatchToken, &[u8])> {
        let mut records = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let header: PatchItemHeader = bytemuck::pod_read_unaligned(&rest[..8]);
            let (record, tail) = rest.split_at(header.size as usize);
            records.push((PatchToken::try_from(header.token).unwrap(), &record[8..]));
            rest = tail;
        }
        records
    }

    fn patch_list(kernel: &KernelInfo, context: &BuildContext) -> Result<(LayoutContext, Vec<u8>)> {
        let mut layout = LayoutContext::new();
        build_kernel_heap(&mut layout, &[0; 64], None, kernel, context)?;
        build_surface_state_heap(&mut layout, kernel, context)?;
        build_dynamic_state_heap(&mut layout, kernel, context)?;
        let list = build_patch_list(&mut layout, kernel, SimdOutput::default(), context)?;
        Ok((layout, list.into_bytes()))
    }

    fn find<T: PatchRecord>(list: &[u8]) -> Vec<T> {
        records(list)
            .into_iter()
            .filter(|(token, _)| *token == T::TOKEN)
            .map(|(_, payload)| bytemuck::pod_read_unaligned(&payload[..size_of::<T>()]))
            .collect()
    }

    #[test]
    fn pad_string_sizes() {
        let mut stream = BinaryStream::new();
        assert_eq!(pad_string(&mut stream, "abc").unwrap(), 4);
        assert_eq!(pad_string(&mut stream, "abcd").unwrap(), 8);
        assert_eq!(pad_string(&mut stream, "").unwrap(), 4);
        assert_eq!(stream.as_bytes(), b"abc\0abcd\0\0\0\0\0\0\0\0");
    }

    #[test]
    fn round_pow2_values() {
        assert_eq!(round_pow2(1024).unwrap(), 1024);
        assert_eq!(round_pow2(1025).unwrap(), 2048);
        assert_eq!(round_pow2(3000).unwrap(), 4096);
        assert_eq!(round_pow2(1).unwrap(), 1);
        assert_eq!(round_pow2(0).unwrap(), 0);
        assert_eq!(round_pow2(1 << 31).unwrap(), 1 << 31);
        assert!(round_pow2((1 << 31) + 1).is_err());
    }

    #[test]
    fn barrier_encoding() {
        assert_eq!(encode_num_barriers(0).unwrap(), 0);
        assert_eq!(encode_num_barriers(1).unwrap(), 1);
        assert_eq!(encode_num_barriers(4).unwrap(), 4);
        assert!(encode_num_barriers(256).is_err());
    }

    #[test]
    fn kernel_attributes_filter() {
        assert_eq!(
            filter_kernel_attributes("  reqd_work_group_size(8,1,1)  noinline vec_type_hint(float4)\t"),
            "reqd_work_group_size(8,1,1) vec_type_hint(float4)"
        );
        assert_eq!(filter_kernel_attributes("noinline always_inline"), "");
    }

    #[test]
    fn deferred_record_size() {
        let mut writer = PatchListWriter::new();
        let mut record = StringInfo {
            index: 7,
            string_size: 0,
        };
        writer
            .add_deferred(&mut record, |record, stream| {
                record.string_size = pad_string(stream, "%d\n")?;
                Ok(())
            })
            .unwrap();
        let bytes = writer.into_stream().into_bytes();
        assert_eq!(bytes.len(), 8 + 8 + 4);
        let header: PatchItemHeader = bytemuck::pod_read_unaligned(&bytes[..8]);
        assert_eq!(header.token, PatchToken::String.as_u32());
        assert_eq!(header.size, 20);
        let info: StringInfo = bytemuck::pod_read_unaligned(&bytes[8..16]);
        assert_eq!(info.index, 7);
        assert_eq!(info.string_size, 4);
    }

    #[test]
    fn patch_list_requires_dynamic_heap() {
        let mut layout = LayoutContext::new();
        let result = build_patch_list(
            &mut layout,
            &KernelInfo::default(),
            SimdOutput::default(),
            &BuildContext::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn minimal_record_order() {
        let (layout, list) = patch_list(&KernelInfo::default(), &BuildContext::default()).unwrap();
        let tokens: Vec<_> = records(&list).into_iter().map(|(token, _)| token).collect();
        assert_eq!(
            tokens,
            [
                PatchToken::MediaInterfaceDescriptorLoad,
                PatchToken::InterfaceDescriptorData,
                PatchToken::BindingTableState,
                PatchToken::DataParameterStream,
                PatchToken::ThreadPayload,
                PatchToken::ExecutionEnvironment,
            ]
        );
        assert_eq!(layout.phase(), Phase::PatchListBuilt);
        assert_eq!(find::<DataParameterStream>(&list)[0].data_parameter_stream_size, 0);
        let env = find::<ExecutionEnvironment>(&list)[0];
        assert_eq!({ env.largest_compiled_simd_size }, 8);
    }

    #[test]
    fn scratch_space_records() {
        let mut kernel = KernelInfo::default();
        kernel.execution_environment.per_thread_scratch_space = 100;
        kernel.execution_environment.per_thread_scratch_space_slot1 = 3000;
        let (_, list) = patch_list(&kernel, &BuildContext::default()).unwrap();
        assert_eq!(find::<MediaVfeState>(&list)[0].per_thread_scratch_space, 1024);
        assert_eq!(find::<MediaVfeStateSlot1>(&list)[0].per_thread_scratch_space, 4096);
        let env = find::<ExecutionEnvironment>(&list)[0];
        assert_eq!({ env.uses_stateless_spill_fill }, 1);
        assert_eq!({ env.uses_multi_scratch_spaces }, 0);
    }

    fn pointer_kernel(argument: PointerArgument) -> KernelInfo {
        let mut kernel = KernelInfo::default();
        kernel.arg_index_map.insert(argument.argument_number, 4);
        kernel.pointer_arguments.push(argument);
        kernel
    }

    #[test]
    fn bindless_global_pointer() {
        let kernel = pointer_kernel(PointerArgument {
            argument_number: 0,
            is_bindless_access: true,
            binding_table_index: 40,
            second_payload_size: 8,
            payload_position: 0,
            payload_size: 8,
            ..Default::default()
        });
        let context = BuildContext::builder().with_bindless_mode(true).build().unwrap();
        let (_, list) = patch_list(&kernel, &context).unwrap();
        let argument = find::<StatelessGlobalMemoryObjectKernelArgument>(&list)[0];
        assert_eq!(argument.surface_state_heap_offset, 40);
        assert!(find::<DataParameterStream>(&list)[0].data_parameter_stream_size >= 48);
    }

    #[test]
    fn stateful_pointer_is_invalid() {
        let kernel = pointer_kernel(PointerArgument::default());
        let err = patch_list(&kernel, &BuildContext::default()).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidMetadata(_)));
    }

    #[test]
    fn local_pointer_in_pointer_arguments_is_invalid() {
        let kernel = pointer_kernel(PointerArgument {
            address_space: AddressSpace::Local,
            is_stateless: true,
            ..Default::default()
        });
        assert!(patch_list(&kernel, &BuildContext::default()).is_err());
    }

    #[test]
    fn device_enqueue() {
        let mut kernel = pointer_kernel(PointerArgument {
            argument_number: 1,
            address_space: AddressSpace::DeviceQueue,
            is_stateless: true,
            payload_position: 8,
            payload_size: 8,
            ..Default::default()
        });
        kernel.constant_inputs.push(ConstantInput {
            constant_type: DataParameterType::ParentEvent,
            payload_position: 0,
            payload_size: 4,
            ..Default::default()
        });
        let (_, list) = patch_list(&kernel, &BuildContext::default()).unwrap();
        assert_eq!(find::<StatelessDeviceQueueKernelArgument>(&list).len(), 1);
        let env = find::<ExecutionEnvironment>(&list)[0];
        assert_eq!({ env.has_device_enqueue }, 1);
        assert_eq!(find::<DataParameterStream>(&list)[0].data_parameter_stream_size, 32);

        kernel.constant_inputs.clear();
        let (_, list) = patch_list(&kernel, &BuildContext::default()).unwrap();
        let env = find::<ExecutionEnvironment>(&list)[0];
        assert_eq!({ env.has_device_enqueue }, 0);
    }

    #[test]
    fn private_memory_input() {
        let mut kernel = KernelInfo::default();
        kernel.arg_index_map.insert(2, 1);
        kernel.pointer_inputs.push(PointerInput {
            argument_number: 2,
            address_space: AddressSpace::Private,
            is_stateless: true,
            payload_position: 32,
            payload_size: 8,
            per_thread_private_memory_size: 256,
        });
        let context = BuildContext::builder()
            .with_force_per_thread_private_memory_size(1024)
            .build()
            .unwrap();
        let (_, list) = patch_list(&kernel, &context).unwrap();
        let private = find::<AllocateStatelessPrivateSurface>(&list)[0];
        assert_eq!(private.per_thread_private_memory_size, 1024);
        assert_eq!(private.is_simt_thread, 1);
        assert_eq!(find::<DataParameterStream>(&list)[0].data_parameter_stream_size, 64);
    }

    #[test]
    fn image_transformable() {
        let mut kernel = KernelInfo::default();
        kernel.arg_index_map.insert(0, 0);
        kernel.image_arguments.push(ImageArgument {
            argument_number: 0,
            image_type: ImageType::Image3D,
            is_fixed_binding_table_index: true,
            accessed_by_int_coords: true,
            ..Default::default()
        });
        let (_, list) = patch_list(&kernel, &BuildContext::default()).unwrap();
        assert_eq!(find::<ImageMemoryObjectKernelArgument>(&list)[0].transformable, 1);

        kernel.image_arguments[0].accessed_by_float_coords = true;
        let (_, list) = patch_list(&kernel, &BuildContext::default()).unwrap();
        assert_eq!(find::<ImageMemoryObjectKernelArgument>(&list)[0].transformable, 0);
    }

    #[test]
    fn reflection_strings() {
        let mut kernel = KernelInfo {
            attributes: "reqd_work_group_size(16,1,1)".into(),
            ..Default::default()
        };
        kernel.argument_infos.push(ArgumentInfo {
            address_qualifier: "__global".into(),
            access_qualifier: "NONE".into(),
            argument_name: "x".into(),
            type_name: "float*;8".into(),
            type_qualifier: "const".into(),
        });
        let (_, list) = patch_list(&kernel, &BuildContext::default()).unwrap();
        let records = records(&list);
        let (_, attributes) = records
            .iter()
            .find(|(token, _)| *token == PatchToken::KernelAttributesInfo)
            .unwrap();
        let info: KernelAttributesInfo = bytemuck::pod_read_unaligned(&attributes[..4]);
        assert_eq!(info.attributes_size, 32);
        assert_eq!(&attributes[4..32], b"reqd_work_group_size(16,1,1)");
        let (_, argument) = records
            .iter()
            .find(|(token, _)| *token == PatchToken::KernelArgumentInfo)
            .unwrap();
        let info: KernelArgumentInfo = bytemuck::pod_read_unaligned(&argument[..24]);
        assert_eq!(info.address_qualifier_size, 12);
        assert_eq!(info.access_qualifier_size, 8);
        assert_eq!(info.argument_name_size, 4);
        assert_eq!(info.type_name_size, 12);
        assert_eq!(info.type_qualifier_size, 8);
        assert_eq!(argument.len(), 24 + 44);
    }

    fn data_parameter_stream_size(list: &[u8]) -> u32 {
        find::<DataParameterStream>(list)[0].data_parameter_stream_size
    }

    #[test]
    fn implicit_buffers() {
        let mut kernel = KernelInfo::default();
        for (argument_number, bti) in [(3, 6), (4, 1), (5, 3)] {
            kernel.arg_index_map.insert(argument_number, bti);
        }
        kernel.printf_buffer = Some(PrintfBuffer {
            argument_number: 3,
            index: 2,
            payload_position: 16,
            data_size: 8,
        });
        kernel.sync_buffer = Some(ImplicitBuffer {
            argument_number: 4,
            payload_position: 24,
            data_size: 8,
        });
        kernel.rt_global_buffer = Some(ImplicitBuffer {
            argument_number: 5,
            payload_position: 40,
            data_size: 8,
        });
        let (layout, list) = patch_list(&kernel, &BuildContext::default()).unwrap();

        let printf = find::<AllocateStatelessPrintfSurface>(&list)[0];
        assert_eq!(printf.printf_surface_index, 2);
        assert_eq!(printf.surface_state_heap_offset, layout.surface_offset(6).unwrap());
        assert_eq!(printf.surface_state_heap_offset, 128);
        assert_eq!(printf.data_param_offset, 16);
        assert_eq!(printf.data_param_size, 8);

        let sync = find::<AllocateSyncBuffer>(&list)[0];
        assert_eq!(sync.surface_state_heap_offset, 0);
        assert_eq!(sync.data_param_offset, 24);
        assert_eq!(sync.data_param_size, 8);

        let rt = find::<AllocateRtGlobalBuffer>(&list)[0];
        assert_eq!(rt.surface_state_heap_offset, 64);
        assert_eq!(rt.data_param_offset, 40);
        assert_eq!(rt.data_param_size, 8);

        assert_eq!(data_parameter_stream_size(&list), 64);
    }

    #[test]
    fn gas_and_private_memory_slots() {
        let kernel = KernelInfo {
            start_gas: Some(StartGas {
                offset: 0,
                gpu_pointer_size: 8,
            }),
            window_size_gas: Some(PayloadSlot { offset: 8 }),
            private_mem_size: Some(PayloadSlot { offset: 60 }),
            ..Default::default()
        };
        let (_, list) = patch_list(&kernel, &BuildContext::default()).unwrap();
        let buffers: Vec<_> = find::<DataParameterBuffer>(&list)
            .into_iter()
            .map(|x| (x.parameter_type, x.offset, x.data_size))
            .collect();
        assert_eq!(
            buffers,
            [
                (
                    DataParameterType::LocalMemoryStatelessWindowStartAddress.as_u32(),
                    0,
                    8
                ),
                (DataParameterType::LocalMemoryStatelessWindowSize.as_u32(), 8, 4),
                (DataParameterType::PrivateMemoryStatelessSize.as_u32(), 60, 4),
            ]
        );
        assert_eq!(data_parameter_stream_size(&list), 64);
    }

    #[test]
    fn queue_and_event_pool_inputs() {
        let mut kernel = KernelInfo::default();
        kernel.arg_index_map.insert(0, 0);
        kernel.arg_index_map.insert(1, 1);
        kernel.pointer_inputs.push(PointerInput {
            argument_number: 0,
            address_space: AddressSpace::DefaultDeviceQueue,
            is_stateless: true,
            payload_position: 0,
            payload_size: 8,
            ..Default::default()
        });
        kernel.pointer_inputs.push(PointerInput {
            argument_number: 1,
            address_space: AddressSpace::EventPool,
            is_stateless: true,
            payload_position: 8,
            payload_size: 8,
            ..Default::default()
        });
        let (_, list) = patch_list(&kernel, &BuildContext::default()).unwrap();

        let queue = find::<AllocateStatelessDefaultDeviceQueueSurface>(&list)[0];
        assert_eq!(queue.surface_state_heap_offset, 0);
        assert_eq!(queue.data_param_offset, 0);
        assert_eq!(queue.data_param_size, 8);

        let pool = find::<AllocateStatelessEventPoolSurface>(&list)[0];
        assert_eq!(pool.event_pool_surface_index, 0);
        assert_eq!(pool.surface_state_heap_offset, 64);
        assert_eq!(pool.data_param_offset, 8);
        assert_eq!(pool.data_param_size, 8);

        assert_eq!(data_parameter_stream_size(&list), 32);
        let env = find::<ExecutionEnvironment>(&list)[0];
        assert_eq!({ env.has_device_enqueue }, 0);

        kernel.constant_inputs.push(ConstantInput {
            constant_type: DataParameterType::ParentEvent,
            payload_position: 16,
            payload_size: 4,
            ..Default::default()
        });
        let (_, list) = patch_list(&kernel, &BuildContext::default()).unwrap();
        let env = find::<ExecutionEnvironment>(&list)[0];
        assert_eq!({ env.has_device_enqueue }, 1);
    }

    #[test]
    fn payload_end_overflow_is_invalid() {
        let mut kernel = KernelInfo::default();
        kernel.arg_index_map.insert(0, 0);
        kernel.image_arguments.push(ImageArgument {
            argument_number: 0,
            image_type: ImageType::Image2D,
            is_bindless_access: true,
            is_fixed_binding_table_index: true,
            payload_position: u32::MAX - 4,
            ..Default::default()
        });
        let err = patch_list(&kernel, &BuildContext::default()).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidMetadata(_)));

        let kernel = KernelInfo {
            private_mem_size: Some(PayloadSlot {
                offset: u32::MAX - 2,
            }),
            ..Default::default()
        };
        let err = patch_list(&kernel, &BuildContext::default()).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidMetadata(_)));
    }

    #[test]
    fn data_parameter_stream_alignment_overflow_is_invalid() {
        let mut kernel = KernelInfo::default();
        kernel.constant_arguments.push(ConstantArgument {
            payload_position: u32::MAX - 8,
            payload_size: 4,
            ..Default::default()
        });
        let err = patch_list(&kernel, &BuildContext::default()).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidMetadata(_)));
    }

    #[test]
    fn oversized_scratch_space_is_invalid() {
        let mut kernel = KernelInfo::default();
        kernel.execution_environment.per_thread_scratch_space = (1 << 31) + 1;
        let err = patch_list(&kernel, &BuildContext::default()).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidMetadata(_)));

        kernel.execution_environment.per_thread_scratch_space = 1 << 31;
        let (_, list) = patch_list(&kernel, &BuildContext::default()).unwrap();
        assert_eq!(find::<MediaVfeState>(&list)[0].per_thread_scratch_space, 1 << 31);
    }
}
