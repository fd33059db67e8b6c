//! Kernel, surface state and dynamic state heaps.
//!
//! Each builder appends to a fresh stream and records its offsets in the [`LayoutContext`].
//! The general state heap is always empty.

use crate::{
    caps::BuildContext,
    error::invalid_metadata,
    hw::{
        BindingTableEntry, BorderColor, InterfaceDescriptor, InterfaceDescriptorDesc,
        SamplerDesc, SamplerState, SurfaceFormat, SurfaceKind, SurfaceState,
    },
    layout::{LayoutContext, Phase},
    result::Result,
    stream::BinaryStream,
    types::{
        kernel::KernelInfo,
        sampler::{AddressMode, CompareFunc, MapFilter, MipFilter, SamplerType},
    },
};
use std::collections::{btree_map::Entry, BTreeMap};
use tracing::{debug, trace};

fn write_kernel(
    heap: &mut BinaryStream,
    isa: &[u8],
    context: &BuildContext,
) -> Result<u32> {
    let offset = heap.offset();
    heap.write(isa)?;
    heap.add_padding(context.platform.instruction_cache_prefetch_size as usize)?;
    heap.align(4)?;
    Ok(offset)
}

/// Writes the optional system kernel and then the kernel, each followed by the prefetch padding.
pub fn build_kernel_heap(
    layout: &mut LayoutContext,
    isa: &[u8],
    system_kernel: Option<&[u8]>,
    kernel: &KernelInfo,
    context: &BuildContext,
) -> Result<BinaryStream> {
    layout.expect(Phase::Idle)?;
    let mut heap = BinaryStream::new();
    if let Some(system_kernel) = system_kernel {
        let offset = write_kernel(&mut heap, system_kernel, context)?;
        trace!(offset, size = system_kernel.len(), "system kernel");
        layout.kernel.system_kernel_offset = Some(offset);
    }
    layout.kernel.kernel_offset = write_kernel(&mut heap, isa, context)?;
    let env = &kernel.execution_environment;
    layout.kernel.scratch_space_present =
        env.per_thread_scratch_space > 0 || env.per_thread_scratch_space_slot1 > 0;
    debug!(
        kernel = %kernel.name,
        size = heap.len(),
        kernel_offset = layout.kernel.kernel_offset,
        "kernel heap"
    );
    layout.advance(Phase::KernelHeapBuilt)?;
    Ok(heap)
}

#[derive(Clone, Copy, Debug)]
struct SurfaceEntry {
    kind: SurfaceKind,
    format: SurfaceFormat,
    msaa: bool,
}

impl SurfaceEntry {
    fn buffer(format: SurfaceFormat) -> Self {
        Self {
            kind: SurfaceKind::Buffer,
            format,
            msaa: false,
        }
    }
}

pub(crate) fn argument_bti(kernel: &KernelInfo, argument_number: u32) -> Result<u32> {
    kernel
        .binding_table_index(argument_number)
        .ok_or_else(|| invalid_metadata!("argument {argument_number} has no binding table index"))
}

fn insert_surface(entries: &mut BTreeMap<u32, SurfaceEntry>, bti: u32, entry: SurfaceEntry) {
    if let Entry::Vacant(vacant) = entries.entry(bti) {
        vacant.insert(entry);
    }
}

/// Writes one surface state per binding table index in ascending order, then the binding table.
pub fn build_surface_state_heap(
    layout: &mut LayoutContext,
    kernel: &KernelInfo,
    context: &BuildContext,
) -> Result<BinaryStream> {
    layout.expect(Phase::KernelHeapBuilt)?;
    context.platform.validate()?;
    let mut entries = BTreeMap::new();
    if context.options.debuggable {
        insert_surface(
            &mut entries,
            context.options.system_thread_bti,
            SurfaceEntry::buffer(SurfaceFormat::Unknown),
        );
    }
    for input in kernel.pointer_inputs.iter() {
        let bti = argument_bti(kernel, input.argument_number)?;
        insert_surface(&mut entries, bti, SurfaceEntry::buffer(SurfaceFormat::Raw));
    }
    for argument in kernel.pointer_arguments.iter() {
        let bti = argument_bti(kernel, argument.argument_number)?;
        insert_surface(&mut entries, bti, SurfaceEntry::buffer(SurfaceFormat::Unknown));
    }
    for image in kernel.image_arguments.iter() {
        if !image.is_fixed_binding_table_index {
            return Err(invalid_metadata!(
                "image argument {} has no fixed binding table index",
                image.argument_number
            ));
        }
        let (kind, msaa) = SurfaceKind::from_image_type(image.image_type).ok_or_else(|| {
            invalid_metadata!(
                "image argument {} has type {}",
                image.argument_number,
                image.image_type
            )
        })?;
        let bti = argument_bti(kernel, image.argument_number)?;
        insert_surface(
            &mut entries,
            bti,
            SurfaceEntry {
                kind,
                format: SurfaceFormat::Unknown,
                msaa,
            },
        );
    }
    let buffers = [
        kernel.printf_buffer.as_ref().map(|x| x.argument_number),
        kernel.sync_buffer.as_ref().map(|x| x.argument_number),
        kernel.rt_global_buffer.as_ref().map(|x| x.argument_number),
    ];
    for argument_number in buffers.into_iter().flatten() {
        let bti = argument_bti(kernel, argument_number)?;
        insert_surface(&mut entries, bti, SurfaceEntry::buffer(SurfaceFormat::Raw));
    }

    let mut heap = BinaryStream::new();
    let surface = &mut layout.surface;
    surface.surface_array_offset = heap.offset();
    for (bti, entry) in entries.iter() {
        let offset = heap.offset();
        surface.surface_offsets.insert(*bti, offset);
        heap.write_pod(&SurfaceState::new(entry.kind, entry.format, 0, entry.msaa))?;
        trace!(bti, offset, kind = ?entry.kind, "surface state");
    }
    surface.binding_table_count = entries.len() as u32;
    if surface.binding_table_count > 0 {
        heap.align(context.platform.binding_table_state_pointer_align_size)?;
        surface.binding_table_offset = heap.offset();
        for offset in surface.surface_offsets.values() {
            heap.write_pod(&BindingTableEntry::new(*offset, &context.platform)?)?;
        }
    }
    debug!(
        kernel = %kernel.name,
        size = heap.len(),
        surfaces = surface.binding_table_count,
        "surface state heap"
    );
    layout.advance(Phase::SurfaceHeapBuilt)?;
    Ok(heap)
}

/// Number of texture sampler states a sampler of `sampler_type` occupies.
pub fn sampler_state_size_multiplier(sampler_type: SamplerType) -> Result<u32> {
    use SamplerType::*;
    let multiplier = match sampler_type {
        Invalid => return Err(invalid_metadata!("sampler type {sampler_type}")),
        Texture => 1,
        Sample8x8 => 15,
        Sample8x8Convolve2D => 128,
        Sample8x8Erode | Sample8x8Dilate | Sample8x8MinMaxFilter => 2,
        Vme => 8,
        Sample8x8MinMax | Sample8x8Centroid | Sample8x8BoolCentroid | Sample8x8BoolSum => 1,
        Ve | Vd => 15,
    };
    Ok(multiplier)
}

fn write_border_color(heap: &mut BinaryStream, color: BorderColor, context: &BuildContext) -> Result<u32> {
    heap.align(context.platform.default_color_pointer_align_size)?;
    let offset = heap.offset();
    heap.write_pod(&color)?;
    trace!(offset, "border color");
    Ok(offset)
}

/// Writes border colors, sampler states and the interface descriptor.
pub fn build_dynamic_state_heap(
    layout: &mut LayoutContext,
    kernel: &KernelInfo,
    context: &BuildContext,
) -> Result<BinaryStream> {
    layout.expect(Phase::SurfaceHeapBuilt)?;
    let platform = &context.platform;
    platform.validate()?;
    let mut heap = BinaryStream::new();
    let sampler_count = kernel.sampler_arguments.len() + kernel.sampler_inputs.len();
    if sampler_count > 0 {
        let mut border_colors = Vec::with_capacity(sampler_count);
        if platform.programmable_border_color {
            for _ in kernel.sampler_arguments.iter() {
                border_colors.push(write_border_color(&mut heap, BorderColor::default(), context)?);
            }
            for input in kernel.sampler_inputs.iter() {
                border_colors.push(write_border_color(
                    &mut heap,
                    BorderColor::new(input.border_color),
                    context,
                )?);
            }
        } else {
            border_colors.push(write_border_color(&mut heap, BorderColor::default(), context)?);
        }
        let border_color_offset = |index: usize| {
            if platform.programmable_border_color {
                border_colors[index]
            } else {
                border_colors[0]
            }
        };

        heap.align(platform.sampler_state_pointer_align_size)?;
        let dynamic = &mut layout.dynamic;
        dynamic.sampler_count = sampler_count as u32;
        dynamic.sampler_array_offset = heap.offset();
        dynamic.border_color_offset = border_colors[0];
        for (index, argument) in kernel.sampler_arguments.iter().enumerate() {
            let offset = heap.offset();
            dynamic
                .sampler_offsets
                .insert(argument.sampler_table_index, offset);
            if argument.sampler_type == SamplerType::Texture {
                let desc = SamplerDesc {
                    address_modes: [AddressMode::Clamp; 3],
                    mag_filter: MapFilter::Point,
                    min_filter: MapFilter::Point,
                    mip_filter: MipFilter::None,
                    normalized_coords: true,
                    compare_func: CompareFunc::Never,
                    border_color_offset: border_color_offset(index),
                };
                heap.write_pod(&SamplerState::new(&desc, platform, &context.workarounds)?)?;
            } else {
                let multiplier = sampler_state_size_multiplier(argument.sampler_type)?;
                let size = std::mem::size_of::<SamplerState>() * multiplier as usize;
                heap.add_padding(size)?;
            }
            trace!(
                offset,
                sampler_type = %argument.sampler_type,
                index = argument.sampler_table_index,
                "argument sampler"
            );
        }
        let base = kernel.sampler_arguments.len();
        for (index, input) in kernel.sampler_inputs.iter().enumerate() {
            if input.sampler_type != SamplerType::Texture {
                return Err(invalid_metadata!(
                    "inline sampler {} has type {}",
                    input.sampler_table_index,
                    input.sampler_type
                ));
            }
            let offset = heap.offset();
            dynamic.sampler_offsets.insert(input.sampler_table_index, offset);
            let desc = SamplerDesc {
                address_modes: [
                    input.tcx_address_mode,
                    input.tcy_address_mode,
                    input.tcz_address_mode,
                ],
                mag_filter: input.mag_filter,
                min_filter: input.min_filter,
                mip_filter: input.mip_filter,
                normalized_coords: input.normalized_coords,
                compare_func: input.compare_func,
                border_color_offset: border_color_offset(base + index),
            };
            heap.write_pod(&SamplerState::new(&desc, platform, &context.workarounds)?)?;
            trace!(offset, index = input.sampler_table_index, "inline sampler");
        }
    }

    heap.align(platform.interface_descriptor_data_align_size)?;
    layout.dynamic.interface_descriptor_offset = heap.offset();
    let desc = InterfaceDescriptorDesc {
        kernel_offset: layout.kernel.kernel_offset,
        single_program_flow: kernel.execution_environment.is_single_program_flow,
        sampler_count: layout.dynamic.sampler_count,
        sampler_array_offset: layout.dynamic.sampler_array_offset,
        binding_table_count: layout.surface.binding_table_count,
        binding_table_offset: layout.surface.binding_table_offset,
        constant_read_length: kernel.constant_buffer_length,
    };
    heap.write_pod(&InterfaceDescriptor::new(&desc, platform)?)?;
    debug!(
        kernel = %kernel.name,
        size = heap.len(),
        samplers = layout.dynamic.sampler_count,
        "dynamic state heap"
    );
    layout.advance(Phase::DynamicHeapBuilt)?;
    Ok(heap)
}
