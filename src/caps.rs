use crate::{error::unsupported, result::Result};
use serde::{Deserialize, Serialize};

/// Capabilities of the target platform.
///
/// Defaults to Gen8.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct Platform {
    pub instruction_cache_prefetch_size: u32,
    pub kernel_pointer_align_size: u32,
    pub sampler_state_pointer_align_size: u32,
    pub binding_table_state_pointer_align_size: u32,
    pub surface_state_pointer_align_size: u32,
    pub default_color_pointer_align_size: u32,
    pub interface_descriptor_data_align_size: u32,
    pub sample_lod_max: f32,
    pub programmable_border_color: bool,
    pub has_scratch_surface: bool,
    pub allows_3d_image_transform: bool,
    /// Device field of the program binary header.
    pub device: u32,
    pub stepping_id: u32,
    pub gpu_pointer_size: u32,
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            instruction_cache_prefetch_size: 128,
            kernel_pointer_align_size: 64,
            sampler_state_pointer_align_size: 32,
            binding_table_state_pointer_align_size: 32,
            surface_state_pointer_align_size: 64,
            default_color_pointer_align_size: 64,
            interface_descriptor_data_align_size: 32,
            sample_lod_max: 14.0,
            programmable_border_color: true,
            has_scratch_surface: false,
            allows_3d_image_transform: true,
            device: 8,
            stepping_id: 0,
            gpu_pointer_size: 8,
        }
    }
}

impl Platform {
    /// Checks that every alignment granule is nonzero.
    pub fn validate(&self) -> Result<()> {
        let alignments = [
            ("kernel_pointer_align_size", self.kernel_pointer_align_size),
            (
                "sampler_state_pointer_align_size",
                self.sampler_state_pointer_align_size,
            ),
            (
                "binding_table_state_pointer_align_size",
                self.binding_table_state_pointer_align_size,
            ),
            (
                "surface_state_pointer_align_size",
                self.surface_state_pointer_align_size,
            ),
            (
                "default_color_pointer_align_size",
                self.default_color_pointer_align_size,
            ),
            (
                "interface_descriptor_data_align_size",
                self.interface_descriptor_data_align_size,
            ),
        ];
        for (name, value) in alignments {
            if value == 0 {
                return Err(unsupported!("{name} is 0"));
            }
        }
        Ok(())
    }
}

/// Hardware workarounds that alter record bit patterns.
#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct Workarounds {
    /// Forces R rounding on mirrored, nearest filtered samplers.
    pub wa_22012532006: bool,
}

/// Compiler options that affect layout.
#[derive(Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct BuildOptions {
    /// Emit the debug surface and the system thread surface record.
    pub debuggable: bool,
    /// Binding table index of the debug surface.
    pub system_thread_bti: u32,
    pub bindless_mode: bool,
    pub bindless_legacy_mode: bool,
    pub separate_spill_pvt_scratch_space: bool,
    /// Lower bound of the per thread private memory size, 0 for none.
    pub force_per_thread_private_memory_size: u32,
}

/// Everything a build reads besides the kernel itself.
#[derive(Default, Clone, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct BuildContext {
    pub platform: Platform,
    pub workarounds: Workarounds,
    pub options: BuildOptions,
}

impl BuildContext {
    pub fn builder() -> BuildContextBuilder {
        BuildContextBuilder {
            context: Self::default(),
        }
    }
}

pub mod builder {
    use super::*;

    /// Builder for a [`BuildContext`].
    #[derive(Default, Clone, Debug)]
    pub struct BuildContextBuilder {
        pub(super) context: BuildContext,
    }

    impl BuildContextBuilder {
        pub fn with_platform(mut self, platform: Platform) -> Self {
            self.context.platform = platform;
            self
        }
        pub fn with_wa_22012532006(mut self, enabled: bool) -> Self {
            self.context.workarounds.wa_22012532006 = enabled;
            self
        }
        /// Debug surface at `system_thread_bti`, defaults to disabled.
        pub fn with_debuggable(mut self, system_thread_bti: Option<u32>) -> Self {
            self.context.options.debuggable = system_thread_bti.is_some();
            self.context.options.system_thread_bti = system_thread_bti.unwrap_or_default();
            self
        }
        pub fn with_bindless_mode(mut self, bindless_mode: bool) -> Self {
            self.context.options.bindless_mode = bindless_mode;
            self
        }
        pub fn with_bindless_legacy_mode(mut self, legacy: bool) -> Self {
            self.context.options.bindless_legacy_mode = legacy;
            self
        }
        pub fn with_separate_spill_pvt_scratch_space(mut self, separate: bool) -> Self {
            self.context.options.separate_spill_pvt_scratch_space = separate;
            self
        }
        pub fn with_force_per_thread_private_memory_size(mut self, size: u32) -> Self {
            self.context.options.force_per_thread_private_memory_size = size;
            self
        }
        /// Validates the platform and returns the context.
        pub fn build(self) -> Result<BuildContext> {
            self.context.platform.validate()?;
            Ok(self.context)
        }
    }
}
use builder::*;
