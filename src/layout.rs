use crate::{
    error::{invalid_metadata, unsupported},
    result::Result,
};
use std::collections::BTreeMap;

/// Build progress of one kernel.
#[derive(Clone, Copy, Eq, PartialEq, Debug, derive_more::Display)]
pub enum Phase {
    Idle,
    KernelHeapBuilt,
    SurfaceHeapBuilt,
    DynamicHeapBuilt,
    PatchListBuilt,
    Combined,
}

impl Phase {
    fn next(self) -> Option<Self> {
        use Phase::*;
        let next = match self {
            Idle => KernelHeapBuilt,
            KernelHeapBuilt => SurfaceHeapBuilt,
            SurfaceHeapBuilt => DynamicHeapBuilt,
            DynamicHeapBuilt => PatchListBuilt,
            PatchListBuilt => Combined,
            Combined => return None,
        };
        Some(next)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::Idle
    }
}

#[derive(Default, Clone, Eq, PartialEq, Debug)]
pub struct KernelLayout {
    pub system_kernel_offset: Option<u32>,
    pub kernel_offset: u32,
    pub scratch_space_present: bool,
}

#[derive(Default, Clone, Eq, PartialEq, Debug)]
pub struct SurfaceLayout {
    /// Surface state offset keyed by binding table index.
    pub surface_offsets: BTreeMap<u32, u32>,
    pub surface_array_offset: u32,
    pub binding_table_offset: u32,
    pub binding_table_count: u32,
}

#[derive(Default, Clone, Eq, PartialEq, Debug)]
pub struct DynamicLayout {
    pub border_color_offset: u32,
    /// Sampler state offset keyed by sampler table index.
    pub sampler_offsets: BTreeMap<u32, u32>,
    pub sampler_array_offset: u32,
    pub sampler_count: u32,
    pub interface_descriptor_offset: u32,
}

/// Offsets and counts recorded by the heap builders.
///
/// Each section is only meaningful once its phase has completed.
#[derive(Default, Clone, Eq, PartialEq, Debug)]
pub struct LayoutContext {
    phase: Phase,
    pub kernel: KernelLayout,
    pub surface: SurfaceLayout,
    pub dynamic: DynamicLayout,
}

impl LayoutContext {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn phase(&self) -> Phase {
        self.phase
    }
    /// Moves to `phase`, which must directly follow the current phase.
    pub fn advance(&mut self, phase: Phase) -> Result<()> {
        if self.phase.next() != Some(phase) {
            return Err(unsupported!(
                "layout phase {phase} cannot follow {}",
                self.phase
            ));
        }
        self.phase = phase;
        Ok(())
    }
    /// Checks that the build is at `phase`.
    pub fn expect(&self, phase: Phase) -> Result<()> {
        if self.phase != phase {
            return Err(unsupported!(
                "layout is at phase {}, expected {phase}",
                self.phase
            ));
        }
        Ok(())
    }
    pub fn surface_offset(&self, bti: u32) -> Result<u32> {
        self.surface
            .surface_offsets
            .get(&bti)
            .copied()
            .ok_or_else(|| invalid_metadata!("no surface state for binding table index {bti}"))
    }
    pub fn sampler_offset(&self, sampler_table_index: u32) -> Result<u32> {
        self.dynamic
            .sampler_offsets
            .get(&sampler_table_index)
            .copied()
            .ok_or_else(|| invalid_metadata!("no sampler state for sampler index {sampler_table_index}"))
    }
}
