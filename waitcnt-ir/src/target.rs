//! Description of the hardware the program is compiled for.
use std::fmt;

#[cfg(feature = "serialize")]
use serde::Serialize;

/// Hardware generation. Later generations compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub enum GfxLevel {
    Gfx6,
    Gfx7,
    Gfx8,
    Gfx9,
    Gfx10,
    Gfx10_3,
    Gfx11,
    Gfx11_5,
    Gfx12,
}

impl fmt::Display for GfxLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GfxLevel::Gfx6 => "gfx6",
            GfxLevel::Gfx7 => "gfx7",
            GfxLevel::Gfx8 => "gfx8",
            GfxLevel::Gfx9 => "gfx9",
            GfxLevel::Gfx10 => "gfx10",
            GfxLevel::Gfx10_3 => "gfx10.3",
            GfxLevel::Gfx11 => "gfx11",
            GfxLevel::Gfx11_5 => "gfx11.5",
            GfxLevel::Gfx12 => "gfx12",
        };
        f.write_str(name)
    }
}

/// Hardware bugs that need extra waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Errata {
    /// A scalar load issued after a scalar store may return stale data unless
    /// the store has completed.
    pub smem_store_load_hazard: bool,
    /// Leaving the ordered section of an overlapped pixel shader requires its
    /// memory accesses to have completed.
    pub pops_overlapped_waves_wait: bool,
}

impl Errata {
    pub fn for_gfx(gfx_level: GfxLevel) -> Self {
        Errata {
            smem_store_load_hazard: gfx_level >= GfxLevel::Gfx10,
            pops_overlapped_waves_wait: false,
        }
    }
}

/// Compilation target passed to every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct TargetConfig {
    pub gfx_level: GfxLevel,
    /// Number of lanes in a wave: 32 or 64.
    pub wave_size: u32,
    /// Number of invocations in a workgroup.
    pub workgroup_size: u32,
    /// Workgroups span a whole workgroup processor instead of a single
    /// compute unit.
    pub wgp_mode: bool,
    pub errata: Errata,
}

impl TargetConfig {
    /// Target with a single-wave workgroup and the errata of `gfx_level`.
    pub fn new(gfx_level: GfxLevel) -> Self {
        let wave_size = if gfx_level >= GfxLevel::Gfx10 { 32 } else { 64 };
        TargetConfig {
            gfx_level,
            wave_size,
            workgroup_size: wave_size,
            wgp_mode: false,
            errata: Errata::for_gfx(gfx_level),
        }
    }

    pub fn with_wave_size(mut self, wave_size: u32) -> Self {
        self.wave_size = wave_size;
        self
    }

    pub fn with_workgroup_size(mut self, workgroup_size: u32) -> Self {
        self.workgroup_size = workgroup_size;
        self
    }

    pub fn with_wgp_mode(mut self, wgp_mode: bool) -> Self {
        self.wgp_mode = wgp_mode;
        self
    }

    pub fn with_errata(mut self, errata: Errata) -> Self {
        self.errata = errata;
        self
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig::new(GfxLevel::Gfx10_3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_order() {
        assert!(GfxLevel::Gfx10_3 > GfxLevel::Gfx10);
        assert!(GfxLevel::Gfx11_5 < GfxLevel::Gfx12);
    }

    #[test]
    fn default_errata() {
        assert!(!TargetConfig::new(GfxLevel::Gfx9).errata.smem_store_load_hazard);
        assert!(TargetConfig::new(GfxLevel::Gfx11).errata.smem_store_load_hazard);
        assert_eq!(TargetConfig::new(GfxLevel::Gfx8).wave_size, 64);
    }
}
