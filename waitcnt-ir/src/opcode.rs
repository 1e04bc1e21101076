//! Opcodes and their static classification.
use std::fmt;

#[cfg(feature = "serialize")]
use serde::Serialize;

/// Encoding family of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub enum Format {
    Pseudo,
    PseudoBarrier,
    Sop1,
    Sop2,
    Sopk,
    Sopc,
    Sopp,
    Smem,
    Ds,
    Ldsdir,
    Mubuf,
    Mtbuf,
    Mimg,
    Exp,
    Flat,
    Global,
    Scratch,
    Vop1,
    Vop2,
    Vop3,
    Vopc,
    VinterpInreg,
}

impl Format {
    pub fn is_salu(self) -> bool {
        matches!(
            self,
            Format::Sop1
                | Format::Sop2
                | Format::Sopk
                | Format::Sopc
                | Format::Sopp
        )
    }

    pub fn is_valu(self) -> bool {
        matches!(
            self,
            Format::Vop1
                | Format::Vop2
                | Format::Vop3
                | Format::Vopc
                | Format::VinterpInreg
        )
    }

    /// Buffer and image memory.
    pub fn is_vmem(self) -> bool {
        matches!(self, Format::Mubuf | Format::Mtbuf | Format::Mimg)
    }

    /// Flat, global and scratch memory.
    pub fn is_flat_like(self) -> bool {
        matches!(self, Format::Flat | Format::Global | Format::Scratch)
    }
}

/// Execution unit and latency class of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub enum InstrClass {
    Pseudo,
    Salu,
    Branch,
    Waitcnt,
    Valu32,
    ValuDouble,
    /// Transcendental functions, which execute on their own pipeline.
    Trans,
    /// Matrix multiply-accumulate.
    Wmma,
    Smem,
    Ds,
    Vmem,
    Export,
}

macro_rules! define_opcodes {
    ($($variant:ident => ($mnemonic:literal, $format:ident, $class:ident)),* $(,)?) => {
        /// Every opcode the compiler knows about.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serialize", derive(Serialize))]
        pub enum Opcode {
            $($variant),*
        }

        impl Opcode {
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $mnemonic),*
                }
            }

            pub fn format(self) -> Format {
                match self {
                    $(Opcode::$variant => Format::$format),*
                }
            }

            pub fn class(self) -> InstrClass {
                match self {
                    $(Opcode::$variant => InstrClass::$class),*
                }
            }
        }
    };
}

define_opcodes! {
    PBarrier => ("p_barrier", PseudoBarrier, Pseudo),

    SMovB32 => ("s_mov_b32", Sop1, Salu),
    SMovB64 => ("s_mov_b64", Sop1, Salu),
    SSendmsgRtnB32 => ("s_sendmsg_rtn_b32", Sop1, Salu),
    SSendmsgRtnB64 => ("s_sendmsg_rtn_b64", Sop1, Salu),
    SSetpcB64 => ("s_setpc_b64", Sop1, Branch),
    SAndSaveexecB64 => ("s_and_saveexec_b64", Sop1, Salu),
    SAddU32 => ("s_add_u32", Sop2, Salu),
    SAndB32 => ("s_and_b32", Sop2, Salu),
    SLshlB32 => ("s_lshl_b32", Sop2, Salu),
    SMulI32 => ("s_mul_i32", Sop2, Salu),
    SMovkI32 => ("s_movk_i32", Sopk, Salu),
    SWaitcntVscnt => ("s_waitcnt_vscnt", Sopk, Waitcnt),
    SWaitcntVmcnt => ("s_waitcnt_vmcnt", Sopk, Waitcnt),
    SWaitcntExpcnt => ("s_waitcnt_expcnt", Sopk, Waitcnt),
    SWaitcntLgkmcnt => ("s_waitcnt_lgkmcnt", Sopk, Waitcnt),
    SCmpEqU32 => ("s_cmp_eq_u32", Sopc, Salu),
    SWaitcnt => ("s_waitcnt", Sopp, Waitcnt),
    SWaitLoadcnt => ("s_wait_loadcnt", Sopp, Waitcnt),
    SWaitStorecnt => ("s_wait_storecnt", Sopp, Waitcnt),
    SWaitExpcnt => ("s_wait_expcnt", Sopp, Waitcnt),
    SWaitDscnt => ("s_wait_dscnt", Sopp, Waitcnt),
    SWaitSamplecnt => ("s_wait_samplecnt", Sopp, Waitcnt),
    SWaitBvhcnt => ("s_wait_bvhcnt", Sopp, Waitcnt),
    SWaitKmcnt => ("s_wait_kmcnt", Sopp, Waitcnt),
    SWaitLoadcntDscnt => ("s_wait_loadcnt_dscnt", Sopp, Waitcnt),
    SWaitStorecntDscnt => ("s_wait_storecnt_dscnt", Sopp, Waitcnt),
    SDelayAlu => ("s_delay_alu", Sopp, Waitcnt),
    SSendmsg => ("s_sendmsg", Sopp, Salu),
    SSendmsghalt => ("s_sendmsghalt", Sopp, Salu),
    SNop => ("s_nop", Sopp, Salu),
    SEndpgm => ("s_endpgm", Sopp, Branch),
    SBranch => ("s_branch", Sopp, Branch),
    SCbranchScc0 => ("s_cbranch_scc0", Sopp, Branch),
    SCbranchExecz => ("s_cbranch_execz", Sopp, Branch),

    SLoadDword => ("s_load_dword", Smem, Smem),
    SLoadDwordx2 => ("s_load_dwordx2", Smem, Smem),
    SLoadDwordx4 => ("s_load_dwordx4", Smem, Smem),
    SBufferLoadDword => ("s_buffer_load_dword", Smem, Smem),
    SBufferStoreDword => ("s_buffer_store_dword", Smem, Smem),
    SDcacheWb => ("s_dcache_wb", Smem, Smem),

    DsReadB32 => ("ds_read_b32", Ds, Ds),
    DsReadB64 => ("ds_read_b64", Ds, Ds),
    DsWriteB32 => ("ds_write_b32", Ds, Ds),
    DsAddU32 => ("ds_add_u32", Ds, Ds),
    DsOrderedCount => ("ds_ordered_count", Ds, Ds),
    LdsParamLoad => ("lds_param_load", Ldsdir, Ds),
    LdsDirectLoad => ("lds_direct_load", Ldsdir, Ds),

    BufferLoadDword => ("buffer_load_dword", Mubuf, Vmem),
    BufferLoadDwordx4 => ("buffer_load_dwordx4", Mubuf, Vmem),
    BufferStoreDword => ("buffer_store_dword", Mubuf, Vmem),
    BufferAtomicAdd => ("buffer_atomic_add", Mubuf, Vmem),
    TbufferLoadFormatX => ("tbuffer_load_format_x", Mtbuf, Vmem),
    TbufferStoreFormatX => ("tbuffer_store_format_x", Mtbuf, Vmem),
    ImageLoad => ("image_load", Mimg, Vmem),
    ImageStore => ("image_store", Mimg, Vmem),
    ImageSample => ("image_sample", Mimg, Vmem),
    ImageGather4 => ("image_gather4", Mimg, Vmem),
    ImageBvh64IntersectRay => ("image_bvh64_intersect_ray", Mimg, Vmem),
    FlatLoadDword => ("flat_load_dword", Flat, Vmem),
    FlatStoreDword => ("flat_store_dword", Flat, Vmem),
    GlobalLoadDword => ("global_load_dword", Global, Vmem),
    GlobalLoadDwordx2 => ("global_load_dwordx2", Global, Vmem),
    GlobalStoreDword => ("global_store_dword", Global, Vmem),
    GlobalAtomicAdd => ("global_atomic_add", Global, Vmem),
    ScratchLoadDword => ("scratch_load_dword", Scratch, Vmem),
    ScratchStoreDword => ("scratch_store_dword", Scratch, Vmem),

    Exp => ("exp", Exp, Export),

    VMovB32 => ("v_mov_b32", Vop1, Valu32),
    VCvtF32U32 => ("v_cvt_f32_u32", Vop1, Valu32),
    VRcpF32 => ("v_rcp_f32", Vop1, Trans),
    VExpF32 => ("v_exp_f32", Vop1, Trans),
    VSqrtF32 => ("v_sqrt_f32", Vop1, Trans),
    VAddF32 => ("v_add_f32", Vop2, Valu32),
    VMulF32 => ("v_mul_f32", Vop2, Valu32),
    VAddU32 => ("v_add_u32", Vop2, Valu32),
    VFmacF32 => ("v_fmac_f32", Vop2, Valu32),
    VFmaF32 => ("v_fma_f32", Vop3, Valu32),
    VMadU32U24 => ("v_mad_u32_u24", Vop3, Valu32),
    VAddF64 => ("v_add_f64", Vop3, ValuDouble),
    VWmmaF32F16 => ("v_wmma_f32_16x16x16_f16", Vop3, Wmma),
    VCmpEqU32 => ("v_cmp_eq_u32", Vopc, Valu32),
    VInterpP10F32Inreg => ("v_interp_p10_f32_inreg", VinterpInreg, Valu32),
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(Opcode::SWaitcnt.format(), Format::Sopp);
        assert!(Opcode::SWaitcntVscnt.format().is_salu());
        assert!(Opcode::VRcpF32.format().is_valu());
        assert_eq!(Opcode::VRcpF32.class(), InstrClass::Trans);
        assert!(Opcode::ScratchLoadDword.format().is_flat_like());
        assert!(!Opcode::ScratchLoadDword.format().is_vmem());
        assert_eq!(Opcode::GlobalLoadDword.to_string(), "global_load_dword");
    }
}
