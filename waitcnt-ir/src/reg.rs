//! Physical registers and register classes.
use std::fmt;
use waitcnt_idx::impl_index;

#[cfg(feature = "serialize")]
use serde::Serialize;

/// Number of addressable register slots. Scalar registers and special
/// registers live below [PhysReg::FIRST_VGPR], vector registers above it.
pub const NUM_REGS: usize = 512;

/// A physical register slot holding one dword.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct PhysReg(pub u16);
impl_index!(PhysReg, u16);

impl PhysReg {
    pub const VCC: PhysReg = PhysReg(106);
    pub const M0: PhysReg = PhysReg(124);
    pub const SGPR_NULL: PhysReg = PhysReg(125);
    pub const EXEC: PhysReg = PhysReg(126);
    pub const FIRST_VGPR: PhysReg = PhysReg(256);

    pub const fn sgpr(n: u16) -> Self {
        PhysReg(n)
    }

    pub const fn vgpr(n: u16) -> Self {
        PhysReg(Self::FIRST_VGPR.0 + n)
    }

    pub fn reg(self) -> u16 {
        self.0
    }

    pub fn is_vgpr(self) -> bool {
        self >= Self::FIRST_VGPR
    }

    /// The register `n` dwords after this one.
    pub fn advance(self, n: u16) -> Self {
        let reg = self.0 + n;
        assert!(
            (reg as usize) < NUM_REGS,
            "register {reg} is outside of the register file"
        );
        PhysReg(reg)
    }
}

impl fmt::Debug for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PhysReg::VCC => write!(f, "vcc"),
            PhysReg::M0 => write!(f, "m0"),
            PhysReg::SGPR_NULL => write!(f, "null"),
            PhysReg::EXEC => write!(f, "exec"),
            r if r.is_vgpr() => write!(f, "v{}", r.0 - Self::FIRST_VGPR.0),
            r => write!(f, "s{}", r.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub enum RegType {
    Sgpr,
    Vgpr,
}

/// Type and size (in dwords) of a register operand.
///
/// Linear registers are live in every lane regardless of the exec mask and
/// therefore follow the linear control flow graph. Scalar registers are always
/// linear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct RegClass {
    ty: RegType,
    size: u8,
    linear_vgpr: bool,
}

impl RegClass {
    pub const S1: RegClass = RegClass::new(RegType::Sgpr, 1);
    pub const S2: RegClass = RegClass::new(RegType::Sgpr, 2);
    pub const S4: RegClass = RegClass::new(RegType::Sgpr, 4);
    pub const S8: RegClass = RegClass::new(RegType::Sgpr, 8);
    pub const V1: RegClass = RegClass::new(RegType::Vgpr, 1);
    pub const V2: RegClass = RegClass::new(RegType::Vgpr, 2);
    pub const V3: RegClass = RegClass::new(RegType::Vgpr, 3);
    pub const V4: RegClass = RegClass::new(RegType::Vgpr, 4);
    pub const V1_LINEAR: RegClass = RegClass::V1.as_linear();

    pub const fn new(ty: RegType, size: u8) -> Self {
        RegClass {
            ty,
            size,
            linear_vgpr: false,
        }
    }

    /// The linear variant of a vector register class.
    pub const fn as_linear(self) -> Self {
        RegClass {
            linear_vgpr: matches!(self.ty, RegType::Vgpr),
            ..self
        }
    }

    pub fn ty(&self) -> RegType {
        self.ty
    }

    /// Size in dwords.
    pub fn size(&self) -> u16 {
        self.size as u16
    }

    pub fn bytes(&self) -> u16 {
        self.size() * 4
    }

    pub fn is_linear(&self) -> bool {
        matches!(self.ty, RegType::Sgpr) || self.linear_vgpr
    }
}

impl fmt::Display for RegClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.ty {
            RegType::Sgpr => "s",
            RegType::Vgpr if self.linear_vgpr => "lv",
            RegType::Vgpr => "v",
        };
        write!(f, "{prefix}{}", self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_names() {
        assert_eq!(PhysReg::sgpr(4).to_string(), "s4");
        assert_eq!(PhysReg::vgpr(17).to_string(), "v17");
        assert_eq!(PhysReg::EXEC.to_string(), "exec");
        assert!(PhysReg::vgpr(0).is_vgpr());
        assert!(!PhysReg::VCC.is_vgpr());
    }

    #[test]
    fn linearity() {
        assert!(RegClass::S2.is_linear());
        assert!(!RegClass::V2.is_linear());
        assert!(RegClass::V1_LINEAR.is_linear());
        assert_eq!(RegClass::S4.as_linear(), RegClass::S4);
    }
}
