use core::fmt;

/// MIPS general-purpose register, numbered by its 5-bit encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Gpr {
    Zero = 0,
    At = 1,
    V0 = 2,
    V1 = 3,
    A0 = 4,
    A1 = 5,
    A2 = 6,
    A3 = 7,
    T0 = 8,
    T1 = 9,
    T2 = 10,
    T3 = 11,
    T4 = 12,
    T5 = 13,
    T6 = 14,
    T7 = 15,
    S0 = 16,
    S1 = 17,
    S2 = 18,
    S3 = 19,
    S4 = 20,
    S5 = 21,
    S6 = 22,
    S7 = 23,
    T8 = 24,
    T9 = 25,
    K0 = 26,
    K1 = 27,
    Gp = 28,
    Sp = 29,
    Fp = 30,
    Ra = 31,
}

impl Gpr {
    pub const COUNT: usize = 32;

    pub const ALL: [Gpr; Gpr::COUNT] = [
        Gpr::Zero,
        Gpr::At,
        Gpr::V0,
        Gpr::V1,
        Gpr::A0,
        Gpr::A1,
        Gpr::A2,
        Gpr::A3,
        Gpr::T0,
        Gpr::T1,
        Gpr::T2,
        Gpr::T3,
        Gpr::T4,
        Gpr::T5,
        Gpr::T6,
        Gpr::T7,
        Gpr::S0,
        Gpr::S1,
        Gpr::S2,
        Gpr::S3,
        Gpr::S4,
        Gpr::S5,
        Gpr::S6,
        Gpr::S7,
        Gpr::T8,
        Gpr::T9,
        Gpr::K0,
        Gpr::K1,
        Gpr::Gp,
        Gpr::Sp,
        Gpr::Fp,
        Gpr::Ra,
    ];

    /// Decodes a 5-bit register field. Only the low five bits of `index` are used.
    #[inline]
    pub const fn from_field(index: u32) -> Gpr {
        Self::ALL[(index & 0x1f) as usize]
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        matches!(self, Gpr::Zero)
    }

    pub const fn name(self) -> &'static str {
        const NAMES: [&str; Gpr::COUNT] = [
            "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5",
            "t6", "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1",
            "gp", "sp", "fp", "ra",
        ];
        NAMES[self as usize]
    }
}

impl fmt::Display for Gpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
