//! Guest memory access used at compile time.

/// Instruction fetch interface for the recompiler.
///
/// Reads never fault: the compiler only uses them to fetch opcodes it has already decided to
/// translate (including delay slots), and unmapped addresses simply read as zero (`nop`).
pub trait GuestMemory {
    fn read_u32_unchecked(&self, addr: u32) -> u32;
}

impl<T: GuestMemory + ?Sized> GuestMemory for &T {
    #[inline]
    fn read_u32_unchecked(&self, addr: u32) -> u32 {
        (**self).read_u32_unchecked(addr)
    }
}

/// A flat little-endian memory window starting at `base`.
#[derive(Debug, Clone, Default)]
pub struct FlatMemory {
    base: u32,
    bytes: Vec<u8>,
}

impl FlatMemory {
    pub fn new(base: u32, size: usize) -> Self {
        Self {
            base,
            bytes: vec![0; size],
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Writes `words` as consecutive little-endian instruction words starting at `addr`.
    pub fn load_words(&mut self, addr: u32, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.write_u32(addr.wrapping_add((i as u32) * 4), *word);
        }
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) {
        let off = self.offset(addr).unwrap_or_else(|| {
            panic!(
                "FlatMemory write out of bounds: addr={addr:#010x} base={:#010x} size={}",
                self.base,
                self.bytes.len()
            )
        });
        self.bytes[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn offset(&self, addr: u32) -> Option<usize> {
        let off = addr.checked_sub(self.base)? as usize;
        (off.checked_add(4)? <= self.bytes.len()).then_some(off)
    }
}

impl GuestMemory for FlatMemory {
    fn read_u32_unchecked(&self, addr: u32) -> u32 {
        match self.offset(addr) {
            Some(off) => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&self.bytes[off..off + 4]);
                u32::from_le_bytes(buf)
            }
            None => 0,
        }
    }
}
