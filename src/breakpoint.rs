//! Software breakpoints.
//!
//! A breakpoint replaces one byte of the target's code with `int3`. Memory is
//! only accessible a word at a time, so the byte is patched into the aligned
//! word that contains it and the remaining bytes are written back unchanged.
//!
//! ```text
//! word_address + 0   01         cc
//! word_address + 1   fc   --->  fc   <- pc after the trap executes
//! word_address + 2   45         45
//! word_address + 3   83         83
//! ```

use log::debug;

use crate::arch::{self, Word, TRAP_OPCODE};
use crate::target::TraceTarget;
use crate::trace::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Breakpoint {
    armed: bool,
    address: Word,
    word_address: Word,
    saved: Word,
}

impl Breakpoint {
    /// Inserts a trap at `address` and records the word it overwrote.
    pub fn arm<T: TraceTarget + ?Sized>(target: &mut T, address: Word) -> Result<Self, Error> {
        let word_address = arch::align_down(address);
        let offset = (address - word_address) as usize;

        let saved = target.read_word(word_address)?;
        let patched = Self::patch(saved, offset);

        debug!(
            "arming breakpoint at {:#x}: {:#018x} -> {:#018x} @ {:#x}",
            address, saved, patched, word_address
        );
        target.write_word(word_address, patched)?;

        Ok(Self {
            armed: true,
            address,
            word_address,
            saved,
        })
    }

    /// Writes the original word back. The armed flag is left to the caller.
    pub fn disarm<T: TraceTarget + ?Sized>(&self, target: &mut T) -> Result<(), Error> {
        debug!(
            "disarming breakpoint at {:#x}: restoring {:#018x} @ {:#x}",
            self.address, self.saved, self.word_address
        );
        target.write_word(self.word_address, self.saved)
    }

    /// Replaces byte `offset` of `word` with the trap opcode.
    pub fn patch(word: Word, offset: usize) -> Word {
        let shift = 8 * offset as u32;
        (word & !(0xff << shift)) | ((TRAP_OPCODE as Word) << shift)
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn set_armed(&mut self, armed: bool) {
        self.armed = armed;
    }

    pub fn address(&self) -> Word {
        self.address
    }

    pub fn word_address(&self) -> Word {
        self.word_address
    }

    pub fn offset(&self) -> usize {
        (self.address - self.word_address) as usize
    }

    pub fn saved_word(&self) -> Word {
        self.saved
    }

    /// The word as it appears in the target while the trap is inserted.
    pub fn patched_word(&self) -> Word {
        Self::patch(self.saved, self.offset())
    }

    /// True if `pc` is where the target stops after executing this trap.
    pub fn is_hit_at(&self, pc: Word) -> bool {
        self.armed && pc == self.address.wrapping_add(arch::TRAP_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTarget;

    const WORD: Word = 0x8348_10ec_8348_e589;

    #[test]
    fn patch_only_touches_one_byte() {
        for offset in 0..arch::WORD_SIZE {
            let patched = Breakpoint::patch(WORD, offset);
            let old = WORD.to_le_bytes();
            let new = patched.to_le_bytes();

            for i in 0..arch::WORD_SIZE {
                if i == offset {
                    assert_eq!(new[i], TRAP_OPCODE);
                } else {
                    assert_eq!(new[i], old[i], "byte {} changed patching offset {}", i, offset);
                }
            }
        }
    }

    #[test]
    fn arm_unaligned_address() {
        let mut target = SimTarget::new(vec![0x401000]);
        target.load(0x401000, &WORD.to_le_bytes());

        let bp = Breakpoint::arm(&mut target, 0x401005).unwrap();

        assert!(bp.is_armed());
        assert_eq!(bp.word_address(), 0x401000);
        assert_eq!(bp.offset(), 5);
        assert_eq!(bp.saved_word(), WORD);
        assert_eq!(target.word(0x401000), Breakpoint::patch(WORD, 5));
        assert_eq!(target.byte(0x401005), TRAP_OPCODE);
        assert_eq!(target.word(0x401000), bp.patched_word());
    }

    #[test]
    fn arm_then_disarm_restores_memory() {
        let mut target = SimTarget::new(vec![0x401000]);
        target.load(0x401000, &WORD.to_le_bytes());
        target.load(0x401008, &[0x90; 8]);

        let before = (target.word(0x401000), target.word(0x401008));
        let bp = Breakpoint::arm(&mut target, 0x401007).unwrap();
        assert_ne!(target.word(0x401000), before.0);

        bp.disarm(&mut target).unwrap();
        assert_eq!((target.word(0x401000), target.word(0x401008)), before);
        assert!(bp.is_armed());
    }

    #[test]
    fn hit_is_one_past_the_trap() {
        let mut target = SimTarget::new(vec![0x401000]);
        let mut bp = Breakpoint::arm(&mut target, 0x401004).unwrap();

        assert!(bp.is_hit_at(0x401005));
        assert!(!bp.is_hit_at(0x401004));

        bp.set_armed(false);
        assert!(!bp.is_hit_at(0x401005));
    }

    #[test]
    fn arm_surfaces_read_failure() {
        let mut target = SimTarget::new(vec![0x401000]);
        target.fail_memory_at(0x401000);

        let err = Breakpoint::arm(&mut target, 0x401002).unwrap_err();
        assert!(matches!(err, Error::MemoryRead(0x401000, _)));
    }
}
