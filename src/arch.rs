use std::fmt;
use std::mem::size_of;
use std::ops::{Deref, DerefMut};

use nix::sys::ptrace::Request;
use nix::unistd::Pid;

use crate::util::ptrace;

pub type Word = u64;

pub const WORD_SIZE: usize = size_of::<Word>();

/// `int3`
pub const TRAP_OPCODE: u8 = 0xcc;

/// Distance the program counter advances when the trap executes.
pub const TRAP_SIZE: Word = 1;

/// Rounds `address` down to the start of the word containing it.
pub fn align_down(address: Word) -> Word {
    address & !(WORD_SIZE as Word - 1)
}

#[derive(Clone)]
#[repr(transparent)]
pub struct RegisterSet(libc::user_regs_struct);

impl RegisterSet {
    pub fn program_counter(&self) -> Word {
        self.0.rip
    }

    pub fn program_counter_mut(&mut self) -> &mut Word {
        &mut self.0.rip
    }

    pub fn read(pid: Pid) -> nix::Result<Self> {
        let mut regs = Self::default();
        ptrace(
            Request::PTRACE_GETREGS,
            pid,
            0,
            &mut regs as *mut RegisterSet as *mut _,
        )?;
        Ok(regs)
    }

    pub fn write(&self, pid: Pid) -> nix::Result<()> {
        let mut regs = self.clone();
        ptrace(
            Request::PTRACE_SETREGS,
            pid,
            0,
            &mut regs as *mut RegisterSet as *mut _,
        )
        .map(|_| ())
    }
}

impl Default for RegisterSet {
    fn default() -> Self {
        Self(unsafe { std::mem::MaybeUninit::zeroed().assume_init() })
    }
}

impl PartialEq for RegisterSet {
    fn eq(&self, other: &RegisterSet) -> bool {
        let size = size_of::<Self>();
        unsafe {
            libc::memcmp(
                self as *const RegisterSet as *const _,
                other as *const RegisterSet as *const _,
                size,
            ) == 0
        }
    }
}
impl Eq for RegisterSet {}

impl fmt::Debug for RegisterSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RegisterSet")
            .field("rip", &format_args!("{:#x}", self.0.rip))
            .field("rsp", &format_args!("{:#x}", self.0.rsp))
            .field("eflags", &format_args!("{:#x}", self.0.eflags))
            .finish()
    }
}

impl Deref for RegisterSet {
    type Target = libc::user_regs_struct;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for RegisterSet {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
