//! An in-memory [`TraceTarget`] for exercising the debugger without `ptrace`.
//! This is a test fixture for the crate's own unit and integration tests; the
//! `sdb` binary never uses it.
//!
//! The simulated program is a list of instruction addresses in the order they
//! execute. Executing an instruction whose first byte is `int3` behaves like
//! the CPU: the target stops with `SIGTRAP` and the program counter one byte
//! past the trap, without advancing through the program. Executing from any
//! other address than the next expected instruction kills the target with
//! `SIGILL`. Running off the end of the list exits the target.

use fnv::FnvHashMap as HashMap;
use fnv::FnvHashSet as HashSet;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::arch::{self, RegisterSet, Word, TRAP_OPCODE, TRAP_SIZE, WORD_SIZE};
use crate::target::{Stop, TraceTarget};
use crate::trace::Error;

/// A primitive issued against a [`SimTarget`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Request {
    Attach,
    Detach,
    Terminate,
    ReadWord(Word),
    WriteWord(Word, Word),
    GetRegisters,
    SetRegisters { pc: Word },
    Resume,
    SingleStep,
    Wait,
}

enum Exec {
    Executed,
    Trapped,
    Halted(Stop),
}

#[derive(Debug, Clone)]
pub struct SimTarget {
    pid: Pid,
    memory: HashMap<Word, Word>,
    faults: HashSet<Word>,
    regs: RegisterSet,
    program: Vec<Word>,
    cursor: usize,
    stores: HashMap<usize, (Word, Vec<u8>)>,
    exit_code: i32,
    pending: Option<Stop>,
    attached: bool,
    running: bool,
    dead: bool,
    fail_registers: bool,
    history: Vec<Request>,
}

impl SimTarget {
    pub const DEFAULT_PID: i32 = 4242;

    /// A stopped target about to execute the first address of `program`.
    pub fn new(program: Vec<Word>) -> Self {
        let mut regs = RegisterSet::default();
        *regs.program_counter_mut() = program.first().copied().unwrap_or(0);

        Self {
            pid: Pid::from_raw(Self::DEFAULT_PID),
            memory: HashMap::default(),
            faults: HashSet::default(),
            regs,
            program,
            cursor: 0,
            stores: HashMap::default(),
            exit_code: 0,
            pending: None,
            attached: true,
            running: false,
            dead: false,
            fail_registers: false,
            history: Vec::new(),
        }
    }

    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = Pid::from_raw(pid);
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Copies `bytes` into memory starting at `address`.
    pub fn load(&mut self, address: Word, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.set_byte(address + i as Word, *b);
        }
    }

    /// The aligned word containing `address`, without recording a request.
    pub fn word(&self, address: Word) -> Word {
        self.memory
            .get(&arch::align_down(address))
            .copied()
            .unwrap_or(0)
    }

    pub fn byte(&self, address: Word) -> u8 {
        let shift = 8 * (address - arch::align_down(address)) as u32;
        (self.word(address) >> shift) as u8
    }

    fn set_byte(&mut self, address: Word, value: u8) {
        let aligned = arch::align_down(address);
        let shift = 8 * (address - aligned) as u32;
        let word = self.word(aligned);
        self.memory
            .insert(aligned, (word & !(0xff << shift)) | ((value as Word) << shift));
    }

    /// Makes the instruction at `index` of the program store `bytes` at
    /// `address` when it executes.
    pub fn store_on_execute(&mut self, index: usize, address: Word, bytes: &[u8]) {
        self.stores.insert(index, (address, bytes.to_vec()));
    }

    /// Makes any word access overlapping the word at `address` fail.
    pub fn fail_memory_at(&mut self, address: Word) {
        self.faults.insert(arch::align_down(address));
    }

    pub fn fail_registers(&mut self, fail: bool) {
        self.fail_registers = fail;
    }

    pub fn history(&self) -> &[Request] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Index of the next instruction to execute in the program.
    pub fn position(&self) -> usize {
        self.cursor
    }

    fn check_alive(&self) -> Result<(), Error> {
        if self.dead {
            Err(Error::Request(self.pid, Errno::ESRCH.into()))
        } else {
            Ok(())
        }
    }

    fn check_stopped(&self) -> Result<(), Error> {
        self.check_alive()?;
        if self.running {
            Err(Error::Request(self.pid, Errno::ESRCH.into()))
        } else {
            Ok(())
        }
    }

    fn faulted(&self, address: Word) -> bool {
        let first = arch::align_down(address);
        let last = arch::align_down(address + WORD_SIZE as Word - 1);
        self.faults.contains(&first) || self.faults.contains(&last)
    }

    fn execute(&mut self) -> Exec {
        let address = match self.program.get(self.cursor) {
            Some(&address) => address,
            None => return Exec::Halted(Stop::Exited(self.exit_code)),
        };

        if self.regs.program_counter() != address {
            return Exec::Halted(Stop::Signaled(Signal::SIGILL));
        }

        if self.byte(address) == TRAP_OPCODE {
            *self.regs.program_counter_mut() = address + TRAP_SIZE;
            return Exec::Trapped;
        }

        if let Some((target, bytes)) = self.stores.remove(&self.cursor) {
            self.load(target, &bytes);
        }

        self.cursor += 1;
        match self.program.get(self.cursor) {
            Some(&next) => {
                *self.regs.program_counter_mut() = next;
                Exec::Executed
            }
            None => Exec::Halted(Stop::Exited(self.exit_code)),
        }
    }

    fn settle(&mut self, stop: Stop) {
        if stop.is_terminal() {
            self.dead = true;
        }
        self.running = true;
        self.pending = Some(stop);
    }
}

impl TraceTarget for SimTarget {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn attach(&mut self) -> Result<(), Error> {
        self.history.push(Request::Attach);
        self.check_alive()?;
        self.attached = true;
        Ok(())
    }

    fn detach(&mut self) -> Result<(), Error> {
        self.history.push(Request::Detach);
        if self.dead {
            return Err(Error::Detach(self.pid, Errno::ESRCH.into()));
        }
        self.attached = false;
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), Error> {
        self.history.push(Request::Terminate);
        if self.dead {
            return Err(Error::Terminate(self.pid, Errno::ESRCH.into()));
        }
        self.dead = true;
        Ok(())
    }

    fn read_word(&mut self, address: Word) -> Result<Word, Error> {
        self.history.push(Request::ReadWord(address));
        self.check_stopped()?;
        if self.faulted(address) {
            return Err(Error::MemoryRead(address, Errno::EIO.into()));
        }

        let mut bytes = [0u8; WORD_SIZE];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.byte(address + i as Word);
        }
        Ok(Word::from_le_bytes(bytes))
    }

    fn write_word(&mut self, address: Word, value: Word) -> Result<(), Error> {
        self.history.push(Request::WriteWord(address, value));
        self.check_stopped()?;
        if self.faulted(address) {
            return Err(Error::MemoryWrite(address, Errno::EIO.into()));
        }

        self.load(address, &value.to_le_bytes());
        Ok(())
    }

    fn registers(&mut self) -> Result<RegisterSet, Error> {
        self.history.push(Request::GetRegisters);
        self.check_stopped()?;
        if self.fail_registers {
            return Err(Error::Registers(self.pid, Errno::ESRCH.into()));
        }
        Ok(self.regs.clone())
    }

    fn set_registers(&mut self, regs: &RegisterSet) -> Result<(), Error> {
        self.history.push(Request::SetRegisters {
            pc: regs.program_counter(),
        });
        self.check_stopped()?;
        if self.fail_registers {
            return Err(Error::Registers(self.pid, Errno::ESRCH.into()));
        }
        self.regs = regs.clone();
        Ok(())
    }

    fn resume(&mut self) -> Result<(), Error> {
        self.history.push(Request::Resume);
        self.check_stopped()?;

        let stop = loop {
            match self.execute() {
                Exec::Executed => continue,
                Exec::Trapped => break Stop::Stopped(Signal::SIGTRAP),
                Exec::Halted(stop) => break stop,
            }
        };

        self.settle(stop);
        Ok(())
    }

    fn single_step(&mut self) -> Result<(), Error> {
        self.history.push(Request::SingleStep);
        self.check_stopped()?;

        let stop = match self.execute() {
            Exec::Executed | Exec::Trapped => Stop::Stopped(Signal::SIGTRAP),
            Exec::Halted(stop) => stop,
        };

        self.settle(stop);
        Ok(())
    }

    fn wait_for_stop(&mut self) -> Result<Stop, Error> {
        self.history.push(Request::Wait);

        let stop = self
            .pending
            .take()
            .ok_or_else(|| Error::Wait(self.pid, Errno::ECHILD.into()))?;
        self.running = false;
        Ok(stop)
    }
}
