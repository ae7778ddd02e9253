use std::io;
use std::path::PathBuf;

use log::{debug, info};

use nix::sys::ptrace::Request as PTraceRequest;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use thiserror::Error;

use crate::arch::{RegisterSet, Word};
use crate::command::Command;
use crate::target::{Stop, TraceTarget};
use crate::util::{ptrace, ptrace_peek, waitpid, AsPid};

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not attach to `{0}`; {1}")]
    Attach(Pid, nix::Error),
    #[error("could not detach from `{0}`; {1}")]
    Detach(Pid, nix::Error),
    #[error("could not terminate `{0}`; {1}")]
    Terminate(Pid, nix::Error),
    #[error("already set breakpoint")]
    BreakpointExists(Word),
    #[error("breakpoint at {address:#x} corrupted: saved word {expected:#018x} reads back as {found:#018x}")]
    BreakpointCorrupted {
        address: Word,
        expected: Word,
        found: Word,
    },
    #[error("memory read at {0:#x} failed: {1}")]
    MemoryRead(Word, nix::Error),
    #[error("memory write at {0:#x} failed: {1}")]
    MemoryWrite(Word, nix::Error),
    #[error("register access for `{0}` failed: {1}")]
    Registers(Pid, nix::Error),
    #[error("ptrace request for `{0}` failed: {1}")]
    Request(Pid, nix::Error),
    #[error("waiting for `{0}` failed: {1}")]
    Wait(Pid, nix::Error),
    #[error("could not launch tracee {:?}: {1}", _0.command())]
    TraceLaunch(Command, nix::Error),
    #[error("tracee {:?} exited before it could be traced", _0.command())]
    LaunchExited(Command),
    #[error("process `{0}` entered unexpected state")]
    UnexpectedState(Pid),
    #[error("The program being debugged has been started already")]
    AlreadyRunning,
    #[error("The program is not being run")]
    NotRunning,
    #[error("The program has exited")]
    Exited,
    #[error("could not read config {0:?}: {1}")]
    ConfigRead(PathBuf, io::Error),
    #[error("could not parse config {0:?}: {1}")]
    ConfigParse(PathBuf, toml::de::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Errors after which the session cannot safely continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BreakpointCorrupted { .. } | Self::UnexpectedState(_) | Self::Io(_)
        )
    }
}

/// A live process traced with `ptrace`.
#[derive(Debug)]
pub struct Process {
    pid: Pid,
    launched: bool,
}

impl Process {
    pub fn new<P: AsPid>(pid: P) -> Self {
        Self {
            pid: pid.as_pid(),
            launched: false,
        }
    }

    /// Starts `command` as a tracee and waits for the stop at its first
    /// instruction.
    pub fn launch(command: &Command) -> Result<Self, Error> {
        let pid = command
            .launch()
            .map_err(|e| Error::TraceLaunch(command.clone(), e))?;

        let mut process = Self {
            pid,
            launched: true,
        };

        match process.wait_for_stop()? {
            Stop::Stopped(_) => {
                info!("launched {:?} as process {}", command.command(), pid);
                Ok(process)
            }
            _ => Err(Error::LaunchExited(command.clone())),
        }
    }

    /// Attaches to a running process and waits until it has stopped.
    pub fn attach_to<P: AsPid>(pid: P) -> Result<Self, Error> {
        let mut process = Self::new(pid);
        process.attach()?;

        match process.wait_for_stop()? {
            Stop::Stopped(_) => Ok(process),
            _ => Err(Error::UnexpectedState(process.pid)),
        }
    }

    /// True if this debugger created the process rather than attaching to it.
    pub fn launched(&self) -> bool {
        self.launched
    }
}

impl TraceTarget for Process {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn attach(&mut self) -> Result<(), Error> {
        info!("attaching to process {}", self.pid);
        ptrace(PTraceRequest::PTRACE_ATTACH, self.pid, 0, 0)
            .map(|_| ())
            .map_err(|e| Error::Attach(self.pid, e))
    }

    fn detach(&mut self) -> Result<(), Error> {
        info!("detaching from process {}", self.pid);
        ptrace(PTraceRequest::PTRACE_DETACH, self.pid, 0, 0)
            .map(|_| ())
            .map_err(|e| Error::Detach(self.pid, e))
    }

    fn terminate(&mut self) -> Result<(), Error> {
        info!("terminating process {}", self.pid);
        signal::kill(self.pid, Signal::SIGTERM).map_err(|e| Error::Terminate(self.pid, e))
    }

    fn read_word(&mut self, address: Word) -> Result<Word, Error> {
        let word = ptrace_peek(PTraceRequest::PTRACE_PEEKTEXT, self.pid, address)
            .map(|v| v as Word)
            .map_err(|e| Error::MemoryRead(address, e))?;
        debug!("peek {:#x} -> {:#018x}", address, word);
        Ok(word)
    }

    fn write_word(&mut self, address: Word, value: Word) -> Result<(), Error> {
        debug!("poke {:#x} <- {:#018x}", address, value);
        ptrace(PTraceRequest::PTRACE_POKETEXT, self.pid, address, value)
            .map(|_| ())
            .map_err(|e| Error::MemoryWrite(address, e))
    }

    fn registers(&mut self) -> Result<RegisterSet, Error> {
        RegisterSet::read(self.pid).map_err(|e| Error::Registers(self.pid, e))
    }

    fn set_registers(&mut self, regs: &RegisterSet) -> Result<(), Error> {
        debug!("writing registers for {}: {:?}", self.pid, regs);
        regs.write(self.pid).map_err(|e| Error::Registers(self.pid, e))
    }

    fn resume(&mut self) -> Result<(), Error> {
        debug!("continuing {}", self.pid);
        ptrace(PTraceRequest::PTRACE_CONT, self.pid, 0, 0)
            .map(|_| ())
            .map_err(|e| Error::Request(self.pid, e))
    }

    fn single_step(&mut self) -> Result<(), Error> {
        debug!("single-stepping {}", self.pid);
        ptrace(PTraceRequest::PTRACE_SINGLESTEP, self.pid, 0, 0)
            .map(|_| ())
            .map_err(|e| Error::Request(self.pid, e))
    }

    fn wait_for_stop(&mut self) -> Result<Stop, Error> {
        let (status, _) = waitpid(self.pid, Some(WaitPidFlag::__WALL))
            .map_err(|e| Error::Wait(self.pid, e))?;

        debug!("wait {}: {:?}", self.pid, status);

        match status {
            WaitStatus::Exited(_, code) => Ok(Stop::Exited(code)),
            WaitStatus::Signaled(_, sig, _) => Ok(Stop::Signaled(sig)),
            WaitStatus::Stopped(_, sig) | WaitStatus::PtraceEvent(_, sig, _) => {
                Ok(Stop::Stopped(sig))
            }
            _ => Err(Error::UnexpectedState(self.pid)),
        }
    }
}
