use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;

use nix::errno::Errno;
use nix::sys::personality;
use nix::sys::ptrace::Request as PTraceRequest;
use nix::unistd::{execv, execvp, fork, ForkResult, Pid};

use crate::util::ptrace;

/// A program to be started under trace.
#[derive(Debug, Clone)]
pub struct Command {
    path: OsString,
    args: Vec<OsString>,
    aslr: bool,
}

impl Command {
    pub fn new<P: AsRef<OsStr>>(command: P) -> Self {
        let path = command.as_ref().to_owned();
        Self {
            args: vec![path.clone()],
            path,
            aslr: true,
        }
    }

    pub fn command(&self) -> &OsStr {
        &self.path
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn aslr(&self) -> bool {
        self.aslr
    }

    pub fn disable_aslr(&mut self) -> &mut Self {
        self.aslr = false;
        self
    }

    pub fn enable_aslr(&mut self) -> &mut Self {
        self.aslr = true;
        self
    }

    pub fn arg<A: AsRef<OsStr>>(&mut self, arg: A) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<A: AsRef<OsStr>, I: IntoIterator<Item=A>>(&mut self, args: I) -> &mut Self {
        self.args.extend(args.into_iter().map(|arg| arg.as_ref().to_owned()));
        self
    }

    /// Forks a child that requests tracing and then executes the program.
    ///
    /// The program is executed directly first; only if that reports `ENOENT`
    /// is it looked up on `PATH`. The returned child has not yet been waited
    /// on.
    pub fn launch(&self) -> nix::Result<Pid> {
        let path = to_cstring(&self.path)?;
        let args = self.args.iter()
            .map(|arg| to_cstring(arg))
            .collect::<nix::Result<Vec<_>>>()?;

        if let ForkResult::Parent { child } = unsafe { fork() }? {
            return Ok(child)
        }

        // child: any failure from here on shows up as an exit in the parent's
        // first wait
        if !self.aslr {
            if let Ok(mut pers) = personality::get() {
                pers.insert(personality::Persona::ADDR_NO_RANDOMIZE);
                personality::set(pers).ok();
            }
        }

        if ptrace(PTraceRequest::PTRACE_TRACEME, Pid::from_raw(0), 0, 0).is_err() {
            unsafe { libc::_exit(libc::EXIT_FAILURE) }
        }

        if execv(&path, args.as_slice()).is_err() && Errno::last() == Errno::ENOENT {
            execvp(&path, args.as_slice()).ok();
        }

        unsafe { libc::_exit(libc::EXIT_FAILURE) }
    }
}

fn to_cstring(s: &OsStr) -> nix::Result<CString> {
    CString::new(s.as_bytes()).map_err(|_| Errno::EINVAL.into())
}
