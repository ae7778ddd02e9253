#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
compile_error!("sdb only supports x86_64 Linux");

pub mod action;
pub mod arch;
pub mod breakpoint;
pub mod command;
pub mod config;
pub mod repl;
pub mod session;
#[doc(hidden)]
pub mod sim;
pub mod target;
pub mod trace;
mod util;

pub use nix::unistd::Pid;
pub use nix::Error as SystemError;

pub use action::{Action, Operand};
pub use breakpoint::Breakpoint;
pub use command::Command;
pub use config::Config;
pub use repl::{Ended, Repl};
pub use session::{ExecutionState, Outcome, Session};
#[doc(hidden)]
pub use sim::SimTarget;
pub use target::{Stop, TraceTarget};
pub use trace::{Error, Process};
