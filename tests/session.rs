use sdb::arch::{Word, TRAP_OPCODE};
use sdb::sim::Request;
use sdb::{Ended, ExecutionState, Outcome, Repl, Session, SimTarget, TraceTarget};

const FUNC: Word = 0x401126;
const PID: i32 = 31337;

/// Instruction trace of a `main` that calls `func` five times in a loop.
fn sample() -> SimTarget {
    let mut program = vec![0x401136, 0x40113a, 0x40113e, 0x401145];
    for _ in 0..5 {
        program.extend_from_slice(&[0x401148, 0x40114d, FUNC, 0x40112a, 0x401131, 0x401152, 0x401156]);
    }
    program.extend_from_slice(&[0x40115c, 0x401161]);

    let mut target = SimTarget::new(program).with_pid(PID);
    target.load(
        0x401120,
        &[
            0x90, 0x90, 0x90, 0x90, 0x90, 0x90, 0x55, 0x48, // .. push rbp
            0x89, 0xe5, 0x48, 0x83, 0xec, 0x10, 0x89, 0x7d, // mov rbp,rsp; sub rsp,0x10
            0xfc, 0x8b, 0x45, 0xfc, 0x89, 0xc6, 0xbf, 0x04,
        ],
    );
    target
}

fn transcript(input: &str) -> (Ended, String, Repl<SimTarget>) {
    let mut repl = Repl::new(Session::new(sample()));
    let mut out = Vec::new();
    let ended = repl.run(input.as_bytes(), &mut out).unwrap();
    (ended, String::from_utf8(out).unwrap(), repl)
}

#[test]
fn breakpoint_in_loop_until_exit() {
    let (ended, out, repl) = transcript("b 0x401126\nr\nc\nc\nc\nc\nc\nq\n");

    let first = "(sdb) Continuing\nstop\nBreakpoint at 0x401126\n";
    let again = "(sdb) stop\nContinuing\nstop\nBreakpoint at 0x401126\n";
    let expected = format!(
        "(sdb) {}{}(sdb) stop\nContinuing\nProgram exited normally (process {})\n",
        first,
        again.repeat(4),
        PID
    );

    assert_eq!(out, expected);
    assert!(matches!(ended, Ended::Exited(Outcome::Exited { code: 0, .. })));
    assert_eq!(repl.session().state(), ExecutionState::Exited);
}

#[test]
fn step_and_print_around_breakpoint() {
    let (ended, out, _) = transcript("b 0x401126\nr\np $pc\ns\np $pc\ns\np $pc\nc\np $pc\nquit\n");

    assert_eq!(ended, Ended::Quit);
    assert_eq!(
        out,
        "(sdb) \
         (sdb) Continuing\nstop\nBreakpoint at 0x401126\n\
         (sdb) 0x401126\n\
         (sdb) stop\n\
         (sdb) 0x40112a\n\
         (sdb) stop\n\
         (sdb) 0x401131\n\
         (sdb) Continuing\nstop\nBreakpoint at 0x401126\n\
         (sdb) 0x401126\n\
         (sdb) "
    );
}

#[test]
fn control_before_run_changes_nothing() {
    let (ended, out, repl) = transcript("c\ns\ncontinue\nstep\np $pc\n");

    assert_eq!(ended, Ended::EndOfInput);
    assert_eq!(out.matches("The program is not being run\n").count(), 5);
    assert_eq!(repl.session().state(), ExecutionState::NotStarted);
    assert!(repl.session().target().history().is_empty());
}

#[test]
fn second_breakpoint_leaves_first_trap_only() {
    let mut session = Session::new(sample());
    let before = session.target().word(0x401128);

    session.set_breakpoint(FUNC).unwrap();
    assert!(session.set_breakpoint(0x40112a).is_err());

    let target = session.target();
    assert_eq!(target.byte(FUNC), TRAP_OPCODE);
    assert_eq!(target.byte(0x40112a), 0x48);
    assert_eq!(target.word(0x401128), before);
    assert_eq!(
        target
            .history()
            .iter()
            .filter(|r| matches!(r, Request::WriteWord(..)))
            .count(),
        1
    );
}

#[test]
fn hit_rewinds_program_counter() {
    let mut session = Session::new(sample());
    session.set_breakpoint(FUNC).unwrap();

    assert_eq!(session.run().unwrap(), Outcome::Breakpoint(FUNC));
    assert_eq!(session.program_counter().unwrap(), FUNC);
    assert!(!session.breakpoint().unwrap().is_armed());
    assert!(session
        .target()
        .history()
        .contains(&Request::SetRegisters { pc: FUNC }));
}

#[test]
fn quit_restores_code_and_releases_target() {
    let before = sample().word(0x401120);
    let mut session = Session::new(sample());
    session.set_breakpoint(0x401121).unwrap();
    assert_ne!(session.target().word(0x401120), before);

    session.finish(true).unwrap();

    let target = session.into_target();
    assert_eq!(target.word(0x401120), before);
    assert!(!target.is_attached());
    assert!(target.is_dead());
}

#[test]
fn target_killed_by_signal_ends_session() {
    // Moving the program counter behind the debugger's back makes the next
    // instruction fetch land mid-instruction.
    let mut repl = Repl::new(Session::new(sample()));
    let mut out = Vec::new();

    repl.execute("b 0x401126", &mut out).unwrap();
    repl.execute("r", &mut out).unwrap();
    repl.session_mut().target_mut().set_program_counter(0x40112b).unwrap();
    out.clear();

    let ended = repl.execute("s", &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        format!("Program terminated with signal SIGILL (process {})\n", PID)
    );
    assert!(matches!(ended, Some(Ended::Exited(Outcome::Signaled { .. }))));
    assert_eq!(repl.session().state(), ExecutionState::Exited);
}
