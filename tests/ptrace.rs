use sdb::{Command, Outcome, Process, Session, TraceTarget};

#[test]
#[ignore = "requires permission to ptrace child processes"]
fn it_can_launch_from_path() {
    // `true` is not a path, so this goes through the PATH lookup.
    let process = Process::launch(&Command::new("true")).unwrap();
    assert!(process.launched());

    let mut session = Session::new(process);
    assert!(matches!(session.run().unwrap(), Outcome::Exited { code: 0, .. }));
}

#[test]
#[ignore = "requires permission to ptrace child processes"]
fn it_can_break_at_entry_and_step_over() {
    let mut process = Process::launch(&Command::new("/bin/true")).unwrap();
    let entry = process.program_counter().unwrap();
    let original = process.read_word(entry & !7).unwrap();

    let mut session = Session::new(process);
    session.set_breakpoint(entry).unwrap();

    assert_eq!(session.run().unwrap(), Outcome::Breakpoint(entry));
    assert_eq!(session.program_counter().unwrap(), entry);
    assert_eq!(session.target_mut().read_word(entry & !7).unwrap(), original);

    assert!(matches!(session.cont().unwrap(), Outcome::Exited { code: 0, .. }));
}

#[test]
#[ignore = "requires permission to ptrace child processes"]
fn missing_program_fails_to_launch() {
    let err = Process::launch(&Command::new("/nonexistent/sdb-target")).unwrap_err();
    assert!(matches!(err, sdb::Error::LaunchExited(_)));
}
