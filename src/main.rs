use std::io;

use anyhow::{anyhow, Context};
use clap::{crate_version, App, AppSettings, Arg, ArgMatches};
use log::warn;

use sdb::{Command, Config, Ended, Process, Repl, Session};

fn cli() -> App<'static, 'static> {
    App::new("sdb")
        .version(crate_version!())
        .about("Minimal x86-64 debugger with a single software breakpoint")
        .setting(AppSettings::TrailingVarArg)
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .takes_value(true)
                .help("Read settings from a TOML file"),
        )
        .arg(
            Arg::with_name("pid")
                .short("p")
                .long("pid")
                .value_name("PID")
                .takes_value(true)
                .conflicts_with("command")
                .help("Attach to a running process instead of launching one"),
        )
        .arg(
            Arg::with_name("no-aslr")
                .long("no-aslr")
                .help("Disable address space randomisation in the launched program"),
        )
        .arg(
            Arg::with_name("prompt")
                .long("prompt")
                .value_name("TEXT")
                .takes_value(true)
                .help("Prompt printed before each command"),
        )
        .arg(
            Arg::with_name("command")
                .value_name("PROGRAM")
                .multiple(true)
                .required_unless("pid")
                .help("Program to debug, followed by its arguments"),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    let mut config = match matches.value_of_os("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if matches.is_present("no-aslr") {
        config.aslr = false;
    }

    if let Some(prompt) = matches.value_of("prompt") {
        config.prompt = prompt.to_owned();
    }

    Ok(config)
}

fn start(matches: &ArgMatches, config: &Config) -> anyhow::Result<Process> {
    if let Some(pid) = matches.value_of("pid") {
        let pid = pid
            .parse::<i32>()
            .with_context(|| format!("invalid process id `{}`", pid))?;
        return Ok(Process::attach_to(pid)?);
    }

    let mut values = matches
        .values_of_os("command")
        .ok_or_else(|| anyhow!("no program to debug"))?;
    let program = values.next().ok_or_else(|| anyhow!("no program to debug"))?;

    let mut command = Command::new(program);
    command.args(values);
    if !config.aslr {
        command.disable_aslr();
    }

    Ok(Process::launch(&command)?)
}

fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log.as_str()))
        .init();

    let process = start(&matches, &config)?;
    let launched = process.launched();

    let mut repl = Repl::new(Session::new(process)).with_prompt(config.prompt.as_str());

    let stdin = io::stdin();
    let stdout = io::stdout();
    let ended = repl.run(stdin.lock(), stdout.lock());

    match ended {
        Ok(Ended::Exited(_)) => Ok(()),
        Ok(Ended::Quit) | Ok(Ended::EndOfInput) => {
            if let Err(e) = repl.session_mut().finish(launched) {
                warn!("could not release process {}: {}", repl.session().pid(), e);
            }
            Ok(())
        }
        Err(e) => {
            if let Err(e) = repl.session_mut().finish(launched) {
                warn!("could not release process {}: {}", repl.session().pid(), e);
            }
            Err(e).context("debugging session aborted")
        }
    }
}
