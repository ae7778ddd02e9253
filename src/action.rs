use crate::arch::Word;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    ProgramCounter,
}

impl Operand {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "$pc" => Some(Self::ProgramCounter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Break(Word),
    Run,
    Continue,
    Step,
    Print(Operand),
    Quit,
    Unknown(String),
}

impl Action {
    /// Parses one line of operator input.
    ///
    /// Returns `None` for blank lines and for recognised commands with
    /// malformed operands; those are ignored without a message.
    pub fn parse(line: &str) -> Option<Self> {
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        let (command, operands) = tokens.split_first()?;

        match *command {
            "b" | "break" => match operands {
                [address] => parse_address(address).map(Self::Break),
                _ => None,
            },
            "r" | "run" => Some(Self::Run),
            "c" | "continue" => Some(Self::Continue),
            "s" | "step" => Some(Self::Step),
            "p" | "print" => match operands {
                [operand] => Operand::parse(operand).map(Self::Print),
                _ => None,
            },
            "q" | "quit" => match operands {
                [] => Some(Self::Quit),
                _ => None,
            },
            other => Some(Self::Unknown(other.to_owned())),
        }
    }
}

/// Parses `0x`-prefixed hexadecimal or plain decimal.
pub fn parse_address(s: &str) -> Option<Word> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() || hex.starts_with('+') {
            return None;
        }
        Word::from_str_radix(hex, 16).ok()
    } else if s.starts_with('+') {
        None
    } else {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_and_short_forms() {
        for (short, long, action) in &[
            ("r", "run", Action::Run),
            ("c", "continue", Action::Continue),
            ("s", "step", Action::Step),
            ("q", "quit", Action::Quit),
        ] {
            assert_eq!(Action::parse(short).as_ref(), Some(action));
            assert_eq!(Action::parse(long).as_ref(), Some(action));
        }

        assert_eq!(Action::parse("b 0x401126"), Some(Action::Break(0x401126)));
        assert_eq!(Action::parse("break 4198694"), Some(Action::Break(0x401126)));
        assert_eq!(Action::parse("p $pc"), Some(Action::Print(Operand::ProgramCounter)));
        assert_eq!(Action::parse("print $pc"), Some(Action::Print(Operand::ProgramCounter)));
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(Action::parse("   b    0x10  "), Some(Action::Break(0x10)));
        assert_eq!(Action::parse("\tc\t"), Some(Action::Continue));
        assert_eq!(Action::parse(""), None);
        assert_eq!(Action::parse("    "), None);
    }

    #[test]
    fn commands_are_case_sensitive() {
        assert_eq!(Action::parse("B 0x10"), Some(Action::Unknown("B".into())));
        assert_eq!(Action::parse("Run"), Some(Action::Unknown("Run".into())));
        assert_eq!(Action::parse("x/4 $sp"), Some(Action::Unknown("x/4".into())));
    }

    #[test]
    fn malformed_operands_are_ignored() {
        assert_eq!(Action::parse("b"), None);
        assert_eq!(Action::parse("b 0x10 0x20"), None);
        assert_eq!(Action::parse("b main"), None);
        assert_eq!(Action::parse("b 0x"), None);
        assert_eq!(Action::parse("b -1"), None);
        assert_eq!(Action::parse("p"), None);
        assert_eq!(Action::parse("p $sp"), None);
        assert_eq!(Action::parse("p $pc $sp"), None);
        assert_eq!(Action::parse("q now"), None);
    }

    #[test]
    fn run_control_ignores_extra_tokens() {
        assert_eq!(Action::parse("c 3"), Some(Action::Continue));
        assert_eq!(Action::parse("run --fast"), Some(Action::Run));
    }

    #[test]
    fn addresses() {
        assert_eq!(parse_address("0x0"), Some(0));
        assert_eq!(parse_address("0X7fffffffe000"), Some(0x7fff_ffff_e000));
        assert_eq!(parse_address("0xffffffffffffffff"), Some(Word::MAX));
        assert_eq!(parse_address("010"), Some(10));
        assert_eq!(parse_address("0x1_000"), None);
        assert_eq!(parse_address("+5"), None);
        assert_eq!(parse_address("0x+5"), None);
        assert_eq!(parse_address("0x10000000000000000"), None);
        assert_eq!(parse_address("ff"), None);
    }
}
