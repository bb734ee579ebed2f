use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

/// User actions accepted by the terminal front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { market_id: String, stake: Decimal },
    Remove { market_id: String },
    Scale { factor: Decimal },
    Clear,
    Repeat,
    Submit,
    State,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}' (try: add, remove, scale, clear, repeat, submit, state, quit)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not a number")]
    BadNumber(String),
}

fn number(raw: &str) -> Result<Decimal, CommandError> {
    Decimal::from_str(raw).map_err(|_| CommandError::BadNumber(raw.to_string()))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let (&verb, args) = parts.split_first().ok_or(CommandError::Empty)?;

        match (verb.to_ascii_lowercase().as_str(), args) {
            ("add", [market, stake]) => Ok(Command::Add {
                market_id: market.to_string(),
                stake: number(stake)?,
            }),
            ("add", _) => Err(CommandError::Usage("add <market> <stake>")),
            ("remove" | "rm", [market]) => Ok(Command::Remove {
                market_id: market.to_string(),
            }),
            ("remove" | "rm", _) => Err(CommandError::Usage("remove <market>")),
            ("scale", [factor]) => Ok(Command::Scale {
                factor: number(factor)?,
            }),
            ("double", []) => Ok(Command::Scale {
                factor: Decimal::TWO,
            }),
            ("scale", _) => Err(CommandError::Usage("scale <factor>")),
            ("clear", []) => Ok(Command::Clear),
            ("repeat", []) => Ok(Command::Repeat),
            ("submit", []) => Ok(Command::Submit),
            ("state", []) => Ok(Command::State),
            ("quit" | "exit", []) => Ok(Command::Quit),
            ("clear" | "repeat" | "submit" | "state" | "quit" | "exit" | "double", _) => {
                Err(CommandError::Usage("this command takes no arguments"))
            }
            (other, _) => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
