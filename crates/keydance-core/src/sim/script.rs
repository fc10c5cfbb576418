// Keydance Event Scripts
// Plain-text key traces replayed against the simulator
//
//   # comment
//   0    press   0,0
//   120  release 0,0
//   300  wait

use std::fmt;

use regex::Regex;

use crate::KeyPos;

/// Script parse errors
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("line {line}: cannot parse '{text}'")]
    Syntax { line: usize, text: String },

    #[error("line {line}: time {at_ms}ms is before the previous step at {previous_ms}ms")]
    TimeWentBack {
        line: usize,
        at_ms: u64,
        previous_ms: u64,
    },

    #[error("line {line}: {what} out of range: {value}")]
    OutOfRange {
        line: usize,
        what: &'static str,
        value: String,
    },

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// One thing to do at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Press(KeyPos),
    Release(KeyPos),
    /// Press immediately followed by release
    Tap(KeyPos),
    /// Only let time pass
    Wait,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Press(pos) => write!(f, "press {}", pos),
            Command::Release(pos) => write!(f, "release {}", pos),
            Command::Tap(pos) => write!(f, "tap {}", pos),
            Command::Wait => f.write_str("wait"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Absolute virtual time of the step
    pub at_ms: u64,
    pub command: Command,
    /// 1-based source line
    pub line: usize,
}

/// A parsed trace, steps in time order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let key_cmd = Regex::new(r"^(\d+)\s+(press|release|tap)\s+(\d+)\s*,\s*(\d+)$")?;
        let wait_cmd = Regex::new(r"^(\d+)\s+wait$")?;

        let mut steps = Vec::new();
        let mut previous_ms = 0u64;

        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            let text = raw.split('#').next().unwrap_or("").trim();
            if text.is_empty() {
                continue;
            }

            let (at_ms, command) = if let Some(caps) = key_cmd.captures(text) {
                let at_ms = parse_num::<u64>(&caps[1], line, "time")?;
                let row = parse_num::<u8>(&caps[3], line, "row")?;
                let col = parse_num::<u8>(&caps[4], line, "column")?;
                let pos = KeyPos::new(row, col);
                let command = match &caps[2] {
                    "press" => Command::Press(pos),
                    "release" => Command::Release(pos),
                    _ => Command::Tap(pos),
                };
                (at_ms, command)
            } else if let Some(caps) = wait_cmd.captures(text) {
                (parse_num::<u64>(&caps[1], line, "time")?, Command::Wait)
            } else {
                return Err(ScriptError::Syntax {
                    line,
                    text: text.to_string(),
                });
            };

            if at_ms < previous_ms {
                return Err(ScriptError::TimeWentBack {
                    line,
                    at_ms,
                    previous_ms,
                });
            }
            previous_ms = at_ms;
            steps.push(Step {
                at_ms,
                command,
                line,
            });
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Time of the last step
    pub fn end_ms(&self) -> u64 {
        self.steps.last().map_or(0, |s| s.at_ms)
    }
}

fn parse_num<T: std::str::FromStr>(
    text: &str,
    line: usize,
    what: &'static str,
) -> Result<T, ScriptError> {
    text.parse().map_err(|_| ScriptError::OutOfRange {
        line,
        what,
        value: text.to_string(),
    })
}
