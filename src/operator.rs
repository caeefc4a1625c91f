//! Operator interaction port.
//!
//! The core never reads the console directly: interactive moments (the
//! second-factor code, run parameters) are synchronous calls on this port,
//! so a different front end — or a scripted test double — can stand in.

use colored::Colorize;
use std::io::{self, BufRead, Write};

pub trait Operator: Send + Sync {
    /// Ask the operator a question and return their trimmed answer.
    fn prompt(&self, message: &str) -> io::Result<String>;

    /// Yes/no convenience on top of [`Self::prompt`].
    fn confirm(&self, message: &str) -> io::Result<bool> {
        let answer = self.prompt(message)?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

/// Console-backed operator for the interactive CLI surface.
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn prompt(&self, message: &str) -> io::Result<String> {
        print!("{} {} ", "[+]".magenta(), message);
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}
