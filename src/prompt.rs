//! Operator confirmation for destructive commands.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

/// Asks the operator a yes/no question.
pub trait Prompt {
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Reads the answer from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn confirm(&self, question: &str) -> Result<bool> {
        print!("{} [y/N] ", question);
        io::stdout().flush().context("Failed to flush prompt")?;
        read_answer(&mut io::stdin().lock())
    }
}

/// Answers yes without asking (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Prompt for AssumeYes {
    fn confirm(&self, question: &str) -> Result<bool> {
        println!("{} [y/N] y (--yes)", question);
        Ok(true)
    }
}

/// Read one line and decide whether it is an affirmative answer.
///
/// End of input counts as "no".
pub fn read_answer(input: &mut impl BufRead) -> Result<bool> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("Failed to read confirmation")?;
    Ok(is_affirmative(&line))
}

/// `y` or `yes`, any case, surrounding whitespace ignored.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
