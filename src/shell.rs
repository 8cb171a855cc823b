//! Shell rendering of step sequences.
//!
//! Every step has an equivalent shell command. Rendering is a pure function of
//! the steps: no filesystem access, and the same steps always produce the same
//! text, so the output can be reviewed, diffed, or run by hand on a target.

use std::fmt;
use std::io::{self, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::step::{Step, Steps};

impl Step {
    /// The shell command equivalent to this step, as separate words.
    ///
    /// A no-op renders to no words at all.
    pub fn shell_args(&self) -> Vec<String> {
        match self {
            Step::Noop => Vec::new(),
            Step::Comment(text) => vec!["#".to_string(), text.clone()],
            Step::Mkdir(path) | Step::MkdirCreateOnly(path) => {
                vec!["mkdir".to_string(), "-p".to_string(), path_arg(path)]
            }
            Step::Rmdir(path) => vec!["rmdir".to_string(), path_arg(path)],
            Step::Write { path, content } => vec![
                "echo".to_string(),
                format!("\"{}\"", content),
                "|".to_string(),
                "tee".to_string(),
                path_arg(path),
            ],
            Step::WriteBinary { path, content } => vec![
                "echo".to_string(),
                format!("\"{}\"", STANDARD.encode(content)),
                "|".to_string(),
                "base64".to_string(),
                "-d".to_string(),
                "|".to_string(),
                "tee".to_string(),
                path_arg(path),
            ],
            Step::Remove(path) => vec!["rm".to_string(), "-f".to_string(), path_arg(path)],
            Step::Symlink { target, link } => vec![
                "ln".to_string(),
                "-s".to_string(),
                path_arg(target),
                path_arg(link),
            ],
        }
    }
}

fn path_arg(path: &std::path::Path) -> String {
    path.display().to_string()
}

impl Steps {
    /// Render every step as shell words.
    pub fn shell_args(&self) -> ShellSteps {
        ShellSteps(self.iter().map(Step::shell_args).collect())
    }
}

/// Rendered steps, one word list per step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellSteps(Vec<Vec<String>>);

impl ShellSteps {
    /// One command line per step, skipping steps that render to nothing.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.0
            .iter()
            .filter(|args| !args.is_empty())
            .map(|args| args.join(" "))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vec<String>> {
        self.0.iter()
    }

    /// Write the command lines to `w`.
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for line in self.lines() {
            writeln!(w, "{}", line)?;
        }
        Ok(())
    }

    /// The command lines as a standalone script that stops at the first error.
    pub fn to_script(&self) -> String {
        format!("#!/bin/sh\nset -e\n\n{}", self)
    }
}

impl fmt::Display for ShellSteps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
