//! Tokenized external command lines
//!
//! Commands are kept as a program plus argument tokens so nothing has to be
//! re-split before spawning. `Display` renders the shell-equivalent line used
//! in log banners, plans and error messages.

use std::fmt;

/// An external command: program and its argument tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    /// Create a command for `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument token
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several argument tokens
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a `-DNAME=VALUE` definition
    pub fn define(self, name: &str, value: impl fmt::Display) -> Self {
        self.arg(format!("-D{}={}", name, value))
    }

    /// Append a raw `-D<option>` definition (`NAME=VALUE` or `NAME:TYPE=VALUE`)
    pub fn define_raw(self, option: &str) -> Self {
        self.arg(format!("-D{}", option))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    #[cfg(test)]
    /// Whether any argument token equals `token`
    pub fn has_arg(&self, token: &str) -> bool {
        self.args.iter().any(|a| a == token)
    }
}

/// Quote a token the way a POSIX shell would need it
fn quote(token: &str) -> String {
    let needs_quotes = token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '$' | '`'));
    if !needs_quotes {
        return token.to_string();
    }

    let mut quoted = String::with_capacity(token.len() + 2);
    quoted.push('"');
    for c in token.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}
