//! Line syntax for the interactive shell and the `call` subcommand
//!
//! A line is either a meta command (`:help`), a binding (`let x = 5`), or a
//! call: a function name followed by whitespace-separated literals. Literals
//! are JSON where they parse as JSON, `$name` variable references, or bare
//! words taken as strings.

use thiserror::Error;

use crate::error::{Error, Result as CrateResult};
use crate::interp::{InterpResult, Runtime, Value};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unbalanced `{0}`")]
    Unbalanced(char),
    #[error("expected `let <name> = <literal>`")]
    MalformedLet,
}

/// One argument as written
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Value(Value),
    Variable(String),
}

impl Literal {
    pub fn resolve(self, rt: &Runtime) -> InterpResult<Value> {
        match self {
            Literal::Value(value) => Ok(value),
            Literal::Variable(name) => rt.get_variable(&name),
        }
    }
}

/// A parsed shell line
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Empty,
    Meta(String),
    Let { name: String, value: Literal },
    Call { name: String, args: Vec<Literal> },
}

pub fn parse_line(line: &str) -> Result<Line, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Line::Empty);
    }
    if line.starts_with(':') {
        return Ok(Line::Meta(line.to_string()));
    }
    if let Some(rest) = line.strip_prefix("let ") {
        let (name, value) = rest.split_once('=').ok_or(CommandError::MalformedLet)?;
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() || name.contains(char::is_whitespace) || value.is_empty() {
            return Err(CommandError::MalformedLet);
        }
        return Ok(Line::Let {
            name: name.to_string(),
            value: parse_literal(value),
        });
    }
    let mut words = split_args(line)?.into_iter();
    let name = words.next().unwrap_or_default();
    Ok(Line::Call {
        name,
        args: words.map(|word| parse_literal(&word)).collect(),
    })
}

/// Split on whitespace outside of string literals and brackets
pub fn split_args(input: &str) -> Result<Vec<String>, CommandError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut nesting: Vec<char> = Vec::new();
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                current.push(c);
                loop {
                    let next = chars.next().ok_or(CommandError::UnterminatedString)?;
                    current.push(next);
                    match next {
                        '\\' => current.push(chars.next().ok_or(CommandError::UnterminatedString)?),
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '[' | '{' => {
                nesting.push(c);
                current.push(c);
            }
            ']' | '}' => {
                let open = if c == ']' { '[' } else { '{' };
                if nesting.pop() != Some(open) {
                    return Err(CommandError::Unbalanced(c));
                }
                current.push(c);
            }
            c if c.is_whitespace() && nesting.is_empty() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if let Some(open) = nesting.pop() {
        return Err(CommandError::Unbalanced(open));
    }
    if !current.is_empty() {
        args.push(current);
    }
    Ok(args)
}

/// Arguments for a one-shot call. Outside the shell no variables exist, so
/// `$name` is rejected.
pub fn literal_args(tokens: &[String]) -> CrateResult<Vec<Value>> {
    tokens
        .iter()
        .map(|token| match parse_literal(token) {
            Literal::Value(value) => Ok(value),
            Literal::Variable(name) => Err(Error::argument(format!(
                "`${name}`: variables are only available in the shell"
            ))),
        })
        .collect()
}

pub fn parse_literal(token: &str) -> Literal {
    if let Some(name) = token.strip_prefix('$').filter(|name| !name.is_empty()) {
        return Literal::Variable(name.to_string());
    }
    match serde_json::from_str::<serde_json::Value>(token) {
        Ok(json) => Literal::Value(Value::from_json(&json)),
        Err(_) => Literal::Value(Value::string(token)),
    }
}
