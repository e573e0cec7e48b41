//! Parser for script source
//!
//! Syntax:
//! ```text
//! # comment to end of line
//! : word-name ( stack-effect )
//!   statement1
//!   statement2
//!   ... ;
//!
//! top-level statements run once at load
//! ```
//!
//! Errors are plain strings prefixed with the line they occurred on.

use crate::ast::{Program, Statement, WordDef};
use std::rc::Rc;

const UNCLOSED_STRING: &str = "<<<UNCLOSED_STRING>>>";

#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    line: usize,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let tokens = tokenize(source);
        Parser { tokens, pos: 0 }
    }

    pub fn parse(&mut self) -> Result<Program, String> {
        let mut program = Program::new();

        if let Some(token) = self.tokens.iter().find(|t| t.text == UNCLOSED_STRING) {
            return Err(format!(
                "line {}: Unclosed string literal - missing closing quote",
                token.line
            ));
        }

        while !self.is_at_end() {
            if self.check(":") {
                let word = self.parse_word_def()?;
                if program.find_word(&word.name).is_some() {
                    return Err(format!(
                        "line {}: Word '{}' is defined twice",
                        word.line, word.name
                    ));
                }
                program.words.push(word);
            } else {
                program.body.push(self.parse_statement()?);
            }
        }

        Ok(program)
    }

    fn parse_word_def(&mut self) -> Result<WordDef, String> {
        let line = self.line();
        self.consume(":");

        let name = match self.advance() {
            Some(token) => token.text.clone(),
            None => return Err(format!("line {}: Expected word name after ':'", line)),
        };
        if is_reserved(&name) || literal(&name).is_some() {
            return Err(format!("line {}: '{}' cannot be used as a word name", line, name));
        }

        // Skip stack effect comment if present: ( -- )
        if self.check("(") {
            self.skip_stack_effect()?;
        }

        let mut body = Vec::new();
        while !self.check(";") {
            if self.is_at_end() {
                return Err(format!(
                    "line {}: Unexpected end of file in word '{}'",
                    line, name
                ));
            }
            if self.check(":") {
                return Err(format!(
                    "line {}: Nested word definition inside '{}' (missing ';'?)",
                    self.line(),
                    name
                ));
            }
            body.push(self.parse_statement()?);
        }
        self.consume(";");

        Ok(WordDef {
            name,
            body: Rc::from(body),
            line,
        })
    }

    fn parse_statement(&mut self) -> Result<Statement, String> {
        let line = self.line();
        let token = match self.advance() {
            Some(token) => token.text.clone(),
            None => return Err(format!("line {}: Unexpected end of file", line)),
        };

        if let Some(statement) = literal(&token) {
            return Ok(statement);
        }

        if token.starts_with('"') {
            let raw = &token[1..token.len() - 1];
            let unescaped = unescape_string(raw).map_err(|e| format!("line {}: {}", line, e))?;
            return Ok(Statement::StringLiteral(Rc::from(unescaped)));
        }

        match token.as_str() {
            "if" => self.parse_if(line),
            "[" => self.parse_quotation(line),
            ";" | "]" | ")" | "else" | "then" | "(" => {
                Err(format!("line {}: Unexpected '{}'", line, token))
            }
            _ => Ok(Statement::WordCall(token)),
        }
    }

    fn parse_if(&mut self, line: usize) -> Result<Statement, String> {
        let mut then_branch = Vec::new();

        // Parse then branch until 'else' or 'then'
        loop {
            if self.is_at_end() || self.check(";") {
                return Err(format!("line {}: Unterminated 'if' (missing 'then')", line));
            }
            if self.consume("else") {
                break;
            }
            if self.consume("then") {
                return Ok(Statement::If {
                    then_branch,
                    else_branch: None,
                });
            }
            then_branch.push(self.parse_statement()?);
        }

        let mut else_branch = Vec::new();
        loop {
            if self.is_at_end() || self.check(";") {
                return Err(format!(
                    "line {}: Unterminated 'else' branch (missing 'then')",
                    line
                ));
            }
            if self.consume("then") {
                return Ok(Statement::If {
                    then_branch,
                    else_branch: Some(else_branch),
                });
            }
            else_branch.push(self.parse_statement()?);
        }
    }

    fn parse_quotation(&mut self, line: usize) -> Result<Statement, String> {
        let mut body = Vec::new();
        while !self.consume("]") {
            if self.is_at_end() || self.check(";") {
                return Err(format!("line {}: Unclosed quotation (missing ']')", line));
            }
            body.push(self.parse_statement()?);
        }
        Ok(Statement::Quotation(Rc::from(body)))
    }

    fn skip_stack_effect(&mut self) -> Result<(), String> {
        let line = self.line();
        self.consume("(");
        while !self.check(")") {
            if self.is_at_end() {
                return Err(format!("line {}: Unclosed stack effect comment", line));
            }
            self.advance();
        }
        self.consume(")");
        Ok(())
    }

    fn check(&self, expected: &str) -> bool {
        self.tokens
            .get(self.pos)
            .is_some_and(|token| token.text == expected)
    }

    fn consume(&mut self, expected: &str) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Line of the current token, or of the last one at end of input
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |token| token.line)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

fn is_reserved(token: &str) -> bool {
    matches!(
        token,
        ":" | ";" | "(" | ")" | "[" | "]" | "if" | "else" | "then"
    ) || token.starts_with('"')
}

/// Non-string literal, if `token` is one
fn literal(token: &str) -> Option<Statement> {
    if let Ok(n) = token.parse::<i64>() {
        return Some(Statement::IntLiteral(n));
    }
    if looks_numeric(token)
        && let Ok(f) = token.parse::<f64>()
    {
        return Some(Statement::FloatLiteral(f));
    }
    match token {
        "true" => Some(Statement::BoolLiteral(true)),
        "false" => Some(Statement::BoolLiteral(false)),
        "nil" => Some(Statement::NilLiteral),
        _ => None,
    }
}

/// Keeps words like `inf` and `nan` from parsing as floats
fn looks_numeric(token: &str) -> bool {
    let digits = token.trim_start_matches(['-', '+']);
    digits.starts_with(|c: char| c.is_ascii_digit())
        || (digits.starts_with('.') && digits[1..].starts_with(|c: char| c.is_ascii_digit()))
}

/// Process escape sequences in a string literal
///
/// Supported escape sequences:
/// - `\"` -> `"`  (quote)
/// - `\\` -> `\`  (backslash)
/// - `\n` -> newline
/// - `\r` -> carriage return
/// - `\t` -> tab
///
/// # Errors
/// Returns error if an unknown escape sequence is encountered
fn unescape_string(s: &str) -> Result<String, String> {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('"') => result.push('"'),
                Some('\\') => result.push('\\'),
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some(c) => {
                    return Err(format!(
                        "Unknown escape sequence '\\{}' in string literal. \
                         Supported: \\\" \\\\ \\n \\r \\t",
                        c
                    ));
                }
                None => {
                    return Err("String ends with incomplete escape sequence '\\'".to_string());
                }
            }
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start_line = 1;
    let mut line = 1;
    let mut in_string = false;
    let mut in_comment = false;
    let mut prev_was_backslash = false;

    let flush = |current: &mut String, tokens: &mut Vec<Token>, at: usize| {
        if !current.is_empty() {
            tokens.push(Token {
                text: std::mem::take(current),
                line: at,
            });
        }
    };

    for ch in source.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                line += 1;
            }
            continue;
        }

        if in_string {
            current.push(ch);
            if ch == '"' && !prev_was_backslash {
                in_string = false;
                flush(&mut current, &mut tokens, start_line);
                prev_was_backslash = false;
            } else {
                prev_was_backslash = ch == '\\' && !prev_was_backslash;
            }
            if ch == '\n' {
                line += 1;
            }
            continue;
        }

        if ch == '"' {
            flush(&mut current, &mut tokens, start_line);
            in_string = true;
            start_line = line;
            current.push(ch);
            prev_was_backslash = false;
        } else if ch == '#' && current.is_empty() {
            in_comment = true;
        } else if ch.is_whitespace() {
            flush(&mut current, &mut tokens, start_line);
            if ch == '\n' {
                line += 1;
            }
        } else if "():;[]".contains(ch) {
            flush(&mut current, &mut tokens, start_line);
            tokens.push(Token {
                text: ch.to_string(),
                line,
            });
        } else {
            if current.is_empty() {
                start_line = line;
            }
            current.push(ch);
        }
    }

    if in_string {
        tokens.push(Token {
            text: UNCLOSED_STRING.to_string(),
            line: start_line,
        });
    } else {
        flush(&mut current, &mut tokens, start_line);
    }

    tokens
}
