//! Abstract Syntax Tree for scripts

use std::rc::Rc;

/// A parsed script: word definitions plus top-level statements
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub words: Vec<WordDef>,
    /// Executed once, in order, when the script is loaded
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordDef {
    pub name: String,
    pub body: Rc<[Statement]>,
    /// Line of the `:` that opened the definition
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(Rc<str>),
    NilLiteral,
    WordCall(String),
    /// `if ... else ... then`: consumes the flag on top of the stack
    If {
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    },
    /// `[ ... ]`: pushes a callable
    Quotation(Rc<[Statement]>),
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_word(&self, name: &str) -> Option<&WordDef> {
        self.words.iter().find(|w| w.name == name)
    }
}
