use std::fmt;

/// Terminal used by the grammar for deletions and insertions.
pub const EPSILON: &str = "-EPS-";

/// A grammar symbol without span annotation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    Terminal(String),
    Nonterminal(String),
}

impl Symbol {
    pub fn terminal<S: Into<String>>(s: S) -> Self {
        Symbol::Terminal(s.into())
    }

    pub fn nonterminal<S: Into<String>>(s: S) -> Self {
        Symbol::Nonterminal(s.into())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_))
    }

    /// The underlying string
    pub fn as_str(&self) -> &str {
        match self {
            Symbol::Terminal(s) | Symbol::Nonterminal(s) => s,
        }
    }

    /// Returns `true` for the epsilon terminal
    pub fn is_epsilon(&self) -> bool {
        matches!(self, Symbol::Terminal(s) if s == EPSILON)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Terminal(s) => write!(f, "'{}'", s),
            Symbol::Nonterminal(s) => write!(f, "{}", s),
        }
    }
}

/// Half-open interval `[start, end)` over automaton states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// A span that covers no input
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// A hypergraph vertex: a symbol optionally annotated with a source span
/// and a target span.
///
/// The target span stands for a target-sentence span or a length-automaton
/// span, depending on which intersection produced the forest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Node {
    pub symbol: Symbol,
    pub source: Option<Span>,
    pub target: Option<Span>,
}

impl Node {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            source: None,
            target: None,
        }
    }

    pub fn terminal<S: Into<String>>(s: S) -> Self {
        Self::new(Symbol::terminal(s))
    }

    pub fn nonterminal<S: Into<String>>(s: S) -> Self {
        Self::new(Symbol::nonterminal(s))
    }

    /// Annotate with a source span
    pub fn with_source(mut self, start: u32, end: u32) -> Self {
        self.source = Some(Span::new(start, end));
        self
    }

    /// Annotate with a target span
    pub fn with_target(mut self, start: u32, end: u32) -> Self {
        self.target = Some(Span::new(start, end));
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.symbol.is_terminal()
    }

    /// The symbol with every annotation removed
    pub fn root(&self) -> &Symbol {
        &self.symbol
    }
}

impl From<Symbol> for Node {
    fn from(symbol: Symbol) -> Self {
        Self::new(symbol)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)?;
        match (self.source, self.target) {
            (None, None) => Ok(()),
            (Some(s), None) => write!(f, "[{}]", s),
            (None, Some(t)) => write!(f, "[_|{}]", t),
            (Some(s), Some(t)) => write!(f, "[{}|{}]", s, t),
        }
    }
}
