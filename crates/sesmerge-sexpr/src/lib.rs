//! A lossless S-expression reader for KiCad board documents.
//!
//! Every node remembers the byte range it was read from, and numeric atoms
//! keep their exact lexeme, so a parsed document can be printed again without
//! drifting (`12.000000` stays `12.000000`). Edits that must not disturb the
//! surrounding text go through [`PatchSet`], which splices new text into the
//! original source instead of re-printing the tree.

pub mod formatter;

use thiserror::Error;

/// First direct child of `items` shaped like `(name ...)`.
pub fn find_child_list<'a>(items: &'a [Sexpr], name: &str) -> Option<&'a [Sexpr]> {
    items.iter().find_map(|item| {
        let list = item.as_list()?;
        (list.first()?.as_sym()? == name).then_some(list)
    })
}

/// Half-open byte range `start..end` into the text a node was read from.
///
/// Nodes built in code carry `0..0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The empty range at `at`; splicing into it inserts.
    pub fn point(at: usize) -> Self {
        Self::new(at, at)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SexprKind {
    Symbol(String),
    /// Quoted text with escapes already resolved.
    String(String),
    Int(i64),
    F64(f64),
    List(Vec<Sexpr>),
}

/// One node of a parsed or constructed tree.
#[derive(Debug, Clone)]
pub struct Sexpr {
    pub kind: SexprKind,
    pub span: Span,
    /// Source lexeme of a numeric atom, reused verbatim when printing.
    pub raw_atom: Option<String>,
}

impl PartialEq for Sexpr {
    fn eq(&self, other: &Self) -> bool {
        // Where a node came from does not change what it is.
        self.kind == other.kind
    }
}

impl Sexpr {
    pub fn with_span(kind: SexprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            raw_atom: None,
        }
    }

    fn built(kind: SexprKind) -> Self {
        Self::with_span(kind, Span::default())
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Self::built(SexprKind::Symbol(name.into()))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self::built(SexprKind::String(text.into()))
    }

    pub fn int(value: i64) -> Self {
        Self::built(SexprKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::built(SexprKind::F64(value))
    }

    /// A number printed exactly as `text`, e.g. a fixed-point millimetre value.
    ///
    /// `text` must be a valid number literal.
    pub fn number_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = text
            .parse::<i64>()
            .map(SexprKind::Int)
            .unwrap_or_else(|_| SexprKind::F64(text.parse().unwrap_or(f64::NAN)));
        Self {
            raw_atom: Some(text),
            ..Self::built(kind)
        }
    }

    pub fn list(items: Vec<Sexpr>) -> Self {
        Self::built(SexprKind::List(items))
    }

    /// Text of a symbol or a quoted string; KiCad writes some names either way.
    pub fn as_atom(&self) -> Option<&str> {
        if let SexprKind::Symbol(text) | SexprKind::String(text) = &self.kind {
            Some(text)
        } else {
            None
        }
    }

    pub fn as_sym(&self) -> Option<&str> {
        if let SexprKind::Symbol(name) = &self.kind {
            Some(name)
        } else {
            None
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        if let SexprKind::Int(value) = self.kind {
            Some(value)
        } else {
            None
        }
    }

    pub fn as_list(&self) -> Option<&[Sexpr]> {
        if let SexprKind::List(items) = &self.kind {
            Some(items)
        } else {
            None
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Sexpr>> {
        if let SexprKind::List(items) = &mut self.kind {
            Some(items)
        } else {
            None
        }
    }

    /// Leading symbol of a list: `segment` for `(segment ...)`.
    pub fn tag(&self) -> Option<&str> {
        self.as_list()?.first()?.as_sym()
    }

    /// How a numeric atom prints: its source lexeme if it has one, otherwise
    /// the shortest rendering of the value.
    pub fn number_lexeme(&self) -> Option<String> {
        if let Some(raw) = &self.raw_atom {
            return Some(raw.clone());
        }
        match self.kind {
            SexprKind::Int(value) => Some(value.to_string()),
            SexprKind::F64(value) => Some(formatter::trim_float(value.to_string())),
            _ => None,
        }
    }
}

/// `(key value)`.
pub fn kv(key: impl Into<String>, value: impl Into<Sexpr>) -> Sexpr {
    Sexpr::list(vec![Sexpr::symbol(key), value.into()])
}

impl From<u32> for Sexpr {
    fn from(value: u32) -> Self {
        Sexpr::int(i64::from(value))
    }
}

/// Why a piece of text is not a well-formed expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected end of input at byte {at}")]
    UnexpectedEof { at: usize },
    #[error("expected '{expected}', found '{found}' at byte {at}")]
    UnexpectedChar {
        found: char,
        expected: char,
        at: usize,
    },
    #[error("list opened at byte {opened_at} is never closed")]
    UnclosedList { opened_at: usize },
    #[error("string opened at byte {opened_at} is never terminated")]
    UnterminatedString { opened_at: usize },
    #[error("empty atom at byte {at}")]
    EmptyAtom { at: usize },
}

/// Recursive-descent reader over UTF-8 text.
pub struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            pos: 0,
        }
    }

    /// Read one expression.
    pub fn read_expr(&mut self) -> Result<Sexpr, ParseError> {
        self.skip_trivia();
        match self.peek() {
            None => Err(ParseError::UnexpectedEof { at: self.pos }),
            Some('(') => self.read_list(),
            Some('"') => self.read_string(),
            Some(_) => self.read_atom(),
        }
    }

    fn read_list(&mut self) -> Result<Sexpr, ParseError> {
        let start = self.pos;
        self.expect('(')?;
        let mut items = Vec::new();

        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(ParseError::UnclosedList { opened_at: start }),
                Some(')') => {
                    self.advance();
                    break;
                }
                Some(_) => items.push(self.read_expr()?),
            }

            if items.len() % 1000 == 0 {
                log::trace!("Read {} items in list at byte {start}", items.len());
            }
        }

        Ok(Sexpr::with_span(
            SexprKind::List(items),
            Span::new(start, self.pos),
        ))
    }

    fn read_atom(&mut self) -> Result<Sexpr, ParseError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' {
                break;
            }
            self.advance();
        }
        if self.pos == start {
            return Err(ParseError::EmptyAtom { at: start });
        }

        let text = &self.input[start..self.pos];
        let span = Span::new(start, self.pos);
        let kind = if let Ok(n) = text.parse::<i64>() {
            SexprKind::Int(n)
        } else if let Some(f) = parse_float_atom(text) {
            SexprKind::F64(f)
        } else {
            return Ok(Sexpr::with_span(SexprKind::Symbol(text.to_string()), span));
        };

        Ok(Sexpr {
            kind,
            span,
            raw_atom: Some(text.to_string()),
        })
    }

    fn read_string(&mut self) -> Result<Sexpr, ParseError> {
        let start = self.pos;
        self.expect('"')?;
        let mut value = String::new();

        loop {
            match self.peek() {
                None => return Err(ParseError::UnterminatedString { opened_at: start }),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.peek() {
                        None => return Err(ParseError::UnterminatedString { opened_at: start }),
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('t') => '\t',
                        Some(other) => other,
                    };
                    value.push(escaped);
                    self.advance();
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }

        Ok(Sexpr::with_span(
            SexprKind::String(value),
            Span::new(start, self.pos),
        ))
    }

    /// Skip whitespace and `;` line comments.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == ';' {
                while let Some(ch) = self.peek() {
                    self.advance();
                    if ch == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn advance(&mut self) {
        if let Some((pos, ch)) = self.chars.next() {
            self.pos = pos + ch.len_utf8();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(found) => Err(ParseError::UnexpectedChar {
                found,
                expected,
                at: self.pos,
            }),
            None => Err(ParseError::UnexpectedEof { at: self.pos }),
        }
    }
}

/// Only plain decimal/scientific literals count as numbers; `inf`, `nan` and
/// friends stay symbols.
fn parse_float_atom(text: &str) -> Option<f64> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '-' | '+' | '.')) {
        return None;
    }
    if !text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Read the first expression in `input`; anything after it is ignored.
pub fn parse(input: &str) -> Result<Sexpr, ParseError> {
    log::trace!("Parsing S-expression from {} bytes of input", input.len());
    let result = Parser::new(input).read_expr();
    if let Err(e) = &result {
        log::trace!("Failed to parse S-expression: {e}");
    }
    result
}

/// Text to put in place of `span` in the original source.
#[derive(Debug, Clone)]
struct Splice {
    span: Span,
    text: String,
}

/// Non-overlapping splices into one source text, applied in a single pass.
///
/// Splices at the same offset come out in the order they were added.
#[derive(Debug, Default)]
pub struct PatchSet {
    splices: Vec<Splice>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `text` in place of the bytes covered by `span`.
    pub fn replace(&mut self, span: Span, text: impl Into<String>) {
        self.splices.push(Splice {
            span,
            text: text.into(),
        });
    }

    pub fn insert(&mut self, at: usize, text: impl Into<String>) {
        self.replace(Span::point(at), text);
    }

    pub fn is_empty(&self) -> bool {
        self.splices.is_empty()
    }

    /// The patched text. `source` must be the text the spans were taken from.
    pub fn apply(&self, source: &str) -> String {
        let mut ordered: Vec<&Splice> = self.splices.iter().collect();
        ordered.sort_by_key(|splice| splice.span.start);
        debug_assert!(
            ordered
                .windows(2)
                .all(|pair| pair[0].span.end <= pair[1].span.start)
        );

        let added: usize = ordered.iter().map(|splice| splice.text.len()).sum();
        let mut out = String::with_capacity(source.len() + added);
        let mut copied = 0;
        for splice in ordered {
            let start = splice.span.start.clamp(copied, source.len());
            out.push_str(&source[copied..start]);
            out.push_str(&splice.text);
            copied = copied.max(splice.span.end.min(source.len()));
        }
        out.push_str(&source[copied..]);
        out
    }
}
