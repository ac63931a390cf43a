//! Line-oriented lexer for SES text.
//!
//! SES is only loosely s-expression shaped: `(string_quote ")` declares the
//! quote character with a lone `"`, so a quote only opens a quoted atom when
//! the same line also closes it.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lexeme {
    Open,
    Close,
    Atom(String),
}

/// Split one line into lexemes, appending to `out`.
pub fn lex_line(line: &str, out: &mut Vec<Lexeme>) {
    let mut rest = line;
    loop {
        rest = rest.trim_start();
        let Some(first) = rest.chars().next() else {
            return;
        };

        match first {
            '(' => {
                out.push(Lexeme::Open);
                rest = &rest[1..];
            }
            ')' => {
                out.push(Lexeme::Close);
                rest = &rest[1..];
            }
            '"' if rest[1..].contains('"') => {
                let body = &rest[1..];
                let end = body.find('"').unwrap_or(body.len());
                out.push(Lexeme::Atom(body[..end].to_string()));
                rest = body.get(end + 1..).unwrap_or("");
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
                    .unwrap_or(rest.len());
                out.push(Lexeme::Atom(rest[..end].to_string()));
                rest = &rest[end..];
            }
        }
    }
}
