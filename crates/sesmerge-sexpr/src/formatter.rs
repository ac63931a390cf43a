//! KiCad-style printing of S-expressions.
//!
//! [`prettify`] reproduces the layout pcbnew writes for `.kicad_pcb` files: tab
//! indentation, one child list per line, closing parens on their own line
//! after a nested list, and long token runs wrapped at column 72. Running a
//! board through it again is a no-op, which keeps diffs of merged boards
//! readable.

use crate::{Sexpr, SexprKind};

/// Layout variants matching pcbnew's writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    #[default]
    Normal,
    /// `font`, `stroke`, `fill` and similar property lists stay on one line.
    /// This is what pcbnew uses for board files.
    CompactTextProperties,
}

const INDENT: u8 = b'\t';
const WRAP_COLUMN: usize = 72;
const XY_COLUMN_LIMIT: usize = 99;
const SHORT_FORM_TAGS: &[&[u8]] = &[
    b"font",
    b"stroke",
    b"fill",
    b"teardrop",
    b"offset",
    b"rotate",
    b"scale",
];

/// Streaming state for one prettify pass.
struct Prettifier<'a> {
    src: &'a [u8],
    out: Vec<u8>,
    compact_props: bool,
    depth: usize,
    column: usize,
    last_visible: u8,
    in_quote: bool,
    backslashes: usize,
    pending_space: bool,
    multi_line: bool,
    in_xy: bool,
    short_form_depth: Option<usize>,
}

impl<'a> Prettifier<'a> {
    fn new(src: &'a str, mode: FormatMode) -> Self {
        Self {
            src: src.as_bytes(),
            out: Vec::with_capacity(src.len()),
            compact_props: mode == FormatMode::CompactTextProperties,
            depth: 0,
            column: 0,
            last_visible: 0,
            in_quote: false,
            backslashes: 0,
            pending_space: false,
            multi_line: false,
            in_xy: false,
            short_form_depth: None,
        }
    }

    fn run(mut self) -> String {
        for i in 0..self.src.len() {
            let byte = self.src[i];
            if is_blank(byte) && !self.in_quote {
                self.blank(i);
                continue;
            }

            self.pending_space = false;
            match byte {
                b'(' if !self.in_quote => self.open(i),
                b')' if !self.in_quote => self.close(),
                _ => self.token_byte(byte),
            }
            self.last_visible = byte;
        }

        self.out.push(b'\n');
        String::from_utf8_lossy(&self.out).into_owned()
    }

    fn blank(&mut self, i: usize) {
        let next = self.next_visible(i + 1);
        if self.pending_space
            || self.depth == 0
            || self.last_visible == b'('
            || next == b'('
            || next == b')'
        {
            return;
        }

        if self.in_xy || self.column < WRAP_COLUMN {
            self.out.push(b' ');
            self.column += 1;
        } else if self.short_form_depth.is_some() {
            self.out.push(b' ');
        } else {
            self.newline_at(self.depth);
            self.multi_line = true;
        }
        self.pending_space = true;
    }

    fn open(&mut self, i: usize) {
        let tag = self.tag_after(i);
        let is_xy = tag == b"xy" && self.src.get(i + 3) == Some(&b' ');
        let starts_short_form = self.compact_props && SHORT_FORM_TAGS.contains(&tag);

        if self.out.is_empty() {
            self.out.push(b'(');
            self.column += 1;
        } else if (self.in_xy && is_xy && self.column < XY_COLUMN_LIMIT)
            || self.short_form_depth.is_some()
        {
            self.out.extend_from_slice(b" (");
            self.column += 2;
        } else {
            self.newline_at(self.depth);
            self.out.push(b'(');
            self.column += 1;
        }

        self.in_xy = is_xy;
        if starts_short_form && self.short_form_depth.is_none() {
            self.short_form_depth = Some(self.depth);
        }
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);

        if self.short_form_depth.is_some() {
            self.out.push(b')');
            self.column += 1;
        } else if self.last_visible == b')' || self.multi_line {
            self.newline_at(self.depth);
            self.out.push(b')');
            self.column += 1;
            self.multi_line = false;
        } else {
            self.out.push(b')');
            self.column += 1;
        }

        if self.short_form_depth == Some(self.depth) {
            self.short_form_depth = None;
        }
    }

    fn token_byte(&mut self, byte: u8) {
        if byte == b'\\' {
            self.backslashes += 1;
        } else {
            if byte == b'"' && self.backslashes % 2 == 0 {
                self.in_quote = !self.in_quote;
            }
            self.backslashes = 0;
        }
        self.out.push(byte);
        self.column += 1;
    }

    fn newline_at(&mut self, depth: usize) {
        self.out.push(b'\n');
        self.out.extend(std::iter::repeat_n(INDENT, depth));
        self.column = depth;
    }

    fn next_visible(&self, from: usize) -> u8 {
        self.src
            .get(from..)
            .and_then(|rest| rest.iter().copied().find(|&b| !is_blank(b)))
            .unwrap_or(0)
    }

    fn tag_after(&self, open: usize) -> &'a [u8] {
        let src: &'a [u8] = self.src;
        let start = open + 1;
        let len = src
            .get(start..)
            .map(|rest| rest.iter().take_while(|b| b.is_ascii_alphabetic()).count())
            .unwrap_or(0);
        &src[start..start + len]
    }
}

/// Re-layout raw S-expression text the way pcbnew does.
///
/// Whitespace between tokens is normalized; quoted strings are copied
/// untouched. The result always ends in a newline.
pub fn prettify(source: &str, mode: FormatMode) -> String {
    Prettifier::new(source, mode).run()
}

/// Print a tree through [`prettify`]. Includes a trailing newline.
pub fn format_tree(sexpr: &Sexpr, mode: FormatMode) -> String {
    let mut raw = String::new();
    write_compact(sexpr, &mut raw);
    prettify(&raw, mode)
}

/// Print a tree as a block nested `depth` levels deep inside a parent list.
///
/// Every line is prefixed with `depth` tabs and the block ends in a newline,
/// ready to be spliced in front of the parent's closing paren.
pub fn format_block(sexpr: &Sexpr, mode: FormatMode, depth: usize) -> String {
    let body = format_tree(sexpr, mode);
    let prefix = "\t".repeat(depth);
    let mut out = String::with_capacity(body.len() + depth * 4);
    for line in body.lines() {
        out.push_str(&prefix);
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Single-line rendering without any layout.
pub fn to_compact_string(sexpr: &Sexpr) -> String {
    let mut raw = String::new();
    write_compact(sexpr, &mut raw);
    raw
}

fn write_compact(sexpr: &Sexpr, out: &mut String) {
    match &sexpr.kind {
        SexprKind::Symbol(s) => out.push_str(s),
        SexprKind::String(s) => out.push_str(&quote_string(s)),
        SexprKind::Int(_) | SexprKind::F64(_) => {
            if let Some(lexeme) = sexpr.number_lexeme() {
                out.push_str(&lexeme);
            }
        }
        SexprKind::List(items) => {
            out.push('(');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(' ');
                }
                write_compact(item, out);
            }
            out.push(')');
        }
    }
}

/// Quote a string value, escaping special characters.
pub fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

fn is_blank(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Drop trailing fractional zeros: `1.500` -> `1.5`, `2.0` -> `2`.
pub fn trim_float(s: String) -> String {
    if !s.contains('.') || s.contains(['e', 'E']) {
        return s;
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-" | "-0" => "0".to_string(),
        t => t.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kv, parse};

    #[test]
    fn nests_child_lists_with_tabs() {
        let input = "(kicad_pcb (version 20240108) (general (thickness 1.6)) (net 0 \"\"))";
        let expected = "(kicad_pcb\n\t(version 20240108)\n\t(general\n\t\t(thickness 1.6)\n\t)\n\t(net 0 \"\")\n)\n";
        assert_eq!(prettify(input, FormatMode::Normal), expected);
    }

    #[test]
    fn keeps_xy_runs_on_one_line() {
        let input = "(pts (xy 1 2) (xy 3 4) (xy 5 6))";
        assert_eq!(
            prettify(input, FormatMode::Normal),
            "(pts\n\t(xy 1 2) (xy 3 4) (xy 5 6)\n)\n"
        );
    }

    #[test]
    fn compact_mode_keeps_font_inline() {
        let input = "(effects (font (size 1 1) (thickness 0.15)) (justify left))";
        assert_eq!(
            prettify(input, FormatMode::CompactTextProperties),
            "(effects\n\t(font (size 1 1) (thickness 0.15))\n\t(justify left)\n)\n"
        );
    }

    #[test]
    fn parens_inside_strings_are_not_structure() {
        let input = "(kicad_pcb (net 3 \"Net-(R1-Pad1)\") (net 4 \"say \\\"hi\\\"\"))";
        assert_eq!(
            prettify(input, FormatMode::Normal),
            "(kicad_pcb\n\t(net 3 \"Net-(R1-Pad1)\")\n\t(net 4 \"say \\\"hi\\\"\")\n)\n"
        );
    }

    #[test]
    fn prettify_is_idempotent() {
        let once = prettify(
            "(kicad_pcb (segment (start 1 2) (end 3 4) (width 0.25) (layer \"F.Cu\") (net 1)))",
            FormatMode::CompactTextProperties,
        );
        assert_eq!(prettify(&once, FormatMode::CompactTextProperties), once);
    }

    #[test]
    fn format_block_indents_every_line() {
        let via = Sexpr::list(vec![
            Sexpr::symbol("via"),
            Sexpr::list(vec![Sexpr::symbol("at"), Sexpr::int(10), Sexpr::int(20)]),
            kv("net", 3u32),
        ]);
        assert_eq!(
            format_block(&via, FormatMode::Normal, 1),
            "\t(via\n\t\t(at 10 20)\n\t\t(net 3)\n\t)\n"
        );
    }

    #[test]
    fn preserves_parsed_lexemes_and_trims_synthetic_floats() {
        let tree = parse("(setup (pad_to_mask_clearance 0.050000))").unwrap();
        assert!(format_tree(&tree, FormatMode::Normal).contains("0.050000"));

        let built = Sexpr::list(vec![Sexpr::symbol("width"), Sexpr::float(0.25)]);
        assert_eq!(to_compact_string(&built), "(width 0.25)");
        assert_eq!(trim_float("2.000".to_string()), "2");
        assert_eq!(trim_float("-0.0".to_string()), "0");
    }
}
