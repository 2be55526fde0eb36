//! Sniff-pattern compiler and matcher.
//!
//! Sniff patterns come from the catalog in a Perl-flavored regular
//! expression syntax. Most of them are simple enough to match without a
//! regex engine, so each pattern is compiled once into one of three shapes:
//!
//! - **Literal**: plain bytes, escapes resolved; matched with a prefix compare
//! - **Nodes**: a small tagged representation covering literals, fixed-width
//!   skips (`.`, `....`, `.{N}`), alternation groups (`(a|b)`) and optional
//!   groups (`(....)?`)
//! - **Regex**: anything else (character classes, repetition, `\s`, `\d`),
//!   translated to [`regex::bytes`] syntax
//!
//! # Anchoring
//!
//! Every shape matches only at offset 0 of the header. For an optional
//! leading group such as `(....)?ftyp` this means the remainder may start
//! either at offset 0 or immediately after the optional span.
//!
//! # Supported Escapes
//!
//! ```text
//! \xHH   byte 0xHH          \0   NUL
//! \r \n \t \f \a \e         control characters
//! \<c>   literal c for any other non-alphanumeric c
//! ```

use regex::bytes::Regex;

use crate::error::PatternError;

// =============================================================================
// Pattern Representation
// =============================================================================

/// One element of a natively matched pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Bytes that must appear verbatim
    Literal(Vec<u8>),

    /// Any `n` bytes
    Skip(usize),

    /// One of several alternatives; `optional` groups may also match nothing
    Group {
        alternatives: Vec<Vec<Node>>,
        optional: bool,
    },
}

/// A compiled sniff pattern.
#[derive(Debug, Clone)]
pub enum SniffPattern {
    Literal(Vec<u8>),
    Nodes(Vec<Node>),
    Regex(Regex),
}

impl SniffPattern {
    /// Compile a catalog pattern.
    ///
    /// # Errors
    /// Returns `PatternError` for empty patterns and for patterns the regex
    /// engine rejects.
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        if source.is_empty() {
            return Err(PatternError {
                pattern: source.to_string(),
                reason: "empty pattern".to_string(),
            });
        }

        if let Some(alternatives) = NativeParser::new(source).parse() {
            return Ok(Self::from_alternatives(alternatives));
        }

        let translated = translate_to_regex(source);
        Regex::new(&translated)
            .map(SniffPattern::Regex)
            .map_err(|e| PatternError {
                pattern: source.to_string(),
                reason: e.to_string(),
            })
    }

    fn from_alternatives(mut alternatives: Vec<Vec<Node>>) -> Self {
        if alternatives.len() == 1 {
            let nodes = alternatives.remove(0);
            return match nodes.as_slice() {
                [] => SniffPattern::Literal(Vec::new()),
                [Node::Literal(bytes)] => SniffPattern::Literal(bytes.clone()),
                _ => SniffPattern::Nodes(nodes),
            };
        }

        SniffPattern::Nodes(vec![Node::Group {
            alternatives,
            optional: false,
        }])
    }

    /// Test whether `header` matches this pattern at offset 0.
    pub fn matches(&self, header: &[u8]) -> bool {
        match self {
            SniffPattern::Literal(bytes) => header.starts_with(bytes),
            SniffPattern::Nodes(nodes) => match_nodes(nodes, None, header, 0),
            SniffPattern::Regex(re) => re.is_match(header),
        }
    }

    /// True when matching goes through the regex engine.
    pub fn is_regex(&self) -> bool {
        matches!(self, SniffPattern::Regex(_))
    }
}

// =============================================================================
// Native Matching
// =============================================================================

/// What remains to be matched after the current node list.
struct Continuation<'a> {
    nodes: &'a [Node],
    next: Option<&'a Continuation<'a>>,
}

fn match_nodes(nodes: &[Node], next: Option<&Continuation<'_>>, data: &[u8], pos: usize) -> bool {
    let Some((first, rest)) = nodes.split_first() else {
        return match next {
            Some(cont) => match_nodes(cont.nodes, cont.next, data, pos),
            None => true,
        };
    };

    match first {
        Node::Literal(bytes) => {
            data.get(pos..).is_some_and(|tail| tail.starts_with(bytes))
                && match_nodes(rest, next, data, pos + bytes.len())
        }
        Node::Skip(n) => pos + n <= data.len() && match_nodes(rest, next, data, pos + n),
        Node::Group {
            alternatives,
            optional,
        } => {
            let cont = Continuation { nodes: rest, next };
            alternatives
                .iter()
                .any(|alt| match_nodes(alt, Some(&cont), data, pos))
                || (*optional && match_nodes(rest, next, data, pos))
        }
    }
}

// =============================================================================
// Native Parser
// =============================================================================

/// Recursive-descent parser for the native pattern shape.
///
/// Returns `None` as soon as it meets a construct outside that shape; the
/// caller then falls back to the regex engine.
struct NativeParser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> NativeParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn parse(mut self) -> Option<Vec<Vec<Node>>> {
        if self.peek() == Some(b'^') {
            self.pos += 1;
        }
        let alternatives = self.parse_alternatives()?;
        (self.pos == self.src.len()).then_some(alternatives)
    }

    fn parse_alternatives(&mut self) -> Option<Vec<Vec<Node>>> {
        let mut alternatives = vec![self.parse_sequence()?];
        while self.peek() == Some(b'|') {
            self.pos += 1;
            alternatives.push(self.parse_sequence()?);
        }
        Some(alternatives)
    }

    fn parse_sequence(&mut self) -> Option<Vec<Node>> {
        let mut nodes: Vec<Node> = Vec::new();

        while let Some(c) = self.peek() {
            match c {
                b'|' | b')' => break,
                b'(' => {
                    self.pos += 1;
                    if self.peek() == Some(b'?') {
                        // Only non-capturing groups are representable
                        if self.src.get(self.pos + 1) != Some(&b':') {
                            return None;
                        }
                        self.pos += 2;
                    }
                    let alternatives = self.parse_alternatives()?;
                    if self.peek() != Some(b')') {
                        return None;
                    }
                    self.pos += 1;
                    let optional = match self.peek() {
                        Some(b'?') => {
                            self.pos += 1;
                            true
                        }
                        Some(b'*' | b'+' | b'{') => return None,
                        _ => false,
                    };
                    nodes.push(Node::Group {
                        alternatives,
                        optional,
                    });
                }
                b'.' => {
                    self.pos += 1;
                    let width = match self.peek() {
                        Some(b'{') => self.parse_fixed_count()?,
                        Some(b'*' | b'+' | b'?') => return None,
                        _ => 1,
                    };
                    push_skip(&mut nodes, width);
                }
                b'\\' => {
                    let byte = self.parse_escape()?;
                    self.reject_quantifier()?;
                    push_literal(&mut nodes, byte);
                }
                b'[' | b']' | b'*' | b'+' | b'?' | b'{' | b'}' | b'^' | b'$' => return None,
                _ => {
                    self.pos += 1;
                    self.reject_quantifier()?;
                    push_literal(&mut nodes, c);
                }
            }
        }

        Some(nodes)
    }

    /// Parse `{N}` after a `.`; anything else (`{N,M}`) is unsupported.
    fn parse_fixed_count(&mut self) -> Option<usize> {
        let start = self.pos + 1;
        let len = self.src[start..].iter().position(|&b| b == b'}')?;
        let digits = std::str::from_utf8(&self.src[start..start + len]).ok()?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.pos = start + len + 1;
        digits.parse().ok()
    }

    fn parse_escape(&mut self) -> Option<u8> {
        let c = *self.src.get(self.pos + 1)?;
        self.pos += 2;
        let byte = match c {
            b'x' => {
                let hex = self.src.get(self.pos..self.pos + 2)?;
                let hex = std::str::from_utf8(hex).ok()?;
                let byte = u8::from_str_radix(hex, 16).ok()?;
                self.pos += 2;
                byte
            }
            b'0' => {
                // \0 followed by digits is an octal escape
                if self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    return None;
                }
                0
            }
            b'r' => b'\r',
            b'n' => b'\n',
            b't' => b'\t',
            b'f' => 0x0C,
            b'a' => 0x07,
            b'e' => 0x1B,
            c if c.is_ascii_alphanumeric() => return None,
            c => c,
        };
        Some(byte)
    }

    /// A quantifier after a single literal byte is outside the native shape.
    fn reject_quantifier(&self) -> Option<()> {
        match self.peek() {
            Some(b'*' | b'+' | b'?' | b'{') => None,
            _ => Some(()),
        }
    }
}

fn push_literal(nodes: &mut Vec<Node>, byte: u8) {
    if let Some(Node::Literal(bytes)) = nodes.last_mut() {
        bytes.push(byte);
    } else {
        nodes.push(Node::Literal(vec![byte]));
    }
}

fn push_skip(nodes: &mut Vec<Node>, width: usize) {
    if let Some(Node::Skip(n)) = nodes.last_mut() {
        *n += width;
    } else {
        nodes.push(Node::Skip(width));
    }
}

// =============================================================================
// Regex Translation
// =============================================================================

/// Translate a Perl-flavored sniff pattern into anchored `regex::bytes` syntax.
///
/// Unicode is disabled so `\xHH` matches the raw byte and `.` matches any
/// byte, newlines included.
fn translate_to_regex(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 16);
    out.push_str(r"(?s-u)\A(?:");

    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push_str(r"\x00"),
            Some('e') => out.push_str(r"\x1B"),
            Some('Z') => out.push_str(r"\z"),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push_str(r"\\"),
        }
    }

    out.push(')');
    out
}

// =============================================================================
// Tests
// =============================================================================
