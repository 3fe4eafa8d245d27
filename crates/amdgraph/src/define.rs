//! Literal `define()` extraction
//!
//! A lightweight [`ModuleParser`] that recognizes named AMD definitions of the
//! form `define("id", ["dep", ...], factory)`. Only string literals count:
//! computed ids and computed dependency entries are not detectable and are
//! skipped. Anonymous `define(factory)` calls are ignored.

use crate::registry::ModuleRecords;
use crate::scan::{ModuleParser, ParseError};

/// Extracts named `define` calls with literal dependency arrays
#[derive(Debug, Clone, Copy, Default)]
pub struct DefineParser;

impl ModuleParser for DefineParser {
    fn parse(&self, file: &str, source: &str) -> Result<ModuleRecords, ParseError> {
        let mut cursor = Cursor::new(source);
        let mut records = ModuleRecords::new();

        loop {
            match cursor.next_definition() {
                Ok(Some((id, deps))) => {
                    let record = records.get_or_default(id);
                    for dep in deps {
                        if !record.dependency_ids.contains(&dep) {
                            record.dependency_ids.push(dep);
                        }
                    }
                }
                Ok(None) => return Ok(records),
                Err((offset, message)) => {
                    let (line, col) = line_col(source, offset);
                    return Err(ParseError {
                        file: file.to_string(),
                        line,
                        col,
                        message: message.to_string(),
                    });
                }
            }
        }
    }
}

/// Byte offset → 1-based line and column
fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source.as_bytes()[..offset.min(source.len())];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |p| p + 1);
    let col = String::from_utf8_lossy(&before[line_start..]).chars().count() + 1;
    (line, col)
}

type Scan<T> = Result<T, (usize, &'static str)>;

struct Cursor<'s> {
    src: &'s [u8],
    pos: usize,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_part(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

impl<'s> Cursor<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.pos + ahead).copied()
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) -> Scan<()> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(b), _) if b.is_ascii_whitespace() => self.pos += 1,
                (Some(b'/'), Some(b'/')) => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.pos += 2;
                                break;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => return Err((start, "unterminated block comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Read a quoted literal starting at the opening quote
    fn read_string(&mut self) -> Scan<String> {
        let start = self.pos;
        let quote = self.src[start];
        self.pos += 1;
        let mut out = Vec::new();

        while let Some(b) = self.peek() {
            match b {
                b'\\' => {
                    if let Some(escaped) = self.peek_at(1) {
                        out.push(escaped);
                    }
                    self.pos += 2;
                }
                b'\n' if quote != b'`' => break,
                _ if b == quote => {
                    self.pos += 1;
                    return Ok(String::from_utf8_lossy(&out).into_owned());
                }
                _ => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
        Err((start, "unterminated string literal"))
    }

    /// Skip a quoted literal outside a definition; tolerates regex literals
    /// that happen to contain a quote
    fn skip_string(&mut self) {
        let save = self.pos;
        if let Err((_, _)) = self.read_string() {
            self.pos = save + 1;
        }
    }

    fn read_ident(&mut self) -> &'s str {
        let src = self.src;
        let start = self.pos;
        while self.peek().is_some_and(is_ident_part) {
            self.pos += 1;
        }
        std::str::from_utf8(&src[start..self.pos]).unwrap_or("")
    }

    /// Advance past the next `define(`; false at end of input
    fn find_define(&mut self) -> Scan<bool> {
        while let Some(b) = self.peek() {
            match b {
                b'/' if matches!(self.peek_at(1), Some(b'/') | Some(b'*')) => self.skip_trivia()?,
                b'"' | b'\'' | b'`' => self.skip_string(),
                _ if is_ident_start(b) => {
                    let member = self.pos > 0 && self.src[self.pos - 1] == b'.';
                    if self.read_ident() == "define" && !member {
                        self.skip_trivia()?;
                        if self.peek() == Some(b'(') {
                            self.pos += 1;
                            return Ok(true);
                        }
                    }
                }
                _ => self.pos += 1,
            }
        }
        Ok(false)
    }

    /// Skip a non-literal array element up to the next `,` or `]`
    fn skip_element(&mut self, array_start: usize) -> Scan<()> {
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'"' | b'\'' | b'`' => {
                    self.read_string()?;
                }
                b'(' | b'[' | b'{' => {
                    depth += 1;
                    self.pos += 1;
                }
                b']' | b',' if depth == 0 => return Ok(()),
                b')' | b']' | b'}' => {
                    depth = depth.saturating_sub(1);
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        Err((array_start, "unterminated dependency array"))
    }

    /// Literal entries of the array at the cursor
    fn read_deps(&mut self) -> Scan<Vec<String>> {
        let start = self.pos;
        self.pos += 1;
        let mut deps = Vec::new();

        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => return Err((start, "unterminated dependency array")),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(deps);
                }
                Some(b',') => self.pos += 1,
                Some(b'"') | Some(b'\'') => deps.push(self.read_string()?),
                Some(_) => self.skip_element(start)?,
            }
        }
    }

    /// Next named definition as (id, literal deps)
    fn next_definition(&mut self) -> Scan<Option<(String, Vec<String>)>> {
        while self.find_define()? {
            self.skip_trivia()?;
            let id = match self.peek() {
                Some(b'"') | Some(b'\'') => self.read_string()?,
                _ => continue,
            };

            self.skip_trivia()?;
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => return Ok(Some((id, Vec::new()))),
                // computed id such as 'page/' + name
                _ => continue,
            }
            self.skip_trivia()?;

            if self.peek() != Some(b'[') {
                return Ok(Some((id, Vec::new())));
            }
            let deps = self.read_deps()?;

            // define("id", [...]) exports the array itself
            self.skip_trivia()?;
            if self.peek() == Some(b')') {
                return Ok(Some((id, Vec::new())));
            }
            return Ok(Some((id, deps)));
        }
        Ok(None)
    }
}
