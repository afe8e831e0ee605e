//! # Text Backend
//!
//! Human-editable serialization in an INI dialect.
//!
//! The format uses `[Section]` headers and `Key=Value` lines, nests sections
//! by two-space indentation and separates lines with CRLF. It exists for
//! configuration files, saved sessions and diagnostic dumps of wire packets,
//! so the reader is deliberately forgiving:
//!
//! - Sibling keys and sections may appear in any order
//! - Keys the model never asks for are reported with a warning and skipped
//! - Out-of-range integers are clamped to the target type with a warning
//! - Blank lines, comment lines (`;` or `#`) and loose indentation are fine
//!
//! Only structurally broken *values* (a missing closing quote, letters where
//! a number must be) abort a read with [`WireError::Corrupt`].
//!
//! ## Value Syntax
//! - Integers: decimal, optional sign, `0x` prefix for hexadecimal
//! - Booleans: `true` / `false`, with `1` / `0` accepted on read
//! - Escaped strings: double-quoted, `\"` `\\` `\n` `\r` `\t` `\xHH`
//! - Raw byte runs: lowercase hex pairs
//!
//! The writer omits nothing on its own; omission decisions belong to the
//! default adaptors, which skip values that match their declared default.

use crate::error::{
    constants::{ERR_BAD_BOOL, ERR_EXPECTED_QUOTE, ERR_NON_ASCII_CHAR, ERR_UNTERMINATED_STRING},
    Result, WireError,
};
use crate::serial::{Codec, Sep, Serial, StrStyle};

const INDENT: &str = "  ";
const NEWLINE: &str = "\r\n";

// ==========================================
// WRITER
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    /// Named but not yet written; vanishes if no value follows.
    Fresh,
    /// Materialized as a `Key=` line.
    Key,
    /// Materialized as a `[Section]` header.
    Section,
}

#[derive(Debug)]
struct WriteFrame {
    key: String,
    state: FrameState,
}

/// Text writing backend producing the INI dialect.
///
/// Name scopes materialize lazily: a scope that receives plain values
/// becomes a `Key=` line, a scope that receives nested names becomes a
/// `[Section]`, and a scope that receives nothing leaves no trace. The
/// last rule is what lets default adaptors omit values entirely.
#[derive(Debug, Default)]
pub struct IniWriter {
    out: String,
    stack: Vec<WriteFrame>,
    line_open: bool,
}

impl IniWriter {
    /// A writer with an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished document.
    pub fn finish(mut self) -> String {
        self.flush_line();
        self.out
    }

    fn flush_line(&mut self) {
        if self.line_open {
            self.out.push_str(NEWLINE);
            self.line_open = false;
        }
    }

    fn push_indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
    }

    fn sections_below(&self, limit: usize) -> usize {
        self.stack[..limit]
            .iter()
            .filter(|f| f.state == FrameState::Section)
            .count()
    }

    fn emit_section(&mut self, index: usize) {
        let depth = self.sections_below(index);
        self.push_indent(depth);
        self.out.push('[');
        let key = self.stack[index].key.clone();
        self.out.push_str(&key);
        self.out.push(']');
        self.out.push_str(NEWLINE);
        self.stack[index].state = FrameState::Section;
    }

    /// Make sure an open line exists for the next value character.
    fn open_value_line(&mut self) {
        if self.line_open {
            return;
        }
        let n = self.stack.len();
        // Everything above the innermost scope becomes a section header.
        for i in 0..n.saturating_sub(1) {
            if self.stack[i].state == FrameState::Fresh {
                self.emit_section(i);
            }
        }
        match self.stack.last() {
            None => {
                // Bare value at document root.
                self.line_open = true;
            }
            Some(frame) => match frame.state {
                FrameState::Fresh | FrameState::Key => {
                    let depth = self.sections_below(n - 1);
                    self.push_indent(depth);
                    let key = self.stack[n - 1].key.clone();
                    self.out.push_str(&key);
                    self.out.push('=');
                    self.stack[n - 1].state = FrameState::Key;
                    self.line_open = true;
                }
                FrameState::Section => {
                    let depth = self.sections_below(n);
                    self.push_indent(depth);
                    self.line_open = true;
                }
            },
        }
    }

    fn put_escaped(&mut self, value: &str) {
        self.out.push('"');
        for ch in value.chars() {
            match ch {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                ch if (ch as u32) < 0x20 => {
                    self.out.push_str(&format!("\\x{:02x}", ch as u32));
                }
                ch => self.out.push(ch),
            }
        }
        self.out.push('"');
    }
}

impl Codec for IniWriter {
    fn is_reading(&self) -> bool {
        false
    }

    fn has_naming(&self) -> bool {
        true
    }

    fn end(&mut self) -> Result<()> {
        self.flush_line();
        Ok(())
    }

    fn name(&mut self, key: &str) -> bool {
        self.flush_line();
        self.stack.push(WriteFrame {
            key: key.to_owned(),
            state: FrameState::Fresh,
        });
        true
    }

    fn name_end(&mut self, _abort: bool) {
        match self.stack.pop() {
            Some(frame) => {
                if frame.state == FrameState::Key {
                    self.flush_line();
                }
            }
            None => tracing::warn!("unbalanced name_end on text writer"),
        }
    }

    fn separator(&mut self, sep: Sep) -> bool {
        self.open_value_line();
        self.out.push(sep.glyph());
        true
    }

    fn bool(&mut self, value: &mut bool) -> Result<()> {
        self.open_value_line();
        self.out.push_str(if *value { "true" } else { "false" });
        Ok(())
    }

    fn u8(&mut self, value: &mut u8) -> Result<()> {
        self.open_value_line();
        self.out.push_str(&value.to_string());
        Ok(())
    }

    fn i8(&mut self, value: &mut i8) -> Result<()> {
        self.open_value_line();
        self.out.push_str(&value.to_string());
        Ok(())
    }

    fn u16(&mut self, value: &mut u16) -> Result<()> {
        self.open_value_line();
        self.out.push_str(&value.to_string());
        Ok(())
    }

    fn i16(&mut self, value: &mut i16) -> Result<()> {
        self.open_value_line();
        self.out.push_str(&value.to_string());
        Ok(())
    }

    fn u32(&mut self, value: &mut u32) -> Result<()> {
        self.open_value_line();
        self.out.push_str(&value.to_string());
        Ok(())
    }

    fn i32(&mut self, value: &mut i32) -> Result<()> {
        self.open_value_line();
        self.out.push_str(&value.to_string());
        Ok(())
    }

    fn u64(&mut self, value: &mut u64) -> Result<()> {
        self.open_value_line();
        self.out.push_str(&value.to_string());
        Ok(())
    }

    fn i64(&mut self, value: &mut i64) -> Result<()> {
        self.open_value_line();
        self.out.push_str(&value.to_string());
        Ok(())
    }

    fn character(&mut self, value: &mut char) -> Result<()> {
        self.open_value_line();
        self.out.push(if value.is_ascii() { *value } else { '?' });
        Ok(())
    }

    fn raw(&mut self, value: &mut [u8]) -> Result<()> {
        self.open_value_line();
        for byte in value.iter() {
            self.out.push_str(&format!("{byte:02x}"));
        }
        Ok(())
    }

    fn string(&mut self, value: &mut String, style: StrStyle) -> Result<()> {
        self.open_value_line();
        match style {
            StrStyle::Escaped => self.put_escaped(&value.clone()),
            StrStyle::Plain => self.out.push_str(value),
            StrStyle::Token => {
                debug_assert!(
                    value.chars().all(StrStyle::is_token_char),
                    "token string carries non-token characters"
                );
                self.out.push_str(value);
            }
        }
        Ok(())
    }

    fn position(&self) -> String {
        if self.stack.is_empty() {
            "document root".to_owned()
        } else {
            let path: Vec<&str> = self.stack.iter().map(|f| f.key.as_str()).collect();
            format!("'{}'", path.join("/"))
        }
    }
}

// ==========================================
// READER
// ==========================================

#[derive(Debug)]
struct Node {
    name: String,
    value: String,
    is_section: bool,
    line: usize,
    indent: usize,
    children: Vec<usize>,
    consumed: bool,
}

#[derive(Debug, Clone, Copy)]
struct ReadFrame {
    node: usize,
    cursor: usize,
}

/// Text reading backend over a pre-parsed node tree.
///
/// The whole document is split into sections and keys up front, which is
/// what makes sibling lookup independent of document order. Each reader is
/// good for a single pass; consumed nodes stay consumed.
#[derive(Debug)]
pub struct IniReader {
    nodes: Vec<Node>,
    frames: Vec<ReadFrame>,
}

impl IniReader {
    /// Parse `text` into a node tree. Malformed lines are reported with a
    /// warning and skipped; this constructor itself never fails.
    pub fn parse(text: &str) -> Self {
        let mut nodes = vec![Node {
            name: String::new(),
            value: String::new(),
            is_section: true,
            line: 0,
            indent: 0,
            children: Vec::new(),
            consumed: true,
        }];
        // Stack of open section ids; index 0 is the synthetic root.
        let mut open: Vec<usize> = vec![0];

        for (index, raw) in text.split('\n').enumerate() {
            let line_no = index + 1;
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            let body_start = line.len() - line.trim_start_matches([' ', '\t']).len();
            let indent = body_start;
            let body = line[body_start..].trim_end();
            if body.is_empty() || body.starts_with(';') || body.starts_with('#') {
                continue;
            }

            while open.len() > 1 && nodes[*open.last().unwrap_or(&0)].indent >= indent {
                open.pop();
            }
            let parent = *open.last().unwrap_or(&0);

            if let Some(header) = body.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    tracing::warn!(line = line_no, "malformed section header ignored");
                    continue;
                };
                let id = nodes.len();
                nodes.push(Node {
                    name: name.trim().to_owned(),
                    value: String::new(),
                    is_section: true,
                    line: line_no,
                    indent,
                    children: Vec::new(),
                    consumed: false,
                });
                nodes[parent].children.push(id);
                open.push(id);
            } else {
                // A quoted line is always a value, even if it contains '='.
                let split = if body.starts_with('"') {
                    None
                } else {
                    body.find('=')
                };
                match split {
                    Some(eq) => {
                        let id = nodes.len();
                        nodes.push(Node {
                            name: body[..eq].trim().to_owned(),
                            value: body[eq + 1..].trim().to_owned(),
                            is_section: false,
                            line: line_no,
                            indent,
                            children: Vec::new(),
                            consumed: false,
                        });
                        nodes[parent].children.push(id);
                    }
                    // A line without a key is the enclosing scope's own
                    // value, e.g. a document that is one bare scalar.
                    None => {
                        let target = &mut nodes[parent];
                        if !target.value.is_empty() {
                            target.value.push(' ');
                        }
                        target.value.push_str(body);
                        if target.line == 0 {
                            target.line = line_no;
                        }
                    }
                }
            }
        }

        Self {
            nodes,
            frames: vec![ReadFrame { node: 0, cursor: 0 }],
        }
    }

    fn frame(&self) -> ReadFrame {
        *self.frames.last().unwrap_or(&ReadFrame { node: 0, cursor: 0 })
    }

    fn rest(&self) -> &str {
        let frame = self.frame();
        let value = &self.nodes[frame.node].value;
        &value[frame.cursor.min(value.len())..]
    }

    fn advance(&mut self, by: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.cursor += by;
        }
    }

    fn skip_ws(&mut self) {
        let skipped = self.rest().len() - self.rest().trim_start_matches([' ', '\t']).len();
        self.advance(skipped);
    }

    /// Warn about everything inside `node` that no reader ever asked for.
    fn report_leftovers(&self, node: usize) {
        let node = &self.nodes[node];
        for &child in &node.children {
            let child = &self.nodes[child];
            if child.consumed {
                continue;
            }
            if child.is_section {
                tracing::warn!(line = child.line, section = %child.name, "unknown section ignored");
            } else {
                tracing::warn!(line = child.line, key = %child.name, "unknown key ignored");
            }
        }
    }

    fn read_int(&mut self, min: i128, max: i128) -> Result<i128> {
        self.skip_ws();
        let (outcome, consumed) = scan_int(self.rest());
        match outcome {
            ScanInt::Empty => Err(WireError::not_found(self.position())),
            ScanInt::NoDigits => Err(WireError::corrupt(self.position(), "expected an integer")),
            ScanInt::Value(v) => {
                self.advance(consumed);
                if v < min || v > max {
                    tracing::warn!(
                        position = %self.position(),
                        value = %v,
                        "integer out of range, clamped"
                    );
                    return Ok(v.clamp(min, max));
                }
                Ok(v)
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ScanInt {
    /// Nothing left in the value.
    Empty,
    /// Content present but it does not start like an integer.
    NoDigits,
    Value(i128),
}

/// Scan a leading integer off `s`: optional sign, optional `0x`, digits.
/// Returns the outcome and the number of bytes consumed.
fn scan_int(s: &str) -> (ScanInt, usize) {
    if s.is_empty() {
        return (ScanInt::Empty, 0);
    }
    let bytes = s.as_bytes();
    let mut at = 0;
    let mut negative = false;
    if bytes[at] == b'+' || bytes[at] == b'-' {
        negative = bytes[at] == b'-';
        at += 1;
    }
    let mut radix: i128 = 10;
    if bytes.len() >= at + 2 && bytes[at] == b'0' && (bytes[at + 1] | 0x20) == b'x' {
        if bytes.get(at + 2).is_some_and(|b| b.is_ascii_hexdigit()) {
            radix = 16;
            at += 2;
        }
    }
    let mut value: i128 = 0;
    let mut digits = 0;
    let mut saturated = false;
    while at < bytes.len() {
        let digit = match (bytes[at] as char).to_digit(radix as u32) {
            Some(d) => i128::from(d),
            None => break,
        };
        value = match value.checked_mul(radix).and_then(|v| v.checked_add(digit)) {
            Some(v) => v,
            None => {
                saturated = true;
                value
            }
        };
        digits += 1;
        at += 1;
    }
    if digits == 0 {
        return (ScanInt::NoDigits, 0);
    }
    if saturated {
        value = i128::MAX;
    }
    if negative {
        value = -value;
    }
    (ScanInt::Value(value), at)
}

/// Scan a leading token off `s`. Returns the token and bytes consumed.
fn scan_token(s: &str) -> (&str, usize) {
    let end = s
        .char_indices()
        .find(|&(_, ch)| !StrStyle::is_token_char(ch))
        .map_or(s.len(), |(i, _)| i);
    (&s[..end], end)
}

enum ScanQuoted {
    Empty,
    NoQuote,
    Unterminated,
    Value(String, usize),
}

/// Scan a leading double-quoted string with C-style escapes off `s`.
fn scan_quoted(s: &str) -> ScanQuoted {
    if s.is_empty() {
        return ScanQuoted::Empty;
    }
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, '"')) => {}
        _ => return ScanQuoted::NoQuote,
    }
    let mut out = String::new();
    while let Some((at, ch)) = chars.next() {
        match ch {
            '"' => return ScanQuoted::Value(out, at + 1),
            '\\' => {
                let Some((_, esc)) = chars.next() else {
                    return ScanQuoted::Unterminated;
                };
                match esc {
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    '0' => out.push('\0'),
                    'x' => {
                        let mut code = 0u32;
                        let mut any = false;
                        for _ in 0..2 {
                            let Some(&(_, h)) = chars.clone().peekable().peek() else {
                                break;
                            };
                            let Some(digit) = h.to_digit(16) else { break };
                            code = code * 16 + digit;
                            any = true;
                            chars.next();
                        }
                        match (any, char::from_u32(code)) {
                            (true, Some(ch)) => out.push(ch),
                            _ => out.push('x'),
                        }
                    }
                    other => {
                        // Unknown escape: keep the character itself.
                        out.push(other);
                    }
                }
            }
            ch => out.push(ch),
        }
    }
    ScanQuoted::Unterminated
}

impl Codec for IniReader {
    fn is_reading(&self) -> bool {
        true
    }

    fn has_naming(&self) -> bool {
        true
    }

    fn begin(&mut self) -> Result<()> {
        self.frames = vec![ReadFrame { node: 0, cursor: 0 }];
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let frame = self.frame();
        let node = &self.nodes[frame.node];
        if !node.value[frame.cursor.min(node.value.len())..].trim().is_empty() {
            tracing::warn!(line = node.line, "trailing content at document root ignored");
        }
        self.report_leftovers(0);
        Ok(())
    }

    fn name(&mut self, key: &str) -> bool {
        let frame = self.frame();
        let children = self.nodes[frame.node].children.clone();
        for child in children {
            if !self.nodes[child].consumed && self.nodes[child].name == key {
                self.nodes[child].consumed = true;
                self.frames.push(ReadFrame { node: child, cursor: 0 });
                return true;
            }
        }
        false
    }

    fn name_end(&mut self, abort: bool) {
        if self.frames.len() <= 1 {
            tracing::warn!("unbalanced name_end on text reader");
            return;
        }
        let Some(frame) = self.frames.pop() else { return };
        if abort {
            return;
        }
        let node = &self.nodes[frame.node];
        if !node.is_section && !node.value[frame.cursor.min(node.value.len())..].trim().is_empty() {
            tracing::warn!(
                line = node.line,
                key = %node.name,
                "trailing content in value ignored"
            );
        }
        self.report_leftovers(frame.node);
    }

    fn separator(&mut self, sep: Sep) -> bool {
        self.skip_ws();
        if self.rest().starts_with(sep.glyph()) {
            self.advance(sep.glyph().len_utf8());
            true
        } else {
            false
        }
    }

    fn bool(&mut self, value: &mut bool) -> Result<()> {
        self.skip_ws();
        let (token, consumed) = scan_token(self.rest());
        if token.is_empty() {
            return Err(WireError::not_found(self.position()));
        }
        let parsed = if token.eq_ignore_ascii_case("true") || token == "1" {
            true
        } else if token.eq_ignore_ascii_case("false") || token == "0" {
            false
        } else {
            return Err(WireError::corrupt(self.position(), ERR_BAD_BOOL));
        };
        self.advance(consumed);
        *value = parsed;
        Ok(())
    }

    fn u8(&mut self, value: &mut u8) -> Result<()> {
        *value = self.read_int(0, i128::from(u8::MAX))? as u8;
        Ok(())
    }

    fn i8(&mut self, value: &mut i8) -> Result<()> {
        *value = self.read_int(i128::from(i8::MIN), i128::from(i8::MAX))? as i8;
        Ok(())
    }

    fn u16(&mut self, value: &mut u16) -> Result<()> {
        *value = self.read_int(0, i128::from(u16::MAX))? as u16;
        Ok(())
    }

    fn i16(&mut self, value: &mut i16) -> Result<()> {
        *value = self.read_int(i128::from(i16::MIN), i128::from(i16::MAX))? as i16;
        Ok(())
    }

    fn u32(&mut self, value: &mut u32) -> Result<()> {
        *value = self.read_int(0, i128::from(u32::MAX))? as u32;
        Ok(())
    }

    fn i32(&mut self, value: &mut i32) -> Result<()> {
        *value = self.read_int(i128::from(i32::MIN), i128::from(i32::MAX))? as i32;
        Ok(())
    }

    fn u64(&mut self, value: &mut u64) -> Result<()> {
        *value = self.read_int(0, i128::from(u64::MAX))? as u64;
        Ok(())
    }

    fn i64(&mut self, value: &mut i64) -> Result<()> {
        *value = self.read_int(i128::from(i64::MIN), i128::from(i64::MAX))? as i64;
        Ok(())
    }

    fn character(&mut self, value: &mut char) -> Result<()> {
        self.skip_ws();
        let Some(ch) = self.rest().chars().next() else {
            return Err(WireError::not_found(self.position()));
        };
        if !ch.is_ascii() {
            return Err(WireError::corrupt(self.position(), ERR_NON_ASCII_CHAR));
        }
        self.advance(ch.len_utf8());
        *value = ch;
        Ok(())
    }

    fn raw(&mut self, value: &mut [u8]) -> Result<()> {
        self.skip_ws();
        if self.rest().is_empty() {
            return Err(WireError::not_found(self.position()));
        }
        let needed = value.len() * 2;
        let rest = self.rest();
        if rest.len() < needed || !rest[..needed].bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(WireError::corrupt(
                self.position(),
                format!("expected {needed} hex digits"),
            ));
        }
        for (i, slot) in value.iter_mut().enumerate() {
            let pair = &rest[i * 2..i * 2 + 2];
            *slot = u8::from_str_radix(pair, 16)
                .map_err(|_| WireError::corrupt(self.position(), "expected hex digits"))?;
        }
        self.advance(needed);
        Ok(())
    }

    fn string(&mut self, value: &mut String, style: StrStyle) -> Result<()> {
        match style {
            StrStyle::Escaped => {
                self.skip_ws();
                match scan_quoted(self.rest()) {
                    ScanQuoted::Empty => Err(WireError::not_found(self.position())),
                    ScanQuoted::NoQuote => {
                        Err(WireError::corrupt(self.position(), ERR_EXPECTED_QUOTE))
                    }
                    ScanQuoted::Unterminated => {
                        Err(WireError::corrupt(self.position(), ERR_UNTERMINATED_STRING))
                    }
                    ScanQuoted::Value(s, consumed) => {
                        self.advance(consumed);
                        *value = s;
                        Ok(())
                    }
                }
            }
            StrStyle::Plain => {
                let rest = self.rest();
                if rest.is_empty() {
                    return Err(WireError::not_found(self.position()));
                }
                *value = rest.to_owned();
                self.advance(value.len());
                Ok(())
            }
            StrStyle::Token => {
                self.skip_ws();
                let (token, consumed) = scan_token(self.rest());
                if token.is_empty() {
                    return Err(WireError::not_found(self.position()));
                }
                *value = token.to_owned();
                self.advance(consumed);
                Ok(())
            }
        }
    }

    fn position(&self) -> String {
        let frame = self.frame();
        if frame.node == 0 {
            return "document root".to_owned();
        }
        let path: Vec<&str> = self
            .frames
            .iter()
            .skip(1)
            .map(|f| self.nodes[f.node].name.as_str())
            .filter(|name| !name.is_empty())
            .collect();
        format!("line {}, '{}'", self.nodes[frame.node].line, path.join("/"))
    }
}

// ==========================================
// ENTRY POINTS
// ==========================================

/// Encode `value` as an INI document.
///
/// # Errors
/// Returns any error raised by the value's own [`Serial::serial`] logic;
/// the backend itself cannot fail on write.
pub fn ini_encode<T: Serial + ?Sized>(value: &mut T) -> Result<String> {
    let mut writer = IniWriter::new();
    writer.begin()?;
    value.serial(&mut writer)?;
    writer.end()?;
    Ok(writer.finish())
}

/// Decode a `T` from an INI document.
///
/// # Errors
/// [`WireError::Corrupt`] for structurally invalid values. Unknown keys and
/// out-of-range integers are reported through warnings instead.
pub fn ini_decode<T: Serial + Default>(text: &str) -> Result<T> {
    let mut value = T::default();
    ini_decode_into(&mut value, text)?;
    Ok(value)
}

/// Decode an INI document into an existing value.
///
/// # Errors
/// [`WireError::Corrupt`] for structurally invalid values.
pub fn ini_decode_into<T: Serial + ?Sized>(value: &mut T, text: &str) -> Result<()> {
    let mut reader = IniReader::parse(text);
    reader.begin()?;
    value.serial(&mut reader)?;
    reader.end()?;
    Ok(())
}

// ==========================================
// TESTS
// ==========================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::serial::adapt;

    #[derive(Debug, Default, PartialEq)]
    struct Inner {
        tick: u32,
        label: String,
    }

    impl Serial for Inner {
        fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
            adapt::named_default(codec, "Tick", &mut self.tick, 0)?;
            adapt::named(codec, "Label", |c| self.label.serial(c))
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Outer {
        version: u32,
        inner: Inner,
    }

    impl Serial for Outer {
        fn serial(&mut self, codec: &mut dyn Codec) -> Result<()> {
            adapt::named(codec, "Version", |c| self.version.serial(c))?;
            adapt::named(codec, "Inner", |c| self.inner.serial(c))
        }
    }

    fn sample() -> Outer {
        Outer {
            version: 7,
            inner: Inner {
                tick: 42,
                label: "hello".to_owned(),
            },
        }
    }

    #[test]
    fn writes_sections_keys_and_crlf() {
        let text = ini_encode(&mut sample()).unwrap();
        assert_eq!(text, "Version=7\r\n[Inner]\r\n  Tick=42\r\n  Label=\"hello\"\r\n");
    }

    #[test]
    fn reads_back_what_it_writes() {
        let text = ini_encode(&mut sample()).unwrap();
        let back: Outer = ini_decode(&text).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn sibling_order_does_not_matter() {
        let text = "[Inner]\r\n  Label=\"hello\"\r\n  Tick=42\r\nVersion=7\r\n";
        let back: Outer = ini_decode(text).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn unknown_keys_are_skipped() {
        let text = "Version=7\r\nFuture=1\r\n[Inner]\r\n  Tick=42\r\n  Label=\"hello\"\r\n  Extra=\"x\"\r\n";
        let back: Outer = ini_decode(text).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let text = "; session dump\r\n\r\nVersion=7\r\n# more\r\n[Inner]\r\n  Tick=42\r\n  Label=\"hello\"\r\n";
        let back: Outer = ini_decode(text).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn out_of_range_integer_clamps() {
        let mut value = 0u8;
        let mut reader = IniReader::parse("300");
        reader.begin().unwrap();
        reader.u8(&mut value).unwrap();
        assert_eq!(value, 255);
    }

    #[test]
    fn negative_into_unsigned_clamps_to_zero() {
        let mut value = 5u32;
        let mut reader = IniReader::parse("-12");
        reader.begin().unwrap();
        reader.u32(&mut value).unwrap();
        assert_eq!(value, 0);
    }

    #[test]
    fn hex_prefix_is_accepted() {
        let mut value = 0u32;
        let mut reader = IniReader::parse("0x1F");
        reader.begin().unwrap();
        reader.u32(&mut value).unwrap();
        assert_eq!(value, 31);
    }

    #[test]
    fn letters_where_integer_expected_are_corrupt() {
        let mut value = 0u32;
        let mut reader = IniReader::parse("soon");
        reader.begin().unwrap();
        let err = reader.u32(&mut value).unwrap_err();
        assert!(matches!(err, WireError::Corrupt { .. }), "got {err:?}");
    }

    #[test]
    fn empty_value_reads_as_not_found() {
        let mut value = 0u32;
        let mut reader = IniReader::parse("");
        reader.begin().unwrap();
        let err = reader.u32(&mut value).unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
    }

    #[test]
    fn bare_document_is_the_root_value() {
        let value: u32 = ini_decode("300\r\n").unwrap();
        assert_eq!(value, 300);

        let mut original = String::from("root text");
        let text = ini_encode(&mut original).unwrap();
        assert_eq!(text, "\"root text\"\r\n");
        let back: String = ini_decode(&text).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn quoted_root_value_may_contain_equals() {
        let mut original = String::from("key=value");
        let text = ini_encode(&mut original).unwrap();
        let back: String = ini_decode(&text).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn string_escapes_round_trip() {
        let mut value = String::from("line\nbreak \"quoted\" \\slash\tand \x01 control");
        let text = ini_encode(&mut value).unwrap();
        let back: String = ini_decode(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn unterminated_string_is_corrupt() {
        let err = ini_decode::<String>("\"no closing quote").unwrap_err();
        assert!(matches!(err, WireError::Corrupt { .. }), "got {err:?}");
    }

    #[test]
    fn missing_quote_is_corrupt() {
        let err = ini_decode::<String>("bare words").unwrap_err();
        assert!(matches!(err, WireError::Corrupt { .. }), "got {err:?}");
    }

    #[test]
    fn corrupt_errors_name_the_line() {
        let text = "[Inner]\r\n  Tick=42\r\n  Label=oops\r\nVersion=7\r\n";
        let err = ini_decode::<Outer>(text).unwrap_err();
        assert!(err.to_string().contains("line 3"), "got {err}");
    }

    #[test]
    fn raw_bytes_as_hex() {
        let mut bytes = [0xde, 0xad, 0xbe, 0xef];
        let text = ini_encode(&mut bytes[..]).unwrap();
        assert_eq!(text.trim_end(), "deadbeef");
        let mut back = [0u8; 4];
        ini_decode_into(&mut back[..], &text).unwrap();
        assert_eq!(back, [0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn repeated_sections_are_consumed_in_order() {
        let text = "[Item]\r\n  Tick=1\r\n  Label=\"a\"\r\n[Item]\r\n  Tick=2\r\n  Label=\"b\"\r\n";
        let mut reader = IniReader::parse(text);
        reader.begin().unwrap();
        let mut seen = Vec::new();
        while reader.name("Item") {
            let mut inner = Inner::default();
            let res = inner.serial(&mut reader);
            reader.name_end(res.is_err());
            res.unwrap();
            seen.push(inner);
        }
        reader.end().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].tick, 1);
        assert_eq!(seen[1].label, "b");
    }
}
