//! Document model: an ordered sequence of header-delimited blocks.
//!
//! A [`Document`] is the preamble (every line before the first `[section]`
//! header) followed by zero or more [`Block`]s.  Rendering a document that was
//! parsed and never modified reproduces the original text byte for byte,
//! which is what lets the system rewrite one share without disturbing the
//! rest of a hand-maintained file.
//!
//! # Block extent
//!
//! The parser gives each block every line up to the next header, and every
//! directive in those lines belongs to the section.  For rewriting, a block
//! *owns* only the leading run of blank lines, indented lines and
//! `key = value` directives.  The first flush-left line that is none of
//! those (typically a `#` comment) starts the block's *trailer*.
//!
//! Mutations regenerate or drop the owned lines.  From the trailer they keep
//! comments and other text; managed-key directives found there are dropped
//! on update (the regenerated lines replace them) and every directive is
//! dropped on delete.
//!
//! ```text
//! [media]                      <- header
//!    path = /srv/media         <- owned
//!    writeable = Yes           <- owned
//!                              <- owned (blank separator)
//! # Printer drivers follow     <- trailer (kept)
//!    valid users = alice       <- trailer directive (managed key)
//! ```

pub mod parser;
pub mod template;

use std::fmt;

/// Name of the reserved section holding server-wide settings.
pub const GLOBAL_SECTION: &str = "global";

/// Section names that never become managed shares.
pub const RESERVED_SECTIONS: [&str; 4] = [GLOBAL_SECTION, "homes", "printers", "print$"];

/// Returns `true` when `name` is one of the [`RESERVED_SECTIONS`].
///
/// The comparison ignores ASCII case because the file-sharing service treats
/// section names case-insensitively.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_SECTIONS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// A header line and the lines that follow it up to the next header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    name: String,
    header: String,
    lines: Vec<String>,
}

impl Block {
    /// Creates a block with a canonical `[name]` header.
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        let name = name.into();
        let header = format!("[{name}]");
        Self {
            name,
            header,
            lines,
        }
    }

    /// Creates a block keeping the header line exactly as it appeared.
    pub(crate) fn with_raw_header(name: String, header: String) -> Self {
        Self {
            name,
            header,
            lines: Vec::new(),
        }
    }

    /// Section name between the brackets.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The header line as written in the file.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Every line after the header, up to the next header.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_reserved(&self) -> bool {
        is_reserved(&self.name)
    }

    /// Number of leading lines the block owns (see the module docs).
    pub fn owned_len(&self) -> usize {
        self.lines
            .iter()
            .position(|line| ends_owned_extent(line))
            .unwrap_or(self.lines.len())
    }

    /// Lines that belong to the share definition itself.
    pub fn owned_lines(&self) -> &[String] {
        &self.lines[..self.owned_len()]
    }

    /// Lines after the owned extent.
    pub fn trailer(&self) -> &[String] {
        &self.lines[self.owned_len()..]
    }

    /// Trailer lines kept when the share is rewritten: everything except
    /// directives for the managed keys.
    pub fn trailer_without_managed_keys(&self) -> impl Iterator<Item = &String> {
        self.trailer().iter().filter(|line| {
            !parser::parse_directive(line)
                .is_some_and(|(key, _)| parser::RECOGNIZED_KEYS.contains(&key))
        })
    }

    /// Trailer lines kept when the block is deleted: everything that is not
    /// a directive, so no setting migrates into the preceding section.
    pub fn trailer_without_directives(&self) -> impl Iterator<Item = &String> {
        self.trailer()
            .iter()
            .filter(|line| parser::parse_directive(line).is_none())
    }

    /// Number of blank lines closing the owned extent.
    pub(crate) fn owned_blank_tail(&self) -> usize {
        self.owned_lines()
            .iter()
            .rev()
            .take_while(|line| line.trim().is_empty())
            .count()
    }

    pub(crate) fn push_line(&mut self, line: String) {
        self.lines.push(line);
    }

    pub(crate) fn extend_lines(&mut self, lines: impl IntoIterator<Item = String>) {
        self.lines.extend(lines);
    }
}

/// A flush-left line that is neither blank nor a directive closes the owned
/// extent of a block.
fn ends_owned_extent(line: &str) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    if line.starts_with(' ') || line.starts_with('\t') {
        return false;
    }
    parser::parse_directive(line).is_none()
}

/// The whole configuration file as an ordered list of blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    preamble: Vec<String>,
    blocks: Vec<Block>,
    trailing_newline: bool,
}

impl Document {
    pub(crate) fn from_parts(
        preamble: Vec<String>,
        blocks: Vec<Block>,
        trailing_newline: bool,
    ) -> Self {
        Self {
            preamble,
            blocks,
            trailing_newline,
        }
    }

    /// Lines before the first section header.
    pub fn preamble(&self) -> &[String] {
        &self.preamble
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Index of the first block whose name is exactly `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.blocks.iter().position(|block| block.name() == name)
    }

    /// First block whose name is exactly `name`.
    pub fn block(&self, name: &str) -> Option<&Block> {
        self.position(name).map(|index| &self.blocks[index])
    }

    /// `true` when the document has no lines at all.
    pub fn is_empty(&self) -> bool {
        self.preamble.is_empty() && self.blocks.is_empty()
    }

    /// Serializes the document back to text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut first = true;
        for line in self.all_lines() {
            if !first {
                out.push('\n');
            }
            out.push_str(line);
            first = false;
        }
        if self.trailing_newline && !first {
            out.push('\n');
        }
        out
    }

    fn all_lines(&self) -> impl Iterator<Item = &str> {
        self.preamble.iter().map(String::as_str).chain(
            self.blocks.iter().flat_map(|block| {
                std::iter::once(block.header()).chain(block.lines().iter().map(String::as_str))
            }),
        )
    }

    fn last_line(&self) -> Option<&str> {
        match self.blocks.last() {
            Some(block) => Some(
                block
                    .lines()
                    .last()
                    .map(String::as_str)
                    .unwrap_or(block.header()),
            ),
            None => self.preamble.last().map(String::as_str),
        }
    }

    /// Appends `block`, separating it from existing content by a blank line.
    pub(crate) fn push_block(&mut self, block: Block) {
        let needs_separator = self
            .last_line()
            .is_some_and(|line| !line.trim().is_empty());
        if needs_separator {
            match self.blocks.last_mut() {
                Some(last) => last.push_line(String::new()),
                None => self.preamble.push(String::new()),
            }
        }
        self.blocks.push(block);
        self.trailing_newline = true;
    }

    pub(crate) fn replace_block(&mut self, index: usize, block: Block) {
        self.blocks[index] = block;
    }

    /// Removes the block at `index`.  The non-directive lines of its trailer
    /// are handed to the preceding block (or the preamble) so surrounding
    /// text stays in place.
    pub(crate) fn remove_block(&mut self, index: usize) -> Block {
        let removed = self.blocks.remove(index);
        let trailer: Vec<String> = removed.trailer_without_directives().cloned().collect();
        if !trailer.is_empty() {
            match index.checked_sub(1) {
                Some(previous) => self.blocks[previous].extend_lines(trailer),
                None => self.preamble.extend(trailer),
            }
        }
        removed
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
