//! Block parser: raw configuration text → [`Document`], managed block → [`Share`].
//!
//! Parsing never fails.  The file is edited by hand and by other tools, so any
//! line the parser does not recognise is simply kept, verbatim, in whichever
//! block is open at that point (or in the preamble before the first header).

use tracing::trace;

use super::{Block, Document};
use crate::share::{Share, PLACEHOLDER_USER};

/// Per-share keys the system reads and writes.  Any other key inside a
/// managed block is ignored on read and dropped when the share is rewritten.
pub const RECOGNIZED_KEYS: [&str; 8] = [
    "path",
    "writeable",
    "writable",
    "create mask",
    "directory mask",
    "public",
    "comment",
    "valid users",
];

/// Parses configuration text into a [`Document`].
///
/// Lines are split on `\n` only, so carriage returns and trailing whitespace
/// survive a parse/render round-trip untouched.
pub fn parse(text: &str) -> Document {
    if text.is_empty() {
        return Document::default();
    }

    let trailing_newline = text.ends_with('\n');
    let body = if trailing_newline {
        &text[..text.len() - 1]
    } else {
        text
    };

    let mut preamble = Vec::new();
    let mut blocks: Vec<Block> = Vec::new();

    for line in body.split('\n') {
        if let Some(name) = parse_header(line) {
            trace!(section = name, "opened block");
            blocks.push(Block::with_raw_header(name.to_string(), line.to_string()));
            continue;
        }
        match blocks.last_mut() {
            Some(block) => block.push_line(line.to_string()),
            None => preamble.push(line.to_string()),
        }
    }

    Document::from_parts(preamble, blocks, trailing_newline)
}

/// Returns the section name if `line` is a `[name]` header.
///
/// Surrounding whitespace is tolerated; the name itself must be non-empty
/// and must not contain brackets.
pub fn parse_header(line: &str) -> Option<&str> {
    let inner = line.trim().strip_prefix('[')?.strip_suffix(']')?;
    if inner.is_empty() || inner.contains(['[', ']']) {
        return None;
    }
    Some(inner)
}

/// Splits a `key = value` line into trimmed key and value.
///
/// Comment lines (`#` or `;` after leading whitespace) and lines without an
/// `=` or with an empty key are not directives.
pub fn parse_directive(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.starts_with('#') || trimmed.starts_with(';') {
        return None;
    }
    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

/// Interprets a boolean directive value: `yes`, `true` and `1` (any case)
/// are true, everything else is false.
pub fn parse_bool(value: &str) -> bool {
    ["yes", "true", "1"]
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(value.trim()))
}

/// Builds a [`Share`] from a managed block.
///
/// Returns `None` for reserved sections.  Every line up to the next header
/// is read, including directives below a flush-left comment, since the
/// section still owns them.  When a key repeats, the last occurrence wins.
pub fn extract_share(block: &Block) -> Option<Share> {
    if block.is_reserved() {
        return None;
    }

    let mut share = Share {
        name: block.name().to_string(),
        path: String::new(),
        writable: false,
        public: false,
        comment: String::new(),
        valid_users: Vec::new(),
    };

    for line in block.lines() {
        let Some((key, value)) = parse_directive(line) else {
            continue;
        };
        match key {
            "path" => share.path = value.to_string(),
            "writeable" | "writable" => share.writable = parse_bool(value),
            "public" => share.public = parse_bool(value),
            "comment" => share.comment = value.trim_matches('"').to_string(),
            "valid users" => {
                share.valid_users = value
                    .split_whitespace()
                    .filter(|user| *user != PLACEHOLDER_USER)
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }

    Some(share)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Sample configuration
;   interfaces = 127.0.0.0/8 eth0

[global]
   workgroup = WORKGROUP
   server role = standalone server

[homes]
   comment = Home Directories
   valid users = %S

[media]
   path = /srv/media
   writeable = Yes
   create mask = 0777
   directory mask = 0777
   public = no
   comment = \"Shared Media\"
   valid users = alice %S bob
   vfs objects = recycle

# Windows clients look for this share name
[print$]
   path = /var/lib/samba/printers
";

    // ── parse ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_splits_preamble_and_blocks() {
        // Act
        let doc = parse(SAMPLE);

        // Assert
        assert_eq!(doc.preamble().len(), 3);
        let names: Vec<&str> = doc.blocks().iter().map(Block::name).collect();
        assert_eq!(names, vec!["global", "homes", "media", "print$"]);
    }

    #[test]
    fn test_parse_then_render_is_lossless() {
        let inputs = [
            SAMPLE,
            "",
            "\n",
            "[global]",
            "[global]\r\n   workgroup = X\r\n",
            "no headers at all\n\n",
            "   [ spaced ]   \n  path=/x\n\n\n",
            "[]\nnot a header\n[a]b]\n",
        ];
        for input in inputs {
            assert_eq!(parse(input).render(), input, "round-trip of {input:?}");
        }
    }

    #[test]
    fn test_parse_keeps_garbage_lines_in_open_block() {
        let doc = parse("[data]\n   path = /srv\n!!! garbage ???\n");
        let block = doc.block("data").expect("block must exist");
        assert_eq!(block.lines().len(), 2);
        assert_eq!(block.lines()[1], "!!! garbage ???");
    }

    #[test]
    fn test_parse_header_rejects_malformed_headers() {
        assert_eq!(parse_header("[media]"), Some("media"));
        assert_eq!(parse_header("  [media]  "), Some("media"));
        assert_eq!(parse_header("[]"), None);
        assert_eq!(parse_header("[a[b]"), None);
        assert_eq!(parse_header("media]"), None);
        assert_eq!(parse_header("[media] # trailing"), None);
    }

    // ── directives ────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_directive_trims_key_and_value() {
        assert_eq!(parse_directive("   valid users =  a b "), Some(("valid users", "a b")));
        assert_eq!(parse_directive("path=/x=y"), Some(("path", "/x=y")));
        assert_eq!(parse_directive("# path = /x"), None);
        assert_eq!(parse_directive("  ; path = /x"), None);
        assert_eq!(parse_directive(" = value"), None);
        assert_eq!(parse_directive("no equals"), None);
    }

    #[test]
    fn test_parse_bool_accepts_yes_true_one() {
        for value in ["yes", "Yes", "TRUE", "1", " yes "] {
            assert!(parse_bool(value), "{value:?} must be true");
        }
        for value in ["no", "false", "0", "on", ""] {
            assert!(!parse_bool(value), "{value:?} must be false");
        }
    }

    // ── extract_share ─────────────────────────────────────────────────────────

    #[test]
    fn test_extract_share_reads_managed_fields() {
        // Arrange
        let doc = parse(SAMPLE);
        let block = doc.block("media").unwrap();

        // Act
        let share = extract_share(block).expect("media is a managed share");

        // Assert
        assert_eq!(share.name, "media");
        assert_eq!(share.path, "/srv/media");
        assert!(share.writable);
        assert!(!share.public);
        assert_eq!(share.comment, "Shared Media");
        assert_eq!(share.valid_users, vec!["alice", "bob"]);
    }

    #[test]
    fn test_extract_share_returns_none_for_reserved_blocks() {
        let doc = parse(SAMPLE);
        for name in ["global", "homes", "print$"] {
            assert!(extract_share(doc.block(name).unwrap()).is_none(), "{name}");
        }
    }

    #[test]
    fn test_extract_share_accepts_writable_synonym() {
        let doc = parse("[a]\n   writable = true\n");
        assert!(extract_share(&doc.blocks()[0]).unwrap().writable);
    }

    #[test]
    fn test_extract_share_keys_are_case_sensitive() {
        let doc = parse("[a]\n   Path = /srv\n   WRITEABLE = yes\n");
        let share = extract_share(&doc.blocks()[0]).unwrap();
        assert_eq!(share.path, "");
        assert!(!share.writable);
    }

    #[test]
    fn test_extract_share_reads_directives_after_a_comment() {
        let doc = parse("[a]\n   path = /one\n# note\n   path = /two\n");
        assert_eq!(extract_share(&doc.blocks()[0]).unwrap().path, "/two");
    }

    #[test]
    fn test_extract_share_with_comment_directly_under_header() {
        // Arrange
        let text = "[media]\n# Family photos\n   path = /srv/media\n   writeable = yes\n   valid users = alice bob\n";

        // Act
        let doc = parse(text);
        let share = extract_share(&doc.blocks()[0]).unwrap();

        // Assert
        assert_eq!(share.path, "/srv/media");
        assert!(share.writable);
        assert_eq!(share.valid_users, ["alice", "bob"]);
    }

    #[test]
    fn test_extract_share_defaults_for_empty_block() {
        let doc = parse("[empty]\n");
        let share = extract_share(&doc.blocks()[0]).unwrap();
        assert_eq!(share.path, "");
        assert!(!share.writable);
        assert!(share.valid_users.is_empty());
    }
}
