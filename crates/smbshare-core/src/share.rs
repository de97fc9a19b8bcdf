//! Share records, operation input, and validation.
//!
//! [`Share`] is what the system reports for a managed block.  [`ShareSpec`]
//! is what callers hand to add/update: the five fields an administrator can
//! set (`public` is always written as `no` and cannot be requested).

use serde::Serialize;
use thiserror::Error;

/// Substitution token meaning "this share's own name".  It is not a user,
/// so it is filtered from every user list the system reports or writes.
pub const PLACEHOLDER_USER: &str = "%S";

/// Characters that may not appear in a share name.  Brackets are included
/// because they would corrupt the section header.
pub const FORBIDDEN_NAME_CHARS: [char; 11] =
    ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '[', ']'];

/// Error type for share validation and lookup.
///
/// Every variant identifies the offending field value.  None of these
/// errors is produced after the file has been touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShareError {
    /// The share name is empty or contains forbidden characters.
    #[error("invalid share name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A field value cannot be written safely into the file.
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The share path is empty or does not exist.
    #[error("path {path:?} does not exist")]
    PathNotFound { path: String },

    /// Another share (or a reserved section) already uses the name.
    #[error("share {name:?} already exists")]
    NameConflict { name: String },

    /// No managed share has the name.
    #[error("share {name:?} not found")]
    NotFound { name: String },
}

impl ShareError {
    /// Name of the request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ShareError::InvalidName { .. }
            | ShareError::NameConflict { .. }
            | ShareError::NotFound { .. } => "name",
            ShareError::InvalidField { field, .. } => field,
            ShareError::PathNotFound { .. } => "path",
        }
    }
}

/// A managed share as read from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Share {
    pub name: String,
    pub path: String,
    pub writable: bool,
    /// Reported as found in the file; managed writes always emit `public = no`.
    pub public: bool,
    /// Surrounding double quotes are stripped on read.
    pub comment: String,
    pub valid_users: Vec<String>,
}

impl Share {
    /// The request that would rewrite this share with its current values.
    pub fn to_spec(&self) -> ShareSpec {
        ShareSpec {
            name: self.name.clone(),
            path: self.path.clone(),
            writable: self.writable,
            comment: self.comment.clone(),
            valid_users: self.valid_users.clone(),
        }
    }
}

/// Input for add and update operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareSpec {
    pub name: String,
    pub path: String,
    pub writable: bool,
    /// Written without surrounding whitespace or double quotes, which the
    /// reader would strip anyway.
    pub comment: String,
    pub valid_users: Vec<String>,
}

impl ShareSpec {
    /// A writable share with no comment and no user restriction.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            writable: true,
            comment: String::new(),
            valid_users: Vec::new(),
        }
    }

    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_users = users.into_iter().map(Into::into).collect();
        self
    }

    /// Comment as it will be written and later read back.
    pub fn normalized_comment(&self) -> &str {
        self.comment
            .trim_matches(|c: char| c == '"' || c.is_whitespace())
    }

    /// User list as it will be written: trimmed, without empty entries or
    /// [`PLACEHOLDER_USER`], duplicates removed, first occurrence order kept.
    pub fn normalized_users(&self) -> Vec<String> {
        normalize_users(&self.valid_users)
    }
}

/// Normalizes a user list into an ordered set.
pub fn normalize_users<S: AsRef<str>>(users: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(users.len());
    for user in users {
        let user = user.as_ref().trim();
        if user.is_empty() || user == PLACEHOLDER_USER {
            continue;
        }
        if !out.iter().any(|existing| existing == user) {
            out.push(user.to_string());
        }
    }
    out
}

/// Checks a share name against the naming rules.
///
/// # Errors
///
/// Returns [`ShareError::InvalidName`] when the name is empty, contains
/// whitespace, or contains one of [`FORBIDDEN_NAME_CHARS`].
pub fn validate_name(name: &str) -> Result<(), ShareError> {
    let invalid = |reason| ShareError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }
    if name.contains(FORBIDDEN_NAME_CHARS) {
        return Err(invalid(r#"must not contain any of / \ : * ? " < > | [ ]"#));
    }
    Ok(())
}

/// Checks that the free-text fields of `spec` can be written as single
/// directive lines.
///
/// # Errors
///
/// Returns [`ShareError::InvalidField`] for a path or comment containing a
/// line break, or a user name containing whitespace.
pub fn validate_fields(spec: &ShareSpec) -> Result<(), ShareError> {
    let has_line_break = |value: &str| value.contains(['\n', '\r']);

    if has_line_break(&spec.path) {
        return Err(ShareError::InvalidField {
            field: "path",
            value: spec.path.clone(),
            reason: "must be a single line",
        });
    }
    if has_line_break(&spec.comment) {
        return Err(ShareError::InvalidField {
            field: "comment",
            value: spec.comment.clone(),
            reason: "must be a single line",
        });
    }
    if let Some(user) = spec
        .valid_users
        .iter()
        .map(|user| user.trim())
        .find(|user| user.chars().any(char::is_whitespace))
    {
        return Err(ShareError::InvalidField {
            field: "valid users",
            value: user.to_string(),
            reason: "user names must not contain whitespace",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_accepts_plain_names() {
        for name in ["media", "Media_2", "backup-disk", "a.b", "print"] {
            assert!(validate_name(name).is_ok(), "{name:?} must be valid");
        }
    }

    #[test]
    fn test_validate_name_rejects_empty_whitespace_and_forbidden_chars() {
        let names = [
            "", "my share", "tab\tname", "bad/name", "a\\b", "c:", "w*", "q?", "\"q\"", "<a>",
            "p|q", "[x]",
        ];
        for name in names {
            let err = validate_name(name).expect_err(name);
            assert!(matches!(err, ShareError::InvalidName { .. }), "{name:?}");
            assert_eq!(err.field(), "name");
        }
    }

    #[test]
    fn test_validate_fields_rejects_multiline_comment() {
        let spec = ShareSpec::new("a", "/srv").with_comment("one\n   path = /etc");
        let err = validate_fields(&spec).unwrap_err();
        assert_eq!(err.field(), "comment");
    }

    #[test]
    fn test_validate_fields_rejects_user_with_space() {
        let spec = ShareSpec::new("a", "/srv").with_users(["alice", "bob smith"]);
        assert!(matches!(
            validate_fields(&spec),
            Err(ShareError::InvalidField { field: "valid users", .. })
        ));
    }

    #[test]
    fn test_normalize_users_filters_placeholder_and_duplicates() {
        let users = normalize_users(&["alice", "%S", " bob ", "", "alice"]);
        assert_eq!(users, vec!["alice", "bob"]);
    }

    #[test]
    fn test_normalized_comment_strips_outer_quotes_and_whitespace() {
        let comment = |c: &str| ShareSpec::new("a", "/srv").with_comment(c);
        assert_eq!(comment("\"Shared Media\"").normalized_comment(), "Shared Media");
        assert_eq!(comment("  x\" \" ").normalized_comment(), "x");
        assert_eq!(comment("say \"hi\" now").normalized_comment(), "say \"hi\" now");
        assert_eq!(comment("   ").normalized_comment(), "");
    }

    #[test]
    fn test_share_to_spec_keeps_all_settable_fields() {
        let share = Share {
            name: "media".into(),
            path: "/srv/media".into(),
            writable: true,
            public: false,
            comment: "c".into(),
            valid_users: vec!["alice".into()],
        };
        let spec = share.to_spec();
        assert_eq!(spec.name, "media");
        assert_eq!(spec.path, "/srv/media");
        assert!(spec.writable);
        assert_eq!(spec.comment, "c");
        assert_eq!(spec.valid_users, vec!["alice"]);
    }
}
