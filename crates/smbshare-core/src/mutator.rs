//! Mutator: validates share requests and plans the next [`Document`].
//!
//! A [`Mutator`] is built from the document currently on disk.  Each
//! operation runs its checks in a fixed order (first failure wins) against
//! the [`ShareRegistry`] derived from that document and, on success, returns
//! a *new* document.  Nothing here writes files or talks to the service; the
//! caller decides what to do with the result.
//!
//! # Rendering
//!
//! A managed block is always written in the same field order:
//!
//! ```text
//! [name]
//!    path = /srv/media
//!    writeable = Yes
//!    create mask = 0777
//!    directory mask = 0777
//!    public = no
//!    comment = Shared Media
//!    valid users = alice bob      (only when the list is non-empty)
//! ```
//!
//! Updating a share regenerates its owned lines from these fields, so any
//! other directive in the owned lines is lost.  Comments after the owned
//! lines survive; directives there for the fields above are dropped.
//!
//! The comment is written in its normalised form (see
//! [`ShareSpec::normalized_comment`]) so it reads back unchanged.

use tracing::debug;

use crate::document::{is_reserved, Block, Document};
use crate::registry::ShareRegistry;
use crate::share::{validate_fields, validate_name, ShareError, ShareSpec};

/// Indentation used for generated directive lines.
const INDENT: &str = "   ";

/// Answers whether a share path exists at mutation time.
///
/// Any `Fn(&str) -> bool` closure is a probe, so tests can supply a fixed
/// answer and the application layer can check the real filesystem.
pub trait PathProbe {
    fn exists(&self, path: &str) -> bool;
}

impl<F> PathProbe for F
where
    F: Fn(&str) -> bool,
{
    fn exists(&self, path: &str) -> bool {
        self(path)
    }
}

/// Plans share mutations over one snapshot of the document.
pub struct Mutator<P> {
    document: Document,
    registry: ShareRegistry,
    probe: P,
}

impl<P: PathProbe> Mutator<P> {
    /// Builds the registry for `document`.
    pub fn new(document: Document, probe: P) -> Self {
        let registry = ShareRegistry::from_document(&document);
        Self {
            document,
            registry,
            probe,
        }
    }

    /// The snapshot every plan starts from.
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn registry(&self) -> &ShareRegistry {
        &self.registry
    }

    /// Plans the addition of a new share at the end of the document.
    ///
    /// # Errors
    ///
    /// [`ShareError::InvalidName`], [`ShareError::InvalidField`],
    /// [`ShareError::PathNotFound`] or [`ShareError::NameConflict`] (also for
    /// reserved section names and case variants of an existing share),
    /// checked in that order.
    pub fn add(&self, spec: &ShareSpec) -> Result<Document, ShareError> {
        validate_name(&spec.name)?;
        validate_fields(spec)?;
        self.check_path(&spec.path)?;
        if self.registry.name_taken(&spec.name, None) || is_reserved(&spec.name) {
            return Err(ShareError::NameConflict {
                name: spec.name.clone(),
            });
        }

        let mut next = self.document.clone();
        next.push_block(Block::new(spec.name.clone(), render_share_lines(spec)));
        debug!(share = %spec.name, "planned share addition");
        Ok(next)
    }

    /// Plans replacing share `old_name` with `spec`, keeping its position.
    ///
    /// The header becomes `[spec.name]` and the owned lines are regenerated.
    /// The block's blank separator lines and trailer are kept, minus any
    /// managed-key directive in the trailer, so each field is written once.
    /// Renaming a share to a case variant of its own name is allowed.
    ///
    /// # Errors
    ///
    /// [`ShareError::NotFound`] for `old_name`, then
    /// [`ShareError::InvalidName`], [`ShareError::InvalidField`],
    /// [`ShareError::NameConflict`] (another share or a reserved section) and
    /// [`ShareError::PathNotFound`].
    pub fn update(&self, old_name: &str, spec: &ShareSpec) -> Result<Document, ShareError> {
        let index = self.managed_position(old_name)?;
        validate_name(&spec.name)?;
        validate_fields(spec)?;
        if is_reserved(&spec.name) || self.registry.name_taken(&spec.name, Some(old_name)) {
            return Err(ShareError::NameConflict {
                name: spec.name.clone(),
            });
        }
        self.check_path(&spec.path)?;

        let old = &self.document.blocks()[index];
        let mut lines = render_share_lines(spec);
        lines.extend(std::iter::repeat(String::new()).take(old.owned_blank_tail()));
        lines.extend(old.trailer_without_managed_keys().cloned());

        let mut next = self.document.clone();
        next.replace_block(index, Block::new(spec.name.clone(), lines));
        debug!(from = old_name, to = %spec.name, "planned share update");
        Ok(next)
    }

    /// Plans removal of share `name` (header and owned lines).
    ///
    /// # Errors
    ///
    /// [`ShareError::NotFound`] if no managed share has that name.
    pub fn delete(&self, name: &str) -> Result<Document, ShareError> {
        let index = self.managed_position(name)?;
        let mut next = self.document.clone();
        next.remove_block(index);
        debug!(share = name, "planned share deletion");
        Ok(next)
    }

    /// Plans replacing only the user list of share `name`.
    ///
    /// Equivalent to [`Mutator::update`] with the share's current path,
    /// writability and comment, so the path must still exist.
    ///
    /// # Errors
    ///
    /// [`ShareError::NotFound`], then any error [`Mutator::update`] returns.
    pub fn set_users<S: AsRef<str>>(&self, name: &str, users: &[S]) -> Result<Document, ShareError> {
        let current = self
            .registry
            .lookup(name)
            .ok_or_else(|| ShareError::NotFound {
                name: name.to_string(),
            })?;
        let spec = current
            .to_spec()
            .with_users(users.iter().map(|user| user.as_ref().to_string()));
        self.update(name, &spec)
    }

    fn managed_position(&self, name: &str) -> Result<usize, ShareError> {
        let not_found = || ShareError::NotFound {
            name: name.to_string(),
        };
        if !self.registry.exists(name) {
            return Err(not_found());
        }
        self.document.position(name).ok_or_else(not_found)
    }

    fn check_path(&self, path: &str) -> Result<(), ShareError> {
        if path.is_empty() || !self.probe.exists(path) {
            return Err(ShareError::PathNotFound {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

/// Renders the directive lines of a managed share in the fixed field order.
pub fn render_share_lines(spec: &ShareSpec) -> Vec<String> {
    let writeable = if spec.writable { "Yes" } else { "No" };
    let mut lines = vec![
        format!("{INDENT}path = {}", spec.path),
        format!("{INDENT}writeable = {writeable}"),
        format!("{INDENT}create mask = 0777"),
        format!("{INDENT}directory mask = 0777"),
        format!("{INDENT}public = no"),
        format!("{INDENT}comment = {}", spec.normalized_comment())
            .trim_end()
            .to_string(),
    ];
    let users = spec.normalized_users();
    if !users.is_empty() {
        lines.push(format!("{INDENT}valid users = {}", users.join(" ")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parser::parse;

    const BASE: &str = "\
# managed by hand and by tools
[global]
   workgroup = WORKGROUP

[homes]
   browseable = no

[media]
   path = /srv/media
   writeable = Yes
   vfs objects = recycle

# Printer drivers
[print$]
   path = /var/lib/samba/printers
";

    fn everything_exists(_: &str) -> bool {
        true
    }

    fn mutator(text: &str) -> Mutator<fn(&str) -> bool> {
        Mutator::new(parse(text), everything_exists as fn(&str) -> bool)
    }

    fn shares(doc: &Document) -> Vec<crate::share::Share> {
        ShareRegistry::from_document(doc).all()
    }

    // ── add ───────────────────────────────────────────────────────────────────

    #[test]
    fn test_add_appends_block_in_fixed_field_order() {
        // Arrange
        let m = mutator("[global]\n");
        let spec = ShareSpec::new("media", "/srv/media")
            .with_comment("Shared Media")
            .with_users(["alice", "bob"]);

        // Act
        let doc = m.add(&spec).expect("add must succeed");

        // Assert
        assert_eq!(
            doc.render(),
            "[global]\n\
             \n\
             [media]\n   \
             path = /srv/media\n   \
             writeable = Yes\n   \
             create mask = 0777\n   \
             directory mask = 0777\n   \
             public = no\n   \
             comment = Shared Media\n   \
             valid users = alice bob\n"
        );
    }

    #[test]
    fn test_add_omits_valid_users_when_empty() {
        let doc = mutator("").add(&ShareSpec::new("a", "/srv")).unwrap();
        assert!(!doc.render().contains("valid users"));
        assert!(doc.render().contains("   comment =\n"));
    }

    #[test]
    fn test_add_never_writes_placeholder_user() {
        let spec = ShareSpec::new("a", "/srv").with_users(["%S", "alice"]);
        let doc = mutator("").add(&spec).unwrap();
        assert!(doc.render().contains("valid users = alice\n"));
        assert_eq!(shares(&doc)[0].valid_users, vec!["alice"]);
    }

    #[test]
    fn test_add_preserves_existing_text_verbatim() {
        let doc = mutator(BASE).add(&ShareSpec::new("new", "/srv/new")).unwrap();
        assert!(doc.render().starts_with(BASE));
    }

    #[test]
    fn test_add_rejects_invalid_name_before_other_checks() {
        // Path missing *and* name invalid: the name error wins.
        let m = Mutator::new(parse(""), |_: &str| false);
        let err = m.add(&ShareSpec::new("bad/name", "/tmp")).unwrap_err();
        assert!(matches!(err, ShareError::InvalidName { .. }));
    }

    #[test]
    fn test_add_rejects_missing_path() {
        let m = Mutator::new(parse(""), |p: &str| p == "/exists");
        let err = m.add(&ShareSpec::new("a", "/missing")).unwrap_err();
        assert_eq!(err, ShareError::PathNotFound { path: "/missing".into() });
        assert!(matches!(
            m.add(&ShareSpec::new("a", "")),
            Err(ShareError::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_add_rejects_existing_and_reserved_names() {
        let m = mutator(BASE);
        for name in ["media", "homes", "printers", "print$", "global", "GLOBAL"] {
            let err = m.add(&ShareSpec::new(name, "/srv")).unwrap_err();
            assert_eq!(err, ShareError::NameConflict { name: name.into() }, "{name}");
        }
    }

    #[test]
    fn test_add_rejects_case_variant_of_existing_share() {
        let err = mutator(BASE).add(&ShareSpec::new("MEDIA", "/srv")).unwrap_err();
        assert_eq!(err, ShareError::NameConflict { name: "MEDIA".into() });
    }

    #[test]
    fn test_add_writes_comment_that_reads_back_unchanged() {
        // Arrange
        let spec = ShareSpec::new("a", "/srv").with_comment("  \"Family photos\" ");

        // Act
        let doc = mutator("").add(&spec).unwrap();

        // Assert
        assert!(doc.render().contains("   comment = Family photos\n"));
        assert_eq!(shares(&doc)[0].comment, spec.normalized_comment());
        assert_eq!(shares(&doc)[0].to_spec(), spec.clone().with_comment("Family photos"));
    }

    // ── update ────────────────────────────────────────────────────────────────

    const COMMENTED: &str = "\
[media]
# Family photos, do not remove
   path = /srv/media
   writeable = Yes
   vfs objects = recycle
   valid users = alice
";

    #[test]
    fn test_update_share_with_comment_under_header_writes_each_field_once() {
        // Arrange
        let m = mutator(COMMENTED);
        let spec = ShareSpec::new("media", "/srv/new").with_users(["bob"]);

        // Act
        let doc = m.update("media", &spec).unwrap();

        // Assert
        let text = doc.render();
        assert_eq!(text.matches("path =").count(), 1);
        assert_eq!(text.matches("valid users =").count(), 1);
        assert!(text.contains("# Family photos, do not remove\n"));
        assert!(text.contains("   vfs objects = recycle\n"));
        let share = &shares(&doc)[0];
        assert_eq!(share.path, "/srv/new");
        assert_eq!(share.valid_users, vec!["bob"]);
    }

    #[test]
    fn test_set_users_on_share_with_comment_under_header() {
        let doc = mutator(COMMENTED).set_users("media", &["carol"]).unwrap();
        let share = &shares(&doc)[0];
        assert_eq!(share.path, "/srv/media");
        assert_eq!(share.valid_users, vec!["carol"]);
    }

    #[test]
    fn test_update_rename_onto_case_variant_of_other_share_conflicts() {
        let text = format!("{BASE}\n[other]\n   path = /srv/other\n");
        let err = mutator(&text)
            .update("media", &ShareSpec::new("Other", "/srv"))
            .unwrap_err();
        assert_eq!(err, ShareError::NameConflict { name: "Other".into() });
    }

    #[test]
    fn test_update_rename_to_own_case_variant_is_allowed() {
        let doc = mutator(BASE)
            .update("media", &ShareSpec::new("Media", "/srv/media"))
            .unwrap();
        assert!(doc.render().contains("[Media]\n"));
    }

    #[test]
    fn test_update_renames_in_place_and_keeps_trailer() {
        // Arrange
        let m = mutator(BASE);
        let spec = ShareSpec::new("videos", "/srv/video").with_writable(false);

        // Act
        let doc = m.update("media", &spec).unwrap();

        // Assert
        let names: Vec<&str> = doc.blocks().iter().map(Block::name).collect();
        assert_eq!(names, vec!["global", "homes", "videos", "print$"]);
        let text = doc.render();
        assert!(!text.contains("[media]"));
        assert!(!text.contains("vfs objects"), "unmanaged directive is dropped");
        assert!(text.contains("   comment =\n\n# Printer drivers\n[print$]"));
    }

    #[test]
    fn test_update_with_same_values_keeps_managed_fields() {
        // Arrange
        let m = mutator(BASE);
        let before = m.registry().lookup("media").unwrap().clone();

        // Act
        let doc = m.update("media", &before.to_spec()).unwrap();

        // Assert
        assert_eq!(shares(&doc), vec![before]);
    }

    #[test]
    fn test_update_missing_share_is_not_found() {
        let err = mutator(BASE).update("nope", &ShareSpec::new("nope", "/srv")).unwrap_err();
        assert_eq!(err, ShareError::NotFound { name: "nope".into() });
    }

    #[test]
    fn test_update_reserved_section_is_not_found() {
        let err = mutator(BASE).update("homes", &ShareSpec::new("homes", "/srv")).unwrap_err();
        assert!(matches!(err, ShareError::NotFound { .. }));
    }

    #[test]
    fn test_update_rename_onto_other_share_conflicts() {
        let text = format!("{BASE}\n[other]\n   path = /srv/other\n");
        let err = mutator(&text)
            .update("media", &ShareSpec::new("other", "/srv"))
            .unwrap_err();
        assert_eq!(err, ShareError::NameConflict { name: "other".into() });
    }

    #[test]
    fn test_update_rename_onto_reserved_name_conflicts() {
        let err = mutator(BASE)
            .update("media", &ShareSpec::new("printers", "/srv"))
            .unwrap_err();
        assert!(matches!(err, ShareError::NameConflict { .. }));
    }

    #[test]
    fn test_update_checks_path_last() {
        let m = Mutator::new(parse(BASE), |_: &str| false);
        let err = m.update("media", &ShareSpec::new("media", "/gone")).unwrap_err();
        assert!(matches!(err, ShareError::PathNotFound { .. }));
    }

    // ── delete ────────────────────────────────────────────────────────────────

    #[test]
    fn test_delete_removes_block_and_keeps_neighbours() {
        // Act
        let doc = mutator(BASE).delete("media").unwrap();

        // Assert
        let text = doc.render();
        assert!(!text.contains("[media]"));
        assert!(!text.contains("/srv/media"));
        assert!(text.contains("   browseable = no\n\n# Printer drivers\n[print$]"));
        assert!(shares(&doc).is_empty());
    }

    #[test]
    fn test_delete_share_with_comment_under_header_leaves_no_directives() {
        // Arrange
        let text = format!("[docs]\n   path = /srv/docs\n\n{COMMENTED}");

        // Act
        let doc = mutator(&text).delete("media").unwrap();

        // Assert
        let rendered = doc.render();
        assert!(!rendered.contains("/srv/media"));
        assert!(!rendered.contains("valid users"));
        assert_eq!(shares(&doc)[0].path, "/srv/docs");
        assert!(shares(&doc)[0].valid_users.is_empty());
    }

    #[test]
    fn test_delete_missing_or_reserved_is_not_found() {
        let m = mutator(BASE);
        assert!(matches!(m.delete("ghost"), Err(ShareError::NotFound { .. })));
        assert!(matches!(m.delete("global"), Err(ShareError::NotFound { .. })));
    }

    // ── set_users ─────────────────────────────────────────────────────────────

    #[test]
    fn test_set_users_keeps_other_fields() {
        // Act
        let doc = mutator(BASE).set_users("media", &["carol", "%S"]).unwrap();

        // Assert
        let share = &shares(&doc)[0];
        assert_eq!(share.path, "/srv/media");
        assert!(share.writable);
        assert_eq!(share.valid_users, vec!["carol"]);
    }

    #[test]
    fn test_set_users_on_missing_share_is_not_found() {
        let err = mutator(BASE).set_users("ghost", &["a"]).unwrap_err();
        assert!(matches!(err, ShareError::NotFound { .. }));
    }
}
