//! Defines the annotation store trait.

use time::OffsetDateTime;

use crate::Error;

/// Free text attached to a view, e.g. the insights a user wrote under a
/// dashboard table.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// The identifier of the view the text belongs to.
    pub view_id: String,
    /// The annotation text.
    pub text: String,
    /// When the text was last saved.
    pub updated_at: OffsetDateTime,
}

/// Saves and retrieves annotations keyed by view identifier.
///
/// Annotations are independent of the pivot engine, which never reads them.
pub trait AnnotationStore {
    /// Get the annotation for `view_id`.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the view has no annotation.
    fn get(&self, view_id: &str) -> Result<Annotation, Error>;

    /// Save `text` as the annotation for `view_id`, replacing any existing
    /// annotation.
    fn save(&self, view_id: &str, text: &str) -> Result<Annotation, Error>;

    /// Delete the annotation for `view_id`.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the view has no annotation.
    fn delete(&self, view_id: &str) -> Result<(), Error>;

    /// Get every annotation, ordered by view identifier.
    fn get_all(&self) -> Result<Vec<Annotation>, Error>;
}
