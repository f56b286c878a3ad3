//! Contains traits and implementations for persisting data that lives next to
//! the pivots, such as the insight text users write for a view.

mod annotation;

pub mod sqlite;

pub use annotation::{Annotation, AnnotationStore};
pub use sqlite::{SQLiteAnnotationStore, create_annotation_table};
