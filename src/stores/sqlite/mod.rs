//! SQLite backed implementations of the store traits.

mod annotation;

pub use annotation::{SQLiteAnnotationStore, create_annotation_table};
