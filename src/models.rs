//! Record types flowing through the pipeline.
//! Each stage consumes the previous record type and produces the next one,
//! adding the field it derives; nothing is mutated in place.

use ndarray::Array1;
use uuid::Uuid;

/// A file as read by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord
{
    pub id: Uuid,
    pub path: String,
    pub content: Vec<u8>,
}

/// An image record with the label string derived from its path.
/// The label string is empty when the path did not name a known category.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord
{
    pub record: ImageRecord,
    pub label_string: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord
{
    pub record: ImageRecord,
    pub label_string: String,
    pub label: usize,
}

/// The (label, features) pair used for training and evaluation.
/// The raw image bytes are dropped at this point; the id and path are kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Example
{
    pub id: Uuid,
    pub path: String,
    pub label: usize,
    pub features: Array1<f64>,
}
