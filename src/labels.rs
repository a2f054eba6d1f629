//! Derives the label string of an image from the directories in its path.

use crate::models::{ImageRecord, LabeledRecord};

pub const NORMAL: &str = "NORMAL";
pub const PNEUMONIA: &str = "PNEUMONIA";
pub const DEFAULT_CATEGORIES: [&str; 2] = [NORMAL, PNEUMONIA];

/// Returns the category named by a directory component of `path`, or an empty
/// string if there is none.
///
/// A component only counts when it is delimited by separators on both sides, so
/// the file name never matches and neither does a leading relative component.
/// When several components match, the one closest to the file wins.
/// Backslashes are treated as separators.
pub fn extract_label<S: AsRef<str>>(path: &str, categories: &[S]) -> String
{
    let normalized = path.replace('\\', "/");
    let components: Vec<&str> = normalized.split('/').collect();
    if components.len() < 3 {
        return String::new();
    }

    components[1..components.len() - 1]
        .iter()
        .rev()
        .find(|component| categories.iter().any(|category| category.as_ref() == **component))
        .map(|component| component.to_string())
        .unwrap_or_default()
}

pub fn label_records<S: AsRef<str>>(records: Vec<ImageRecord>, categories: &[S]) -> Vec<LabeledRecord>
{
    records.into_iter().map(|record| {
        let label_string = extract_label(&record.path, categories);
        LabeledRecord { record, label_string }
    }).collect()
}
