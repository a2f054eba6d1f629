//! Maps label strings to integer class indices.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::models::{IndexedRecord, LabeledRecord};

/// Label strings sorted ascending and numbered 0..K-1.
/// Fitting on the same set of labels always gives the same numbering,
/// whatever order the labels were seen in.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelIndex
{
    labels: Vec<String>,
    lookup: FxHashMap<String, usize>,
}

impl LabelIndex
{
    pub fn fit<I, S>(labels: I) -> LabelIndex
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = labels.into_iter().map(|l| l.as_ref().to_string()).collect();
        Self::from_sorted(distinct.into_iter().collect())
    }

    pub fn fit_records(records: &[LabeledRecord]) -> LabelIndex
    {
        Self::fit(records.iter().map(|r| r.label_string.as_str()))
    }

    fn from_sorted(labels: Vec<String>) -> LabelIndex
    {
        let lookup = labels
            .iter()
            .enumerate()
            .map(|(index, label)| (label.clone(), index))
            .collect::<FxHashMap<String, usize>>();
        LabelIndex { labels, lookup }
    }

    pub fn index_of(&self, label: &str) -> Result<usize>
    {
        self.lookup.get(label).copied().ok_or_else(|| Error::UnseenLabel(label.to_string()))
    }

    pub fn label_of(&self, index: usize) -> Option<&str>
    {
        self.labels.get(index).map(|l| l.as_str())
    }

    pub fn labels(&self) -> &[String]
    {
        &self.labels
    }

    pub fn len(&self) -> usize
    {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.labels.is_empty()
    }

    pub fn transform(&self, records: Vec<LabeledRecord>) -> Result<Vec<IndexedRecord>>
    {
        records.into_iter().map(|labeled| -> Result<IndexedRecord> {
            let label = self.index_of(&labeled.label_string)?;
            Ok(IndexedRecord
            {
                record: labeled.record,
                label_string: labeled.label_string,
                label,
            })
        }).collect()
    }
}
