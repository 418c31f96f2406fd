// Score aggregation — group normalized per-document scores by date,
// organisation, or dominant topic and average within each group.
//
// Per-document normalization happens before averaging; documents whose
// group had zero mass carry NaN and are excluded from that group's mean,
// never zero-filled. Because a zero-mass group NaNs all its members at
// once, the averaged scores still sum to 1 within each group.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::corpus::document::Document;
use crate::sentiment::lexicon::Category;
use crate::sentiment::scorer::ScoreRecord;
use crate::topics::model::TopicModel;

/// What a score bucket is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum GroupKey {
    Date(NaiveDate),
    Organisation(String),
    Topic(usize),
}

impl GroupKey {
    pub fn label(&self) -> String {
        match self {
            GroupKey::Date(d) => d.to_string(),
            GroupKey::Organisation(o) => o.clone(),
            GroupKey::Topic(t) => format!("topic {t}"),
        }
    }
}

/// One key per document, by publication date.
pub fn keys_by_date(documents: &[Document]) -> Vec<GroupKey> {
    documents.iter().map(|d| GroupKey::Date(d.date)).collect()
}

/// One key per document, by organisation.
pub fn keys_by_organisation(documents: &[Document]) -> Vec<GroupKey> {
    documents
        .iter()
        .map(|d| GroupKey::Organisation(d.organisation.clone()))
        .collect()
}

/// One key per document, by its dominant topic (row argmax, ties to the
/// lowest topic index).
pub fn keys_by_dominant_topic(model: &TopicModel) -> Vec<GroupKey> {
    model
        .dominant_topics()
        .into_iter()
        .map(GroupKey::Topic)
        .collect()
}

/// Average per-document records within each group, excluding NaN scores
/// from the means. Returns buckets in key order.
pub fn aggregate(records: &[ScoreRecord], keys: &[GroupKey]) -> Vec<(GroupKey, ScoreRecord)> {
    let mut groups: BTreeMap<&GroupKey, Vec<&ScoreRecord>> = BTreeMap::new();
    for (record, key) in records.iter().zip(keys) {
        groups.entry(key).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut means: BTreeMap<Category, f64> = BTreeMap::new();
            for category in Category::ALL {
                let values: Vec<f64> = members
                    .iter()
                    .map(|r| r.get(category))
                    .filter(|v| v.is_finite())
                    .collect();
                let mean = if values.is_empty() {
                    f64::NAN
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                };
                means.insert(category, mean);
            }
            (key.clone(), ScoreRecord::from_normalized(means))
        })
        .collect()
}
