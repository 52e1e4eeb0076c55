use std::collections::{BTreeSet, HashSet};

use crate::errors::RecorderError;

pub const DEFAULT_EXCLUDED_TOPICS: [&str; 3] = ["/rosout", "/rosout_agg", "/parameter_events"];

/// Normalizes raw discovery output into the sorted, de-duplicated topic list
/// shown in the picker.
pub fn build<I, S>(raw_topics: I, excluded: &HashSet<String>) -> Result<Vec<String>, RecorderError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let topics: BTreeSet<String> = raw_topics
        .into_iter()
        .map(|raw| raw.as_ref().trim().to_string())
        .filter(|topic| !topic.is_empty() && !excluded.contains(topic))
        .collect();

    if topics.is_empty() {
        return Err(RecorderError::NoTopics);
    }

    Ok(topics.into_iter().collect())
}

pub fn default_exclusions() -> HashSet<String> {
    DEFAULT_EXCLUDED_TOPICS
        .iter()
        .map(|topic| topic.to_string())
        .collect()
}
