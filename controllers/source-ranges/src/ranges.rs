//! Source range comparison.
//!
//! Both sides are treated as plain sets of strings: ordering and duplicate
//! entries never count as a difference.

use std::collections::{BTreeMap, BTreeSet};

/// Result of comparing the declared ranges against a Service's allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeDiff {
    /// Same set on both sides
    InSync,
    /// The allow-list must be replaced with this list (deduplicated, sorted)
    Replace(Vec<String>),
}

/// Desired allow-list: the distinct values of a ConfigMap's data. Keys are ignored.
pub fn desired_ranges(data: &BTreeMap<String, String>) -> BTreeSet<&str> {
    data.values().map(String::as_str).collect()
}

/// Compares the declared ConfigMap data with the current allow-list.
pub fn compare(data: &BTreeMap<String, String>, current: &[String]) -> RangeDiff {
    let desired = desired_ranges(data);
    let current: BTreeSet<&str> = current.iter().map(String::as_str).collect();

    if desired.symmetric_difference(&current).next().is_none() {
        RangeDiff::InSync
    } else {
        RangeDiff::Replace(desired.into_iter().map(str::to_string).collect())
    }
}
