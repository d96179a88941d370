//! Logical identity of a completed test, derived from its metadata chain.

use serde_json::{Map, Value};
use sha1::{Digest, Sha1};

use crate::meta::Holder;
use crate::project::ProjectProfile;

/// Custom data field carrying the fingerprint for older collectors.
pub const FINGERPRINT_DATA_FIELD: &str = "fingerprint";

const FINGERPRINT_DELIMITER: &str = "|||";

/// Identity of a test: what it is, independently of how it went.
#[derive(Debug, Clone, PartialEq)]
pub struct TestIdentity {
    pub key: Option<String>,
    pub fingerprint: String,
    pub name: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub tickets: Vec<String>,
    pub data: Map<String, Value>,
    pub grouped: bool,
}

impl TestIdentity {
    /// Derive the identity of `test`, enclosed by `groups` (outermost first).
    pub fn extract(project: &ProjectProfile, groups: &[Holder], test: &Holder) -> Self {
        let grouped = extract_grouped(groups);
        let parts = name_parts(groups, test, grouped);

        let name = parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let fingerprint = fingerprint(&parts);

        let mut data = test.meta.data.clone();
        data.insert(
            FINGERPRINT_DATA_FIELD.to_string(),
            Value::String(fingerprint.clone()),
        );

        Self {
            key: extract_key(groups, test),
            fingerprint,
            name,
            category: extract_category(project, groups, test),
            tags: merge_lists(
                &project.tags,
                chain(groups, test).map(|h| h.meta.tags.as_slice()),
            ),
            tickets: merge_lists(
                &project.tickets,
                chain(groups, test).map(|h| h.meta.tickets.as_slice()),
            ),
            data,
            grouped,
        }
    }
}

/// SHA-1 over the ordered name parts, joined with an unambiguous delimiter.
pub fn fingerprint<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(FINGERPRINT_DELIMITER);
    hex::encode(Sha1::digest(joined.as_bytes()))
}

fn chain<'a>(groups: &'a [Holder], test: &'a Holder) -> impl Iterator<Item = &'a Holder> {
    groups.iter().chain(std::iter::once(test))
}

/// The last group that declares `grouped` decides.
fn extract_grouped(groups: &[Holder]) -> bool {
    groups
        .iter()
        .filter_map(|g| g.meta.grouped)
        .last()
        .unwrap_or(false)
}

/// Innermost non-blank key; the test's own key wins over its ancestors'.
fn extract_key(groups: &[Holder], test: &Holder) -> Option<String> {
    chain(groups, test)
        .filter_map(|h| h.meta.key.as_deref())
        .filter(|k| !k.trim().is_empty())
        .last()
        .map(str::to_string)
}

fn extract_category(project: &ProjectProfile, groups: &[Holder], test: &Holder) -> Option<String> {
    chain(groups, test)
        .filter_map(|h| h.meta.category.clone())
        .last()
        .or_else(|| project.category.clone())
}

fn name_parts<'a>(groups: &'a [Holder], test: &'a Holder, grouped: bool) -> Vec<&'a str> {
    if grouped {
        // grouped implies at least one group carries the flag
        let end = groups
            .iter()
            .position(|g| g.meta.grouped == Some(true))
            .map_or(groups.len(), |i| i + 1);
        groups[..end].iter().map(|g| g.description.as_str()).collect()
    } else {
        chain(groups, test).map(|h| h.description.as_str()).collect()
    }
}

fn merge_lists<'a>(defaults: &'a [String], lists: impl Iterator<Item = &'a [String]>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for item in defaults.iter().chain(lists.flatten()) {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}
