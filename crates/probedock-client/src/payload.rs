//! Wire payloads sent to the collector.
//!
//! Two shapes exist, selected by the server's protocol version:
//!
//! - version 1: `{ "projectId", "version", "duration", "results", "reports"? }`
//! - version 0: `{ "r": [ { "p", "v", "d", "r", "u"? } ] }` with single-letter
//!   result fields, for collectors that expect a batch of runs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::{Freshness, PayloadCache};
use crate::result::TestResult;
use crate::run::TestRun;

/// Payload protocol version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ProtocolVersion {
    /// Legacy batch envelope.
    V0,
    #[default]
    V1,
}

impl From<ProtocolVersion> for u8 {
    fn from(version: ProtocolVersion) -> Self {
        match version {
            ProtocolVersion::V0 => 0,
            ProtocolVersion::V1 => 1,
        }
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::V0),
            1 => Ok(Self::V1),
            other => Err(format!("unsupported protocol version {other}")),
        }
    }
}

/// Serialization options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadOptions<'a> {
    pub version: ProtocolVersion,
    /// Cache used to omit descriptive fields the collector already has.
    pub cache: Option<&'a PayloadCache>,
}

/// A serialized test run, ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    V1(RunPayload),
    V0(BatchPayload),
}

impl Payload {
    pub fn version(&self) -> ProtocolVersion {
        match self {
            Self::V1(_) => ProtocolVersion::V1,
            Self::V0(_) => ProtocolVersion::V0,
        }
    }

    /// Compact JSON, as sent over the wire and saved to disk.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Version 1 run payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPayload {
    pub project_id: String,
    pub version: String,
    pub duration: u64,
    pub results: Vec<ResultPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reports: Option<Vec<ReportRef>>,
}

/// Report descriptor grouping payloads sharing a correlation uid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRef {
    pub uid: String,
}

/// Version 1 result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub passed: bool,
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

/// Version 0 envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPayload {
    #[serde(rename = "r")]
    pub runs: Vec<CompactRun>,
}

/// Version 0 run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactRun {
    #[serde(rename = "p")]
    pub project_id: String,
    #[serde(rename = "v")]
    pub version: String,
    #[serde(rename = "d")]
    pub duration: u64,
    #[serde(rename = "r")]
    pub results: Vec<CompactResult>,
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// Version 0 result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactResult {
    #[serde(rename = "k", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "p")]
    pub passed: bool,
    #[serde(rename = "d")]
    pub duration: u64,
    #[serde(rename = "m", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "g", default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub tickets: Option<Vec<String>>,
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl From<ResultPayload> for CompactResult {
    fn from(r: ResultPayload) -> Self {
        Self {
            key: r.key,
            passed: r.passed,
            duration: r.duration,
            message: r.message,
            name: r.name,
            category: r.category,
            tags: r.tags,
            tickets: r.tickets,
            data: r.data,
        }
    }
}

/// Serialize one result.
///
/// Descriptive fields are left out when the cache says the collector
/// already holds them unchanged. Empty tag/ticket lists and empty custom
/// data are only sent when the result is stale, to clear old values.
pub fn encode_result(result: &TestResult, cache: Option<&PayloadCache>) -> ResultPayload {
    let freshness = Freshness::of(cache, result);
    let describe = freshness.needs_description();
    let stale = freshness == Freshness::Stale;

    let list = |items: &[String]| {
        (describe && (stale || !items.is_empty())).then(|| items.to_vec())
    };

    ResultPayload {
        key: result.key().map(str::to_string),
        passed: result.passed(),
        duration: result.duration(),
        message: result.message().map(str::to_string),
        name: describe.then(|| result.name().to_string()),
        category: result.category().filter(|_| describe).map(str::to_string),
        tags: list(result.tags()),
        tickets: list(result.tickets()),
        data: (describe && !result.data().is_empty()).then(|| result.data().clone()),
    }
}

/// Serialize a run. The project is assumed to be valid.
pub(crate) fn encode(run: &TestRun, options: &PayloadOptions<'_>) -> Payload {
    let project = run.project();
    let project_id = project.api_id.clone().unwrap_or_default();
    let version = project.version.clone().unwrap_or_default();
    let results = run
        .results()
        .iter()
        .map(|r| encode_result(r, options.cache));

    match options.version {
        ProtocolVersion::V1 => Payload::V1(RunPayload {
            project_id,
            version,
            duration: run.duration(),
            results: results.collect(),
            reports: run.uid().map(|uid| {
                vec![ReportRef {
                    uid: uid.to_string(),
                }]
            }),
        }),
        ProtocolVersion::V0 => Payload::V0(BatchPayload {
            runs: vec![CompactRun {
                project_id,
                version,
                duration: run.duration(),
                results: results.map(CompactResult::from).collect(),
                uid: run.uid().map(str::to_string),
            }],
        }),
    }
}
