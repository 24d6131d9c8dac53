use chrono::{DateTime, TimeZone, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::store::{Document, StoredDocument, CREATED_AT_FIELD, UPDATED_AT_FIELD};

pub const STATUS_FIELD: &str = "status";
pub const INPUT_TEXT_FIELD: &str = "nlpInputText";
/// Older documents carry the request text under this name.
pub const LEGACY_INPUT_TEXT_FIELD: &str = "inputText";
pub const SIMULATION_CONFIG_FIELD: &str = "simulationConfig";
pub const IDF_FILE_PATH_FIELD: &str = "idfFilePath";
pub const WEATHER_FILE_PATH_FIELD: &str = "weatherFilePath";
pub const RESULT_PATH_FIELD: &str = "resultPath";
pub const ERROR_MESSAGE_FIELD: &str = "errorMessage";

/// Fields owned by the external processor; null until it sets them.
pub const PROCESSOR_FIELDS: [&str; 4] = [
    IDF_FILE_PATH_FIELD,
    WEATHER_FILE_PATH_FIELD,
    RESULT_PATH_FIELD,
    ERROR_MESSAGE_FIELD,
];

/// Lifecycle state of a job. Only `Queued` is ever written by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Pending,
    Running,
    Done,
    Error,
    /// A status this client does not know, kept verbatim.
    Other(String),
}

impl JobStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "queued" => JobStatus::Queued,
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "done" => JobStatus::Done,
            "error" => JobStatus::Error,
            other => JobStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
            JobStatus::Other(s) => s,
        }
    }

    /// Neither done nor failed.
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A job as observed in the store. Every field except the id may be absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub input_text: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub simulation_config: Value,
    pub idf_file_path: Option<String>,
    pub weather_file_path: Option<String>,
    pub result_path: Option<String>,
    pub error_message: Option<String>,
}

impl Job {
    /// Builds a job from a stored document. Malformed fields are logged and
    /// treated as absent; this never fails.
    pub fn from_document(doc: &StoredDocument) -> Self {
        let id = doc.id.as_str();
        let status = match doc.field(STATUS_FIELD) {
            Some(Value::String(s)) => JobStatus::parse(s),
            None | Some(Value::Null) => JobStatus::Other("unknown".to_string()),
            Some(other) => {
                log::warn!("Job {} has a non-string status: {}", id, other);
                JobStatus::Other(other.to_string())
            }
        };

        let input_text = string_field(doc, INPUT_TEXT_FIELD)
            .or_else(|| string_field(doc, LEGACY_INPUT_TEXT_FIELD));

        Self {
            id: id.to_string(),
            status,
            input_text,
            created_at: timestamp_field(doc, CREATED_AT_FIELD),
            updated_at: timestamp_field(doc, UPDATED_AT_FIELD),
            simulation_config: doc
                .field(SIMULATION_CONFIG_FIELD)
                .cloned()
                .unwrap_or(Value::Null),
            idf_file_path: string_field(doc, IDF_FILE_PATH_FIELD),
            weather_file_path: string_field(doc, WEATHER_FILE_PATH_FIELD),
            result_path: string_field(doc, RESULT_PATH_FIELD),
            error_message: string_field(doc, ERROR_MESSAGE_FIELD),
        }
    }
}

fn string_field(doc: &StoredDocument, name: &str) -> Option<String> {
    match doc.field(name)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn timestamp_field(doc: &StoredDocument, name: &str) -> Option<DateTime<Utc>> {
    let value = doc.field(name)?;
    let parsed = parse_timestamp(value);
    if parsed.is_none() && !value.is_null() {
        log::warn!("Job {}: unreadable {} value {}", doc.id, name, value);
    }
    parsed
}

/// Parses an RFC 3339 string or a `{seconds, nanoseconds}` object, the two
/// shapes server timestamps arrive in.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, u32::try_from(nanos).ok()?).single()
        }
        _ => None,
    }
}

/// A job about to be written by the submitter.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub input_text: String,
    pub simulation_config: Value,
}

impl NewJob {
    pub fn new(input_text: impl Into<String>, simulation_config: Value) -> Self {
        Self {
            input_text: input_text.into(),
            simulation_config,
        }
    }

    /// Document body: `status = queued`, processor fields explicitly null.
    /// `createdAt`/`updatedAt` are left to the store.
    pub fn to_document(&self) -> Document {
        let mut doc = Map::new();
        doc.insert(STATUS_FIELD.to_string(), Value::String("queued".to_string()));
        doc.insert(
            INPUT_TEXT_FIELD.to_string(),
            Value::String(self.input_text.clone()),
        );
        doc.insert(
            SIMULATION_CONFIG_FIELD.to_string(),
            self.simulation_config.clone(),
        );
        for field in PROCESSOR_FIELDS {
            doc.insert(field.to_string(), Value::Null);
        }
        doc
    }
}
