use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Tag carried by every failed agent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ValidationError,
    DatabaseError,
    ExportError,
    GenerationError,
    FileError,
    InvalidArguments,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ValidationError => "validation_error",
            FailureKind::DatabaseError => "database_error",
            FailureKind::ExportError => "export_error",
            FailureKind::GenerationError => "generation_error",
            FailureKind::FileError => "file_error",
            FailureKind::InvalidArguments => "invalid_arguments",
        }
    }
}

/// Result of one agent call. Serialises flat, the shape callers of the
/// platform already expect:
/// `{"success": true, "message": .., ..payload}` or
/// `{"success": false, "error": "<kind>", "message": ..}`.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    Success {
        message: String,
        payload: Map<String, Value>,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
}

impl AgentOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        AgentOutcome::Success {
            message: message.into(),
            payload: Map::new(),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        AgentOutcome::Failure {
            kind,
            message: message.into(),
        }
    }

    /// Attach a payload field. No-op on failures.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let AgentOutcome::Success { payload, .. } = &mut self {
            payload.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AgentOutcome::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            AgentOutcome::Success { message, .. } | AgentOutcome::Failure { message, .. } => message,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            AgentOutcome::Failure { kind, .. } => Some(*kind),
            AgentOutcome::Success { .. } => None,
        }
    }

    pub fn payload(&self, key: &str) -> Option<&Value> {
        match self {
            AgentOutcome::Success { payload, .. } => payload.get(key),
            AgentOutcome::Failure { .. } => None,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        match self {
            AgentOutcome::Success { message, payload } => {
                object.insert("success".to_string(), Value::Bool(true));
                object.insert("message".to_string(), Value::String(message.clone()));
                for (key, value) in payload {
                    object.insert(key.clone(), value.clone());
                }
            }
            AgentOutcome::Failure { kind, message } => {
                object.insert("success".to_string(), Value::Bool(false));
                object.insert("error".to_string(), Value::String(kind.as_str().to_string()));
                object.insert("message".to_string(), Value::String(message.clone()));
            }
        }
        Value::Object(object)
    }
}

impl Serialize for AgentOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Per-call context handed to agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    #[serde(default)]
    pub agent_uuid: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub request_id: String,
}

impl AgentContext {
    pub fn new(session_id: Option<String>) -> Self {
        Self {
            agent_uuid: None,
            session_id,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_agent_uuid(mut self, agent_uuid: impl Into<String>) -> Self {
        self.agent_uuid = Some(agent_uuid.into());
        self
    }
}

impl Default for AgentContext {
    fn default() -> Self {
        Self::new(None)
    }
}
