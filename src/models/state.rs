use crate::error::{OrchestrationError, OrchestrationResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Numeric state codes shared by activation statuses, stage outputs and remote agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    Ok,
    Accepted,
    BadRequest,
    Unauthorized,
    NotFound,
    MethodNotAllowed,
    Conflict,
    InternalError,
    BadConfig,
    MissingConfig,
    InvalidArgument,
    SerializationError,
    DeserializeError,
    UpdateFailed,
    DeleteFailed,
    ValidateFailed,
    Updated,
    Deleted,
    Running,
    Paused,
    Done,
    Delayed,
    #[default]
    Untouched,
    NotImplemented,
}

const ALL_STATES: [State; 24] = [
    State::Ok,
    State::Accepted,
    State::BadRequest,
    State::Unauthorized,
    State::NotFound,
    State::MethodNotAllowed,
    State::Conflict,
    State::InternalError,
    State::BadConfig,
    State::MissingConfig,
    State::InvalidArgument,
    State::SerializationError,
    State::DeserializeError,
    State::UpdateFailed,
    State::DeleteFailed,
    State::ValidateFailed,
    State::Updated,
    State::Deleted,
    State::Running,
    State::Paused,
    State::Done,
    State::Delayed,
    State::Untouched,
    State::NotImplemented,
];

impl State {
    pub fn code(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Accepted => 202,
            Self::BadRequest => 400,
            Self::Unauthorized => 403,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::Conflict => 409,
            Self::InternalError => 500,
            Self::BadConfig => 1000,
            Self::MissingConfig => 1001,
            Self::InvalidArgument => 2000,
            Self::SerializationError => 5000,
            Self::DeserializeError => 5001,
            Self::UpdateFailed => 8001,
            Self::DeleteFailed => 8002,
            Self::ValidateFailed => 8003,
            Self::Updated => 8004,
            Self::Deleted => 8005,
            Self::Running => 9994,
            Self::Paused => 9995,
            Self::Done => 9996,
            Self::Delayed => 9997,
            Self::Untouched => 9998,
            Self::NotImplemented => 9999,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        ALL_STATES.iter().copied().find(|s| i64::from(s.code()) == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Accepted => "Accepted",
            Self::BadRequest => "BadRequest",
            Self::Unauthorized => "Unauthorized",
            Self::NotFound => "NotFound",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::Conflict => "Conflict",
            Self::InternalError => "InternalError",
            Self::BadConfig => "BadConfig",
            Self::MissingConfig => "MissingConfig",
            Self::InvalidArgument => "InvalidArgument",
            Self::SerializationError => "SerializationError",
            Self::DeserializeError => "DeserializeError",
            Self::UpdateFailed => "UpdateFailed",
            Self::DeleteFailed => "DeleteFailed",
            Self::ValidateFailed => "ValidateFailed",
            Self::Updated => "Updated",
            Self::Deleted => "Deleted",
            Self::Running => "Running",
            Self::Paused => "Paused",
            Self::Done => "Done",
            Self::Delayed => "Delayed",
            Self::Untouched => "Untouched",
            Self::NotImplemented => "NotImplemented",
        }
    }

    /// Every known state, in code order
    pub fn all() -> &'static [State] {
        &ALL_STATES
    }

    /// Normalize a reserved `__status` value.
    ///
    /// Accepts a JSON number, a numeric string (`"500"`), or a state name
    /// (`"InternalError"`, case-insensitive). Anything else is a parse failure.
    pub fn normalize(value: &Value) -> OrchestrationResult<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .and_then(Self::from_code)
                .ok_or_else(|| {
                    OrchestrationError::Serialization(format!("unknown state code {n}"))
                }),
            Value::String(s) => {
                let trimmed = s.trim();
                if let Ok(code) = trimmed.parse::<i64>() {
                    return Self::from_code(code).ok_or_else(|| {
                        OrchestrationError::Serialization(format!("unknown state code {code}"))
                    });
                }
                ALL_STATES
                    .iter()
                    .copied()
                    .find(|state| state.name().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| {
                        OrchestrationError::Serialization(format!(
                            "'{s}' is not a valid state"
                        ))
                    })
            }
            other => Err(OrchestrationError::Serialization(format!(
                "state must be a number or string, got {other}"
            ))),
        }
    }

    /// Success codes: the stage ran (or was accepted) without error
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            Self::Ok | Self::Accepted | Self::Updated | Self::Deleted | Self::Done | Self::Running
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused | Self::Delayed)
    }

    /// Whether an activation in this state is still being driven by the engine
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<State> for Value {
    fn from(state: State) -> Self {
        Value::from(state.code())
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        State::normalize(&value).map_err(serde::de::Error::custom)
    }
}
