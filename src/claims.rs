//! Token payload decoding and the claim-derived views exposed to pages.
//!
//! Tokens are read as they come back from the token endpoint; the payload is
//! decoded but the signature is not checked here.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::KindeError;

pub const FEATURE_FLAGS_CLAIM: &str = "feature_flags";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenClaims(Map<String, Value>);

impl TokenClaims {
    pub fn decode(token: &str) -> Result<Self, KindeError> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_)) if segments.next().is_none() => payload,
            _ => {
                return Err(KindeError::MalformedToken {
                    message: "expected three dot-separated segments".to_string(),
                });
            }
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|err| KindeError::MalformedToken {
                message: err.to_string(),
            })?;

        match serde_json::from_slice(&bytes) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Err(KindeError::MalformedToken {
                message: "payload is not a json object".to_string(),
            }),
            Err(err) => Err(KindeError::MalformedToken {
                message: err.to_string(),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn strings(&self, name: &str) -> Vec<String> {
        match self.0.get(name) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.0.get("exp").and_then(Value::as_i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenKind {
    #[default]
    Access,
    Id,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Claim {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub org_code: Option<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionCheck {
    pub org_code: Option<String>,
    pub is_granted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organization {
    pub org_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserOrganizations {
    pub org_codes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    Boolean,
    String,
    Integer,
}

impl FlagKind {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "b" => Some(Self::Boolean),
            "s" => Some(Self::String),
            "i" => Some(Self::Integer),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Integer => "integer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Str(String),
    Int(i64),
}

impl FlagValue {
    pub fn kind(&self) -> FlagKind {
        match self {
            Self::Bool(_) => FlagKind::Boolean,
            Self::Str(_) => FlagKind::String,
            Self::Int(_) => FlagKind::Integer,
        }
    }

    fn from_json(kind: FlagKind, value: &Value) -> Option<Self> {
        match kind {
            FlagKind::Boolean => value.as_bool().map(Self::Bool),
            FlagKind::String => value.as_str().map(|v| Self::Str(v.to_string())),
            FlagKind::Integer => value.as_i64().map(Self::Int),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureFlag {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: FlagKind,
    pub value: FlagValue,
    pub is_default: bool,
}

/// Looks a flag up in the `feature_flags` claim, falling back to `default`
/// when the provider did not send it.
pub fn resolve_flag(
    claims: &TokenClaims,
    code: &str,
    default: Option<FlagValue>,
    expected: Option<FlagKind>,
) -> Result<FeatureFlag, KindeError> {
    let flags = match claims.get(FEATURE_FLAGS_CLAIM) {
        None | Some(Value::Null) => None,
        Some(Value::Object(flags)) => Some(flags),
        Some(_) => {
            return Err(KindeError::InvalidClaim {
                name: FEATURE_FLAGS_CLAIM.to_string(),
                message: "expected an object".to_string(),
            });
        }
    };

    let Some(entry) = flags.and_then(|flags| flags.get(code)) else {
        let value = default.ok_or_else(|| KindeError::FlagNotFound(code.to_string()))?;
        return Ok(FeatureFlag {
            code: code.to_string(),
            kind: value.kind(),
            value,
            is_default: true,
        });
    };

    let invalid = |message: &str| KindeError::InvalidClaim {
        name: format!("{FEATURE_FLAGS_CLAIM}.{code}"),
        message: message.to_string(),
    };

    let kind = entry
        .get("t")
        .and_then(Value::as_str)
        .and_then(FlagKind::from_code)
        .ok_or_else(|| invalid("unknown flag type"))?;

    if let Some(expected) = expected {
        if expected != kind {
            return Err(KindeError::FlagTypeMismatch {
                code: code.to_string(),
                expected: expected.as_str().to_string(),
                actual: kind.as_str().to_string(),
            });
        }
    }

    let value = entry
        .get("v")
        .and_then(|value| FlagValue::from_json(kind, value))
        .ok_or_else(|| invalid("value does not match flag type"))?;

    Ok(FeatureFlag {
        code: code.to_string(),
        kind,
        value,
        is_default: false,
    })
}
