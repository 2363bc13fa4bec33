use chrono::Utc;

use crate::claims::{
    Claim, FeatureFlag, FlagKind, FlagValue, Organization, PermissionCheck, Permissions,
    TokenClaims, TokenKind, UserOrganizations, resolve_flag,
};
use crate::{KindeError, TokenResponse, UserProfile};

#[derive(Debug, Clone)]
pub struct KindeClient {
    user_id: String,
    tokens: TokenResponse,
    access: TokenClaims,
    id: TokenClaims,
    expires_at: Option<i64>,
}

impl KindeClient {
    pub fn from_tokens(tokens: TokenResponse) -> Result<Self, KindeError> {
        Self::from_tokens_at(tokens, Utc::now().timestamp())
    }

    /// `now` anchors `expires_in` when the access token carries no `exp`.
    pub fn from_tokens_at(tokens: TokenResponse, now: i64) -> Result<Self, KindeError> {
        let access = TokenClaims::decode(&tokens.access_token)?;
        let id = match tokens.id_token.as_deref() {
            Some(token) => TokenClaims::decode(token)?,
            None => TokenClaims::default(),
        };

        let user_id = id
            .string("sub")
            .or_else(|| access.string("sub"))
            .ok_or_else(|| KindeError::MissingClaim("sub".to_string()))?
            .to_string();

        let expires_at = access.expires_at().or_else(|| {
            tokens
                .expires_in
                .and_then(|secs| i64::try_from(secs).ok())
                .map(|secs| now.saturating_add(secs))
        });

        Ok(Self {
            user_id,
            tokens,
            access,
            id,
            expires_at,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn tokens(&self) -> &TokenResponse {
        &self.tokens
    }

    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.refresh_token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now().timestamp())
    }

    pub fn is_authenticated_at(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }

    pub fn user_details(&self) -> UserProfile {
        let read = |name: &str| {
            self.id
                .string(name)
                .or_else(|| self.access.string(name))
                .map(str::to_string)
        };
        UserProfile {
            id: self.user_id.clone(),
            given_name: read("given_name"),
            family_name: read("family_name"),
            email: read("email"),
            picture: read("picture"),
        }
    }

    pub fn claim(&self, name: &str, token: TokenKind) -> Claim {
        let claims = match token {
            TokenKind::Access => &self.access,
            TokenKind::Id => &self.id,
        };
        Claim {
            name: name.to_string(),
            value: claims.get(name).cloned().unwrap_or_default(),
        }
    }

    pub fn permissions(&self) -> Permissions {
        Permissions {
            org_code: self.access.string("org_code").map(str::to_string),
            permissions: self.access.strings("permissions"),
        }
    }

    pub fn permission(&self, name: &str) -> PermissionCheck {
        let Permissions {
            org_code,
            permissions,
        } = self.permissions();
        PermissionCheck {
            org_code,
            is_granted: permissions.iter().any(|permission| permission == name),
        }
    }

    pub fn organization(&self) -> Organization {
        Organization {
            org_code: self.access.string("org_code").map(str::to_string),
        }
    }

    pub fn user_organizations(&self) -> UserOrganizations {
        UserOrganizations {
            org_codes: self.id.strings("org_codes"),
        }
    }

    pub fn flag(
        &self,
        code: &str,
        default: Option<FlagValue>,
        expected: Option<FlagKind>,
    ) -> Result<FeatureFlag, KindeError> {
        resolve_flag(&self.access, code, default, expected)
    }

    pub fn boolean_flag(&self, code: &str, default: bool) -> Result<bool, KindeError> {
        match self.flag(code, Some(default.into()), Some(FlagKind::Boolean))?.value {
            FlagValue::Bool(value) => Ok(value),
            other => Err(mismatch(code, FlagKind::Boolean, other.kind())),
        }
    }

    pub fn string_flag(&self, code: &str, default: &str) -> Result<String, KindeError> {
        match self.flag(code, Some(default.into()), Some(FlagKind::String))?.value {
            FlagValue::Str(value) => Ok(value),
            other => Err(mismatch(code, FlagKind::String, other.kind())),
        }
    }

    pub fn integer_flag(&self, code: &str, default: i64) -> Result<i64, KindeError> {
        match self.flag(code, Some(default.into()), Some(FlagKind::Integer))?.value {
            FlagValue::Int(value) => Ok(value),
            other => Err(mismatch(code, FlagKind::Integer, other.kind())),
        }
    }
}

fn mismatch(code: &str, expected: FlagKind, actual: FlagKind) -> KindeError {
    KindeError::FlagTypeMismatch {
        code: code.to_string(),
        expected: expected.as_str().to_string(),
        actual: actual.as_str().to_string(),
    }
}
