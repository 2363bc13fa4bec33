use thiserror::Error;

#[derive(Debug, Error)]
pub enum KindeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("os rng error: {message}")]
    OsRng { message: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String, body: String },

    #[error("missing authorization code in callback url")]
    MissingAuthorizationCode,

    #[error("authorization failed: {error}")]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    #[error("no login in progress for this session")]
    NoPendingLogin,

    #[error("state mismatch (expected={expected}, received={received})")]
    StateMismatch { expected: String, received: String },

    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("missing configuration: {}", names.join(", "))]
    MissingConfig { names: Vec<String> },

    #[error("invalid configuration {name}: {message}")]
    InvalidConfig { name: String, message: String },

    #[error("malformed token: {message}")]
    MalformedToken { message: String },

    #[error("missing claim: {0}")]
    MissingClaim(String),

    #[error("invalid claim {name}: {message}")]
    InvalidClaim { name: String, message: String },

    #[error("flag not found: {0}")]
    FlagNotFound(String),

    #[error("flag {code} is {actual}, expected {expected}")]
    FlagTypeMismatch {
        code: String,
        expected: String,
        actual: String,
    },

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}
