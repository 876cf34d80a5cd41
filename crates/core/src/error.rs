use thiserror::Error;

/// Authentication subsystem error types.
///
/// Every fallible operation returns one of these named outcomes; expected
/// failures (bad credentials, quota hits, missing invitations) are variants,
/// not panics or opaque strings. Each variant maps to an HTTP status code
/// via [`AuthError::status_code`] and a stable wire code via
/// [`AuthError::code`] for the routing layer to translate.
#[derive(Error, Debug)]
pub enum AuthError {
    // --- 400 Bad Request ---
    #[error("{0}")]
    BadRequest(String),

    #[error("Cannot remove the last owner or admin of an organization")]
    LastAdmin,

    #[error("Cannot leave or be removed from a personal organization")]
    CannotLeavePersonalOrg,

    #[error("User has no organization memberships")]
    NoMemberships,

    #[error("Invitation has expired")]
    InvitationExpired,

    #[error("Invitation is restricted to a different email address")]
    InvitationEmailMismatch,

    #[error("This operation requires a session-authenticated request")]
    RequiresSession,

    // --- 401 Unauthorized ---
    #[error("Malformed bearer token")]
    InvalidTokenFormat,

    #[error("Unknown bearer token")]
    TokenNotFound,

    #[error("Bearer token secret does not match")]
    TokenSecretMismatch,

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or tampered challenge")]
    ChallengeInvalid,

    #[error("Challenge has expired")]
    ChallengeExpired,

    #[error("Signature counter did not increase")]
    CounterNotIncreased,

    #[error("Authentication required")]
    Unauthenticated,

    // --- 403 Forbidden ---
    #[error("{0}")]
    Forbidden(String),

    #[error("Not a member of this organization")]
    NotAMember,

    // --- 404 Not Found ---
    #[error("User not found")]
    UserNotFound,

    #[error("Invitation not found")]
    InvitationNotFound,

    #[error("Passkey credential not found")]
    CredentialNotFound,

    #[error("{0}")]
    NotFound(String),

    // --- 409 Conflict ---
    #[error("Token limit reached ({limit} active tokens per organization)")]
    TokenLimitReached { limit: usize },

    #[error("Email is already registered")]
    EmailAlreadyRegistered,

    #[error("Invitation has already been accepted")]
    InvitationAlreadyAccepted,

    #[error("Cannot delete the last passkey credential")]
    CannotDeleteLastPasskey,

    #[error("{0}")]
    Conflict(String),

    // --- 500 Internal Server Error ---
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Secret hashing error: {0}")]
    SecretHash(String),
}

impl AuthError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            // 400
            Self::BadRequest(_)
            | Self::LastAdmin
            | Self::CannotLeavePersonalOrg
            | Self::NoMemberships
            | Self::InvitationExpired
            | Self::InvitationEmailMismatch
            | Self::RequiresSession => 400,
            // 401
            Self::InvalidTokenFormat
            | Self::TokenNotFound
            | Self::TokenSecretMismatch
            | Self::SessionNotFound
            | Self::InvalidCredentials
            | Self::ChallengeInvalid
            | Self::ChallengeExpired
            | Self::CounterNotIncreased
            | Self::Unauthenticated => 401,
            // 403
            Self::Forbidden(_) | Self::NotAMember => 403,
            // 404
            Self::UserNotFound
            | Self::InvitationNotFound
            | Self::CredentialNotFound
            | Self::NotFound(_) => 404,
            // 409
            Self::TokenLimitReached { .. }
            | Self::EmailAlreadyRegistered
            | Self::InvitationAlreadyAccepted
            | Self::CannotDeleteLastPasskey
            | Self::Conflict(_) => 409,
            // 500
            Self::Config(_) | Self::Database(_) | Self::Serialization(_) | Self::SecretHash(_) => {
                500
            }
        }
    }

    /// Stable SCREAMING_SNAKE_CASE code for the routing layer's error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::LastAdmin => "LAST_ADMIN",
            Self::CannotLeavePersonalOrg => "CANNOT_LEAVE_PERSONAL_ORG",
            Self::NoMemberships => "NO_MEMBERSHIPS",
            Self::InvitationExpired => "INVITATION_EXPIRED",
            Self::InvitationEmailMismatch => "INVITATION_EMAIL_MISMATCH",
            Self::RequiresSession => "REQUIRES_SESSION",
            Self::InvalidTokenFormat => "INVALID_TOKEN_FORMAT",
            Self::TokenNotFound => "TOKEN_NOT_FOUND",
            Self::TokenSecretMismatch => "TOKEN_SECRET_MISMATCH",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::ChallengeInvalid => "CHALLENGE_INVALID",
            Self::ChallengeExpired => "CHALLENGE_EXPIRED",
            Self::CounterNotIncreased => "COUNTER_NOT_INCREASED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotAMember => "NOT_A_MEMBER",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::InvitationNotFound => "INVITATION_NOT_FOUND",
            Self::CredentialNotFound => "CREDENTIAL_NOT_FOUND",
            Self::NotFound(_) => "NOT_FOUND",
            Self::TokenLimitReached { .. } => "TOKEN_LIMIT_REACHED",
            Self::EmailAlreadyRegistered => "EMAIL_ALREADY_REGISTERED",
            Self::InvitationAlreadyAccepted => "INVITATION_ALREADY_ACCEPTED",
            Self::CannotDeleteLastPasskey => "CANNOT_DELETE_LAST_PASSKEY",
            Self::Conflict(_) => "CONFLICT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::SecretHash(_) => "SECRET_HASH_ERROR",
        }
    }

    /// Whether this is a credential-class failure that the combined
    /// dispatcher collapses into a uniform unauthenticated outcome.
    /// Infrastructure failures are excluded so they still surface as 500s.
    pub fn is_credential_failure(&self) -> bool {
        !matches!(
            self,
            Self::Config(_) | Self::Database(_) | Self::Serialization(_) | Self::SecretHash(_)
        )
    }

    // --- Constructors ---

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Storage collaborator failures, wrapped opaquely. The subsystem never
/// retries these itself; retry policy belongs to the store.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}

pub type AuthResult<T> = Result<T, AuthError>;
