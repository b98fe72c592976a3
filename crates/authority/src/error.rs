use sea_orm::DbErr;
use thiserror::Error;

/// Every failure the credential and token authority can report.
///
/// Display strings are safe to show to a client: they never carry secrets,
/// password digests or token values. `Storage` and `Hashing` keep their
/// detail in the error source for logging only.
#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("Client authentication failed")]
    ClientNotFound,
    #[error("Client authentication failed")]
    InvalidClientSecret,
    #[error("Client already exists")]
    DuplicateClient,
    #[error("Invalid username or password")]
    UserNotFound,
    #[error("Invalid username or password")]
    PasswordNotSet,
    #[error("Invalid username or password")]
    InvalidCredential,
    #[error("User already exists")]
    DuplicateUser,
    #[error("Cannot set empty password")]
    EmptyPassword,
    #[error("Invalid scope: {0}")]
    InvalidScope(String),
    #[error("Authorization code not found")]
    CodeNotFound,
    #[error("Authorization code expired")]
    CodeExpired,
    #[error("Redirect URI mismatch")]
    RedirectMismatch,
    #[error("Client ID mismatch")]
    ClientMismatch,
    #[error("Token not found")]
    TokenNotFound,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("Storage failure")]
    Storage(#[from] DbErr),
    #[error("Hashing failure")]
    Hashing(String),
}

/// The coarse taxonomy callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Expired,
    Duplicate,
    InvalidCredential,
    InvalidScope,
    Mismatch,
    InvalidRequest,
    StorageFailure,
    HashingFailure,
}

impl OAuth2Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OAuth2Error::ClientNotFound
            | OAuth2Error::UserNotFound
            | OAuth2Error::CodeNotFound
            | OAuth2Error::TokenNotFound => ErrorKind::NotFound,
            OAuth2Error::CodeExpired | OAuth2Error::TokenExpired => ErrorKind::Expired,
            OAuth2Error::DuplicateClient | OAuth2Error::DuplicateUser => ErrorKind::Duplicate,
            OAuth2Error::InvalidClientSecret
            | OAuth2Error::InvalidCredential
            | OAuth2Error::PasswordNotSet => ErrorKind::InvalidCredential,
            OAuth2Error::InvalidScope(_) => ErrorKind::InvalidScope,
            OAuth2Error::RedirectMismatch | OAuth2Error::ClientMismatch => ErrorKind::Mismatch,
            OAuth2Error::EmptyPassword | OAuth2Error::InvalidRequest(_) => {
                ErrorKind::InvalidRequest
            }
            OAuth2Error::Storage(_) => ErrorKind::StorageFailure,
            OAuth2Error::Hashing(_) => ErrorKind::HashingFailure,
        }
    }

    /// RFC 6749 section 5.2 error code for the grant layer.
    ///
    /// Unknown client and wrong secret share `invalid_client`; unknown user,
    /// missing password and wrong password share `invalid_grant`.
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            OAuth2Error::ClientNotFound | OAuth2Error::InvalidClientSecret => "invalid_client",
            OAuth2Error::UserNotFound
            | OAuth2Error::PasswordNotSet
            | OAuth2Error::InvalidCredential
            | OAuth2Error::CodeNotFound
            | OAuth2Error::CodeExpired
            | OAuth2Error::RedirectMismatch
            | OAuth2Error::ClientMismatch
            | OAuth2Error::TokenNotFound
            | OAuth2Error::TokenExpired => "invalid_grant",
            OAuth2Error::InvalidScope(_) => "invalid_scope",
            OAuth2Error::DuplicateClient
            | OAuth2Error::DuplicateUser
            | OAuth2Error::EmptyPassword
            | OAuth2Error::InvalidRequest(_) => "invalid_request",
            OAuth2Error::Storage(_) | OAuth2Error::Hashing(_) => "server_error",
        }
    }

    /// Failures of a credential check, whatever the cause.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            OAuth2Error::ClientNotFound
                | OAuth2Error::InvalidClientSecret
                | OAuth2Error::UserNotFound
                | OAuth2Error::PasswordNotSet
                | OAuth2Error::InvalidCredential
        )
    }

    /// Transient collaborator failures; only idempotent operations may be
    /// retried verbatim after one of these.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OAuth2Error::Storage(_))
    }
}

pub type Result<T, E = OAuth2Error> = std::result::Result<T, E>;
