//! Error types for building, verifying and transporting delegation chains.
//!
//! [`ErrorCode`] and [`ServiceError`] give a storage node a consistent way
//! to turn any of these failures into an HTTP response.

use crate::link::LinkRef;
use serde::Serialize;
use thiserror::Error;
use tinycloud_capability::{AttenuationViolation, GrantError, TimeRange, Timestamp};
use tinycloud_credentials::{KeyError, ethereum::AddressError};
use tinycloud_varsig::Did;

/// Errors reading, writing or checking a SIWE root authority.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SiweError {
    /// The message text does not follow the EIP-4361 layout.
    #[error("malformed SIWE message at line {line}: {reason}")]
    Malformed {
        /// One-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A field has an invalid value.
    #[error("invalid SIWE field {field}: {reason}")]
    InvalidField {
        /// Field name as it appears in [`crate::SiweConfig`].
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The signer address is invalid.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// The platform CSPRNG failed while generating a nonce.
    #[error("cannot generate nonce: {0}")]
    Rng(String),

    /// The message carries no `urn:recap:` resource.
    #[error("SIWE message does not carry a ReCap resource")]
    MissingRecap,

    /// The ReCap resource could not be decoded or does not describe a grant.
    #[error("invalid ReCap resource: {0}")]
    Recap(String),

    /// The statement does not end with the ReCap statement.
    #[error("SIWE statement does not describe the ReCap capabilities")]
    StatementMismatch,

    /// A root grant needs an expiration time.
    #[error("SIWE message has no expiration time")]
    MissingExpiration,

    /// The grant described by the message is invalid.
    #[error(transparent)]
    Grant(#[from] GrantError),

    /// The message was signed by someone other than the space owner.
    #[error("{signer} does not own the space; its owner is {owner}")]
    NotSpaceOwner {
        /// The space owner.
        owner: Did,
        /// The message signer.
        signer: Did,
    },

    /// The message authorizes a different session key.
    #[error("SIWE message authorizes {found}, not {expected}")]
    UriMismatch {
        /// The link audience.
        expected: Did,
        /// The message URI.
        found: String,
    },

    /// The root link claims an issuer other than the message signer.
    #[error("root issuer {found} is not the SIWE signer {expected}")]
    IssuerMismatch {
        /// The SIWE signer.
        expected: Did,
        /// The claimed issuer.
        found: Did,
    },

    /// The root link's grant differs from the one the wallet signed.
    #[error("root grant differs from the grant in the signed message")]
    GrantMismatch,

    /// The signer identity could not be resolved.
    #[error("cannot resolve signer: {0}")]
    Resolve(String),

    /// The wallet signature does not match the message and signer.
    #[error("wallet signature is invalid")]
    Signature,
}

/// Errors verifying the Ed25519 signature of a derived link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkSignatureError {
    /// The issuer DID does not resolve to a key.
    #[error("cannot resolve issuer {did}: {reason}")]
    Unresolvable {
        /// The issuer.
        did: Did,
        /// Why resolution failed.
        reason: String,
    },

    /// The signature does not match the payload and issuer key.
    #[error("signature does not verify against {0}")]
    Mismatch(Did),
}

/// Errors building a delegation chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The key asked to delegate is not the audience of the chain's last
    /// link.
    #[error("{found} does not hold the chain; its holder is {expected}")]
    NotChainHolder {
        /// Audience of the last link.
        expected: Did,
        /// DID of the key asked to sign.
        found: Did,
    },

    /// The requested grant cannot be derived from the parent grant.
    #[error(transparent)]
    Grant(#[from] GrantError),

    /// The SIWE root authority is invalid.
    #[error(transparent)]
    Root(#[from] SiweError),

    /// The grant has already expired at build time.
    #[error("grant window {window} is closed at {at}")]
    ExpiredOrNotYetValid {
        /// The build time.
        at: Timestamp,
        /// The grant window.
        window: TimeRange,
    },

    /// The issuer key could not sign.
    #[error("cannot sign delegation: {0}")]
    Signing(String),
}

/// Errors verifying a delegation chain.
///
/// Every variant that concerns a particular link carries its `index`,
/// counted from the root of the chain after proofs have been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// The chain is longer than the verifier accepts.
    #[error("chain has {depth} links, more than the limit of {limit}")]
    TooDeep {
        /// Chain length.
        depth: usize,
        /// Configured limit.
        limit: usize,
    },

    /// A parent link referenced by the chain is not in the proof store.
    #[error("proof {0} not found")]
    ProofNotFound(LinkRef),

    /// The proof store failed.
    #[error("proof store error: {0}")]
    ProofStore(String),

    /// A root link appears after the first position.
    #[error("link {index}: root links may only start a chain")]
    MisplacedRoot {
        /// Offending link.
        index: usize,
    },

    /// The SIWE root is not a valid authorization for the root grant.
    #[error("link {index}: invalid root authority: {source}")]
    InvalidRoot {
        /// Offending link.
        index: usize,
        /// Why the root was rejected.
        source: SiweError,
    },

    /// The chain is rooted in a space other than the expected one.
    #[error("chain is rooted in {found}, expected {expected}")]
    SpaceMismatch {
        /// Space the verifier serves.
        expected: String,
        /// Space the root names.
        found: String,
    },

    /// A link's issuer is not the previous link's audience.
    #[error("link {index}: issuer {issuer} is not the previous audience {expected}")]
    IssuerContinuityBroken {
        /// Offending link.
        index: usize,
        /// The previous link's audience.
        expected: Did,
        /// The link's issuer.
        issuer: Did,
    },

    /// A link's parent reference does not match the previous link.
    #[error("link {index}: parent reference does not match the previous link")]
    ParentMismatch {
        /// Offending link.
        index: usize,
    },

    /// A link's signature does not verify against its issuer.
    #[error("link {index}: signature is invalid: {reason}")]
    SignatureInvalid {
        /// Offending link.
        index: usize,
        /// Why verification failed.
        reason: String,
    },

    /// A link's grant is wider than its parent's.
    #[error("link {index}: attenuation violated: {violation}")]
    AttenuationViolated {
        /// Offending link.
        index: usize,
        /// Which bound was exceeded.
        violation: AttenuationViolation,
    },

    /// The leaf grant is not valid at the requested time.
    #[error("link {index}: grant window {window} does not contain {at}")]
    ExpiredOrNotYetValid {
        /// Offending link.
        index: usize,
        /// Time of the check.
        at: Timestamp,
        /// The grant window.
        window: TimeRange,
    },
}

impl VerificationError {
    /// The index of the link that failed, if the failure concerns one.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::MisplacedRoot { index }
            | Self::InvalidRoot { index, .. }
            | Self::IssuerContinuityBroken { index, .. }
            | Self::ParentMismatch { index }
            | Self::SignatureInvalid { index, .. }
            | Self::AttenuationViolated { index, .. }
            | Self::ExpiredOrNotYetValid { index, .. } => Some(*index),
            Self::TooDeep { .. }
            | Self::ProofNotFound(_)
            | Self::ProofStore(_)
            | Self::SpaceMismatch { .. } => None,
        }
    }
}

/// Errors authorizing an invocation with a delegation chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// The chain itself is invalid.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// The chain is valid but does not cover the requested invocation.
    #[error("{action} on {path} is not authorized")]
    Unauthorized {
        /// Requested path.
        path: String,
        /// Requested action.
        action: String,
    },
}

/// Errors encoding or decoding share tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token is not a share token.
    #[error("malformed share token: {0}")]
    MalformedToken(String),

    /// The token uses a version this library does not understand.
    #[error("unsupported share token version {0}")]
    UnsupportedVersion(String),

    /// The key to embed is not the holder of the chain.
    #[error("share key {found} is not the chain holder {expected}")]
    KeyMismatch {
        /// Audience of the chain's last link.
        expected: Did,
        /// DID of the share key.
        found: Did,
    },

    /// The share key cannot be exported.
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Errors managing session keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A key with this id already exists.
    #[error("key already exists: {0}")]
    KeyExists(String),

    /// No key with this id exists.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The session chain is not addressed to this key.
    #[error("session chain is held by {holder}, not by key {key_id}")]
    ChainMismatch {
        /// Key the chain was attached to.
        key_id: String,
        /// Audience of the chain's last link.
        holder: Did,
    },

    /// Key generation or import failed.
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Error codes returned to storage node clients.
///
/// Each code maps to an HTTP status via [`ErrorCode::status_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 400 Bad Request
    /// Token or credential could not be parsed
    MalformedToken,
    /// Token version is not supported
    UnsupportedVersion,

    // 401 Unauthorized
    /// A signature failed to verify
    SignatureInvalid,
    /// Issuer of a link is not the audience of its parent
    IssuerContinuityBroken,
    /// A link claims more than its parent granted
    AttenuationViolated,
    /// Chain structure or root authority is invalid
    ChainInvalid,
    /// A referenced proof is unknown
    ProofNotFound,
    /// Credential is expired or not yet valid
    ExpiredOrNotYetValid,

    // 403 Forbidden
    /// Chain is rooted in another space
    SpaceNotAllowed,
    /// Valid chain that does not cover the request
    Unauthorized,

    // 500 Internal Server Error
    /// Internal failure
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::MalformedToken | ErrorCode::UnsupportedVersion => 400,

            ErrorCode::SignatureInvalid
            | ErrorCode::IssuerContinuityBroken
            | ErrorCode::AttenuationViolated
            | ErrorCode::ChainInvalid
            | ErrorCode::ProofNotFound
            | ErrorCode::ExpiredOrNotYetValid => 401,

            ErrorCode::SpaceNotAllowed | ErrorCode::Unauthorized => 403,

            ErrorCode::InternalError => 500,
        }
    }
}

/// Service error with code and message, for framework-specific HTTP
/// handlers to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceError {
    /// The error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
}

impl ServiceError {
    /// Create a new service error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

impl From<VerificationError> for ServiceError {
    fn from(err: VerificationError) -> Self {
        let code = match &err {
            VerificationError::SignatureInvalid { .. } => ErrorCode::SignatureInvalid,
            VerificationError::IssuerContinuityBroken { .. } => ErrorCode::IssuerContinuityBroken,
            VerificationError::AttenuationViolated { .. } => ErrorCode::AttenuationViolated,
            VerificationError::ExpiredOrNotYetValid { .. } => ErrorCode::ExpiredOrNotYetValid,
            VerificationError::ProofNotFound(_) => ErrorCode::ProofNotFound,
            VerificationError::SpaceMismatch { .. } => ErrorCode::SpaceNotAllowed,
            VerificationError::InvalidRoot {
                source: SiweError::Signature,
                ..
            } => ErrorCode::SignatureInvalid,
            VerificationError::TooDeep { .. }
            | VerificationError::MisplacedRoot { .. }
            | VerificationError::InvalidRoot { .. }
            | VerificationError::ParentMismatch { .. } => ErrorCode::ChainInvalid,
            VerificationError::ProofStore(_) => ErrorCode::InternalError,
        };
        ServiceError::new(code, err.to_string())
    }
}

impl From<AuthorizationError> for ServiceError {
    fn from(err: AuthorizationError) -> Self {
        match err {
            AuthorizationError::Verification(err) => err.into(),
            AuthorizationError::Unauthorized { .. } => {
                ServiceError::new(ErrorCode::Unauthorized, err.to_string())
            }
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        let code = match &err {
            TokenError::UnsupportedVersion(_) => ErrorCode::UnsupportedVersion,
            TokenError::MalformedToken(_) | TokenError::KeyMismatch { .. } => {
                ErrorCode::MalformedToken
            }
            TokenError::Key(_) => ErrorCode::InternalError,
        };
        ServiceError::new(code, err.to_string())
    }
}
