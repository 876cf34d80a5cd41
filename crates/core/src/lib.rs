//! # Creel Core
//!
//! Core abstractions for the Creel authentication subsystem: configuration,
//! typed errors, entity types, the persistence adapter contract, clock and
//! logger injection, the HMAC token signer, secret hashing, and the browser
//! session manager.

pub mod adapters;
pub mod clock;
pub mod config;
pub mod cookie;
pub mod error;
pub mod logger;
pub mod secret;
pub mod session;
pub mod signer;
pub mod types;

// Re-export commonly used items
pub use adapters::{DatabaseAdapter, MemoryDatabaseAdapter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AdminConfig, AuthConfig, InvitationConfig, PasskeyConfig, SameSite, SessionConfig, TokenConfig,
};
pub use error::{AuthError, AuthResult, DatabaseError};
pub use logger::{Logger, TracingLogger};
pub use session::SessionManager;
pub use signer::TokenSigner;
pub use types::{
    AdminSession, ApiToken, AuthContext, CreateCredential, CreateInvitation, CreateMembership,
    CreateSession, CreateToken, CreateUser, Invitation, MemberRole, Membership, Organization,
    PasskeyCredential, User, UserSession,
};
