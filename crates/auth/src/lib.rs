//! # Creel Auth
//!
//! Authenticators and multi-tenant session services for the Creel
//! capture/task service: membership and signup, bearer API tokens, the
//! stateless signed admin cookie, WebAuthn passkeys, invitations, and the
//! combined per-request dispatcher.
//!
//! Every service is constructed with its collaborators injected — the
//! persistence adapter, clock, and configuration — so tests substitute
//! deterministic fakes. Each credential path resolves to the same
//! [`AuthContext`](creel_core::types::AuthContext) shape for downstream
//! handlers.

pub mod admin;
pub mod dispatcher;
pub mod invitation;
pub mod membership;
pub mod passkey;
pub mod token;

pub use admin::AdminAuthenticator;
pub use dispatcher::{Authentication, RequestAuthenticator};
pub use invitation::InvitationService;
pub use membership::MembershipService;
pub use passkey::{CeremonyOptions, PasskeyAuthenticator};
pub use token::TokenAuthenticator;
