//! External collaborators
//!
//! - `identity`: PIN verification
//! - `gateway`: hosted card checkout
//! - `notify`: user-facing notifications

pub mod gateway;
pub mod identity;
pub mod notify;

pub use gateway::{CheckoutSession, PaymentGateway, SandboxGateway, SandboxSession, SessionOutcome};
pub use identity::{CredentialVerifier, PinDirectory};
pub use notify::{ChannelSink, Notification, NotificationKind, NotificationSink, TracingSink};
