pub mod client;
pub mod password;
pub mod token;

pub use client::{AuthClient, SignUpMetadata, SignUpOutcome};
pub use password::is_password_strong;
