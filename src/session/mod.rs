pub mod store;

pub use store::{AuthEvent, SessionStore, Subscription};
