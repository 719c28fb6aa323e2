//! Account and session backend for a video-sharing platform.
//!
//! Short-lived access tokens authenticate requests statelessly; long-lived
//! refresh tokens are persisted on the user record so that logout and
//! rotation can revoke them.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod response;
pub mod state;

pub use app::{build_app, serve};
pub use error::{AuthError, AuthResult};
pub use state::AppState;
