//! Google Calendar integration
//!
//! - [`google`]: Calendar v3 REST client and HTTP error classification
//! - [`oauth`]: refresh-token exchange
//! - [`factory`]: per-user clients with cached, renewable access tokens

pub mod factory;
pub mod google;
pub mod oauth;
pub mod types;

pub use factory::{AccessTokens, GoogleClientFactory};
pub use google::{classify_status, GoogleCalendarClient};
pub use oauth::{AccessToken, OAuthTokenClient};
