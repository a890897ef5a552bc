//! Bundled delivery channels.
//!
//! Each channel is behind the feature flag of the same name.
//!
//! # Examples
//!
//! ```rust,no_run
//! # #[cfg(feature = "sendgrid")]
//! use courier::channels::{SendGridChannel, SendGridConfig};
//! ```

pub use courier_channels::*;
