//! Message model, composer and delivery orchestration.
//!
//! # Examples
//!
//! ```rust
//! use courier::mail::{MessageComposer, Priority};
//! ```

pub use courier_mail::*;
