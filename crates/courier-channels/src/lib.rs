//! # Courier Channels
//!
//! Delivery channels implementing [`courier_mail::DeliveryChannel`].
//!
//! ## Channels
//!
//! - **SmtpChannel** (`smtp` feature): MIME construction and SMTP submission via `lettre`
//! - **SendGridChannel** (`sendgrid` feature): SendGrid v3 `mail/send` API via `reqwest`
//! - **MailgunChannel** (`mailgun` feature): Mailgun messages API via `reqwest`
//! - **MemoryChannel** (`memory` feature): Records messages instead of sending them
//!
//! Every channel reports delivery problems through a failed
//! [`courier_mail::SendingResult`]; none of them panic or return errors across
//! the channel contract.
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "smtp")]
//! # fn run() -> Result<(), courier_mail::EmailError> {
//! use courier_channels::{SmtpChannel, SmtpConfig};
//! use courier_mail::{MessageComposer, ServiceFactory};
//!
//! let smtp = SmtpChannel::new(
//!     SmtpConfig::new("smtp.example.com", 587).with_credentials("user", "secret"),
//! )?;
//!
//! let service = ServiceFactory::new()
//!     .channel(smtp)
//!     .default_from("noreply@example.com".parse()?)
//!     .build()?;
//!
//! let mut message = MessageComposer::new()
//!     .to_str("user@example.com")?
//!     .subject("Hello")
//!     .plain_text("Hi there")
//!     .build()?;
//!
//! let result = service.send(&mut message)?;
//! assert!(result.is_success());
//! # Ok(())
//! # }
//! ```

#[cfg(any(feature = "sendgrid", feature = "mailgun"))]
mod http;

#[cfg(feature = "mailgun")]
pub mod mailgun;
#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sendgrid")]
pub mod sendgrid;
#[cfg(feature = "smtp")]
pub mod smtp;

#[cfg(feature = "mailgun")]
pub use mailgun::{MailgunChannel, MailgunConfig, MailgunRegion};
#[cfg(feature = "memory")]
pub use memory::MemoryChannel;
#[cfg(feature = "sendgrid")]
pub use sendgrid::{SendGridChannel, SendGridConfig};
#[cfg(feature = "smtp")]
pub use smtp::{SmtpChannel, SmtpConfig, SmtpSecurity};

use courier_mail::result::error_codes;
use courier_mail::{EmailError, EmailResult, SendingError, SendingResult};
use serde_json::Value;
use std::time::Duration;

/// Request timeout used when a channel config does not set one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[cfg_attr(
	not(any(feature = "smtp", feature = "sendgrid", feature = "mailgun")),
	allow(dead_code)
)]
pub(crate) fn default_timeout_secs() -> u64 {
	DEFAULT_TIMEOUT_SECS
}

/// Whole seconds for a timeout, rounded up so a sub-second timeout never becomes zero.
#[cfg_attr(
	not(any(feature = "smtp", feature = "sendgrid", feature = "mailgun")),
	allow(dead_code)
)]
pub(crate) fn timeout_secs(timeout: Duration) -> u64 {
	let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
	secs.max(1)
}

/// Reject a zero timeout, which transports treat as "time out immediately".
#[cfg_attr(
	not(any(feature = "smtp", feature = "sendgrid", feature = "mailgun")),
	allow(dead_code)
)]
pub(crate) fn validate_timeout(channel: &str, timeout_secs: u64) -> EmailResult<()> {
	if timeout_secs == 0 {
		return Err(EmailError::Configuration(format!(
			"{channel} timeout must be at least one second"
		)));
	}
	Ok(())
}

/// Result returned when the caller cancelled before the provider answered.
pub(crate) fn cancelled(channel: &str) -> SendingResult {
	tracing::debug!(channel = %channel, "Send cancelled");
	SendingResult::failure(
		channel,
		[SendingError::new(error_codes::CANCELLED, "send was cancelled")],
	)
}

/// Record a metadata entry on a result the channel is still assembling.
pub(crate) fn record_metadata(result: &mut SendingResult, key: &str, value: impl Into<Value>) {
	if let Err(error) = result.add_metadata(key, value) {
		tracing::warn!(channel = %result.channel_name(), %error, "Dropping metadata entry");
	}
}

/// Flatten a channel data value into strings.
///
/// Strings pass through, arrays contribute each scalar element, other scalars
/// use their JSON text and `null` yields nothing.
#[cfg_attr(not(any(feature = "sendgrid", feature = "mailgun")), allow(dead_code))]
pub(crate) fn value_strings(value: &Value) -> Vec<String> {
	match value {
		Value::Null => Vec::new(),
		Value::String(s) => vec![s.clone()],
		Value::Array(items) => items.iter().flat_map(value_strings).collect(),
		other => vec![other.to_string()],
	}
}
