//! # Courier
//!
//! Provider-agnostic email for Rust: compose a message once, deliver it through
//! SMTP or a vendor API chosen at runtime.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All bundled channels
//! - `smtp` - SMTP submission via `lettre`
//! - `sendgrid` - SendGrid v3 API
//! - `mailgun` - Mailgun messages API
//! - `memory` - In-memory channel for tests and development
//!
//! ## Quick Example
//!
//! ```rust
//! # #[cfg(feature = "memory")]
//! # fn main() -> Result<(), courier::mail::EmailError> {
//! use courier::prelude::*;
//!
//! let outbox = MemoryChannel::new();
//! let service = ServiceFactory::new()
//!     .channel(outbox.clone())
//!     .default_from("noreply@example.com".parse()?)
//!     .build()?;
//!
//! let mut message = MessageComposer::new()
//!     .to_str("alice@example.com; bob@example.com")?
//!     .subject("Welcome")
//!     .plain_text("Hello!")
//!     .build()?;
//!
//! let result = service.send(&mut message)?;
//! assert!(result.is_success());
//! assert_eq!(outbox.count(), 1);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "memory"))]
//! # fn main() {}
//! ```

pub mod channels;
pub mod mail;

pub mod prelude {
	pub use crate::mail::{
		Attachment, CancellationToken, ChannelData, DeliveryChannel, EmailError, EmailResult,
		EmailService, MailAddress, Message, MessageComposer, Priority, SendingError,
		SendingResult, ServiceFactory, ServiceSettings,
	};

	#[cfg(feature = "mailgun")]
	pub use crate::channels::{MailgunChannel, MailgunConfig, MailgunRegion};
	#[cfg(feature = "memory")]
	pub use crate::channels::MemoryChannel;
	#[cfg(feature = "sendgrid")]
	pub use crate::channels::{SendGridChannel, SendGridConfig};
	#[cfg(feature = "smtp")]
	pub use crate::channels::{SmtpChannel, SmtpConfig, SmtpSecurity};
}
