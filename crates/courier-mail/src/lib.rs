//! # Courier Mail
//!
//! Provider-agnostic email composition and delivery orchestration.
//!
//! ## Features
//!
//! ### Message Model
//! - **Message**: Immutable email value with recipients, bodies, headers, priority,
//!   attachments and provider-specific channel data
//! - **MessageComposer**: Validating builder that checks every field as it is added
//! - **Attachment**: Byte, base64 and file-path sources with MIME detection
//! - **ChannelData**: Key-unique bag for parameters only a specific provider understands
//!
//! ### Delivery
//! - **DeliveryChannel**: Capability contract every provider adapter implements
//! - **EmailService**: Resolves a channel, applies the default sender and pause policy,
//!   then delegates to the channel
//! - **SendingResult**: Uniform success/failure outcome with structured errors and metadata
//!
//! ## Examples
//!
//! ### Composing a Message
//!
//! ```rust
//! use courier_mail::{MessageComposer, Priority};
//!
//! let message = MessageComposer::new()
//!     .from("Reports <reports@example.com>".parse()?)
//!     .to_str("alice@example.com; bob@example.com")?
//!     .subject("Monthly Report")
//!     .plain_text("Please find the report attached.")
//!     .high_priority()
//!     .build()?;
//!
//! assert_eq!(message.to().len(), 2);
//! assert_eq!(message.priority(), Priority::High);
//! # Ok::<(), courier_mail::EmailError>(())
//! ```
//!
//! ### Sending Through a Service
//!
//! ```rust,no_run
//! use courier_mail::{DeliveryChannel, EmailService, MessageComposer, ServiceSettings};
//! use std::sync::Arc;
//!
//! # fn run(smtp: Arc<dyn DeliveryChannel>) -> Result<(), courier_mail::EmailError> {
//! let settings = ServiceSettings::new("smtp").with_default_from("noreply@example.com".parse()?);
//! let service = EmailService::new(vec![smtp], settings)?;
//!
//! let mut message = MessageComposer::new()
//!     .to_str("user@example.com")?
//!     .subject("Welcome!")
//!     .plain_text("Welcome to our service")
//!     .build()?;
//!
//! let result = service.send(&mut message)?;
//! if !result.is_success() {
//!     for error in result.errors() {
//!         eprintln!("{}: {}", error.code(), error.message());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod attachment;
pub mod channel;
pub mod channel_data;
pub mod composer;
pub mod factory;
pub mod headers;
pub mod message;
pub mod priority;
pub mod result;
pub mod service;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

pub use address::{MailAddress, parse_address_list};
pub use attachment::{Attachment, AttachmentSource};
pub use channel::DeliveryChannel;
pub use channel_data::ChannelData;
pub use composer::{DEFAULT_ADDRESS_DELIMITER, MessageComposer};
pub use factory::ServiceFactory;
pub use headers::Headers;
pub use message::Message;
pub use priority::Priority;
pub use result::{SendingError, SendingResult};
pub use service::EmailService;
pub use settings::ServiceSettings;
pub use tokio_util::sync::CancellationToken;

/// Errors raised for caller and configuration mistakes.
///
/// Delivery failures reported by a channel are not represented here; they are
/// returned as a [`SendingResult`] whose `is_success()` is `false`.
#[derive(Debug, Error)]
pub enum EmailError {
	#[error("Argument must not be empty: {0}")]
	EmptyArgument(&'static str),

	#[error("Invalid email address: {0}")]
	InvalidAddress(String),

	#[error("Message must have at least one recipient")]
	MissingRecipient,

	#[error("Message has no sender and no default sender is configured")]
	MissingSender,

	#[error("Header already exists: {0}")]
	DuplicateHeader(String),

	#[error("Metadata key already exists: {0}")]
	DuplicateMetadata(String),

	#[error("Invalid header: {0}")]
	InvalidHeader(String),

	#[error("Header injection attempt detected: {0}")]
	HeaderInjection(String),

	#[error("Attachment error: {0}")]
	InvalidAttachment(String),

	#[error("Attachment file does not exist: {}", .0.display())]
	AttachmentNotFound(PathBuf),

	#[error("Invalid base64 content: {0}")]
	InvalidBase64(#[from] base64::DecodeError),

	#[error("Invalid channel data: {0}")]
	InvalidChannelData(String),

	#[error("Configuration error: {0}")]
	Configuration(String),

	#[error("Cannot parse configuration: {0}")]
	ConfigParse(#[from] toml::de::Error),

	#[error("Delivery channel not found: {0}")]
	ChannelNotFound(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

pub type EmailResult<T> = std::result::Result<T, EmailError>;
