//! Uniform outcome of a delivery attempt.
//!
//! Channels report both success and failure through [`SendingResult`] so that
//! callers branch on [`SendingResult::is_success`] instead of matching on
//! provider-specific error types.

use crate::{EmailError, EmailResult};
use indexmap::{IndexMap, IndexSet};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Well-known metadata keys.
pub mod metadata_keys {
	/// Set to `true` when the service accepted the message but suppressed delivery.
	pub const SENDING_PAUSED: &str = "sending_paused";
	/// Identifier assigned by the provider.
	pub const MESSAGE_ID: &str = "message_id";
	/// Raw provider response, when a channel chooses to keep it.
	pub const PROVIDER_RESPONSE: &str = "provider_response";
}

/// Well-known error codes used by the bundled channels.
pub mod error_codes {
	/// The transport or HTTP call failed.
	pub const SEND_FAILED: &str = "send_failed";
	/// The provider payload or MIME message could not be built.
	pub const BUILD_FAILED: &str = "build_failed";
	/// The caller cancelled the send.
	pub const CANCELLED: &str = "cancelled";
	/// The provider answered with a rejection.
	pub const PROVIDER_REJECTED: &str = "provider_rejected";
	/// A file-backed attachment could not be read.
	pub const ATTACHMENT_UNREADABLE: &str = "attachment_unreadable";
}

/// A structured delivery error.
///
/// Equality and hashing use the code and message; the originating error, if
/// any, is carried along for diagnostics only.
#[derive(Debug, Clone)]
pub struct SendingError {
	code: String,
	message: String,
	source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl SendingError {
	/// Create an error with a code and a human readable message.
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			code: code.into(),
			message: message.into(),
			source: None,
		}
	}

	/// Create an error from an originating error, using its display text as message.
	pub fn from_error<E>(code: impl Into<String>, error: E) -> Self
	where
		E: StdError + Send + Sync + 'static,
	{
		Self {
			code: code.into(),
			message: error.to_string(),
			source: Some(Arc::new(error)),
		}
	}

	/// Attach the originating error.
	pub fn with_source<E>(mut self, error: E) -> Self
	where
		E: StdError + Send + Sync + 'static,
	{
		self.source = Some(Arc::new(error));
		self
	}

	/// Get the error code
	pub fn code(&self) -> &str {
		&self.code
	}

	/// Get the error message
	pub fn message(&self) -> &str {
		&self.message
	}

	/// Get the underlying error, if any
	pub fn source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
		self.source.as_deref()
	}
}

impl PartialEq for SendingError {
	fn eq(&self, other: &Self) -> bool {
		self.code == other.code && self.message == other.message
	}
}

impl Eq for SendingError {}

impl Hash for SendingError {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.code.hash(state);
		self.message.hash(state);
	}
}

impl fmt::Display for SendingError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}] {}", self.code, self.message)
	}
}

/// Outcome of sending one message through one channel.
///
/// # Examples
///
/// ```
/// use courier_mail::{SendingError, SendingResult};
/// use courier_mail::result::metadata_keys;
///
/// let mut result = SendingResult::success("sendgrid");
/// result.add_metadata(metadata_keys::MESSAGE_ID, "abc123")?;
/// assert_eq!(result.metadata_or(metadata_keys::MESSAGE_ID, String::new()), "abc123");
///
/// let failed = SendingResult::failure("smtp", [SendingError::new("send_failed", "timeout")]);
/// assert!(!failed.is_success());
/// assert_eq!(failed.errors().len(), 1);
/// # Ok::<(), courier_mail::EmailError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SendingResult {
	success: bool,
	channel_name: String,
	errors: IndexSet<SendingError>,
	metadata: IndexMap<String, Value>,
}

impl SendingResult {
	/// Create a successful result.
	pub fn success(channel_name: impl Into<String>) -> Self {
		Self {
			success: true,
			channel_name: channel_name.into(),
			errors: IndexSet::new(),
			metadata: IndexMap::new(),
		}
	}

	/// Create a failed result carrying the given errors.
	pub fn failure(
		channel_name: impl Into<String>,
		errors: impl IntoIterator<Item = SendingError>,
	) -> Self {
		Self {
			success: false,
			channel_name: channel_name.into(),
			errors: errors.into_iter().collect(),
			metadata: IndexMap::new(),
		}
	}

	/// Whether the channel accepted the message
	pub fn is_success(&self) -> bool {
		self.success
	}

	/// Get the name of the channel that produced the result
	pub fn channel_name(&self) -> &str {
		&self.channel_name
	}

	/// Get the errors
	pub fn errors(&self) -> &IndexSet<SendingError> {
		&self.errors
	}

	/// Get all metadata
	pub fn metadata(&self) -> &IndexMap<String, Value> {
		&self.metadata
	}

	/// Whether delivery was suppressed because sending is paused.
	pub fn is_paused(&self) -> bool {
		self.metadata_or(metadata_keys::SENDING_PAUSED, false)
	}

	/// Record an error. An identical error is only kept once.
	pub fn add_error(&mut self, error: SendingError) -> &mut Self {
		self.errors.insert(error);
		self
	}

	/// Owned variant of [`SendingResult::add_error`] for building results inline.
	pub fn with_error(mut self, error: SendingError) -> Self {
		self.add_error(error);
		self
	}

	/// Record a metadata entry.
	///
	/// Keys are write-once: adding an existing key fails with
	/// [`EmailError::DuplicateMetadata`] and leaves the stored value untouched.
	pub fn add_metadata(
		&mut self,
		key: impl Into<String>,
		value: impl Into<Value>,
	) -> EmailResult<&mut Self> {
		let key = key.into();
		if self.metadata.contains_key(&key) {
			return Err(EmailError::DuplicateMetadata(key));
		}
		self.metadata.insert(key, value.into());
		Ok(self)
	}

	/// Owned variant of [`SendingResult::add_metadata`].
	pub fn with_metadata(
		mut self,
		key: impl Into<String>,
		value: impl Into<Value>,
	) -> EmailResult<Self> {
		self.add_metadata(key, value)?;
		Ok(self)
	}

	/// Check whether a metadata key is present
	pub fn has_metadata(&self, key: &str) -> bool {
		self.metadata.contains_key(key)
	}

	/// Raw metadata value.
	pub fn get_metadata(&self, key: &str) -> Option<&Value> {
		self.metadata.get(key)
	}

	/// Typed metadata value, or `default` when the key is missing or the value
	/// does not deserialize into `T`.
	pub fn metadata_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
		self.metadata
			.get(key)
			.and_then(|value| serde_json::from_value(value.clone()).ok())
			.unwrap_or(default)
	}
}
