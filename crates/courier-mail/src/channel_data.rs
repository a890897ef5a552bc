//! Provider-specific key/value parameters carried on a message.
//!
//! The core never interprets these values. Channels look up the keys they
//! understand and ignore the rest.

use crate::{EmailError, EmailResult};
use serde_json::Value;
use std::hash::{Hash, Hasher};

/// Well-known channel data keys.
///
/// Adapters are free to define further keys of their own.
pub mod keys {
	/// Transport options for SMTP channels.
	pub const SMTP_OPTIONS: &str = "smtp_options";
	/// Per-message API key overriding the channel's configured key.
	pub const API_KEY: &str = "api_key";
	/// Caller-assigned message identifier.
	pub const MESSAGE_ID: &str = "message_id";
	/// Mailing (list or batch) identifier.
	pub const MAILING_ID: &str = "mailing_id";
	/// Campaign identifier for provider-side analytics.
	pub const CAMPAIGN_ID: &str = "campaign_id";
	/// Tags or categories, as a JSON array of strings.
	pub const TAGS: &str = "tags";
}

/// A single provider-specific parameter.
///
/// Equality and hashing use the key only, so inserting a second item with the
/// same key into the message's channel data set is silently ignored.
///
/// # Examples
///
/// ```
/// use courier_mail::ChannelData;
/// use courier_mail::channel_data::keys;
///
/// let campaign = ChannelData::new(keys::CAMPAIGN_ID, "spring-sale").unwrap();
/// assert_eq!(campaign.key(), "campaign_id");
/// assert_eq!(campaign.value_str(), Some("spring-sale"));
/// ```
#[derive(Debug, Clone)]
pub struct ChannelData {
	key: String,
	value: Value,
}

impl ChannelData {
	/// Create a channel data entry.
	///
	/// The key must not be blank and the value must not be JSON `null`.
	pub fn new(key: impl Into<String>, value: impl Into<Value>) -> EmailResult<Self> {
		let key = key.into();
		if key.trim().is_empty() {
			return Err(EmailError::InvalidChannelData(
				"key must not be empty".to_string(),
			));
		}

		let value = value.into();
		if value.is_null() {
			return Err(EmailError::InvalidChannelData(format!(
				"value for '{key}' must not be null"
			)));
		}

		Ok(Self { key, value })
	}

	/// Get the key
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Get the value
	pub fn value(&self) -> &Value {
		&self.value
	}

	/// The value when it is a JSON string.
	pub fn value_str(&self) -> Option<&str> {
		self.value.as_str()
	}
}

impl PartialEq for ChannelData {
	fn eq(&self, other: &Self) -> bool {
		self.key == other.key
	}
}

impl Eq for ChannelData {}

impl Hash for ChannelData {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.key.hash(state);
	}
}
