//! Service configuration.

use crate::{EmailError, EmailResult, MailAddress};
use serde::{Deserialize, Serialize};

/// Environment variable naming the default channel.
pub const ENV_DEFAULT_CHANNEL: &str = "COURIER_DEFAULT_CHANNEL";
/// Environment variable holding the default sender address.
pub const ENV_DEFAULT_FROM: &str = "COURIER_DEFAULT_FROM";
/// Environment variable toggling the pause switch (`true`/`1`).
pub const ENV_PAUSE_SENDING: &str = "COURIER_PAUSE_SENDING";

/// Externally tunable policy of an [`crate::EmailService`].
///
/// Values are fixed for the lifetime of the service built from them; pausing is
/// a per-service setting, not a process-wide switch.
///
/// # Examples
///
/// ```
/// use courier_mail::ServiceSettings;
///
/// let settings = ServiceSettings::from_toml_str(r#"
///     default_channel = "smtp"
///     default_from = "Support <support@example.com>"
/// "#).unwrap();
///
/// assert_eq!(settings.default_channel, "smtp");
/// assert!(!settings.pause_sending);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
	/// Name of the channel used when a send does not name one.
	pub default_channel: String,

	/// Sender applied to messages that have none.
	#[serde(default)]
	pub default_from: Option<MailAddress>,

	/// Accept messages without delivering them.
	#[serde(default)]
	pub pause_sending: bool,
}

impl ServiceSettings {
	/// Create settings with a default channel, no default sender and sending enabled.
	pub fn new(default_channel: impl Into<String>) -> Self {
		Self {
			default_channel: default_channel.into(),
			default_from: None,
			pause_sending: false,
		}
	}

	/// Set the default sender
	pub fn with_default_from(mut self, from: MailAddress) -> Self {
		self.default_from = Some(from);
		self
	}

	/// Pause or resume sending
	pub fn with_pause_sending(mut self, paused: bool) -> Self {
		self.pause_sending = paused;
		self
	}

	/// Validate settings
	pub fn validate(&self) -> EmailResult<()> {
		if self.default_channel.trim().is_empty() {
			return Err(EmailError::Configuration(
				"default_channel must not be empty".to_string(),
			));
		}
		Ok(())
	}

	/// Parse and validate settings from TOML.
	pub fn from_toml_str(input: &str) -> EmailResult<Self> {
		let settings: Self = toml::from_str(input)?;
		settings.validate()?;
		Ok(settings)
	}

	/// Load settings from environment variables
	///
	pub fn from_env() -> EmailResult<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Load settings through an arbitrary variable lookup.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> EmailResult<Self> {
		let default_channel = lookup(ENV_DEFAULT_CHANNEL).ok_or_else(|| {
			EmailError::Configuration(format!("{ENV_DEFAULT_CHANNEL} is not set"))
		})?;

		let mut settings = Self::new(default_channel);

		if let Some(from) = lookup(ENV_DEFAULT_FROM).filter(|v| !v.trim().is_empty()) {
			let address = MailAddress::parse(&from).map_err(|e| {
				EmailError::Configuration(format!("{ENV_DEFAULT_FROM}: {e}"))
			})?;
			settings.default_from = Some(address);
		}

		if let Some(paused) = lookup(ENV_PAUSE_SENDING) {
			settings.pause_sending = paused.eq_ignore_ascii_case("true") || paused == "1";
		}

		settings.validate()?;
		Ok(settings)
	}
}
