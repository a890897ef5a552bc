//! Fluent assembly of an [`EmailService`].

use crate::{DeliveryChannel, EmailError, EmailResult, EmailService, MailAddress, ServiceSettings};
use std::sync::Arc;

/// Collects channels and options, then builds an [`EmailService`].
///
/// Either pass complete [`ServiceSettings`] with [`ServiceFactory::settings`]
/// or set the individual options. Individual options set after `settings`
/// override the corresponding field.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use courier_mail::{CancellationToken, DeliveryChannel, Message, SendingResult, ServiceFactory};
///
/// struct Loopback;
///
/// #[async_trait]
/// impl DeliveryChannel for Loopback {
///     fn name(&self) -> &str { "loopback" }
///     fn send(&self, _message: &Message) -> SendingResult {
///         SendingResult::success("loopback")
///     }
///     async fn send_async(&self, m: &Message, _c: &CancellationToken) -> SendingResult {
///         self.send(m)
///     }
/// }
///
/// let service = ServiceFactory::new()
///     .channel(Loopback)
///     .default_channel("loopback")
///     .default_from("noreply@example.com".parse()?)
///     .build()?;
///
/// assert_eq!(service.default_channel().name(), "loopback");
/// # Ok::<(), courier_mail::EmailError>(())
/// ```
#[derive(Default)]
pub struct ServiceFactory {
	channels: Vec<Arc<dyn DeliveryChannel>>,
	settings: Option<ServiceSettings>,
	default_channel: Option<String>,
	default_from: Option<MailAddress>,
	pause_sending: Option<bool>,
}

impl ServiceFactory {
	/// Create an empty factory.
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a channel.
	pub fn channel(mut self, channel: impl DeliveryChannel + 'static) -> Self {
		self.channels.push(Arc::new(channel));
		self
	}

	/// Register a channel that is already shared.
	pub fn shared_channel(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
		self.channels.push(channel);
		self
	}

	/// Register several shared channels.
	pub fn channels(
		mut self,
		channels: impl IntoIterator<Item = Arc<dyn DeliveryChannel>>,
	) -> Self {
		self.channels.extend(channels);
		self
	}

	/// Use these settings as the base for the service.
	pub fn settings(mut self, settings: ServiceSettings) -> Self {
		self.settings = Some(settings);
		self
	}

	/// Set the default channel name, overriding the settings.
	pub fn default_channel(mut self, name: impl Into<String>) -> Self {
		self.default_channel = Some(name.into());
		self
	}

	/// Set the default sender, overriding the settings.
	pub fn default_from(mut self, from: MailAddress) -> Self {
		self.default_from = Some(from);
		self
	}

	/// Pause or resume sending, overriding the settings.
	pub fn pause_sending(mut self, paused: bool) -> Self {
		self.pause_sending = Some(paused);
		self
	}

	/// Build the service.
	///
	/// Without explicit settings or a default channel name, a factory holding
	/// exactly one channel uses it as the default.
	pub fn build(self) -> EmailResult<EmailService> {
		let mut settings = match (self.settings, self.default_channel) {
			(Some(mut settings), Some(name)) => {
				settings.default_channel = name;
				settings
			}
			(Some(settings), None) => settings,
			(None, Some(name)) => ServiceSettings::new(name),
			(None, None) => match self.channels.as_slice() {
				[only] => ServiceSettings::new(only.name()),
				_ => {
					return Err(EmailError::Configuration(
						"default channel is not set".to_string(),
					));
				}
			},
		};

		if let Some(from) = self.default_from {
			settings.default_from = Some(from);
		}
		if let Some(paused) = self.pause_sending {
			settings.pause_sending = paused;
		}

		EmailService::new(self.channels, settings)
	}
}

impl std::fmt::Debug for ServiceFactory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let names: Vec<&str> = self.channels.iter().map(|c| c.name()).collect();
		f.debug_struct("ServiceFactory")
			.field("channels", &names)
			.field("settings", &self.settings)
			.field("default_channel", &self.default_channel)
			.field("default_from", &self.default_from)
			.field("pause_sending", &self.pause_sending)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{CancellationToken, Message, SendingResult};
	use async_trait::async_trait;
	use rstest::rstest;

	struct Stub(&'static str);

	#[async_trait]
	impl DeliveryChannel for Stub {
		fn name(&self) -> &str {
			self.0
		}

		fn send(&self, _message: &Message) -> SendingResult {
			SendingResult::success(self.0)
		}

		async fn send_async(
			&self,
			message: &Message,
			_cancel: &CancellationToken,
		) -> SendingResult {
			self.send(message)
		}
	}

	#[rstest]
	fn test_single_channel_becomes_default() {
		// Act
		let service = ServiceFactory::new().channel(Stub("memory")).build().unwrap();

		// Assert
		assert_eq!(service.settings().default_channel, "memory");
		assert!(!service.settings().pause_sending);
	}

	#[rstest]
	fn test_multiple_channels_require_default() {
		// Act
		let result = ServiceFactory::new()
			.channel(Stub("smtp"))
			.channel(Stub("sendgrid"))
			.build();

		// Assert
		assert!(matches!(result, Err(EmailError::Configuration(_))));
	}

	#[rstest]
	fn test_options_override_settings() {
		// Arrange
		let settings = ServiceSettings::new("smtp").with_pause_sending(true);

		// Act
		let service = ServiceFactory::new()
			.channels([
				Arc::new(Stub("smtp")) as Arc<dyn DeliveryChannel>,
				Arc::new(Stub("mailgun")),
			])
			.settings(settings)
			.default_channel("mailgun")
			.pause_sending(false)
			.default_from(MailAddress::new("ops@example.com").unwrap())
			.build()
			.unwrap();

		// Assert
		assert_eq!(service.default_channel().name(), "mailgun");
		assert!(!service.settings().pause_sending);
		assert_eq!(
			service.settings().default_from.as_ref().map(MailAddress::address),
			Some("ops@example.com")
		);
	}

	#[rstest]
	fn test_empty_factory_fails() {
		// Act
		let result = ServiceFactory::new().default_channel("smtp").build();

		// Assert
		assert!(matches!(result, Err(EmailError::Configuration(_))));
	}
}
