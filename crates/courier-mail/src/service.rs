//! Delivery orchestration.
//!
//! [`EmailService`] owns a fixed registry of channels and the service settings.
//! Each send resolves one channel, fills in the default sender, honours the
//! pause switch and then makes exactly one attempt through that channel.

use crate::result::metadata_keys;
use crate::{
	DeliveryChannel, EmailError, EmailResult, Message, SendingResult, ServiceFactory,
	ServiceSettings,
};
use indexmap::IndexMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Sends messages through registered delivery channels.
///
/// The registry is immutable after construction, so a service can be shared
/// between threads (for example behind an `Arc`) without locking.
///
/// Caller and configuration mistakes are returned as `Err`. Anything the
/// channel reports, including delivery failures, comes back as
/// `Ok(SendingResult)` exactly as the channel produced it.
pub struct EmailService {
	channels: IndexMap<String, Arc<dyn DeliveryChannel>>,
	default_channel: Arc<dyn DeliveryChannel>,
	settings: ServiceSettings,
}

impl EmailService {
	/// Create a service from its channels and settings.
	///
	/// Fails if no channel is given, two channels share a name, the settings are
	/// invalid, or the default channel is not among the channels.
	pub fn new(
		channels: impl IntoIterator<Item = Arc<dyn DeliveryChannel>>,
		settings: ServiceSettings,
	) -> EmailResult<Self> {
		settings.validate()?;

		let mut registry: IndexMap<String, Arc<dyn DeliveryChannel>> = IndexMap::new();
		for channel in channels {
			let name = channel.name().to_string();
			if name.trim().is_empty() {
				return Err(EmailError::Configuration(
					"channel name must not be empty".to_string(),
				));
			}
			if registry.contains_key(&name) {
				return Err(EmailError::Configuration(format!(
					"duplicate channel name: {name}"
				)));
			}
			tracing::debug!(channel = %name, "Registered delivery channel");
			registry.insert(name, channel);
		}

		if registry.is_empty() {
			return Err(EmailError::Configuration(
				"at least one delivery channel is required".to_string(),
			));
		}

		let default_channel = registry
			.get(&settings.default_channel)
			.cloned()
			.ok_or_else(|| {
				EmailError::Configuration(format!(
					"default channel '{}' is not registered",
					settings.default_channel
				))
			})?;

		Ok(Self {
			channels: registry,
			default_channel,
			settings,
		})
	}

	/// Start assembling a service with [`ServiceFactory`].
	pub fn builder() -> ServiceFactory {
		ServiceFactory::new()
	}

	/// Get the settings
	pub fn settings(&self) -> &ServiceSettings {
		&self.settings
	}

	/// Get the default channel
	pub fn default_channel(&self) -> &Arc<dyn DeliveryChannel> {
		&self.default_channel
	}

	/// Look up a registered channel by name.
	pub fn channel(&self, name: &str) -> Option<&Arc<dyn DeliveryChannel>> {
		self.channels.get(name)
	}

	/// Names of all registered channels, in registration order.
	pub fn channel_names(&self) -> impl Iterator<Item = &str> {
		self.channels.keys().map(String::as_str)
	}

	/// Send through the default channel.
	pub fn send(&self, message: &mut Message) -> EmailResult<SendingResult> {
		let channel = Arc::clone(&self.default_channel);
		self.send_with(message, channel.as_ref())
	}

	/// Send through the channel registered under `channel_name`.
	pub fn send_through(
		&self,
		message: &mut Message,
		channel_name: &str,
	) -> EmailResult<SendingResult> {
		let channel = self.resolve(channel_name)?;
		self.send_with(message, channel.as_ref())
	}

	/// Send through an explicit channel instance, registered or not.
	pub fn send_with(
		&self,
		message: &mut Message,
		channel: &dyn DeliveryChannel,
	) -> EmailResult<SendingResult> {
		if let Some(paused) = self.prepare(message, channel)? {
			return Ok(paused);
		}

		let result = channel.send(message);
		log_outcome(&result);
		Ok(result)
	}

	/// Send through the default channel asynchronously.
	pub async fn send_async(
		&self,
		message: &mut Message,
		cancel: &CancellationToken,
	) -> EmailResult<SendingResult> {
		let channel = Arc::clone(&self.default_channel);
		self.send_with_async(message, channel.as_ref(), cancel).await
	}

	/// Send through the channel registered under `channel_name` asynchronously.
	pub async fn send_through_async(
		&self,
		message: &mut Message,
		channel_name: &str,
		cancel: &CancellationToken,
	) -> EmailResult<SendingResult> {
		let channel = self.resolve(channel_name)?;
		self.send_with_async(message, channel.as_ref(), cancel).await
	}

	/// Send through an explicit channel instance asynchronously.
	///
	/// The token is handed to the channel untouched; the service itself never
	/// checks it.
	pub async fn send_with_async(
		&self,
		message: &mut Message,
		channel: &dyn DeliveryChannel,
		cancel: &CancellationToken,
	) -> EmailResult<SendingResult> {
		if let Some(paused) = self.prepare(message, channel)? {
			return Ok(paused);
		}

		let result = channel.send_async(message, cancel).await;
		log_outcome(&result);
		Ok(result)
	}

	fn resolve(&self, channel_name: &str) -> EmailResult<Arc<dyn DeliveryChannel>> {
		if channel_name.trim().is_empty() {
			return Err(EmailError::EmptyArgument("channel_name"));
		}
		self.channels
			.get(channel_name)
			.cloned()
			.ok_or_else(|| EmailError::ChannelNotFound(channel_name.to_string()))
	}

	/// Apply the default sender and the pause switch.
	///
	/// Returns the synthetic result to hand back when sending is paused.
	fn prepare(
		&self,
		message: &mut Message,
		channel: &dyn DeliveryChannel,
	) -> EmailResult<Option<SendingResult>> {
		if message.from().is_none() {
			let Some(default_from) = &self.settings.default_from else {
				return Err(EmailError::MissingSender);
			};
			tracing::debug!(from = %default_from, "Applying default sender");
			message.set_from(default_from.clone());
		}

		if self.settings.pause_sending {
			tracing::info!(
				channel = %channel.name(),
				recipients = message.to().len(),
				"Sending is paused; message accepted without delivery"
			);
			let result = SendingResult::success(channel.name())
				.with_metadata(metadata_keys::SENDING_PAUSED, true)?;
			return Ok(Some(result));
		}

		tracing::debug!(
			channel = %channel.name(),
			recipients = message.all_recipients().len(),
			attachments = message.attachments().len(),
			"Dispatching message"
		);
		Ok(None)
	}
}

fn log_outcome(result: &SendingResult) {
	if result.is_success() {
		tracing::debug!(channel = %result.channel_name(), "Message delivered");
	} else {
		let codes: Vec<&str> = result.errors().iter().map(|e| e.code()).collect();
		tracing::warn!(
			channel = %result.channel_name(),
			errors = ?codes,
			"Delivery channel reported failure"
		);
	}
}

impl std::fmt::Debug for EmailService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EmailService")
			.field("channels", &self.channels.keys().collect::<Vec<_>>())
			.field("default_channel", &self.default_channel.name())
			.field("settings", &self.settings)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{MailAddress, MessageComposer};
	use async_trait::async_trait;
	use rstest::rstest;

	struct NamedChannel(&'static str);

	#[async_trait]
	impl DeliveryChannel for NamedChannel {
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

	fn channel(name: &'static str) -> Arc<dyn DeliveryChannel> {
		Arc::new(NamedChannel(name))
	}

	#[rstest]
	fn test_new_rejects_empty_registry() {
		// Act
		let result = EmailService::new(Vec::new(), ServiceSettings::new("smtp"));

		// Assert
		assert!(matches!(result, Err(EmailError::Configuration(_))));
	}

	#[rstest]
	fn test_new_rejects_unknown_default() {
		// Act
		let result = EmailService::new(vec![channel("smtp")], ServiceSettings::new("sendgrid"));

		// Assert
		assert!(matches!(result, Err(EmailError::Configuration(msg)) if msg.contains("sendgrid")));
	}

	#[rstest]
	fn test_new_rejects_duplicate_names() {
		// Act
		let result = EmailService::new(
			vec![channel("smtp"), channel("smtp")],
			ServiceSettings::new("smtp"),
		);

		// Assert
		assert!(matches!(result, Err(EmailError::Configuration(_))));
	}

	#[rstest]
	fn test_send_through_blank_name_is_argument_error() {
		// Arrange
		let service = EmailService::new(
			vec![channel("smtp")],
			ServiceSettings::new("smtp")
				.with_default_from(MailAddress::new("noreply@example.com").unwrap()),
		)
		.unwrap();
		let mut message = MessageComposer::new()
			.to_str("a@example.com")
			.unwrap()
			.build()
			.unwrap();

		// Act
		let result = service.send_through(&mut message, " ");

		// Assert
		assert!(matches!(result, Err(EmailError::EmptyArgument("channel_name"))));
	}

	#[rstest]
	fn test_channel_names_in_registration_order() {
		// Arrange
		let service = EmailService::new(
			vec![channel("smtp"), channel("sendgrid"), channel("mailgun")],
			ServiceSettings::new("sendgrid"),
		)
		.unwrap();

		// Act
		let names: Vec<&str> = service.channel_names().collect();

		// Assert
		assert_eq!(names, vec!["smtp", "sendgrid", "mailgun"]);
		assert_eq!(service.default_channel().name(), "sendgrid");
		assert!(service.channel("mailgun").is_some());
	}
}
