//! SendGrid delivery channel
//!
//! Sends messages through the SendGrid v3 `mail/send` API.
//!
//! Channel data understood by this channel:
//!
//! | Key | Effect |
//! |---|---|
//! | [`keys::API_KEY`] | replaces the configured API key for this message |
//! | [`keys::CAMPAIGN_ID`], [`keys::MAILING_ID`], [`keys::MESSAGE_ID`] | sent as `custom_args` |
//! | [`keys::TAGS`] | sent as `categories` (string or array of strings) |

use crate::http::{self, BlockingClient, ProviderReply};
use async_trait::async_trait;
use courier_mail::channel_data::keys;
use courier_mail::result::error_codes;
use courier_mail::{
	CancellationToken, DeliveryChannel, EmailError, EmailResult, MailAddress, Message, Priority,
	SendingError, SendingResult,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.sendgrid.com";
const SEND_PATH: &str = "/v3/mail/send";
const MESSAGE_ID_HEADER: &str = "x-message-id";

fn default_base_url() -> String {
	DEFAULT_BASE_URL.to_string()
}

/// SendGrid channel configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendGridConfig {
	pub api_key: String,
	#[serde(default = "default_base_url")]
	pub base_url: String,
	#[serde(default = "crate::default_timeout_secs")]
	pub timeout_secs: u64,
}

impl SendGridConfig {
	/// Create a configuration for the public SendGrid API.
	pub fn new(api_key: impl Into<String>) -> Self {
		Self {
			api_key: api_key.into(),
			base_url: default_base_url(),
			timeout_secs: crate::DEFAULT_TIMEOUT_SECS,
		}
	}

	/// Point the channel at a different API host, e.g. a regional endpoint.
	pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = base_url.into();
		self
	}

	/// Set the request timeout, rounded up to whole seconds.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout_secs = crate::timeout_secs(timeout);
		self
	}

	/// Check the configuration before a channel is built from it.
	pub fn validate(&self) -> EmailResult<()> {
		if self.api_key.trim().is_empty() {
			return Err(EmailError::Configuration(
				"SendGrid API key must not be empty".to_string(),
			));
		}
		if self.base_url.trim().is_empty() {
			return Err(EmailError::Configuration(
				"SendGrid base URL must not be empty".to_string(),
			));
		}
		crate::validate_timeout("SendGrid", self.timeout_secs)
	}

	fn endpoint(&self) -> String {
		format!("{}{}", self.base_url.trim_end_matches('/'), SEND_PATH)
	}
}

impl std::fmt::Debug for SendGridConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SendGridConfig")
			.field("api_key", &"[REDACTED]")
			.field("base_url", &self.base_url)
			.field("timeout_secs", &self.timeout_secs)
			.finish()
	}
}

/// SendGrid content
#[derive(Debug, Clone, Serialize)]
struct SendGridContent {
	#[serde(rename = "type")]
	content_type: String,
	value: String,
}

/// SendGrid email address
#[derive(Debug, Clone, Serialize)]
struct SendGridEmail {
	email: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	name: Option<String>,
}

impl From<&MailAddress> for SendGridEmail {
	fn from(address: &MailAddress) -> Self {
		Self {
			email: address.address().to_string(),
			name: address.display_name().map(str::to_string),
		}
	}
}

/// SendGrid personalization
#[derive(Debug, Clone, Serialize)]
struct SendGridPersonalization {
	to: Vec<SendGridEmail>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	cc: Vec<SendGridEmail>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	bcc: Vec<SendGridEmail>,
}

/// SendGrid attachment
#[derive(Debug, Clone, Serialize)]
struct SendGridAttachment {
	content: String,
	#[serde(rename = "type")]
	content_type: String,
	filename: String,
	disposition: &'static str,
}

/// SendGrid API request
#[derive(Debug, Clone, Serialize)]
struct SendGridRequest {
	personalizations: Vec<SendGridPersonalization>,
	from: SendGridEmail,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	reply_to_list: Vec<SendGridEmail>,
	#[serde(skip_serializing_if = "Option::is_none")]
	subject: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	content: Vec<SendGridContent>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	attachments: Vec<SendGridAttachment>,
	#[serde(skip_serializing_if = "IndexMap::is_empty")]
	headers: IndexMap<String, String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	categories: Vec<String>,
	#[serde(skip_serializing_if = "IndexMap::is_empty")]
	custom_args: IndexMap<String, String>,
}

/// Channel sending through the SendGrid API.
///
/// # Examples
///
/// ```no_run
/// use courier_channels::{SendGridChannel, SendGridConfig};
/// use courier_mail::{DeliveryChannel, MessageComposer};
///
/// # fn main() -> Result<(), courier_mail::EmailError> {
/// let channel = SendGridChannel::new(SendGridConfig::new("your-api-key"))?;
///
/// let message = MessageComposer::new()
///     .from("sender@example.com".parse()?)
///     .to_str("recipient@example.com")?
///     .subject("Test")
///     .plain_text("Hello!")
///     .with_channel_data("tags", vec!["welcome"])?
///     .build()?;
///
/// let result = channel.send(&message);
/// assert!(result.is_success());
/// # Ok(())
/// # }
/// ```
pub struct SendGridChannel {
	name: String,
	config: SendGridConfig,
	endpoint: String,
	client: reqwest::Client,
	blocking: BlockingClient,
}

impl SendGridChannel {
	/// Channel name used unless overridden with [`SendGridChannel::named`].
	pub const DEFAULT_NAME: &'static str = "sendgrid";

	/// Create a channel from a validated configuration.
	pub fn new(config: SendGridConfig) -> EmailResult<Self> {
		config.validate()?;
		let timeout = Duration::from_secs(config.timeout_secs);
		let client = http::async_client(timeout)?;
		Ok(Self::with_client(config, client))
	}

	/// Create a channel around an existing async client.
	pub fn with_client(config: SendGridConfig, client: reqwest::Client) -> Self {
		let timeout = Duration::from_secs(config.timeout_secs);
		Self {
			name: Self::DEFAULT_NAME.to_string(),
			endpoint: config.endpoint(),
			config,
			client,
			blocking: BlockingClient::new(timeout),
		}
	}

	/// Register the channel under a different name.
	pub fn named(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	/// Get the configuration
	pub fn config(&self) -> &SendGridConfig {
		&self.config
	}

	fn api_key<'a>(&'a self, message: &'a Message) -> &'a str {
		message
			.channel_data_value(keys::API_KEY)
			.and_then(|value| value.as_str())
			.filter(|key| !key.trim().is_empty())
			.unwrap_or(self.config.api_key.as_str())
	}

	fn build_request(&self, message: &Message) -> Result<SendGridRequest, SendingError> {
		let from = message.from().ok_or_else(|| {
			SendingError::new(error_codes::BUILD_FAILED, "message has no sender")
		})?;

		let personalization = SendGridPersonalization {
			to: message.to().iter().map(SendGridEmail::from).collect(),
			cc: message.cc().iter().map(SendGridEmail::from).collect(),
			bcc: message.bcc().iter().map(SendGridEmail::from).collect(),
		};

		let mut content = Vec::new();
		if let Some(text) = message.plain_text_body() {
			content.push(SendGridContent {
				content_type: "text/plain".to_string(),
				value: text.to_string(),
			});
		}
		if let Some(html) = message.html_body() {
			content.push(SendGridContent {
				content_type: "text/html".to_string(),
				value: html.to_string(),
			});
		}

		let attachments = message
			.attachments()
			.iter()
			.map(|attachment| {
				let content = attachment.content_base64().map_err(|e| {
					SendingError::from_error(error_codes::ATTACHMENT_UNREADABLE, e)
				})?;
				Ok(SendGridAttachment {
					content,
					content_type: attachment.mime_type().to_string(),
					filename: attachment.file_name().to_string(),
					disposition: "attachment",
				})
			})
			.collect::<Result<Vec<_>, SendingError>>()?;

		let mut headers: IndexMap<String, String> = message
			.headers()
			.iter()
			.map(|(name, value)| (name.to_string(), value.to_string()))
			.collect();
		if message.priority() != Priority::Normal {
			headers.insert(
				"X-Priority".to_string(),
				message.priority().x_priority().to_string(),
			);
			headers.insert(
				"Importance".to_string(),
				message.priority().importance().to_string(),
			);
		}

		let categories = message
			.channel_data_value(keys::TAGS)
			.map(crate::value_strings)
			.unwrap_or_default();

		let mut custom_args = IndexMap::new();
		for key in [keys::CAMPAIGN_ID, keys::MAILING_ID, keys::MESSAGE_ID] {
			if let Some(value) = message.channel_data_value(key) {
				custom_args.insert(key.to_string(), crate::value_strings(value).join(","));
			}
		}

		Ok(SendGridRequest {
			personalizations: vec![personalization],
			from: SendGridEmail::from(from),
			reply_to_list: message.reply_to().iter().map(SendGridEmail::from).collect(),
			subject: message.subject().map(str::to_string),
			content,
			attachments,
			headers,
			categories,
			custom_args,
		})
	}

	fn prepare(&self, message: &Message) -> Result<SendGridRequest, SendingResult> {
		self.build_request(message).map_err(|error| {
			tracing::warn!(channel = %self.name, %error, "Cannot build SendGrid request");
			SendingResult::failure(&self.name, [error])
		})
	}
}

fn provider_message_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
	headers
		.get(MESSAGE_ID_HEADER)
		.and_then(|value| value.to_str().ok())
		.map(str::to_string)
}

#[async_trait]
impl DeliveryChannel for SendGridChannel {
	fn name(&self) -> &str {
		&self.name
	}

	fn send(&self, message: &Message) -> SendingResult {
		let request = match self.prepare(message) {
			Ok(request) => request,
			Err(failure) => return failure,
		};
		let api_key = self.api_key(message);

		self.blocking.exchange(&self.name, |client| {
			let response = client
				.post(&self.endpoint)
				.bearer_auth(api_key)
				.json(&request)
				.send()?;
			let status = response.status();
			let message_id = provider_message_id(response.headers());
			let body = response.text().unwrap_or_default();
			Ok(ProviderReply {
				status,
				message_id,
				body,
			})
		})
	}

	async fn send_async(&self, message: &Message, cancel: &CancellationToken) -> SendingResult {
		let request = match self.prepare(message) {
			Ok(request) => request,
			Err(failure) => return failure,
		};

		let exchange = async {
			let response = self
				.client
				.post(&self.endpoint)
				.bearer_auth(self.api_key(message))
				.json(&request)
				.send()
				.await?;
			let status = response.status();
			let message_id = provider_message_id(response.headers());
			let body = response.text().await.unwrap_or_default();
			Ok::<_, reqwest::Error>(ProviderReply {
				status,
				message_id,
				body,
			})
		};

		tokio::select! {
			biased;

			_ = cancel.cancelled() => crate::cancelled(&self.name),
			outcome = exchange => match outcome {
				Ok(reply) => http::reply_result(&self.name, reply),
				Err(error) => http::transport_failure(&self.name, error),
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use courier_mail::{Attachment, MessageComposer};
	use rstest::{fixture, rstest};
	use serde_json::{Value, json};

	#[fixture]
	fn channel() -> SendGridChannel {
		SendGridChannel::new(SendGridConfig::new("test-key")).unwrap()
	}

	fn to_json(request: &SendGridRequest) -> Value {
		serde_json::to_value(request).unwrap()
	}

	#[rstest]
	fn test_config_rejects_blank_key() {
		// Act
		let result = SendGridChannel::new(SendGridConfig::new("  "));

		// Assert
		assert!(matches!(result, Err(EmailError::Configuration(_))));
	}

	#[rstest]
	fn test_sub_second_timeout_rounds_up() {
		// Act
		let config = SendGridConfig::new("key").with_timeout(Duration::from_millis(500));

		// Assert
		assert_eq!(config.timeout_secs, 1);
		assert!(SendGridChannel::new(config).is_ok());
	}

	#[rstest]
	fn test_zero_timeout_is_rejected() {
		// Arrange
		let config: SendGridConfig =
			serde_json::from_str(r#"{"api_key": "key", "timeout_secs": 0}"#).unwrap();

		// Act
		let result = SendGridChannel::new(config);

		// Assert
		assert!(matches!(result, Err(EmailError::Configuration(_))));
	}

	#[rstest]
	fn test_config_debug_redacts_key() {
		// Act
		let debug = format!("{:?}", SendGridConfig::new("super-secret"));

		// Assert
		assert!(!debug.contains("super-secret"));
	}

	#[rstest]
	fn test_endpoint_joins_base_url(channel: SendGridChannel) {
		// Arrange
		let eu = SendGridChannel::new(
			SendGridConfig::new("k").with_base_url("https://api.eu.sendgrid.com/"),
		)
		.unwrap();

		// Assert
		assert_eq!(channel.endpoint, "https://api.sendgrid.com/v3/mail/send");
		assert_eq!(eu.endpoint, "https://api.eu.sendgrid.com/v3/mail/send");
	}

	#[rstest]
	fn test_build_request_text_and_html(channel: SendGridChannel) {
		// Arrange
		let message = MessageComposer::new()
			.from_address("sender@example.com", Some("Sender"))
			.unwrap()
			.to_str("a@example.com;b@example.com")
			.unwrap()
			.cc_str("c@example.com")
			.unwrap()
			.subject("Test")
			.plain_text("Hello!")
			.html("<h1>Hello!</h1>")
			.build()
			.unwrap();

		// Act
		let body = to_json(&channel.build_request(&message).unwrap());

		// Assert
		assert_eq!(body["from"], json!({"email": "sender@example.com", "name": "Sender"}));
		assert_eq!(body["personalizations"][0]["to"].as_array().unwrap().len(), 2);
		assert_eq!(body["personalizations"][0]["cc"][0]["email"], "c@example.com");
		assert!(body["personalizations"][0].get("bcc").is_none());
		assert_eq!(body["content"][0]["type"], "text/plain");
		assert_eq!(body["content"][1]["type"], "text/html");
		assert_eq!(body["subject"], "Test");
	}

	#[rstest]
	fn test_build_request_requires_sender(channel: SendGridChannel) {
		// Arrange
		let message = MessageComposer::new()
			.to_str("a@example.com")
			.unwrap()
			.build()
			.unwrap();

		// Act
		let error = channel.build_request(&message).unwrap_err();

		// Assert
		assert_eq!(error.code(), error_codes::BUILD_FAILED);
	}

	#[rstest]
	fn test_build_request_channel_data(channel: SendGridChannel) {
		// Arrange
		let message = MessageComposer::new()
			.from_address("sender@example.com", None)
			.unwrap()
			.to_str("a@example.com")
			.unwrap()
			.with_channel_data(keys::TAGS, vec!["welcome", "onboarding"])
			.unwrap()
			.with_channel_data(keys::CAMPAIGN_ID, "spring-2024")
			.unwrap()
			.with_channel_data(keys::MAILING_ID, 42)
			.unwrap()
			.high_priority()
			.header("X-Trace", "t-1")
			.unwrap()
			.build()
			.unwrap();

		// Act
		let body = to_json(&channel.build_request(&message).unwrap());

		// Assert
		assert_eq!(body["categories"], json!(["welcome", "onboarding"]));
		assert_eq!(body["custom_args"]["campaign_id"], "spring-2024");
		assert_eq!(body["custom_args"]["mailing_id"], "42");
		assert_eq!(body["headers"]["X-Trace"], "t-1");
		assert_eq!(body["headers"]["X-Priority"], "1");
	}

	#[rstest]
	fn test_build_request_attachments(channel: SendGridChannel) {
		// Arrange
		let message = MessageComposer::new()
			.from_address("sender@example.com", None)
			.unwrap()
			.to_str("a@example.com")
			.unwrap()
			.attachment(Attachment::from_bytes("file.txt", b"Hello".to_vec()).unwrap())
			.build()
			.unwrap();

		// Act
		let body = to_json(&channel.build_request(&message).unwrap());

		// Assert
		assert_eq!(body["attachments"][0]["filename"], "file.txt");
		assert_eq!(body["attachments"][0]["type"], "text/plain");
		assert_eq!(body["attachments"][0]["content"], "SGVsbG8=");
		assert_eq!(body["attachments"][0]["disposition"], "attachment");
	}

	#[rstest]
	fn test_api_key_override(channel: SendGridChannel) {
		// Arrange
		let plain = MessageComposer::new()
			.to_str("a@example.com")
			.unwrap()
			.build()
			.unwrap();
		let overridden = MessageComposer::new()
			.to_str("a@example.com")
			.unwrap()
			.with_channel_data(keys::API_KEY, "tenant-key")
			.unwrap()
			.build()
			.unwrap();

		// Assert
		assert_eq!(channel.api_key(&plain), "test-key");
		assert_eq!(channel.api_key(&overridden), "tenant-key");
	}

	#[rstest]
	#[tokio::test]
	async fn test_send_async_honours_cancellation(channel: SendGridChannel) {
		// Arrange
		let message = MessageComposer::new()
			.from_address("sender@example.com", None)
			.unwrap()
			.to_str("a@example.com")
			.unwrap()
			.build()
			.unwrap();
		let cancel = CancellationToken::new();
		cancel.cancel();

		// Act
		let result = channel.send_async(&message, &cancel).await;

		// Assert
		assert!(!result.is_success());
		assert_eq!(result.errors()[0].code(), error_codes::CANCELLED);
	}

	#[rstest]
	#[tokio::test]
	async fn test_blocking_send_inside_runtime_returns_failure() {
		// Arrange
		let channel = SendGridChannel::new(
			SendGridConfig::new("test-key")
				.with_base_url("http://127.0.0.1:1")
				.with_timeout(Duration::from_secs(2)),
		)
		.unwrap();
		let message = MessageComposer::new()
			.from_address("sender@example.com", None)
			.unwrap()
			.to_str("a@example.com")
			.unwrap()
			.plain_text("x")
			.build()
			.unwrap();

		// Act
		let result = channel.send(&message);

		// Assert
		assert!(!result.is_success());
		assert_eq!(result.errors()[0].code(), error_codes::SEND_FAILED);
	}
}
