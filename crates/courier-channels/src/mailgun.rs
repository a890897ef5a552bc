//! Mailgun delivery channel
//!
//! Sends messages through the Mailgun messages API as `multipart/form-data`.
//!
//! Channel data understood by this channel:
//!
//! | Key | Form field |
//! |---|---|
//! | [`keys::API_KEY`] | replaces the configured API key for this message |
//! | [`keys::TAGS`] | one `o:tag` per tag |
//! | [`keys::CAMPAIGN_ID`] | `o:campaign` |
//! | [`keys::MAILING_ID`], [`keys::MESSAGE_ID`] | `v:<key>` user variables |

use crate::http::{self, BlockingClient, ProviderReply};
use async_trait::async_trait;
use courier_mail::channel_data::keys;
use courier_mail::result::error_codes;
use courier_mail::{
	CancellationToken, DeliveryChannel, EmailError, EmailResult, MailAddress, Message, Priority,
	SendingError, SendingResult,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Mailgun API region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailgunRegion {
	/// US region (api.mailgun.net)
	#[default]
	Us,
	/// EU region (api.eu.mailgun.net)
	Eu,
}

impl MailgunRegion {
	fn base_url(&self) -> &'static str {
		match self {
			MailgunRegion::Us => "https://api.mailgun.net/v3",
			MailgunRegion::Eu => "https://api.eu.mailgun.net/v3",
		}
	}
}

/// Mailgun channel configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailgunConfig {
	pub api_key: String,
	pub domain: String,
	#[serde(default)]
	pub region: MailgunRegion,
	/// Overrides the regional API root, e.g. for a proxy.
	#[serde(default)]
	pub base_url: Option<String>,
	#[serde(default = "crate::default_timeout_secs")]
	pub timeout_secs: u64,
}

impl MailgunConfig {
	/// Create a configuration for a sending domain in the US region.
	pub fn new(api_key: impl Into<String>, domain: impl Into<String>) -> Self {
		Self {
			api_key: api_key.into(),
			domain: domain.into(),
			region: MailgunRegion::default(),
			base_url: None,
			timeout_secs: crate::DEFAULT_TIMEOUT_SECS,
		}
	}

	/// Select the region whose API host is used.
	pub fn with_region(mut self, region: MailgunRegion) -> Self {
		self.region = region;
		self
	}

	/// Override the API root, e.g. for a proxy or a local test server.
	pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = Some(base_url.into());
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
				"Mailgun API key must not be empty".to_string(),
			));
		}
		if self.domain.trim().is_empty() {
			return Err(EmailError::Configuration(
				"Mailgun domain must not be empty".to_string(),
			));
		}
		crate::validate_timeout("Mailgun", self.timeout_secs)
	}

	fn endpoint(&self) -> String {
		let root = self
			.base_url
			.as_deref()
			.unwrap_or_else(|| self.region.base_url())
			.trim_end_matches('/');
		format!("{}/{}/messages", root, self.domain.trim())
	}
}

impl std::fmt::Debug for MailgunConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MailgunConfig")
			.field("api_key", &"[REDACTED]")
			.field("domain", &self.domain)
			.field("region", &self.region)
			.field("base_url", &self.base_url)
			.field("timeout_secs", &self.timeout_secs)
			.finish()
	}
}

/// File part of a Mailgun form.
#[derive(Debug, Clone)]
struct FormFile {
	file_name: String,
	mime_type: String,
	content: Vec<u8>,
}

/// Transport-neutral form content, converted into either client's form type.
#[derive(Debug, Clone, Default)]
struct MailgunForm {
	fields: Vec<(String, String)>,
	files: Vec<FormFile>,
}

impl MailgunForm {
	fn text(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.fields.push((name.into(), value.into()));
	}

	fn values(&self, name: &str) -> Vec<&str> {
		self.fields
			.iter()
			.filter(|(field, _)| field == name)
			.map(|(_, value)| value.as_str())
			.collect()
	}

	fn into_async(self) -> Result<reqwest::multipart::Form, reqwest::Error> {
		let mut form = reqwest::multipart::Form::new();
		for (name, value) in self.fields {
			form = form.text(name, value);
		}
		for file in self.files {
			let part = reqwest::multipart::Part::bytes(file.content)
				.file_name(file.file_name)
				.mime_str(&file.mime_type)?;
			form = form.part("attachment", part);
		}
		Ok(form)
	}

	fn into_blocking(self) -> Result<reqwest::blocking::multipart::Form, reqwest::Error> {
		let mut form = reqwest::blocking::multipart::Form::new();
		for (name, value) in self.fields {
			form = form.text(name, value);
		}
		for file in self.files {
			let part = reqwest::blocking::multipart::Part::bytes(file.content)
				.file_name(file.file_name)
				.mime_str(&file.mime_type)?;
			form = form.part("attachment", part);
		}
		Ok(form)
	}
}

/// Mailgun response body
#[derive(Debug, Deserialize)]
struct MailgunResponse {
	id: Option<String>,
}

/// Channel sending through the Mailgun API.
///
/// # Examples
///
/// ```no_run
/// use courier_channels::{MailgunChannel, MailgunConfig, MailgunRegion};
///
/// # fn main() -> Result<(), courier_mail::EmailError> {
/// let channel = MailgunChannel::new(
///     MailgunConfig::new("your-api-key", "mg.example.com").with_region(MailgunRegion::Eu),
/// )?;
/// # Ok(())
/// # }
/// ```
pub struct MailgunChannel {
	name: String,
	config: MailgunConfig,
	endpoint: String,
	client: reqwest::Client,
	blocking: BlockingClient,
}

impl MailgunChannel {
	/// Channel name used unless overridden with [`MailgunChannel::named`].
	pub const DEFAULT_NAME: &'static str = "mailgun";

	/// Create a channel from a validated configuration.
	pub fn new(config: MailgunConfig) -> EmailResult<Self> {
		config.validate()?;
		let timeout = Duration::from_secs(config.timeout_secs);
		let client = http::async_client(timeout)?;
		Ok(Self::with_client(config, client))
	}

	/// Create a channel around an existing async client.
	pub fn with_client(config: MailgunConfig, client: reqwest::Client) -> Self {
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
	pub fn config(&self) -> &MailgunConfig {
		&self.config
	}

	fn api_key<'a>(&'a self, message: &'a Message) -> &'a str {
		message
			.channel_data_value(keys::API_KEY)
			.and_then(|value| value.as_str())
			.filter(|key| !key.trim().is_empty())
			.unwrap_or(self.config.api_key.as_str())
	}

	fn build_form(&self, message: &Message) -> Result<MailgunForm, SendingError> {
		let from = message.from().ok_or_else(|| {
			SendingError::new(error_codes::BUILD_FAILED, "message has no sender")
		})?;

		let mut form = MailgunForm::default();
		form.text("from", from.to_string());
		for to in message.to() {
			form.text("to", to.to_string());
		}
		for cc in message.cc() {
			form.text("cc", cc.to_string());
		}
		for bcc in message.bcc() {
			form.text("bcc", bcc.to_string());
		}
		if !message.reply_to().is_empty() {
			let reply_to: Vec<String> = message
				.reply_to()
				.iter()
				.map(MailAddress::to_string)
				.collect();
			form.text("h:Reply-To", reply_to.join(", "));
		}
		if let Some(subject) = message.subject() {
			form.text("subject", subject);
		}
		if let Some(text) = message.plain_text_body() {
			form.text("text", text);
		}
		if let Some(html) = message.html_body() {
			form.text("html", html);
		}

		for (name, value) in message.headers() {
			form.text(format!("h:{name}"), value);
		}
		if message.priority() != Priority::Normal {
			form.text("h:X-Priority", message.priority().x_priority());
			form.text("h:Importance", message.priority().importance());
		}

		if let Some(tags) = message.channel_data_value(keys::TAGS) {
			for tag in crate::value_strings(tags) {
				form.text("o:tag", tag);
			}
		}
		if let Some(campaign) = message.channel_data_value(keys::CAMPAIGN_ID) {
			form.text("o:campaign", crate::value_strings(campaign).join(","));
		}
		for key in [keys::MAILING_ID, keys::MESSAGE_ID] {
			if let Some(value) = message.channel_data_value(key) {
				form.text(format!("v:{key}"), crate::value_strings(value).join(","));
			}
		}

		for attachment in message.attachments() {
			let content = attachment
				.content_bytes()
				.map_err(|e| SendingError::from_error(error_codes::ATTACHMENT_UNREADABLE, e))?;
			form.files.push(FormFile {
				file_name: attachment.file_name().to_string(),
				mime_type: attachment.mime_type().to_string(),
				content: content.into_owned(),
			});
		}

		Ok(form)
	}

	fn prepare(&self, message: &Message) -> Result<MailgunForm, SendingResult> {
		self.build_form(message).map_err(|error| {
			tracing::warn!(channel = %self.name, %error, "Cannot build Mailgun form");
			SendingResult::failure(&self.name, [error])
		})
	}

	fn form_failure(&self, error: reqwest::Error) -> SendingResult {
		tracing::warn!(channel = %self.name, %error, "Invalid Mailgun form part");
		SendingResult::failure(
			&self.name,
			[SendingError::from_error(error_codes::BUILD_FAILED, error)],
		)
	}
}

fn reply(status: reqwest::StatusCode, body: String) -> ProviderReply {
	let message_id = if status.is_success() {
		serde_json::from_str::<MailgunResponse>(&body)
			.ok()
			.and_then(|response| response.id)
	} else {
		None
	};
	ProviderReply {
		status,
		message_id,
		body,
	}
}

#[async_trait]
impl DeliveryChannel for MailgunChannel {
	fn name(&self) -> &str {
		&self.name
	}

	fn send(&self, message: &Message) -> SendingResult {
		let form = match self.prepare(message) {
			Ok(form) => form,
			Err(failure) => return failure,
		};
		let form = match form.into_blocking() {
			Ok(form) => form,
			Err(error) => return self.form_failure(error),
		};
		let api_key = self.api_key(message);

		self.blocking.exchange(&self.name, |client| {
			let response = client
				.post(&self.endpoint)
				.basic_auth("api", Some(api_key))
				.multipart(form)
				.send()?;
			let status = response.status();
			let body = response.text().unwrap_or_default();
			Ok(reply(status, body))
		})
	}

	async fn send_async(&self, message: &Message, cancel: &CancellationToken) -> SendingResult {
		let form = match self.prepare(message) {
			Ok(form) => form,
			Err(failure) => return failure,
		};
		let form = match form.into_async() {
			Ok(form) => form,
			Err(error) => return self.form_failure(error),
		};

		let exchange = async {
			let response = self
				.client
				.post(&self.endpoint)
				.basic_auth("api", Some(self.api_key(message)))
				.multipart(form)
				.send()
				.await?;
			let status = response.status();
			let body = response.text().await.unwrap_or_default();
			Ok::<_, reqwest::Error>(reply(status, body))
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

	#[fixture]
	fn channel() -> MailgunChannel {
		MailgunChannel::new(MailgunConfig::new("test-key", "mg.example.com")).unwrap()
	}

	fn sender_message() -> MessageComposer {
		MessageComposer::new()
			.from_address("sender@mg.example.com", Some("Sender"))
			.unwrap()
			.to_str("a@example.com")
			.unwrap()
	}

	#[rstest]
	#[case(MailgunRegion::Us, "https://api.mailgun.net/v3/mg.example.com/messages")]
	#[case(MailgunRegion::Eu, "https://api.eu.mailgun.net/v3/mg.example.com/messages")]
	fn test_endpoint_per_region(#[case] region: MailgunRegion, #[case] expected: &str) {
		// Act
		let config = MailgunConfig::new("key", "mg.example.com").with_region(region);

		// Assert
		assert_eq!(config.endpoint(), expected);
	}

	#[rstest]
	fn test_endpoint_base_url_override() {
		// Act
		let config = MailgunConfig::new("key", "mg.example.com")
			.with_base_url("http://localhost:8080/v3/");

		// Assert
		assert_eq!(config.endpoint(), "http://localhost:8080/v3/mg.example.com/messages");
	}

	#[rstest]
	#[case(MailgunConfig::new("", "mg.example.com"))]
	#[case(MailgunConfig::new("key", " "))]
	#[case(MailgunConfig { timeout_secs: 0, ..MailgunConfig::new("key", "mg.example.com") })]
	fn test_config_validation(#[case] config: MailgunConfig) {
		// Act
		let result = MailgunChannel::new(config);

		// Assert
		assert!(matches!(result, Err(EmailError::Configuration(_))));
	}

	#[rstest]
	fn test_sub_second_timeout_rounds_up() {
		// Act
		let config = MailgunConfig::new("key", "mg.example.com")
			.with_timeout(Duration::from_millis(500));

		// Assert
		assert_eq!(config.timeout_secs, 1);
		assert!(MailgunChannel::new(config).is_ok());
	}

	#[rstest]
	fn test_region_deserializes_lowercase() {
		// Act
		let config: MailgunConfig = serde_json::from_str(
			r#"{"api_key": "k", "domain": "mg.example.com", "region": "eu"}"#,
		)
		.unwrap();

		// Assert
		assert_eq!(config.region, MailgunRegion::Eu);
		assert_eq!(config.timeout_secs, crate::DEFAULT_TIMEOUT_SECS);
	}

	#[rstest]
	fn test_build_form_recipients_and_body(channel: MailgunChannel) {
		// Arrange
		let message = sender_message()
			.cc_str("c@example.com")
			.unwrap()
			.bcc_str("b@example.com")
			.unwrap()
			.reply_to_str("r1@example.com;r2@example.com")
			.unwrap()
			.subject("Test")
			.plain_text("Hello!")
			.html("<p>Hello!</p>")
			.build()
			.unwrap();

		// Act
		let form = channel.build_form(&message).unwrap();

		// Assert
		assert_eq!(form.values("from"), vec!["Sender <sender@mg.example.com>"]);
		assert_eq!(form.values("to"), vec!["a@example.com"]);
		assert_eq!(form.values("cc"), vec!["c@example.com"]);
		assert_eq!(form.values("bcc"), vec!["b@example.com"]);
		assert_eq!(form.values("h:Reply-To"), vec!["r1@example.com, r2@example.com"]);
		assert_eq!(form.values("text"), vec!["Hello!"]);
		assert_eq!(form.values("html"), vec!["<p>Hello!</p>"]);
	}

	#[rstest]
	fn test_build_form_options_and_variables(channel: MailgunChannel) {
		// Arrange
		let message = sender_message()
			.with_channel_data(keys::TAGS, vec!["welcome", "onboarding"])
			.unwrap()
			.with_channel_data(keys::CAMPAIGN_ID, "spring")
			.unwrap()
			.with_channel_data(keys::MAILING_ID, "m-7")
			.unwrap()
			.header("X-Trace", "t-1")
			.unwrap()
			.low_priority()
			.build()
			.unwrap();

		// Act
		let form = channel.build_form(&message).unwrap();

		// Assert
		assert_eq!(form.values("o:tag"), vec!["welcome", "onboarding"]);
		assert_eq!(form.values("o:campaign"), vec!["spring"]);
		assert_eq!(form.values("v:mailing_id"), vec!["m-7"]);
		assert_eq!(form.values("h:X-Trace"), vec!["t-1"]);
		assert_eq!(form.values("h:X-Priority"), vec!["5"]);
	}

	#[rstest]
	fn test_build_form_attachments(channel: MailgunChannel) {
		// Arrange
		let message = sender_message()
			.attachment(Attachment::from_bytes("report.csv", b"a,b".to_vec()).unwrap())
			.build()
			.unwrap();

		// Act
		let form = channel.build_form(&message).unwrap();

		// Assert
		assert_eq!(form.files.len(), 1);
		assert_eq!(form.files[0].file_name, "report.csv");
		assert_eq!(form.files[0].mime_type, "text/csv");
		assert_eq!(form.files[0].content, b"a,b");
		assert!(form.into_async().is_ok());
	}

	#[rstest]
	fn test_build_form_unreadable_attachment(channel: MailgunChannel) {
		// Arrange
		let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
		let attachment = Attachment::from_path(file.path()).unwrap();
		let message = sender_message().attachment(attachment).build().unwrap();
		drop(file);

		// Act
		let error = channel.build_form(&message).unwrap_err();

		// Assert
		assert_eq!(error.code(), error_codes::ATTACHMENT_UNREADABLE);
	}

	#[rstest]
	fn test_reply_parses_message_id() {
		// Act
		let ok = reply(
			reqwest::StatusCode::OK,
			r#"{"id": "<20240101.1@mg.example.com>", "message": "Queued. Thank you."}"#.to_string(),
		);
		let rejected = reply(reqwest::StatusCode::BAD_REQUEST, r#"{"id": "x"}"#.to_string());

		// Assert
		assert_eq!(ok.message_id.as_deref(), Some("<20240101.1@mg.example.com>"));
		assert_eq!(rejected.message_id, None);
	}

	#[rstest]
	#[tokio::test]
	async fn test_blocking_send_inside_runtime_returns_failure() {
		// Arrange
		let channel = MailgunChannel::new(
			MailgunConfig::new("test-key", "mg.example.com")
				.with_base_url("http://127.0.0.1:1")
				.with_timeout(Duration::from_secs(2)),
		)
		.unwrap();
		let message = sender_message().plain_text("x").build().unwrap();

		// Act
		let result = channel.send(&message);

		// Assert
		assert!(!result.is_success());
		assert_eq!(result.errors()[0].code(), error_codes::SEND_FAILED);
	}
}
