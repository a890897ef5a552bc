//! SMTP delivery channel
//!
//! Builds a MIME message with `lettre` and submits it over SMTP. Blocking sends
//! use [`SmtpTransport`]; async sends use [`AsyncSmtpTransport`] on Tokio and
//! stop waiting as soon as the cancellation token fires.
//!
//! [`keys::MESSAGE_ID`] channel data, when present, becomes the `Message-ID`
//! header.

use async_trait::async_trait;
use courier_mail::channel_data::keys;
use courier_mail::result::{error_codes, metadata_keys};
use courier_mail::{
	CancellationToken, DeliveryChannel, EmailError, EmailResult, Message, Priority, SendingError,
	SendingResult,
};
use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{Attachment as MimeAttachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::response::Response;
use lettre::{AsyncSmtpTransport, AsyncTransport, SmtpTransport, Tokio1Executor, Transport};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_PORT: u16 = 587;

fn default_port() -> u16 {
	DEFAULT_PORT
}

/// Connection security
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
	/// Plain connection. Only for local relays and test servers.
	None,
	/// Upgrade with STARTTLS; the upgrade is required.
	#[default]
	StartTls,
	/// TLS from the first byte (SMTPS).
	Tls,
}

/// SMTP channel configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub password: Option<String>,
	#[serde(default)]
	pub security: SmtpSecurity,
	#[serde(default = "crate::default_timeout_secs")]
	pub timeout_secs: u64,
}

impl SmtpConfig {
	/// Create a configuration using STARTTLS and no credentials.
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			username: None,
			password: None,
			security: SmtpSecurity::default(),
			timeout_secs: crate::DEFAULT_TIMEOUT_SECS,
		}
	}

	/// Authenticate with the given username and password.
	pub fn with_credentials(
		mut self,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		self.username = Some(username.into());
		self.password = Some(password.into());
		self
	}

	/// Set how the connection is secured.
	pub fn with_security(mut self, security: SmtpSecurity) -> Self {
		self.security = security;
		self
	}

	/// Set the connection timeout, rounded up to whole seconds.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout_secs = crate::timeout_secs(timeout);
		self
	}

	/// Check the configuration before a channel is built from it.
	pub fn validate(&self) -> EmailResult<()> {
		if self.host.trim().is_empty() {
			return Err(EmailError::Configuration(
				"SMTP host must not be empty".to_string(),
			));
		}
		if self.port == 0 {
			return Err(EmailError::Configuration(
				"SMTP port must not be 0".to_string(),
			));
		}
		if self.password.is_some() && self.username.is_none() {
			return Err(EmailError::Configuration(
				"SMTP password given without a username".to_string(),
			));
		}
		crate::validate_timeout("SMTP", self.timeout_secs)
	}

	fn credentials(&self) -> Option<Credentials> {
		self.username.as_ref().map(|username| {
			Credentials::new(username.clone(), self.password.clone().unwrap_or_default())
		})
	}

	fn timeout(&self) -> Option<Duration> {
		Some(Duration::from_secs(self.timeout_secs))
	}
}

impl std::fmt::Debug for SmtpConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SmtpConfig")
			.field("host", &self.host)
			.field("port", &self.port)
			.field("username", &self.username)
			.field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
			.field("security", &self.security)
			.field("timeout_secs", &self.timeout_secs)
			.finish()
	}
}

/// Channel submitting messages to an SMTP server.
///
/// # Examples
///
/// ```no_run
/// use courier_channels::{SmtpChannel, SmtpConfig, SmtpSecurity};
/// use courier_mail::{DeliveryChannel, MessageComposer};
///
/// # fn main() -> Result<(), courier_mail::EmailError> {
/// let channel = SmtpChannel::new(
///     SmtpConfig::new("smtp.example.com", 465)
///         .with_security(SmtpSecurity::Tls)
///         .with_credentials("user", "secret"),
/// )?;
///
/// let message = MessageComposer::new()
///     .from("sender@example.com".parse()?)
///     .to_str("recipient@example.com")?
///     .subject("Test")
///     .plain_text("Hello!")
///     .build()?;
///
/// let result = channel.send(&message);
/// # Ok(())
/// # }
/// ```
pub struct SmtpChannel {
	name: String,
	config: SmtpConfig,
	transport: SmtpTransport,
	async_transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpChannel {
	/// Channel name used unless overridden with [`SmtpChannel::named`].
	pub const DEFAULT_NAME: &'static str = "smtp";

	/// Create a channel from a validated configuration.
	pub fn new(config: SmtpConfig) -> EmailResult<Self> {
		config.validate()?;
		let transport = blocking_transport(&config)?;
		let async_transport = async_transport(&config)?;
		tracing::debug!(
			host = %config.host,
			port = config.port,
			security = ?config.security,
			"SMTP channel configured"
		);
		Ok(Self {
			name: Self::DEFAULT_NAME.to_string(),
			config,
			transport,
			async_transport,
		})
	}

	/// Register the channel under a different name.
	pub fn named(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	/// Get the configuration
	pub fn config(&self) -> &SmtpConfig {
		&self.config
	}

	fn prepare(&self, message: &Message) -> Result<lettre::Message, SendingResult> {
		build_mime(message).map_err(|error| {
			tracing::warn!(channel = %self.name, %error, "Cannot build MIME message");
			SendingResult::failure(&self.name, [error])
		})
	}

	fn outcome(
		&self,
		message_id: Option<String>,
		outcome: Result<Response, lettre::transport::smtp::Error>,
	) -> SendingResult {
		match outcome {
			Ok(response) => {
				let mut result = SendingResult::success(&self.name);
				if let Some(id) = message_id {
					crate::record_metadata(&mut result, metadata_keys::MESSAGE_ID, id);
				}
				let text: Vec<&str> = response.message().collect();
				crate::record_metadata(
					&mut result,
					metadata_keys::PROVIDER_RESPONSE,
					format!("{} {}", response.code(), text.join(" ")),
				);
				result
			}
			Err(error) => {
				let code = if error.is_permanent() {
					error_codes::PROVIDER_REJECTED
				} else {
					error_codes::SEND_FAILED
				};
				tracing::warn!(channel = %self.name, %error, "SMTP submission failed");
				SendingResult::failure(&self.name, [SendingError::from_error(code, error)])
			}
		}
	}
}

fn blocking_transport(config: &SmtpConfig) -> EmailResult<SmtpTransport> {
	let builder = match config.security {
		SmtpSecurity::None => SmtpTransport::builder_dangerous(&config.host),
		SmtpSecurity::StartTls => SmtpTransport::starttls_relay(&config.host).map_err(relay_error)?,
		SmtpSecurity::Tls => SmtpTransport::relay(&config.host).map_err(relay_error)?,
	};
	let builder = builder.port(config.port).timeout(config.timeout());
	Ok(match config.credentials() {
		Some(credentials) => builder.credentials(credentials).build(),
		None => builder.build(),
	})
}

fn async_transport(config: &SmtpConfig) -> EmailResult<AsyncSmtpTransport<Tokio1Executor>> {
	type Async = AsyncSmtpTransport<Tokio1Executor>;
	let builder = match config.security {
		SmtpSecurity::None => Async::builder_dangerous(&config.host),
		SmtpSecurity::StartTls => Async::starttls_relay(&config.host).map_err(relay_error)?,
		SmtpSecurity::Tls => Async::relay(&config.host).map_err(relay_error)?,
	};
	let builder = builder.port(config.port).timeout(config.timeout());
	Ok(match config.credentials() {
		Some(credentials) => builder.credentials(credentials).build(),
		None => builder.build(),
	})
}

fn relay_error(error: lettre::transport::smtp::Error) -> EmailError {
	EmailError::Configuration(format!("Cannot build SMTP transport: {error}"))
}

fn build_failed(message: impl Into<String>) -> SendingError {
	SendingError::new(error_codes::BUILD_FAILED, message)
}

fn raw_header(name: &str, value: &str) -> Result<HeaderValue, SendingError> {
	let header_name = HeaderName::new_from_ascii(name.to_string())
		.map_err(|_| build_failed(format!("invalid header name: {name}")))?;
	Ok(HeaderValue::new(header_name, value.to_string()))
}

fn text_part(subtype: &str, body: &str, charset: Option<&str>) -> Result<SinglePart, SendingError> {
	let raw = format!("text/{subtype}; charset={}", charset.unwrap_or("utf-8"));
	let content_type = ContentType::parse(&raw)
		.map_err(|e| build_failed(format!("invalid content type '{raw}': {e}")))?;
	Ok(SinglePart::builder()
		.header(content_type)
		.body(body.to_string()))
}

/// Convert a [`Message`] into a `lettre` MIME message.
///
/// Text and HTML bodies become `multipart/alternative`; attachments wrap the
/// body in `multipart/mixed`. File-backed attachments are read here.
pub(crate) fn build_mime(message: &Message) -> Result<lettre::Message, SendingError> {
	let from = message
		.from()
		.ok_or_else(|| build_failed("message has no sender"))?;

	let mut builder = lettre::Message::builder().from(from.to_mailbox());
	for to in message.to() {
		builder = builder.to(to.to_mailbox());
	}
	for cc in message.cc() {
		builder = builder.cc(cc.to_mailbox());
	}
	for bcc in message.bcc() {
		builder = builder.bcc(bcc.to_mailbox());
	}
	for reply_to in message.reply_to() {
		builder = builder.reply_to(reply_to.to_mailbox());
	}
	if let Some(subject) = message.subject() {
		builder = builder.subject(subject);
	}
	if let Some(id) = message.channel_data_value(keys::MESSAGE_ID).and_then(|v| v.as_str()) {
		builder = builder.message_id(Some(id.to_string()));
	}
	if message.priority() != Priority::Normal {
		builder = builder
			.raw_header(raw_header("X-Priority", message.priority().x_priority())?)
			.raw_header(raw_header("Importance", message.priority().importance())?);
	}
	for (name, value) in message.headers() {
		builder = builder.raw_header(raw_header(name, value)?);
	}

	let charset = message.charset();
	let text = message
		.plain_text_body()
		.map(|body| text_part("plain", body, charset))
		.transpose()?;
	let html = message
		.html_body()
		.map(|body| text_part("html", body, charset))
		.transpose()?;

	let body = match (text, html) {
		(Some(text), Some(html)) => {
			MimeBody::Multi(MultiPart::alternative().singlepart(text).singlepart(html))
		}
		(Some(part), None) | (None, Some(part)) => MimeBody::Single(part),
		(None, None) => MimeBody::Single(text_part("plain", "", charset)?),
	};

	let result = if message.attachments().is_empty() {
		match body {
			MimeBody::Single(part) => builder.singlepart(part),
			MimeBody::Multi(part) => builder.multipart(part),
		}
	} else {
		let mut mixed = match body {
			MimeBody::Single(part) => MultiPart::mixed().singlepart(part),
			MimeBody::Multi(part) => MultiPart::mixed().multipart(part),
		};
		for attachment in message.attachments() {
			let content = attachment
				.content_bytes()
				.map_err(|e| SendingError::from_error(error_codes::ATTACHMENT_UNREADABLE, e))?;
			let content_type = ContentType::parse(attachment.mime_type())
				.map_err(|e| build_failed(format!("invalid attachment type: {e}")))?;
			mixed = mixed.singlepart(
				MimeAttachment::new(attachment.file_name().to_string())
					.body(content.into_owned(), content_type),
			);
		}
		builder.multipart(mixed)
	};

	result.map_err(|e| SendingError::from_error(error_codes::BUILD_FAILED, e))
}

enum MimeBody {
	Single(SinglePart),
	Multi(MultiPart),
}

fn mime_message_id(email: &lettre::Message) -> Option<String> {
	email.headers().get_raw("Message-ID").map(str::to_string)
}

#[async_trait]
impl DeliveryChannel for SmtpChannel {
	fn name(&self) -> &str {
		&self.name
	}

	fn send(&self, message: &Message) -> SendingResult {
		let email = match self.prepare(message) {
			Ok(email) => email,
			Err(failure) => return failure,
		};
		let message_id = mime_message_id(&email);
		self.outcome(message_id, self.transport.send(&email))
	}

	async fn send_async(&self, message: &Message, cancel: &CancellationToken) -> SendingResult {
		let email = match self.prepare(message) {
			Ok(email) => email,
			Err(failure) => return failure,
		};
		let message_id = mime_message_id(&email);

		tokio::select! {
			biased;

			_ = cancel.cancelled() => crate::cancelled(&self.name),
			outcome = self.async_transport.send(email) => self.outcome(message_id, outcome),
		}
	}
}
