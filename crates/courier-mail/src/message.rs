use crate::{
	Attachment, ChannelData, EmailError, EmailResult, Headers, MailAddress, MessageComposer,
	Priority,
};
use indexmap::IndexSet;
use serde_json::Value;

/// Represents a composed email message.
///
/// Messages are built through [`MessageComposer`] and are read-only afterwards,
/// except for the sender: [`crate::EmailService`] fills in its configured
/// default sender when `from` is unset, which is why sending takes the message
/// by `&mut`.
///
/// A message always has at least one `to` recipient.
#[derive(Debug, Clone)]
pub struct Message {
	subject: Option<String>,
	plain_text_body: Option<String>,
	html_body: Option<String>,
	charset: Option<String>,
	from: Option<MailAddress>,
	to: IndexSet<MailAddress>,
	reply_to: IndexSet<MailAddress>,
	cc: IndexSet<MailAddress>,
	bcc: IndexSet<MailAddress>,
	attachments: IndexSet<Attachment>,
	headers: Headers,
	channel_data: IndexSet<ChannelData>,
	priority: Priority,
}

/// Field values gathered by the composer.
#[derive(Debug, Default)]
pub(crate) struct MessageParts {
	pub(crate) subject: Option<String>,
	pub(crate) plain_text_body: Option<String>,
	pub(crate) html_body: Option<String>,
	pub(crate) charset: Option<String>,
	pub(crate) from: Option<MailAddress>,
	pub(crate) to: IndexSet<MailAddress>,
	pub(crate) reply_to: IndexSet<MailAddress>,
	pub(crate) cc: IndexSet<MailAddress>,
	pub(crate) bcc: IndexSet<MailAddress>,
	pub(crate) attachments: IndexSet<Attachment>,
	pub(crate) headers: Headers,
	pub(crate) channel_data: IndexSet<ChannelData>,
	pub(crate) priority: Priority,
}

impl Message {
	/// Create a new composer for constructing a `Message`.
	pub fn builder() -> MessageComposer {
		MessageComposer::new()
	}

	pub(crate) fn from_parts(parts: MessageParts) -> EmailResult<Self> {
		if parts.to.is_empty() {
			return Err(EmailError::MissingRecipient);
		}

		Ok(Self {
			subject: parts.subject,
			plain_text_body: parts.plain_text_body,
			html_body: parts.html_body,
			charset: parts.charset,
			from: parts.from,
			to: parts.to,
			reply_to: parts.reply_to,
			cc: parts.cc,
			bcc: parts.bcc,
			attachments: parts.attachments,
			headers: parts.headers,
			channel_data: parts.channel_data,
			priority: parts.priority,
		})
	}

	/// Get the subject
	pub fn subject(&self) -> Option<&str> {
		self.subject.as_deref()
	}

	/// Get the plain text body
	pub fn plain_text_body(&self) -> Option<&str> {
		self.plain_text_body.as_deref()
	}

	/// Get the HTML body
	pub fn html_body(&self) -> Option<&str> {
		self.html_body.as_deref()
	}

	/// Get the body charset
	pub fn charset(&self) -> Option<&str> {
		self.charset.as_deref()
	}

	/// Get the sender
	pub fn from(&self) -> Option<&MailAddress> {
		self.from.as_ref()
	}

	/// Replace the sender.
	pub(crate) fn set_from(&mut self, from: MailAddress) {
		self.from = Some(from);
	}

	/// Get the recipients
	pub fn to(&self) -> &IndexSet<MailAddress> {
		&self.to
	}

	/// Get the reply-to addresses
	pub fn reply_to(&self) -> &IndexSet<MailAddress> {
		&self.reply_to
	}

	/// Get the carbon copy recipients
	pub fn cc(&self) -> &IndexSet<MailAddress> {
		&self.cc
	}

	/// Get the blind carbon copy recipients
	pub fn bcc(&self) -> &IndexSet<MailAddress> {
		&self.bcc
	}

	/// Every recipient across `to`, `cc` and `bcc`, without duplicates.
	pub fn all_recipients(&self) -> IndexSet<&MailAddress> {
		self.to.iter().chain(&self.cc).chain(&self.bcc).collect()
	}

	/// Get the attachments
	pub fn attachments(&self) -> &IndexSet<Attachment> {
		&self.attachments
	}

	/// Get the custom headers
	pub fn headers(&self) -> &Headers {
		&self.headers
	}

	/// Get the channel data
	pub fn channel_data(&self) -> &IndexSet<ChannelData> {
		&self.channel_data
	}

	/// Look up a channel data value by key.
	pub fn channel_data_value(&self, key: &str) -> Option<&Value> {
		self.channel_data
			.iter()
			.find(|item| item.key() == key)
			.map(ChannelData::value)
	}

	/// Get the priority
	pub fn priority(&self) -> Priority {
		self.priority
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn address(s: &str) -> MailAddress {
		MailAddress::parse(s).unwrap()
	}

	#[rstest]
	fn test_from_parts_requires_recipient() {
		// Act
		let result = Message::from_parts(MessageParts::default());

		// Assert
		assert!(matches!(result, Err(EmailError::MissingRecipient)));
	}

	#[rstest]
	fn test_all_recipients_deduplicates_across_fields() {
		// Arrange
		let mut parts = MessageParts::default();
		parts.to.insert(address("a@example.com"));
		parts.cc.insert(address("A@example.com"));
		parts.bcc.insert(address("b@example.com"));

		// Act
		let message = Message::from_parts(parts).unwrap();

		// Assert
		assert_eq!(message.all_recipients().len(), 2);
	}

	#[rstest]
	fn test_channel_data_lookup() {
		// Arrange
		let mut parts = MessageParts::default();
		parts.to.insert(address("a@example.com"));
		parts
			.channel_data
			.insert(ChannelData::new("campaign_id", "c-1").unwrap());

		// Act
		let message = Message::from_parts(parts).unwrap();

		// Assert
		assert_eq!(
			message.channel_data_value("campaign_id"),
			Some(&Value::from("c-1"))
		);
		assert_eq!(message.channel_data_value("missing"), None);
	}

	#[rstest]
	fn test_set_from_replaces_sender() {
		// Arrange
		let mut parts = MessageParts::default();
		parts.to.insert(address("a@example.com"));
		let mut message = Message::from_parts(parts).unwrap();

		// Act
		message.set_from(address("Sender <sender@example.com>"));

		// Assert
		assert_eq!(message.from().unwrap().address(), "sender@example.com");
	}
}
