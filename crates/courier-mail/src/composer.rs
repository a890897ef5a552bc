//! Validating builder for [`Message`].
//!
//! Every field is validated when it is added, so errors point at the call that
//! caused them rather than surfacing at [`MessageComposer::build`].
//!
//! Conflict handling differs per field and is kept that way on purpose:
//!
//! | Field | Repeated value |
//! |---|---|
//! | addresses | ignored (set semantics, case-insensitive address) |
//! | [`MessageComposer::header`] | error ([`EmailError::DuplicateHeader`]) |
//! | [`MessageComposer::headers`] | overwrites |
//! | attachments | ignored when file name and MIME type match |
//! | channel data | ignored when the key matches |
//! | priority | last call wins |

use crate::message::MessageParts;
use crate::{
	Attachment, ChannelData, EmailResult, MailAddress, Message, Priority, parse_address_list,
};
use indexmap::IndexSet;
use serde_json::Value;

/// Separator used when a recipient string lists several addresses.
pub const DEFAULT_ADDRESS_DELIMITER: char = ';';

/// Builder that accumulates message fields and produces a [`Message`].
///
/// # Examples
///
/// ```
/// use courier_mail::{Attachment, MessageComposer};
///
/// let message = MessageComposer::new()
///     .from_address("billing@example.com", Some("Billing"))?
///     .to_str("alice@example.com;bob@example.com")?
///     .cc_named("carol@example.com", "Carol")?
///     .subject("Invoice")
///     .plain_text("Your invoice is attached.")
///     .attachment(Attachment::from_bytes("invoice.pdf", b"%PDF".to_vec())?)
///     .header("X-Invoice-Id", "INV-42")?
///     .build()?;
///
/// assert_eq!(message.to().len(), 2);
/// assert_eq!(message.cc()[0].display_name(), Some("Carol"));
/// # Ok::<(), courier_mail::EmailError>(())
/// ```
#[derive(Debug)]
pub struct MessageComposer {
	parts: MessageParts,
	delimiter: char,
}

impl Default for MessageComposer {
	fn default() -> Self {
		Self::new()
	}
}

impl MessageComposer {
	/// Create an empty composer.
	pub fn new() -> Self {
		Self {
			parts: MessageParts::default(),
			delimiter: DEFAULT_ADDRESS_DELIMITER,
		}
	}

	/// Change the separator used by the `*_str` and `*_named` address methods
	/// called after this one.
	pub fn address_delimiter(mut self, delimiter: char) -> Self {
		self.delimiter = delimiter;
		self
	}

	/// Set the subject
	pub fn subject(mut self, subject: impl Into<String>) -> Self {
		self.parts.subject = Some(subject.into());
		self
	}

	/// Set the plain text body
	pub fn plain_text(mut self, body: impl Into<String>) -> Self {
		self.parts.plain_text_body = Some(body.into());
		self
	}

	/// Set the HTML body
	pub fn html(mut self, body: impl Into<String>) -> Self {
		self.parts.html_body = Some(body.into());
		self
	}

	/// Set the body charset
	pub fn charset(mut self, charset: impl Into<String>) -> Self {
		self.parts.charset = Some(charset.into());
		self
	}

	/// Set the sender
	pub fn from(mut self, from: MailAddress) -> Self {
		self.parts.from = Some(from);
		self
	}

	/// Set the sender from a string, optionally with a display name.
	pub fn from_address(self, address: &str, display_name: Option<&str>) -> EmailResult<Self> {
		let mut from = MailAddress::parse(address)?;
		if let Some(name) = display_name {
			from = MailAddress::with_name(from.address(), name)?;
		}
		Ok(self.from(from))
	}

	/// Add a recipient
	pub fn to(mut self, address: MailAddress) -> Self {
		self.parts.to.insert(address);
		self
	}

	/// Add one or more `to` recipients from a delimited string.
	pub fn to_str(mut self, addresses: &str) -> EmailResult<Self> {
		let delimiter = self.delimiter;
		add_addresses(&mut self.parts.to, addresses, None, delimiter)?;
		Ok(self)
	}

	/// Add `to` recipients from a string with a display name.
	///
	/// The display name only applies when the string holds a single address; it
	/// is dropped for every entry when the string splits into several.
	pub fn to_named(mut self, addresses: &str, display_name: &str) -> EmailResult<Self> {
		let delimiter = self.delimiter;
		add_addresses(&mut self.parts.to, addresses, Some(display_name), delimiter)?;
		Ok(self)
	}

	/// Add several recipients
	pub fn to_all(mut self, addresses: impl IntoIterator<Item = MailAddress>) -> Self {
		self.parts.to.extend(addresses);
		self
	}

	/// Add a carbon copy recipient
	pub fn cc(mut self, address: MailAddress) -> Self {
		self.parts.cc.insert(address);
		self
	}

	/// Add carbon copy recipients from a delimited string.
	pub fn cc_str(mut self, addresses: &str) -> EmailResult<Self> {
		let delimiter = self.delimiter;
		add_addresses(&mut self.parts.cc, addresses, None, delimiter)?;
		Ok(self)
	}

	/// Add carbon copy recipients from a delimited string with a display name.
	pub fn cc_named(mut self, addresses: &str, display_name: &str) -> EmailResult<Self> {
		let delimiter = self.delimiter;
		add_addresses(&mut self.parts.cc, addresses, Some(display_name), delimiter)?;
		Ok(self)
	}

	/// Add a blind carbon copy recipient
	pub fn bcc(mut self, address: MailAddress) -> Self {
		self.parts.bcc.insert(address);
		self
	}

	/// Add blind carbon copy recipients from a delimited string.
	pub fn bcc_str(mut self, addresses: &str) -> EmailResult<Self> {
		let delimiter = self.delimiter;
		add_addresses(&mut self.parts.bcc, addresses, None, delimiter)?;
		Ok(self)
	}

	/// Add blind carbon copy recipients from a delimited string with a display name.
	pub fn bcc_named(mut self, addresses: &str, display_name: &str) -> EmailResult<Self> {
		let delimiter = self.delimiter;
		add_addresses(&mut self.parts.bcc, addresses, Some(display_name), delimiter)?;
		Ok(self)
	}

	/// Add a reply-to address
	pub fn reply_to(mut self, address: MailAddress) -> Self {
		self.parts.reply_to.insert(address);
		self
	}

	/// Add reply-to addresses from a delimited string.
	pub fn reply_to_str(mut self, addresses: &str) -> EmailResult<Self> {
		let delimiter = self.delimiter;
		add_addresses(&mut self.parts.reply_to, addresses, None, delimiter)?;
		Ok(self)
	}

	/// Add reply-to addresses from a delimited string with a display name.
	pub fn reply_to_named(mut self, addresses: &str, display_name: &str) -> EmailResult<Self> {
		let delimiter = self.delimiter;
		add_addresses(
			&mut self.parts.reply_to,
			addresses,
			Some(display_name),
			delimiter,
		)?;
		Ok(self)
	}

	/// Add a single header. Fails if a header with this name was already added.
	pub fn header(
		mut self,
		name: impl Into<String>,
		value: impl Into<String>,
	) -> EmailResult<Self> {
		self.parts.headers.insert(name, value)?;
		Ok(self)
	}

	/// Add several headers, overwriting any that already exist.
	pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> EmailResult<Self>
	where
		K: Into<String>,
		V: Into<String>,
	{
		for (name, value) in headers {
			self.parts.headers.set(name, value)?;
		}
		Ok(self)
	}

	/// Add an attachment. An equal attachment already present is kept.
	pub fn attachment(mut self, attachment: Attachment) -> Self {
		self.parts.attachments.insert(attachment);
		self
	}

	/// Add several attachments
	pub fn attachments(mut self, attachments: impl IntoIterator<Item = Attachment>) -> Self {
		self.parts.attachments.extend(attachments);
		self
	}

	/// Add channel data. An entry with the same key already present is kept.
	pub fn channel_data(mut self, data: ChannelData) -> Self {
		self.parts.channel_data.insert(data);
		self
	}

	/// Add a channel data entry from a key and value.
	pub fn with_channel_data(
		self,
		key: impl Into<String>,
		value: impl Into<Value>,
	) -> EmailResult<Self> {
		Ok(self.channel_data(ChannelData::new(key, value)?))
	}

	/// Set the priority
	pub fn priority(mut self, priority: Priority) -> Self {
		self.parts.priority = priority;
		self
	}

	/// Mark the message as high priority
	pub fn high_priority(self) -> Self {
		self.priority(Priority::High)
	}

	/// Mark the message as normal priority
	pub fn normal_priority(self) -> Self {
		self.priority(Priority::Normal)
	}

	/// Mark the message as low priority
	pub fn low_priority(self) -> Self {
		self.priority(Priority::Low)
	}

	/// Build the message.
	///
	/// Only the `to` recipients are required; a message without subject or body
	/// is accepted here and left to the channel to judge.
	pub fn build(self) -> EmailResult<Message> {
		Message::from_parts(self.parts)
	}
}

fn add_addresses(
	target: &mut IndexSet<MailAddress>,
	input: &str,
	display_name: Option<&str>,
	delimiter: char,
) -> EmailResult<()> {
	let parsed = parse_address_list(input, delimiter)?;
	if parsed.is_empty() {
		return Err(crate::EmailError::InvalidAddress(input.to_string()));
	}

	if let (Some(name), [single]) = (display_name, parsed.as_slice()) {
		let named = MailAddress::with_name(single.address(), name)?;
		target.insert(named);
		return Ok(());
	}

	// Several addresses: a caller-supplied display name cannot be attributed.
	target.extend(parsed);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::EmailError;
	use rstest::rstest;

	#[rstest]
	fn test_empty_string_is_rejected() {
		// Act
		let result = MessageComposer::new().to_str(" ; ");

		// Assert
		assert!(matches!(result, Err(EmailError::InvalidAddress(_))));
	}

	#[rstest]
	fn test_single_address_keeps_display_name() {
		// Act
		let message = MessageComposer::new()
			.to_named(" solo@example.com ", "Solo")
			.unwrap()
			.build()
			.unwrap();

		// Assert
		assert_eq!(message.to()[0].display_name(), Some("Solo"));
	}

	#[rstest]
	fn test_custom_delimiter() {
		// Act
		let message = MessageComposer::new()
			.address_delimiter(',')
			.to_str("a@example.com, b@example.com")
			.unwrap()
			.build()
			.unwrap();

		// Assert
		assert_eq!(message.to().len(), 2);
	}

	#[rstest]
	fn test_priority_last_write_wins() {
		// Act
		let message = MessageComposer::new()
			.to_str("a@example.com")
			.unwrap()
			.high_priority()
			.low_priority()
			.build()
			.unwrap();

		// Assert
		assert_eq!(message.priority(), Priority::Low);
	}

	#[rstest]
	fn test_from_address_with_display_name() {
		// Act
		let message = MessageComposer::new()
			.from_address("noreply@example.com", Some("No Reply"))
			.unwrap()
			.to_str("a@example.com")
			.unwrap()
			.build()
			.unwrap();

		// Assert
		assert_eq!(
			message.from().map(ToString::to_string),
			Some("No Reply <noreply@example.com>".to_string())
		);
	}
}
