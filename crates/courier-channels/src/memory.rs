//! In-memory delivery channel
//!
//! Records messages instead of sending them. Useful for tests and for
//! development environments where no mail should leave the process.

use async_trait::async_trait;
use courier_mail::{CancellationToken, DeliveryChannel, Message, SendingError, SendingResult};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory delivery channel
///
/// Clones share the same storage, so a test can keep one handle while the
/// service owns another.
///
/// # Examples
///
/// ```
/// use courier_channels::MemoryChannel;
/// use courier_mail::{DeliveryChannel, MessageComposer};
///
/// let channel = MemoryChannel::new();
///
/// let message = MessageComposer::new()
///     .from("sender@example.com".parse().unwrap())
///     .to_str("recipient@example.com").unwrap()
///     .subject("Test")
///     .build().unwrap();
///
/// assert!(channel.send(&message).is_success());
/// assert_eq!(channel.count(), 1);
/// assert_eq!(channel.sent_messages()[0].subject(), Some("Test"));
/// ```
#[derive(Clone)]
pub struct MemoryChannel {
	name: String,
	messages: Arc<RwLock<Vec<Message>>>,
	calls: Arc<AtomicUsize>,
	failure: Arc<RwLock<Option<SendingError>>>,
}

impl Default for MemoryChannel {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryChannel {
	/// Channel name used unless overridden with [`MemoryChannel::named`].
	pub const DEFAULT_NAME: &'static str = "memory";

	/// Create an empty channel named [`MemoryChannel::DEFAULT_NAME`].
	pub fn new() -> Self {
		Self {
			name: Self::DEFAULT_NAME.to_string(),
			messages: Arc::new(RwLock::new(Vec::new())),
			calls: Arc::new(AtomicUsize::new(0)),
			failure: Arc::new(RwLock::new(None)),
		}
	}

	/// Register the channel under a different name.
	pub fn named(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	/// Make every following send fail with `error` until [`MemoryChannel::succeed`].
	///
	/// Failed sends are counted as calls but not recorded as messages.
	pub fn fail_with(&self, error: SendingError) {
		*self.failure.write() = Some(error);
	}

	/// Stop failing sends.
	pub fn succeed(&self) {
		*self.failure.write() = None;
	}

	/// Get all delivered messages
	pub fn sent_messages(&self) -> Vec<Message> {
		self.messages.read().clone()
	}

	/// Get the most recently delivered message
	pub fn last_message(&self) -> Option<Message> {
		self.messages.read().last().cloned()
	}

	/// Count delivered messages
	pub fn count(&self) -> usize {
		self.messages.read().len()
	}

	/// Number of send attempts, including failed ones.
	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Find delivered messages by subject
	pub fn find_by_subject(&self, subject: &str) -> Vec<Message> {
		self.messages
			.read()
			.iter()
			.filter(|message| message.subject() == Some(subject))
			.cloned()
			.collect()
	}

	/// Find delivered messages addressed to `address` in to, cc or bcc.
	pub fn find_by_recipient(&self, address: &str) -> Vec<Message> {
		self.messages
			.read()
			.iter()
			.filter(|message| {
				message
					.all_recipients()
					.iter()
					.any(|recipient| recipient.address().eq_ignore_ascii_case(address))
			})
			.cloned()
			.collect()
	}

	/// Forget delivered messages and reset the call counter.
	pub fn clear(&self) {
		self.messages.write().clear();
		self.calls.store(0, Ordering::SeqCst);
	}

	fn deliver(&self, message: &Message) -> SendingResult {
		self.calls.fetch_add(1, Ordering::SeqCst);

		if let Some(error) = self.failure.read().clone() {
			tracing::debug!(channel = %self.name, code = %error.code(), "Scripted failure");
			return SendingResult::failure(&self.name, [error]);
		}

		self.messages.write().push(message.clone());
		tracing::debug!(
			channel = %self.name,
			recipients = message.all_recipients().len(),
			"Message stored in memory"
		);
		SendingResult::success(&self.name)
	}
}

#[async_trait]
impl DeliveryChannel for MemoryChannel {
	fn name(&self) -> &str {
		&self.name
	}

	fn send(&self, message: &Message) -> SendingResult {
		self.deliver(message)
	}

	async fn send_async(&self, message: &Message, cancel: &CancellationToken) -> SendingResult {
		if cancel.is_cancelled() {
			return crate::cancelled(&self.name);
		}
		self.deliver(message)
	}
}

impl std::fmt::Debug for MemoryChannel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemoryChannel")
			.field("name", &self.name)
			.field("count", &self.count())
			.field("call_count", &self.call_count())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use courier_mail::MessageComposer;
	use courier_mail::result::error_codes;
	use rstest::rstest;

	fn message(to: &str, subject: &str) -> Message {
		MessageComposer::new()
			.to_str(to)
			.unwrap()
			.subject(subject)
			.build()
			.unwrap()
	}

	#[rstest]
	fn test_send_records_message() {
		// Arrange
		let channel = MemoryChannel::new();

		// Act
		let result = channel.send(&message("a@example.com", "One"));

		// Assert
		assert!(result.is_success());
		assert_eq!(result.channel_name(), "memory");
		assert_eq!(channel.count(), 1);
		assert_eq!(channel.call_count(), 1);
	}

	#[rstest]
	fn test_clones_share_storage() {
		// Arrange
		let channel = MemoryChannel::new().named("outbox");
		let handle = channel.clone();

		// Act
		channel.send(&message("a@example.com", "One"));

		// Assert
		assert_eq!(handle.count(), 1);
		assert_eq!(handle.name(), "outbox");
	}

	#[rstest]
	fn test_scripted_failure() {
		// Arrange
		let channel = MemoryChannel::new();
		channel.fail_with(SendingError::new(error_codes::SEND_FAILED, "offline"));

		// Act
		let failed = channel.send(&message("a@example.com", "One"));
		channel.succeed();
		let delivered = channel.send(&message("a@example.com", "Two"));

		// Assert
		assert!(!failed.is_success());
		assert_eq!(failed.errors()[0].message(), "offline");
		assert!(delivered.is_success());
		assert_eq!(channel.count(), 1);
		assert_eq!(channel.call_count(), 2);
	}

	#[rstest]
	fn test_find_helpers() {
		// Arrange
		let channel = MemoryChannel::new();
		channel.send(&message("a@example.com", "Welcome"));
		channel.send(&message("b@example.com", "Welcome"));
		channel.send(&message("a@example.com", "Invoice"));

		// Act
		let welcomes = channel.find_by_subject("Welcome");
		let to_a = channel.find_by_recipient("A@example.com");

		// Assert
		assert_eq!(welcomes.len(), 2);
		assert_eq!(to_a.len(), 2);
		assert_eq!(channel.last_message().unwrap().subject(), Some("Invoice"));
	}

	#[rstest]
	fn test_clear_resets_state() {
		// Arrange
		let channel = MemoryChannel::new();
		channel.send(&message("a@example.com", "One"));

		// Act
		channel.clear();

		// Assert
		assert_eq!(channel.count(), 0);
		assert_eq!(channel.call_count(), 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_send_async_cancelled() {
		// Arrange
		let channel = MemoryChannel::new();
		let cancel = CancellationToken::new();
		cancel.cancel();

		// Act
		let result = channel.send_async(&message("a@example.com", "One"), &cancel).await;

		// Assert
		assert_eq!(result.errors()[0].code(), error_codes::CANCELLED);
		assert_eq!(channel.count(), 0);
	}
}
