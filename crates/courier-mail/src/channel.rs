//! Delivery channel contract.

use crate::{Message, SendingResult};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A pluggable backend able to transmit a [`Message`].
///
/// Implementations must report every delivery problem through the returned
/// [`SendingResult`] and never panic on provider errors: the service passes the
/// result through unchanged and does not translate failures.
///
/// Channels are shared across callers, so they must be stateless or handle
/// their own synchronisation.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use courier_mail::{CancellationToken, DeliveryChannel, Message, SendingResult};
///
/// struct NullChannel;
///
/// #[async_trait]
/// impl DeliveryChannel for NullChannel {
///     fn name(&self) -> &str {
///         "null"
///     }
///
///     fn send(&self, _message: &Message) -> SendingResult {
///         SendingResult::success(self.name())
///     }
///
///     async fn send_async(
///         &self,
///         message: &Message,
///         _cancel: &CancellationToken,
///     ) -> SendingResult {
///         self.send(message)
///     }
/// }
/// ```
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
	/// Stable, unique name used to register and select the channel.
	fn name(&self) -> &str;

	/// Send a message, blocking the current thread until the provider answers.
	fn send(&self, message: &Message) -> SendingResult;

	/// Send a message asynchronously.
	///
	/// Cancellation is cooperative: a channel honours `cancel` only if it
	/// forwards the token into its own I/O.
	async fn send_async(&self, message: &Message, cancel: &CancellationToken) -> SendingResult;
}
