//! HTTP plumbing shared by the API-based channels.

use courier_mail::result::{error_codes, metadata_keys};
use courier_mail::{EmailError, EmailResult, SendingError, SendingResult};
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::thread;
use std::time::Duration;

/// Build the async client used by `send_async`.
pub(crate) fn async_client(timeout: Duration) -> EmailResult<reqwest::Client> {
	reqwest::Client::builder()
		.timeout(timeout)
		.build()
		.map_err(|e| EmailError::Configuration(format!("Failed to create HTTP client: {e}")))
}

/// Blocking client created on first use.
///
/// `reqwest::blocking::Client` runs its own runtime thread and panics when it is
/// created or driven from a thread that is inside a tokio runtime. Construction
/// is deferred until a blocking `send` needs it, and [`BlockingClient::exchange`]
/// moves the request to a scoped thread when the caller is inside a runtime.
pub(crate) struct BlockingClient {
	timeout: Duration,
	client: Mutex<Option<reqwest::blocking::Client>>,
}

impl BlockingClient {
	pub(crate) fn new(timeout: Duration) -> Self {
		Self {
			timeout,
			client: Mutex::new(None),
		}
	}

	pub(crate) fn get(&self) -> Result<reqwest::blocking::Client, reqwest::Error> {
		let mut slot = self.client.lock();
		if let Some(client) = slot.as_ref() {
			return Ok(client.clone());
		}
		let client = reqwest::blocking::Client::builder()
			.timeout(self.timeout)
			.build()?;
		*slot = Some(client.clone());
		Ok(client)
	}

	/// Perform one blocking request and turn its outcome into a result.
	pub(crate) fn exchange<F>(&self, channel: &str, request: F) -> SendingResult
	where
		F: FnOnce(reqwest::blocking::Client) -> Result<ProviderReply, reqwest::Error> + Send,
	{
		if tokio::runtime::Handle::try_current().is_err() {
			return self.run(channel, request);
		}

		tracing::debug!(
			channel = %channel,
			"Blocking send inside a runtime, using a scoped thread"
		);
		thread::scope(|scope| {
			scope
				.spawn(|| self.run(channel, request))
				.join()
				.unwrap_or_else(|_| {
					tracing::warn!(channel = %channel, "Blocking request thread panicked");
					SendingResult::failure(
						channel,
						[SendingError::new(
							error_codes::SEND_FAILED,
							"blocking request thread panicked; use send_async inside a runtime",
						)],
					)
				})
		})
	}

	fn run<F>(&self, channel: &str, request: F) -> SendingResult
	where
		F: FnOnce(reqwest::blocking::Client) -> Result<ProviderReply, reqwest::Error>,
	{
		let outcome = self.get().and_then(request);
		match outcome {
			Ok(reply) => reply_result(channel, reply),
			Err(error) => transport_failure(channel, error),
		}
	}
}

/// Raw answer from a provider API.
#[derive(Debug)]
pub(crate) struct ProviderReply {
	pub(crate) status: StatusCode,
	pub(crate) message_id: Option<String>,
	pub(crate) body: String,
}

/// Failure for a request that never produced a response.
pub(crate) fn transport_failure(channel: &str, error: reqwest::Error) -> SendingResult {
	tracing::warn!(channel = %channel, %error, "Provider request failed");
	SendingResult::failure(channel, [SendingError::from_error(error_codes::SEND_FAILED, error)])
}

/// Turn a provider reply into a result.
///
/// 2xx is a success carrying the provider message id, 4xx a rejection and
/// anything else a send failure. The response body is kept as
/// [`metadata_keys::PROVIDER_RESPONSE`] when it is not empty.
pub(crate) fn reply_result(channel: &str, reply: ProviderReply) -> SendingResult {
	let mut result = if reply.status.is_success() {
		let mut result = SendingResult::success(channel);
		if let Some(id) = reply.message_id {
			crate::record_metadata(&mut result, metadata_keys::MESSAGE_ID, id);
		}
		result
	} else {
		let code = if reply.status.is_client_error() {
			error_codes::PROVIDER_REJECTED
		} else {
			error_codes::SEND_FAILED
		};
		tracing::warn!(
			channel = %channel,
			status = reply.status.as_u16(),
			"Provider rejected message"
		);
		SendingResult::failure(
			channel,
			[SendingError::new(
				code,
				format!("{} API error ({}): {}", channel, reply.status, reply.body),
			)],
		)
	};

	if !reply.body.trim().is_empty() {
		crate::record_metadata(&mut result, metadata_keys::PROVIDER_RESPONSE, reply.body);
	}
	result
}
