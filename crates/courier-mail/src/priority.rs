use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery priority of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
	Low,
	#[default]
	Normal,
	High,
}

impl Priority {
	/// Value of the conventional `X-Priority` header.
	pub fn x_priority(self) -> &'static str {
		match self {
			Priority::High => "1",
			Priority::Normal => "3",
			Priority::Low => "5",
		}
	}

	/// Value of the `Importance` header used by some clients.
	pub fn importance(self) -> &'static str {
		match self {
			Priority::High => "high",
			Priority::Normal => "normal",
			Priority::Low => "low",
		}
	}
}

impl fmt::Display for Priority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.importance())
	}
}
