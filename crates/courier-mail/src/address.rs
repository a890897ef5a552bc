//! Email address value type and list parsing.

use crate::{EmailError, EmailResult};
use lettre::Address;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A validated email address with an optional display name.
///
/// Two addresses are equal when their address parts match ignoring ASCII case;
/// the display name does not take part in equality, so a set of addresses keeps
/// the first spelling it sees.
///
/// # Examples
///
/// ```
/// use courier_mail::MailAddress;
///
/// let plain: MailAddress = "alice@example.com".parse().unwrap();
/// assert_eq!(plain.display_name(), None);
///
/// let named: MailAddress = "Alice Liddell <ALICE@example.com>".parse().unwrap();
/// assert_eq!(named.display_name(), Some("Alice Liddell"));
/// assert_eq!(plain, named);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MailAddress {
	address: Address,
	display_name: Option<String>,
}

impl MailAddress {
	/// Create an address without a display name.
	pub fn new(address: &str) -> EmailResult<Self> {
		let address = parse_bare(address)?;
		Ok(Self {
			address,
			display_name: None,
		})
	}

	/// Create an address with a display name.
	///
	/// A blank display name is treated as absent.
	///
	/// # Examples
	///
	/// ```
	/// use courier_mail::MailAddress;
	///
	/// let addr = MailAddress::with_name("bob@example.com", "Bob").unwrap();
	/// assert_eq!(addr.to_string(), "Bob <bob@example.com>");
	/// ```
	pub fn with_name(address: &str, display_name: impl Into<String>) -> EmailResult<Self> {
		let mut parsed = Self::new(address)?;
		parsed.display_name = normalize_name(display_name.into());
		Ok(parsed)
	}

	/// Parse either `user@host` or `Display Name <user@host>`.
	pub fn parse(input: &str) -> EmailResult<Self> {
		let input = input.trim();
		if input.is_empty() {
			return Err(EmailError::InvalidAddress(input.to_string()));
		}

		if let Some(open) = input.rfind('<') {
			let Some(rest) = input[open + 1..].strip_suffix('>') else {
				return Err(EmailError::InvalidAddress(input.to_string()));
			};
			let name = input[..open].trim().trim_matches('"').trim();
			let address = parse_bare(rest)?;
			return Ok(Self {
				address,
				display_name: normalize_name(name.to_string()),
			});
		}

		Self::new(input)
	}

	/// The `user@host` part.
	pub fn address(&self) -> &str {
		self.address.as_ref()
	}

	/// Get the local part of the address
	pub fn user(&self) -> &str {
		self.address.user()
	}

	/// Get the domain of the address
	pub fn domain(&self) -> &str {
		self.address.domain()
	}

	/// Get the display name, if any
	pub fn display_name(&self) -> Option<&str> {
		self.display_name.as_deref()
	}

	/// Return a copy of this address without its display name.
	pub fn without_name(&self) -> Self {
		Self {
			address: self.address.clone(),
			display_name: None,
		}
	}

	/// Convert into a `lettre` mailbox for MIME construction.
	pub fn to_mailbox(&self) -> Mailbox {
		Mailbox::new(self.display_name.clone(), self.address.clone())
	}
}

fn parse_bare(address: &str) -> EmailResult<Address> {
	let trimmed = address.trim();
	if trimmed.is_empty() || trimmed.contains(['\r', '\n']) {
		return Err(EmailError::InvalidAddress(address.to_string()));
	}
	Address::from_str(trimmed).map_err(|e| EmailError::InvalidAddress(format!("{trimmed}: {e}")))
}

fn normalize_name(name: String) -> Option<String> {
	let trimmed = name.trim();
	if trimmed.is_empty() {
		None
	} else {
		Some(trimmed.to_string())
	}
}

impl PartialEq for MailAddress {
	fn eq(&self, other: &Self) -> bool {
		self.address().eq_ignore_ascii_case(other.address())
	}
}

impl Eq for MailAddress {}

impl Hash for MailAddress {
	fn hash<H: Hasher>(&self, state: &mut H) {
		for byte in self.address().bytes() {
			state.write_u8(byte.to_ascii_lowercase());
		}
	}
}

impl fmt::Display for MailAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.display_name {
			Some(name) => write!(f, "{} <{}>", name, self.address),
			None => write!(f, "{}", self.address),
		}
	}
}

impl FromStr for MailAddress {
	type Err = EmailError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl TryFrom<String> for MailAddress {
	type Error = EmailError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(&value)
	}
}

impl From<MailAddress> for String {
	fn from(value: MailAddress) -> Self {
		value.to_string()
	}
}

impl From<MailAddress> for Mailbox {
	fn from(value: MailAddress) -> Self {
		Mailbox::new(value.display_name, value.address)
	}
}

/// Split a delimiter-separated address list.
///
/// Segments are trimmed and empty segments are skipped. Each remaining segment
/// may be a bare address or `Name <address>`.
///
/// # Examples
///
/// ```
/// use courier_mail::parse_address_list;
///
/// let list = parse_address_list(" a@example.com ;b@example.com;; ", ';').unwrap();
/// assert_eq!(list.len(), 2);
/// assert_eq!(list[1].address(), "b@example.com");
/// ```
pub fn parse_address_list(input: &str, delimiter: char) -> EmailResult<Vec<MailAddress>> {
	input
		.split(delimiter)
		.map(str::trim)
		.filter(|segment| !segment.is_empty())
		.map(MailAddress::parse)
		.collect()
}
