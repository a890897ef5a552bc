//! Custom message headers.

use crate::{EmailError, EmailResult};
use indexmap::IndexMap;
use std::hash::{Hash, Hasher};

/// Header name compared without regard to ASCII case.
#[derive(Debug, Clone)]
struct HeaderName(String);

impl PartialEq for HeaderName {
	fn eq(&self, other: &Self) -> bool {
		self.0.eq_ignore_ascii_case(&other.0)
	}
}

impl Eq for HeaderName {}

impl Hash for HeaderName {
	fn hash<H: Hasher>(&self, state: &mut H) {
		for byte in self.0.bytes() {
			state.write_u8(byte.to_ascii_lowercase());
		}
	}
}

/// Ordered, key-unique collection of custom headers.
///
/// Header names are case-insensitive. [`Headers::insert`] refuses to replace an
/// existing header while [`Headers::set`] overwrites it; the composer exposes
/// both behaviours through its single and bulk header setters.
///
/// # Examples
///
/// ```
/// use courier_mail::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("X-Campaign", "spring").unwrap();
/// assert!(headers.insert("x-campaign", "summer").is_err());
///
/// headers.set("X-CAMPAIGN", "summer").unwrap();
/// assert_eq!(headers.get("x-campaign"), Some("summer"));
/// assert_eq!(headers.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
	entries: IndexMap<HeaderName, String>,
}

impl Headers {
	/// Create an empty header map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a header, failing if one with the same name already exists.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> EmailResult<()> {
		let (name, value) = validated(name.into(), value.into())?;
		if self.entries.contains_key(&name) {
			return Err(EmailError::DuplicateHeader(name.0));
		}
		self.entries.insert(name, value);
		Ok(())
	}

	/// Add a header, replacing the value of an existing one.
	///
	/// A replaced header keeps its original position and spelling.
	pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> EmailResult<()> {
		let (name, value) = validated(name.into(), value.into())?;
		self.entries.insert(name, value);
		Ok(())
	}

	/// Get a header value by case-insensitive name
	pub fn get(&self, name: &str) -> Option<&str> {
		self.entries
			.get(&HeaderName(name.to_string()))
			.map(String::as_str)
	}

	/// Check whether a header is present
	pub fn contains(&self, name: &str) -> bool {
		self.entries.contains_key(&HeaderName(name.to_string()))
	}

	/// Number of headers
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Check whether there are no headers
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Iterate headers in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.entries
			.iter()
			.map(|(name, value)| (name.0.as_str(), value.as_str()))
	}
}

fn validated(name: String, value: String) -> EmailResult<(HeaderName, String)> {
	validate_header_name(&name)?;
	check_header_injection(&value)?;
	Ok((HeaderName(name), value))
}

/// Validate a header field name per RFC 5322: printable ASCII except `:`.
pub fn validate_header_name(name: &str) -> EmailResult<()> {
	if name.is_empty() {
		return Err(EmailError::InvalidHeader(
			"header name must not be empty".to_string(),
		));
	}
	if let Some(c) = name.chars().find(|c| !matches!(c, '!'..='9' | ';'..='~')) {
		return Err(EmailError::InvalidHeader(format!(
			"header name '{}' contains invalid character {:?}",
			name.escape_default(),
			c
		)));
	}
	Ok(())
}

/// Reject values that could smuggle extra header lines.
pub fn check_header_injection(value: &str) -> EmailResult<()> {
	if value.contains(['\r', '\n']) {
		return Err(EmailError::HeaderInjection(value.escape_default().to_string()));
	}
	Ok(())
}

impl<'a> IntoIterator for &'a Headers {
	type Item = (&'a str, &'a str);
	type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

	fn into_iter(self) -> Self::IntoIter {
		Box::new(self.iter())
	}
}
