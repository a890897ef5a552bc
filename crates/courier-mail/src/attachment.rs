//! File attachments.
//!
//! An attachment is identified by its file name and MIME type. Content comes
//! from one of three sources: raw bytes, a base64 string decoded up front, or a
//! file path whose existence is checked when the attachment is created but whose
//! content is only read when a channel asks for it.

use crate::{EmailError, EmailResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::borrow::Cow;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// MIME type used when the file extension has no known mapping.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Where the attachment content comes from.
#[derive(Debug, Clone)]
pub enum AttachmentSource {
	/// Content supplied as raw bytes.
	Bytes(Vec<u8>),
	/// Content supplied as base64, decoded at construction.
	Base64 { encoded: String, decoded: Vec<u8> },
	/// Content stored on disk, read on demand.
	File(PathBuf),
}

/// Represents a file attachment for an email message.
///
/// Equality and hashing only look at the file name and MIME type, so two
/// attachments with the same name but different bytes are considered the same
/// attachment by the message's attachment set.
///
/// # Examples
///
/// ```
/// use courier_mail::Attachment;
///
/// let attachment = Attachment::from_bytes("report.pdf", b"%PDF-1.7".to_vec()).unwrap();
/// assert_eq!(attachment.extension(), "pdf");
/// assert_eq!(attachment.mime_type(), "application/pdf");
/// ```
#[derive(Debug, Clone)]
pub struct Attachment {
	file_name: String,
	extension: String,
	mime_type: String,
	source: AttachmentSource,
}

impl Attachment {
	/// Create an attachment from raw bytes.
	///
	/// The content must not be empty.
	pub fn from_bytes(file_name: impl Into<String>, content: Vec<u8>) -> EmailResult<Self> {
		if content.is_empty() {
			return Err(EmailError::InvalidAttachment(
				"attachment content must not be empty".to_string(),
			));
		}
		Self::with_source(file_name.into(), AttachmentSource::Bytes(content))
	}

	/// Create an attachment from base64 encoded content.
	///
	/// The content is decoded immediately; ASCII whitespace such as MIME line
	/// breaks is ignored.
	///
	/// # Examples
	///
	/// ```
	/// use courier_mail::Attachment;
	///
	/// let attachment = Attachment::from_base64("hello.txt", "aGVsbG8=").unwrap();
	/// assert_eq!(attachment.content_bytes().unwrap().as_ref(), b"hello");
	/// ```
	pub fn from_base64(file_name: impl Into<String>, encoded: &str) -> EmailResult<Self> {
		let compact: String = encoded
			.chars()
			.filter(|c| !c.is_ascii_whitespace())
			.collect();
		let decoded = STANDARD.decode(compact.as_bytes())?;
		Self::with_source(
			file_name.into(),
			AttachmentSource::Base64 {
				encoded: compact,
				decoded,
			},
		)
	}

	/// Create an attachment backed by a file, named after the file itself.
	pub fn from_path(path: impl Into<PathBuf>) -> EmailResult<Self> {
		let path = path.into();
		let file_name = path
			.file_name()
			.and_then(|name| name.to_str())
			.map(str::to_string)
			.ok_or_else(|| {
				EmailError::InvalidAttachment(format!(
					"cannot derive a file name from {}",
					path.display()
				))
			})?;
		Self::from_path_with_name(path, file_name)
	}

	/// Create an attachment backed by a file, presented under `file_name`.
	///
	/// The file must exist now. It is not checked again later: if it is moved or
	/// deleted before sending, the failure surfaces when a channel reads it.
	pub fn from_path_with_name(
		path: impl Into<PathBuf>,
		file_name: impl Into<String>,
	) -> EmailResult<Self> {
		let path = path.into();
		if !path.is_file() {
			return Err(EmailError::AttachmentNotFound(path));
		}
		Self::with_source(file_name.into(), AttachmentSource::File(path))
	}

	fn with_source(file_name: String, source: AttachmentSource) -> EmailResult<Self> {
		let extension = validate_file_name(&file_name)?;
		let mime_type = detect_mime_type(&extension);

		Ok(Self {
			file_name,
			extension,
			mime_type,
			source,
		})
	}

	/// Get the file name presented to recipients
	pub fn file_name(&self) -> &str {
		&self.file_name
	}

	/// File extension without the leading dot.
	pub fn extension(&self) -> &str {
		&self.extension
	}

	/// Get the MIME type derived from the extension
	pub fn mime_type(&self) -> &str {
		&self.mime_type
	}

	/// Get the content source
	pub fn source(&self) -> &AttachmentSource {
		&self.source
	}

	/// Whether content is read from disk at send time.
	pub fn is_file_backed(&self) -> bool {
		matches!(self.source, AttachmentSource::File(_))
	}

	/// Content as bytes.
	///
	/// File-backed attachments read the file on every call.
	pub fn content_bytes(&self) -> EmailResult<Cow<'_, [u8]>> {
		match &self.source {
			AttachmentSource::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
			AttachmentSource::Base64 { decoded, .. } => Ok(Cow::Borrowed(decoded)),
			AttachmentSource::File(path) => Ok(Cow::Owned(std::fs::read(path)?)),
		}
	}

	/// Content as a standard base64 string.
	///
	/// File-backed attachments read the file on every call.
	pub fn content_base64(&self) -> EmailResult<String> {
		match &self.source {
			AttachmentSource::Base64 { encoded, .. } => Ok(encoded.clone()),
			_ => Ok(STANDARD.encode(self.content_bytes()?)),
		}
	}
}

impl PartialEq for Attachment {
	fn eq(&self, other: &Self) -> bool {
		self.file_name == other.file_name && self.mime_type == other.mime_type
	}
}

impl Eq for Attachment {}

impl Hash for Attachment {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.file_name.hash(state);
		self.mime_type.hash(state);
	}
}

fn validate_file_name(file_name: &str) -> EmailResult<String> {
	if file_name.trim().is_empty() {
		return Err(EmailError::InvalidAttachment(
			"file name must not be empty".to_string(),
		));
	}

	Path::new(file_name)
		.extension()
		.and_then(|ext| ext.to_str())
		.filter(|ext| !ext.is_empty())
		.map(str::to_string)
		.ok_or_else(|| {
			EmailError::InvalidAttachment(format!("file name has no extension: {file_name}"))
		})
}

fn detect_mime_type(extension: &str) -> String {
	mime_guess::from_ext(extension)
		.first()
		.map(|mime| mime.to_string())
		.unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::io::Write;

	#[rstest]
	#[case("photo.png", "png", "image/png")]
	#[case("notes.txt", "txt", "text/plain")]
	#[case("backup.2024.zip", "zip", "application/zip")]
	#[case("data.unknownext", "unknownext", FALLBACK_MIME_TYPE)]
	fn test_mime_detection(#[case] name: &str, #[case] extension: &str, #[case] mime: &str) {
		// Act
		let attachment = Attachment::from_bytes(name, vec![1]).unwrap();

		// Assert
		assert_eq!(attachment.extension(), extension);
		assert_eq!(attachment.mime_type(), mime);
	}

	#[rstest]
	#[case("")]
	#[case("   ")]
	#[case("README")]
	#[case("trailing.")]
	#[case(".bashrc")]
	fn test_rejects_names_without_extension(#[case] name: &str) {
		// Act
		let result = Attachment::from_bytes(name, vec![1, 2, 3]);

		// Assert
		assert!(matches!(result, Err(EmailError::InvalidAttachment(_))));
	}

	#[rstest]
	fn test_rejects_empty_bytes() {
		// Act
		let result = Attachment::from_bytes("empty.bin", Vec::new());

		// Assert
		assert!(matches!(result, Err(EmailError::InvalidAttachment(_))));
	}

	#[rstest]
	fn test_base64_rejects_malformed_input() {
		// Act
		let result = Attachment::from_base64("bad.txt", "not base64!!");

		// Assert
		assert!(matches!(result, Err(EmailError::InvalidBase64(_))));
	}

	#[rstest]
	fn test_base64_ignores_line_breaks() {
		// Act
		let attachment = Attachment::from_base64("hello.txt", "aGVs\r\nbG8=\n").unwrap();

		// Assert
		assert_eq!(attachment.content_bytes().unwrap().as_ref(), b"hello");
		assert_eq!(attachment.content_base64().unwrap(), "aGVsbG8=");
	}

	#[rstest]
	#[case(Vec::new())]
	#[case(vec![0u8])]
	#[case(b"hello world".to_vec())]
	#[case((0u8..=255).collect::<Vec<u8>>())]
	fn test_base64_content_reads_back_original_bytes(#[case] bytes: Vec<u8>) {
		// Arrange
		let encoded = STANDARD.encode(&bytes);

		// Act
		let attachment = Attachment::from_base64("blob.bin", &encoded).unwrap();

		// Assert
		assert_eq!(attachment.content_bytes().unwrap().as_ref(), bytes.as_slice());
	}

	#[rstest]
	fn test_bytes_content_as_base64() {
		// Arrange
		let attachment = Attachment::from_bytes("hello.txt", b"hello".to_vec()).unwrap();

		// Act
		let encoded = attachment.content_base64().unwrap();

		// Assert
		assert_eq!(encoded, "aGVsbG8=");
	}

	#[rstest]
	fn test_file_must_exist_at_construction() {
		// Arrange
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("missing.pdf");

		// Act
		let result = Attachment::from_path(&missing);

		// Assert
		assert!(matches!(result, Err(EmailError::AttachmentNotFound(p)) if p == missing));
	}

	#[rstest]
	fn test_file_content_is_read_lazily() {
		// Arrange
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("notes.txt");
		std::fs::write(&path, b"first").unwrap();
		let attachment = Attachment::from_path(&path).unwrap();

		// Act
		let mut file = std::fs::File::create(&path).unwrap();
		file.write_all(b"second").unwrap();
		drop(file);

		// Assert
		assert!(attachment.is_file_backed());
		assert_eq!(attachment.file_name(), "notes.txt");
		assert_eq!(attachment.content_bytes().unwrap().as_ref(), b"second");
	}

	#[rstest]
	fn test_file_deleted_after_construction_fails_on_read() {
		// Arrange
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("gone.csv");
		std::fs::write(&path, b"a,b").unwrap();
		let attachment = Attachment::from_path_with_name(&path, "export.csv").unwrap();
		std::fs::remove_file(&path).unwrap();

		// Act
		let result = attachment.content_bytes();

		// Assert
		assert_eq!(attachment.mime_type(), "text/csv");
		assert!(matches!(result, Err(EmailError::Io(_))));
	}

	#[rstest]
	fn test_equality_ignores_content() {
		// Arrange
		let a = Attachment::from_bytes("same.txt", b"one".to_vec()).unwrap();
		let b = Attachment::from_bytes("same.txt", b"two".to_vec()).unwrap();
		let c = Attachment::from_bytes("other.txt", b"one".to_vec()).unwrap();

		// Assert
		assert_eq!(a, b);
		assert_ne!(a, c);
	}
}
