//! Local workload identity (the mounted service-account token).

// std
use std::fs;
// self
use crate::{_prelude::*, auth::TokenSecret, error::IdentityReadError};

/// Reads the workload's signed identity token from the filesystem.
///
/// The token is read fresh on every call and never cached, so a rotated mount is picked up by
/// the next secret-store login. A missing or unreadable file is a configuration error for the
/// calling operation and is never retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalIdentityReader {
	path: PathBuf,
}
impl LocalIdentityReader {
	/// Creates a reader for the provided path.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Path this reader loads from.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Reads the token verbatim; the bytes must be valid UTF-8.
	pub fn read(&self) -> Result<TokenSecret> {
		let bytes = fs::read(&self.path)
			.map_err(|source| IdentityReadError::Read { path: self.path.clone(), source })?;
		let raw = String::from_utf8(bytes)
			.map_err(|source| IdentityReadError::NotUtf8 { path: self.path.clone(), source })?;

		Ok(TokenSecret::new(raw))
	}
}
