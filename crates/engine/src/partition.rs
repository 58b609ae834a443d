//! Storage partition derivation.
//!
//! Each session key maps to its own directory under the local data dir, so
//! credentials and cookies of different services never mix. The key is
//! sanitized before it becomes a path component; a session key is a service
//! identifier, not a path.

use std::io;
use std::path::{Path, PathBuf};

/// Resolves (and creates) the partition directory for `session_key`.
/// `base` overrides the default local-data location, which tests use.
pub fn partition_dir(base: Option<&Path>, session_key: &str) -> io::Result<PathBuf> {
	let base = match base {
		Some(base) => base.to_path_buf(),
		None => dirs::data_local_dir()
			.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no local data directory"))?
			.join("settop"),
	};
	let dir = base.join("sessions").join(sanitize_key(session_key)?);
	std::fs::create_dir_all(&dir)?;
	Ok(dir)
}

fn sanitize_key(key: &str) -> io::Result<String> {
	let cleaned: String = key
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '-' })
		.collect();
	if cleaned.trim_matches(|c| c == '.' || c == '-').is_empty() {
		return Err(io::Error::new(
			io::ErrorKind::InvalidInput,
			format!("unusable session key: {key:?}"),
		));
	}
	Ok(cleaned)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn creates_partition_directory() {
		let base = tempfile::tempdir().unwrap();
		let dir = partition_dir(Some(base.path()), "netflix").unwrap();
		assert!(dir.is_dir());
		assert!(dir.ends_with("sessions/netflix"));
	}

	#[test]
	fn distinct_keys_get_distinct_partitions() {
		let base = tempfile::tempdir().unwrap();
		let a = partition_dir(Some(base.path()), "netflix").unwrap();
		let b = partition_dir(Some(base.path()), "disney").unwrap();
		assert_ne!(a, b);
	}

	#[test]
	fn keys_cannot_escape_the_base() {
		let base = tempfile::tempdir().unwrap();
		let dir = partition_dir(Some(base.path()), "../evil").unwrap();
		assert!(dir.starts_with(base.path()));
		assert!(partition_dir(Some(base.path()), "..").is_err());
		assert!(partition_dir(Some(base.path()), "").is_err());
	}
}
