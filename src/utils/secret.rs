use std::fs;
use std::path::Path;

use super::error::SecretError;

/// Resolves a credential that may be given inline or through a file.
///
/// A non-empty inline value always wins. Otherwise the file, if any, is read
/// and surrounding whitespace trimmed. With neither set the credential is
/// empty.
pub fn resolve_secret(inline: &str, file: Option<&Path>) -> Result<String, SecretError> {
    if !inline.is_empty() {
        return Ok(inline.to_string());
    }

    match file {
        Some(path) => fs::read_to_string(path)
            .map(|content| content.trim().to_string())
            .map_err(|source| SecretError::Read {
                path: path.to_path_buf(),
                source,
            }),
        None => Ok(String::new()),
    }
}
