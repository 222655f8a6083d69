//! Image reference helpers
//!
//! Everything here is a pure string transformation over the reference handed
//! in by the update watcher (`registry/namespace/repo:tag@digest`).

/// Number of trailing digest characters shown as a version in Home Assistant.
pub const SHORT_DIGEST_LEN: usize = 8;

/// Strips the tag and digest pin from an image reference.
///
/// The reference is cut at the first `:` and the remainder at the first `@`,
/// in that order. A registry with an explicit port (`host:5000/repo`) is
/// therefore cut at the port separator too.
pub fn repository_path(image: &str) -> &str {
    let untagged = image.split(':').next().unwrap_or(image);
    untagged.split('@').next().unwrap_or(untagged)
}

/// Short name of a repository: its last `/` segment.
pub fn display_name(repository: &str) -> &str {
    repository.rsplit('/').next().unwrap_or(repository)
}

/// Replaces every character outside `[A-Za-z0-9_-]` with `-`.
///
/// The substitution is one-for-one, so the result has as many characters as
/// the input.
pub fn sanitize(repository: &str) -> String {
    repository
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Last [`SHORT_DIGEST_LEN`] characters of a digest, or the whole digest when
/// it is shorter.
pub fn short_digest(digest: &str) -> &str {
    match digest.char_indices().rev().nth(SHORT_DIGEST_LEN - 1) {
        Some((idx, _)) => &digest[idx..],
        None => digest,
    }
}
