// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

use crate::error::{AppError, Result};

/// Append path segments to a base URL, percent-encoding each segment.
///
/// # Examples
/// ```
/// use jobsync::utils::url::join_segments;
///
/// let url = url::Url::parse("https://api.example.com/v1/").unwrap();
/// assert_eq!(
///     join_segments(&url, &["jobs", "a b"]).unwrap().as_str(),
///     "https://api.example.com/v1/jobs/a%20b"
/// );
/// ```
pub fn join_segments(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| AppError::config(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
