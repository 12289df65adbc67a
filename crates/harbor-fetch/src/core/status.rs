/// Returns `true` if the HTTP status means the resource is absent or refused
/// at this location, so another origin may still have it.
///
/// # Recognized Codes
///
/// - 403: Forbidden
/// - 404: Not Found
///
/// # Examples
///
/// ```
/// use harbor_fetch::core::is_missing;
///
/// assert!(is_missing(404));
/// assert!(is_missing(403));
/// assert!(!is_missing(500));
/// ```
pub fn is_missing(status: u16) -> bool { matches!(status, 403 | 404) }
