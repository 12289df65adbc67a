/// Percentage of `done` out of `total`, rounded to two decimals.
///
/// Returns `None` when the total is unknown or zero, which callers surface as
/// indeterminate progress. Overshooting servers are clamped to 100.
pub fn round_percent(done: u64, total: Option<u64>) -> Option<f64> {
    let total = total.filter(|t| *t > 0)?;
    let percent = (done as f64 / total as f64 * 100.0).min(100.0);
    Some((percent * 100.0).round() / 100.0)
}
