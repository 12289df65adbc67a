/// Rewrites a canonical URL into the URL actually requested.
///
/// Called once per attempt against the canonical URL; fallback URLs are
/// always requested verbatim.
pub trait UrlRewriter: Send + Sync {
    fn rewrite(&self, url: &str) -> String;
}

impl<T: UrlRewriter + ?Sized> UrlRewriter for std::sync::Arc<T> {
    fn rewrite(&self, url: &str) -> String { (**self).rewrite(url) }
}

/// Identity rewriter: requests go to the canonical URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMirror;

impl UrlRewriter for NoMirror {
    fn rewrite(&self, url: &str) -> String { url.to_string() }
}

/// Table of prefix substitutions, first match wins.
///
/// # Examples
///
/// ```
/// use harbor_fetch::{PrefixMirror, UrlRewriter};
///
/// let mirror = PrefixMirror::new()
///     .rule("https://resources.example.net/", "https://mirror.example.org/assets/");
///
/// assert_eq!(
///     mirror.rewrite("https://resources.example.net/ab/abcdef"),
///     "https://mirror.example.org/assets/ab/abcdef"
/// );
/// assert_eq!(mirror.rewrite("https://other.example/x"), "https://other.example/x");
/// ```
#[derive(Debug, Clone, Default)]
pub struct PrefixMirror {
    rules: Vec<(String, String)>,
}

impl PrefixMirror {
    pub fn new() -> Self { Self::default() }

    pub fn rule(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rules.push((from.into(), to.into()));
        self
    }

    pub fn is_empty(&self) -> bool { self.rules.is_empty() }
}

impl UrlRewriter for PrefixMirror {
    fn rewrite(&self, url: &str) -> String {
        self.rules
            .iter()
            .find_map(|(from, to)| url.strip_prefix(from.as_str()).map(|rest| format!("{to}{rest}")))
            .unwrap_or_else(|| url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_matching_rule_wins() {
        let mirror = PrefixMirror::new()
            .rule("https://a.example/libs/", "https://m1.example/")
            .rule("https://a.example/", "https://m2.example/");

        assert_eq!(mirror.rewrite("https://a.example/libs/x.jar"), "https://m1.example/x.jar");
        assert_eq!(mirror.rewrite("https://a.example/v.json"), "https://m2.example/v.json");
    }

    #[test]
    fn test_shared_rewriters() {
        let shared: std::sync::Arc<dyn UrlRewriter> = std::sync::Arc::new(NoMirror);
        assert_eq!(shared.rewrite("http://x.example/"), "http://x.example/");
        assert!(PrefixMirror::new().is_empty());
    }
}
