//! Debug fallback marker.
//!
//! In diagnostic mode a cacheable component that missed the cache gets a named
//! wrapper, so operators can see misses in the rendered page. The wrapper is
//! applied to delivered output only; stored content never contains it.

use crate::domain::Component;
use crate::domain::output::escape_attribute;

use super::keys::CacheKey;

/// Wrapper name attached to cache misses.
pub const FALLBACK_WRAPPER: &str = "cache-fallback";

/// Attach the fallback wrapper. Returns whether the component was marked.
pub fn mark_uncached(component: &mut Component, diagnostic_mode: bool) -> bool {
    if !diagnostic_mode || component.has_wrapper(FALLBACK_WRAPPER) {
        return false;
    }
    component.add_wrapper(FALLBACK_WRAPPER);
    true
}

/// Surround delivered content with the visible miss marker.
pub fn decorate(key: &CacheKey, content: &str) -> String {
    format!(
        "<div class=\"{FALLBACK_WRAPPER}\" data-cache-key=\"{}\">{content}</div>",
        escape_attribute(&key.to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_mode_leaves_wrappers_untouched() {
        let mut component = Component::new("menu");

        assert!(!mark_uncached(&mut component, false));
        assert!(component.wrappers().is_empty());
    }

    #[test]
    fn enabled_mode_marks_once() {
        let mut component = Component::new("menu");

        assert!(mark_uncached(&mut component, true));
        assert!(!mark_uncached(&mut component, true));
        assert_eq!(component.wrappers(), [FALLBACK_WRAPPER]);
    }

    #[test]
    fn decorate_escapes_key() {
        let key = CacheKey::new("menu").vary_by("q", "a\"b");
        assert_eq!(
            decorate(&key, "<nav/>"),
            "<div class=\"cache-fallback\" data-cache-key=\"menu;q=a&quot;b\"><nav/></div>"
        );
    }
}
