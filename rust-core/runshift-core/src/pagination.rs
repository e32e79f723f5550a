//! # Pagination Resolver
//!
//! Clamps raw `page` / `limit` inputs into a safe LIMIT/OFFSET pair.

use serde::Serialize;

/// Default page size
pub const DEFAULT_PAGE_SIZE: i64 = 24;
/// Default upper bound on the page size
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 100;
/// Hard ceiling no configuration can exceed
pub const HARD_MAX_PAGE_SIZE: i64 = 200;

/// Page-size policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Size used when `limit` is absent or not a number
    pub default_size: i64,
    /// Largest accepted size
    pub max_size: i64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl PageLimits {
    /// Build a policy, keeping both values inside `[1, HARD_MAX_PAGE_SIZE]`
    /// and the default no larger than the maximum
    #[must_use]
    pub fn new(default_size: i64, max_size: i64) -> Self {
        let max_size = max_size.clamp(1, HARD_MAX_PAGE_SIZE);
        Self {
            default_size: default_size.clamp(1, max_size),
            max_size,
        }
    }

    /// Resolve raw inputs into a page
    ///
    /// Non-numeric input is treated as absent. `page` is floored at 1 and
    /// `limit` is clamped to `[1, max_size]`.
    #[must_use]
    pub fn resolve(&self, page: Option<&str>, limit: Option<&str>) -> Page {
        let number = parse_int(page).unwrap_or(1).max(1);
        let size = parse_int(limit)
            .unwrap_or(self.default_size)
            .clamp(1, self.max_size);

        Page {
            number,
            size,
            offset: (number - 1).saturating_mul(size),
        }
    }
}

fn parse_int(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
}

/// Resolved page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    /// 1-based page number
    pub number: i64,
    /// Rows per page
    pub size: i64,
    /// Rows to skip
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let page = PageLimits::default().resolve(None, None);
        assert_eq!(page, Page { number: 1, size: 24, offset: 0 });
    }

    #[test]
    fn test_offset() {
        let page = PageLimits::default().resolve(Some("3"), Some("10"));
        assert_eq!(page.offset, 20);
    }

    #[test]
    fn test_limit_clamped_to_max() {
        let page = PageLimits::default().resolve(None, Some("1000"));
        assert_eq!(page.size, 100);
        let page = PageLimits::default().resolve(None, Some("0"));
        assert_eq!(page.size, 1);
        let page = PageLimits::default().resolve(None, Some("-5"));
        assert_eq!(page.size, 1);
    }

    #[test]
    fn test_page_floored_at_one() {
        assert_eq!(PageLimits::default().resolve(Some("0"), None).number, 1);
        assert_eq!(PageLimits::default().resolve(Some("-4"), None).number, 1);
    }

    #[test]
    fn test_non_numeric_uses_defaults() {
        let page = PageLimits::default().resolve(Some("two"), Some("lots"));
        assert_eq!(page, Page { number: 1, size: 24, offset: 0 });
    }

    #[test]
    fn test_configured_limits_capped() {
        let limits = PageLimits::new(500, 10_000);
        assert_eq!(limits.max_size, HARD_MAX_PAGE_SIZE);
        assert_eq!(limits.default_size, HARD_MAX_PAGE_SIZE);

        let limits = PageLimits::new(60, 200);
        assert_eq!(limits.resolve(None, None).size, 60);
        assert_eq!(limits.resolve(None, Some("150")).size, 150);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let page = PageLimits::default().resolve(Some(&i64::MAX.to_string()), Some("100"));
        assert_eq!(page.offset, i64::MAX);
    }
}
