//! Firmware version resolution
//!
//! An upload's version comes from the first source that provides one, in
//! priority order: explicit declaration, protocol header, session target
//! (rear board only), then a fixed fallback.

/// Version used when no source provides one
pub const FALLBACK_VERSION: &str = "1.0.0";

/// Pick the first present, non-blank candidate, else `fallback`
pub fn resolve<'a, I>(candidates: I, fallback: &'a str) -> &'a str
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or(fallback)
}

/// Version sources available to a firmware upload
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionSources<'a> {
    /// Version declared with the request (query parameter)
    pub declared: Option<&'a str>,
    /// Version carried in the protocol header
    pub header: Option<&'a str>,
}

impl<'a> VersionSources<'a> {
    pub fn new(declared: Option<&'a str>, header: Option<&'a str>) -> Self {
        Self { declared, header }
    }

    /// Resolve with an optional session target appended to the chain
    pub fn resolve(&self, session_target: Option<&'a str>) -> &'a str {
        resolve([self.declared, self.header, session_target], FALLBACK_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert_eq!(resolve([Some("2.0.0"), Some("3.0.0")], "x"), "2.0.0");
        assert_eq!(resolve([None, Some("3.0.0")], "x"), "3.0.0");
        assert_eq!(resolve([None, None, Some("4.0.0")], "x"), "4.0.0");
        assert_eq!(resolve([None, None, None], "x"), "x");
    }

    #[test]
    fn test_blank_candidates_skipped() {
        assert_eq!(resolve([Some(""), Some("  "), Some(" 2.1.0 ")], "x"), "2.1.0");
    }

    #[test]
    fn test_sources() {
        let sources = VersionSources::new(None, Some("5.0.0"));
        assert_eq!(sources.resolve(Some("4.0.0")), "5.0.0");

        let sources = VersionSources::default();
        assert_eq!(sources.resolve(Some("4.0.0")), "4.0.0");
        assert_eq!(sources.resolve(None), FALLBACK_VERSION);
    }
}
