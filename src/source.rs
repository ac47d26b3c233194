// Host field validation: animation URL and StartEndFrame.
// See DESIGN.md: source

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ControlError;
use crate::types::FrameRange;

// Scheme optional, domain + TLD required, optional path/query. Unanchored.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(https?://.)?(www\.)?[-a-zA-Z0-9@:%._+~#=]{2,256}\.[a-z]{2,6}\b([-a-zA-Z0-9@:%_+.~#?&/=]*)",
    )
    .expect("URL pattern is a valid regex")
});

/// Whether the host-supplied value looks like a URL.
pub fn is_valid_url(url: Option<&str>) -> bool {
    url.is_some_and(|url| URL_PATTERN.is_match(url))
}

/// Validate a URL, naming it in the error.
pub fn validate_url(url: Option<&str>) -> Result<&str, ControlError> {
    match url {
        Some(url) if is_valid_url(Some(url)) => Ok(url),
        Some(url) => Err(ControlError::InvalidSource(url.to_string())),
        None => Err(ControlError::InvalidSource("<none>".to_string())),
    }
}

/// Parse the optional StartEndFrame field. Blank means full range.
pub fn parse_frame_range(raw: Option<&str>) -> Result<Option<FrameRange>, ControlError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_urls() {
        assert!(is_valid_url(Some("https://assets.example.com/anim.json")));
        assert!(is_valid_url(Some("http://www.example.org")));
        assert!(is_valid_url(Some("example.io/path?x=1&y=2")));
    }

    #[test]
    fn rejects_non_urls() {
        assert!(!is_valid_url(Some("not a url!!")));
        assert!(!is_valid_url(Some("")));
        assert!(!is_valid_url(None));
        assert!(validate_url(Some("nope")).is_err());
    }

    #[test]
    fn frame_range_field() {
        assert_eq!(parse_frame_range(None).unwrap(), None);
        assert_eq!(parse_frame_range(Some("  ")).unwrap(), None);
        assert_eq!(
            parse_frame_range(Some("10,20")).unwrap(),
            Some(FrameRange::new(10, 20).unwrap())
        );
        assert!(parse_frame_range(Some("10,x")).is_err());
    }
}
