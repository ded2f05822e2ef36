//! Referrer-URL code extraction for the recent-touch fallback. Affiliate
//! links come in two shapes: a path segment (`/affiliate/<CODE>`) and a
//! query parameter (`?ref=<CODE>`).

use url::Url;

use clinic_core::types::normalize_code;

/// Pull an affiliate code out of a referrer URL, path form first.
pub fn extract_ref_code(referrer: &str) -> Option<String> {
    let url = Url::parse(referrer).ok()?;

    if let Some(mut segments) = url.path_segments() {
        while let Some(segment) = segments.next() {
            if segment.eq_ignore_ascii_case("affiliate") {
                if let Some(code) = segments.next() {
                    if !code.is_empty() {
                        return Some(normalize_code(code));
                    }
                }
            }
        }
    }

    url.query_pairs()
        .find(|(key, value)| key == "ref" && !value.is_empty())
        .map(|(_, value)| normalize_code(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_form() {
        assert_eq!(
            extract_ref_code("https://clinic.example.com/affiliate/spring24").as_deref(),
            Some("SPRING24")
        );
        assert_eq!(
            extract_ref_code("https://clinic.example.com/lp/affiliate/WELL10/landing").as_deref(),
            Some("WELL10")
        );
    }

    #[test]
    fn test_query_form() {
        assert_eq!(
            extract_ref_code("https://clinic.example.com/book?utm_source=x&ref=spring24").as_deref(),
            Some("SPRING24")
        );
    }

    #[test]
    fn test_path_takes_precedence_over_query() {
        assert_eq!(
            extract_ref_code("https://x.example/affiliate/AAA?ref=BBB").as_deref(),
            Some("AAA")
        );
    }

    #[test]
    fn test_no_code() {
        assert!(extract_ref_code("https://clinic.example.com/book").is_none());
        assert!(extract_ref_code("https://clinic.example.com/affiliate/").is_none());
        assert!(extract_ref_code("not a url").is_none());
        assert!(extract_ref_code("https://x.example/?ref=").is_none());
    }
}
