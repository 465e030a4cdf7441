//! Classification of provider error text.
//!
//! Providers report parameter problems as free text. All matching lives here so
//! the fetch loop only ever sees a [`Rejection`].

/// Why the provider refused a request, as far as the fetch loop cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// `Parameter <code> not available`: drop that one code and retry.
    ParameterUnavailable(String),
    /// The request as a whole was refused; unit suffixes are the usual culprit.
    MalformedRequest,
}

/// Phrases that mark a request-level rejection (matched case-insensitively).
pub const MALFORMED_PATTERNS: &[&str] = &[
    "incorrect url",
    "bad request",
    "incorrect parameter",
    "invalid parameter",
    "unknown parameter",
];

const UNAVAILABLE_PREFIX: &str = "parameter ";
const UNAVAILABLE_SUFFIX: &str = " not available";

/// Classifies the combined status text and body of a failed response.
pub fn classify_rejection(text: &str) -> Option<Rejection> {
    if let Some(code) = unavailable_parameter(text) {
        return Some(Rejection::ParameterUnavailable(code));
    }

    let lower = text.to_ascii_lowercase();
    if MALFORMED_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Some(Rejection::MalformedRequest);
    }
    None
}

// ASCII lowercasing keeps byte offsets, so indices found in `lower` are valid in `text`.
fn unavailable_parameter(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let mut from = 0;
    while let Some(rel) = lower[from..].find(UNAVAILABLE_PREFIX) {
        let start = from + rel + UNAVAILABLE_PREFIX.len();
        let rest = &lower[start..];
        if let Some(end_rel) = rest.find(UNAVAILABLE_SUFFIX) {
            let code = text[start..start + end_rel]
                .trim()
                .trim_matches(|c| c == '\'' || c == '"' || c == '`');
            if !code.is_empty() && !code.contains(char::is_whitespace) {
                return Some(code.to_string());
            }
        }
        from = start;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_unavailable_code_preserving_case() {
        assert_eq!(
            classify_rejection("Parameter t_2m:C not available"),
            Some(Rejection::ParameterUnavailable("t_2m:C".into()))
        );
        assert_eq!(
            classify_rejection("Bad Request: parameter 'PRECTOTCORR' not available for model mix"),
            Some(Rejection::ParameterUnavailable("PRECTOTCORR".into()))
        );
    }

    #[test]
    fn unavailable_takes_precedence_over_bad_request() {
        assert_eq!(
            classify_rejection("Bad Request\nParameter b not available"),
            Some(Rejection::ParameterUnavailable("b".into()))
        );
    }

    #[test]
    fn request_level_patterns() {
        for text in [
            "Incorrect URL",
            "400 Bad Request",
            "Incorrect parameter: foo",
            "Invalid parameter(s) requested",
        ] {
            assert_eq!(
                classify_rejection(text),
                Some(Rejection::MalformedRequest),
                "{}",
                text
            );
        }
    }

    #[test]
    fn unrelated_text_is_not_a_rejection() {
        assert_eq!(classify_rejection("Unauthorized"), None);
        assert_eq!(classify_rejection(""), None);
        // Multi-word "codes" are prose, not a parameter name.
        assert_eq!(classify_rejection("the parameter you asked for is not available"), None);
    }
}
