use llmgate_provider_core::{KeyReason, UpstreamFailure};

/// What an upstream failure says about the credential used for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The request itself is bad; retrying with another key cannot help.
    RequestContent,
    /// The credential is dead for good.
    PermanentCredential,
    /// The credential (or the provider) needs a cooldown.
    TransientCredential,
}

/// Body substrings that prove a credential problem regardless of status.
/// Matching is case-insensitive.
pub const PERMANENT_MARKERS: &[&str] = &[
    "invalid api key",
    "api key not valid",
    "api key expired",
    "incorrect api key",
    "account has been deactivated",
];

/// Body substrings that mark the request content as the problem.
pub const REQUEST_CONTENT_MARKERS: &[&str] = &[
    "context length",
    "maximum context",
    "string too long",
    "invalid request body",
    "unsupported parameter",
    "content management policy",
];

pub fn classify_failure(failure: &UpstreamFailure) -> FailureClass {
    match failure {
        UpstreamFailure::Transport { .. } => FailureClass::TransientCredential,
        UpstreamFailure::Http { status, body, .. } => {
            let body = String::from_utf8_lossy(body).to_ascii_lowercase();
            // An explicit credential marker wins even on status 400.
            if contains_any(&body, PERMANENT_MARKERS) {
                return FailureClass::PermanentCredential;
            }
            if matches!(status, 400 | 404 | 422) || contains_any(&body, REQUEST_CONTENT_MARKERS) {
                return FailureClass::RequestContent;
            }
            // 403 is a credential problem unless the body said otherwise.
            if matches!(status, 401 | 403) {
                return FailureClass::PermanentCredential;
            }
            FailureClass::TransientCredential
        }
    }
}

/// Pool bookkeeping reason for a non-surfaced failure.
pub fn failure_reason(failure: &UpstreamFailure) -> KeyReason {
    match failure {
        UpstreamFailure::Transport { .. } => KeyReason::Network,
        UpstreamFailure::Http { status, .. } => match status {
            429 => KeyReason::RateLimit,
            401 | 403 => KeyReason::AuthInvalid,
            s if (500..600).contains(s) => KeyReason::Upstream5xx,
            _ => KeyReason::Upstream5xx,
        },
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use llmgate_provider_core::TransportErrorKind;

    fn http(status: u16, body: &str) -> UpstreamFailure {
        UpstreamFailure::Http {
            status,
            headers: Vec::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn status_401_is_permanent() {
        assert_eq!(
            classify_failure(&http(401, "{}")),
            FailureClass::PermanentCredential
        );
    }

    #[test]
    fn status_403_is_permanent_unless_content_marker() {
        assert_eq!(
            classify_failure(&http(403, "forbidden")),
            FailureClass::PermanentCredential
        );
        assert_eq!(
            classify_failure(&http(403, "blocked by content management policy")),
            FailureClass::RequestContent
        );
    }

    #[test]
    fn permanent_marker_beats_status_400() {
        assert_eq!(
            classify_failure(&http(400, "Error: API key not valid. Check credentials.")),
            FailureClass::PermanentCredential
        );
    }

    #[test]
    fn plain_400_surfaces_as_request_content() {
        assert_eq!(
            classify_failure(&http(400, "missing field messages")),
            FailureClass::RequestContent
        );
    }

    #[test]
    fn rate_limit_and_5xx_are_transient() {
        assert_eq!(
            classify_failure(&http(429, "slow down")),
            FailureClass::TransientCredential
        );
        assert_eq!(
            classify_failure(&http(503, "overloaded")),
            FailureClass::TransientCredential
        );
        assert_eq!(failure_reason(&http(429, "")), KeyReason::RateLimit);
        assert_eq!(failure_reason(&http(502, "")), KeyReason::Upstream5xx);
    }

    #[test]
    fn transport_failures_are_transient_network() {
        let failure = UpstreamFailure::Transport {
            kind: TransportErrorKind::Timeout,
            message: "timed out".into(),
        };
        assert_eq!(
            classify_failure(&failure),
            FailureClass::TransientCredential
        );
        assert_eq!(failure_reason(&failure), KeyReason::Network);
    }

    #[test]
    fn marker_matching_is_case_insensitive() {
        assert_eq!(
            classify_failure(&http(500, "INVALID API KEY provided")),
            FailureClass::PermanentCredential
        );
    }
}
