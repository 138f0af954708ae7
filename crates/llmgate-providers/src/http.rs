use llmgate_provider_core::{Headers, header_set};

pub fn set_bearer(headers: &mut Headers, token: &str) {
    header_set(headers, "authorization", &format!("Bearer {token}"));
}

pub fn set_json_headers(headers: &mut Headers) {
    header_set(headers, "accept", "application/json");
    header_set(headers, "content-type", "application/json");
}

/// Join a base URL and path without duplicating a trailing `/v1`.
pub fn build_url(base_url: Option<&str>, default_base: &str, path: &str) -> String {
    let base = base_url.unwrap_or(default_base).trim_end_matches('/');
    let mut path = path.trim_start_matches('/');
    if base.ends_with("/v1") && (path == "v1" || path.starts_with("v1/")) {
        path = path.trim_start_matches("v1/").trim_start_matches("v1");
    }
    format!("{base}/{path}")
}
