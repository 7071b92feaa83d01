/// Join an endpoint path onto a base URL, normalizing the slash between
/// segments. Trailing slashes on the path are preserved (the attestation
/// endpoint requires one).
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
