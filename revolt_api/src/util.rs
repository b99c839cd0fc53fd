/// Join a base URL and path segments with single slashes.
pub fn build_url(base: &str, segments: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for seg in segments {
        url.push('/');
        url.push_str(seg.trim_start_matches('/'));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::build_url;

    #[test]
    fn joins_segments_without_doubled_slashes() {
        let url = build_url("https://api.revolt.chat/", &["channels", "/abc", "messages"]);
        assert_eq!(url, "https://api.revolt.chat/channels/abc/messages");
    }

    #[test]
    fn base_only() {
        assert_eq!(build_url("https://autumn.revolt.chat", &[]), "https://autumn.revolt.chat");
    }
}
