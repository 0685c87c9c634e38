//! Recognition of the host site's page kinds.

use url::Url;

/// A watch page hosts exactly one playable video: `/watch` plus a
/// video-identifying query parameter.
pub fn is_watch_page(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !is_host(parsed.host_str()) {
        return false;
    }
    parsed.path() == "/watch" && parsed.query().is_some_and(|query| query.contains("v="))
}

/// Any page on the video host, watch page or not.
pub fn is_host_site(url: &str) -> bool {
    Url::parse(url)
        .map(|parsed| is_host(parsed.host_str()))
        .unwrap_or(false)
}

fn is_host(host: Option<&str>) -> bool {
    match host {
        Some(host) => host == "youtube.com" || host.ends_with(".youtube.com"),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_page_requires_path_and_video_param() {
        assert!(is_watch_page("https://www.youtube.com/watch?v=abc123"));
        assert!(is_watch_page("https://youtube.com/watch?list=x&v=abc"));
        assert!(!is_watch_page("https://www.youtube.com/watch"));
        assert!(!is_watch_page("https://www.youtube.com/feed/subscriptions"));
        assert!(!is_watch_page("https://example.com/watch?v=abc123"));
        assert!(!is_watch_page("not a url"));
    }

    #[test]
    fn host_site_matches_any_page_on_the_domain() {
        assert!(is_host_site("https://www.youtube.com/"));
        assert!(is_host_site("https://music.youtube.com/explore"));
        assert!(!is_host_site("https://example.com/"));
    }
}
