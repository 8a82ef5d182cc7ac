//! Shared request header values for page and asset traffic.
//!
//! Recording servers serve a degraded page (or refuse media) to clients that
//! do not look like a browser, so every request carries the same desktop UA.

/// Desktop browser User-Agent sent with every request.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// `Accept` header for media downloads (video and binary assets).
pub(crate) const MEDIA_ACCEPT: &str =
    "video/webm,video/ogg,video/*;q=0.9,application/ogg;q=0.7,audio/*;q=0.6,*/*;q=0.5";
