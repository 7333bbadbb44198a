//! Anti-detection setup for fallback sessions.

use rand::seq::SliceRandom;
use rand::Rng;

/// Injected at page-creation time, before any page script runs, to mask the
/// signals Chromium exposes when it is driven over CDP.
pub const STEALTH_INIT_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3] });
window.chrome = window.chrome || { runtime: {} };
const originalQuery = window.navigator.permissions.query;
window.navigator.permissions.query = (parameters) =>
  parameters.name === 'notifications'
    ? Promise.resolve({ state: Notification.permission })
    : originalQuery(parameters);
"#;

const DESKTOP_PLATFORMS: &[&str] = &[
    "(Windows NT 10.0; Win64; x64)",
    "(Macintosh; Intel Mac OS X 10_15_7)",
    "(X11; Linux x86_64)",
];

/// Build a realistic desktop Chrome user-agent with a randomized build.
pub fn random_user_agent() -> String {
    let mut rng = rand::thread_rng();
    let platform = DESKTOP_PLATFORMS
        .choose(&mut rng)
        .unwrap_or(&DESKTOP_PLATFORMS[0]);
    let major = rng.gen_range(120..=128);
    let build = rng.gen_range(6000..6999);
    format!(
        "Mozilla/5.0 {platform} AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/{major}.0.{build}.100 Safari/537.36"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_looks_like_chrome() {
        let ua = random_user_agent();
        assert!(ua.starts_with("Mozilla/5.0 ("));
        assert!(ua.contains("Chrome/"));
        assert!(ua.ends_with("Safari/537.36"));
    }

    #[test]
    fn test_stealth_script_masks_webdriver_flag() {
        assert!(STEALTH_INIT_SCRIPT.contains("navigator, 'webdriver'"));
    }
}
