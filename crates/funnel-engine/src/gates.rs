//! Bot-wall detection.
//!
//! Purely textual: known challenge-widget markers in the markup and
//! interstitial phrases in the visible text. Detection classifies the
//! attempt, it never tries to solve anything.

/// Challenge-widget markers looked for in page markup.
const MARKUP_MARKERS: [&str; 6] = [
    "g-recaptcha",
    "recaptcha/api.js",
    "iframe src=\"https://www.google.com/recaptcha",
    "h-captcha",
    "hcaptcha.com",
    "cf-challenge",
];

/// Interstitial phrases looked for in visible text.
const TEXT_MARKERS: [&str; 5] = [
    "checking your browser",
    "verify you are human",
    "unusual traffic detected",
    "cloudflare",
    "are you a robot",
];

/// Returns the marker that fired, if the page looks like a bot wall.
pub fn detect_bot_wall(markup: &str, visible_text: &str) -> Option<String> {
    let markup = markup.to_lowercase();
    if let Some(marker) = MARKUP_MARKERS
        .iter()
        .find(|marker| markup.contains(*marker))
    {
        return Some((*marker).to_string());
    }
    let text = visible_text.to_lowercase();
    TEXT_MARKERS
        .iter()
        .find(|marker| text.contains(*marker))
        .map(|marker| (*marker).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recaptcha_markup_fires() {
        let markup = r#"<div class="g-recaptcha" data-sitekey="x"></div>"#;
        assert_eq!(detect_bot_wall(markup, "").as_deref(), Some("g-recaptcha"));
    }

    #[test]
    fn interstitial_text_fires() {
        let hit = detect_bot_wall("<html></html>", "Checking your browser before accessing...");
        assert_eq!(hit.as_deref(), Some("checking your browser"));
    }

    #[test]
    fn ordinary_storefront_passes() {
        let markup = "<html><body><button>Add to cart</button></body></html>";
        assert!(detect_bot_wall(markup, "Add to cart Free shipping").is_none());
    }
}
