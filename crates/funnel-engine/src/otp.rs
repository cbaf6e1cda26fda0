//! One-time-passcode detection.
//!
//! An OTP challenge is a deliberate halt: completing it needs a live
//! human, so the run stops with `halted(otp_required)` instead of
//! failing. Signatures: `autocomplete="one-time-code"`, otp/one-time/
//! verification wording in name/id/placeholder, or short fixed-length
//! code grids. Promo/coupon code fields are explicitly excluded.

use cartprobe_core_types::{ControlDescriptor, ControlKind};

const OTP_WORDS: [&str; 4] = ["otp", "one-time", "one time", "verification code"];
const NOT_OTP_WORDS: [&str; 5] = ["promo", "coupon", "discount", "gift", "referral"];

/// Whether this control is an OTP input.
pub fn is_otp_control(control: &ControlDescriptor) -> bool {
    if control.kind != ControlKind::Text {
        return false;
    }
    if control.autocomplete.eq_ignore_ascii_case("one-time-code") {
        return true;
    }
    let haystack = format!(
        "{} {} {} {}",
        control.name, control.dom_id, control.placeholder, control.aria_label
    )
    .to_lowercase();
    if NOT_OTP_WORDS.iter().any(|word| haystack.contains(word)) {
        return false;
    }
    if OTP_WORDS.iter().any(|word| haystack.contains(word)) {
        return true;
    }
    // Single-character grid cells: maxlength 1 with a code-ish name,
    // or a short fixed-length "code" field.
    matches!(control.max_length, Some(1..=8)) && haystack.contains("code")
}

/// Whether the page is showing an OTP challenge.
pub fn detect_otp(controls: &[ControlDescriptor]) -> bool {
    controls.iter().any(is_otp_control)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(
        name: &str,
        placeholder: &str,
        autocomplete: &str,
        max_length: Option<u32>,
    ) -> ControlDescriptor {
        ControlDescriptor {
            kind: ControlKind::Text,
            tag: "input".into(),
            text: String::new(),
            aria_label: String::new(),
            dom_id: String::new(),
            name: name.into(),
            placeholder: placeholder.into(),
            autocomplete: autocomplete.into(),
            max_length,
            required: false,
            address: "#x".into(),
            options: Vec::new(),
        }
    }

    #[test]
    fn autocomplete_signature_fires() {
        assert!(is_otp_control(&control("", "", "one-time-code", None)));
    }

    #[test]
    fn wording_signatures_fire() {
        assert!(is_otp_control(&control("otp", "", "", None)));
        assert!(is_otp_control(&control("", "Enter verification code", "", None)));
        assert!(is_otp_control(&control("code", "", "", Some(6))));
    }

    #[test]
    fn promo_code_is_not_otp() {
        assert!(!is_otp_control(&control("promo_code", "", "", Some(8))));
        assert!(!is_otp_control(&control("coupon-code", "", "", Some(6))));
        assert!(!is_otp_control(&control("email", "", "", None)));
    }
}
