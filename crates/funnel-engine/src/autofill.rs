//! Best-effort checkout autofill.
//!
//! Classifies visible text controls against the synthetic shopper
//! identity by name/placeholder/autocomplete patterns and fills them.
//! Strictly best-effort: failures are counted, never surfaced.

use tracing::debug;

use cartprobe_core_types::{ControlDescriptor, ControlKind};
use cdp_driver::PageSession;

use crate::config::TestData;

/// Which shopper-identity field a control should receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Email,
    Name,
    Phone,
    Address,
    City,
    State,
    Zip,
}

fn classify(control: &ControlDescriptor) -> Option<Field> {
    if control.kind != ControlKind::Text {
        return None;
    }
    let haystack = format!(
        "{} {} {} {}",
        control.name, control.placeholder, control.autocomplete, control.dom_id
    )
    .to_lowercase();

    if haystack.contains("password") || haystack.contains("search") {
        return None;
    }
    if haystack.contains("email") {
        return Some(Field::Email);
    }
    if haystack.contains("phone") || haystack.contains("mobile") || haystack.contains("tel") {
        return Some(Field::Phone);
    }
    if haystack.contains("pincode")
        || haystack.contains("zip")
        || haystack.contains("postal")
        || haystack.contains("postcode")
    {
        return Some(Field::Zip);
    }
    if haystack.contains("city") || haystack.contains("town") {
        return Some(Field::City);
    }
    if haystack.contains("state") || haystack.contains("province") {
        return Some(Field::State);
    }
    if haystack.contains("address") || haystack.contains("street") {
        return Some(Field::Address);
    }
    // "name" last: "username" and "cardname" variants already filtered
    // or irrelevant by this point.
    if haystack.contains("name") && !haystack.contains("user") {
        return Some(Field::Name);
    }
    None
}

fn value_for<'a>(field: Field, data: &'a TestData) -> &'a str {
    match field {
        Field::Email => &data.email,
        Field::Name => &data.name,
        Field::Phone => &data.phone,
        Field::Address => &data.address,
        Field::City => &data.city,
        Field::State => &data.state,
        Field::Zip => &data.zip,
    }
}

/// Fill every recognizable contact/address control. Returns how many
/// fills landed.
pub async fn fill_checkout_fields(page: &dyn PageSession, data: &TestData) -> u32 {
    let controls = page.form_controls().await.unwrap_or_default();
    let mut filled = 0;
    for control in &controls {
        let Some(field) = classify(control) else {
            continue;
        };
        match page.fill(&control.address, value_for(field, data)).await {
            Ok(()) => filled += 1,
            Err(err) => debug!(address = %control.address, %err, "autofill skipped"),
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_driver::mock::{MockPage, MockPageState};

    fn control(name: &str, placeholder: &str, address: &str) -> ControlDescriptor {
        ControlDescriptor {
            kind: ControlKind::Text,
            tag: "input".into(),
            text: String::new(),
            aria_label: String::new(),
            dom_id: String::new(),
            name: name.into(),
            placeholder: placeholder.into(),
            autocomplete: String::new(),
            max_length: None,
            required: false,
            address: address.into(),
            options: Vec::new(),
        }
    }

    #[tokio::test]
    async fn fills_recognized_fields_only() {
        let page = MockPage::new(MockPageState {
            controls: vec![
                control("email", "", "#email"),
                control("phone", "", "#phone"),
                control("", "Pincode", "#pin"),
                control("password", "", "#pw"),
                control("coupon", "", "#coupon"),
            ],
            ..Default::default()
        });
        let data = TestData::default();

        let filled = fill_checkout_fields(page.as_ref(), &data).await;
        assert_eq!(filled, 3);
        let fills = page.state.lock().unwrap().fills.clone();
        assert!(fills.contains(&("#email".to_string(), data.email.clone())));
        assert!(fills.contains(&("#phone".to_string(), data.phone.clone())));
        assert!(fills.contains(&("#pin".to_string(), data.zip.clone())));
    }

    #[test]
    fn username_is_not_a_name_field() {
        assert_eq!(classify(&control("username", "", "#u")), None);
        assert_eq!(classify(&control("full_name", "", "#n")), Some(Field::Name));
        assert_eq!(
            classify(&control("", "Street address", "#a")),
            Some(Field::Address)
        );
    }
}
