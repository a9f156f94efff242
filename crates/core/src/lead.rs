//! Lead domain: contact validation, payload assembly, message rendering.
//!
//! A lead is a prospective customer's contact submission, optionally
//! bundled with the cart contents. The flow is strictly layered: the form
//! is validated into a [`ContactInfo`], the cart is snapshotted into the
//! [`LeadPayload`], and [`render_message`] produces the Markdown text that
//! is ultimately sent to the notification channel.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cart::CartItem;
use crate::errors::FieldErrors;

/// Minimum phone length accepted by client-side validation. The relay
/// re-validates with the looser wire-schema threshold of 5.
pub const MIN_PHONE_LEN: usize = 7;

/// Raw checkout form state as the UI holds it, agreement checkbox included.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub phone: String,
    pub preferred_channel: String,
    pub comment: String,
    pub agreed_to_policy: bool,
}

/// Validated contact fields, minus the agreement flag, as they travel on
/// the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Validates the checkout form. Collects every failing field rather than
/// stopping at the first; synchronous and side-effect-free.
pub fn validate_contact(form: &ContactForm) -> Result<ContactInfo, FieldErrors> {
    let mut errors = FieldErrors::new();

    if form.name.trim().is_empty() {
        errors.insert("name", "Enter your name");
    }
    if form.phone.trim().len() < MIN_PHONE_LEN {
        errors.insert("phone", "Enter a valid phone number");
    }
    if !form.agreed_to_policy {
        errors.insert("agreedToPolicy", "You must accept the privacy policy");
    }

    errors.into_result()?;

    let optional = |value: &str| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    };

    Ok(ContactInfo {
        name: form.name.trim().to_string(),
        phone: form.phone.trim().to_string(),
        preferred_channel: optional(&form.preferred_channel),
        comment: optional(&form.comment),
    })
}

/// One snapshotted cart line as it appears in the payload wire format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadCartItem {
    pub id: String,
    pub title: String,
    pub qty: u32,
    pub price: Decimal,
}

impl LeadCartItem {
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.qty)
    }
}

impl From<&CartItem> for LeadCartItem {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            qty: item.quantity,
            price: item.unit_price,
        }
    }
}

/// Ambient provenance for a submission, supplied by the presentation layer
/// (the page URL and referrer the browser would have injected).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageContext {
    pub page_url: String,
    pub referrer: String,
    pub source: Option<String>,
}

/// The canonical submission unit. `meta` stays a free-form JSON object so
/// the relay accepts arbitrary provenance from older clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPayload {
    pub contact: ContactInfo,
    pub cart_items: Vec<LeadCartItem>,
    #[serde(default)]
    pub meta: Value,
    #[serde(default)]
    pub honeypot: String,
}

impl LeadPayload {
    pub fn total(&self) -> Decimal {
        self.cart_items.iter().map(LeadCartItem::subtotal).sum()
    }

    /// Non-empty honeypot flags an automated submission.
    pub fn is_spam(&self) -> bool {
        !self.honeypot.is_empty()
    }

    fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(Value::as_str).filter(|value| !value.is_empty())
    }
}

/// Assembles the canonical payload. Page URL and referrer are always
/// injected into `meta`; caller-supplied overrides win per key. Cart items
/// are deep-copied, so mutating the live cart afterwards cannot change an
/// in-flight submission.
pub fn build_payload(
    contact: ContactInfo,
    cart_items: &[CartItem],
    page: &PageContext,
    meta_overrides: Map<String, Value>,
    honeypot: Option<String>,
) -> LeadPayload {
    let mut meta = Map::new();
    meta.insert("pageUrl".to_string(), Value::String(page.page_url.clone()));
    meta.insert("referrer".to_string(), Value::String(page.referrer.clone()));
    if let Some(source) = &page.source {
        meta.insert("source".to_string(), Value::String(source.clone()));
    }
    for (key, value) in meta_overrides {
        meta.insert(key, value);
    }

    LeadPayload {
        contact,
        cart_items: cart_items.iter().map(LeadCartItem::from).collect(),
        meta: Value::Object(meta),
        honeypot: honeypot.unwrap_or_default(),
    }
}

/// Renders the multi-line Markdown summary sent as the notification text.
pub fn render_message(payload: &LeadPayload) -> String {
    let mut lines = Vec::new();
    lines.push("🌳 *New storefront lead*".to_string());
    lines.push(String::new());

    lines.push("👤 *Contact*".to_string());
    lines.push(format!("Name: {}", payload.contact.name));
    lines.push(format!("Phone: {}", payload.contact.phone));
    if let Some(channel) = &payload.contact.preferred_channel {
        lines.push(format!("Preferred channel: {channel}"));
    }
    if let Some(comment) = &payload.contact.comment {
        lines.push(format!("Comment: {comment}"));
    }

    lines.push(String::new());
    if payload.cart_items.is_empty() {
        lines.push("🛒 *Cart:* no items selected".to_string());
    } else {
        lines.push(format!("🛒 *Cart* ({} items)", payload.cart_items.len()));
        for item in &payload.cart_items {
            lines.push(format!("- {} × {} = {}", item.title, item.qty, item.subtotal()));
        }
        lines.push(String::new());
        lines.push(format!("💰 *Total:* {}", payload.total()));
    }

    let source = payload.meta_str("source");
    let page_url = payload.meta_str("pageUrl");
    let referrer = payload.meta_str("referrer");
    if source.is_some() || page_url.is_some() || referrer.is_some() {
        lines.push(String::new());
        if let Some(source) = source {
            lines.push(format!("📍 Source: {source}"));
        }
        if let Some(page_url) = page_url {
            lines.push(format!("🔗 Page: {page_url}"));
        }
        if let Some(referrer) = referrer {
            lines.push(format!("Referrer: {referrer}"));
        }
    }

    lines.join("\n")
}
