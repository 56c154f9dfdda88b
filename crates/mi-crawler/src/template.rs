//! Message bodies and the URLs built from configured templates.

use url::form_urlencoded;

pub const COLLECTION: &str = "{collection}";
pub const OFFSET: &str = "{offset}";
pub const MEMBER_ID: &str = "{member_id}";
pub const NAME: &str = "{name}";

/// First whitespace separated token of a display name.
pub fn first_name(display_name: &str) -> &str {
    display_name.split_whitespace().next().unwrap_or("")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    body: String,
    placeholder: String,
}

impl MessageTemplate {
    pub fn new(body: &str, placeholder: &str) -> Self {
        Self {
            body: body.to_string(),
            placeholder: placeholder.to_string(),
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Substitutes every placeholder occurrence with the member's first name.
    pub fn render(&self, display_name: &str) -> String {
        if self.placeholder.is_empty() {
            return self.body.clone();
        }
        self.body.replace(&self.placeholder, first_name(display_name))
    }
}

pub fn page_url(template: &str, collection: &str, offset: u64) -> String {
    template
        .replace(COLLECTION, collection.trim_end_matches('/'))
        .replace(OFFSET, &offset.to_string())
}

pub fn message_url(template: &str, member_id: i64, display_name: &str) -> String {
    let name: String = form_urlencoded::byte_serialize(display_name.as_bytes()).collect();
    template
        .replace(MEMBER_ID, &member_id.to_string())
        .replace(NAME, &name)
}
