//! Per-recipient placeholder substitution.

use crate::recipient::Recipient;

pub const NAME_TOKEN: &str = "{{name}}";
pub const EMAIL_TOKEN: &str = "{{email}}";

/// Replace every `{{name}}` and `{{email}}` in `template` with the
/// recipient's values. Any other text is left as-is.
pub fn render(template: &str, recipient: &Recipient) -> String {
    template
        .replace(NAME_TOKEN, &recipient.name)
        .replace(EMAIL_TOKEN, &recipient.email)
}
