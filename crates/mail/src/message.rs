use bulksend_core::{render, Recipient};

/// A fully rendered email for exactly one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Recipient,
    pub cc: Option<String>,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    /// Render `subject`/`body` templates for `to`.
    pub fn render(to: Recipient, subject: &str, body: &str, cc: Option<&str>) -> Self {
        Self {
            subject: render(subject, &to),
            body: render(body, &to),
            cc: cc.map(str::to_string),
            to,
        }
    }

    /// Cc addresses, split on commas, blanks dropped.
    pub fn cc_addresses(&self) -> impl Iterator<Item = &str> {
        self.cc
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_both_templates() {
        let email = OutgoingEmail::render(
            Recipient::new("Ana", "a@x.com"),
            "Hi {{name}}",
            "Your address is {{email}}",
            None,
        );
        assert_eq!(email.subject, "Hi Ana");
        assert_eq!(email.body, "Your address is a@x.com");
    }

    #[test]
    fn cc_list_is_split_and_trimmed() {
        let email = OutgoingEmail::render(
            Recipient::new("Ana", "a@x.com"),
            "s",
            "b",
            Some(" c@x.com, ,d@x.com "),
        );
        assert_eq!(email.cc_addresses().collect::<Vec<_>>(), ["c@x.com", "d@x.com"]);
    }
}
