//! Warning banner decisions.

use crate::store::EntitlementRecord;

/// Decides whether the host should show a failure banner, and its text.
#[derive(Debug, Clone)]
pub struct Notifier {
    display_name: String,
}

impl Notifier {
    /// Notifier for a product shown as `display_name`.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
        }
    }

    /// Whether the record warrants a warning.
    ///
    /// Only usage that is domain-restricted is nagged about. When the
    /// failure would only block updates, or the terms are unknown, the user
    /// finds out from the update screen instead.
    pub fn should_warn(record: &EntitlementRecord) -> bool {
        if record.verified {
            return false;
        }
        match &record.licensed_item_meta {
            Some(meta) if meta.restricts_usage() => !record.error_message.is_empty(),
            _ => false,
        }
    }

    /// `<display name>: <error message>`
    pub fn render_message(&self, record: &EntitlementRecord) -> String {
        format!("{}: {}", self.display_name, record.error_message)
    }

    /// Banner text when a warning is due.
    pub fn banner(&self, record: &EntitlementRecord) -> Option<String> {
        Self::should_warn(record).then(|| self.render_message(record))
    }
}
