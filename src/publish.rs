//! Publisher — renders an application entry as an actionable notification.
//!
//! The transport behind [`Notifier`] is fire-and-forget relative to poll
//! progress: the cursor advances whether or not delivery succeeds, so a
//! lost notification is logged but never republished.

use async_trait::async_trait;

use crate::action::{ActionTag, DecisionKind};
use crate::error::TransportError;
use crate::parser::ApplicationEntry;

/// A rendered, transport-agnostic notification with its two reviewer
/// actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    /// (label, value) pairs; empty answers already filtered out.
    pub fields: Vec<(String, String)>,
    /// Action tag for the accept affordance.
    pub accept_tag: String,
    /// Action tag for the reject affordance.
    pub reject_tag: String,
}

/// Render an entry for the row at `row` (absolute, 1-based) in the source
/// at `source_index`.
pub fn render(entry: &ApplicationEntry, source_index: usize, row: u32) -> Notification {
    let mut fields: Vec<(String, String)> = entry
        .questions
        .iter()
        .filter(|(_, answer)| !answer.is_empty())
        .cloned()
        .collect();

    if let Some(handle) = entry.applicant_handle.as_deref()
        && !handle.is_empty()
    {
        fields.push(("Discord Username".to_string(), handle.to_string()));
    }

    Notification {
        title: format!("📝 New {} Application", entry.type_label),
        fields,
        accept_tag: ActionTag::new(DecisionKind::Accept, source_index, row).encode(),
        reject_tag: ActionTag::new(DecisionKind::Reject, source_index, row).encode(),
    }
}

/// Outbound notification channel. The Discord implementation sends a staff
/// mention first, then the notification itself.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, notification: &Notification) -> Result<(), TransportError>;
}
