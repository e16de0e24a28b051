//! Decision engine — reconciles a reviewer's accept/reject against the
//! authoritative sheet row.
//!
//! The engine never trusts the entry captured at notification time: it
//! re-fetches the row, re-parses it with the source's current header, and
//! only then executes side effects. The decision ledger is checked-and-set
//! before any side effect runs, so a notification is actionable exactly
//! once per deployment. Every collaborator call is wrapped in a deadline;
//! expiry is treated as that step's failure and the engine continues
//! best-effort. The column-A stamp is written unconditionally, whatever
//! the side effects did.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::action::{ActionTag, DecisionKind};
use crate::error::TransportError;
use crate::parser::{ApplicationEntry, parse_row};
use crate::poller::HeaderCache;
use crate::registry::{SourceDescriptor, SourceRegistry};
use crate::sheets::SheetsApi;
use crate::state::{DecisionStatus, StateStore};

/// A resolved community member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: String,
    pub display_name: String,
}

/// Rendered direct-message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMessage {
    pub title: String,
    pub body: String,
}

/// Community directory collaborator: member lookup, DMs, role grants.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_member_by_handle(&self, handle: &str)
    -> Result<Option<Member>, TransportError>;

    async fn send_direct(
        &self,
        member: &Member,
        message: &DirectMessage,
    ) -> Result<(), TransportError>;

    async fn grant_role(&self, member: &Member, role_id: &str) -> Result<(), TransportError>;
}

/// Tunables for the decision path.
#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    /// Whether rejected applicants get a DM. Default: off.
    pub dm_on_reject: bool,
    /// Role granted after a successful acceptance DM, if configured.
    pub accepted_role_id: Option<String>,
    /// Deadline applied to every collaborator call.
    pub call_deadline: Duration,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            dm_on_reject: false,
            accepted_role_id: None,
            call_deadline: Duration::from_secs(30),
        }
    }
}

pub struct DecisionEngine {
    registry: Arc<SourceRegistry>,
    sheets: Arc<dyn SheetsApi>,
    directory: Arc<dyn Directory>,
    state: Arc<StateStore>,
    headers: Arc<HeaderCache>,
    policy: DecisionPolicy,
}

impl DecisionEngine {
    pub fn new(
        registry: Arc<SourceRegistry>,
        sheets: Arc<dyn SheetsApi>,
        directory: Arc<dyn Directory>,
        state: Arc<StateStore>,
        headers: Arc<HeaderCache>,
        policy: DecisionPolicy,
    ) -> Self {
        Self {
            registry,
            sheets,
            directory,
            state,
            headers,
            policy,
        }
    }

    /// Execute a reviewer decision. The returned string is the only
    /// observable outcome — a human-readable summary of which side effects
    /// succeeded.
    pub async fn decide(&self, tag: ActionTag) -> String {
        let row = tag.row_ref.row;

        let Some((source, row_cells)) = self.resolve_row(&tag).await else {
            return match tag.kind {
                DecisionKind::Accept => "❌ Failed to accept.".to_string(),
                DecisionKind::Reject => "❌ Failed to reject.".to_string(),
            };
        };

        let key = source.key();
        let status = match tag.kind {
            DecisionKind::Accept => DecisionStatus::Accepted,
            DecisionKind::Reject => DecisionStatus::Rejected,
        };
        match self.state.claim_decision(&key, row, status) {
            Ok(Ok(())) => {}
            Ok(Err(prior)) => {
                info!(source = %key, row, %prior, "Row already decided, ignoring");
                return format!("Row {row} was already {prior}.");
            }
            Err(e) => {
                // Without a durable claim the exactly-once guarantee is
                // gone; stop before any side effect.
                warn!(source = %key, row, "Failed to persist decision claim: {e}");
                return format!("❌ Could not record the decision for row {row}.");
            }
        }

        let entry = self.reparse(&source, row, &row_cells).await;
        let member = self.resolve_member(&entry).await;

        let mut report = match tag.kind {
            DecisionKind::Accept => self.apply_accept(&entry, member.as_ref(), row).await,
            DecisionKind::Reject => self.apply_reject(&entry, member.as_ref(), row).await,
        };

        // Terminal stamp, written whatever the side effects did.
        let stamp = format!("{} on {}", tag.kind, chrono::Local::now().format("%Y-%m-%d"));
        let stamp = match tag.kind {
            DecisionKind::Accept => format!("✅ {stamp}"),
            DecisionKind::Reject => format!("❌ {stamp}"),
        };
        let stamp_range = format!("{}!A{}", source.sheet_name, row);
        let write = self.deadline(self.sheets.update_range(
            &source.spreadsheet_id,
            &stamp_range,
            vec![vec![stamp]],
        ))
        .await;
        match write {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                warn!(source = %key, row, "Terminal stamp failed: {e}");
                report.push_str(" Sheet update failed.");
            }
            None => {
                warn!(source = %key, row, "Terminal stamp timed out");
                report.push_str(" Sheet update failed.");
            }
        }

        info!(source = %key, row, kind = %tag.kind, "Decision recorded");
        report
    }

    /// Locate the authoritative row for a tag.
    ///
    /// Tags that carry a registry index go straight to that source. Legacy
    /// tags (and stale indexes) fall back to trying every watched source in
    /// registry order; the first non-empty row wins.
    async fn resolve_row(&self, tag: &ActionTag) -> Option<(SourceDescriptor, Vec<String>)> {
        let row = tag.row_ref.row;

        if let Some(index) = tag.row_ref.source_index
            && let Some(source) = self.registry.get(index)
        {
            return self
                .fetch_row(source, row)
                .await
                .map(|cells| (source.clone(), cells));
        }

        for source in self.registry.iter() {
            if let Some(cells) = self.fetch_row(source, row).await {
                return Some((source.clone(), cells));
            }
        }
        None
    }

    /// Fetch a single row; empty, erroring, or timed-out fetches all read
    /// as "this source has nothing there".
    async fn fetch_row(&self, source: &SourceDescriptor, row: u32) -> Option<Vec<String>> {
        let range = format!("{}!A{row}:ZZ{row}", source.sheet_name);
        match self
            .deadline(self.sheets.get_range(&source.spreadsheet_id, &range))
            .await
        {
            Some(Ok(values)) => values.into_iter().next().filter(|r| !r.is_empty()),
            Some(Err(e)) => {
                warn!(source = %source.key(), row, "Row fetch failed: {e}");
                None
            }
            None => {
                warn!(source = %source.key(), row, "Row fetch timed out");
                None
            }
        }
    }

    /// Re-derive the entry from the fresh row, using the source's cached
    /// header (fetched on demand if no poll has run yet). The type label is
    /// forced to the descriptor's.
    async fn reparse(
        &self,
        source: &SourceDescriptor,
        row: u32,
        cells: &[String],
    ) -> ApplicationEntry {
        let key = source.key();
        let header = match self.headers.get(&key) {
            Some(header) => header,
            None => {
                let range = format!("{}!A1:ZZ1", source.sheet_name);
                match self
                    .deadline(self.sheets.get_range(&source.spreadsheet_id, &range))
                    .await
                {
                    Some(Ok(values)) => {
                        let header = values.into_iter().next().unwrap_or_default();
                        self.headers.put(&key, header.clone());
                        header
                    }
                    _ => {
                        warn!(source = %key, row, "No header available, parsing without one");
                        Vec::new()
                    }
                }
            }
        };

        let mut entry = parse_row(&header, cells, &source.type_label);
        entry.type_label = source.type_label.clone();
        entry
    }

    /// Resolve the applicant in the community directory. Every failure mode
    /// collapses to `None` and suppresses the dependent side effects.
    async fn resolve_member(&self, entry: &ApplicationEntry) -> Option<Member> {
        let handle = entry.applicant_handle.as_deref()?.trim();
        if handle.is_empty() {
            return None;
        }
        match self.deadline(self.directory.find_member_by_handle(handle)).await {
            Some(Ok(member)) => member,
            Some(Err(e)) => {
                warn!(handle, "Member lookup failed: {e}");
                None
            }
            None => {
                warn!(handle, "Member lookup timed out");
                None
            }
        }
    }

    async fn apply_accept(
        &self,
        entry: &ApplicationEntry,
        member: Option<&Member>,
        row: u32,
    ) -> String {
        let mut dm_sent = false;
        let mut role_granted = false;

        if let Some(member) = member {
            let dm = accept_message(entry, member);
            match self.deadline(self.directory.send_direct(member, &dm)).await {
                Some(Ok(())) => dm_sent = true,
                Some(Err(e)) => warn!(member = %member.display_name, "Acceptance DM failed: {e}"),
                None => warn!(member = %member.display_name, "Acceptance DM timed out"),
            }

            // Role grant only follows a successful DM, matching the
            // original flow.
            if dm_sent
                && let Some(role_id) = self.policy.accepted_role_id.as_deref()
            {
                match self.deadline(self.directory.grant_role(member, role_id)).await {
                    Some(Ok(())) => role_granted = true,
                    Some(Err(e)) => {
                        warn!(member = %member.display_name, "Role grant failed: {e}");
                    }
                    None => warn!(member = %member.display_name, "Role grant timed out"),
                }
            }
        }

        let mut report = format!("✅ Accepted row {row}.");
        if dm_sent {
            report.push_str(" Applicant DMed.");
        }
        if role_granted {
            report.push_str(" Role assigned.");
        }
        report
    }

    async fn apply_reject(
        &self,
        entry: &ApplicationEntry,
        member: Option<&Member>,
        row: u32,
    ) -> String {
        let mut dm_sent = false;

        if self.policy.dm_on_reject
            && let Some(member) = member
        {
            let dm = reject_message(entry, member);
            match self.deadline(self.directory.send_direct(member, &dm)).await {
                Some(Ok(())) => dm_sent = true,
                Some(Err(e)) => warn!(member = %member.display_name, "Rejection DM failed: {e}"),
                None => warn!(member = %member.display_name, "Rejection DM timed out"),
            }
        }

        let mut report = format!("❌ Rejected row {row}.");
        if self.policy.dm_on_reject {
            report.push_str(if dm_sent {
                " Applicant DMed."
            } else {
                " DM failed."
            });
        }
        report
    }

    /// Bound a collaborator call; `None` means the deadline expired.
    async fn deadline<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        timeout(self.policy.call_deadline, fut).await.ok()
    }
}

fn accept_message(entry: &ApplicationEntry, member: &Member) -> DirectMessage {
    let welcome = match entry.type_label.as_str() {
        "Team" => "Welcome to the **Team**! 💼",
        "Moderator" => "Welcome to the **Moderator Squad**! 🛡️",
        "Beta" => "Welcome to the **Beta Testing Crew**! 🧪",
        _ => "We're glad to have you on board!",
    };
    DirectMessage {
        title: "🎉 Application Accepted!".to_string(),
        body: format!(
            "Hey {}, your **{} application** has been accepted!\n\n\
             🕒 What's next? Your role will be assigned within a few hours. Sit tight!\n\
             🙏 {welcome}",
            member.display_name, entry.type_label
        ),
    }
}

fn reject_message(entry: &ApplicationEntry, member: &Member) -> DirectMessage {
    DirectMessage {
        title: "❌ Application Rejected".to_string(),
        body: format!(
            "Hey {}, unfortunately your **{} application** was not accepted.\n\n\
             💡 Want another chance? You're welcome to re-apply in the future!",
            member.display_name, entry.type_label
        ),
    }
}
