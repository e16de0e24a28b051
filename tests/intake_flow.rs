//! End-to-end intake flow: poll → publish → reviewer decision → terminal
//! stamp, against in-memory collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use app_intake::action::ActionTag;
use app_intake::decision::{
    DecisionEngine, DecisionPolicy, DirectMessage, Directory, Member,
};
use app_intake::error::{SheetError, TransportError};
use app_intake::poller::{HeaderCache, Poller};
use app_intake::publish::{Notification, Notifier};
use app_intake::registry::{SourceDescriptor, SourceRegistry};
use app_intake::sheets::SheetsApi;
use app_intake::state::StateStore;

/// Whole-sheet fake: understands the full range (`A1:ZZ`), single-row
/// fetches (`A5:ZZ5`), and single-cell updates (`A5`).
#[derive(Default)]
struct FakeSheets {
    sheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
    updates: Mutex<Vec<(String, String, String)>>,
}

impl FakeSheets {
    fn seed(&self, spreadsheet_id: &str, rows: Vec<Vec<&str>>) {
        self.sheets.lock().unwrap().insert(
            spreadsheet_id.to_string(),
            rows.into_iter()
                .map(|r| r.into_iter().map(String::from).collect())
                .collect(),
        );
    }

    fn append_row(&self, spreadsheet_id: &str, row: Vec<&str>) {
        self.sheets
            .lock()
            .unwrap()
            .get_mut(spreadsheet_id)
            .unwrap()
            .push(row.into_iter().map(String::from).collect());
    }

    fn updates(&self) -> Vec<(String, String, String)> {
        self.updates.lock().unwrap().clone()
    }
}

/// (start row, single-row?) from a range like `Sheet!A1:ZZ` / `Sheet!A5:ZZ5`.
fn parse_range(range: &str) -> (usize, bool) {
    let after = range.split("!A").nth(1).unwrap();
    let start: usize = after
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap();
    let single = match after.split(":ZZ").nth(1) {
        Some(end) => end.parse::<usize>().map(|e| e == start).unwrap_or(false),
        None => true,
    };
    (start, single)
}

#[async_trait]
impl SheetsApi for FakeSheets {
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetError> {
        let sheets = self.sheets.lock().unwrap();
        let Some(rows) = sheets.get(spreadsheet_id) else {
            return Ok(Vec::new());
        };
        let (start, single) = parse_range(range);
        if single {
            return Ok(rows
                .get(start - 1)
                .filter(|r| !r.is_empty())
                .cloned()
                .into_iter()
                .collect());
        }
        Ok(rows[(start - 1).min(rows.len())..].to_vec())
    }

    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetError> {
        self.updates.lock().unwrap().push((
            spreadsheet_id.to_string(),
            range.to_string(),
            rows[0][0].clone(),
        ));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    published: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, notification: &Notification) -> Result<(), TransportError> {
        self.published.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
struct FakeDirectory {
    members: Mutex<HashMap<String, Member>>,
    dms: Mutex<Vec<(String, DirectMessage)>>,
    grants: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn find_member_by_handle(&self, handle: &str) -> Result<Option<Member>, TransportError> {
        Ok(self.members.lock().unwrap().get(handle).cloned())
    }

    async fn send_direct(
        &self,
        member: &Member,
        message: &DirectMessage,
    ) -> Result<(), TransportError> {
        self.dms
            .lock()
            .unwrap()
            .push((member.id.clone(), message.clone()));
        Ok(())
    }

    async fn grant_role(&self, member: &Member, role_id: &str) -> Result<(), TransportError> {
        self.grants
            .lock()
            .unwrap()
            .push((member.id.clone(), role_id.to_string()));
        Ok(())
    }
}

fn registry() -> Arc<SourceRegistry> {
    Arc::new(SourceRegistry::new(vec![
        SourceDescriptor::new("mods", "Form Responses 1", "Moderator"),
        SourceDescriptor::new("beta", "Form Responses 1", "Beta"),
    ]))
}

#[tokio::test]
async fn poll_publish_decide_stamp() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    let sheets = Arc::new(FakeSheets::default());
    sheets.seed(
        "mods",
        vec![
            vec!["Discord Username", "Why moderate?"],
            vec!["mallory#0003", "order"],
        ],
    );
    sheets.seed(
        "beta",
        vec![
            vec!["Discord Username", "Why do you want to join?"],
            vec!["alice#0001", "because"],
            vec!["bob#0002", "curiosity"],
        ],
    );

    let notifier = Arc::new(RecordingNotifier::default());
    let directory = Arc::new(FakeDirectory::default());
    directory.members.lock().unwrap().insert(
        "alice#0001".to_string(),
        Member {
            id: "111".to_string(),
            display_name: "Alice".to_string(),
        },
    );

    let state = Arc::new(StateStore::load(&state_path));
    let headers = Arc::new(HeaderCache::new());

    let poller = Poller::new(
        registry(),
        Arc::clone(&sheets) as Arc<dyn SheetsApi>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::clone(&state),
        Arc::clone(&headers),
    );

    // ── Backlog poll publishes every pending row once ──────────────────
    poller.poll_all().await;
    assert_eq!(notifier.count(), 3);
    {
        let published = notifier.published.lock().unwrap();
        assert_eq!(published[0].title, "📝 New Moderator Application");
        assert_eq!(published[1].title, "📝 New Beta Application");
        // Beta is registry index 1; its first data row is sheet row 2.
        assert_eq!(published[1].accept_tag, "accept_1_2");
    }

    // ── Reviewer accepts Alice's beta application ──────────────────────
    let engine = DecisionEngine::new(
        registry(),
        Arc::clone(&sheets) as Arc<dyn SheetsApi>,
        Arc::clone(&directory) as Arc<dyn Directory>,
        Arc::clone(&state),
        Arc::clone(&headers),
        DecisionPolicy {
            accepted_role_id: Some("role-7".to_string()),
            ..DecisionPolicy::default()
        },
    );

    let report = engine.decide(ActionTag::decode("accept_1_2").unwrap()).await;
    assert_eq!(report, "✅ Accepted row 2. Applicant DMed. Role assigned.");

    let updates = sheets.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, "beta");
    assert_eq!(updates[0].1, "Form Responses 1!A2");
    assert!(updates[0].2.starts_with("✅ Accepted on "));

    assert_eq!(directory.dms.lock().unwrap().len(), 1);
    assert_eq!(
        directory.grants.lock().unwrap().clone(),
        vec![("111".to_string(), "role-7".to_string())]
    );

    // ── A second action on the same notification is inert ──────────────
    let again = engine.decide(ActionTag::decode("reject_1_2").unwrap()).await;
    assert_eq!(again, "Row 2 was already accepted.");
    assert_eq!(sheets.updates().len(), 1);
    assert_eq!(directory.dms.lock().unwrap().len(), 1);

    // ── A newly appended row is the only thing the next poll publishes ─
    sheets.append_row("beta", vec!["carol#0004", "testing"]);
    poller.poll_all().await;
    assert_eq!(notifier.count(), 4);
    assert_eq!(
        notifier.published.lock().unwrap()[3].accept_tag,
        "accept_1_4"
    );

    // ── Restart: cursors survive, nothing is republished ───────────────
    drop(poller);
    let restarted_state = Arc::new(StateStore::load(&state_path));
    let poller = Poller::new(
        registry(),
        Arc::clone(&sheets) as Arc<dyn SheetsApi>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::clone(&restarted_state),
        Arc::new(HeaderCache::new()),
    );
    poller.poll_all().await;
    assert_eq!(notifier.count(), 4);
}
