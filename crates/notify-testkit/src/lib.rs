//! Shared test fixtures and builders reused across the workspace's
//! integration tests: a `ChannelAdapter` double (`StubAdapter`), an
//! `OutboxQueue` double (`RecordingQueue`), and a playbook-tree builder
//! (`PlaybookFixture`) that writes a fully wired playbook + mapping +
//! ruleset + stub workbook to a temp directory.
//!
//! `InMemoryAuditRepository` itself lives in `notify-audit` — every crate
//! that needs an audit double already depends on that crate directly, so it
//! isn't re-exported here.

mod playbook_fixture;
mod recording_queue;
mod stub_adapter;

pub use playbook_fixture::{assert_exists, email_templates_dir, PlaybookFixture};
pub use recording_queue::RecordingQueue;
pub use stub_adapter::StubAdapter;
