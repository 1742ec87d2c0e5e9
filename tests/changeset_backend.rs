mod common;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use common::{changeset, tfvc_change, Stub};
use vcs_history_export::backend::{ChangesetBackend, ChangesetSearch, HistoryBackend};
use vcs_history_export::connection::{Connection, Credential};
use vcs_history_export::{BackendKind, ExportError};

fn stub_with_changesets() -> Stub {
    Stub {
        projects: vec!["Fabrikam".into()],
        changesets: vec![
            changeset(16, "Normal Paulk", "2024-03-24T20:21:02.727Z", "Fix the build"),
            changeset(15, "Chuck Reinhart", "2024-03-24T20:11:25Z", ""),
        ],
        changeset_changes: HashMap::from([(
            16,
            vec![
                tfvc_change("$/Fabrikam/src/App.cs", "edit"),
                tfvc_change("$/Fabrikam/src/Old.cs", "delete, source rename"),
            ],
        )]),
        ..Default::default()
    }
}

async fn backend(stub: &Arc<Stub>, project: &str) -> ChangesetBackend {
    let base = common::serve(stub.clone()).await;
    let connection = Connection::open(&base, Credential::Ambient { token: None }).unwrap();
    ChangesetBackend::new(connection, project, ChangesetSearch::default())
}

#[tokio::test]
async fn test_changesets_normalized_in_order() {
    let stub = Arc::new(stub_with_changesets());
    let backend = backend(&stub, "Fabrikam").await;
    assert_eq!(backend.kind(), BackendKind::ChangesetStyle);

    let commits = backend.commits().await.unwrap().collect().await.unwrap();
    assert_eq!(commits.len(), 2);

    assert_eq!(commits[0].committer, "Normal Paulk");
    assert_eq!(commits[0].comment, "Fix the build");
    assert_eq!(commits[0].changes.len(), 2);
    assert_eq!(commits[0].changes[1].kind.to_string(), "delete, source rename");
    assert!(!commits[0].changes[0].is_folder);

    assert_eq!(commits[1].committer, "Chuck Reinhart");
    assert!(commits[1].changes.is_empty());

    let paths: Vec<_> = stub
        .requests_to("/changes")
        .into_iter()
        .map(|r| r.path)
        .collect();
    assert_eq!(
        paths,
        ["/_apis/tfvc/changesets/16/changes", "/_apis/tfvc/changesets/15/changes"]
    );
}

#[tokio::test]
async fn test_top_clamped_before_sending() {
    let stub = Arc::new(stub_with_changesets());
    let mut backend = backend(&stub, "Fabrikam").await;

    let cases = [
        (Some(300), "100"),
        (Some(0), "100"),
        (None, "100"),
        (Some(42), "42"),
    ];
    for (requested, sent) in cases {
        backend.set_top(requested);
        backend.commits().await.unwrap();
        let calls = stub.requests_to("/_apis/tfvc/changesets");
        assert_eq!(calls.last().unwrap().query["$top"], sent, "{:?}", requested);
    }
}

#[tokio::test]
async fn test_query_scoped_to_project_and_dates() {
    let stub = Arc::new(stub_with_changesets());
    let backend = backend(&stub, "Fabrikam").await;
    let search = ChangesetSearch::from_dates(
        NaiveDate::from_ymd_opt(2024, 3, 1),
        NaiveDate::from_ymd_opt(2024, 3, 31),
    );

    backend.commits_for("Fabrikam", &search, 10).await.unwrap();

    let query = &stub.requests_to("/_apis/tfvc/changesets")[0].query;
    assert_eq!(query["searchCriteria.itemPath"], "$/Fabrikam");
    assert_eq!(query["searchCriteria.fromDate"], "2024-03-01");
    assert_eq!(query["searchCriteria.toDate"], "2024-03-31");
    assert_eq!(query["$top"], "10");
}

#[tokio::test]
async fn test_missing_project_is_not_found() {
    let stub = Arc::new(stub_with_changesets());
    let backend = backend(&stub, "Contoso").await;

    match backend.commits().await {
        Err(ExportError::ProjectNotFound { name, .. }) => assert_eq!(name, "Contoso"),
        other => panic!("unexpected: {:?}", other.map(|s| s.remaining())),
    }
    assert!(stub.requests_to("/_apis/tfvc/changesets").is_empty());
}

#[tokio::test]
async fn test_project_name_must_match_exactly() {
    let stub = Arc::new(stub_with_changesets());
    let backend = backend(&stub, "fabrikam").await;

    assert!(matches!(
        backend.commits().await,
        Err(ExportError::ProjectNotFound { .. })
    ));
}

#[tokio::test]
async fn test_ambient_session_without_token_sends_no_credentials() {
    let stub = Arc::new(stub_with_changesets());
    let backend = backend(&stub, "Fabrikam").await;
    backend.commits().await.unwrap();

    assert!(stub.recorded().iter().all(|r| r.authorization.is_none()));
}
