//! In-process stand-in for the version-control REST API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

pub const COLLECTION: &str = "/tfs/DefaultCollection";

#[derive(Default)]
pub struct Stub {
    /// Git repositories as `(id, name)`.
    pub repositories: Vec<(String, String)>,
    /// Commit refs per repository id.
    pub commits: HashMap<String, Vec<Value>>,
    /// Change lists per commit sha.
    pub git_changes: HashMap<String, Vec<Value>>,
    /// Team project names.
    pub projects: Vec<String>,
    pub changesets: Vec<Value>,
    /// Change lists per changeset id.
    pub changeset_changes: HashMap<i64, Vec<Value>>,
    /// Every request seen: path, query string pairs, Authorization header.
    pub requests: Mutex<Vec<Recorded>>,
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
}

impl Stub {
    fn record(&self, path: String, query: HashMap<String, String>, headers: &HeaderMap) {
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(Recorded {
            path,
            query,
            authorization,
        });
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose path ends with `suffix`.
    pub fn requests_to(&self, suffix: &str) -> Vec<Recorded> {
        self.recorded()
            .into_iter()
            .filter(|r| r.path.ends_with(suffix))
            .collect()
    }
}

pub fn git_commit(sha: &str, committer: &str, date: &str, comment: &str) -> Value {
    json!({
        "commitId": sha,
        "author": { "name": committer, "email": "dev@example.com", "date": date },
        "committer": { "name": committer, "email": "dev@example.com", "date": date },
        "comment": comment,
    })
}

pub fn git_change(path: &str, change_type: &str) -> Value {
    json!({
        "item": { "objectId": "0000", "gitObjectType": "blob", "path": path },
        "changeType": change_type,
    })
}

pub fn changeset(id: i64, author: &str, date: &str, comment: &str) -> Value {
    json!({
        "changesetId": id,
        "author": { "displayName": author, "uniqueName": "CORP\\dev" },
        "createdDate": date,
        "comment": comment,
    })
}

pub fn tfvc_change(path: &str, change_type: &str) -> Value {
    json!({
        "item": { "version": 1, "path": path },
        "changeType": change_type,
    })
}

type Shared = State<Arc<Stub>>;
type Params = Query<HashMap<String, String>>;

async fn repositories(State(stub): Shared, Query(q): Params, headers: HeaderMap) -> Json<Value> {
    stub.record("/_apis/git/repositories".into(), q, &headers);
    let value: Vec<Value> = stub
        .repositories
        .iter()
        .map(|(id, name)| json!({ "id": id, "name": name }))
        .collect();
    Json(json!({ "count": value.len(), "value": value }))
}

async fn commits(
    State(stub): Shared,
    Path(id): Path<String>,
    Query(q): Params,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    stub.record(format!("/_apis/git/repositories/{}/commits", id), q, &headers);
    let value = stub.commits.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({ "count": value.len(), "value": value })))
}

async fn git_changes(
    State(stub): Shared,
    Path((id, sha)): Path<(String, String)>,
    Query(q): Params,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    stub.record(
        format!("/_apis/git/repositories/{}/commits/{}/changes", id, sha),
        q,
        &headers,
    );
    let changes = stub.git_changes.get(&sha).cloned().unwrap_or_default();
    Ok(Json(json!({ "changeCounts": {}, "changes": changes })))
}

async fn project(
    State(stub): Shared,
    Path(name): Path<String>,
    Query(q): Params,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    stub.record(format!("/_apis/projects/{}", name), q, &headers);
    // Project lookup on the real server ignores case.
    let found = stub
        .projects
        .iter()
        .find(|p| p.eq_ignore_ascii_case(&name))
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({ "id": "p-1", "name": found, "state": "wellFormed" })))
}

async fn changesets(State(stub): Shared, Query(q): Params, headers: HeaderMap) -> Json<Value> {
    stub.record("/_apis/tfvc/changesets".into(), q, &headers);
    Json(json!({ "count": stub.changesets.len(), "value": stub.changesets }))
}

async fn changeset_changes(
    State(stub): Shared,
    Path(id): Path<i64>,
    Query(q): Params,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    stub.record(format!("/_apis/tfvc/changesets/{}/changes", id), q, &headers);
    let value = stub.changeset_changes.get(&id).cloned().unwrap_or_default();
    Ok(Json(json!({ "count": value.len(), "value": value })))
}

/// Serve the stub on an ephemeral port; returns the collection URL.
pub async fn serve(stub: Arc<Stub>) -> String {
    let api = Router::new()
        .route("/_apis/projects/:name", get(project))
        .route("/_apis/git/repositories", get(repositories))
        .route("/_apis/git/repositories/:id/commits", get(commits))
        .route(
            "/_apis/git/repositories/:id/commits/:sha/changes",
            get(git_changes),
        )
        .route("/_apis/tfvc/changesets", get(changesets))
        .route("/_apis/tfvc/changesets/:id/changes", get(changeset_changes))
        .with_state(stub);

    let app = Router::new().nest(COLLECTION, api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}{}", addr, COLLECTION)
}
