mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use common::TestApp;
use traceability_api::graph::GraphStore;
use traceability_api::store::{Collection, DocumentStore, StoreOp};

async fn project_with_view(app: &TestApp) -> Result<(String, String, String)> {
    let project = app.project("alice", "proj1").await?;
    let token = app.token("alice");
    let res = app
        .post(
            &format!("/projects/{}/views", project),
            Some(&token),
            json!({"name": "v1", "kind": "functional"}),
        )
        .await?;
    let view = res.data()["id"].as_str().context("view id")?.to_string();
    Ok((project, view, token))
}

#[tokio::test]
async fn failed_append_surfaces_and_leaves_no_orphan() -> Result<()> {
    let app = TestApp::new();
    let (project, view, token) = project_with_view(&app).await?;

    app.store.fail_next(StoreOp::Replace, Collection::Views);
    let res = app
        .post(
            &format!("/projects/{}/views/{}/components", project, view),
            Some(&token),
            json!({"kind": "functional", "description": "c1"}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.kind(), Some("Internal"));
    assert!(res.body.get("data").is_none());

    assert_eq!(app.store.count(Collection::Components).await, 0);
    let res = app.get(&format!("/projects/{}/views/{}", project, view), Some(&token)).await?;
    assert_eq!(res.data()["components"], json!([]));
    Ok(())
}

#[tokio::test]
async fn sweep_clears_what_compensation_could_not() -> Result<()> {
    let app = TestApp::new();
    let (project, view, token) = project_with_view(&app).await?;

    // Append fails and so does the rollback delete
    app.store.fail_next(StoreOp::Replace, Collection::Views);
    app.store.fail_next(StoreOp::Delete, Collection::Components);
    let res = app
        .post(
            &format!("/projects/{}/views/{}/components", project, view),
            Some(&token),
            json!({"kind": "functional", "description": "orphan"}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.store.count(Collection::Components).await, 1);

    let orphan = app
        .store
        .find_eq(Collection::Components, "state", &json!("pending"))
        .await?
        .pop()
        .context("pending component")?;
    let res = app
        .get(
            &format!("/projects/{}/views/{}/components/{}", project, view, orphan.id),
            Some(&token),
        )
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let graph = GraphStore::new(app.store.clone(), 3);
    let report = graph.sweep_pending(Duration::zero(), Utc::now()).await?;
    assert_eq!(report.rolled_back, 1);
    assert_eq!(app.store.count(Collection::Components).await, 0);
    Ok(())
}

#[tokio::test]
async fn listed_component_survives_a_failed_commit() -> Result<()> {
    let app = TestApp::new();
    let (project, view, token) = project_with_view(&app).await?;

    app.store.fail_next(StoreOp::Replace, Collection::Components);
    let res = app
        .post(
            &format!("/projects/{}/views/{}/components", project, view),
            Some(&token),
            json!({"kind": "functional", "description": "c1"}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    let id = res.data()["id"].as_str().context("component id")?.to_string();

    let graph = GraphStore::new(app.store.clone(), 3);
    let report = graph.sweep_pending(Duration::zero(), Utc::now()).await?;
    assert_eq!(report.committed, 1);

    let res = app
        .get(&format!("/projects/{}/views/{}/components/{}", project, view, id), Some(&token))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn membership_store_outage_is_not_a_denial() -> Result<()> {
    let app = TestApp::new();
    let (project, view, token) = project_with_view(&app).await?;

    app.store.fail_next(StoreOp::Get, Collection::Projects);
    let res = app.get(&format!("/projects/{}/views/{}", project, view), Some(&token)).await?;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}
