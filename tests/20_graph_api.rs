mod common;

use anyhow::{Context, Result};
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::TestApp;
use traceability_api::store::{Collection, DocumentStore};

struct Fixture {
    app: TestApp,
    project: String,
    view: String,
    token: String,
}

impl Fixture {
    async fn new() -> Result<Self> {
        let app = TestApp::new();
        let project = app.project("alice", "proj1").await?;
        app.add_member(&project, "alice", "bob", "editor").await?;
        let token = app.token("bob");

        let res = app
            .post(
                &format!("/projects/{}/views", project),
                Some(&token),
                json!({"name": "Functional", "kind": "functional", "description": "top level"}),
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "view create failed: {}", res.body);
        let view = res.data()["id"].as_str().context("view id")?.to_string();

        Ok(Self {
            app,
            project,
            view,
            token,
        })
    }

    fn view_uri(&self) -> String {
        format!("/projects/{}/views/{}", self.project, self.view)
    }

    fn components_uri(&self) -> String {
        format!("{}/components", self.view_uri())
    }

    async fn add_component(&self, body: Value) -> Result<String> {
        let res = self.app.post(&self.components_uri(), Some(&self.token), body).await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "component create failed: {}", res.body);
        Ok(res.data()["id"].as_str().context("component id")?.to_string())
    }
}

#[tokio::test]
async fn views_are_created_listed_and_fetched() -> Result<()> {
    let f = Fixture::new().await?;

    let res = f.app.get(&f.view_uri(), Some(&f.token)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.etag(), Some("\"1\""));
    assert_eq!(res.data()["projectID"], f.project.as_str());

    let res = f
        .app
        .get(&format!("/projects/{}/views", f.project), Some(&f.token))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data().as_array().map(Vec::len), Some(1));

    let res = f
        .app
        .get(&format!("/projects/{}/views/missing", f.project), Some(&f.token))
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.kind(), Some("NotFound"));
    Ok(())
}

#[tokio::test]
async fn view_create_rejects_bad_bodies() -> Result<()> {
    let f = Fixture::new().await?;
    let uri = format!("/projects/{}/views", f.project);

    for body in [
        json!({"name": "v", "kind": "architecture"}),
        json!({"kind": "functional"}),
        json!({"name": "x".repeat(31), "kind": "functional"}),
        json!({"name": "v", "kind": "functional", "components": ["c1"]}),
        json!({"name": "v", "kind": "functional", "projectID": "elsewhere"}),
    ] {
        let res = f.app.post(&uri, Some(&f.token), body.clone()).await?;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY, "body {} -> {}", body, res.body);
        assert_eq!(res.kind(), Some("ValidationFailed"));
        assert!(res.body.get("data").is_none());
    }
    Ok(())
}

#[tokio::test]
async fn view_patch_merges_and_bumps_version() -> Result<()> {
    let f = Fixture::new().await?;

    let res = f
        .app
        .patch(&f.view_uri(), Some(&f.token), json!({"name": "Renamed", "description": null}))
        .await?;
    assert_eq!(res.status, StatusCode::OK, "body: {}", res.body);
    assert_eq!(res.data()["name"], "Renamed");
    assert_eq!(res.data()["description"], "");
    assert_eq!(res.data()["kind"], "functional");
    assert_eq!(res.etag(), Some("\"2\""));

    // Same patch again writes nothing
    let res = f
        .app
        .patch(&f.view_uri(), Some(&f.token), json!({"name": "Renamed", "description": null}))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.etag(), Some("\"2\""));
    Ok(())
}

#[tokio::test]
async fn invalid_kind_patch_leaves_view_untouched() -> Result<()> {
    let f = Fixture::new().await?;
    let before = f.app.store.get(Collection::Views, &f.view).await?.context("view")?;

    let res = f
        .app
        .patch(&f.view_uri(), Some(&f.token), json!({"kind": "architecture"}))
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body.get("data").is_none());

    let after = f.app.store.get(Collection::Views, &f.view).await?.context("view")?;
    assert_eq!(serde_json::to_vec(&before.body)?, serde_json::to_vec(&after.body)?);
    assert_eq!(before.version, after.version);
    Ok(())
}

#[tokio::test]
async fn read_only_and_unknown_fields_are_rejected() -> Result<()> {
    let f = Fixture::new().await?;
    for patch in [
        json!({"components": ["ghost"]}),
        json!({"projectID": "other"}),
        json!({"id": "new-id"}),
        json!({"colour": "blue"}),
    ] {
        let res = f.app.patch(&f.view_uri(), Some(&f.token), patch.clone()).await?;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY, "patch {}", patch);
    }
    Ok(())
}

#[tokio::test]
async fn stale_if_match_is_a_conflict() -> Result<()> {
    let f = Fixture::new().await?;

    let first = f
        .app
        .request(Method::PATCH, &f.view_uri(), Some(&f.token), Some(json!({"name": "A"})), Some("\"1\""))
        .await?;
    let second = f
        .app
        .request(Method::PATCH, &f.view_uri(), Some(&f.token), Some(json!({"name": "B"})), Some("\"1\""))
        .await?;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.kind(), Some("PatchConflict"));

    let res = f.app.get(&f.view_uri(), Some(&f.token)).await?;
    assert_eq!(res.data()["name"], "A");
    Ok(())
}

#[tokio::test]
async fn views_of_other_projects_are_not_found() -> Result<()> {
    let f = Fixture::new().await?;
    let other = f.app.project("bob", "other").await?;

    let res = f
        .app
        .get(&format!("/projects/{}/views/{}", other, f.view), Some(&f.token))
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = f
        .app
        .patch(
            &format!("/projects/{}/views/{}", other, f.view),
            Some(&f.token),
            json!({"name": "hijack"}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn components_are_added_fetched_and_patched() -> Result<()> {
    let f = Fixture::new().await?;
    let id = f
        .add_component(json!({
            "kind": "userStory",
            "userKind": "actor",
            "description": "login",
            "functions": ["authenticate"]
        }))
        .await?;

    let uri = format!("{}/{}", f.components_uri(), id);
    let res = f.app.get(&uri, Some(&f.token)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["viewID"], f.view.as_str());
    assert_eq!(res.data()["userKind"], "actor");
    assert!(res.data().get("state").is_none());

    let res = f
        .app
        .patch(&uri, Some(&f.token), json!({"functions": ["authenticate", "logout"], "userKind": null}))
        .await?;
    assert_eq!(res.status, StatusCode::OK, "body: {}", res.body);
    assert_eq!(res.data()["functions"], json!(["authenticate", "logout"]));
    assert!(res.data().get("userKind").is_none());

    let res = f.app.patch(&uri, Some(&f.token), json!({"description": null})).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    let res = f.app.patch(&uri, Some(&f.token), json!({"kind": "bogus"})).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn component_under_wrong_view_is_not_found() -> Result<()> {
    let f = Fixture::new().await?;
    let id = f.add_component(json!({"kind": "functional", "description": "x"})).await?;

    let res = f
        .app
        .post(
            &format!("/projects/{}/views", f.project),
            Some(&f.token),
            json!({"name": "second", "kind": "development"}),
        )
        .await?;
    let second = res.data()["id"].as_str().context("view id")?.to_string();

    let res = f
        .app
        .get(&format!("/projects/{}/views/{}/components/{}", f.project, second, id), Some(&f.token))
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = f
        .app
        .post(
            &format!("/projects/{}/views/missing/components", f.project),
            Some(&f.token),
            json!({"kind": "functional", "description": "x"}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn component_create_rejects_bad_bodies() -> Result<()> {
    let f = Fixture::new().await?;
    for body in [
        json!({"kind": "functional"}),
        json!({"kind": "unknown", "description": "x"}),
        json!({"kind": "functional", "description": "x", "viewID": "other"}),
    ] {
        let res = f.app.post(&f.components_uri(), Some(&f.token), body.clone()).await?;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY, "body {}", body);
    }
    assert_eq!(f.app.store.count(Collection::Components).await, 0);
    Ok(())
}

#[tokio::test]
async fn links_join_components_of_the_project() -> Result<()> {
    let f = Fixture::new().await?;
    let a = f.add_component(json!({"kind": "functional", "description": "a"})).await?;
    let b = f.add_component(json!({"kind": "functional", "description": "b"})).await?;
    let links_uri = format!("/projects/{}/links", f.project);

    let res = f
        .app
        .post(&links_uri, Some(&f.token), json!({"source": a, "target": b, "description": "calls"}))
        .await?;
    assert_eq!(res.status, StatusCode::CREATED, "body: {}", res.body);
    let link = res.data()["id"].as_str().context("link id")?.to_string();

    let res = f.app.get(&format!("{}/{}", links_uri, link), Some(&f.token)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["source"], a.as_str());

    let res = f.app.get(&links_uri, Some(&f.token)).await?;
    assert_eq!(res.data().as_array().map(Vec::len), Some(1));

    let res = f
        .app
        .post(&links_uri, Some(&f.token), json!({"source": a, "target": "ghost"}))
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["field_errors"]["target"].is_string());
    Ok(())
}
