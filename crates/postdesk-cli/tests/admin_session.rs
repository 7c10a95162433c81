//! Integration tests for commands that need a signed-in admin.
//!
//! A provider session is seeded into `store.json` so no identity endpoint is
//! called; the site backend is a wiremock server.

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADMIN_EMAIL: &str = "admin@example.com";
const ID_TOKEN: &str = "id-token-1";

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Temp POSTDESK_HOME with a stored, non-expiring provider session.
fn signed_in_home() -> TempDir {
    let home = TempDir::new().expect("create temp postdesk home");
    let session = json!({
        "uid": "uid-1",
        "email": ADMIN_EMAIL,
        "id_token": ID_TOKEN,
        "refresh_token": "refresh-1",
        "expires_at": u64::MAX,
    });
    let store = json!({
        "items": { "firebaseSession": session.to_string() },
        "cookies": {},
    });
    fs::write(home.path().join("store.json"), store.to_string()).unwrap();
    home
}

fn stored_items(home: &Path) -> serde_json::Value {
    let raw = fs::read_to_string(home.join("store.json")).unwrap();
    serde_json::from_str::<serde_json::Value>(&raw).unwrap()["items"].clone()
}

fn postdesk(home: &TempDir, server: &MockServer) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("postdesk");
    cmd.env("POSTDESK_HOME", home.path())
        .env("POSTDESK_FIREBASE_API_KEY", "test-api-key")
        .env("POSTDESK_BASE_URL", server.uri())
        .env_remove("POSTDESK_LOG");
    cmd
}

async fn mount_verify(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/admin/verify"))
        .and(header("authorization", format!("Bearer {ID_TOKEN}").as_str()))
        .and(body_string_contains(ADMIN_EMAIL))
        .respond_with(ResponseTemplate::new(status).set_body_string("forbidden"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_whoami_prints_authorized_email() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = signed_in_home();
    let server = MockServer::start().await;
    mount_verify(&server, 200).await;

    postdesk(&home, &server)
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains(ADMIN_EMAIL));

    assert_eq!(stored_items(home.path())["adminToken"], ID_TOKEN);
}

#[tokio::test]
async fn test_unauthorized_account_is_signed_out() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = signed_in_home();
    let server = MockServer::start().await;
    mount_verify(&server, 403).await;

    postdesk(&home, &server)
        .args(["posts", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "You are not authorized to access the admin area.",
        ));

    let items = stored_items(home.path());
    assert!(items.get("firebaseSession").is_none());
    assert!(items.get("adminToken").is_none());
}

#[tokio::test]
async fn test_posts_list_prints_table() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = signed_in_home();
    let server = MockServer::start().await;
    mount_verify(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/admin/posts"))
        .and(header("authorization", format!("Bearer {ID_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "ID": 7,
                "Title": "Hello world",
                "Author": "Ada",
                "Created": "2024-05-01T10:00:00Z",
                "Edited": "2024-05-02T10:00:00Z"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    postdesk(&home, &server)
        .args(["posts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello world"))
        .stdout(predicate::str::contains("Ada"))
        .stdout(predicate::str::contains("2024-05-01"));
}

#[tokio::test]
async fn test_posts_list_surfaces_backend_error_body() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = signed_in_home();
    let server = MockServer::start().await;
    mount_verify(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/admin/posts"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    postdesk(&home, &server)
        .args(["posts", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("database unavailable"));
}

#[tokio::test]
async fn test_posts_create_requires_title() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = signed_in_home();
    let server = MockServer::start().await;
    mount_verify(&server, 200).await;
    let file = home.path().join("post.html");
    fs::write(&file, "<p>hi</p>").unwrap();

    postdesk(&home, &server)
        .args(["posts", "create", "--title", "  ", "--file"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please enter a title."));
}

#[tokio::test]
async fn test_posts_edit_keeps_unchanged_fields() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = signed_in_home();
    let server = MockServer::start().await;
    mount_verify(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/admin/posts/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Title": "Old title",
            "Description": "Old description"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/admin/posts/7"))
        .and(wiremock::matchers::body_json(json!({
            "title": "New title",
            "description": "Old description"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    postdesk(&home, &server)
        .args(["posts", "edit", "7", "--title", "New title"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Post 7 updated."));
}

#[tokio::test]
async fn test_posts_delete_declined_sends_nothing() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = signed_in_home();
    let server = MockServer::start().await;
    mount_verify(&server, 200).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    postdesk(&home, &server)
        .args(["posts", "delete", "7", "--title", "Hello"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled."))
        .stderr(predicate::str::contains(
            "Are you sure you want to delete \"Hello\"?",
        ));
}

#[tokio::test]
async fn test_posts_delete_with_yes_removes_post() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = signed_in_home();
    let server = MockServer::start().await;
    mount_verify(&server, 200).await;
    Mock::given(method("DELETE"))
        .and(path("/admin/posts/7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    postdesk(&home, &server)
        .args(["--yes", "posts", "delete", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted post 7"));
}

#[tokio::test]
async fn test_logout_clears_session_and_token() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = signed_in_home();
    let server = MockServer::start().await;

    postdesk(&home, &server)
        .args(["--yes", "logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed out."));

    let items = stored_items(home.path());
    assert!(items.get("firebaseSession").is_none());
    assert!(items.get("adminToken").is_none());
}

#[tokio::test]
async fn test_contact_requires_verification_token() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contact"))
        .and(body_string_contains("cf-turnstile-response=widget-token"))
        .and(body_string_contains("subject=Hi"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let contact_args = [
        "contact", "--name", "Ada", "--email", "ada@example.com", "--subject", "Hi", "--message",
        "Hello there",
    ];

    postdesk(&home, &server)
        .env_remove("POSTDESK_TURNSTILE_TOKEN")
        .args(contact_args)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please complete the verification first."));

    postdesk(&home, &server)
        .args(contact_args)
        .args(["--turnstile-token", "widget-token"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Message sent."));
}
