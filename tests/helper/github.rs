//! mockito fixtures for the GitHub REST API

use mockito::{Matcher, Mock, ServerGuard};
use serde_json::json;

pub const TOKEN: &str = "test-token";

/// Code search hit pointing at the contents API of `repo/path`
pub fn search_item(server: &ServerGuard, repo: &str, path: &str) -> serde_json::Value {
    json!({
        "name": path.rsplit('/').next().unwrap_or(path),
        "path": path,
        "url": format!("{}/repos/acme/{}/contents/{}", server.url(), repo, path),
        "repository": { "name": repo, "full_name": format!("acme/{}", repo) },
    })
}

/// A single search page for every query whose raw query string matches `query_pattern`
pub async fn mock_search(
    server: &mut ServerGuard,
    query_pattern: &str,
    items: Vec<serde_json::Value>,
) -> Mock {
    let body = json!({
        "total_count": items.len(),
        "incomplete_results": false,
        "items": items,
    });
    server
        .mock("GET", "/search/code")
        .match_query(Matcher::Regex(query_pattern.to_string()))
        .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(1)
        .create_async()
        .await
}

/// Contents API entry and raw download for `repo/path`
pub async fn mock_file(server: &mut ServerGuard, repo: &str, path: &str, content: &str) -> Vec<Mock> {
    let details = json!({
        "name": path.rsplit('/').next().unwrap_or(path),
        "path": path,
        "download_url": format!("{}/raw/{}/{}", server.url(), repo, path),
    });
    let contents = server
        .mock("GET", format!("/repos/acme/{}/contents/{}", repo, path).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(details.to_string())
        .create_async()
        .await;
    let raw = server
        .mock("GET", format!("/raw/{}/{}", repo, path).as_str())
        .with_status(200)
        .with_body(content)
        .expect(1)
        .create_async()
        .await;
    vec![contents, raw]
}
