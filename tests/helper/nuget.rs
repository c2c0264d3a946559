//! mockito fixtures for a NuGet V3 feed

use mockito::{Mock, ServerGuard};
use serde_json::json;

pub fn service_index_url(server: &ServerGuard) -> String {
    format!("{}/v3/index.json", server.url())
}

pub async fn mock_service_index(server: &mut ServerGuard) -> Mock {
    let body = json!({
        "version": "3.0.0",
        "resources": [
            { "@id": format!("{}/reg/", server.url()), "@type": "RegistrationsBaseUrl" },
            { "@id": format!("{}/reg/", server.url()), "@type": "RegistrationsBaseUrl/3.6.0" },
            { "@id": "https://www.nuget.org/packages/{id}/{version}", "@type": "PackageDetailsUriTemplate/5.1.0" },
        ]
    });
    server
        .mock("GET", "/v3/index.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(1)
        .create_async()
        .await
}

pub fn leaf(id: &str, version: &str, timestamp: &str) -> serde_json::Value {
    json!({
        "@id": format!("https://example.com/reg/{}/{}.json", id.to_lowercase(), version),
        "catalogEntry": { "id": id, "version": version, "published": timestamp },
        "commitTimeStamp": timestamp,
    })
}

/// Registration index for `id` whose only page is served collapsed
pub async fn mock_collapsed_registration(
    server: &mut ServerGuard,
    id: &str,
    leaves: Vec<(&str, &str)>,
) -> Vec<Mock> {
    let lower_id = id.to_lowercase();
    let lower = leaves.first().map(|(v, _)| *v).unwrap_or_default();
    let upper = leaves.last().map(|(v, _)| *v).unwrap_or_default();
    let page_path = format!("/reg/{}/page/{}/{}.json", lower_id, lower, upper);
    let page_url = format!("{}{}", server.url(), page_path);

    let index = json!({
        "count": 1,
        "items": [{ "@id": page_url, "count": leaves.len(), "lower": lower, "upper": upper }],
    });
    let page = json!({
        "@id": page_url,
        "count": leaves.len(),
        "lower": lower,
        "upper": upper,
        "items": leaves.iter().map(|(v, ts)| leaf(id, v, ts)).collect::<Vec<_>>(),
    });

    let index_mock = server
        .mock("GET", format!("/reg/{}/index.json", lower_id).as_str())
        .with_status(200)
        .with_body(index.to_string())
        .expect(1)
        .create_async()
        .await;
    let page_mock = server
        .mock("GET", page_path.as_str())
        .with_status(200)
        .with_body(page.to_string())
        .expect(1)
        .create_async()
        .await;
    vec![index_mock, page_mock]
}

pub async fn mock_missing_registration(server: &mut ServerGuard, id: &str) -> Mock {
    server
        .mock("GET", format!("/reg/{}/index.json", id.to_lowercase()).as_str())
        .with_status(404)
        .create_async()
        .await
}
