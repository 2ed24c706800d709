//! HttpRegistry tests against a local stub registry

use crate::*;
use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use depgraph_core::{PackageName, RegistryConfig};
use serde_json::json;

fn name(s: &str) -> PackageName {
    PackageName::new(s).unwrap()
}

fn names(deps: Vec<PackageName>) -> Vec<String> {
    deps.into_iter().map(PackageName::into_string).collect()
}

async fn packument(Path(pkg): Path<String>) -> Response {
    match pkg.as_str() {
        "cookies" => Json(json!({
            "name": "cookies",
            "dist-tags": { "latest": "0.9.1" },
            "versions": {
                "0.9.1": { "dependencies": { "depd": "~2.0.0", "keygrip": "~1.1.0" } }
            }
        }))
        .into_response(),
        "@scope/pkg" => Json(json!({
            "dist-tags": { "latest": "1.0.0" },
            "versions": { "1.0.0": { "dependencies": { "tslib": "^2" } } }
        }))
        .into_response(),
        "tsscmp" => Json(json!({
            "dist-tags": { "latest": "1.0.6" },
            "versions": { "1.0.6": {} }
        }))
        .into_response(),
        "unpublished" => Json(json!({ "name": "unpublished", "time": {} })).into_response(),
        "broken" => "definitely not json".into_response(),
        "flaky" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start the stub registry on an ephemeral port and return its base URL.
async fn spawn_stub_registry() -> String {
    let app = Router::new().route("/:name", get(packument));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn registry_at(url: &str) -> HttpRegistry {
    HttpRegistry::new(&RegistryConfig {
        url: url.to_string(),
        timeout_secs: 5,
        ..RegistryConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetch_dependencies() {
    let registry = registry_at(&spawn_stub_registry().await);

    let deps = registry.fetch_dependencies(&name("cookies")).await.unwrap();
    assert_eq!(names(deps), vec!["depd", "keygrip"]);

    let deps = registry.fetch_dependencies(&name("tsscmp")).await.unwrap();
    assert!(deps.is_empty());
}

#[tokio::test]
async fn test_scoped_package_round_trip() {
    let registry = registry_at(&spawn_stub_registry().await);
    assert!(registry.package_exists(&name("@scope/pkg")).await);
    let deps = registry.fetch_dependencies(&name("@scope/pkg")).await.unwrap();
    assert_eq!(names(deps), vec!["tslib"]);
}

#[tokio::test]
async fn test_package_exists() {
    let registry = registry_at(&spawn_stub_registry().await);
    assert!(registry.package_exists(&name("cookies")).await);
    assert!(!registry.package_exists(&name("no-such-package")).await);
    assert!(!registry.package_exists(&name("flaky")).await);
}

#[tokio::test]
async fn test_anomalies_are_typed() {
    let registry = registry_at(&spawn_stub_registry().await);

    assert_eq!(
        registry.fetch_dependencies(&name("no-such-package")).await,
        Err(FetchAnomaly::Status(404))
    );
    assert_eq!(
        registry.fetch_dependencies(&name("flaky")).await,
        Err(FetchAnomaly::Status(500))
    );
    assert_eq!(
        registry.fetch_dependencies(&name("unpublished")).await,
        Err(FetchAnomaly::Unpublished)
    );
    assert!(matches!(
        registry.fetch_dependencies(&name("broken")).await,
        Err(FetchAnomaly::Malformed(_))
    ));
}

#[tokio::test]
async fn test_best_effort_fetch_is_empty_on_anomaly() {
    let registry = registry_at(&spawn_stub_registry().await);
    assert!(registry.fetch_dependency_names(&name("flaky")).await.is_empty());
    assert!(registry.fetch_dependency_names(&name("unpublished")).await.is_empty());
    assert_eq!(registry.fetch_dependency_names(&name("cookies")).await.len(), 2);
}

#[tokio::test]
async fn test_transport_failure_degrades() {
    // Bind then drop to get a port nothing is listening on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let registry = registry_at(&format!("http://{}", addr));
    assert!(!registry.package_exists(&name("cookies")).await);
    assert!(matches!(
        registry.fetch_dependencies(&name("cookies")).await,
        Err(FetchAnomaly::Transport(_))
    ));
}

#[test]
fn test_package_url_encoding() {
    let registry = registry_at("https://registry.npmjs.org");
    assert_eq!(
        registry.package_url(&name("cookies")).as_str(),
        "https://registry.npmjs.org/cookies"
    );
    assert_eq!(
        registry.package_url(&name("@babel/core")).as_str(),
        "https://registry.npmjs.org/@babel%2Fcore"
    );

    let mirror = registry_at("http://localhost:4873/npm/");
    assert_eq!(
        mirror.package_url(&name("left-pad")).as_str(),
        "http://localhost:4873/npm/left-pad"
    );
}

#[test]
fn test_invalid_registry_url() {
    let result = HttpRegistry::new(&RegistryConfig {
        url: "not a url".to_string(),
        ..RegistryConfig::default()
    });
    assert!(matches!(result, Err(HttpRegistryError::InvalidUrl { .. })));
}

#[test]
fn test_transient_classification() {
    assert!(FetchAnomaly::Status(500).is_transient());
    assert!(FetchAnomaly::Transport("timeout".into()).is_transient());
    assert!(!FetchAnomaly::Status(404).is_transient());
    assert!(!FetchAnomaly::Unpublished.is_transient());
}

#[tokio::test]
async fn test_mock_registry_counts_calls() {
    let registry = MockRegistry::new().with_package("a", &["b"]);
    registry.fetch_dependencies(&name("a")).await.unwrap();
    registry.fetch_dependencies(&name("a")).await.unwrap();
    assert_eq!(registry.fetch_count("a"), 2);
    assert_eq!(
        registry.fetch_dependencies(&name("zzz")).await,
        Err(FetchAnomaly::Status(404))
    );
    assert_eq!(registry.total_fetches(), 3);
    assert!(registry.package_exists(&name("a")).await);
    assert!(!registry.package_exists(&name("zzz")).await);
    assert_eq!(registry.exists_count(), 2);
}
