use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};

fn source_config(api_base: &str) -> sift_config::Source {
	serde_json::from_value(serde_json::json!({
		"api_base": api_base,
		"access_token": "secret",
	}))
	.expect("Failed to build source config.")
}

#[test]
fn builds_bearer_auth_header() {
	let headers = sift_providers::auth_headers("secret", &Map::new())
		.expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut extra = Map::new();

	extra.insert("x-team".to_string(), Value::from(7));

	assert!(sift_providers::auth_headers("secret", &extra).is_err());
}

#[test]
fn new_source_starts_unauthenticated() {
	let source = sift_providers::HttpSource::new(source_config("http://127.0.0.1:9"))
		.expect("Failed to build source.");

	assert!(!source.is_authenticated());
}

#[test]
fn blank_api_base_is_rejected() {
	assert!(sift_providers::HttpSource::new(source_config("  ")).is_err());
}

#[tokio::test]
async fn unreachable_source_is_an_error_not_a_rejection() {
	let source = sift_providers::HttpSource::new(source_config("http://127.0.0.1:9"))
		.expect("Failed to build source.");

	assert!(source.authenticate().await.is_err());
	assert!(!source.is_authenticated());
}
