use std::{
	sync::atomic::{AtomicBool, Ordering},
	time::Duration,
};

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

use crate::{Error, Result};
use sift_domain::{ChangeCursor, ChangesPage, ListPage};

/// JSON-over-HTTP metadata source.
///
/// Every request carries the configured bearer token. A 401 or 403 from any endpoint marks the
/// source unauthenticated until the next successful [`HttpSource::authenticate`].
pub struct HttpSource {
	client: Client,
	cfg: sift_config::Source,
	authenticated: AtomicBool,
}
impl HttpSource {
	pub fn new(cfg: sift_config::Source) -> Result<Self> {
		if cfg.api_base.trim().is_empty() {
			return Err(Error::InvalidConfig { message: "Source api_base must be set.".to_string() });
		}

		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(crate::auth_headers(&cfg.access_token, &cfg.default_headers)?)
			.build()?;

		Ok(Self { client, cfg, authenticated: AtomicBool::new(false) })
	}

	pub fn is_authenticated(&self) -> bool {
		self.authenticated.load(Ordering::SeqCst)
	}

	/// Probes the auth check endpoint. `Ok(false)` means the token was rejected; transport and
	/// server errors surface as `Err`.
	pub async fn authenticate(&self) -> Result<bool> {
		let res = self.client.get(self.url(&self.cfg.auth_check_path)).send().await?;
		let status = res.status();

		if is_auth_failure(status) {
			self.authenticated.store(false, Ordering::SeqCst);

			tracing::warn!(status = status.as_u16(), "Source rejected the access token.");

			return Ok(false);
		}

		res.error_for_status()?;
		self.authenticated.store(true, Ordering::SeqCst);

		Ok(true)
	}

	/// Fetches one page of the full listing, starting at `cursor` or at the beginning.
	pub async fn list_page(&self, cursor: Option<&str>) -> Result<ListPage> {
		let mut req = self
			.client
			.get(self.url(&self.cfg.list_path))
			.query(&[("page_size", self.cfg.page_size.to_string())]);

		if let Some(cursor) = cursor {
			req = req.query(&[("cursor", cursor)]);
		}

		parse_list_response(self.send_json(req).await?)
	}

	/// Fetches one page of the change feed after `cursor`.
	pub async fn changes_page(&self, cursor: &str) -> Result<ChangesPage> {
		let req = self
			.client
			.get(self.url(&self.cfg.changes_path))
			.query(&[("cursor", cursor.to_string()), ("page_size", self.cfg.page_size.to_string())]);

		parse_changes_response(self.send_json(req).await?)
	}

	/// Asks the source for a cursor positioned at "now".
	pub async fn start_cursor(&self) -> Result<ChangeCursor> {
		let req = self.client.get(self.url(&self.cfg.start_cursor_path));

		parse_cursor_response(self.send_json(req).await?)
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.cfg.api_base, path)
	}

	async fn send_json(&self, req: RequestBuilder) -> Result<Value> {
		let res = req.send().await?;
		let status = res.status();

		if is_auth_failure(status) {
			self.authenticated.store(false, Ordering::SeqCst);

			return Err(Error::Unauthorized { status: status.as_u16() });
		}

		Ok(res.error_for_status()?.json().await?)
	}
}

fn is_auth_failure(status: StatusCode) -> bool {
	matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

fn parse_list_response(json: Value) -> Result<ListPage> {
	if !json.get("records").is_some_and(Value::is_array) {
		return Err(Error::InvalidResponse {
			message: "List response is missing records array.".to_string(),
		});
	}

	let page: ListPage = serde_json::from_value(json)?;

	Ok(ListPage { next_cursor: non_empty(page.next_cursor), ..page })
}

fn parse_changes_response(json: Value) -> Result<ChangesPage> {
	if !json.get("changes").is_some_and(Value::is_array) {
		return Err(Error::InvalidResponse {
			message: "Changes response is missing changes array.".to_string(),
		});
	}

	let page: ChangesPage = serde_json::from_value(json)?;
	let terminal_cursor = page.terminal_cursor.filter(|cursor| !cursor.as_str().is_empty());

	Ok(ChangesPage { next_page_cursor: non_empty(page.next_page_cursor), terminal_cursor, ..page })
}

fn parse_cursor_response(json: Value) -> Result<ChangeCursor> {
	json.get("cursor")
		.and_then(Value::as_str)
		.filter(|cursor| !cursor.is_empty())
		.map(ChangeCursor::new)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Start cursor response is missing cursor.".to_string(),
		})
}

fn non_empty(cursor: Option<String>) -> Option<String> {
	cursor.filter(|cursor| !cursor.is_empty())
}
