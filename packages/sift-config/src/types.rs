use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub source: Source,
	#[serde(default)]
	pub index: Index,
	#[serde(default)]
	pub rebuild: Rebuild,
	#[serde(default)]
	pub sync: SyncSchedule,
	#[serde(default)]
	pub usage: Usage,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	/// Directory holding the index snapshot, metadata snapshot and change cursor files.
	pub dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Source {
	pub api_base: String,
	/// Pre-acquired bearer token. Token acquisition happens outside of sift.
	pub access_token: String,
	#[serde(default = "default_auth_check_path")]
	pub auth_check_path: String,
	#[serde(default = "default_list_path")]
	pub list_path: String,
	#[serde(default = "default_changes_path")]
	pub changes_path: String,
	#[serde(default = "default_start_cursor_path")]
	pub start_cursor_path: String,
	#[serde(default = "default_page_size")]
	pub page_size: u32,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Index {
	pub name_weight: f64,
	pub type_weight: f64,
	pub path_weight: f64,
	/// Allowed edit distance as a fraction of the query token length.
	pub fuzzy_ratio: f64,
	pub max_edit_distance: usize,
	pub prefix: bool,
	pub recency_tau_days: f64,
	pub recency_weight: f64,
	pub frequency_weight: f64,
}
impl Default for Index {
	fn default() -> Self {
		Self {
			name_weight: 3.0,
			type_weight: 2.0,
			path_weight: 1.0,
			fuzzy_ratio: 0.2,
			max_edit_distance: 2,
			prefix: true,
			recency_tau_days: 30.0,
			recency_weight: 0.3,
			frequency_weight: 0.2,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Rebuild {
	pub batch_size: usize,
	pub page_delay_ms: u64,
	pub batch_delay_ms: u64,
	/// The job aborts once accumulated page failures exceed this count.
	pub max_page_failures: usize,
	/// Force a full rebuild at startup even when a populated snapshot was loaded.
	pub rebuild_on_start: bool,
}
impl Default for Rebuild {
	fn default() -> Self {
		Self {
			batch_size: 100,
			page_delay_ms: 100,
			batch_delay_ms: 50,
			max_page_failures: 5,
			rebuild_on_start: false,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SyncSchedule {
	pub interval_ms: u64,
}
impl Default for SyncSchedule {
	fn default() -> Self {
		Self { interval_ms: 300_000 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Usage {
	/// Flush once this many usage mutations are pending.
	pub max_pending: usize,
	/// Flush once the oldest pending usage mutation is this old.
	pub max_delay_ms: u64,
	pub check_interval_ms: u64,
}
impl Default for Usage {
	fn default() -> Self {
		Self { max_pending: 20, max_delay_ms: 30_000, check_interval_ms: 1_000 }
	}
}

fn default_auth_check_path() -> String {
	"/v1/account".to_string()
}

fn default_list_path() -> String {
	"/v1/files".to_string()
}

fn default_changes_path() -> String {
	"/v1/changes".to_string()
}

fn default_start_cursor_path() -> String {
	"/v1/changes/start-cursor".to_string()
}

fn default_page_size() -> u32 {
	100
}

fn default_timeout_ms() -> u64 {
	30_000
}
