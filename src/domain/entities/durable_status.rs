use serde::{Deserialize, Serialize};

/// Agent state that survives restarts: `{ "last_apk": "<sha256 hex>" }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurableStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_apk: Option<String>,
}

impl DurableStatus {
    pub fn needs_install(&self, package_hash: &str) -> bool {
        self.last_apk.as_deref() != Some(package_hash)
    }

    pub fn record_install(&mut self, package_hash: &str) {
        self.last_apk = Some(package_hash.to_string());
    }
}
