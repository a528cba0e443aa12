//! Discovery documents and target descriptions.
//!
//! `BrowserVersion` is served by `GET /json/version`, `ListedTarget` by
//! `GET /json/list`, and `TargetInfo` is the entry type of the
//! `Target.getTargets` command result.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::TargetId;

// ============================================================================
// Constants
// ============================================================================

/// Target type of a top-level page.
pub const PAGE_TARGET_TYPE: &str = "page";

// ============================================================================
// BrowserVersion
// ============================================================================

/// Response of `GET /json/version`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BrowserVersion {
    /// Product string, e.g. `Chrome/126.0.6478.127`.
    #[serde(rename = "Browser", default)]
    pub browser: String,

    /// DevTools protocol version.
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,

    /// User agent of the remote application.
    #[serde(rename = "User-Agent", default)]
    pub user_agent: String,

    /// Browser-level WebSocket URL.
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

// ============================================================================
// ListedTarget
// ============================================================================

/// One entry of `GET /json/list`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ListedTarget {
    /// Target id.
    pub id: TargetId,
    /// Target type (`page`, `iframe`, `worker`, ...).
    #[serde(rename = "type")]
    pub target_type: String,
    /// Page title.
    #[serde(default)]
    pub title: String,
    /// Page URL.
    #[serde(default)]
    pub url: String,
}

// ============================================================================
// TargetInfo
// ============================================================================

/// One entry of the `Target.getTargets` result.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TargetInfo {
    /// Target id.
    #[serde(rename = "targetId")]
    pub target_id: TargetId,
    /// Target type.
    #[serde(rename = "type")]
    pub target_type: String,
    /// Page title.
    #[serde(default)]
    pub title: String,
    /// Page URL.
    #[serde(default)]
    pub url: String,
    /// Whether some client is attached already.
    #[serde(default)]
    pub attached: bool,
}

impl TargetInfo {
    /// Returns `true` for top-level pages.
    #[inline]
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.target_type == PAGE_TARGET_TYPE
    }

    /// Parses the `targetInfos` array of a `Target.getTargets` result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the array is missing and
    /// [`Error::Json`] if an entry is malformed.
    pub fn list_from_result(result: Value) -> Result<Vec<Self>> {
        let infos = result
            .get("targetInfos")
            .cloned()
            .ok_or_else(|| Error::protocol("Target.getTargets result has no targetInfos"))?;
        Ok(serde_json::from_value(infos)?)
    }

    /// Picks the canonical interaction surface: the first page target.
    #[must_use]
    pub fn primary_page(targets: &[Self]) -> Option<&Self> {
        targets.iter().find(|t| t.is_page())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_browser_version_parse() {
        let json = r#"{
            "Browser": "Chrome/126.0.6478.127",
            "Protocol-Version": "1.3",
            "User-Agent": "Mozilla/5.0 Code/1.92.0 Electron/30.1.2",
            "V8-Version": "12.6.228.21",
            "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
        }"#;
        let version: BrowserVersion = serde_json::from_str(json).expect("parse");

        assert_eq!(version.protocol_version, "1.3");
        assert_eq!(
            version.web_socket_debugger_url.as_deref(),
            Some("ws://127.0.0.1:9222/devtools/browser/abc")
        );
    }

    #[test]
    fn test_primary_page_skips_workers() {
        let result = json!({
            "targetInfos": [
                {"targetId": "W1", "type": "service_worker", "title": "", "url": "", "attached": false},
                {"targetId": "P1", "type": "page", "title": "main.rs — crate — Code", "url": "vscode-file://", "attached": false},
                {"targetId": "P2", "type": "page", "title": "Developer Tools", "url": "devtools://", "attached": false}
            ]
        });
        let targets = TargetInfo::list_from_result(result).expect("parse");
        let page = TargetInfo::primary_page(&targets).expect("page");

        assert_eq!(page.target_id, TargetId::new("P1"));
    }

    #[test]
    fn test_missing_target_infos() {
        let err = TargetInfo::list_from_result(json!({})).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_listed_target_parse() {
        let json = r#"[{"id": "P1", "type": "page", "title": "t", "url": "u", "webSocketDebuggerUrl": "ws://x"}]"#;
        let targets: Vec<ListedTarget> = serde_json::from_str(json).expect("parse");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].target_type, "page");
    }
}
