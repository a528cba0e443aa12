//! Workspace extraction from an IDE renderer page.
//!
//! Strategies run in a fixed priority order; the first that yields a
//! workspace wins.
//!
//! | Strategy | Source |
//! |----------|--------|
//! | [`WorkspaceApi`](ExtractionStrategy::WorkspaceApi) | Workspace globals exposed by the renderer |
//! | [`WindowTitle`](ExtractionStrategy::WindowTitle) | `"<file> — <workspace> — <app>"` title |
//! | [`DomAttribute`](ExtractionStrategy::DomAttribute) | `data-workspace-*` and explorer `aria-label` |
//!
//! Parsers are pure functions of the evaluated value.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::pool::PooledConnection;

// ============================================================================
// Constants
// ============================================================================

/// Title separators used by VS Code derived editors.
static TITLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+[—–]\s+").expect("title separator regex is valid"));

/// Plain hyphen separator used by some window managers.
static ASCII_TITLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+-\s+").expect("ascii separator regex is valid"));

/// Leading dirty-file markers such as `● `.
static DIRTY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[●•*]\s*").expect("dirty marker regex is valid"));

/// Trailing decorations such as ` (Workspace)` or ` [SSH: host]`.
static WORKSPACE_DECORATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(\((Workspace|Remote)\)|\[[^\]]*\])\s*$").expect("decoration regex is valid")
});

const WORKSPACE_API_EXPRESSION: &str = r#"(() => {
  const ws = globalThis.vscode?.workspace ?? globalThis._VSCODE_WORKSPACE ?? null;
  if (!ws) return null;
  const folders = (ws.workspaceFolders ?? ws.folders ?? []).map((f) => ({
    name: f.name ?? null,
    path: f.uri?.fsPath ?? f.uri?.path ?? f.path ?? null,
  }));
  return { name: ws.name ?? null, folders };
})()"#;

const WINDOW_TITLE_EXPRESSION: &str = "document.title";

const DOM_ATTRIBUTE_EXPRESSION: &str = r#"(() => {
  const tagged = document.querySelector('[data-workspace-name], [data-workspace-path]');
  const explorer = document.querySelector('.explorer-folders-view [aria-label], .pane-header[aria-label^="Explorer"]');
  return {
    name: tagged?.getAttribute('data-workspace-name') ?? null,
    path: tagged?.getAttribute('data-workspace-path') ?? null,
    label: explorer?.getAttribute('aria-label') ?? null,
  };
})()"#;

// ============================================================================
// WorkspaceInfo
// ============================================================================

/// Workspace an IDE window has open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceInfo {
    /// Display name.
    pub name: String,
    /// Filesystem path of the first folder, when known.
    pub path: Option<String>,
    /// Paths of every folder, when known.
    pub folders: Vec<String>,
    /// Strategy that produced this result.
    pub strategy: ExtractionStrategy,
}

// ============================================================================
// ExtractionStrategy
// ============================================================================

/// One way of reading the workspace from the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    WorkspaceApi,
    WindowTitle,
    DomAttribute,
}

impl ExtractionStrategy {
    /// Every strategy, in priority order.
    pub const ALL: [Self; 3] = [Self::WorkspaceApi, Self::WindowTitle, Self::DomAttribute];

    /// JavaScript expression evaluated in the page.
    #[inline]
    #[must_use]
    pub fn expression(self) -> &'static str {
        match self {
            Self::WorkspaceApi => WORKSPACE_API_EXPRESSION,
            Self::WindowTitle => WINDOW_TITLE_EXPRESSION,
            Self::DomAttribute => DOM_ATTRIBUTE_EXPRESSION,
        }
    }

    /// Interprets the evaluated value.
    #[must_use]
    pub fn parse(self, value: &Value) -> Option<WorkspaceInfo> {
        match self {
            Self::WorkspaceApi => parse_workspace_api(value),
            Self::WindowTitle => value.as_str().and_then(parse_window_title),
            Self::DomAttribute => parse_dom_attributes(value),
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WorkspaceApi => "workspace_api",
            Self::WindowTitle => "window_title",
            Self::DomAttribute => "dom_attribute",
        })
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Runs every strategy in priority order and returns the first workspace.
///
/// Evaluation errors are logged and the next strategy is tried.
pub async fn extract_workspace(connection: &PooledConnection) -> Option<WorkspaceInfo> {
    let endpoint = connection.endpoint();

    for strategy in ExtractionStrategy::ALL {
        match connection.evaluate(strategy.expression()).await {
            Ok(value) => match strategy.parse(&value) {
                Some(info) => {
                    debug!(%endpoint, %strategy, workspace = %info.name, "Workspace extracted");
                    return Some(info);
                }
                None => trace!(%endpoint, %strategy, "Strategy found nothing"),
            },
            Err(e) => debug!(%endpoint, %strategy, error = %e, "Strategy failed"),
        }
    }

    debug!(%endpoint, "No strategy found a workspace");
    None
}

// ============================================================================
// Parsers
// ============================================================================

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Last path component, accepting both separators.
fn basename(path: &str) -> Option<String> {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_workspace_api(value: &Value) -> Option<WorkspaceInfo> {
    let object = value.as_object()?;
    let folders = object.get("folders").and_then(Value::as_array);

    let paths: Vec<String> = folders
        .into_iter()
        .flatten()
        .filter_map(|folder| non_empty(folder.get("path")))
        .collect();

    let first_folder_name = folders
        .and_then(|f| f.first())
        .and_then(|folder| non_empty(folder.get("name")));

    let name = non_empty(object.get("name"))
        .or(first_folder_name)
        .or_else(|| paths.first().and_then(|p| basename(p)))?;

    Some(WorkspaceInfo {
        name: strip_decorations(&name),
        path: paths.first().cloned(),
        folders: paths,
        strategy: ExtractionStrategy::WorkspaceApi,
    })
}

fn strip_decorations(name: &str) -> String {
    WORKSPACE_DECORATION.replace(name.trim(), "").trim().to_string()
}

/// Parses `"<file> — <workspace> — <app>"` or `"<workspace> — <app>"`.
fn parse_window_title(title: &str) -> Option<WorkspaceInfo> {
    let title = DIRTY_MARKER.replace(title.trim(), "");

    let mut parts: Vec<&str> = TITLE_SEPARATOR.split(&title).collect();
    if parts.len() < 2 {
        parts = ASCII_TITLE_SEPARATOR.split(&title).collect();
    }
    if parts.len() < 2 {
        return None;
    }

    let workspace = strip_decorations(parts[parts.len() - 2]);
    if workspace.is_empty() || workspace.starts_with("Untitled") {
        return None;
    }

    Some(WorkspaceInfo {
        name: workspace,
        path: None,
        folders: Vec::new(),
        strategy: ExtractionStrategy::WindowTitle,
    })
}

fn parse_dom_attributes(value: &Value) -> Option<WorkspaceInfo> {
    let path = non_empty(value.get("path"));
    let label_name = non_empty(value.get("label")).and_then(|label| {
        label
            .rsplit_once(':')
            .map(|(_, name)| name.trim().to_string())
            .filter(|name| !name.is_empty())
    });

    let name = non_empty(value.get("name"))
        .or(label_name)
        .or_else(|| path.as_deref().and_then(basename))?;

    Some(WorkspaceInfo {
        name: strip_decorations(&name),
        folders: path.iter().cloned().collect(),
        path,
        strategy: ExtractionStrategy::DomAttribute,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_workspace_api_with_folders() {
        let value = json!({
            "name": null,
            "folders": [
                { "name": "backend", "path": "/home/dev/backend" },
                { "name": "frontend", "path": "/home/dev/frontend" }
            ]
        });

        let info = ExtractionStrategy::WorkspaceApi.parse(&value).expect("info");
        assert_eq!(info.name, "backend");
        assert_eq!(info.path.as_deref(), Some("/home/dev/backend"));
        assert_eq!(info.folders.len(), 2);
    }

    #[test]
    fn test_workspace_api_named_multi_root() {
        let value = json!({ "name": "monorepo (Workspace)", "folders": [] });
        let info = ExtractionStrategy::WorkspaceApi.parse(&value).expect("info");
        assert_eq!(info.name, "monorepo");
        assert_eq!(info.path, None);
    }

    #[test]
    fn test_workspace_api_null() {
        assert_eq!(ExtractionStrategy::WorkspaceApi.parse(&Value::Null), None);
        assert_eq!(
            ExtractionStrategy::WorkspaceApi.parse(&json!({ "folders": [] })),
            None
        );
    }

    #[test]
    fn test_window_title_three_parts() {
        let info = ExtractionStrategy::WindowTitle
            .parse(&json!("● main.rs — remote-debug-pool — Visual Studio Code"))
            .expect("info");
        assert_eq!(info.name, "remote-debug-pool");
        assert_eq!(info.strategy, ExtractionStrategy::WindowTitle);
    }

    #[test]
    fn test_window_title_two_parts_and_decorations() {
        let info = ExtractionStrategy::WindowTitle
            .parse(&json!("api [SSH: build-box] — Cursor"))
            .expect("info");
        assert_eq!(info.name, "api");
    }

    #[test]
    fn test_window_title_ascii_fallback() {
        let info = ExtractionStrategy::WindowTitle
            .parse(&json!("lib.rs - crate - Windsurf"))
            .expect("info");
        assert_eq!(info.name, "crate");
    }

    #[test]
    fn test_window_title_rejects_bare_app_name() {
        assert_eq!(ExtractionStrategy::WindowTitle.parse(&json!("Visual Studio Code")), None);
        assert_eq!(
            ExtractionStrategy::WindowTitle.parse(&json!("Untitled-1 — Untitled (Workspace) — Code")),
            None
        );
        assert_eq!(ExtractionStrategy::WindowTitle.parse(&json!(42)), None);
    }

    #[test]
    fn test_dom_attribute_sources() {
        let tagged = json!({ "name": "svc", "path": "/srv/svc", "label": null });
        let info = ExtractionStrategy::DomAttribute.parse(&tagged).expect("tagged");
        assert_eq!(info.name, "svc");
        assert_eq!(info.folders, vec!["/srv/svc".to_string()]);

        let labelled = json!({ "name": null, "path": null, "label": "Explorer Section: notes" });
        let info = ExtractionStrategy::DomAttribute.parse(&labelled).expect("labelled");
        assert_eq!(info.name, "notes");

        let path_only = json!({ "name": null, "path": "C:\\work\\game\\", "label": null });
        let info = ExtractionStrategy::DomAttribute.parse(&path_only).expect("path");
        assert_eq!(info.name, "game");
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(
            ExtractionStrategy::ALL,
            [
                ExtractionStrategy::WorkspaceApi,
                ExtractionStrategy::WindowTitle,
                ExtractionStrategy::DomAttribute
            ]
        );
    }
}
