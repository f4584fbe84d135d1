//! App route configuration.
//!
//! Delivered by the host inside `AppReady` as a JSON string (the app's
//! `app.json`). Only the parts the navigation core needs are modelled; unknown
//! keys are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::RouteConfigError;
use crate::path::front_uri;

/// Declared routes, tab bar and preload rules of an app.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Main-package page paths, e.g. `pages/index/index`.
    #[serde(default)]
    pub pages: Vec<String>,
    /// Lazily loaded sub-packages.
    #[serde(default)]
    pub sub_packages: Vec<SubPackage>,
    /// Bottom tab bar, if the app has one.
    #[serde(default)]
    pub tab_bar: Option<TabBar>,
    /// Per-page sub-package preload rules, keyed by page path.
    #[serde(default)]
    pub preload_rule: BTreeMap<String, PreloadRule>,
    /// On-disk root of the app, filled in from `AppReady.appPath`.
    #[serde(default)]
    pub app_root_path: String,
}

/// A sub-package: pages listed relative to `root`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubPackage {
    /// Package root directory.
    pub root: String,
    /// Page paths relative to `root`.
    #[serde(default)]
    pub pages: Vec<String>,
}

/// Tab bar declaration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TabBar {
    /// Tabs in display order.
    #[serde(default)]
    pub list: Vec<TabItem>,
}

/// One tab.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TabItem {
    /// Page shown by the tab.
    pub page_path: String,
    /// Label.
    #[serde(default)]
    pub text: String,
}

/// Which sub-packages to fetch ahead of time when a page opens.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreloadRule {
    /// Sub-package roots.
    #[serde(default)]
    pub packages: Vec<String>,
    /// `"wifi"` (default) or `"all"`.
    #[serde(default)]
    pub network: Option<String>,
}

impl AppConfig {
    /// Parse the serialized config carried by `AppReady`.
    pub fn from_json(raw: &str) -> Result<Self, RouteConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// All sub-package pages as full paths (`root/page`).
    pub fn sub_package_pages(&self) -> Vec<String> {
        self.sub_packages
            .iter()
            .flat_map(|pkg| {
                pkg.pages.iter().map(move |page| {
                    format!("{}/{}", pkg.root.trim_end_matches('/'), page.trim_start_matches('/'))
                })
            })
            .collect()
    }

    /// Whether the path portion of `url` is a declared main or sub-package page.
    pub fn declares(&self, url: &str) -> bool {
        let path = front_uri(url);
        self.pages.iter().any(|p| p == path) || self.sub_package_pages().iter().any(|p| p == path)
    }

    /// Tabs, empty when there is no tab bar.
    pub fn tabs(&self) -> &[TabItem] {
        self.tab_bar.as_ref().map_or(&[], |bar| bar.list.as_slice())
    }

    /// Index of the tab showing `url`'s path, if any.
    pub fn tab_index_of(&self, url: &str) -> Option<usize> {
        let path = front_uri(url);
        self.tabs().iter().position(|tab| tab.page_path == path)
    }

    /// Whether an entry page at `url` should become a tab group.
    ///
    /// A single-tab bar behaves like a plain page.
    pub fn opens_tab_group(&self, url: &str) -> bool {
        self.tabs().len() > 1 && self.tab_index_of(url).is_some()
    }

    /// Sub-package roots to preload on the given network type.
    ///
    /// Only declared roots are returned, each once, in rule order. Rules
    /// default to wifi-only; `network: "all"` preloads on any network.
    pub fn preload_roots(&self, network_type: &str) -> Vec<String> {
        let declared: Vec<&str> = self.sub_packages.iter().map(|p| p.root.as_str()).collect();
        let mut roots: Vec<String> = Vec::new();
        for rule in self.preload_rule.values() {
            let allowed = network_type == "wifi" || rule.network.as_deref() == Some("all");
            if !allowed {
                continue;
            }
            for root in &rule.packages {
                if declared.contains(&root.as_str()) && !roots.contains(root) {
                    roots.push(root.clone());
                }
            }
        }
        roots
    }
}
