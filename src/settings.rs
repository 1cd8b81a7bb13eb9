//! Connection settings and the defaulting rules around them.
//!
//! Values are resolved from three sources, highest precedence first:
//! a persisted local value, the shared settings document fetched from the
//! remote repository, and the GitHub Pages hosting-address heuristic.
//! Each source only ever fills fields the previous ones left empty, so a
//! user-supplied value is never overwritten. Literal defaults fill whatever
//! remains.

use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_PROGRESS_PATH: &str = "progress.json";
pub const DEFAULT_SETTINGS_PATH: &str = "brewgoal-settings.json";
pub const DEFAULT_GOAL: f64 = 500.0;

/// Where to find the remote progress document, plus display preferences.
///
/// `token` is local-only and sensitive: it is persisted in `settings.json`
/// but never included in the shared settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionSettings {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
    pub settings_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub goal: f64,
    /// When an automatic pull finds no remote document, push local state to
    /// seed it instead of treating the pull as a no-op.
    pub seed_on_empty_pull: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            branch: String::new(),
            path: String::new(),
            settings_path: String::new(),
            token: None,
            goal: DEFAULT_GOAL,
            seed_on_empty_pull: false,
        }
    }
}

/// A partial set of connection values from one defaulting source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialSettings {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub path: Option<String>,
    pub settings_path: Option<String>,
    pub goal: Option<f64>,
}

/// The token-free settings document shared via the remote repository.
///
/// Older clients wrote `user` instead of `owner` and `collection` instead of
/// `repo`; both spellings are accepted on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedSettingsDoc {
    #[serde(alias = "user", skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(alias = "collection", skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "settingsPath", skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<f64>,
}

impl SharedSettingsDoc {
    pub fn as_partial(&self) -> PartialSettings {
        PartialSettings {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            path: self.path.clone(),
            settings_path: self.settings_path.clone(),
            goal: self.goal,
        }
    }
}

/// Derive connection defaults from a GitHub Pages hosting address of the
/// form `https://{owner}.github.io/{repo}/...`. Returns None for any other
/// address shape; this is a convenience heuristic, never authoritative.
pub fn derive_from_pages_url(pages_url: &str) -> Option<PartialSettings> {
    let url = Url::parse(pages_url).ok()?;
    let host = url.host_str()?;
    let owner = host.strip_suffix(".github.io")?;
    if owner.is_empty() || owner.contains('.') {
        return None;
    }
    let repo = url.path_segments()?.find(|s| !s.is_empty())?.to_string();

    Some(PartialSettings {
        owner: Some(owner.to_string()),
        repo: Some(repo),
        branch: Some(DEFAULT_BRANCH.to_string()),
        path: Some(DEFAULT_PROGRESS_PATH.to_string()),
        settings_path: Some(DEFAULT_SETTINGS_PATH.to_string()),
        goal: None,
    })
}

fn fill_string(field: &mut String, value: &Option<String>) -> bool {
    match value {
        Some(v) if field.is_empty() && !v.is_empty() => {
            *field = v.clone();
            true
        }
        _ => false,
    }
}

impl ConnectionSettings {
    /// True once the remote repository is addressable.
    pub fn is_connected(&self) -> bool {
        !self.owner.is_empty() && !self.repo.is_empty()
    }

    /// Fill empty fields from `defaults`; a non-empty field is never
    /// overwritten. `goal` counts as unset while it still holds the literal
    /// default. Returns true if anything changed.
    pub fn fill_missing(&mut self, defaults: &PartialSettings) -> bool {
        let mut changed = false;
        changed |= fill_string(&mut self.owner, &defaults.owner);
        changed |= fill_string(&mut self.repo, &defaults.repo);
        changed |= fill_string(&mut self.branch, &defaults.branch);
        changed |= fill_string(&mut self.path, &defaults.path);
        changed |= fill_string(&mut self.settings_path, &defaults.settings_path);
        if let Some(goal) = defaults.goal {
            if self.goal == DEFAULT_GOAL && goal != DEFAULT_GOAL && goal > 0.0 {
                self.goal = goal;
                changed = true;
            }
        }
        changed
    }

    /// Last link of the defaulting chain: hard-coded literals.
    pub fn fill_literal_defaults(&mut self) -> bool {
        self.fill_missing(&PartialSettings {
            owner: None,
            repo: None,
            branch: Some(DEFAULT_BRANCH.to_string()),
            path: Some(DEFAULT_PROGRESS_PATH.to_string()),
            settings_path: Some(DEFAULT_SETTINGS_PATH.to_string()),
            goal: None,
        })
    }

    /// The projection published as the shared settings document. Never
    /// includes the token.
    pub fn shared_document(&self) -> SharedSettingsDoc {
        let some_unless_empty = |s: &String| {
            if s.is_empty() {
                None
            } else {
                Some(s.clone())
            }
        };
        SharedSettingsDoc {
            owner: some_unless_empty(&self.owner),
            repo: some_unless_empty(&self.repo),
            branch: some_unless_empty(&self.branch),
            path: some_unless_empty(&self.path),
            settings_path: some_unless_empty(&self.settings_path),
            goal: Some(self.goal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_url_heuristic_parses_owner_and_repo() {
        let derived = derive_from_pages_url("https://alice.github.io/brew-goal/index.html")
            .expect("should derive");
        assert_eq!(derived.owner.as_deref(), Some("alice"));
        assert_eq!(derived.repo.as_deref(), Some("brew-goal"));
        assert_eq!(derived.branch.as_deref(), Some("main"));
        assert_eq!(derived.path.as_deref(), Some("progress.json"));
        assert_eq!(derived.settings_path.as_deref(), Some("brewgoal-settings.json"));
    }

    #[test]
    fn pages_url_heuristic_rejects_other_hosts_and_bare_roots() {
        assert_eq!(derive_from_pages_url("https://example.com/brew-goal/"), None);
        assert_eq!(derive_from_pages_url("https://alice.github.io/"), None);
        assert_eq!(derive_from_pages_url("https://alice.github.io"), None);
        assert_eq!(derive_from_pages_url("not a url"), None);
        // Sub-subdomains do not match the `{owner}.github.io` pattern.
        assert_eq!(derive_from_pages_url("https://a.b.github.io/repo/"), None);
    }

    #[test]
    fn fill_missing_never_overwrites_an_explicit_value() {
        let mut settings = ConnectionSettings::default();
        settings.owner = "alice".to_string();

        let changed = settings.fill_missing(&PartialSettings {
            owner: Some("mallory".to_string()),
            repo: Some("brew-goal".to_string()),
            ..Default::default()
        });

        assert!(changed);
        assert_eq!(settings.owner, "alice");
        assert_eq!(settings.repo, "brew-goal");
    }

    #[test]
    fn earlier_sources_outrank_later_ones_in_the_fill_chain() {
        let mut settings = ConnectionSettings::default();

        // Shared document applied first, then the heuristic.
        let shared = SharedSettingsDoc {
            branch: Some("sync".to_string()),
            ..Default::default()
        };
        settings.fill_missing(&shared.as_partial());
        settings
            .fill_missing(&derive_from_pages_url("https://alice.github.io/brew-goal/").unwrap());
        settings.fill_literal_defaults();

        assert_eq!(settings.branch, "sync"); // shared beat the heuristic's "main"
        assert_eq!(settings.owner, "alice"); // heuristic filled the rest
        assert_eq!(settings.path, "progress.json");
    }

    #[test]
    fn shared_document_accepts_legacy_key_spellings() {
        let doc: SharedSettingsDoc =
            serde_json::from_str(r#"{"user": "alice", "collection": "brew-goal", "goal": 750}"#)
                .unwrap();
        assert_eq!(doc.owner.as_deref(), Some("alice"));
        assert_eq!(doc.repo.as_deref(), Some("brew-goal"));
        assert_eq!(doc.goal, Some(750.0));
    }

    #[test]
    fn shared_document_never_contains_the_token() {
        let mut settings = ConnectionSettings::default();
        settings.owner = "alice".to_string();
        settings.repo = "brew-goal".to_string();
        settings.token = Some("ghp_secret".to_string());

        let json = serde_json::to_string(&settings.shared_document()).unwrap();
        assert!(!json.contains("ghp_secret"));
        assert!(!json.contains("token"));
    }

    #[test]
    fn shared_goal_fills_only_while_local_goal_is_untouched() {
        let mut settings = ConnectionSettings::default();
        let shared = PartialSettings {
            goal: Some(1000.0),
            ..Default::default()
        };
        assert!(settings.fill_missing(&shared));
        assert_eq!(settings.goal, 1000.0);

        // A second source no longer applies.
        settings.fill_missing(&PartialSettings {
            goal: Some(250.0),
            ..Default::default()
        });
        assert_eq!(settings.goal, 1000.0);
    }
}
