use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::core::config::Config;
use crate::services::api::{AuthStore, BlogApi};

pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_TONE: &str = "Formal";
pub const DEFAULT_CREATIVITY: &str = "Regular";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    #[default]
    Ai,
    Manual,
}

/// The in-progress post. Every field is optional; an absent field is "unset".
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct Draft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creativity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_or_niche: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targeted_keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targeted_audience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_links: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_idea: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_mode: Option<EditorMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_selected_idx: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro_md: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro_mode: Option<EditorMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro_options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro_selected_idx: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline_mode: Option<EditorMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline_options: Option<Vec<Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline_selected_idx: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
}

macro_rules! merge_fields {
    ($target:expr, $patch:expr; $($field:ident),+ $(,)?) => {
        $(
            if $patch.$field.is_some() {
                $target.$field = $patch.$field;
            }
        )+
    };
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Draft {
    /// Shallow merge: every field set in `patch` replaces the current value.
    pub fn merge(&mut self, patch: Draft) {
        merge_fields!(self, patch;
            language, tone, creativity, focus_or_niche, targeted_keyword,
            targeted_audience, reference_links, selected_idea,
            title, title_mode, title_options, title_selected_idx,
            intro_md, intro_mode, intro_options, intro_selected_idx,
            outline, outline_mode, outline_options, outline_selected_idx,
            image_prompt, cover_image_url,
        );
    }

    pub fn is_empty(&self) -> bool {
        *self == Draft::default()
    }

    /// A field counts as set when it is present and not an empty string or list.
    pub fn is_set(&self, field: &str) -> bool {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        match value.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(_) => true,
        }
    }

    /// The topic the user wants to write about. Either field is accepted.
    pub fn idea(&self) -> &str {
        non_empty(&self.selected_idea)
            .or_else(|| non_empty(&self.focus_or_niche))
            .unwrap_or("")
    }

    pub fn niche(&self) -> &str {
        non_empty(&self.focus_or_niche)
            .or_else(|| non_empty(&self.selected_idea))
            .unwrap_or("")
    }

    pub fn language_or_default(&self) -> &str {
        non_empty(&self.language).unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn tone_or_default(&self) -> &str {
        non_empty(&self.tone).unwrap_or(DEFAULT_TONE)
    }

    pub fn creativity_or_default(&self) -> &str {
        non_empty(&self.creativity).unwrap_or(DEFAULT_CREATIVITY)
    }

    pub fn text(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or("")
    }
}

pub type SubscriptionId = u64;
type Listener = Arc<dyn Fn(&Draft) + Send + Sync>;

struct DraftInner {
    state: RwLock<Draft>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

/// Process-wide draft state shared by every wizard step. Cloning the handle
/// shares the same state. Nothing is persisted across restarts.
#[derive(Clone)]
pub struct DraftStore {
    inner: Arc<DraftInner>,
}

impl Default for DraftStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DraftStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftStore").field("state", &self.load()).finish()
    }
}

impl DraftStore {
    pub fn new() -> Self {
        Self::with_draft(Draft::default())
    }

    pub fn with_draft(draft: Draft) -> Self {
        Self {
            inner: Arc::new(DraftInner {
                state: RwLock::new(draft),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn load(&self) -> Draft {
        self.inner
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn save(&self, patch: Draft) -> Draft {
        let next = {
            let mut state = self.inner.state.write().unwrap_or_else(|e| e.into_inner());
            let mut next = state.clone();
            next.merge(patch);
            *state = next.clone();
            next
        };
        self.notify(&next);
        next
    }

    pub fn clear(&self) {
        {
            let mut state = self.inner.state.write().unwrap_or_else(|e| e.into_inner());
            *state = Draft::default();
        }
        self.notify(&Draft::default());
    }

    /// Loads the draft, failing on the first listed field that is unset.
    pub fn require(&self, fields: &[&str]) -> Result<Draft> {
        let draft = self.load();
        for field in fields {
            if !draft.is_set(field) {
                return Err(anyhow!("Missing draft field: {}", field));
            }
        }
        Ok(draft)
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Draft) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(existing, _)| *existing != id);
    }

    fn notify(&self, draft: &Draft) {
        // Snapshot so a listener may call back into the store.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(draft);
        }
    }
}

/// Data handed from the generated-post view to the preview/editor view.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct PreviewPayload {
    pub title: String,
    #[serde(rename = "heroUrl")]
    pub hero_url: String,
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog_id: Option<String>,
}

#[derive(Clone, Default, Debug)]
pub struct PreviewStore {
    slot: Arc<RwLock<Option<PreviewPayload>>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, data: PreviewPayload) -> PreviewPayload {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(data.clone());
        data
    }

    pub fn get(&self) -> Option<PreviewPayload> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// Everything a screen needs, passed down explicitly.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub drafts: DraftStore,
    pub preview: PreviewStore,
    pub api: Arc<dyn BlogApi>,
    pub auth: Arc<AuthStore>,
}

impl AppState {
    pub fn new(config: Config, api: Arc<dyn BlogApi>, auth: Arc<AuthStore>) -> Self {
        Self {
            config,
            drafts: DraftStore::new(),
            preview: PreviewStore::new(),
            api,
            auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch_title(title: &str) -> Draft {
        Draft {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_save_is_shallow_merge_last_write_wins() {
        let store = DraftStore::new();
        store.save(Draft {
            tone: Some("Casual".into()),
            title: Some("First".into()),
            ..Default::default()
        });
        let merged = store.save(Draft {
            title: Some("Second".into()),
            outline: Some(vec!["a".into()]),
            ..Default::default()
        });

        assert_eq!(merged.tone.as_deref(), Some("Casual"));
        assert_eq!(merged.title.as_deref(), Some("Second"));
        assert_eq!(merged.outline, Some(vec!["a".to_string()]));
        assert_eq!(store.load(), merged);
    }

    #[test]
    fn test_load_returns_copy() {
        let store = DraftStore::new();
        store.save(patch_title("Original"));

        let mut copy = store.load();
        copy.title = Some("Mutated".into());
        copy.tone = Some("Casual".into());

        let fresh = store.load();
        assert_eq!(fresh.title.as_deref(), Some("Original"));
        assert!(fresh.tone.is_none());
    }

    #[test]
    fn test_clear_resets_and_notifies() {
        let store = DraftStore::new();
        store.save(Draft {
            title: Some("T".into()),
            outline: Some(vec!["x".into()]),
            cover_image_url: Some("http://img".into()),
            ..Default::default()
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        store.subscribe(move |d| seen_clone.lock().unwrap().push(d.clone()));

        store.clear();
        assert!(store.load().is_empty());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_empty());
    }

    #[test]
    fn test_subscribers_receive_full_draft_in_call_order() {
        let store = DraftStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let id = store.subscribe(move |d| seen_clone.lock().unwrap().push(d.clone()));

        store.save(Draft {
            tone: Some("Casual".into()),
            ..Default::default()
        });
        store.save(patch_title("T"));
        store.unsubscribe(id);
        store.save(patch_title("ignored"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        // second notification carries the whole draft, not just the patch
        assert_eq!(seen[1].tone.as_deref(), Some("Casual"));
        assert_eq!(seen[1].title.as_deref(), Some("T"));
    }

    #[test]
    fn test_listener_may_reenter_store() {
        let store = DraftStore::new();
        let inner = store.clone();
        store.subscribe(move |d| {
            if d.title.as_deref() == Some("T") && d.intro_md.is_none() {
                inner.save(Draft {
                    intro_md: Some("auto".into()),
                    ..Default::default()
                });
            }
        });
        store.save(patch_title("T"));
        assert_eq!(store.load().intro_md.as_deref(), Some("auto"));
    }

    #[test]
    fn test_require_reports_missing_field() {
        let store = DraftStore::new();
        store.save(Draft {
            title: Some("T".into()),
            intro_md: Some("".into()),
            ..Default::default()
        });
        assert!(store.require(&["title"]).is_ok());
        let err = store.require(&["title", "intro_md"]).unwrap_err();
        assert_eq!(err.to_string(), "Missing draft field: intro_md");
    }

    #[test]
    fn test_draft_serializes_without_unset_keys() {
        let draft = Draft {
            title_mode: Some(EditorMode::Manual),
            outline_options: Some(vec![vec!["a".into(), "b".into()]]),
            ..Default::default()
        };
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"title_mode": "manual", "outline_options": [["a", "b"]]})
        );
    }

    #[test]
    fn test_idea_falls_back_to_niche() {
        let draft = Draft {
            focus_or_niche: Some("Rust".into()),
            selected_idea: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(draft.idea(), "Rust");
        assert_eq!(draft.tone_or_default(), "Formal");
        assert_eq!(draft.creativity_or_default(), "Regular");
    }

    #[test]
    fn test_preview_store_single_slot() {
        let store = PreviewStore::new();
        assert!(store.get().is_none());
        store.set(PreviewPayload {
            title: "A".into(),
            ..Default::default()
        });
        store.set(PreviewPayload {
            title: "B".into(),
            ..Default::default()
        });
        assert_eq!(store.get().unwrap().title, "B");
        store.clear();
        assert!(store.get().is_none());
    }
}
