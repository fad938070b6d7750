use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info};
use regex::Regex;
use std::sync::OnceLock;

use crate::core::state::{Draft, DraftStore, EditorMode};
use crate::services::api::{ApiBounds, ApiError, BlogApi};
use crate::services::models::GenerationContext;

#[derive(Debug, Clone, PartialEq)]
pub enum EditorState<T> {
    Ai { items: Vec<T>, selected: usize },
    Manual { value: T },
}

/// Active value of an editor: the selected candidate, or the typed value.
pub fn resolve<T: Clone + Default>(state: &EditorState<T>) -> T {
    match state {
        EditorState::Ai { items, selected } => items.get(*selected).cloned().unwrap_or_default(),
        EditorState::Manual { value } => value.clone(),
    }
}

fn outline_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\-\*\d\.\)\s]+").expect("outline marker pattern"))
}

/// One outline entry per non-empty line, with list markers stripped.
pub fn parse_outline(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .map(|line| outline_prefix().replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Request body shared by the title, intro and outline generators.
pub fn generation_context(draft: &Draft) -> GenerationContext {
    GenerationContext {
        tone: draft.tone_or_default().to_string(),
        creativity: draft.creativity_or_default().to_string(),
        focus_or_niche: draft.niche().to_string(),
        targeted_keyword: Draft::text(&draft.targeted_keyword).to_string(),
        targeted_audience: Draft::text(&draft.targeted_audience).to_string(),
        reference_links: Draft::text(&draft.reference_links).to_string(),
        selected_idea: draft.idea().to_string(),
        title: None,
        intro_md: None,
    }
}

/// A draft field edited through a list of AI candidates or a manual value.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait OptionField: Default + ApiBounds {
    type Value: Clone + Default + PartialEq + std::fmt::Debug + ApiBounds;

    const NAME: &'static str;
    const PRECONDITION_MESSAGE: &'static str;
    const FAILURE_MESSAGE: &'static str;

    fn mode(draft: &Draft) -> Option<EditorMode>;
    fn options(draft: &Draft) -> Option<Vec<Self::Value>>;
    fn selected_idx(draft: &Draft) -> Option<usize>;
    fn value(draft: &Draft) -> Option<Self::Value>;
    fn patch(
        value: Self::Value,
        mode: EditorMode,
        options: Vec<Self::Value>,
        selected: usize,
    ) -> Draft;

    /// Upstream fields this generator depends on are present.
    fn ready(draft: &Draft) -> bool;
    fn context(draft: &Draft) -> GenerationContext;

    fn is_blank(value: &Self::Value) -> bool;
    fn to_text(value: &Self::Value) -> String;
    fn parse_text(text: &str) -> Self::Value;

    async fn fetch(
        &self,
        api: &dyn BlogApi,
        ctx: &GenerationContext,
    ) -> Result<Vec<Self::Value>, ApiError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TitleField;

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl OptionField for TitleField {
    type Value = String;

    const NAME: &'static str = "title";
    const PRECONDITION_MESSAGE: &'static str = "Please complete blog details first.";
    const FAILURE_MESSAGE: &'static str = "Failed to generate titles.";

    fn mode(draft: &Draft) -> Option<EditorMode> {
        draft.title_mode
    }
    fn options(draft: &Draft) -> Option<Vec<String>> {
        draft.title_options.clone()
    }
    fn selected_idx(draft: &Draft) -> Option<usize> {
        draft.title_selected_idx
    }
    fn value(draft: &Draft) -> Option<String> {
        draft.title.clone()
    }
    fn patch(value: String, mode: EditorMode, options: Vec<String>, selected: usize) -> Draft {
        Draft {
            title: Some(value),
            title_mode: Some(mode),
            title_options: Some(options),
            title_selected_idx: Some(selected),
            ..Default::default()
        }
    }

    fn ready(draft: &Draft) -> bool {
        !draft.idea().is_empty()
    }
    fn context(draft: &Draft) -> GenerationContext {
        generation_context(draft)
    }

    fn is_blank(value: &String) -> bool {
        value.trim().is_empty()
    }
    fn to_text(value: &String) -> String {
        value.clone()
    }
    fn parse_text(text: &str) -> String {
        text.to_string()
    }

    async fn fetch(
        &self,
        api: &dyn BlogApi,
        ctx: &GenerationContext,
    ) -> Result<Vec<String>, ApiError> {
        api.generate_titles(ctx).await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IntroField;

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl OptionField for IntroField {
    type Value = String;

    const NAME: &'static str = "intro_md";
    const PRECONDITION_MESSAGE: &'static str = "Please complete blog details and title first.";
    const FAILURE_MESSAGE: &'static str = "Failed to generate introductions.";

    fn mode(draft: &Draft) -> Option<EditorMode> {
        draft.intro_mode
    }
    fn options(draft: &Draft) -> Option<Vec<String>> {
        draft.intro_options.clone()
    }
    fn selected_idx(draft: &Draft) -> Option<usize> {
        draft.intro_selected_idx
    }
    fn value(draft: &Draft) -> Option<String> {
        draft.intro_md.clone()
    }
    fn patch(value: String, mode: EditorMode, options: Vec<String>, selected: usize) -> Draft {
        Draft {
            intro_md: Some(value),
            intro_mode: Some(mode),
            intro_options: Some(options),
            intro_selected_idx: Some(selected),
            ..Default::default()
        }
    }

    fn ready(draft: &Draft) -> bool {
        !draft.idea().is_empty() && filled(&draft.title)
    }
    fn context(draft: &Draft) -> GenerationContext {
        GenerationContext {
            title: draft.title.clone(),
            ..generation_context(draft)
        }
    }

    fn is_blank(value: &String) -> bool {
        value.trim().is_empty()
    }
    fn to_text(value: &String) -> String {
        value.clone()
    }
    fn parse_text(text: &str) -> String {
        text.to_string()
    }

    async fn fetch(
        &self,
        api: &dyn BlogApi,
        ctx: &GenerationContext,
    ) -> Result<Vec<String>, ApiError> {
        api.generate_intros(ctx).await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OutlineField;

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl OptionField for OutlineField {
    type Value = Vec<String>;

    const NAME: &'static str = "outline";
    const PRECONDITION_MESSAGE: &'static str =
        "Please complete blog details, title, and intro first.";
    const FAILURE_MESSAGE: &'static str = "Failed to generate outlines.";

    fn mode(draft: &Draft) -> Option<EditorMode> {
        draft.outline_mode
    }
    fn options(draft: &Draft) -> Option<Vec<Vec<String>>> {
        draft.outline_options.clone()
    }
    fn selected_idx(draft: &Draft) -> Option<usize> {
        draft.outline_selected_idx
    }
    fn value(draft: &Draft) -> Option<Vec<String>> {
        draft.outline.clone()
    }
    fn patch(
        value: Vec<String>,
        mode: EditorMode,
        options: Vec<Vec<String>>,
        selected: usize,
    ) -> Draft {
        Draft {
            outline: Some(value),
            outline_mode: Some(mode),
            outline_options: Some(options),
            outline_selected_idx: Some(selected),
            ..Default::default()
        }
    }

    fn ready(draft: &Draft) -> bool {
        !draft.idea().is_empty() && filled(&draft.title) && filled(&draft.intro_md)
    }
    fn context(draft: &Draft) -> GenerationContext {
        GenerationContext {
            title: draft.title.clone(),
            intro_md: draft.intro_md.clone(),
            ..generation_context(draft)
        }
    }

    fn is_blank(value: &Vec<String>) -> bool {
        value.iter().all(|l| l.trim().is_empty())
    }
    fn to_text(value: &Vec<String>) -> String {
        value.join("\n")
    }
    fn parse_text(text: &str) -> Vec<String> {
        parse_outline(text)
    }

    async fn fetch(
        &self,
        api: &dyn BlogApi,
        ctx: &GenerationContext,
    ) -> Result<Vec<Vec<String>>, ApiError> {
        api.generate_outlines(ctx).await
    }
}

/// Dual-mode editor for one option field. The AI list and the manual value are
/// both kept so switching modes never loses either side.
#[derive(Debug, Clone)]
pub struct OptionEditor<F: OptionField> {
    mode: EditorMode,
    items: Vec<F::Value>,
    selected: usize,
    manual: F::Value,
    seeded: bool,
    pub error: Option<String>,
    pub busy: bool,
}

impl<F: OptionField> Default for OptionEditor<F> {
    fn default() -> Self {
        Self {
            mode: EditorMode::Ai,
            items: Vec::new(),
            selected: 0,
            manual: F::Value::default(),
            seeded: false,
            error: None,
            busy: false,
        }
    }
}

pub type TitleEditor = OptionEditor<TitleField>;
pub type IntroEditor = OptionEditor<IntroField>;
pub type OutlineEditor = OptionEditor<OutlineField>;

impl<F: OptionField> OptionEditor<F> {
    /// Rebuilds the editor from what an earlier visit left in the draft.
    pub fn restore(draft: &Draft) -> Self {
        let mode = F::mode(draft).unwrap_or_default();
        let mut items = F::options(draft).unwrap_or_default();
        let value = F::value(draft).filter(|v| !F::is_blank(v));

        let mut selected = F::selected_idx(draft)
            .filter(|idx| *idx < items.len())
            .or_else(|| {
                value
                    .as_ref()
                    .and_then(|v| items.iter().position(|item| item == v))
            })
            .unwrap_or(0);

        if mode == EditorMode::Ai && items.is_empty() {
            if let Some(v) = value.clone() {
                items = vec![v];
                selected = 0;
            }
        }

        let manual = match mode {
            EditorMode::Manual => value.unwrap_or_default(),
            EditorMode::Ai => F::Value::default(),
        };

        Self {
            mode,
            items,
            selected,
            manual,
            seeded: mode == EditorMode::Manual,
            error: None,
            busy: false,
        }
    }

    pub fn state(&self) -> EditorState<F::Value> {
        match self.mode {
            EditorMode::Ai => EditorState::Ai {
                items: self.items.clone(),
                selected: self.selected,
            },
            EditorMode::Manual => EditorState::Manual {
                value: self.manual.clone(),
            },
        }
    }

    pub fn value(&self) -> F::Value {
        resolve(&self.state())
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn items(&self) -> &[F::Value] {
        &self.items
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn manual(&self) -> &F::Value {
        &self.manual
    }

    /// Validates upstream fields and asks the server for fresh candidates.
    /// Borrows nothing from the editor, so several may be in flight.
    pub async fn request(api: &dyn BlogApi, draft: &Draft) -> Result<Vec<F::Value>> {
        if !F::ready(draft) {
            return Err(anyhow!(F::PRECONDITION_MESSAGE));
        }
        let ctx = F::context(draft);
        debug!("Requesting {} options for '{}'", F::NAME, ctx.selected_idea);

        match F::default().fetch(api, &ctx).await {
            Ok(items) if items.is_empty() => Err(anyhow!(F::FAILURE_MESSAGE)),
            Ok(items) => Ok(items),
            Err(e) => Err(e.for_action(F::FAILURE_MESSAGE)),
        }
    }

    /// Applies a finished request. Failures leave the list, selection and
    /// manual value as they were.
    pub fn apply(&mut self, result: Result<Vec<F::Value>>, drafts: &DraftStore) {
        self.busy = false;
        match result {
            Ok(items) => {
                info!("Received {} {} options", items.len(), F::NAME);
                self.items = items;
                self.selected = 0;
                self.error = None;
                self.persist(drafts);
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    pub async fn generate(&mut self, api: &dyn BlogApi, drafts: &DraftStore) {
        self.busy = true;
        self.error = None;
        let draft = drafts.load();
        let result = Self::request(api, &draft).await;
        self.apply(result, drafts);
    }

    pub fn select(&mut self, idx: usize, drafts: &DraftStore) -> Result<()> {
        if idx >= self.items.len() {
            return Err(anyhow!("Option {} does not exist", idx + 1));
        }
        self.selected = idx;
        self.persist(drafts);
        Ok(())
    }

    /// Overwrites the selected candidate in place.
    pub fn edit_selected(&mut self, value: F::Value, drafts: &DraftStore) -> Result<()> {
        let slot = self
            .items
            .get_mut(self.selected)
            .ok_or_else(|| anyhow!("No {} option is selected", F::NAME))?;
        *slot = value;
        self.persist(drafts);
        Ok(())
    }

    pub fn edit_selected_text(&mut self, text: &str, drafts: &DraftStore) -> Result<()> {
        self.edit_selected(F::parse_text(text), drafts)
    }

    pub fn set_mode(&mut self, mode: EditorMode, drafts: &DraftStore) {
        if mode == EditorMode::Manual && self.mode == EditorMode::Ai && !self.seeded {
            self.manual = self.value();
            self.seeded = true;
        }
        self.mode = mode;
        self.persist(drafts);
    }

    pub fn set_manual(&mut self, value: F::Value, drafts: &DraftStore) {
        self.manual = value;
        self.seeded = true;
        self.persist(drafts);
    }

    pub fn set_manual_text(&mut self, text: &str, drafts: &DraftStore) {
        self.set_manual(F::parse_text(text), drafts);
    }

    pub fn persist(&self, drafts: &DraftStore) -> Draft {
        drafts.save(F::patch(
            self.value(),
            self.mode,
            self.items.clone(),
            self.selected,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::MockApi;

    fn ready_draft() -> Draft {
        Draft {
            selected_idea: Some("Rust for web".into()),
            title: Some("Why Rust".into()),
            intro_md: Some("Intro".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_outline_strips_markers() {
        let text = "1. Intro\r\n- Body\n\n  * Tail  \n2) Done\n---";
        assert_eq!(parse_outline(text), vec!["Intro", "Body", "Tail", "Done"]);
        // marker-free lines pass through trimmed
        assert_eq!(parse_outline("  Alpha\nBeta "), vec!["Alpha", "Beta"]);
        // digits inside the line are kept
        assert_eq!(parse_outline("3. Top 10 tips"), vec!["Top 10 tips"]);
    }

    #[test]
    fn test_parse_outline_is_stable_on_its_own_output() {
        let once = parse_outline("1. A\n2. B\n\n- C");
        assert_eq!(parse_outline(&once.join("\n")), once);
    }

    #[test]
    fn test_resolve() {
        let ai = EditorState::Ai {
            items: vec!["a".to_string(), "b".to_string()],
            selected: 1,
        };
        assert_eq!(resolve(&ai), "b");
        let manual = EditorState::Manual {
            value: "typed".to_string(),
        };
        assert_eq!(resolve(&manual), "typed");
        let empty: EditorState<String> = EditorState::Ai {
            items: vec![],
            selected: 0,
        };
        assert_eq!(resolve(&empty), "");
    }

    #[tokio::test]
    async fn test_generate_replaces_list_and_resets_selection() {
        let api = MockApi::new();
        api.set_options(&["one", "two", "three"]);
        let drafts = DraftStore::with_draft(ready_draft());

        let mut editor = TitleEditor::default();
        editor.generate(&api, &drafts).await;
        editor.select(2, &drafts).unwrap();

        api.set_options(&["x", "y"]);
        editor.generate(&api, &drafts).await;
        assert_eq!(editor.selected(), 0);
        assert_eq!(editor.items(), &["x".to_string(), "y".to_string()]);

        let draft = drafts.load();
        assert_eq!(draft.title.as_deref(), Some("x"));
        assert_eq!(draft.title_selected_idx, Some(0));
        assert_eq!(draft.title_mode, Some(EditorMode::Ai));
    }

    #[tokio::test]
    async fn test_zero_candidates_is_an_error() {
        let api = MockApi::new();
        api.set_options(&[]);
        let drafts = DraftStore::with_draft(ready_draft());
        let mut editor = IntroEditor::default();
        editor.generate(&api, &drafts).await;
        assert_eq!(editor.error.as_deref(), Some("Failed to generate introductions."));
        assert!(editor.items().is_empty());
    }

    #[tokio::test]
    async fn test_precondition_blocks_network_call() {
        let api = MockApi::new();
        let drafts = DraftStore::with_draft(Draft {
            selected_idea: Some("x".into()),
            ..Default::default()
        });
        let mut editor = OutlineEditor::default();
        editor.generate(&api, &drafts).await;
        assert_eq!(
            editor.error.as_deref(),
            Some("Please complete blog details, title, and intro first.")
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_state() {
        let api = MockApi::new();
        api.set_options(&["keep me"]);
        let drafts = DraftStore::with_draft(ready_draft());
        let mut editor = TitleEditor::default();
        editor.generate(&api, &drafts).await;

        api.fail_generation(ApiError::Server {
            status: 500,
            message: "Model overloaded".into(),
        });
        editor.generate(&api, &drafts).await;
        assert_eq!(editor.error.as_deref(), Some("Model overloaded"));
        assert_eq!(editor.items(), &["keep me".to_string()]);
        assert_eq!(drafts.load().title.as_deref(), Some("keep me"));

        api.fail_generation(ApiError::Transport("connection refused".into()));
        editor.generate(&api, &drafts).await;
        assert_eq!(editor.error.as_deref(), Some("Failed to generate titles."));
    }

    #[tokio::test]
    async fn test_context_carries_upstream_values_and_defaults() {
        let api = MockApi::new();
        api.set_outlines(vec![vec!["A".into(), "B".into()]]);
        let drafts = DraftStore::with_draft(Draft {
            focus_or_niche: Some("Rust for web".into()),
            title: Some("Why Rust".into()),
            intro_md: Some("Intro".into()),
            ..Default::default()
        });
        let mut editor = OutlineEditor::default();
        editor.generate(&api, &drafts).await;

        let ctx = api.last_context().unwrap();
        assert_eq!(ctx.tone, "Formal");
        assert_eq!(ctx.creativity, "Regular");
        assert_eq!(ctx.selected_idea, "Rust for web");
        assert_eq!(ctx.title.as_deref(), Some("Why Rust"));
        assert_eq!(ctx.intro_md.as_deref(), Some("Intro"));
        assert_eq!(drafts.load().outline, Some(vec!["A".into(), "B".into()]));
    }

    #[tokio::test]
    async fn test_last_resolved_request_wins() {
        let api = MockApi::new();
        let drafts = DraftStore::with_draft(ready_draft());
        let draft = drafts.load();

        api.set_options(&["first"]);
        let first = TitleEditor::request(&api, &draft).await;
        api.set_options(&["second"]);
        let second = TitleEditor::request(&api, &draft).await;

        let mut editor = TitleEditor::default();
        editor.apply(second, &drafts);
        editor.apply(first, &drafts);
        assert_eq!(drafts.load().title.as_deref(), Some("first"));
    }

    #[test]
    fn test_select_out_of_range_is_rejected() {
        let drafts = DraftStore::new();
        let mut editor = TitleEditor::restore(&Draft {
            title_options: Some(vec!["a".into()]),
            ..Default::default()
        });
        assert!(editor.select(3, &drafts).is_err());
        assert!(drafts.load().is_empty());
    }

    #[test]
    fn test_edit_selected_mutates_in_place() {
        let drafts = DraftStore::new();
        let mut editor = OutlineEditor::restore(&Draft {
            outline_options: Some(vec![vec!["a".into()], vec!["b".into()]]),
            outline_selected_idx: Some(1),
            ..Default::default()
        });
        editor.edit_selected_text("1. X\n2. Y", &drafts).unwrap();
        assert_eq!(editor.items().len(), 2);
        assert_eq!(editor.items()[1], vec!["X".to_string(), "Y".to_string()]);
        assert_eq!(drafts.load().outline, Some(vec!["X".into(), "Y".into()]));
    }

    #[test]
    fn test_manual_seeded_once_then_independent() {
        let drafts = DraftStore::new();
        let mut editor = TitleEditor::restore(&Draft {
            title_options: Some(vec!["AI title".into(), "Other".into()]),
            title_selected_idx: Some(0),
            title: Some("AI title".into()),
            ..Default::default()
        });

        editor.set_mode(EditorMode::Manual, &drafts);
        assert_eq!(editor.manual(), "AI title");
        editor.set_manual("Typed".into(), &drafts);
        assert_eq!(drafts.load().title.as_deref(), Some("Typed"));

        editor.set_mode(EditorMode::Ai, &drafts);
        editor.select(1, &drafts).unwrap();
        assert_eq!(drafts.load().title.as_deref(), Some("Other"));

        editor.set_mode(EditorMode::Manual, &drafts);
        assert_eq!(editor.manual(), "Typed");
        assert_eq!(drafts.load().title_mode, Some(EditorMode::Manual));
    }

    #[test]
    fn test_restore_outline_matches_value_in_options() {
        let draft = Draft {
            outline: Some(vec!["b".into()]),
            outline_options: Some(vec![vec!["a".into()], vec!["b".into()]]),
            ..Default::default()
        };
        let editor = OutlineEditor::restore(&draft);
        assert_eq!(editor.selected(), 1);
        assert_eq!(editor.value(), vec!["b".to_string()]);
    }

    #[test]
    fn test_restore_ai_value_without_options() {
        let draft = Draft {
            intro_md: Some("Existing intro".into()),
            ..Default::default()
        };
        let editor = IntroEditor::restore(&draft);
        assert_eq!(editor.items(), &["Existing intro".to_string()]);
        assert_eq!(editor.value(), "Existing intro");

        let manual = IntroEditor::restore(&Draft {
            intro_md: Some("Mine".into()),
            intro_mode: Some(EditorMode::Manual),
            ..Default::default()
        });
        assert_eq!(manual.state(), EditorState::Manual { value: "Mine".into() });
    }
}
