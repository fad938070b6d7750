use crate::core::state::Draft;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WizardStep {
    Details,
    Title,
    Intro,
    Outline,
    Image,
    Review,
}

pub const GENERATED_PATH: &str = "/create-blog/generated";

pub const STEPS: [(WizardStep, &str, &str); 6] = [
    (WizardStep::Details, "Details of Blog", "/create-blog"),
    (WizardStep::Title, "Blog Title", "/create-blog/title"),
    (WizardStep::Intro, "Introduction", "/create-blog/intro"),
    (WizardStep::Outline, "Outlined", "/create-blog/outline"),
    (WizardStep::Image, "Image", "/create-blog/image"),
    (WizardStep::Review, "Verify Content", "/create-blog/review"),
];

impl WizardStep {
    pub const ALL: [WizardStep; 6] = [
        WizardStep::Details,
        WizardStep::Title,
        WizardStep::Intro,
        WizardStep::Outline,
        WizardStep::Image,
        WizardStep::Review,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        STEPS[self.index()].1
    }

    pub fn path(self) -> &'static str {
        STEPS[self.index()].2
    }

    pub fn is_last(self) -> bool {
        self.index() == STEPS.len() - 1
    }

    pub fn last() -> Self {
        WizardStep::Review
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Position of `path` in the step table. Anything unmatched (including the
/// generated-post view) maps to `fallback`.
pub fn current_index(path: &str, fallback: usize) -> usize {
    let path = normalize_path(path);
    STEPS
        .iter()
        .position(|(_, _, p)| *p == path)
        .unwrap_or(fallback)
}

fn matched_index(path: &str) -> Option<usize> {
    let path = normalize_path(path);
    STEPS.iter().position(|(_, _, p)| *p == path)
}

pub fn next(path: &str) -> Option<&'static str> {
    let idx = matched_index(path)?;
    STEPS.get(idx + 1).map(|(_, _, p)| *p)
}

pub fn previous(path: &str) -> Option<&'static str> {
    let idx = matched_index(path)?;
    if idx == 0 {
        return None;
    }
    Some(STEPS[idx - 1].2)
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Business rule for leaving `step` through the Next control.
pub fn can_advance(step: WizardStep, draft: &Draft) -> bool {
    match step {
        WizardStep::Details => !draft.idea().is_empty(),
        WizardStep::Title => filled(&draft.title),
        WizardStep::Intro => filled(&draft.intro_md),
        WizardStep::Outline => draft
            .outline
            .as_ref()
            .is_some_and(|o| o.iter().any(|l| !l.trim().is_empty())),
        WizardStep::Image => filled(&draft.cover_image_url),
        WizardStep::Review => false,
    }
}

/// First step whose requirements are not yet met. Review when everything is.
pub fn furthest_unlocked(draft: &Draft) -> WizardStep {
    WizardStep::ALL
        .into_iter()
        .find(|step| !can_advance(*step, draft))
        .unwrap_or(WizardStep::Review)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Done,
    Active,
    Unlocked,
    Locked,
}

/// Indicator styling for every step, given where the user stands.
pub fn indicator(current: WizardStep, draft: &Draft) -> Vec<(WizardStep, StepState)> {
    let unlocked = furthest_unlocked(draft).max(current);
    WizardStep::ALL
        .into_iter()
        .map(|step| {
            let state = if step == current {
                StepState::Active
            } else if step < current {
                StepState::Done
            } else if step <= unlocked {
                StepState::Unlocked
            } else {
                StepState::Locked
            };
            (step, state)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    current: WizardStep,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            current: WizardStep::Details,
        }
    }

    pub fn at_path(path: &str) -> Self {
        let idx = current_index(path, STEPS.len() - 1);
        Self {
            current: WizardStep::from_index(idx).unwrap_or(WizardStep::Review),
        }
    }

    pub fn current(&self) -> WizardStep {
        self.current
    }

    /// Moves forward when the current step's rule passes. Returns whether it moved.
    pub fn advance(&mut self, draft: &Draft) -> bool {
        if !can_advance(self.current, draft) {
            return false;
        }
        match next(self.current.path()).map(|p| current_index(p, self.current.index())) {
            Some(idx) => {
                self.current = WizardStep::from_index(idx).unwrap_or(self.current);
                true
            }
            None => false,
        }
    }

    pub fn back(&mut self) -> bool {
        match previous(self.current.path()) {
            Some(p) => {
                let idx = current_index(p, self.current.index());
                self.current = WizardStep::from_index(idx).unwrap_or(self.current);
                true
            }
            None => false,
        }
    }

    /// Direct navigation from the progress indicator. Not gated.
    pub fn jump_to(&mut self, step: WizardStep) {
        self.current = step;
    }
}
