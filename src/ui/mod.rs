use leptos::*;
use std::sync::Arc;

use crate::core::config::Config;
use crate::core::io::{Storage, WebStorage};
use crate::core::state::{AppState, Draft};
use crate::services::api::{ApiClient, AuthStore, HttpBlogApi};
use crate::services::generate::{details_patch, review_summary, BlogDetails, OutlineItem};
use crate::services::wizard::{can_advance, indicator, Navigator, StepState, WizardStep};

async fn init_state() -> anyhow::Result<AppState> {
    let config = Config::default();
    let storage: Arc<dyn Storage> = Arc::new(WebStorage::new().await?);
    let auth = Arc::new(AuthStore::new(storage, &config.storage_folder));
    auth.restore().await?;
    let client = ApiClient::new(&config.api, auth.clone())?;
    Ok(AppState::new(config, Arc::new(HttpBlogApi::new(client)), auth))
}

#[component]
pub fn App() -> impl IntoView {
    let (state, set_state) = create_signal(None::<Result<AppState, String>>);

    create_effect(move |_| {
        spawn_local(async move {
            let res = init_state().await.map_err(|e| e.to_string());
            set_state.set(Some(res));
        });
    });

    view! {
        <div class="app-container">
            <h1>"Blogsmith"</h1>
            {move || match state.get() {
                Some(Ok(app)) => view! { <Wizard app=app/> }.into_view(),
                Some(Err(e)) => view! { <p>"Error loading storage: " {e}</p> }.into_view(),
                None => view! { <p>"Loading..."</p> }.into_view()
            }}
        </div>
    }
}

#[component]
pub fn Wizard(app: AppState) -> impl IntoView {
    let drafts = app.drafts.clone();
    let (draft, set_draft) = create_signal(drafts.load());
    let subscription = drafts.subscribe(move |d| set_draft.set(d.clone()));
    let store = drafts.clone();
    on_cleanup(move || store.unsubscribe(subscription));

    let (nav, set_nav) = create_signal(Navigator::new());
    let current = Signal::derive(move || nav.get().current());

    let on_jump = Callback::new(move |step: WizardStep| set_nav.update(|n| n.jump_to(step)));
    let on_back = move |_: ev::MouseEvent| set_nav.update(|n| {
        n.back();
    });
    let next_store = drafts.clone();
    let on_next = move |_: ev::MouseEvent| {
        let latest = next_store.load();
        set_nav.update(|n| {
            n.advance(&latest);
        });
    };

    let about_store = drafts.clone();
    let on_about = move |ev: ev::Event| {
        let mut details = BlogDetails::from_draft(&about_store.load());
        details.about = event_target_value(&ev);
        about_store.save(details_patch(&details));
    };

    view! {
        <StepIndicator current=current draft=draft on_jump=on_jump/>
        <Show when=move || current.get() == WizardStep::Details>
            <label>
                "What is the blog about? "
                <input
                    type="text"
                    prop:value=move || draft.get().idea().to_string()
                    on:change=on_about.clone()
                />
            </label>
        </Show>
        <DraftPanel draft=draft/>
        <div class="wizard-controls">
            <button on:click=on_back disabled=move || current.get().index() == 0>"Back"</button>
            <button
                on:click=on_next
                disabled=move || !can_advance(current.get(), &draft.get())
            >
                "Next"
            </button>
        </div>
    }
}

#[component]
pub fn StepIndicator(
    #[prop(into)] current: Signal<WizardStep>,
    #[prop(into)] draft: Signal<Draft>,
    on_jump: Callback<WizardStep>,
) -> impl IntoView {
    view! {
        <ol class="step-indicator">
            {move || {
                indicator(current.get(), &draft.get())
                    .into_iter()
                    .map(|(step, state)| {
                        let class = match state {
                            StepState::Done => "step done",
                            StepState::Active => "step active",
                            StepState::Unlocked => "step unlocked",
                            StepState::Locked => "step locked",
                        };
                        view! {
                            <li class=class>
                                <button
                                    disabled=state == StepState::Locked
                                    on:click=move |_| on_jump.call(step)
                                >
                                    {step.index() + 1} ". " {step.label()}
                                </button>
                            </li>
                        }
                    })
                    .collect_view()
            }}
        </ol>
    }
}

#[component]
pub fn DraftPanel(#[prop(into)] draft: Signal<Draft>) -> impl IntoView {
    view! {
        <div class="draft-panel">
            {move || {
                let draft = draft.get();
                review_summary(&draft)
                    .into_iter()
                    .map(|section| {
                        let fields = section
                            .fields
                            .into_iter()
                            .map(|(label, value)| {
                                let value = if value.trim().is_empty() { "-".to_string() } else { value };
                                view! { <p><strong>{label} ": "</strong>{value}</p> }
                            })
                            .collect_view();
                        view! {
                            <section>
                                <h3>{section.heading}</h3>
                                {fields}
                                <OutlineList items=section.outline/>
                            </section>
                        }
                    })
                    .collect_view()
            }}
        </div>
    }
}

#[component]
fn OutlineList(items: Vec<OutlineItem>) -> impl IntoView {
    if items.is_empty() {
        return ().into_view();
    }
    view! {
        <ul>
            {items
                .into_iter()
                .map(|item| match item {
                    OutlineItem::Line(line) => view! { <li>{line}</li> }.into_view(),
                    OutlineItem::Nested(lines) => view! {
                        <li>
                            <ul>{lines.into_iter().map(|l| view! { <li>{l}</li> }).collect_view()}</ul>
                        </li>
                    }
                    .into_view(),
                })
                .collect_view()}
        </ul>
    }
    .into_view()
}
