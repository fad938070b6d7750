use anyhow::Result;
use inquire::{Confirm, Editor, Select, Text};

use super::{report, spinner};
use crate::core::state::{AppState, EditorMode};
use crate::services::editor::{IntroField, OptionEditor, OptionField, OutlineField, TitleField};
use crate::services::gallery::{self, CoverPicker, GalleryTab, ImageOptions, DEFAULT_PRIMARY_COLOR};
use crate::services::generate::{
    details_patch, generate_and_save, review_summary, suggest_topics, BlogDetails,
    CREATIVITY_LEVELS, DEFAULT_IDEA_COUNT, LANGUAGES, TONES,
};
use crate::services::models::AspectRatio;
use crate::services::wizard::{furthest_unlocked, indicator, Navigator, StepState, WizardStep};

enum Flow {
    Next,
    Back,
    Jump(WizardStep),
    Exit,
}

const NEXT: &str = "Next";
const BACK: &str = "Back";
const EXIT: &str = "Exit wizard";

fn print_indicator(current: WizardStep, app: &AppState) {
    let steps: Vec<String> = indicator(current, &app.drafts.load())
        .into_iter()
        .map(|(step, state)| {
            let mark = match state {
                StepState::Done => "✓",
                StepState::Active => "●",
                StepState::Unlocked => "○",
                StepState::Locked => "·",
            };
            format!("{} {}", mark, step.label())
        })
        .collect();
    println!("\n{}\n", steps.join("  ›  "));
}

fn navigation(action: &str) -> Option<Flow> {
    match action {
        NEXT => Some(Flow::Next),
        BACK => Some(Flow::Back),
        EXIT => Some(Flow::Exit),
        _ => None,
    }
}

pub async fn run(app: &AppState) -> Result<()> {
    let mut nav = Navigator::new();
    let draft = app.drafts.load();
    if !draft.is_empty() {
        if Confirm::new("Continue the blog you were working on?")
            .with_default(true)
            .prompt()?
        {
            nav.jump_to(furthest_unlocked(&draft));
        } else {
            app.drafts.clear();
        }
    }

    loop {
        print_indicator(nav.current(), app);
        let flow = match nav.current() {
            WizardStep::Details => details(app).await?,
            WizardStep::Title => option_step::<TitleField>(app, WizardStep::Title, false).await?,
            WizardStep::Intro => option_step::<IntroField>(app, WizardStep::Intro, true).await?,
            WizardStep::Outline => option_step::<OutlineField>(app, WizardStep::Outline, true).await?,
            WizardStep::Image => image(app).await?,
            WizardStep::Review => review(app).await?,
        };

        match flow {
            Flow::Next => {
                if !nav.advance(&app.drafts.load()) {
                    println!("Complete this step before continuing.");
                }
            }
            Flow::Back => {
                if !nav.back() {
                    return Ok(());
                }
            }
            Flow::Jump(step) => nav.jump_to(step),
            Flow::Exit => return Ok(()),
        }
    }
}

fn choose(message: &str, options: &[&str], current: &str) -> Result<String> {
    let cursor = options.iter().position(|o| *o == current).unwrap_or(0);
    Ok(Select::new(message, options.to_vec())
        .with_starting_cursor(cursor)
        .prompt()?
        .to_string())
}

fn text(message: &str, current: &str) -> Result<String> {
    Ok(Text::new(message).with_initial_value(current).prompt()?)
}

async fn details(app: &AppState) -> Result<Flow> {
    let mut details = BlogDetails::from_draft(&app.drafts.load());
    details.language = choose("Language:", &LANGUAGES, &details.language)?;
    details.tone = choose("Tone:", &TONES, &details.tone)?;
    details.creativity = choose("Creativity:", &CREATIVITY_LEVELS, &details.creativity)?;
    details.about = text("What is the blog about?", &details.about)?;
    details.keyword = text("Targeted keywords:", &details.keyword)?;
    details.audience = text("Targeted audience:", &details.audience)?;
    details.references = text("Reference links:", &details.references)?;

    if Confirm::new("Suggest topic ideas?").with_default(false).prompt()? {
        let request = details.ideas_request(&details.about, Some(DEFAULT_IDEA_COUNT));
        let pb = spinner("Generating topic ideas...")?;
        let result = suggest_topics(app.api.as_ref(), &request).await;
        pb.finish_and_clear();
        match result {
            Ok(ideas) if !ideas.is_empty() => {
                if let Some(idea) = Select::new("Pick a topic:", ideas).prompt_skippable()? {
                    details.about = idea;
                }
            }
            Ok(_) => println!("No ideas came back. Try describing the topic differently."),
            Err(e) => report(&e),
        }
    }
    app.drafts.save(details_patch(&details));

    let Some(action) = Select::new("Blog details", vec![NEXT, BACK, EXIT]).prompt_skippable()?
    else {
        return Ok(Flow::Exit);
    };
    Ok(navigation(action).unwrap_or(Flow::Exit))
}

fn preview_line(text: &str) -> String {
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() > 90 {
        format!("{}…", line.chars().take(90).collect::<String>())
    } else {
        line.to_string()
    }
}

fn edit_text(message: &str, current: &str, multiline: bool) -> Result<String> {
    if multiline {
        Ok(Editor::new(message)
            .with_predefined_text(current)
            .with_file_extension(".md")
            .prompt()?)
    } else {
        text(message, current)
    }
}

async fn generate_options<F: OptionField>(editor: &mut OptionEditor<F>, app: &AppState) -> Result<()> {
    let pb = spinner(&format!("Generating {} options...", F::NAME))?;
    editor.generate(app.api.as_ref(), &app.drafts).await;
    pb.finish_and_clear();
    if let Some(e) = &editor.error {
        eprintln!("Error: {}", e);
    }
    Ok(())
}

fn show<F: OptionField>(editor: &OptionEditor<F>) {
    match editor.mode() {
        EditorMode::Ai => {
            for (i, item) in editor.items().iter().enumerate() {
                let mark = if i == editor.selected() { ">" } else { " " };
                println!("{} {}. {}", mark, i + 1, preview_line(&F::to_text(item)));
            }
        }
        EditorMode::Manual => {
            let value = F::to_text(editor.manual());
            if value.trim().is_empty() {
                println!("(nothing written yet)");
            } else {
                println!("{}", value);
            }
        }
    }
}

async fn option_step<F: OptionField>(app: &AppState, step: WizardStep, multiline: bool) -> Result<Flow> {
    const REGENERATE: &str = "Generate new options";
    const CHOOSE: &str = "Choose an option";
    const EDIT_SELECTED: &str = "Edit the selected option";
    const MANUAL: &str = "Write it myself";
    const EDIT_MANUAL: &str = "Edit my text";
    const AI: &str = "Use AI options";

    let mut editor = OptionEditor::<F>::restore(&app.drafts.load());
    if editor.mode() == EditorMode::Ai && editor.items().is_empty() {
        generate_options(&mut editor, app).await?;
    }

    loop {
        show(&editor);
        let mut actions = Vec::new();
        match editor.mode() {
            EditorMode::Ai => {
                actions.push(REGENERATE);
                if !editor.items().is_empty() {
                    actions.extend([CHOOSE, EDIT_SELECTED]);
                }
                actions.push(MANUAL);
            }
            EditorMode::Manual => actions.extend([EDIT_MANUAL, AI]),
        }
        actions.extend([NEXT, BACK, EXIT]);

        let Some(action) = Select::new(step.label(), actions).prompt_skippable()? else {
            return Ok(Flow::Exit);
        };
        if let Some(flow) = navigation(action) {
            editor.persist(&app.drafts);
            return Ok(flow);
        }

        match action {
            REGENERATE => generate_options(&mut editor, app).await?,
            CHOOSE => {
                let labels: Vec<String> = editor
                    .items()
                    .iter()
                    .enumerate()
                    .map(|(i, item)| format!("{}. {}", i + 1, preview_line(&F::to_text(item))))
                    .collect();
                if let Some(choice) = Select::new("Option:", labels)
                    .with_starting_cursor(editor.selected())
                    .raw_prompt_skippable()?
                {
                    editor.select(choice.index, &app.drafts)?;
                }
            }
            EDIT_SELECTED => {
                let current = F::to_text(&editor.value());
                let edited = edit_text("Edit option:", &current, multiline)?;
                if let Err(e) = editor.edit_selected_text(&edited, &app.drafts) {
                    report(&e);
                }
            }
            MANUAL => {
                editor.set_mode(EditorMode::Manual, &app.drafts);
                let current = F::to_text(editor.manual());
                let edited = edit_text("Your text:", &current, multiline)?;
                editor.set_manual_text(&edited, &app.drafts);
            }
            EDIT_MANUAL => {
                let current = F::to_text(editor.manual());
                let edited = edit_text("Your text:", &current, multiline)?;
                editor.set_manual_text(&edited, &app.drafts);
            }
            AI => {
                editor.set_mode(EditorMode::Ai, &app.drafts);
                if editor.items().is_empty() {
                    generate_options(&mut editor, app).await?;
                }
            }
            _ => {}
        }
    }
}

async fn image(app: &AppState) -> Result<Flow> {
    const GENERATE: &str = "Generate an image";
    const UPLOAD: &str = "Upload an image";
    const CHOOSE: &str = "Choose the cover";
    const REMOVE: &str = "Remove the selected image";

    let images = match gallery::list_images(app.api.as_ref(), GalleryTab::All).await {
        Ok(items) => items.into_iter().map(|img| img.image_url).collect(),
        Err(e) => {
            report(&e);
            Vec::new()
        }
    };
    let mut picker = CoverPicker::restore(&app.drafts.load(), images);

    loop {
        match picker.selected() {
            Some(url) => println!("Cover: {}", url),
            None => println!("No cover selected."),
        }
        let mut actions = vec![GENERATE, UPLOAD];
        if !picker.images().is_empty() {
            actions.extend([CHOOSE, REMOVE]);
        }
        actions.extend([NEXT, BACK, EXIT]);

        let Some(action) = Select::new("Header image", actions).prompt_skippable()? else {
            return Ok(Flow::Exit);
        };
        if let Some(flow) = navigation(action) {
            return Ok(flow);
        }

        let result = match action {
            GENERATE => generate_cover(app, &mut picker).await,
            UPLOAD => {
                let path = Text::new("Image file:").prompt()?;
                let pb = spinner("Uploading...")?;
                let result = gallery::upload(app.api.as_ref(), std::path::Path::new(path.trim())).await;
                pb.finish_and_clear();
                result.map(|url| picker.add(&url, &app.drafts))
            }
            CHOOSE => {
                let current = picker.selected().unwrap_or_default().to_string();
                let cursor = picker.images().iter().position(|u| *u == current).unwrap_or(0);
                match Select::new("Cover image:", picker.images().to_vec())
                    .with_starting_cursor(cursor)
                    .prompt_skippable()?
                {
                    Some(url) => picker.select(&url, &app.drafts),
                    None => Ok(()),
                }
            }
            REMOVE => {
                if let Some(url) = picker.selected().map(str::to_string) {
                    picker.remove(&url, &app.drafts);
                }
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            report(&e);
        }
    }
}

async fn generate_cover(app: &AppState, picker: &mut CoverPicker) -> Result<()> {
    let draft = app.drafts.load();
    let prompt = text("Describe the image:", draft.image_prompt.as_deref().unwrap_or(""))?;
    let aspect_ratio = Select::new("Aspect ratio:", AspectRatio::ALL.to_vec())
        .with_starting_cursor(1)
        .prompt()?;
    let primary_color = Text::new("Primary color:")
        .with_default(DEFAULT_PRIMARY_COLOR)
        .prompt()?;
    let options = ImageOptions {
        prompt,
        aspect_ratio,
        primary_color,
        ..Default::default()
    };

    let pb = spinner("Generating image...")?;
    let result = gallery::generate_image(app.api.as_ref(), &app.drafts, &options).await;
    pb.finish_and_clear();
    let image = result?;
    gallery::save_generated(app.api.as_ref(), &image).await?;
    picker.add(&image.image_url, &app.drafts);
    println!("Generated {}", image.image_url);
    Ok(())
}

async fn review(app: &AppState) -> Result<Flow> {
    const GENERATE: &str = "Generate blog";
    const EDIT: &str = "Edit a section";

    let sections = review_summary(&app.drafts.load());
    for section in &sections {
        println!("{}", section.render_text());
    }

    let Some(action) = Select::new("Verify content", vec![GENERATE, EDIT, BACK, EXIT]).prompt_skippable()?
    else {
        return Ok(Flow::Exit);
    };
    match action {
        GENERATE => {
            let pb = spinner("Generating your blog. This can take a minute...")?;
            let result = generate_and_save(app).await;
            pb.finish_and_clear();
            match result {
                Ok(id) => {
                    println!("Blog generated and saved ({}).", id);
                    if Confirm::new("Open it in the editor?").with_default(true).prompt()? {
                        super::preview::run(app, Some(&id)).await?;
                    }
                    Ok(Flow::Exit)
                }
                Err(e) => {
                    report(&e);
                    Ok(Flow::Jump(WizardStep::Review))
                }
            }
        }
        EDIT => {
            let headings: Vec<&str> = sections.iter().map(|s| s.heading).collect();
            match Select::new("Section:", headings).raw_prompt_skippable()? {
                Some(choice) => Ok(Flow::Jump(sections[choice.index].step)),
                None => Ok(Flow::Jump(WizardStep::Review)),
            }
        }
        other => Ok(navigation(other).unwrap_or(Flow::Exit)),
    }
}
