use anyhow::Result;
use inquire::{Password, PasswordDisplayMode, Select, Text};

use super::{report, spinner};
use crate::core::state::AppState;
use crate::services::models::{AuthToken, LoginRequest, SignupRequest};

const DEFAULT_ROLE: &str = "user";

/// Loops until a login succeeds. `false` means the user chose to leave.
pub async fn sign_in(app: &AppState) -> Result<bool> {
    loop {
        let Some(choice) = Select::new("Sign in to continue", vec!["Log in", "Sign up", "Quit"])
            .prompt_skippable()?
        else {
            return Ok(false);
        };

        let result = match choice {
            "Log in" => login(app).await,
            "Sign up" => signup(app).await,
            _ => return Ok(false),
        };
        match result {
            Ok(token) => {
                let name = token.user.as_ref().map(|u| u.name.clone()).unwrap_or_default();
                app.auth.store(token).await?;
                if name.is_empty() {
                    println!("Signed in.");
                } else {
                    println!("Welcome, {}.", name);
                }
                return Ok(true);
            }
            Err(e) => report(&e),
        }
    }
}

async fn login(app: &AppState) -> Result<AuthToken> {
    let email = Text::new("Email:").prompt()?;
    let password = Password::new("Password:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;

    let pb = spinner("Signing in...")?;
    let result = app
        .api
        .login(&LoginRequest {
            email: email.trim().to_string(),
            password,
        })
        .await;
    pb.finish_and_clear();
    result.map_err(|e| e.for_action("Login failed"))
}

async fn signup(app: &AppState) -> Result<AuthToken> {
    let name = Text::new("Name:").prompt()?;
    let email = Text::new("Email:").prompt()?;
    let password = Password::new("Password:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_custom_confirmation_message("Confirm password:")
        .with_custom_confirmation_error_message("Passwords do not match.")
        .prompt()?;

    let pb = spinner("Creating account...")?;
    let result = app
        .api
        .signup(&SignupRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password,
            role: DEFAULT_ROLE.to_string(),
        })
        .await;
    pb.finish_and_clear();
    result.map_err(|e| e.for_action("Signup failed"))
}
