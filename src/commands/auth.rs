use anyhow::{bail, Context, Result};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Input};

use crate::api::looks_like_jwt;
use crate::auth::client::AuthApi;
use crate::auth::models::{peek_claims, AuthTokens, LoginRequest, SessionUser};
use crate::auth::SessionStore;
use crate::cli::AuthAction;
use crate::utils::format::relative;

pub async fn execute(action: &AuthAction) -> Result<()> {
    let ctx = super::build_context()?;

    match action {
        AuthAction::Login { email, password } => {
            let email = match email {
                Some(email) => email.clone(),
                None => prompt_email()?,
            };
            let password = match password {
                Some(password) => password.clone(),
                None => prompt_password()?,
            };

            println!("{}  Signing in...", "🔐".cyan());
            let auth = AuthApi::new(ctx.api.clone());
            let response = auth
                .login(&LoginRequest {
                    email: email.clone(),
                    password,
                })
                .await
                .context("Authentication failed")?;

            if !looks_like_jwt(&response.access_token) {
                bail!("Login response did not include a usable access token");
            }

            let store = SessionStore::new(ctx.api.clone(), ctx.storage.clone());
            store
                .login(
                    SessionUser {
                        id: None,
                        email: email.clone(),
                    },
                    AuthTokens {
                        access_token: response.access_token,
                        refresh_token: response.refresh_token,
                    },
                )
                .await?;

            println!("{}  Signed in as {}", "✓".green(), email.yellow());
        }

        AuthAction::Register { email } => {
            let email = match email {
                Some(email) => email.clone(),
                None => prompt_email()?,
            };
            let password = prompt_password()?;

            let auth = AuthApi::new(ctx.api.clone());
            let response = auth
                .register(&email, &password)
                .await
                .context("Registration failed")?;

            println!(
                "{}  Account created (id {})",
                "✓".green(),
                response.id.yellow()
            );
            println!(
                "  Run {} to sign in",
                "momentbox auth login".cyan()
            );
        }

        AuthAction::Logout => {
            let store = SessionStore::new(ctx.api.clone(), ctx.storage.clone());
            store.logout().await;
            println!("{}  Signed out", "✓".green());
        }

        AuthAction::Status => {
            let store = super::restored_store(&ctx).await;
            let session = store.snapshot().await;

            match &session.user {
                Some(user) => {
                    println!(
                        "{}  Authentication Status: {}",
                        "🔐".green(),
                        "AUTHENTICATED".green().bold()
                    );
                    println!("  {} {}", "Email:".white().bold(), user.email.yellow());
                    if let Some(id) = &user.id {
                        println!("  {} {}", "User ID:".white().bold(), id.yellow());
                    }
                    println!(
                        "  {} {}",
                        "API Endpoint:".white().bold(),
                        ctx.config.api_endpoint.yellow()
                    );

                    let expiry = session
                        .access_token
                        .as_deref()
                        .and_then(peek_claims)
                        .and_then(|claims| claims.expires_at());
                    if let Some(expiry) = expiry {
                        println!(
                            "  {} {}",
                            "Token expires:".white().bold(),
                            relative(expiry).yellow()
                        );
                    }
                }
                None => {
                    println!(
                        "{}  Authentication Status: {}",
                        "🔐".red(),
                        "NOT AUTHENTICATED".red().bold()
                    );
                    println!(
                        "  Run {} to authenticate",
                        "momentbox auth login".cyan()
                    );
                }
            }
        }
    }

    Ok(())
}

fn prompt_email() -> Result<String> {
    let theme = ColorfulTheme::default();
    Ok(Input::with_theme(&theme)
        .with_prompt("Email")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.contains('@') && input.contains('.') {
                Ok(())
            } else {
                Err("Please enter a valid email address")
            }
        })
        .interact_text()?)
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    use std::io::{self, Write};
    io::stdout().flush().context("Failed to flush stdout")?;
    rpassword::read_password().context("Failed to read password")
}
