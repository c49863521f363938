use anyhow::{Context, Result};
use colored::*;

use crate::auth::client::AuthApi;

pub async fn execute() -> Result<()> {
    let ctx = super::build_context()?;
    let store = super::restored_store(&ctx).await;
    super::require_user(&store).await?;

    let profile = AuthApi::new(ctx.api.clone())
        .profile()
        .await
        .context("Failed to fetch profile")?;

    println!("{}  {}", "👤".cyan(), "MomentBox Profile".bold());
    println!("  {} {}", "Email:".white().bold(), profile.email.yellow());
    println!("  {} {}", "User ID:".white().bold(), profile.id.yellow());
    println!(
        "  {} {}",
        "Points:".white().bold(),
        profile.points.to_string().green()
    );

    if !profile.equipped_items.is_empty() {
        println!(
            "  {} {}",
            "Equipped:".white().bold(),
            profile.equipped_items.join(", ").yellow()
        );
    }
    if !profile.closet.is_empty() {
        println!(
            "  {} {} item(s)",
            "Closet:".white().bold(),
            profile.closet.len().to_string().yellow()
        );
    }

    Ok(())
}
