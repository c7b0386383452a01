use super::Session;
use anyhow::{Context, Result};

pub async fn execute_health(session: &Session) -> Result<()> {
    let health = session
        .client
        .health()
        .await
        .context("Health check failed")?;
    println!("Server: {}", session.client.base_url());
    println!("Status: {}", health.status);
    Ok(())
}

pub async fn execute_models(session: &Session) -> Result<()> {
    let models = session
        .client
        .list_models()
        .await
        .context("Failed to list models")?;

    println!("Found {} models:", models.len());
    for model in models {
        println!(
            "  {} ({}, provider: {})",
            model.identifier,
            model.model_type,
            model.provider_id.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}
