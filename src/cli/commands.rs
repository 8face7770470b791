//! CLI command handlers. Each builds just the components it needs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{presets::UTF8_FULL, Table};
use console::style;

use crate::domain::models::{normalize_app_name, Config, RegistrySource};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::database::{
    AppRepository, InteractionRepository, RegistryRepository, StoreHandle,
};
use crate::infrastructure::registry::{HttpRegistry, RegistryResolver};

async fn open_store(config: &Config) -> Result<StoreHandle> {
    let path = ConfigLoader::database_path(config);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }
    let store = StoreHandle::new(&format!("sqlite:{}", path.display()))
        .await
        .context("failed to open store")?;
    store.migrate().await.context("failed to migrate store")?;
    Ok(store)
}

pub async fn handle_resolve(config: &Config, app: &str, refresh: bool) -> Result<()> {
    let store = open_store(config).await?;
    let repo = RegistryRepository::new(store.pool().clone());

    let normalized = normalize_app_name(app);
    if refresh {
        repo.delete_cache(&normalized).await?;
    }

    let timeout = Duration::from_secs(config.registry.request_timeout_secs);
    let primary = if config.registry.primary_url.is_empty() {
        None
    } else {
        Some(Arc::new(HttpRegistry::new(
            &config.registry.primary_url,
            RegistrySource::PrimaryRegistry,
            timeout,
        )?) as Arc<dyn crate::domain::ports::RegistrySearch>)
    };
    let secondary = if config.registry.secondary_url.is_empty() {
        None
    } else {
        Some(Arc::new(HttpRegistry::new(
            &config.registry.secondary_url,
            RegistrySource::SecondaryRegistry,
            timeout,
        )?) as Arc<dyn crate::domain::ports::RegistrySearch>)
    };

    let resolver = RegistryResolver::new(repo, primary, secondary);
    match resolver.resolve(&normalized).await? {
        Some(descriptor) => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Field", "Value"]);
            table.add_row(vec!["Server".to_string(), descriptor.server_name.clone()]);
            table.add_row(vec!["Package".to_string(), descriptor.package_name.clone()]);
            table.add_row(vec!["Source".to_string(), descriptor.source.as_str().to_string()]);
            table.add_row(vec!["Validated".to_string(), descriptor.validated.to_string()]);
            table.add_row(vec!["Invocation".to_string(), descriptor.invocation.clone()]);
            table.add_row(vec!["Tools".to_string(), descriptor.tools.len().to_string()]);
            println!("{table}");
        }
        None => {
            println!(
                "{} no tool server found for {}",
                style("✗").red(),
                style(&normalized).bold()
            );
        }
    }

    store.close().await;
    Ok(())
}

pub async fn handle_ring(config: &Config, app: &str) -> Result<()> {
    let store = open_store(config).await?;
    let repo = AppRepository::new(store.pool().clone());
    let normalized = normalize_app_name(app);

    let slots = repo.load_slots(&normalized).await?;
    if slots.is_empty() {
        println!(
            "{} no ring saved for {}",
            style("✗").red(),
            style(&normalized).bold()
        );
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Pos", "Kind", "Action", "Uses", "Last used", "Enabled"]);
        for slot in slots {
            table.add_row(vec![
                slot.position.to_string(),
                slot.kind.to_string(),
                slot.action_name.clone(),
                slot.usage_count.to_string(),
                slot.last_used_at
                    .map_or_else(|| "never".to_string(), |t| t.to_rfc3339()),
                slot.enabled.to_string(),
            ]);
        }
        println!("{table}");
    }

    store.close().await;
    Ok(())
}

pub async fn handle_apps(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let repo = AppRepository::new(store.pool().clone());

    let apps = repo.list_apps().await?;
    if apps.is_empty() {
        println!("{} no apps recorded yet", style("·").dim());
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["App", "Display name", "Tool server", "Last seen"]);
        for app in apps {
            table.add_row(vec![
                app.app_name.clone(),
                app.display_name.clone(),
                app.tool_server_name.unwrap_or_else(|| "-".to_string()),
                app.last_seen_at.to_rfc3339(),
            ]);
        }
        println!("{table}");
    }

    store.close().await;
    Ok(())
}

pub async fn handle_delete(config: &Config, app: &str) -> Result<()> {
    let store = open_store(config).await?;
    let apps = AppRepository::new(store.pool().clone());
    let registry = RegistryRepository::new(store.pool().clone());
    let normalized = normalize_app_name(app);

    let deleted = apps.delete_app(&normalized).await?;
    registry.delete_cache(&normalized).await?;
    if deleted {
        println!("{} deleted {}", style("✓").green(), style(&normalized).bold());
    } else {
        println!("{} unknown app {}", style("✗").red(), style(&normalized).bold());
    }

    store.close().await;
    Ok(())
}

pub async fn handle_sweep(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let repo = InteractionRepository::new(store.pool().clone());

    let removed = repo.sweep_expired(Utc::now()).await?;
    println!("{} swept {removed} expired interactions", style("✓").green());

    store.close().await;
    Ok(())
}
