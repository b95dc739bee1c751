//! Pool definitions read from XML files.
//!
//! ```xml
//! <pools>
//!   <pool name="main" provider="mysql" maxClients="10" maxWaitMs="5000"/>
//!   <pool name="reports" maxClients="unbounded"/>
//! </pools>
//! ```

use anyhow::{Context, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use quick_xml::de;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use walkdir::WalkDir;

use crate::models::pool_config::PoolConfig;

static POOL_CONFIGS: OnceLock<DashMap<String, PoolConfig>> = OnceLock::new();

#[derive(Debug, Deserialize)]
struct Pools {
    #[serde(rename = "pool", default)]
    pools: Vec<PoolItem>,
}

#[derive(Debug, Deserialize)]
pub struct PoolItem {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@provider")]
    pub provider: Option<String>,
    #[serde(rename = "@maxClients")]
    pub max_clients: Option<String>,
    #[serde(rename = "@maxWaitMs")]
    pub max_wait_ms: Option<u64>,
}

impl TryFrom<&PoolItem> for PoolConfig {
    type Error = anyhow::Error;

    fn try_from(item: &PoolItem) -> Result<Self> {
        let max_clients = match item.max_clients.as_deref().map(str::trim) {
            None => PoolConfig::default().max_clients,
            Some(s) if s.eq_ignore_ascii_case("unbounded") || s.eq_ignore_ascii_case("none") => {
                None
            }
            Some(s) => Some(
                s.parse::<usize>()
                    .with_context(|| format!("pool '{}': invalid maxClients '{}'", item.name, s))?,
            ),
        };
        let config = PoolConfig {
            provider_type: item.provider.clone(),
            max_clients,
            max_wait: item.max_wait_ms.map(Duration::from_millis),
        };
        config
            .validate()
            .with_context(|| format!("pool '{}'", item.name))?;
        Ok(config)
    }
}

/// Loads pool definitions from in-memory XML documents.
pub fn load(assets: &[&[u8]]) -> Result<()> {
    for data in assets {
        let content = std::str::from_utf8(data).context("Asset content is not valid UTF-8")?;
        process_pool_data(content, "memory")?;
    }
    Ok(())
}

/// Recursively loads every `.xml` file below `dir_path`.
pub fn load_from_path(dir_path: &Path) -> Result<()> {
    for entry in WalkDir::new(dir_path).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();

        if path.is_file() && path.extension().is_some_and(|ext| ext == "xml") {
            process_pool_file(path)?;
        }
    }
    Ok(())
}

pub fn find_pool_config(name: &str) -> Option<PoolConfig> {
    let store = POOL_CONFIGS.get()?;
    store.get(name).map(|v| v.clone())
}

fn process_pool_file(path: &Path) -> Result<()> {
    let xml_content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    process_pool_data(&xml_content, &path.display().to_string())
}

fn process_pool_data(xml_content: &str, source: &str) -> Result<()> {
    let pools: Pools =
        de::from_str(xml_content).with_context(|| format!("XML parse error: {}", source))?;

    let store = POOL_CONFIGS.get_or_init(DashMap::new);

    for item in &pools.pools {
        let config = PoolConfig::try_from(item).with_context(|| format!("In '{}'", source))?;
        match store.entry(item.name.clone()) {
            Entry::Occupied(_) => {
                anyhow::bail!("Duplicate pool '{}' found in '{}'", item.name, source)
            }
            Entry::Vacant(slot) => {
                slot.insert(config);
            }
        }
    }
    Ok(())
}
