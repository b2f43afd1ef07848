use std::collections::HashMap;

use anyhow::{Context as _, Result};
use futures::future::try_join_all;

/// Where named assets are read from.
///
/// Natively names resolve against a directory (`./assets` by default). On
/// wasm they resolve against the page origin, or against `base_url` when set.
#[derive(Clone, Debug)]
pub struct AssetSource {
    #[cfg(not(target_arch = "wasm32"))]
    pub root: std::path::PathBuf,
    #[cfg(target_arch = "wasm32")]
    pub base_url: Option<String>,
}

impl Default for AssetSource {
    fn default() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            root: std::path::PathBuf::from("./assets"),
            #[cfg(target_arch = "wasm32")]
            base_url: None,
        }
    }
}

impl AssetSource {
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_dir(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn from_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn url(&self, name: &str) -> Result<reqwest::Url> {
        let base = match &self.base_url {
            Some(base) => base.clone(),
            None => {
                let window = web_sys::window().context("no window available")?;
                let origin = window
                    .location()
                    .origin()
                    .map_err(|e| anyhow::anyhow!("page origin unavailable: {e:?}"))?;
                format!("{origin}/assets")
            }
        };
        let base = reqwest::Url::parse(&format!("{}/", base.trim_end_matches('/')))
            .with_context(|| format!("invalid asset base url '{base}'"))?;
        base.join(name)
            .with_context(|| format!("invalid asset name '{name}'"))
    }

    pub async fn load_binary(&self, name: &str) -> Result<Vec<u8>> {
        #[cfg(target_arch = "wasm32")]
        let data = {
            let url = self.url(name)?;
            reqwest::get(url)
                .await?
                .error_for_status()?
                .bytes()
                .await?
                .to_vec()
        };
        #[cfg(not(target_arch = "wasm32"))]
        let data = tokio::fs::read(self.root.join(name)).await?;

        log::debug!("Loaded asset '{}' ({} bytes)", name, data.len());
        Ok(data)
    }

    pub async fn load_string(&self, name: &str) -> Result<String> {
        let data = self.load_binary(name).await?;
        String::from_utf8(data).with_context(|| format!("asset '{name}' is not valid UTF-8"))
    }
}

/// Preloaded asset bytes keyed by name.
#[derive(Clone, Debug, Default)]
pub struct Assets {
    entries: HashMap<String, Vec<u8>>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every name concurrently. Fails on the first asset that cannot be
    /// read.
    pub async fn fetch(source: &AssetSource, names: &[&str]) -> Result<Self> {
        let mut assets = Self::new();
        assets.fetch_more(source, names).await?;
        Ok(assets)
    }

    /// Load further assets into this set, skipping names already present.
    pub async fn fetch_more(&mut self, source: &AssetSource, names: &[&str]) -> Result<()> {
        let pending: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| !self.entries.contains_key(*name))
            .collect();
        let loaded = try_join_all(pending.iter().map(|name| async move {
            source
                .load_binary(name)
                .await
                .with_context(|| format!("failed to load asset '{name}'"))
        }))
        .await?;
        for (name, data) in pending.into_iter().zip(loaded) {
            self.entries.insert(name.to_string(), data);
        }
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(name.into(), data)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
