//! Data source selection: the REST backend or the built-in demo data.

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use wattboard_core::{DataSource, HttpSource, MockSource};
use wattboard_types::{FilterSet, ResourceKind};

use crate::config::Config;
use crate::demo;

/// The source every command reads from.
#[derive(Debug, Clone)]
pub enum Backend {
    Http(Arc<HttpSource>),
    Demo(Arc<MockSource>),
}

impl Backend {
    /// Pick the source from flags (already merged with env) and config.
    pub fn resolve(
        demo: bool,
        url: Option<&str>,
        token: Option<&str>,
        config: &Config,
    ) -> Result<Self> {
        if demo {
            return Ok(Backend::Demo(Arc::new(demo::source())));
        }

        let Some(url) = url.or(config.base_url.as_deref()) else {
            bail!(
                "No backend configured. Use --url <URL>, set WATTBOARD_URL, or run\n\
                 'wattboard config set base-url <URL>'. Add --demo to try the CLI with generated data."
            );
        };

        let mut source = HttpSource::new(url)?;
        if let Some(token) = token.or(config.token.as_deref()) {
            source = source.with_token(token);
        }
        Ok(Backend::Http(Arc::new(source)))
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, Backend::Demo(_))
    }
}

#[async_trait]
impl DataSource for Backend {
    async fn fetch_list<T>(&self, kind: ResourceKind, filters: &FilterSet) -> wattboard_core::Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        match self {
            Backend::Http(source) => source.fetch_list(kind, filters).await,
            Backend::Demo(source) => source.fetch_list(kind, filters).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Backend::Http(source) => source.describe(),
            Backend::Demo(source) => source.describe(),
        }
    }
}
