//! Data sources and concurrent dataset loading.
//!
//! Every dataset (trailheads, facilities, AQI forecasts, counties, alerts,
//! trails) comes from a [`FeatureSource`] returning raw JSON text. All
//! fetches are issued together and joined before anything is parsed or
//! classified, so a slow source never races a half-loaded engine.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, info};

use crate::error::{AtlasError, Result};

/// Something that can deliver one dataset as JSON text.
pub trait FeatureSource: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    fn fetch(&self) -> BoxFuture<'_, Result<String>>;
}

/// In-memory source, mostly for tests and bundled data.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    body: String,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

impl FeatureSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> BoxFuture<'_, Result<String>> {
        futures::future::ready(Ok(self.body.clone())).boxed()
    }
}

/// Reads a dataset from disk.
///
/// With the `http` feature the read goes through `tokio::fs`, so several
/// files load concurrently on a tokio runtime. Without it the read is a
/// blocking `std::fs` call and joined file sources run one after another.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    path: PathBuf,
}

impl FileSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeatureSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> BoxFuture<'_, Result<String>> {
        async move {
            debug!("[FileSource] Reading {}", self.path.display());
            #[cfg(feature = "http")]
            let body = tokio::fs::read_to_string(&self.path).await;
            #[cfg(not(feature = "http"))]
            let body = std::fs::read_to_string(&self.path);

            body.map_err(|e| AtlasError::Source {
                source_name: self.name.clone(),
                message: format!("{}: {}", self.path.display(), e),
                status_code: None,
            })
        }
        .boxed()
    }
}

/// Raw text of every dataset the engine loads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Datasets {
    pub trailheads: String,
    pub facilities: String,
    pub aqi_today: String,
    pub aqi_tomorrow: String,
    pub counties: String,
    pub alerts: String,
    pub trails: Option<String>,
}

/// One source per dataset. Trails are optional.
pub struct SourceSet {
    pub trailheads: Box<dyn FeatureSource>,
    pub facilities: Box<dyn FeatureSource>,
    pub aqi_today: Box<dyn FeatureSource>,
    pub aqi_tomorrow: Box<dyn FeatureSource>,
    pub counties: Box<dyn FeatureSource>,
    pub alerts: Box<dyn FeatureSource>,
    pub trails: Option<Box<dyn FeatureSource>>,
}

impl SourceSet {
    /// File sources for a data directory laid out as
    /// `trailheads.geojson`, `facilities.geojson`, `aqi_today.geojson`,
    /// `aqi_tomorrow.geojson`, `counties.geojson`, `alerts.json` and an
    /// optional `trails.geojson`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let file = |name: &str, file_name: &str| -> Box<dyn FeatureSource> {
            Box::new(FileSource::new(name, dir.join(file_name)))
        };
        let trails_path = dir.join("trails.geojson");
        let trails: Option<Box<dyn FeatureSource>> = if trails_path.exists() {
            Some(Box::new(FileSource::new("trails", trails_path)))
        } else {
            None
        };

        Self {
            trailheads: file("trailheads", "trailheads.geojson"),
            facilities: file("facilities", "facilities.geojson"),
            aqi_today: file("aqi_today", "aqi_today.geojson"),
            aqi_tomorrow: file("aqi_tomorrow", "aqi_tomorrow.geojson"),
            counties: file("counties", "counties.geojson"),
            alerts: file("alerts", "alerts.json"),
            trails,
        }
    }
}

/// Fetch every dataset concurrently. Fails with the first source error.
pub async fn load_datasets(sources: &SourceSet) -> Result<Datasets> {
    let start = Instant::now();

    let trails = async {
        match &sources.trails {
            Some(source) => source.fetch().await.map(Some),
            None => Ok(None),
        }
    };

    let (trailheads, facilities, aqi_today, aqi_tomorrow, counties, alerts, trails) =
        futures::try_join!(
            sources.trailheads.fetch(),
            sources.facilities.fetch(),
            sources.aqi_today.fetch(),
            sources.aqi_tomorrow.fetch(),
            sources.counties.fetch(),
            sources.alerts.fetch(),
            trails,
        )?;

    info!(
        "[Sources] Loaded {} datasets in {:.2}s",
        if trails.is_some() { 7 } else { 6 },
        start.elapsed().as_secs_f64()
    );

    Ok(Datasets {
        trailheads,
        facilities,
        aqi_today,
        aqi_tomorrow,
        counties,
        alerts,
        trails,
    })
}
