//! File-backed source: a listing document describing the remote state.
//!
//! ```yaml
//! marker: "10.02.2024"
//! changes:
//!   transport: Автобус
//!   routes: [12, 45]
//! categories:
//!   - name: Автобус
//!     routes:
//!       - number: 12
//!         outbound:
//!           label: "Вокзал — Девятовка"
//!           stops:
//!             - { name: "Вокзал", link: "https://example.org/stop/1" }
//!         inbound: { label: "Девятовка — Вокзал", stops: [] }
//! timetables:
//!   "https://example.org/stop/1":
//!     - { day: будни, hour: "05", minutes: "10 40" }
//! ```
//!
//! `.json` files use the same shape. Labels are translated here, at the
//! boundary; the document is re-parsed only when its size or mtime changes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use serde::Deserialize;
use timetable_core::{Marker, RouteNumber, TransportKind};

use crate::error::io_err;
use crate::memory::MemorySource;
use crate::records::{CategoryListing, ChangedRoutes, RoutePaths, TimeSlotRow};
use crate::{ScheduleSource, SourceError};

#[derive(Debug, Deserialize)]
struct ListingDocument {
    #[serde(default)]
    marker: Option<String>,
    #[serde(default)]
    changes: Option<ChangeSection>,
    #[serde(default)]
    categories: Vec<CategorySection>,
    #[serde(default)]
    timetables: HashMap<String, Vec<TimeSlotRow>>,
}

#[derive(Debug, Deserialize)]
struct ChangeSection {
    #[serde(default)]
    transport: Option<String>,
    #[serde(default)]
    routes: Vec<RouteNumber>,
}

#[derive(Debug, Deserialize)]
struct CategorySection {
    name: String,
    #[serde(default)]
    routes: Vec<RouteSection>,
}

#[derive(Debug, Deserialize)]
struct RouteSection {
    number: RouteNumber,
    #[serde(flatten)]
    paths: RoutePaths,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

/// A [`ScheduleSource`] reading a listing document from disk.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    cache: Mutex<Option<(Fingerprint, Arc<MemorySource>)>>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current listing, re-parsed if the file changed since the last call.
    fn listing(&self) -> Result<Arc<MemorySource>, SourceError> {
        let meta = std::fs::metadata(&self.path).map_err(|e| io_err(&self.path, e))?;
        let fingerprint = Fingerprint {
            modified: meta.modified().ok(),
            len: meta.len(),
        };

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((seen, listing)) = cache.as_ref() {
            if *seen == fingerprint {
                return Ok(listing.clone());
            }
        }

        let listing = Arc::new(parse_listing(&self.path)?);
        *cache = Some((fingerprint, listing.clone()));
        Ok(listing)
    }
}

fn parse_listing(path: &Path) -> Result<MemorySource, SourceError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let document: ListingDocument = if is_json {
        serde_json::from_str(&contents).map_err(|e| SourceError::Json {
            path: path.to_path_buf(),
            source: e,
        })?
    } else {
        serde_yaml::from_str(&contents).map_err(|e| SourceError::Yaml {
            path: path.to_path_buf(),
            source: e,
        })?
    };

    into_memory(document)
}

fn translate(label: &str) -> Result<TransportKind, SourceError> {
    TransportKind::from_label(label).ok_or_else(|| SourceError::UnknownTransport(label.to_string()))
}

fn into_memory(document: ListingDocument) -> Result<MemorySource, SourceError> {
    let mut source = MemorySource::default();
    source.set_marker(
        document
            .marker
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .map(Marker::from),
    );

    for category in document.categories {
        let kind = translate(&category.name)?;
        source = source.with_category(kind, category.name);
        for route in category.routes {
            source.replace_route(kind, route.number, route.paths);
        }
    }

    for (link, rows) in document.timetables {
        source.set_timetable(link, rows);
    }

    // A change section without a transport label is treated as unparseable.
    let changes = match document.changes {
        Some(ChangeSection {
            transport: Some(label),
            routes,
        }) => Some(ChangedRoutes::new(translate(&label)?, routes)),
        _ => None,
    };
    source.set_changes(changes);

    Ok(source)
}

impl ScheduleSource for FileSource {
    fn list_categories(&self) -> Result<Vec<CategoryListing>, SourceError> {
        self.listing()?.list_categories()
    }

    fn list_route_numbers(&self, kind: TransportKind) -> Result<Vec<RouteNumber>, SourceError> {
        self.listing()?.list_route_numbers(kind)
    }

    fn list_route_paths(
        &self,
        kind: TransportKind,
        number: RouteNumber,
    ) -> Result<RoutePaths, SourceError> {
        self.listing()?.list_route_paths(kind, number)
    }

    fn list_time_slots(&self, link: &str) -> Result<Vec<TimeSlotRow>, SourceError> {
        self.listing()?.list_time_slots(link)
    }

    fn fetch_latest_marker(&self) -> Result<Marker, SourceError> {
        self.listing()?.fetch_latest_marker()
    }

    fn fetch_changed_routes(&self) -> Result<Option<ChangedRoutes>, SourceError> {
        self.listing()?.fetch_changed_routes()
    }
}
