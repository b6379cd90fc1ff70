//! Configuration options.

use std::fmt::{self, Display, Formatter};
use std::ops::Deref;
use std::time::Duration;

use agn::coalesce::{Coalescer, DEFAULT_SNAP_FACTOR, DEFAULT_TOLERANCE};
use agn::document::RetryPolicy;
use agn::tiles::LatitudeOffset;
use configory::EventHandler;
use configory::docgen::{DocType, Docgen, Leaf};
use serde::{Deserialize, Deserializer};
use tracing::{error, info};

/// # Agntool
///
/// ## Syntax
///
/// Agntool's configuration file uses the TOML format. The format's
/// specification can be found at _https://toml.io/en/v1.0.0_.
///
/// ## Location
///
/// Agntool doesn't create the configuration file for you, but it looks for one
/// at <br> `${XDG_CONFIG_HOME:-$HOME/.config}/agntool/agntool.toml`.
///
/// ## Fields
#[derive(Docgen, Deserialize, Default, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// This section documents the `[tiles]` table.
    pub tiles: Tiles,
    /// This section documents the `[coalesce]` table.
    pub coalesce: Coalesce,
    /// This section documents the `[save]` table.
    pub save: Save,
}

/// Tile addressing configuration.
#[derive(Docgen, Deserialize, Default, Copy, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Tiles {
    /// Latitude shift of the tiles' north-west corner.
    ///
    /// Different revisions of the scenery tools disagree on where a tile row
    /// starts. This must match the revision which produced the dataset.
    pub latitude_offset: TileRevision,
}

/// Vegetation polygon coalescing configuration.
#[derive(Docgen, Deserialize, Copy, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Coalesce {
    /// Merge adjacent vegetation polygons of the same type.
    pub enabled: bool,
    /// Maximum distance between vertices considered identical.
    ///
    /// Distances are relative to the tile size.
    pub tolerance: f64,
    /// Multiple of the tolerance within which vertices snap to the tile's
    /// western and northern boundary.
    pub snap_factor: f64,
}

impl Default for Coalesce {
    fn default() -> Self {
        Self { enabled: true, tolerance: DEFAULT_TOLERANCE, snap_factor: DEFAULT_SNAP_FACTOR }
    }
}

impl Coalesce {
    pub fn coalescer(&self) -> Coalescer {
        Coalescer::new(self.tolerance, self.snap_factor)
    }
}

/// Tile writing configuration.
#[derive(Docgen, Deserialize, Copy, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Save {
    /// Write processed tiles back to their file.
    pub enabled: bool,
    /// Maximum number of attempts at writing a tile.
    pub attempts: u32,
    /// Pause between two attempts at writing a tile.
    #[docgen(doc_type = "integer (milliseconds)", default = "500")]
    pub retry_delay: MillisDuration,
}

impl Default for Save {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self { enabled: true, attempts: policy.attempts, retry_delay: policy.delay.into() }
    }
}

impl Save {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, *self.retry_delay)
    }
}

/// Tile format revision.
#[derive(Deserialize, Default, Copy, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum TileRevision {
    /// Rows start at their grid line.
    #[default]
    None,
    /// Rows are shifted by half a tile.
    HalfTile,
    /// Rows are shifted by a full tile.
    FullTile,
}

impl From<TileRevision> for LatitudeOffset {
    fn from(revision: TileRevision) -> Self {
        match revision {
            TileRevision::None => Self::None,
            TileRevision::HalfTile => Self::HalfTile,
            TileRevision::FullTile => Self::FullTile,
        }
    }
}

impl Docgen for TileRevision {
    fn doc_type() -> DocType {
        DocType::Leaf(Leaf::new("\"none\" | \"half_tile\" | \"full_tile\""))
    }

    fn format(&self) -> String {
        format!("\"{self}\"")
    }
}

impl Display for TileRevision {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::None => write!(f, "none"),
            Self::HalfTile => write!(f, "half_tile"),
            Self::FullTile => write!(f, "full_tile"),
        }
    }
}

/// Config wrapper for millisecond-precision durations.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub struct MillisDuration(Duration);

impl Deref for MillisDuration {
    type Target = Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for MillisDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms).into())
    }
}

impl From<Duration> for MillisDuration {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl Display for MillisDuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.0.as_millis())
    }
}

/// Event handler for configuration manager updates.
///
/// Configuration is only read once at startup, so changes take effect with
/// the next run.
pub struct ConfigEventHandler;

impl EventHandler for ConfigEventHandler {
    type MessageData = ();

    fn file_changed(&self, _config: &configory::Config) {
        info!("Configuration file changed, it will be applied on the next run");
    }

    fn ipc_changed(&self, _config: &configory::Config) {
        info!("Configuration changed, it will be applied on the next run");
    }

    fn file_error(&self, _config: &configory::Config, err: configory::Error) {
        error!("Configuration file error: {err}");
    }
}

#[cfg(test)]
mod tests {
    use configory::docgen::markdown::Markdown;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();

        assert_eq!(config.tiles.latitude_offset, TileRevision::None);
        assert!(config.coalesce.enabled);
        assert_eq!(config.coalesce.coalescer(), Coalescer::default());
        assert!(config.save.enabled);
        assert_eq!(config.save.retry_policy(), RetryPolicy::default());
        assert_eq!(config.save.retry_delay.to_string(), "500");
    }

    #[test]
    fn revision_offsets() {
        assert_eq!(LatitudeOffset::from(TileRevision::None), LatitudeOffset::None);
        assert_eq!(LatitudeOffset::from(TileRevision::HalfTile), LatitudeOffset::HalfTile);
        assert_eq!(LatitudeOffset::from(TileRevision::FullTile), LatitudeOffset::FullTile);
        assert_eq!(TileRevision::HalfTile.format(), "\"half_tile\"");
    }

    #[test]
    fn config_docs() {
        let mut formatter = Markdown::new();
        formatter.set_heading_size(3);
        let docs = formatter.format::<Config>();

        for field in ["latitude_offset", "tolerance", "snap_factor", "attempts", "retry_delay"] {
            assert!(docs.contains(field), "missing {field:?} in config docs");
        }
    }
}
