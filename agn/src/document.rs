//! Decoded autogen tile.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::Error;
use crate::chunk::{
    self, BuildingDistribution, Chunk, GenericBuilding, LibraryObject, Payload, PolygonBuilding,
    RectangularVegetationArea, Riff, Tag, VegetationPolygon, Version,
};
use crate::geometry::GeoPoint;
use crate::tiles::{LatitudeOffset, TileBounds, TileIndex};

/// Default number of attempts for writing a tile.
const DEFAULT_SAVE_ATTEMPTS: u32 = 5;

/// Default pause between two attempts at writing a tile.
const DEFAULT_SAVE_DELAY: Duration = Duration::from_millis(500);

/// Retry behavior for saving tiles.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RetryPolicy {
    /// Maximum number of write attempts.
    pub attempts: u32,
    /// Pause after each failed attempt.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: DEFAULT_SAVE_ATTEMPTS, delay: DEFAULT_SAVE_DELAY }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

/// Content of a single autogen tile.
#[derive(Clone, Default, Debug)]
pub struct TileDocument {
    vegetation_polygons: Vec<VegetationPolygon>,
    polygon_buildings: Vec<PolygonBuilding>,
    library_objects: Vec<LibraryObject>,
    generic_buildings: Vec<GenericBuilding>,
    rectangular_vegetation_areas: Vec<RectangularVegetationArea>,
    building_distribution: Option<BuildingDistribution>,
    version: Version,
    riff: Riff,

    north_west: Option<GeoPoint>,
    latitude_offset: LatitudeOffset,
    path: Option<PathBuf>,
}

impl TileDocument {
    /// Create an empty tile without location.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tile at a grid location.
    pub fn with_index(index: TileIndex, latitude_offset: LatitudeOffset) -> Self {
        let mut document = Self { latitude_offset, ..Self::default() };
        document.set_index(index);
        document
    }

    /// Load a tile file.
    ///
    /// The tile's location is resolved from its file name.
    pub fn from_path(
        path: impl AsRef<Path>,
        latitude_offset: LatitudeOffset,
    ) -> Result<Self, Error> {
        let path = path.as_ref();

        let mut document = Self { latitude_offset, ..Self::default() };
        match TileIndex::from_path(path) {
            Ok(index) => document.set_index(index),
            Err(err) => warn!("Unknown tile location: {err}"),
        }

        let file = File::open(path)?;
        document.load(BufReader::new(file))?;
        document.path = Some(path.to_path_buf());

        Ok(document)
    }

    /// Replace the tile's content with a chunk stream.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<(), Error> {
        self.clear();

        let root = chunk::decode(reader)?;

        let mut stack = vec![root];
        while let Some(Chunk { payload, children }) = stack.pop() {
            stack.extend(children.into_iter().rev());

            match payload {
                Payload::Riff(riff) => self.riff = riff,
                Payload::Version(version) => self.version = version,
                Payload::BuildingDistribution(distribution) => {
                    self.building_distribution = Some(distribution)
                },
                Payload::VegetationPolygon(polygon) => self.vegetation_polygons.push(polygon),
                Payload::PolygonBuilding(building) => self.polygon_buildings.push(building),
                Payload::LibraryObject(object) => self.library_objects.push(object),
                Payload::GenericBuilding(building) => self.generic_buildings.push(building),
                Payload::RectangularVegetationArea(area) => {
                    self.rectangular_vegetation_areas.push(area)
                },
                Payload::RowHouse(_) | Payload::Group(_) => (),
            }
        }

        debug!(
            "Loaded {} vegetation polygons, {} polygon buildings, {} library objects, {} generic \
             buildings and {} vegetation areas",
            self.vegetation_polygons.len(),
            self.polygon_buildings.len(),
            self.library_objects.len(),
            self.generic_buildings.len(),
            self.rectangular_vegetation_areas.len(),
        );

        Ok(())
    }

    /// Replace the tile's content with a chunk buffer.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.load(bytes)
    }

    /// Build the chunk tree for this tile.
    pub fn to_chunk(&self) -> Chunk {
        let mut root = Chunk::new(self.riff);
        root.children.push(Chunk::new(self.version));
        root.children.push(Chunk::new(self.building_distribution.unwrap_or_default()));

        root.children.extend(group(Tag::VegetationPolygonGroup, &self.vegetation_polygons));
        root.children.extend(group(Tag::PolygonBuildingGroup, &self.polygon_buildings));
        root.children.extend(group(Tag::LibraryObjectGroup, &self.library_objects));
        root.children.extend(group(Tag::GenericBuildingGroup, &self.generic_buildings));
        root.children.extend(group(
            Tag::RectangularVegetationAreaGroup,
            &self.rectangular_vegetation_areas,
        ));

        root
    }

    /// Encode this tile into a writer.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        chunk::encode(&self.to_chunk(), &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Encode this tile into a buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::new();
        chunk::encode(&self.to_chunk(), &mut bytes)?;
        Ok(bytes)
    }

    /// Atomically write this tile to a file.
    ///
    /// Failed writes are retried according to the `policy`; the error of the
    /// last attempt is returned once all attempts failed.
    pub fn save_to_path(&self, path: impl AsRef<Path>, policy: &RetryPolicy) -> Result<(), Error> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let attempts = policy.attempts.max(1);

        let mut attempt = 1;
        loop {
            match write_atomic(path, &bytes) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < attempts => {
                    warn!("Failed to save {path:?} (attempt {attempt}/{attempts}): {err}");
                    thread::sleep(policy.delay);
                    attempt += 1;
                },
                Err(err) => {
                    return Err(Error::SaveRetriesExhausted { attempts, source: Box::new(err) });
                },
            }
        }
    }

    pub fn vegetation_polygons(&self) -> &[VegetationPolygon] {
        &self.vegetation_polygons
    }

    /// Mutable access to the vegetation polygons, in file order.
    pub fn vegetation_polygons_mut(&mut self) -> &mut Vec<VegetationPolygon> {
        &mut self.vegetation_polygons
    }

    pub fn polygon_buildings(&self) -> &[PolygonBuilding] {
        &self.polygon_buildings
    }

    pub fn polygon_buildings_mut(&mut self) -> &mut Vec<PolygonBuilding> {
        &mut self.polygon_buildings
    }

    pub fn library_objects(&self) -> &[LibraryObject] {
        &self.library_objects
    }

    pub fn library_objects_mut(&mut self) -> &mut Vec<LibraryObject> {
        &mut self.library_objects
    }

    pub fn generic_buildings(&self) -> &[GenericBuilding] {
        &self.generic_buildings
    }

    pub fn generic_buildings_mut(&mut self) -> &mut Vec<GenericBuilding> {
        &mut self.generic_buildings
    }

    pub fn rectangular_vegetation_areas(&self) -> &[RectangularVegetationArea] {
        &self.rectangular_vegetation_areas
    }

    pub fn rectangular_vegetation_areas_mut(&mut self) -> &mut Vec<RectangularVegetationArea> {
        &mut self.rectangular_vegetation_areas
    }

    pub fn building_distribution(&self) -> Option<&BuildingDistribution> {
        self.building_distribution.as_ref()
    }

    pub fn set_building_distribution(&mut self, distribution: Option<BuildingDistribution>) {
        self.building_distribution = distribution;
    }

    /// Version stamp of the tile format.
    pub fn version(&self) -> i32 {
        self.version.version
    }

    /// Sub-type of the root chunk.
    pub fn sub_type(&self) -> [u8; 4] {
        self.riff.sub_type
    }

    /// File this tile was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn latitude_offset(&self) -> LatitudeOffset {
        self.latitude_offset
    }

    /// Geographic location of the tile's north-west corner.
    pub fn north_west(&self) -> Option<GeoPoint> {
        self.north_west
    }

    /// Set the tile's north-west corner.
    pub fn set_north_west(&mut self, north_west: GeoPoint) {
        self.north_west = Some(north_west);
    }

    /// Grid location of the tile.
    pub fn index(&self) -> Option<TileIndex> {
        let north_west = self.north_west?;
        Some(TileIndex::containing(north_west, self.latitude_offset))
    }

    /// Move the tile to a grid location.
    pub fn set_index(&mut self, index: TileIndex) {
        self.north_west = Some(index.north_west(self.latitude_offset));
    }

    /// Align the tile's north-west corner with its grid cell.
    pub fn snap_to_upper_left_corner(&mut self) {
        if let Some(index) = self.index() {
            self.set_index(index);
        }
    }

    /// Geographic area covered by the tile.
    pub fn bounds(&self) -> Option<TileBounds> {
        self.north_west.map(TileBounds::from_north_west)
    }

    /// Reset all decoded content.
    fn clear(&mut self) {
        self.vegetation_polygons.clear();
        self.polygon_buildings.clear();
        self.library_objects.clear();
        self.generic_buildings.clear();
        self.rectangular_vegetation_areas.clear();
        self.building_distribution = None;
        self.version = Version::default();
        self.riff = Riff::default();
    }
}

/// Create a group chunk, unless there are no records.
fn group<T: Clone + Into<Payload>>(tag: Tag, records: &[T]) -> Option<Chunk> {
    if records.is_empty() {
        return None;
    }

    let children = records.iter().map(|record| Chunk::new(record.clone())).collect();
    Some(Chunk::group(tag, children))
}

/// Replace a file's content without exposing partial writes.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.persist(path)?;

    Ok(())
}
