//! Tile grid addressing.
//!
//! The globe is split into a fixed grid of `GRID_WIDTH` by `GRID_HEIGHT`
//! tiles. Each tile is addressed by its column `u`, growing eastward from the
//! antimeridian, and its row `v`, growing southward from the north pole.
//!
//! Tile files are named after a base-4 token which interleaves the bits of
//! `u` and `v`, most significant bit first.

use std::fmt::{self, Display, Formatter};
use std::path::Path;

use crate::Error;
use crate::geometry::GeoPoint;

/// Width of a single tile in degrees longitude.
pub const LONGITUDE_DEGREES_PER_TILE: f64 = 0.0146484375;

/// Height of a single tile in degrees latitude.
pub const LATITUDE_DEGREES_PER_TILE: f64 = 0.010986328125;

/// Number of tile columns.
pub const GRID_WIDTH: u32 = 24576;

/// Number of tile rows.
pub const GRID_HEIGHT: u32 = 16384;

/// Number of base-4 digits in a tile file name token.
pub const TOKEN_LENGTH: usize = 15;

/// File extension used by autogen tiles.
pub const TILE_EXTENSION: &str = "agn";

/// Suffix some tools append to the tile token in file names.
const FILE_NAME_SUFFIX: &str = "an";

/// Latitude shift between the grid and a tile's stored north-west corner.
///
/// Revisions of the tile tooling disagree on where a row starts, so the offset
/// in effect must be chosen per dataset.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Debug)]
pub enum LatitudeOffset {
    /// Rows start exactly at their grid line.
    #[default]
    None,
    /// Rows are shifted by half a tile height.
    HalfTile,
    /// Rows are shifted by a full tile height.
    FullTile,
}

impl LatitudeOffset {
    /// Offset in degrees latitude.
    pub fn degrees(&self) -> f64 {
        match self {
            Self::None => 0.,
            Self::HalfTile => LATITUDE_DEGREES_PER_TILE / 2.,
            Self::FullTile => LATITUDE_DEGREES_PER_TILE,
        }
    }
}

/// Get the tile column containing a longitude.
pub fn longitude_to_u(lon: f64) -> u32 {
    ((lon + 180.) * GRID_WIDTH as f64 / 360.).floor() as u32
}

/// Get the western edge of a tile column.
pub fn u_to_longitude(u: u32) -> f64 {
    u as f64 * LONGITUDE_DEGREES_PER_TILE - 180.
}

/// Get the tile row containing a latitude.
pub fn latitude_to_v(lat: f64, offset: LatitudeOffset) -> u32 {
    ((90. - (lat + offset.degrees())) * GRID_HEIGHT as f64 / 180.).floor() as u32
}

/// Get the northern edge of a tile row.
pub fn v_to_latitude(v: u32, offset: LatitudeOffset) -> f64 {
    90. - v as f64 * LATITUDE_DEGREES_PER_TILE - offset.degrees()
}

/// Index uniquely identifying a tile.
#[derive(Default, Hash, PartialEq, Eq, Copy, Clone, Debug)]
pub struct TileIndex {
    pub u: u32,
    pub v: u32,
}

impl TileIndex {
    pub fn new(u: u32, v: u32) -> Self {
        Self { u, v }
    }

    /// Get the tile containing a geographic point.
    pub fn containing(point: GeoPoint, offset: LatitudeOffset) -> Self {
        Self { u: longitude_to_u(point.lon), v: latitude_to_v(point.lat, offset) }
    }

    /// Check whether the index lies within the tile grid.
    pub fn is_valid(&self) -> bool {
        self.u < GRID_WIDTH && self.v < GRID_HEIGHT
    }

    /// Get the base-4 file name token for this tile.
    pub fn token(&self) -> String {
        (0..TOKEN_LENGTH)
            .rev()
            .map(|bit| {
                let digit = ((self.u >> bit) & 1) | (((self.v >> bit) & 1) << 1);
                char::from(b'0' + digit as u8)
            })
            .collect()
    }

    /// Parse a base-4 file name token.
    pub fn from_token(token: &str) -> Result<Self, Error> {
        if token.is_empty() || token.len() > TOKEN_LENGTH {
            return Err(Error::InvalidToken(token.into()));
        }

        let mut index = Self::default();
        for c in token.chars() {
            let digit = match c {
                '0'..='3' => c as u32 - '0' as u32,
                _ => return Err(Error::InvalidToken(token.into())),
            };

            index.u = (index.u << 1) | (digit & 1);
            index.v = (index.v << 1) | (digit >> 1);
        }

        Ok(index)
    }

    /// Resolve the tile from a tile file name or path.
    ///
    /// Directory and extension are dropped and an optional trailing `an` is
    /// removed. Of the remaining characters, only the digits `0` to `3` are
    /// part of the token.
    pub fn from_file_name(name: &str) -> Result<Self, Error> {
        let mut stem = name;
        if let Some(period) = stem.rfind('.') {
            stem = &stem[..period];
        }
        if let Some(slash) = stem.rfind(['/', '\\']) {
            stem = &stem[slash + 1..];
        }

        let stem = stem.to_lowercase();
        let stem = stem.strip_suffix(FILE_NAME_SUFFIX).unwrap_or(&stem);

        let token: String = stem.chars().filter(|c| matches!(c, '0'..='3')).collect();
        Self::from_token(&token).map_err(|_| Error::InvalidFileName(name.into()))
    }

    /// Resolve the tile from a tile file's path.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let name = path.file_name().map(|name| name.to_string_lossy()).unwrap_or_default();
        Self::from_file_name(&name)
    }

    /// File name of this tile.
    pub fn file_name(&self) -> String {
        format!("{}.{TILE_EXTENSION}", self.token())
    }

    /// Geographic location of the tile's north-west corner.
    pub fn north_west(&self, offset: LatitudeOffset) -> GeoPoint {
        GeoPoint::new(v_to_latitude(self.v, offset), u_to_longitude(self.u))
    }

    /// Geographic area covered by this tile.
    pub fn bounds(&self, offset: LatitudeOffset) -> TileBounds {
        TileBounds::from_north_west(self.north_west(offset))
    }
}

impl Display for TileIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.token(), self.u, self.v)
    }
}

/// Geographic area covered by a tile.
#[derive(PartialEq, Default, Copy, Clone, Debug)]
pub struct TileBounds {
    pub north_west: GeoPoint,
    pub south_east: GeoPoint,
}

impl TileBounds {
    /// Get the bounds of a tile starting at its north-west corner.
    pub fn from_north_west(north_west: GeoPoint) -> Self {
        let south_east = GeoPoint::new(
            north_west.lat - LATITUDE_DEGREES_PER_TILE,
            north_west.lon + LONGITUDE_DEGREES_PER_TILE,
        );
        Self { north_west, south_east }
    }

    /// East-west extent along the northern edge in kilometers.
    pub fn width_km(&self) -> f64 {
        let north_east = GeoPoint::new(self.north_west.lat, self.south_east.lon);
        self.north_west.distance_km(north_east)
    }

    /// North-south extent along the western edge in kilometers.
    pub fn height_km(&self) -> f64 {
        let south_west = GeoPoint::new(self.south_east.lat, self.north_west.lon);
        self.north_west.distance_km(south_west)
    }

    /// Check if a point lies within the bounds.
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat <= self.north_west.lat
            && point.lat > self.south_east.lat
            && point.lon >= self.north_west.lon
            && point.lon < self.south_east.lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_token() {
        assert_eq!(TileIndex::new(0, 0).token(), "000000000000000");
        assert_eq!(TileIndex::new(1, 0).token(), "000000000000001");
        assert_eq!(TileIndex::new(0, 2).token(), "000000000000020");
        assert_eq!(TileIndex::new(3, 1).token(), "000000000000013");
    }

    #[test]
    fn max_token() {
        let index = TileIndex::new(GRID_WIDTH - 1, GRID_HEIGHT - 1);
        let token = index.token();

        assert_eq!(token.len(), TOKEN_LENGTH);
        assert_eq!(token, "123333333333333");
        assert_eq!(TileIndex::from_token(&token).unwrap(), index);
    }

    #[test]
    fn token_roundtrip() {
        for u in (0..GRID_WIDTH).step_by(97) {
            for v in (0..GRID_HEIGHT).step_by(89) {
                let index = TileIndex::new(u, v);
                assert_eq!(TileIndex::from_token(&index.token()).unwrap(), index);
            }
        }
    }

    #[test]
    fn invalid_tokens() {
        assert!(TileIndex::from_token("").is_err());
        assert!(TileIndex::from_token("0124").is_err());
        assert!(TileIndex::from_token("0000000000000000").is_err());
    }

    #[test]
    fn file_name_parsing() {
        let index = TileIndex::new(8504, 5473);
        let token = index.token();

        assert_eq!(TileIndex::from_file_name(&format!("{token}.agn")).unwrap(), index);
        assert_eq!(TileIndex::from_file_name(&format!("{token}AN.AGN")).unwrap(), index);
        assert_eq!(
            TileIndex::from_file_name(&format!("C:\\scenery\\world\\texture\\{token}an.agn"))
                .unwrap(),
            index
        );
        assert_eq!(
            TileIndex::from_path(Path::new(&format!("/scenery/{token}an.agn"))).unwrap(),
            index
        );
        assert_eq!(TileIndex::from_file_name(&index.file_name()).unwrap(), index);

        // Digits outside of the base-4 range are not part of the token.
        let noisy = format!("{}9{}.agn", &token[..5], &token[5..]);
        assert_eq!(TileIndex::from_file_name(&noisy).unwrap(), index);

        assert!(TileIndex::from_file_name("readme.txt").is_err());
    }

    #[test]
    fn grid_conversion() {
        assert_eq!(longitude_to_u(-180.), 0);
        assert_eq!(longitude_to_u(0.), GRID_WIDTH / 2);
        assert_eq!(latitude_to_v(90., LatitudeOffset::None), 0);
        assert_eq!(latitude_to_v(0., LatitudeOffset::None), GRID_HEIGHT / 2);

        assert_eq!(u_to_longitude(GRID_WIDTH / 2), 0.);
        assert_eq!(v_to_latitude(GRID_HEIGHT / 2, LatitudeOffset::None), 0.);
        assert_eq!(v_to_latitude(0, LatitudeOffset::FullTile), 90. - LATITUDE_DEGREES_PER_TILE);
    }

    #[test]
    fn snap_is_idempotent() {
        let offsets = [LatitudeOffset::None, LatitudeOffset::HalfTile, LatitudeOffset::FullTile];
        for offset in offsets {
            for (u, v) in [(0, 0), (1, 1), (8504, 5473), (GRID_WIDTH - 1, GRID_HEIGHT - 1)] {
                let index = TileIndex::new(u, v);
                let north_west = index.north_west(offset);

                let snapped = TileIndex::containing(north_west, offset);
                assert_eq!(snapped, index);
                assert_eq!(snapped.north_west(offset), north_west);
            }
        }
    }

    #[test]
    fn point_to_tile() {
        let point = GeoPoint::new(47.6062, -122.3321);
        let index = TileIndex::containing(point, LatitudeOffset::None);

        assert!(index.is_valid());
        assert!(index.bounds(LatitudeOffset::None).contains(point));
    }

    #[test]
    fn tile_bounds() {
        let bounds = TileIndex::new(GRID_WIDTH / 2, GRID_HEIGHT / 2).bounds(LatitudeOffset::None);

        assert_eq!(bounds.north_west, GeoPoint::new(0., 0.));
        assert_eq!(
            bounds.south_east,
            GeoPoint::new(-LATITUDE_DEGREES_PER_TILE, LONGITUDE_DEGREES_PER_TILE)
        );

        // Roughly 1.6km wide and 1.2km high at the equator.
        assert_eq!((bounds.width_km() * 10.).round(), 16.);
        assert_eq!((bounds.height_km() * 10.).round(), 12.);
    }
}
