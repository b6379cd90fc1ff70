//! Tagged chunk tree.
//!
//! Every chunk starts with a 4 byte ASCII tag, followed by a little-endian
//! `i32` holding the size of everything after the header: the chunk's own
//! payload and all of its children, including their headers.
//!
//! ```text
//! RIFF <size> "AGNX"
//!   VERS <size> <i32>
//!   GBDD <size> <4 x i32>
//!   PREG <size>
//!     PRDE <size> <id> <count> <vertices>
//!     PRDE <size> <id> <count> <vertices>
//!   AGN2 <size>
//!     A2GE <size> <id> <vertices>
//! ```

use std::fmt::{self, Display, Formatter};

pub use crate::chunk::reader::decode;
pub use crate::chunk::records::{
    BuildingDistribution, GenericBuilding, Identifier, LibraryObject, PolygonBuilding,
    RectangularVegetationArea, Riff, RowHouse, VegetationPolygon, Version,
};
pub use crate::chunk::writer::encode;

mod io;
mod reader;
mod records;
mod writer;

/// Size of a chunk's tag and size fields.
pub const HEADER_SIZE: usize = 8;

/// On-disk tag of each chunk kind.
///
/// XXX: The position in this table is the kind's identity, this must never be
/// reordered.
const TAGS: [[u8; 4]; 19] = [
    *b"VERS", *b"GBDD", *b"GBTE", *b"RHTE", *b"GBLD", *b"GBLR", *b"PREG", *b"RIFF", *b"PRDE",
    *b"VGRD", *b"VGRO", *b"VGRE", *b"VGRG", *b"AGN2", *b"A2GE", *b"AGNX", *b"PBLD", *b"PBDE",
    *b"ROWH",
];

/// Chunk kind.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[repr(u8)]
pub enum Tag {
    Version = 0,
    BuildingDistribution = 1,
    GenericBuildingTexture = 2,
    RowHouseTexture = 3,
    GenericBuildingGroup = 4,
    GenericBuilding = 5,
    VegetationPolygonGroup = 6,
    Riff = 7,
    VegetationPolygon = 8,
    VegetationDefinition = 9,
    LegacyRectangularVegetationArea = 10,
    RectangularVegetationArea = 11,
    RectangularVegetationAreaGroup = 12,
    LibraryObjectGroup = 13,
    LibraryObject = 14,
    Extension = 15,
    PolygonBuildingGroup = 16,
    PolygonBuilding = 17,
    RowHouse = 18,
}

impl Tag {
    /// All chunk kinds, in on-disk identity order.
    pub const ALL: [Tag; 19] = [
        Tag::Version,
        Tag::BuildingDistribution,
        Tag::GenericBuildingTexture,
        Tag::RowHouseTexture,
        Tag::GenericBuildingGroup,
        Tag::GenericBuilding,
        Tag::VegetationPolygonGroup,
        Tag::Riff,
        Tag::VegetationPolygon,
        Tag::VegetationDefinition,
        Tag::LegacyRectangularVegetationArea,
        Tag::RectangularVegetationArea,
        Tag::RectangularVegetationAreaGroup,
        Tag::LibraryObjectGroup,
        Tag::LibraryObject,
        Tag::Extension,
        Tag::PolygonBuildingGroup,
        Tag::PolygonBuilding,
        Tag::RowHouse,
    ];

    /// Look up the kind for an on-disk tag.
    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        TAGS.iter().position(|tag| *tag == bytes).map(|index| Self::ALL[index])
    }

    /// On-disk representation of this tag.
    pub fn bytes(self) -> [u8; 4] {
        TAGS[self as usize]
    }

    /// Tags accepted as children while a chunk of this kind is open.
    ///
    /// An empty list accepts any child.
    pub fn allowed_children(self) -> &'static [Tag] {
        match self {
            Self::VegetationPolygonGroup => &[Self::VegetationPolygon],
            Self::PolygonBuildingGroup => &[Self::PolygonBuilding],
            Self::LibraryObjectGroup => &[Self::LibraryObject],
            Self::GenericBuildingGroup => &[Self::GenericBuilding],
            Self::RectangularVegetationAreaGroup => &[Self::RectangularVegetationArea],
            _ => &[],
        }
    }

    /// Check if this tag only groups children of a single kind.
    pub fn is_group(self) -> bool {
        !self.allowed_children().is_empty()
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let bytes = self.bytes();
        write!(f, "{}", String::from_utf8_lossy(&bytes))
    }
}

/// Node in the chunk tree.
#[derive(Clone, PartialEq, Debug)]
pub struct Chunk {
    pub payload: Payload,
    /// Child chunks, in file order.
    pub children: Vec<Chunk>,
}

impl Chunk {
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self { payload: payload.into(), children: Vec::new() }
    }

    /// Create a group chunk holding all `children`.
    pub fn group(tag: Tag, children: Vec<Chunk>) -> Self {
        Self { payload: Payload::Group(tag), children }
    }

    /// Kind of this chunk.
    pub fn tag(&self) -> Tag {
        self.payload.tag()
    }

    /// Size of this chunk excluding its own header.
    pub fn total_size(&self) -> usize {
        let children: usize =
            self.children.iter().map(|child| child.total_size() + HEADER_SIZE).sum();
        self.payload.size() + children
    }

    /// Iterate over this chunk and all its descendants in file order.
    pub fn iter(&self) -> ChunkIter<'_> {
        ChunkIter { stack: vec![self] }
    }
}

/// Depth-first iterator over a chunk tree.
pub struct ChunkIter<'a> {
    stack: Vec<&'a Chunk>,
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = &'a Chunk;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.stack.pop()?;
        self.stack.extend(chunk.children.iter().rev());
        Some(chunk)
    }
}

/// Kind-specific chunk content.
#[derive(Clone, PartialEq, Debug)]
pub enum Payload {
    Riff(Riff),
    Version(Version),
    BuildingDistribution(BuildingDistribution),
    GenericBuilding(GenericBuilding),
    PolygonBuilding(PolygonBuilding),
    VegetationPolygon(VegetationPolygon),
    RowHouse(RowHouse),
    LibraryObject(LibraryObject),
    RectangularVegetationArea(RectangularVegetationArea),
    /// Structural node without payload.
    Group(Tag),
}

impl Payload {
    /// Kind of this payload.
    pub fn tag(&self) -> Tag {
        match self {
            Self::Riff(_) => Tag::Riff,
            Self::Version(_) => Tag::Version,
            Self::BuildingDistribution(_) => Tag::BuildingDistribution,
            Self::GenericBuilding(_) => Tag::GenericBuilding,
            Self::PolygonBuilding(_) => Tag::PolygonBuilding,
            Self::VegetationPolygon(_) => Tag::VegetationPolygon,
            Self::RowHouse(_) => Tag::RowHouse,
            Self::LibraryObject(_) => Tag::LibraryObject,
            Self::RectangularVegetationArea(_) => Tag::RectangularVegetationArea,
            Self::Group(tag) => *tag,
        }
    }

    /// Encoded size of the payload, excluding children.
    pub fn size(&self) -> usize {
        match self {
            Self::Riff(riff) => riff.size(),
            Self::Version(version) => version.size(),
            Self::BuildingDistribution(distribution) => distribution.size(),
            Self::GenericBuilding(building) => building.size(),
            Self::PolygonBuilding(building) => building.size(),
            Self::VegetationPolygon(polygon) => polygon.size(),
            Self::RowHouse(row_house) => row_house.size(),
            Self::LibraryObject(object) => object.size(),
            Self::RectangularVegetationArea(area) => area.size(),
            Self::Group(_) => 0,
        }
    }
}

macro_rules! impl_payload_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Payload {
                fn from(record: $variant) -> Self {
                    Self::$variant(record)
                }
            }
        )*
    };
}

impl_payload_from!(
    Riff,
    Version,
    BuildingDistribution,
    GenericBuilding,
    PolygonBuilding,
    VegetationPolygon,
    RowHouse,
    LibraryObject,
    RectangularVegetationArea
);
