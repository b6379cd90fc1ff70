//! Per-kind chunk payloads.

use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};

use uuid::Uuid;

use crate::Error;
use crate::chunk::io::{IDENTIFIER_SIZE, PayloadReader, PayloadWriter, VERTEX_SIZE};
use crate::geometry::Vertex;

/// Version stamped into tiles written by the scenery tools.
const DEFAULT_VERSION: i32 = 1_091_777_331;

/// Extrusion height of newly created polygon buildings.
const DEFAULT_EXTRUSION_HEIGHT: f32 = -0.00945066;

/// Opaque 128-bit type identifier.
///
/// Identifiers are stored in the mixed-endian GUID layout, with the first
/// three groups in little-endian byte order.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Debug)]
pub struct Identifier([u8; 16]);

impl Identifier {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_bytes_le(self.0))
    }
}

/// Root chunk.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Riff {
    pub sub_type: [u8; 4],
}

impl Default for Riff {
    fn default() -> Self {
        Self { sub_type: *b"AGNX" }
    }
}

impl Riff {
    pub fn size(&self) -> usize {
        4
    }

    pub(super) fn decode(reader: &mut PayloadReader) -> Result<Self, Error> {
        Ok(Self { sub_type: reader.tag_bytes()? })
    }

    pub(super) fn encode<W: Write>(&self, writer: &mut PayloadWriter<W>) -> io::Result<()> {
        writer.bytes(&self.sub_type)
    }
}

/// Format version stamp.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Version {
    pub version: i32,
}

impl Default for Version {
    fn default() -> Self {
        Self { version: DEFAULT_VERSION }
    }
}

impl Version {
    pub fn size(&self) -> usize {
        4
    }

    pub(super) fn decode(reader: &mut PayloadReader) -> Result<Self, Error> {
        Ok(Self { version: reader.i32()? })
    }

    pub(super) fn encode<W: Write>(&self, writer: &mut PayloadWriter<W>) -> io::Result<()> {
        writer.i32(self.version)
    }
}

/// Share of generic buildings per height class, in percent.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub struct BuildingDistribution {
    pub one_to_two_floors: i32,
    pub three_to_five_floors: i32,
    pub six_to_eight_floors: i32,
    pub nine_to_twelve_floors: i32,
}

impl BuildingDistribution {
    pub fn size(&self) -> usize {
        16
    }

    pub(super) fn decode(reader: &mut PayloadReader) -> Result<Self, Error> {
        Ok(Self {
            one_to_two_floors: reader.i32()?,
            three_to_five_floors: reader.i32()?,
            six_to_eight_floors: reader.i32()?,
            nine_to_twelve_floors: reader.i32()?,
        })
    }

    pub(super) fn encode<W: Write>(&self, writer: &mut PayloadWriter<W>) -> io::Result<()> {
        writer.i32(self.one_to_two_floors)?;
        writer.i32(self.three_to_five_floors)?;
        writer.i32(self.six_to_eight_floors)?;
        writer.i32(self.nine_to_twelve_floors)
    }
}

/// Generic building footprint.
#[derive(Clone, PartialEq, Default, Debug)]
pub struct GenericBuilding {
    pub roof_type: Identifier,
    pub vertices: Vec<Vertex>,
}

impl GenericBuilding {
    pub fn size(&self) -> usize {
        IDENTIFIER_SIZE + self.vertices.len() * VERTEX_SIZE
    }

    pub(super) fn decode(reader: &mut PayloadReader) -> Result<Self, Error> {
        let roof_type = reader.identifier()?;
        let vertices = reader.remaining_vertices()?;
        Ok(Self { roof_type, vertices })
    }

    pub(super) fn encode<W: Write>(&self, writer: &mut PayloadWriter<W>) -> io::Result<()> {
        writer.identifier(self.roof_type)?;
        writer.vertices(&self.vertices)
    }
}

/// Extruded building footprint.
#[derive(Clone, PartialEq, Debug)]
pub struct PolygonBuilding {
    pub building_type: Identifier,
    pub extrusion_height: f32,
    pub vertices: Vec<Vertex>,
}

impl Default for PolygonBuilding {
    fn default() -> Self {
        Self {
            extrusion_height: DEFAULT_EXTRUSION_HEIGHT,
            building_type: Default::default(),
            vertices: Default::default(),
        }
    }
}

impl PolygonBuilding {
    pub fn size(&self) -> usize {
        IDENTIFIER_SIZE + 12 + self.vertices.len() * VERTEX_SIZE
    }

    pub(super) fn decode(reader: &mut PayloadReader) -> Result<Self, Error> {
        let building_type = reader.identifier()?;

        // Reserved, always 1 in known files.
        let _ = reader.i32()?;

        let extrusion_height = reader.f32()?;
        let count = reader.vertex_count()?;
        let vertices = reader.vertices(count)?;

        Ok(Self { building_type, extrusion_height, vertices })
    }

    pub(super) fn encode<W: Write>(&self, writer: &mut PayloadWriter<W>) -> io::Result<()> {
        writer.identifier(self.building_type)?;
        writer.i32(1)?;
        writer.f32(self.extrusion_height)?;
        writer.counted_vertices(&self.vertices)
    }
}

/// Vegetation region outline.
#[derive(Clone, PartialEq, Default, Debug)]
pub struct VegetationPolygon {
    pub vegetation_type: Identifier,
    pub vertices: Vec<Vertex>,
}

impl VegetationPolygon {
    pub fn new(vegetation_type: Identifier, vertices: Vec<Vertex>) -> Self {
        Self { vegetation_type, vertices }
    }

    pub fn size(&self) -> usize {
        IDENTIFIER_SIZE + 4 + self.vertices.len() * VERTEX_SIZE
    }

    pub(super) fn decode(reader: &mut PayloadReader) -> Result<Self, Error> {
        let vegetation_type = reader.identifier()?;
        let count = reader.vertex_count()?;
        let vertices = reader.vertices(count)?;
        Ok(Self { vegetation_type, vertices })
    }

    pub(super) fn encode<W: Write>(&self, writer: &mut PayloadWriter<W>) -> io::Result<()> {
        writer.identifier(self.vegetation_type)?;
        writer.counted_vertices(&self.vertices)
    }
}

impl Display for VegetationPolygon {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.vegetation_type)?;
        for vertex in &self.vertices {
            let (x, y) = vertex.to_f32();
            write!(f, "|{x}|{y}")?;
        }
        Ok(())
    }
}

/// Row house footprint.
#[derive(Clone, PartialEq, Default, Debug)]
pub struct RowHouse {
    pub vertices: Vec<Vertex>,
}

impl RowHouse {
    pub fn size(&self) -> usize {
        self.vertices.len() * VERTEX_SIZE
    }

    pub(super) fn decode(reader: &mut PayloadReader) -> Result<Self, Error> {
        Ok(Self { vertices: reader.remaining_vertices()? })
    }

    pub(super) fn encode<W: Write>(&self, writer: &mut PayloadWriter<W>) -> io::Result<()> {
        writer.vertices(&self.vertices)
    }
}

/// Placed library object.
///
/// Most objects carry two points describing position and orientation, some
/// carry a third for scale.
#[derive(Clone, PartialEq, Default, Debug)]
pub struct LibraryObject {
    pub object_id: Identifier,
    pub vertices: Vec<Vertex>,
}

impl LibraryObject {
    pub fn size(&self) -> usize {
        IDENTIFIER_SIZE + self.vertices.len() * VERTEX_SIZE
    }

    pub(super) fn decode(reader: &mut PayloadReader) -> Result<Self, Error> {
        let object_id = reader.identifier()?;
        let vertices = reader.remaining_vertices()?;
        Ok(Self { object_id, vertices })
    }

    pub(super) fn encode<W: Write>(&self, writer: &mut PayloadWriter<W>) -> io::Result<()> {
        writer.identifier(self.object_id)?;
        writer.vertices(&self.vertices)
    }
}

/// Axis-aligned vegetation rectangle.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct RectangularVegetationArea {
    pub vegetation_type: Identifier,
    pub first: Vertex,
    pub second: Vertex,
}

impl Default for RectangularVegetationArea {
    fn default() -> Self {
        Self {
            vegetation_type: Default::default(),
            first: Vertex::from((-0.1f32, -0.1f32)),
            second: Vertex::from((0.1f32, -0.1f32)),
        }
    }
}

impl RectangularVegetationArea {
    pub fn size(&self) -> usize {
        IDENTIFIER_SIZE + 2 * VERTEX_SIZE
    }

    pub(super) fn decode(reader: &mut PayloadReader) -> Result<Self, Error> {
        if reader.size() != IDENTIFIER_SIZE + 2 * VERTEX_SIZE {
            return Err(reader.corrupt("expected exactly two corners"));
        }

        let vegetation_type = reader.identifier()?;
        let first = reader.vertex()?;
        let second = reader.vertex()?;
        Ok(Self { vegetation_type, first, second })
    }

    pub(super) fn encode<W: Write>(&self, writer: &mut PayloadWriter<W>) -> io::Result<()> {
        writer.identifier(self.vegetation_type)?;
        writer.vertex(self.first)?;
        writer.vertex(self.second)
    }
}
