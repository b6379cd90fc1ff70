//! Chunk tree encoder.

use std::io::Write;

use crate::Error;
use crate::chunk::io::PayloadWriter;
use crate::chunk::{Chunk, Payload};

/// Encode a chunk tree, writing every node depth-first.
pub fn encode<W: Write>(chunk: &Chunk, writer: &mut W) -> Result<(), Error> {
    let tag = chunk.tag();
    let size = i32::try_from(chunk.total_size()).map_err(|_| Error::ChunkTooLarge(tag))?;

    let mut payload_writer = PayloadWriter::new(writer);
    payload_writer.bytes(&tag.bytes())?;
    payload_writer.i32(size)?;

    match &chunk.payload {
        Payload::Riff(riff) => riff.encode(&mut payload_writer)?,
        Payload::Version(version) => version.encode(&mut payload_writer)?,
        Payload::BuildingDistribution(distribution) => distribution.encode(&mut payload_writer)?,
        Payload::GenericBuilding(building) => building.encode(&mut payload_writer)?,
        Payload::PolygonBuilding(building) => building.encode(&mut payload_writer)?,
        Payload::VegetationPolygon(polygon) => polygon.encode(&mut payload_writer)?,
        Payload::RowHouse(row_house) => row_house.encode(&mut payload_writer)?,
        Payload::LibraryObject(object) => object.encode(&mut payload_writer)?,
        Payload::RectangularVegetationArea(area) => area.encode(&mut payload_writer)?,
        Payload::Group(_) => (),
    }

    for child in &chunk.children {
        encode(child, writer)?;
    }

    Ok(())
}
