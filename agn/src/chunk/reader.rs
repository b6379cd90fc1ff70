//! Streaming chunk tree decoder.

use std::io::{self, ErrorKind, Read};

use tracing::debug;

use crate::Error;
use crate::chunk::io::PayloadReader;
use crate::chunk::records::{
    BuildingDistribution, GenericBuilding, LibraryObject, PolygonBuilding,
    RectangularVegetationArea, Riff, RowHouse, VegetationPolygon, Version,
};
use crate::chunk::{Chunk, HEADER_SIZE, Payload, Tag};

/// Decode a chunk tree from a byte stream.
///
/// Chunks with unknown tags are skipped. When a known chunk appears inside a
/// group which does not accept it, the group is closed and the chunk is added
/// to the group's parent instead. Known chunks without a decoded payload still
/// close the group before being skipped.
pub fn decode<R: Read>(mut reader: R) -> Result<Chunk, Error> {
    let mut decoder = Decoder::default();

    while let Some((raw_tag, size)) = read_header(&mut reader)? {
        let size = usize::try_from(size).map_err(|_| Error::NegativeSize {
            tag: String::from_utf8_lossy(&raw_tag).into_owned(),
            size,
        })?;

        let Some(tag) = Tag::from_bytes(raw_tag) else {
            debug!("Skipping {size} bytes of {:?} chunk", String::from_utf8_lossy(&raw_tag));
            skip(&mut reader, size)?;
            continue;
        };

        decoder.close_rejecting(tag);

        if is_opaque(tag) {
            debug!("Skipping {size} bytes of {tag} chunk");
            skip(&mut reader, size)?;
            continue;
        }

        if tag == Tag::Riff {
            let mut sub_type = [0; 4];
            if size < sub_type.len() {
                return Err(Error::CorruptChunk { tag, size, reason: "missing sub-type" });
            }
            read_exact(&mut reader, &mut sub_type)?;
            let riff = Riff::decode(&mut PayloadReader::new(tag, &sub_type))?;
            decoder.open(Chunk::new(riff));
            continue;
        }

        if decoder.stack.is_empty() {
            return Err(Error::OrphanChunk(tag));
        }

        if tag.is_group() {
            decoder.open(Chunk::group(tag, Vec::new()));
        } else {
            let payload = read_payload(&mut reader, tag, size)?;
            decoder.append(Chunk::new(payload));
        }
    }

    decoder.finish()
}

/// Chunk which can still receive children.
struct Frame {
    chunk: Chunk,
    allowed: &'static [Tag],
}

#[derive(Default)]
struct Decoder {
    stack: Vec<Frame>,
}

impl Decoder {
    fn open(&mut self, chunk: Chunk) {
        let allowed = chunk.tag().allowed_children();
        self.stack.push(Frame { chunk, allowed });
    }

    fn append(&mut self, chunk: Chunk) {
        if let Some(frame) = self.stack.last_mut() {
            frame.chunk.children.push(chunk);
        }
    }

    /// Close the innermost frame if it does not accept `tag`.
    ///
    /// The root frame is never closed and only a single level is popped.
    fn close_rejecting(&mut self, tag: Tag) {
        if self.stack.len() <= 1 {
            return;
        }

        let rejected = self
            .stack
            .last()
            .is_some_and(|frame| !frame.allowed.is_empty() && !frame.allowed.contains(&tag));
        if rejected && let Some(frame) = self.stack.pop() {
            debug!("Closing {} group before {tag} chunk", frame.chunk.tag());
            self.append(frame.chunk);
        }
    }

    /// Fold all open frames into their parents.
    fn finish(mut self) -> Result<Chunk, Error> {
        while self.stack.len() > 1 {
            if let Some(frame) = self.stack.pop() {
                self.append(frame.chunk);
            }
        }

        self.stack.pop().map(|frame| frame.chunk).ok_or(Error::MissingRoot)
    }
}

/// Check if a tag is known, but its payload is never interpreted.
fn is_opaque(tag: Tag) -> bool {
    matches!(
        tag,
        Tag::GenericBuildingTexture
            | Tag::RowHouseTexture
            | Tag::VegetationDefinition
            | Tag::LegacyRectangularVegetationArea
            | Tag::Extension
    )
}

/// Read the next chunk header.
///
/// Returns `None` if the stream ended cleanly before the header.
fn read_header<R: Read>(reader: &mut R) -> Result<Option<([u8; 4], i32)>, Error> {
    let mut header = [0; HEADER_SIZE];
    let mut filled = 0;

    while filled < header.len() {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(Error::Truncated),
            Ok(read) => filled += read,
            Err(err) if err.kind() == ErrorKind::Interrupted => (),
            Err(err) => return Err(err.into()),
        }
    }

    let (tag, size) = header.split_at(4);
    let tag = [tag[0], tag[1], tag[2], tag[3]];
    let size = i32::from_le_bytes([size[0], size[1], size[2], size[3]]);

    Ok(Some((tag, size)))
}

/// Read and decode a leaf chunk's payload.
fn read_payload<R: Read>(reader: &mut R, tag: Tag, size: usize) -> Result<Payload, Error> {
    let mut data = Vec::new();
    reader.by_ref().take(size as u64).read_to_end(&mut data)?;
    if data.len() != size {
        return Err(Error::Truncated);
    }

    let mut payload_reader = PayloadReader::new(tag, &data);
    let payload: Payload = match tag {
        Tag::Version => Version::decode(&mut payload_reader)?.into(),
        Tag::BuildingDistribution => BuildingDistribution::decode(&mut payload_reader)?.into(),
        Tag::GenericBuilding => GenericBuilding::decode(&mut payload_reader)?.into(),
        Tag::PolygonBuilding => PolygonBuilding::decode(&mut payload_reader)?.into(),
        Tag::VegetationPolygon => VegetationPolygon::decode(&mut payload_reader)?.into(),
        Tag::RowHouse => RowHouse::decode(&mut payload_reader)?.into(),
        Tag::LibraryObject => LibraryObject::decode(&mut payload_reader)?.into(),
        Tag::RectangularVegetationArea => {
            RectangularVegetationArea::decode(&mut payload_reader)?.into()
        },
        _ => return Err(payload_reader.corrupt("unexpected payload")),
    };
    payload_reader.finish()?;

    Ok(payload)
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), Error> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        ErrorKind::UnexpectedEof => Error::Truncated,
        _ => err.into(),
    })
}

fn skip<R: Read>(reader: &mut R, size: usize) -> Result<(), Error> {
    let skipped = io::copy(&mut reader.by_ref().take(size as u64), &mut io::sink())?;
    if skipped != size as u64 {
        return Err(Error::Truncated);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::encode;
    use crate::chunk::records::Identifier;
    use crate::geometry::Vertex;

    fn chunk(tag: &[u8; 4], size: usize, payload: &[u8]) -> Vec<u8> {
        let mut data = tag.to_vec();
        data.extend_from_slice(&(size as i32).to_le_bytes());
        data.extend_from_slice(payload);
        data
    }

    fn leaf(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        chunk(tag, payload.len(), payload)
    }

    fn polygon_payload(count: i32) -> Vec<u8> {
        let mut payload = vec![7; 16];
        payload.extend_from_slice(&count.to_le_bytes());
        for _ in 0..count {
            payload.extend_from_slice(&0.5f32.to_le_bytes());
            payload.extend_from_slice(&0.25f32.to_le_bytes());
        }
        payload
    }

    #[test]
    fn skip_unknown_chunks() {
        let mut data = chunk(b"RIFF", 4 + 12 + 13 + 8 + 24, b"AGNX");
        data.extend(leaf(b"VERS", &3i32.to_le_bytes()));
        data.extend(leaf(b"ZZZZ", b"arbitrary"));
        data.extend(leaf(b"AGNX", &[]));
        data.extend(leaf(b"GBDD", &[1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0]));

        let root = decode(data.as_slice()).unwrap();
        assert_eq!(root.payload, Payload::Riff(Riff::default()));
        assert_eq!(root.children, vec![
            Chunk::new(Version { version: 3 }),
            Chunk::new(BuildingDistribution {
                one_to_two_floors: 1,
                three_to_five_floors: 2,
                six_to_eight_floors: 3,
                nine_to_twelve_floors: 4,
            }),
        ]);
    }

    #[test]
    fn close_rejecting_group() {
        let polygon = polygon_payload(2);
        let mut data = chunk(b"RIFF", 4, b"AGNX");
        data.extend(chunk(b"PREG", polygon.len() + 8, &[]));
        data.extend(leaf(b"PRDE", &polygon));
        data.extend(leaf(b"VERS", &1i32.to_le_bytes()));
        data.extend(chunk(b"AGN2", 0, &[]));
        data.extend(leaf(b"A2GE", &[0; 32]));

        let root = decode(data.as_slice()).unwrap();
        let tags: Vec<_> = root.iter().map(|chunk| chunk.tag()).collect();
        assert_eq!(tags, [
            Tag::Riff,
            Tag::VegetationPolygonGroup,
            Tag::VegetationPolygon,
            Tag::Version,
            Tag::LibraryObjectGroup,
            Tag::LibraryObject,
        ]);

        let Payload::VegetationPolygon(polygon) = &root.children[0].children[0].payload else {
            panic!("expected vegetation polygon");
        };
        assert_eq!(polygon.vegetation_type, Identifier::from_bytes([7; 16]));
        assert_eq!(polygon.vertices, vec![Vertex::new(0.5, 0.25); 2]);
    }

    #[test]
    fn opaque_chunk_closes_group() {
        let polygon = polygon_payload(1);
        let mut data = chunk(b"RIFF", 4, b"AGNX");
        data.extend(chunk(b"PREG", 0, &[]));
        data.extend(leaf(b"PRDE", &polygon));
        data.extend(leaf(b"VGRD", &[9; 6]));
        data.extend(leaf(b"PRDE", &polygon));

        let root = decode(data.as_slice()).unwrap();
        let tags: Vec<_> = root.children.iter().map(|chunk| chunk.tag()).collect();
        assert_eq!(tags, [Tag::VegetationPolygonGroup, Tag::VegetationPolygon]);
        assert_eq!(root.children[0].children.len(), 1);
    }

    #[test]
    fn truncated() {
        let mut data = chunk(b"RIFF", 4, b"AGNX");
        data.extend_from_slice(b"VE");
        assert!(matches!(decode(data.as_slice()), Err(Error::Truncated)));

        let mut data = chunk(b"RIFF", 4, b"AGNX");
        data.extend(chunk(b"VERS", 4, &[1, 0]));
        assert!(matches!(decode(data.as_slice()), Err(Error::Truncated)));

        let mut data = chunk(b"RIFF", 4, b"AGNX");
        data.extend(chunk(b"QQQQ", 100, &[0; 10]));
        assert!(matches!(decode(data.as_slice()), Err(Error::Truncated)));

        let data = chunk(b"RIFF", 4, b"AG");
        assert!(matches!(decode(data.as_slice()), Err(Error::Truncated)));
    }

    #[test]
    fn negative_size() {
        let mut data = chunk(b"RIFF", 4, b"AGNX");
        data.extend(chunk(b"VERS", 0, &[]));
        data[16..20].copy_from_slice(&(-4i32).to_le_bytes());

        let result = decode(data.as_slice());
        assert!(matches!(result, Err(Error::NegativeSize { size: -4, .. })));
    }

    #[test]
    fn corrupt_payload() {
        let mut payload = polygon_payload(3);
        payload.truncate(payload.len() - 8);

        let mut data = chunk(b"RIFF", 4, b"AGNX");
        data.extend(chunk(b"PREG", 0, &[]));
        data.extend(leaf(b"PRDE", &payload));

        let result = decode(data.as_slice());
        assert!(matches!(result, Err(Error::CorruptChunk { tag: Tag::VegetationPolygon, .. })));
    }

    #[test]
    fn orphan_and_missing_root() {
        let data = leaf(b"VERS", &1i32.to_le_bytes());
        assert!(matches!(decode(data.as_slice()), Err(Error::OrphanChunk(Tag::Version))));

        assert!(matches!(decode(io::empty()), Err(Error::MissingRoot)));

        let data = leaf(b"ZZZZ", &[1, 2, 3]);
        assert!(matches!(decode(data.as_slice()), Err(Error::MissingRoot)));
    }

    #[test]
    fn roundtrip() {
        let mut root = Chunk::new(Riff { sub_type: *b"TEST" });
        root.children.push(Chunk::new(Version::default()));
        root.children.push(Chunk::group(Tag::RectangularVegetationAreaGroup, vec![
            Chunk::new(RectangularVegetationArea::default()),
        ]));
        root.children.push(Chunk::group(Tag::GenericBuildingGroup, vec![
            Chunk::new(GenericBuilding {
                roof_type: Identifier::from_bytes([1; 16]),
                vertices: vec![Vertex::new(0.125, 0.75); 4],
            }),
        ]));
        root.children.push(Chunk::new(RowHouse { vertices: vec![Vertex::new(1., 0.)] }));

        let mut data = Vec::new();
        encode(&root, &mut data).unwrap();

        assert_eq!(decode(data.as_slice()).unwrap(), root);
    }
}
