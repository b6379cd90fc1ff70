//! Little-endian primitives for chunk payloads.

use std::io::{self, Write};

use crate::Error;
use crate::chunk::Tag;
use crate::chunk::records::Identifier;
use crate::geometry::Vertex;

/// Size of an encoded vertex.
pub const VERTEX_SIZE: usize = 8;

/// Size of an encoded identifier.
pub const IDENTIFIER_SIZE: usize = 16;

/// Reader over a single chunk's payload bytes.
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    size: usize,
    tag: Tag,
}

impl<'a> PayloadReader<'a> {
    pub fn new(tag: Tag, buf: &'a [u8]) -> Self {
        Self { size: buf.len(), buf, tag }
    }

    /// Total payload size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of bytes not read yet.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Create a corrupt data error for this chunk.
    #[cold]
    pub fn corrupt(&self, reason: &'static str) -> Error {
        Error::CorruptChunk { tag: self.tag, size: self.size, reason }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        match self.buf.split_first_chunk::<N>() {
            Some((head, tail)) => {
                self.buf = tail;
                Ok(*head)
            },
            None => Err(self.corrupt("payload ended early")),
        }
    }

    pub fn i32(&mut self) -> Result<i32, Error> {
        self.take().map(i32::from_le_bytes)
    }

    pub fn f32(&mut self) -> Result<f32, Error> {
        self.take().map(f32::from_le_bytes)
    }

    pub fn tag_bytes(&mut self) -> Result<[u8; 4], Error> {
        self.take()
    }

    pub fn identifier(&mut self) -> Result<Identifier, Error> {
        self.take().map(Identifier::from_bytes)
    }

    pub fn vertex(&mut self) -> Result<Vertex, Error> {
        let x = self.f32()?;
        let y = self.f32()?;
        Ok(Vertex::from((x, y)))
    }

    /// Read a vertex count prefix, ensuring the vertices fill the remaining
    /// payload exactly.
    pub fn vertex_count(&mut self) -> Result<usize, Error> {
        let count = usize::try_from(self.i32()?).map_err(|_| self.corrupt("negative count"))?;
        if count.checked_mul(VERTEX_SIZE) != Some(self.remaining()) {
            return Err(self.corrupt("vertex count does not match size"));
        }
        Ok(count)
    }

    /// Read vertices until the payload is exhausted.
    pub fn remaining_vertices(&mut self) -> Result<Vec<Vertex>, Error> {
        if self.remaining() % VERTEX_SIZE != 0 {
            return Err(self.corrupt("size is not a multiple of the vertex size"));
        }
        self.vertices(self.remaining() / VERTEX_SIZE)
    }

    pub fn vertices(&mut self, count: usize) -> Result<Vec<Vertex>, Error> {
        (0..count).map(|_| self.vertex()).collect()
    }

    /// Ensure the entire payload was consumed.
    pub fn finish(self) -> Result<(), Error> {
        if self.buf.is_empty() { Ok(()) } else { Err(self.corrupt("trailing payload bytes")) }
    }
}

/// Little-endian writer for chunk payloads.
pub struct PayloadWriter<'a, W> {
    writer: &'a mut W,
}

impl<'a, W: Write> PayloadWriter<'a, W> {
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }

    pub fn i32(&mut self, value: i32) -> io::Result<()> {
        self.writer.write_all(&value.to_le_bytes())
    }

    pub fn f32(&mut self, value: f32) -> io::Result<()> {
        self.writer.write_all(&value.to_le_bytes())
    }

    pub fn identifier(&mut self, identifier: Identifier) -> io::Result<()> {
        self.writer.write_all(identifier.as_bytes())
    }

    pub fn vertex(&mut self, vertex: Vertex) -> io::Result<()> {
        let (x, y) = vertex.to_f32();
        self.f32(x)?;
        self.f32(y)
    }

    pub fn vertices(&mut self, vertices: &[Vertex]) -> io::Result<()> {
        vertices.iter().try_for_each(|vertex| self.vertex(*vertex))
    }

    /// Write a count-prefixed vertex list.
    pub fn counted_vertices(&mut self, vertices: &[Vertex]) -> io::Result<()> {
        let count = i32::try_from(vertices.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many vertices"))?;
        self.i32(count)?;
        self.vertices(vertices)
    }
}
