//! Reader and writer for autogen scenery tiles.
//!
//! Autogen tiles (`.agn`) describe the procedurally placed content of one
//! small rectangle of the globe: vegetation polygons, building footprints,
//! library objects and building height statistics. The content is stored as a
//! tree of tagged, length-prefixed chunks, similar to RIFF.
//!
//! This crate decodes and encodes these files, resolves the geographic area
//! covered by a tile from its file name, and can merge adjacent rectangular
//! vegetation polygons of the same type to reduce the number of polygons in a
//! tile.
//!
//! # Examples
//!
//! ```no_run
//! use agn::coalesce::Coalescer;
//! use agn::document::{RetryPolicy, TileDocument};
//! use agn::tiles::LatitudeOffset;
//!
//! let path = "/tmp/scenery/023120321120101an.agn";
//! let mut tile = TileDocument::from_path(path, LatitudeOffset::None).unwrap();
//!
//! let stats = Coalescer::default().coalesce(tile.vegetation_polygons_mut()).unwrap();
//! println!("Merged {} polygons", stats.merged());
//!
//! tile.save_to_path(path, &RetryPolicy::default()).unwrap();
//! ```

use crate::chunk::Tag;

pub mod chunk;
pub mod coalesce;
pub mod document;
pub mod folder;
pub mod geometry;
pub mod tiles;

/// Autogen tile error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    AtomicPersist(#[from] tempfile::PersistError),

    /// The data ended in the middle of a chunk.
    #[error("Unexpected end of tile data")]
    Truncated,
    /// A chunk's size does not match its payload layout.
    #[error("Corrupt {tag} chunk of {size} bytes: {reason}")]
    CorruptChunk { tag: Tag, size: usize, reason: &'static str },
    /// A chunk header declared a negative size.
    #[error("Chunk {tag:?} has negative size {size}")]
    NegativeSize { tag: String, size: i32 },
    /// A chunk appeared before the root chunk.
    #[error("{0} chunk outside of the RIFF root")]
    OrphanChunk(Tag),
    /// The data did not contain any root chunk.
    #[error("Missing RIFF root chunk")]
    MissingRoot,
    /// A chunk's size does not fit the size field.
    #[error("{0} chunk exceeds the maximum chunk size")]
    ChunkTooLarge(Tag),
    /// A tile token contained characters other than base-4 digits.
    #[error("Invalid tile token {0:?}")]
    InvalidToken(String),
    /// A file name did not contain a tile token.
    #[error("File name {0:?} does not identify a tile")]
    InvalidFileName(String),
    /// Boundary snapping collapsed a vegetation polygon.
    #[error("Vegetation polygon {0} collapsed while snapping to the tile boundary")]
    DegeneratePolygon(usize),
    /// Writing a tile failed on every attempt.
    #[error("Saving tile failed after {attempts} attempts: {source}")]
    SaveRetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
}
