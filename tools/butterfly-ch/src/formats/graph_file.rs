//! Graph file format (`.bch`) - node and edge tables with a CRC-64 footer
//!
//! Layout (little-endian):
//! - 64-byte header
//! - `node_count` node records of 5 × u32 `[edge_ref, lat, lon, ele, level]`
//! - `edge_count` edge records of 10 × u32
//!   `[node_a, node_b, link_a, link_b, weight_lo, weight_hi, flags, skip_1, skip_2, orig]`
//! - u64 CRC-64 of everything before it
//!
//! Loading checks length against the header counts, then the checksum, then every stored
//! reference, before the tables are handed to [`GraphStorage`].

use anyhow::{bail, Context, Result};
use memmap2::Mmap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::crc;
use crate::storage::graph::{EDGE_WORDS, NODE_WORDS};
use crate::storage::{BBox, DataAccess, GraphStorage, RamDataAccess};
use crate::weighting::Weighting;

const MAGIC: u32 = 0x4243_4847; // "BCHG"
const VERSION: u16 = 2;
pub const HEADER_LEN: usize = 64;

const FLAG_CONTRACTED: u16 = 0x0001;
const WEIGHTING_SHIFT: u16 = 4;
const WEIGHTING_MASK: u16 = 0x00F0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphHeader {
    pub version: u16,
    pub contracted: bool,
    pub weighting: Option<Weighting>,
    pub node_count: u32,
    pub edge_count: u32,
    pub shortcut_count: u32,
    pub created_unix: u64,
    pub bbox: BBox,
}

impl GraphHeader {
    fn from_graph<D: DataAccess>(graph: &GraphStorage<D>) -> Self {
        Self {
            version: VERSION,
            contracted: graph.is_contracted(),
            weighting: graph.weighting(),
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            shortcut_count: graph.shortcut_count(),
            created_unix: chrono::Utc::now().timestamp().max(0) as u64,
            bbox: graph.bounds(),
        }
    }

    fn flags(&self) -> u16 {
        let mut flags = 0;
        if self.contracted {
            flags |= FLAG_CONTRACTED;
        }
        if let Some(w) = self.weighting {
            flags |= (w.code() << WEIGHTING_SHIFT) & WEIGHTING_MASK;
        }
        flags
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN);
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.flags().to_le_bytes());
        bytes.extend_from_slice(&self.node_count.to_le_bytes());
        bytes.extend_from_slice(&self.edge_count.to_le_bytes());
        bytes.extend_from_slice(&self.shortcut_count.to_le_bytes());
        bytes.extend_from_slice(&(NODE_WORDS as u16).to_le_bytes());
        bytes.extend_from_slice(&(EDGE_WORDS as u16).to_le_bytes());
        bytes.extend_from_slice(&self.created_unix.to_le_bytes());
        bytes.extend_from_slice(&self.bbox.min_lat.to_le_bytes());
        bytes.extend_from_slice(&self.bbox.min_lon.to_le_bytes());
        bytes.extend_from_slice(&self.bbox.max_lat.to_le_bytes());
        bytes.extend_from_slice(&self.bbox.max_lon.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            bail!("Header too short: {} bytes", bytes.len());
        }

        let magic = u32::from_le_bytes(bytes[0..4].try_into()?);
        if magic != MAGIC {
            bail!("Invalid magic number: {:08x}", magic);
        }

        let version = u16::from_le_bytes(bytes[4..6].try_into()?);
        if version != VERSION {
            bail!("Unsupported version: {}", version);
        }

        let flags = u16::from_le_bytes(bytes[6..8].try_into()?);
        let node_words = u16::from_le_bytes(bytes[20..22].try_into()?);
        let edge_words = u16::from_le_bytes(bytes[22..24].try_into()?);
        if node_words as usize != NODE_WORDS || edge_words as usize != EDGE_WORDS {
            bail!(
                "Unsupported record sizes: {} node words, {} edge words",
                node_words,
                edge_words
            );
        }

        let weighting = match (flags & WEIGHTING_MASK) >> WEIGHTING_SHIFT {
            0 => None,
            code => Some(
                Weighting::from_code(code).with_context(|| format!("Unknown weighting code {code}"))?,
            ),
        };

        Ok(Self {
            version,
            contracted: flags & FLAG_CONTRACTED != 0,
            weighting,
            node_count: u32::from_le_bytes(bytes[8..12].try_into()?),
            edge_count: u32::from_le_bytes(bytes[12..16].try_into()?),
            shortcut_count: u32::from_le_bytes(bytes[16..20].try_into()?),
            created_unix: u64::from_le_bytes(bytes[24..32].try_into()?),
            bbox: BBox {
                min_lat: i32::from_le_bytes(bytes[32..36].try_into()?),
                min_lon: i32::from_le_bytes(bytes[36..40].try_into()?),
                max_lat: i32::from_le_bytes(bytes[40..44].try_into()?),
                max_lon: i32::from_le_bytes(bytes[44..48].try_into()?),
            },
        })
    }

    /// Total file length implied by the counts
    pub fn expected_len(&self) -> u64 {
        HEADER_LEN as u64
            + self.node_count as u64 * NODE_WORDS as u64 * 4
            + self.edge_count as u64 * EDGE_WORDS as u64 * 4
            + crc::FOOTER_LEN as u64
    }

    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.created_unix as i64, 0)
    }
}

pub struct GraphFile;

impl GraphFile {
    pub fn write<P: AsRef<Path>, D: DataAccess>(path: P, graph: &GraphStorage<D>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let mut digest = crc::Digest::new();

        let header = GraphHeader::from_graph(graph).to_bytes();
        writer.write_all(&header)?;
        digest.update(&header);

        let mut record = Vec::with_capacity(EDGE_WORDS * 4);
        for node in 0..graph.node_count() {
            record.clear();
            for word in graph.raw_node(node) {
                record.extend_from_slice(&word.to_le_bytes());
            }
            writer.write_all(&record)?;
            digest.update(&record);
        }
        for edge in 0..graph.edge_count() {
            record.clear();
            for word in graph.raw_edge(edge) {
                record.extend_from_slice(&word.to_le_bytes());
            }
            writer.write_all(&record)?;
            digest.update(&record);
        }

        writer.write_all(&digest.finalize().to_le_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Read only the header (no checksum verification)
    pub fn read_header<P: AsRef<Path>>(path: P) -> Result<GraphHeader> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        // SAFETY: read-only mapping of a file we do not modify
        let mmap = unsafe { Mmap::map(&file)? };
        GraphHeader::from_bytes(&mmap)
    }

    /// Load a graph into memory, verifying size, checksum and structure
    pub fn read<P: AsRef<Path>>(path: P) -> Result<GraphStorage<RamDataAccess>> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        // SAFETY: read-only mapping of a file we do not modify
        let mmap = unsafe { Mmap::map(&file)? };
        let data: &[u8] = &mmap;

        let header = GraphHeader::from_bytes(data)?;
        if data.len() as u64 != header.expected_len() {
            bail!(
                "File length {} does not match header ({} nodes, {} edges → {} bytes)",
                data.len(),
                header.node_count,
                header.edge_count,
                header.expected_len()
            );
        }
        if !crc::verify_footer(data) {
            bail!("Checksum mismatch in {}", path.display());
        }

        let node_bytes = header.node_count as usize * NODE_WORDS * 4;
        let edge_bytes = header.edge_count as usize * EDGE_WORDS * 4;
        let nodes_start = HEADER_LEN;
        let edges_start = nodes_start + node_bytes;

        let nodes = RamDataAccess::from_words("nodes", decode_words(&data[nodes_start..edges_start]));
        let edges = RamDataAccess::from_words("edges", decode_words(&data[edges_start..edges_start + edge_bytes]));

        let graph = GraphStorage::from_raw_parts(
            nodes,
            edges,
            header.node_count,
            header.edge_count,
            header.shortcut_count,
            header.bbox,
            header.weighting,
            header.contracted,
        );
        graph
            .check_structure()
            .with_context(|| format!("Corrupt graph in {}", path.display()))?;
        Ok(graph)
    }
}

fn decode_words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Direction, EdgeFlags};
    use tempfile::NamedTempFile;

    fn sample() -> GraphStorage {
        let mut g = GraphStorage::new();
        g.set_coordinates(0, 52.52, 13.40, Some(34.0)).unwrap();
        g.set_coordinates(1, 52.53, 13.41, None).unwrap();
        g.set_coordinates(2, 52.54, 13.39, None).unwrap();
        let e0 = g.add_edge(0, 1, 120, EdgeFlags::both().with_speed(50)).unwrap();
        let e1 = g.add_edge(2, 1, 80, EdgeFlags::forward()).unwrap();
        g.add_shortcut(0, 2, 200, EdgeFlags::backward(), (e0, e1), 2).unwrap();
        g.set_level(1, 1);
        g
    }

    #[test]
    fn test_write_read_preserves_graph() {
        let g = sample();
        let tmp = NamedTempFile::new().unwrap();
        GraphFile::write(tmp.path(), &g).unwrap();

        let loaded = GraphFile::read(tmp.path()).unwrap();
        assert_eq!(loaded.node_count(), 3);
        assert_eq!(loaded.edge_count(), 3);
        assert_eq!(loaded.shortcut_count(), 1);
        assert_eq!(loaded.bounds(), g.bounds());
        assert_eq!(loaded.level(1), 1);
        assert_eq!(loaded.elevation(0), Some(34.0));
        for node in 0..3 {
            let a: Vec<_> = g.edges_of(node, Direction::Both).collect();
            let b: Vec<_> = loaded.edges_of(node, Direction::Both).collect();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_weights_above_32_bits_survive() {
        let mut g = GraphStorage::new();
        let e = g.add_edge(0, 1, 6_000_000_000, EdgeFlags::both()).unwrap();
        let tmp = NamedTempFile::new().unwrap();
        GraphFile::write(tmp.path(), &g).unwrap();
        let loaded = GraphFile::read(tmp.path()).unwrap();
        assert_eq!(loaded.edge(e, 1).unwrap().weight, 6_000_000_000);
    }

    #[test]
    fn test_header_flags() {
        let mut g = sample();
        g.set_weighting(Weighting::Fastest);
        g.mark_contracted();
        let tmp = NamedTempFile::new().unwrap();
        GraphFile::write(tmp.path(), &g).unwrap();

        let header = GraphFile::read_header(tmp.path()).unwrap();
        assert!(header.contracted);
        assert_eq!(header.weighting, Some(Weighting::Fastest));
        assert_eq!(header.expected_len(), std::fs::metadata(tmp.path()).unwrap().len());
        assert!(header.created_at().is_some());
    }

    #[test]
    fn test_corruption_detected() {
        let tmp = NamedTempFile::new().unwrap();
        GraphFile::write(tmp.path(), &sample()).unwrap();
        let mut bytes = std::fs::read(tmp.path()).unwrap();
        bytes[HEADER_LEN + 3] ^= 0x01;
        std::fs::write(tmp.path(), &bytes).unwrap();

        let err = GraphFile::read(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));
    }

    #[test]
    fn test_truncated_file_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        GraphFile::write(tmp.path(), &sample()).unwrap();
        let bytes = std::fs::read(tmp.path()).unwrap();
        std::fs::write(tmp.path(), &bytes[..bytes.len() - 20]).unwrap();

        let err = GraphFile::read(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("does not match header"));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), vec![0u8; 128]).unwrap();
        assert!(GraphFile::read(tmp.path()).is_err());
    }
}
