//! Stream descriptor table.
//!
//! Maps each (tile, quality) pair onto a stream index. The lowest indices
//! carry the first quality level for every tile, the next block carries the
//! next quality level, and so on:
//!
//! ```text
//! ports_per_quality = 1 + max(tile)
//! index             = tile + ports_per_quality * quality
//!
//!              tile 0   tile 1
//! quality 0       0        1
//! quality 1       2        3
//! ```
//!
//! A receiver can predict which channel carries which tile and quality
//! without any negotiation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::protocol::FourCC;
use crate::queue::FrameQueue;

/// One outgoing stream as supplied by the producer side.
#[derive(Debug, Clone)]
pub struct OutgoingStream {
    /// Spatial tile number
    pub tile: u32,

    /// Quality level (0 = first)
    pub quality: u32,

    /// Queue the producer pushes this stream's frames into
    pub queue: Arc<FrameQueue>,
}

impl OutgoingStream {
    /// Create a stream description.
    pub fn new(tile: u32, quality: u32, queue: Arc<FrameQueue>) -> Self {
        Self {
            tile,
            quality,
            queue,
        }
    }
}

/// A stream with its computed index.
///
/// The queue is shared with the producer; the descriptor never owns it.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    /// Channel index of this stream
    pub index: u32,

    /// Spatial tile number
    pub tile: u32,

    /// Quality level
    pub quality: u32,

    /// Media-type code shared by all streams of one writer
    pub fourcc: FourCC,

    /// Input queue
    pub queue: Arc<FrameQueue>,
}

/// Compute the channel index of a (tile, quality) pair.
///
/// Returns `None` on 32-bit overflow.
pub fn stream_index(tile: u32, quality: u32, ports_per_quality: u32) -> Option<u32> {
    ports_per_quality
        .checked_mul(quality)
        .and_then(|base| base.checked_add(tile))
}

// =============================================================================
// DescriptorTable
// =============================================================================

/// Immutable table of stream descriptors, built once per writer.
#[derive(Debug, Clone)]
pub struct DescriptorTable {
    descriptors: Vec<StreamDescriptor>,
    ports_per_quality: u32,
}

impl DescriptorTable {
    /// Build the table from the producer-supplied streams.
    ///
    /// Descriptors keep the order of `streams`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NoStreams`] if `streams` is empty
    /// - [`ConfigError::DuplicateStream`] if two streams share a (tile, quality) pair
    /// - [`ConfigError::IndexOverflow`] if an index does not fit in 32 bits
    /// - [`ConfigError::SharedQueue`] if two streams hold the same queue
    pub fn build(fourcc: FourCC, streams: &[OutgoingStream]) -> Result<Self, ConfigError> {
        let max_tile = streams
            .iter()
            .map(|s| s.tile)
            .max()
            .ok_or(ConfigError::NoStreams)?;

        let ports_per_quality = max_tile.checked_add(1).ok_or(ConfigError::IndexOverflow {
            tile: max_tile,
            quality: 0,
        })?;

        let mut seen: HashMap<u32, (u32, u32)> = HashMap::with_capacity(streams.len());
        let mut descriptors: Vec<StreamDescriptor> = Vec::with_capacity(streams.len());

        for stream in streams {
            let index = stream_index(stream.tile, stream.quality, ports_per_quality).ok_or(
                ConfigError::IndexOverflow {
                    tile: stream.tile,
                    quality: stream.quality,
                },
            )?;

            if seen.insert(index, (stream.tile, stream.quality)).is_some() {
                return Err(ConfigError::DuplicateStream {
                    tile: stream.tile,
                    quality: stream.quality,
                    index,
                });
            }

            if descriptors
                .iter()
                .any(|d| Arc::ptr_eq(&d.queue, &stream.queue))
            {
                return Err(ConfigError::SharedQueue { index });
            }

            descriptors.push(StreamDescriptor {
                index,
                tile: stream.tile,
                quality: stream.quality,
                fourcc,
                queue: Arc::clone(&stream.queue),
            });
        }

        Ok(Self {
            descriptors,
            ports_per_quality,
        })
    }

    /// Number of channels reserved per quality level (`1 + max(tile)`).
    pub fn ports_per_quality(&self) -> u32 {
        self.ports_per_quality
    }

    /// Number of streams.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Always false for a successfully built table.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterate descriptors in construction order.
    pub fn iter(&self) -> std::slice::Iter<'_, StreamDescriptor> {
        self.descriptors.iter()
    }

    /// Descriptor carrying channel `index`.
    pub fn get(&self, index: u32) -> Option<&StreamDescriptor> {
        self.descriptors.iter().find(|d| d.index == index)
    }

    /// All descriptors as a slice.
    pub fn as_slice(&self) -> &[StreamDescriptor] {
        &self.descriptors
    }
}

impl<'a> IntoIterator for &'a DescriptorTable {
    type Item = &'a StreamDescriptor;
    type IntoIter = std::slice::Iter<'a, StreamDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn fourcc() -> FourCC {
        FourCC::parse("cwi1").unwrap()
    }

    fn streams(pairs: &[(u32, u32)]) -> Vec<OutgoingStream> {
        pairs
            .iter()
            .map(|&(tile, quality)| {
                OutgoingStream::new(
                    tile,
                    quality,
                    Arc::new(FrameQueue::new(format!("t{}q{}", tile, quality), 2)),
                )
            })
            .collect()
    }

    #[test]
    fn test_two_tiles_two_qualities() {
        let input = streams(&[(0, 0), (1, 0), (0, 1), (1, 1)]);
        let table = DescriptorTable::build(fourcc(), &input).unwrap();

        assert_eq!(table.ports_per_quality(), 2);
        let indices: Vec<(u32, u32, u32)> = table
            .iter()
            .map(|d| (d.tile, d.quality, d.index))
            .collect();
        assert_eq!(indices, vec![(0, 0, 0), (1, 0, 1), (0, 1, 2), (1, 1, 3)]);
    }

    #[test]
    fn test_index_formula_and_uniqueness() {
        let mut pairs = Vec::new();
        for tile in 0..5 {
            for quality in 0..3 {
                pairs.push((tile, quality));
            }
        }
        let table = DescriptorTable::build(fourcc(), &streams(&pairs)).unwrap();

        assert_eq!(table.ports_per_quality(), 5);
        let mut seen = HashSet::new();
        for d in &table {
            assert_eq!(d.index, d.tile + 5 * d.quality);
            assert!(seen.insert(d.index), "index {} repeated", d.index);
        }
        assert_eq!(seen.len(), 15);
    }

    #[test]
    fn test_sparse_tiles() {
        // Only tile 3 present: indices are not contiguous but still unique
        let table = DescriptorTable::build(fourcc(), &streams(&[(3, 0), (3, 1)])).unwrap();
        assert_eq!(table.ports_per_quality(), 4);
        assert_eq!(table.get(3).unwrap().quality, 0);
        assert_eq!(table.get(7).unwrap().quality, 1);
        assert!(table.get(0).is_none());
    }

    #[test]
    fn test_empty_streams() {
        let err = DescriptorTable::build(fourcc(), &[]).unwrap_err();
        assert_eq!(err, ConfigError::NoStreams);
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let err = DescriptorTable::build(fourcc(), &streams(&[(0, 0), (1, 0), (0, 0)]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateStream {
                tile: 0,
                quality: 0,
                index: 0
            }
        );
    }

    #[test]
    fn test_index_overflow() {
        let err = DescriptorTable::build(fourcc(), &streams(&[(u32::MAX, 0)])).unwrap_err();
        assert!(matches!(err, ConfigError::IndexOverflow { .. }));

        let err =
            DescriptorTable::build(fourcc(), &streams(&[(1 << 20, 1 << 12)])).unwrap_err();
        assert!(matches!(err, ConfigError::IndexOverflow { .. }));
    }

    #[test]
    fn test_one_queue_for_two_streams_rejected() {
        let queue = Arc::new(FrameQueue::new("shared", 2));
        let input = vec![
            OutgoingStream::new(0, 0, Arc::clone(&queue)),
            OutgoingStream::new(1, 0, Arc::clone(&queue)),
        ];

        let err = DescriptorTable::build(fourcc(), &input).unwrap_err();
        assert_eq!(err, ConfigError::SharedQueue { index: 1 });
    }

    #[test]
    fn test_descriptor_shares_queue() {
        let input = streams(&[(0, 0)]);
        let table = DescriptorTable::build(fourcc(), &input).unwrap();
        let descriptor = table.get(0).unwrap();

        assert!(Arc::ptr_eq(&descriptor.queue, &input[0].queue));
        assert_eq!(descriptor.fourcc, fourcc());
        assert_eq!(table.len(), 1);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_stream_index_helper() {
        assert_eq!(stream_index(1, 2, 3), Some(7));
        assert_eq!(stream_index(0, u32::MAX, 2), None);
    }
}
