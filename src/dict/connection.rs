//! Connection matrix: pairwise POS transition costs.
//!
//! Stored on disk as a raw big-endian i16 stream of exactly dim² values,
//! the only big-endian structure in the set. In memory it is a row-major
//! square matrix; out-of-range lookups return 0 rather than faulting, for
//! parity with generated corpora.

use std::fs;
use std::path::Path;

use memmap2::Mmap;

use super::DictError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMatrix {
    dim: usize,
    data: Vec<i16>,
}

impl ConnectionMatrix {
    /// Build from row-major values. The length must be a non-empty perfect
    /// square.
    pub fn from_values(data: Vec<i16>) -> Result<Self, DictError> {
        if data.is_empty() {
            return Err(DictError::Parse("empty connection stream".to_string()));
        }
        let dim = isqrt(data.len());
        if dim * dim != data.len() {
            return Err(DictError::NotSquare(data.len()));
        }
        Ok(Self { dim, data })
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Cost of transitioning from right-POS `left` to left-POS `right`.
    /// Out-of-range ids (including negatives) cost 0.
    pub fn get(&self, left: i16, right: i16) -> i16 {
        if left < 0 || right < 0 {
            return 0;
        }
        let (l, r) = (left as usize, right as usize);
        if l >= self.dim || r >= self.dim {
            return 0;
        }
        self.data[l * self.dim + r]
    }

    /// Serialize as the raw big-endian stream.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() * 2);
        for &v in &self.data {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out
    }

    /// Parse a raw big-endian stream.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DictError> {
        if data.len() % 2 != 0 {
            return Err(DictError::OddByteCount(data.len()));
        }
        let values = data
            .chunks_exact(2)
            .map(|b| i16::from_be_bytes([b[0], b[1]]))
            .collect();
        Self::from_values(values)
    }

    pub fn save(&self, path: &Path) -> Result<(), DictError> {
        Ok(fs::write(path, self.to_bytes())?)
    }

    pub fn open(path: &Path) -> Result<Self, DictError> {
        let file = fs::File::open(path)?;
        // SAFETY: read-only mapping, dropped after parsing.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
    }
}

fn isqrt(n: usize) -> usize {
    (n as f64).sqrt().round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConnectionMatrix {
        // 3x3: cost(l, r) = l * 10 + r
        let data: Vec<i16> = (0..3)
            .flat_map(|l| (0..3).map(move |r| (l * 10 + r) as i16))
            .collect();
        ConnectionMatrix::from_values(data).unwrap()
    }

    #[test]
    fn test_get() {
        let conn = sample();
        assert_eq!(conn.dim(), 3);
        assert_eq!(conn.get(0, 0), 0);
        assert_eq!(conn.get(1, 2), 12);
        assert_eq!(conn.get(2, 1), 21);
    }

    #[test]
    fn test_out_of_range_is_zero() {
        let conn = sample();
        assert_eq!(conn.get(3, 0), 0);
        assert_eq!(conn.get(0, 3), 0);
        assert_eq!(conn.get(-1, 0), 0);
        assert_eq!(conn.get(0, -5), 0);
    }

    #[test]
    fn test_not_square() {
        assert!(matches!(
            ConnectionMatrix::from_values(vec![0; 8]),
            Err(DictError::NotSquare(8))
        ));
        assert!(ConnectionMatrix::from_values(Vec::new()).is_err());
    }

    #[test]
    fn test_big_endian_stream() {
        let conn = ConnectionMatrix::from_values(vec![0x0102, -2]).ok();
        assert!(conn.is_none(), "2 values is not square");

        let conn = ConnectionMatrix::from_values(vec![0x0102]).unwrap();
        assert_eq!(conn.to_bytes(), vec![0x01, 0x02]);

        let back = ConnectionMatrix::from_bytes(&[0x01, 0x02]).unwrap();
        assert_eq!(back.get(0, 0), 0x0102);
    }

    #[test]
    fn test_negative_cost_roundtrip() {
        let conn = ConnectionMatrix::from_values(vec![-300, 5, 0, i16::MIN]).unwrap();
        let back = ConnectionMatrix::from_bytes(&conn.to_bytes()).unwrap();
        assert_eq!(back, conn);
        assert_eq!(back.get(1, 1), i16::MIN);
    }

    #[test]
    fn test_odd_byte_count() {
        assert!(matches!(
            ConnectionMatrix::from_bytes(&[0x00, 0x01, 0x02]),
            Err(DictError::OddByteCount(3))
        ));
    }

    #[test]
    fn test_save_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connection.bin");
        let conn = sample();
        conn.save(&path).unwrap();
        let back = ConnectionMatrix::open(&path).unwrap();
        assert_eq!(back, conn);
    }
}
