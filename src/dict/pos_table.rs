//! POS table: posIndex → (leftId, rightId).

use std::fs;
use std::path::Path;

use memmap2::Mmap;

use crate::serial::{self, ByteReader};

use super::DictError;

/// Parallel arrays of POS pair ids, indexed by posIndex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosTable {
    left_ids: Vec<i16>,
    right_ids: Vec<i16>,
}

impl PosTable {
    pub(crate) fn new(left_ids: Vec<i16>, right_ids: Vec<i16>) -> Self {
        debug_assert_eq!(left_ids.len(), right_ids.len());
        Self {
            left_ids,
            right_ids,
        }
    }

    pub fn len(&self) -> usize {
        self.left_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left_ids.is_empty()
    }

    /// `(leftId, rightId)` for a posIndex; `(0, 0)` when out of range.
    pub fn get(&self, pos_index: u16) -> (i16, i16) {
        let i = pos_index as usize;
        match (self.left_ids.get(i), self.right_ids.get(i)) {
            (Some(&l), Some(&r)) => (l, r),
            _ => (0, 0),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        serial::put_u32(&mut out, self.left_ids.len() as u32);
        for &id in &self.left_ids {
            serial::put_i16(&mut out, id);
        }
        for &id in &self.right_ids {
            serial::put_i16(&mut out, id);
        }
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DictError> {
        let mut r = ByteReader::new(data);
        let n = r.read_u32()? as usize;
        let left_ids = r.read_i16_vec(n)?;
        let right_ids = r.read_i16_vec(n)?;
        r.finish()?;
        Ok(Self::new(left_ids, right_ids))
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
