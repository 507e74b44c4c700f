//! Little-endian binary encoding helpers shared by the persisted structures.
//!
//! Every multi-byte integer except the connection matrix stream is
//! little-endian. A serialized bit vector is `u64 bit_len`, `u64 word_count`,
//! then the packed words.

use crate::bits::BitVector;
use crate::dict::DictError;

/// Cursor over a byte slice; every read fails with `DictError::Truncated`
/// instead of panicking when the data runs out.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DictError> {
        let end = self.pos.checked_add(n).ok_or(DictError::Truncated)?;
        if end > self.data.len() {
            return Err(DictError::Truncated);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u16(&mut self) -> Result<u16, DictError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16, DictError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, DictError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, DictError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, DictError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("8-byte slice")))
    }

    /// Bail out before allocating when a declared count cannot fit in the
    /// remaining bytes.
    fn check_count(&self, n: usize, elem_size: usize) -> Result<(), DictError> {
        match n.checked_mul(elem_size) {
            Some(bytes) if bytes <= self.remaining() => Ok(()),
            _ => Err(DictError::Truncated),
        }
    }

    pub fn read_u16_vec(&mut self, n: usize) -> Result<Vec<u16>, DictError> {
        self.check_count(n, 2)?;
        (0..n).map(|_| self.read_u16()).collect()
    }

    pub fn read_i16_vec(&mut self, n: usize) -> Result<Vec<i16>, DictError> {
        self.check_count(n, 2)?;
        (0..n).map(|_| self.read_i16()).collect()
    }

    pub fn read_i32_vec(&mut self, n: usize) -> Result<Vec<i32>, DictError> {
        self.check_count(n, 4)?;
        (0..n).map(|_| self.read_i32()).collect()
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Fails unless every byte has been consumed.
    pub fn finish(&self) -> Result<(), DictError> {
        let rest = self.data.len() - self.pos;
        if rest != 0 {
            return Err(DictError::TrailingBytes(rest));
        }
        Ok(())
    }
}

pub(crate) fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_bitvec(out: &mut Vec<u8>, bv: &BitVector) {
    put_u64(out, bv.len() as u64);
    put_u64(out, bv.words().len() as u64);
    for &w in bv.words() {
        out.extend_from_slice(&w.to_le_bytes());
    }
}

pub(crate) fn read_bitvec(r: &mut ByteReader<'_>) -> Result<BitVector, DictError> {
    let bits = r.read_u64()?;
    let word_count = r.read_u64()?;
    let expected = bits.checked_add(63).ok_or(DictError::Truncated)? / 64;
    if expected != word_count {
        return Err(DictError::WordCountMismatch {
            bits,
            words: word_count,
        });
    }
    // Bound the allocation by the bytes actually present.
    if word_count.checked_mul(8).ok_or(DictError::Truncated)? > r.remaining() as u64 {
        return Err(DictError::Truncated);
    }
    let mut words = Vec::with_capacity(word_count as usize);
    for _ in 0..word_count {
        words.push(r.read_u64()?);
    }
    Ok(BitVector::from_words(bits as usize, words))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitvec_roundtrip() {
        let mut bv = BitVector::new();
        for i in 0..100 {
            bv.push(i % 5 == 0 || i % 3 == 0);
        }
        let mut out = Vec::new();
        put_bitvec(&mut out, &bv);
        let mut r = ByteReader::new(&out);
        let back = read_bitvec(&mut r).unwrap();
        r.finish().unwrap();
        assert_eq!(back, bv);
    }

    #[test]
    fn test_truncated() {
        let mut out = Vec::new();
        put_u64(&mut out, 100);
        let mut r = ByteReader::new(&out);
        assert!(matches!(read_bitvec(&mut r), Err(DictError::Truncated)));
    }

    #[test]
    fn test_word_count_mismatch() {
        let mut out = Vec::new();
        put_u64(&mut out, 100);
        put_u64(&mut out, 7); // 100 bits need 2 words, not 7
        let mut r = ByteReader::new(&out);
        assert!(matches!(
            read_bitvec(&mut r),
            Err(DictError::WordCountMismatch { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut out = Vec::new();
        put_u32(&mut out, 1);
        out.push(0xFF);
        let mut r = ByteReader::new(&out);
        r.read_u32().unwrap();
        assert!(matches!(r.finish(), Err(DictError::TrailingBytes(1))));
    }
}
