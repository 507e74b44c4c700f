//! Kana-to-kanji conversion engine.
//!
//! The engine accepts a hiragana reading and returns the N best surface-form
//! transcriptions ranked by linguistic cost. Dictionaries are stored as LOUDS
//! succinct tries plus a token-array posting store; the search builds a word
//! lattice over the reading and runs forward dynamic programming followed by
//! backward A* to enumerate candidates in cost order.

// The on-disk integer arrays are host-endian by contract.
#[cfg(not(target_endian = "little"))]
compile_error!("henkan requires a little-endian platform");

pub mod bits;
pub mod converter;
pub mod dict;
mod engine;
pub mod louds;
pub(crate) mod serial;
pub mod unicode;
pub mod utf16;

pub use engine::{Conversion, Engine};
