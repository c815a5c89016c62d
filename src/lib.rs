//! `binmap` is a compact, self-packing tree that tracks the fill state of
//! every leaf of a conceptual complete binary tree, of up to `2^32` leaves.
//!
//! The tree is represented as a small set of two-way cells: a cell either
//! holds two plain bitmap words (for subtrees narrow enough to fit the
//! uniform/mixed state of up to 32 leaves in 32 bits) or references to
//! further cells. [`Binmap::set`] and [`Binmap::reset`] expand cells lazily
//! as a range is split, and fold them back together the moment a subtree
//! becomes uniform again, so the live cell count always tracks the number
//! of boundaries between filled and empty regions rather than the number of
//! leaves.
//!
//! [`Bin`] names a node of that conceptual tree (a leaf or one of its
//! ancestors) with a single `u32`, and [`Binmap`] is the tree itself.

mod bin;
mod binmap;
mod cell;
mod convert;
mod error;
mod fill;
mod tables;

pub use bin::Bin;
pub use binmap::Binmap;
pub use convert::{apply_bytes, apply_hex};
pub use error::ConvertError;
pub use fill::Fill;

#[cfg(test)]
mod tests;
