//! The binmap aggregate: the cell tree, the root bin, and the `get`/`set`/
//! `reset`/`find_empty` operations that mutate and query it.

use crate::bin::Bin;
use crate::cell::{Cell, CellRef, Half, Slab};
use crate::fill::Fill;
use crate::tables::{self, BITMAP, BITMAP_EMPTY, BITMAP_FILLED, BITMAP_LAYER_BITS};

/// A compact, self-packing tree tracking the fill state of every leaf of a
/// conceptual complete binary tree.
///
/// Construction starts the tree covering the first 64 leaves; `set`/`reset`
/// grow the covered range (the root "climbs") to reach any requested leaf.
pub struct Binmap {
    slab: Slab,
    root_bin: Bin,
}

impl Binmap {
    /// A fresh, empty binmap covering the first 64 leaves.
    pub fn new() -> Binmap {
        Binmap {
            slab: Slab::new(),
            root_bin: Bin::from_raw(63),
        }
    }

    /// Number of live cells reachable from the root.
    pub fn cells_number(&self) -> usize {
        self.slab.cells_number()
    }

    /// Number of 16-cell blocks the backing slab has grown to.
    pub fn blocks_number(&self) -> usize {
        self.slab.blocks_number()
    }

    /// Approximate heap footprint of the binmap's backing storage, in bytes.
    pub fn total_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.blocks_number() * 16 * std::mem::size_of::<Cell>()
    }

    /// The largest bin currently covered by the tree. Grows monotonically.
    pub fn root_bin(&self) -> Bin {
        self.root_bin
    }

    /// Three-valued fill state of `bin`: `Filled` iff every leaf under it is
    /// set, `Empty` iff every leaf is reset, `Mixed` otherwise. Bins outside
    /// `root_bin`'s coverage are `Empty` by definition.
    pub fn get(&self, bin: Bin) -> Fill {
        if !self.root_bin.contains(bin) {
            return Fill::Empty;
        }

        let (cur_ref, cur_bin) = self.descend(bin);

        if bin.layer_bits() > BITMAP_LAYER_BITS {
            let cell = *self.slab.cell(cur_ref);
            if bin == cur_bin {
                return fill_of_halves(cell.left, cell.right);
            }
            let half = if bin < cur_bin { cell.left } else { cell.right };
            return match half.as_bitmap() {
                Some(BITMAP_FILLED) => Fill::Filled,
                Some(_) => Fill::Empty,
                None => unreachable!("descent stops at a bitmap half or an exact match"),
            };
        }

        debug_assert!(bin != cur_bin);
        let cell = *self.slab.cell(cur_ref);
        let half = if bin < cur_bin { cell.left } else { cell.right };
        let bm = half
            .as_bitmap()
            .expect("a bin smaller than a bitmap word always stops at a bitmap half");
        let mask = BITMAP[(bin.to_raw() & BITMAP_LAYER_BITS) as usize];
        if mask & bm == mask {
            Fill::Filled
        } else if mask & bm == 0 {
            Fill::Empty
        } else {
            Fill::Mixed
        }
    }

    /// Boolean convenience form of `get`: true iff every leaf under `bin` is
    /// filled.
    pub fn get_bool(&self, bin: Bin) -> bool {
        self.get(bin).is_filled()
    }

    /// Marks every leaf under `bin` filled. A no-op on `Bin::NONE`.
    pub fn set(&mut self, bin: Bin) {
        self.update(bin, BITMAP_FILLED);
    }

    /// Marks every leaf under `bin` empty. A no-op on `Bin::NONE`.
    pub fn reset(&mut self, bin: Bin) {
        self.update(bin, BITMAP_EMPTY);
    }

    /// Returns the leftmost bin whose subtree is uniformly empty and whose
    /// parent is not (i.e. the largest such empty bin). Returns the sibling
    /// of `root_bin` if the whole covered range is filled (the caller may
    /// grow the binmap and retry), or `Bin::NONE` if `root_bin` is already
    /// `Bin::ALL`. Returns leaf `0` when the whole tree is still uniformly
    /// empty (a fresh binmap, or one reset back to nothing) rather than the
    /// largest all-empty bin, which would otherwise be `root_bin` itself.
    pub fn find_empty(&self) -> Bin {
        let root = *self.slab.cell(CellRef::ROOT);
        if matches!(
            (root.left, root.right),
            (Half::Bitmap(BITMAP_EMPTY), Half::Bitmap(BITMAP_EMPTY))
        ) {
            return Bin::from_raw(0);
        }

        let mut bitmap = BITMAP_FILLED;
        let mut cur_ref = CellRef::ROOT;
        let mut cur_bin = self.root_bin;

        loop {
            let cell = *self.slab.cell(cur_ref);
            match cell.left {
                Half::Ref(r) => {
                    cur_ref = r;
                    cur_bin = cur_bin.left();
                }
                Half::Bitmap(b) if b != BITMAP_FILLED => {
                    bitmap = b;
                    cur_bin = cur_bin.left();
                    break;
                }
                Half::Bitmap(_) => match cell.right {
                    Half::Ref(r) => {
                        cur_ref = r;
                        cur_bin = cur_bin.right();
                    }
                    Half::Bitmap(b) => {
                        bitmap = b;
                        cur_bin = cur_bin.right();
                        break;
                    }
                },
            }
        }

        if bitmap == BITMAP_FILLED {
            return if self.root_bin.is_all() {
                Bin::NONE
            } else {
                self.root_bin.sibling()
            };
        }

        Bin::from_raw(cur_bin.base_left().to_raw() + tables::bitmap_to_bin(!bitmap))
    }

    /// Descends from the root following existing references toward `bin`,
    /// stopping at an exact match or at the first bitmap-terminal half.
    fn descend(&self, bin: Bin) -> (CellRef, Bin) {
        let mut cur_ref = CellRef::ROOT;
        let mut cur_bin = self.root_bin;
        loop {
            if bin == cur_bin {
                break;
            }
            let half = if bin < cur_bin {
                self.slab.cell(cur_ref).left
            } else {
                self.slab.cell(cur_ref).right
            };
            match half {
                Half::Ref(r) => {
                    cur_ref = r;
                    cur_bin = if bin < cur_bin { cur_bin.left() } else { cur_bin.right() };
                }
                Half::Bitmap(_) => break,
            }
        }
        (cur_ref, cur_bin)
    }

    fn update(&mut self, bin: Bin, target: u32) {
        if bin.is_none() {
            return;
        }

        while !self.root_bin.contains(bin) {
            if self.extend_root().is_none() {
                return;
            }
        }

        let mut trace = Vec::with_capacity(8);
        let mut cur_ref = CellRef::ROOT;
        let mut cur_bin = self.root_bin;
        trace.push(cur_ref);

        while cur_bin != bin {
            let half = if bin < cur_bin {
                self.slab.cell(cur_ref).left
            } else {
                self.slab.cell(cur_ref).right
            };
            match half {
                Half::Ref(r) => {
                    cur_ref = r;
                    cur_bin = if bin < cur_bin { cur_bin.left() } else { cur_bin.right() };
                    trace.push(cur_ref);
                }
                Half::Bitmap(_) => break,
            }
        }

        debug_assert!(cur_bin.layer_bits() > BITMAP_LAYER_BITS);

        if cur_bin == bin {
            let cell = *self.slab.cell(cur_ref);
            if let Half::Ref(r) = cell.left {
                self.slab.free_cell(r);
            }
            if let Half::Ref(r) = cell.right {
                self.slab.free_cell(r);
            }
            let c = self.slab.cell_mut(cur_ref);
            c.left = Half::Bitmap(target);
            c.right = Half::Bitmap(target);
            self.pack_cells(&trace);
            return;
        }

        let bin_bitmap = BITMAP[(bin.to_raw() & BITMAP_LAYER_BITS) as usize];

        let cell = *self.slab.cell(cur_ref);
        let current_half = if bin < cur_bin { cell.left } else { cell.right };
        let existing = current_half
            .as_bitmap()
            .expect("descent stopped at a bitmap-terminal half");
        let already_applied = if target == BITMAP_FILLED {
            existing & bin_bitmap == bin_bitmap
        } else {
            existing & bin_bitmap == 0
        };
        if already_applied {
            return;
        }

        let mut pre_bin = bin.parent();
        while pre_bin.layer_bits() <= BITMAP_LAYER_BITS {
            pre_bin = pre_bin.parent();
        }

        while cur_bin != pre_bin {
            let go_left = pre_bin < cur_bin;
            let unpacked = if go_left {
                self.unpack_left_half(cur_ref)
            } else {
                self.unpack_right_half(cur_ref)
            };
            let new_ref = match unpacked {
                Some(r) => r,
                None => {
                    self.pack_cells(&trace);
                    return;
                }
            };
            cur_ref = new_ref;
            cur_bin = if go_left { cur_bin.left() } else { cur_bin.right() };
            trace.push(cur_ref);
        }

        debug_assert_eq!(cur_bin, pre_bin);

        let c = self.slab.cell_mut(cur_ref);
        let half = if bin < cur_bin { &mut c.left } else { &mut c.right };
        match half {
            Half::Bitmap(bm) => {
                if target == BITMAP_FILLED {
                    *bm |= bin_bitmap;
                } else {
                    *bm &= !bin_bitmap;
                }
            }
            Half::Ref(_) => unreachable!("pre_bin's halves are always bitmaps by construction"),
        }

        self.pack_cells(&trace);
    }

    /// Climbs `root_bin` to its parent, preserving the old root's content
    /// either inline (if it was already uniform) or in a freshly allocated
    /// cell. Returns `None` on allocation failure.
    fn extend_root(&mut self) -> Option<()> {
        debug_assert!(!self.root_bin.is_all());

        let root = *self.slab.cell(CellRef::ROOT);
        let uniform = matches!((root.left, root.right), (Half::Bitmap(a), Half::Bitmap(b)) if a == b);

        if uniform {
            self.slab.cell_mut(CellRef::ROOT).right = Half::Bitmap(BITMAP_EMPTY);
        } else {
            let new_ref = self.slab.alloc_cell()?;
            *self.slab.cell_mut(new_ref) = root;
            let root_cell = self.slab.cell_mut(CellRef::ROOT);
            root_cell.left = Half::Ref(new_ref);
            root_cell.right = Half::Bitmap(BITMAP_EMPTY);
        }

        self.root_bin = self.root_bin.parent();
        tracing::trace!(root_bin = self.root_bin.to_raw(), "binmap root extended");
        Some(())
    }

    /// If `ref`'s left half is a bitmap, expands it into a fresh cell
    /// carrying two copies of that bitmap and retags the half as a
    /// reference to it. No-op if the half is already a reference.
    fn unpack_left_half(&mut self, r: CellRef) -> Option<CellRef> {
        if let Half::Ref(existing) = self.slab.cell(r).left {
            return Some(existing);
        }
        let bm = self.slab.cell(r).left.as_bitmap().unwrap();
        let new_ref = self.slab.alloc_cell()?;
        *self.slab.cell_mut(new_ref) = Cell {
            left: Half::Bitmap(bm),
            right: Half::Bitmap(bm),
        };
        self.slab.cell_mut(r).left = Half::Ref(new_ref);
        Some(new_ref)
    }

    /// Mirror of `unpack_left_half` for the right half.
    fn unpack_right_half(&mut self, r: CellRef) -> Option<CellRef> {
        if let Half::Ref(existing) = self.slab.cell(r).right {
            return Some(existing);
        }
        let bm = self.slab.cell(r).right.as_bitmap().unwrap();
        let new_ref = self.slab.alloc_cell()?;
        *self.slab.cell_mut(new_ref) = Cell {
            left: Half::Bitmap(bm),
            right: Half::Bitmap(bm),
        };
        self.slab.cell_mut(r).right = Half::Ref(new_ref);
        Some(new_ref)
    }

    /// Walks `trace` (root-to-leaf order) bottom-up, collapsing the deepest
    /// cell into its ancestors for as long as each ancestor's other side
    /// already matches the deepest cell's uniform value. Commits exactly one
    /// structural change: one ancestor half becomes a bitmap, and the
    /// (recursively freed) subtree it used to reference disappears.
    fn pack_cells(&mut self, trace: &[CellRef]) {
        if trace.len() < 2 {
            return;
        }

        let deepest = *trace.last().unwrap();
        let deepest_cell = *self.slab.cell(deepest);
        let bitmap = match (deepest_cell.left, deepest_cell.right) {
            (Half::Bitmap(a), Half::Bitmap(b)) if a == b => a,
            _ => return,
        };

        let mut ancestor_idx = trace.len() - 1;
        loop {
            if ancestor_idx == 0 {
                break;
            }
            let candidate_idx = ancestor_idx - 1;
            let cur = trace[candidate_idx];
            let cell = *self.slab.cell(cur);
            let matches = match cell.left {
                Half::Bitmap(b) => b == bitmap,
                Half::Ref(_) => match cell.right {
                    Half::Bitmap(b) => b == bitmap,
                    Half::Ref(_) => false,
                },
            };
            ancestor_idx = candidate_idx;
            if !matches || cur == CellRef::ROOT {
                break;
            }
        }

        let ancestor = trace[ancestor_idx];
        let child = trace[ancestor_idx + 1];
        let cell = self.slab.cell_mut(ancestor);
        match cell.left {
            Half::Ref(r) if r == child => cell.left = Half::Bitmap(bitmap),
            _ => cell.right = Half::Bitmap(bitmap),
        }
        self.slab.free_cell(child);
    }
}

impl Default for Binmap {
    fn default() -> Self {
        Binmap::new()
    }
}

fn fill_of_halves(left: Half, right: Half) -> Fill {
    match (left, right) {
        (Half::Bitmap(BITMAP_FILLED), Half::Bitmap(BITMAP_FILLED)) => Fill::Filled,
        (Half::Bitmap(BITMAP_EMPTY), Half::Bitmap(BITMAP_EMPTY)) => Fill::Empty,
        _ => Fill::Mixed,
    }
}
