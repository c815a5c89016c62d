//! Cell storage: the tagged halves, the two-half cells, and the slab of
//! cells with its embedded free list.

use crate::tables::BITMAP_EMPTY;

/// A 32-bit index into the binmap's cell slab. Index 0 always names the
/// permanent root cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRef(pub(crate) u32);

impl CellRef {
    pub(crate) const ROOT: CellRef = CellRef(0);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One side of a cell: either a bitmap word summarizing a uniform or
/// in-word subtree, or a reference down to a cell that expands it further.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Half {
    Bitmap(u32),
    Ref(CellRef),
}

impl Half {
    pub(crate) fn as_bitmap(self) -> Option<u32> {
        match self {
            Half::Bitmap(b) => Some(b),
            Half::Ref(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Cell {
    pub(crate) left: Half,
    pub(crate) right: Half,
}

impl Cell {
    fn uniform(bitmap: u32) -> Cell {
        Cell {
            left: Half::Bitmap(bitmap),
            right: Half::Bitmap(bitmap),
        }
    }
}

/// A slot in the backing slab: either a live cell or a free-list link.
#[derive(Clone, Copy, Debug)]
enum Slot {
    Occupied(Cell),
    Free(CellRef),
}

/// The cell slab: a contiguous, geometrically growing array addressed by
/// compact indices, with a singly-linked free list threaded through the
/// unoccupied slots. Growth is monotonic; cells are never returned to the
/// operating system for the binmap's lifetime.
pub(crate) struct Slab {
    slots: Vec<Slot>,
    free_top: CellRef,
    cells_number: usize,
}

impl Slab {
    pub(crate) fn new() -> Slab {
        let mut slab = Slab {
            slots: Vec::new(),
            free_top: CellRef::ROOT,
            cells_number: 0,
        };
        let root = slab
            .alloc_cell()
            .expect("the first allocation always succeeds");
        debug_assert_eq!(root, CellRef::ROOT);
        slab
    }

    pub(crate) fn cells_number(&self) -> usize {
        self.cells_number
    }

    pub(crate) fn blocks_number(&self) -> usize {
        self.slots.len() / 16
    }

    pub(crate) fn cell(&self, r: CellRef) -> &Cell {
        match &self.slots[r.index()] {
            Slot::Occupied(cell) => cell,
            Slot::Free(_) => panic!("binmap: dangling reference to a free cell"),
        }
    }

    pub(crate) fn cell_mut(&mut self, r: CellRef) -> &mut Cell {
        match &mut self.slots[r.index()] {
            Slot::Occupied(cell) => cell,
            Slot::Free(_) => panic!("binmap: dangling reference to a free cell"),
        }
    }

    /// Pops the free-list head, growing the slab first if it's empty.
    /// Returns `None` on reference-space exhaustion (the slab would need
    /// more than `u32::MAX` slots).
    pub(crate) fn alloc_cell(&mut self) -> Option<CellRef> {
        if self.free_top == CellRef::ROOT {
            // Index 0 (the root) is never itself on the free list once
            // constructed, so this sentinel unambiguously means "empty".
            let old_blocks = self.blocks_number();
            let new_blocks = if old_blocks == 0 { 1 } else { old_blocks * 2 };
            self.grow_to(new_blocks)?;
        }

        let r = self.free_top;
        let next = match self.slots[r.index()] {
            Slot::Free(next) => next,
            Slot::Occupied(_) => unreachable!("free_top always names a free slot"),
        };
        self.free_top = next;
        self.slots[r.index()] = Slot::Occupied(Cell::uniform(BITMAP_EMPTY));
        self.cells_number += 1;
        tracing::trace!(cell = r.0, "allocated cell");
        Some(r)
    }

    fn grow_to(&mut self, new_blocks: usize) -> Option<()> {
        let old_len = self.slots.len();
        let new_len = new_blocks.checked_mul(16)?;
        if new_len > u32::MAX as usize {
            tracing::warn!("binmap: reference space exhausted");
            return None;
        }

        self.slots.resize(new_len, Slot::Free(CellRef::ROOT));

        // Thread the new slots onto the free list, lowest index first, so
        // the walk during `alloc_cell` stays sequential.
        let old_free_top = self.free_top;
        self.slots[new_len - 1] = Slot::Free(old_free_top);
        for idx in (old_len..new_len - 1).rev() {
            self.slots[idx] = Slot::Free(CellRef(idx as u32 + 1));
        }
        self.free_top = CellRef(old_len as u32);

        tracing::trace!(blocks_number = new_blocks, "binmap slab grew");
        Some(())
    }

    /// Recursively frees `r` and everything it references.
    pub(crate) fn free_cell(&mut self, r: CellRef) {
        debug_assert_ne!(r, CellRef::ROOT);
        let cell = *self.cell(r);
        if let Half::Ref(child) = cell.left {
            self.free_cell(child);
        }
        if let Half::Ref(child) = cell.right {
            self.free_cell(child);
        }
        self.slots[r.index()] = Slot::Free(self.free_top);
        self.free_top = r;
        self.cells_number -= 1;
    }
}
