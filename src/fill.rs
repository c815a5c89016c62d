/// The three-valued result of a `Binmap::get`: whether every leaf under a
/// bin is filled, every leaf is empty, or the subtree is a mix of both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    Empty,
    Mixed,
    Filled,
}

impl Fill {
    /// Boolean convenience form: true iff every leaf under the queried bin
    /// is filled.
    pub const fn is_filled(self) -> bool {
        matches!(self, Fill::Filled)
    }

    pub const fn is_empty(self) -> bool {
        matches!(self, Fill::Empty)
    }
}
