use proptest::prelude::*;

use crate::Bin;

fn any_bin() -> impl Strategy<Value = Bin> {
    // offset << (layer + 1) must stay within 32 bits, so offset is bounded
    // by 2^(31 - layer); the extra `.min(20)` just keeps generated values
    // small without narrowing which layers get covered.
    (0u32..32)
        .prop_flat_map(|layer| (Just(layer), 0u32..(1u32 << (31 - layer).min(20))))
        .prop_map(|(layer, offset)| Bin::new(layer, offset))
}

proptest! {
    #[test]
    fn left_and_right_are_children_of_parent(bin in any_bin()) {
        if bin.layer() > 0 {
            prop_assert_eq!(bin.left().parent(), bin);
            prop_assert_eq!(bin.right().parent(), bin);
        }
    }

    #[test]
    fn sibling_is_an_involution(bin in any_bin()) {
        prop_assert_eq!(bin.sibling().sibling(), bin);
    }

    #[test]
    fn a_bin_contains_its_own_children(bin in any_bin()) {
        if bin.layer() > 0 {
            prop_assert!(bin.contains(bin.left()));
            prop_assert!(bin.contains(bin.right()));
        }
    }

    #[test]
    fn contains_is_transitive_through_parent(bin in any_bin()) {
        let parent = bin.parent();
        if !parent.is_none() {
            prop_assert!(parent.contains(bin));
        }
    }

    #[test]
    fn towards_always_lands_on_a_child(bin in any_bin(), dest in any_bin()) {
        let step = bin.towards(dest);
        if !step.is_none() {
            prop_assert!(step == bin.left() || step == bin.right());
        }
    }
}
