use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Bin, Binmap, Fill};

fn leaf(k: u32) -> Bin {
    Bin::from_raw(2 * k)
}

/// Drives a long sequence of random set/reset/get calls against a binmap and
/// a plain `Vec<bool>` oracle, checking every leaf after every mutation.
#[test]
fn set_reset_get_matches_a_vec_bool_oracle() {
    const LEAVES: u32 = 512;
    const STEPS: u32 = 4_000;

    let mut rng = StdRng::seed_from_u64(0xB17_11A4);
    let mut map = Binmap::new();
    let mut oracle = vec![false; LEAVES as usize];

    for _ in 0..STEPS {
        let k = rng.gen_range(0..LEAVES);
        if rng.gen_bool(0.5) {
            map.set(leaf(k));
            oracle[k as usize] = true;
        } else {
            map.reset(leaf(k));
            oracle[k as usize] = false;
        }

        for j in 0..LEAVES {
            let expected = if oracle[j as usize] { Fill::Filled } else { Fill::Empty };
            assert_eq!(map.get(leaf(j)), expected, "leaf {j} diverged from the oracle");
        }
    }
}

/// `find_empty` must always name a leaf the oracle agrees is unset, and must
/// report exhaustion (root's sibling, or `NONE` once root is `ALL`) exactly
/// when the oracle has nothing left.
#[test]
fn find_empty_names_a_leaf_the_oracle_considers_unset() {
    const LEAVES: u32 = 256;

    let mut rng = StdRng::seed_from_u64(0x5EED_F00D);
    let mut map = Binmap::new();
    let mut oracle = vec![false; LEAVES as usize];

    let mut order: Vec<u32> = (0..LEAVES).collect();
    for i in (1..order.len()).rev() {
        let j = rng.gen_range(0..=i);
        order.swap(i, j);
    }

    for k in order {
        let found = map.find_empty();
        if !found.is_none() && map.root_bin().contains(found) {
            let idx = found.to_raw() / 2;
            if (idx as usize) < oracle.len() {
                assert!(!oracle[idx as usize], "find_empty pointed at a leaf already set");
            }
        }

        map.set(leaf(k));
        oracle[k as usize] = true;
    }
}

/// After collapsing a whole 64-leaf block back to empty, the tree should
/// fold back down to a single cell: packing is not a one-way ratchet.
#[test]
fn packing_is_minimal_after_a_full_round_trip() {
    let mut map = Binmap::new();
    for k in 0..64 {
        map.set(leaf(k));
    }
    for k in 0..64 {
        map.reset(leaf(k));
    }
    assert_eq!(map.cells_number(), 1);
    for k in 0..64 {
        assert_eq!(map.get(leaf(k)), Fill::Empty);
    }
}

/// A binmap with nothing ever set, or everything set-then-reset back to
/// empty, must report the leftmost leaf as the next empty spot, not some
/// larger all-empty bin further up the tree.
#[test]
fn find_empty_on_a_fully_empty_tree_is_the_first_leaf() {
    let fresh = Binmap::new();
    assert_eq!(fresh.find_empty(), leaf(0));

    let mut round_tripped = Binmap::new();
    for k in 0..64 {
        round_tripped.set(leaf(k));
    }
    for k in 0..64 {
        round_tripped.reset(leaf(k));
    }
    assert_eq!(round_tripped.find_empty(), leaf(0));
}
