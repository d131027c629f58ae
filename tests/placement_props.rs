//! Property tests for the placement engine

use proptest::prelude::*;

use qamts::grid::Grid;
use qamts::placement::fit_demand_with_symmetries;

fn bitmap(rows: usize, cols: usize) -> impl Strategy<Value = Grid> {
    prop::collection::vec(prop::collection::vec(0u32..=1, cols), rows)
        .prop_map(|mut rows| {
            // Demands need at least one occupied cell.
            if rows.iter().flatten().all(|&v| v == 0) {
                rows[0][0] = 1;
            }
            Grid::from_rows(&rows).unwrap()
        })
}

fn demand() -> impl Strategy<Value = Grid> {
    (1usize..=4, 1usize..=4).prop_flat_map(|(r, c)| bitmap(r, c))
}

fn resources() -> impl Strategy<Value = Grid> {
    prop::collection::vec(prop::collection::vec(0u32..=1, 6), 6)
        .prop_map(|rows| Grid::from_rows(&rows).unwrap())
}

proptest! {
    #[test]
    fn allocations_avoid_occupied_cells_and_preserve_demand_size(
        res in resources(),
        dmd in demand(),
    ) {
        if let Some(placement) = fit_demand_with_symmetries(&res, &dmd) {
            prop_assert!(!placement.allocation.overlaps(&res));
            prop_assert_eq!(placement.allocation.count_ones(), dmd.count_ones());
            prop_assert_eq!(placement.allocation.shape(), res.shape());
            prop_assert!(placement.score > 0);
        }
    }

    #[test]
    fn a_full_rotation_is_the_identity(dmd in demand()) {
        let rotated = dmd.rot90().rot90().rot90().rot90();
        prop_assert_eq!(rotated, dmd);
    }

    #[test]
    fn mirroring_twice_is_the_identity(dmd in demand()) {
        prop_assert_eq!(dmd.fliplr().fliplr(), dmd);
    }

    #[test]
    fn placement_is_deterministic(res in resources(), dmd in demand()) {
        let first = fit_demand_with_symmetries(&res, &dmd);
        let second = fit_demand_with_symmetries(&res, &dmd);
        prop_assert_eq!(first, second);
    }
}
