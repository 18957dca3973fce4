//! Barbell plate loadout calculation.
//!
//! Greedy, largest denomination first, applied per side:
//! 1. Work out what each side must carry: `(target - bar) / 2`
//! 2. Walk denominations from heaviest to lightest
//! 3. Take a pair whenever it still fits and pairs remain
//!
//! The greedy pass never overshoots the target. It is not a knapsack search,
//! so an exact combination can occasionally exist that it does not find.

use crate::Plate;
use serde::Serialize;

/// A loadout this close to the target counts as exact
pub const WEIGHT_TOLERANCE: f64 = 0.001;

/// A plate placed on one side of the bar
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoadedPlate {
    pub weight: f64,
    pub color: String,
}

/// Result of a loadout calculation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Loadout {
    /// Plates for one side, heaviest first (the order they go on the sleeve)
    pub plates_per_side: Vec<LoadedPlate>,
    pub total_weight: f64,
    pub is_exact: bool,
    /// How far the loadout is from the target. When the bar alone is heavier
    /// than the target this is the excess of the bar instead.
    pub difference: f64,
}

impl Loadout {
    pub fn per_side_weight(&self) -> f64 {
        self.plates_per_side.iter().map(|p| p.weight).sum()
    }
}

struct Denomination<'a> {
    weight: f64,
    color: &'a str,
    pairs: u32,
}

/// Compute the plates needed on each side to reach `target_weight`
pub fn calculate(target_weight: f64, bar_weight: f64, available_plates: &[Plate]) -> Loadout {
    let remaining_total = target_weight - bar_weight;
    if remaining_total < 0.0 {
        tracing::debug!(
            "Target {} is below bar weight {}, returning empty bar",
            target_weight,
            bar_weight
        );
        return Loadout {
            plates_per_side: Vec::new(),
            total_weight: bar_weight,
            is_exact: false,
            difference: -remaining_total,
        };
    }

    let mut inventory: Vec<Denomination> = available_plates
        .iter()
        .filter(|p| p.weight > 0.0 && p.count >= 2)
        .map(|p| Denomination {
            weight: p.weight,
            color: &p.color,
            pairs: p.count / 2,
        })
        .collect();
    inventory.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    let mut remaining_per_side = remaining_total / 2.0;
    let mut plates_per_side = Vec::new();

    for denomination in &mut inventory {
        while denomination.pairs > 0 && remaining_per_side >= denomination.weight {
            plates_per_side.push(LoadedPlate {
                weight: denomination.weight,
                color: denomination.color.to_string(),
            });
            remaining_per_side -= denomination.weight;
            denomination.pairs -= 1;
        }
    }

    let achieved_per_side: f64 = plates_per_side.iter().map(|p| p.weight).sum();
    let is_exact = remaining_per_side.abs() < WEIGHT_TOLERANCE;
    let difference = if is_exact {
        0.0
    } else {
        remaining_per_side * 2.0
    };

    tracing::debug!(
        "Loadout for {} on {} bar: {} plates per side, exact={}",
        target_weight,
        bar_weight,
        plates_per_side.len(),
        is_exact
    );

    Loadout {
        plates_per_side,
        total_weight: bar_weight + achieved_per_side * 2.0,
        is_exact,
        difference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_plates() -> Vec<Plate> {
        vec![
            Plate::new(45.0, 4, "blue"),
            Plate::new(10.0, 4, "white"),
            Plate::new(5.0, 4, "red"),
            Plate::new(2.5, 4, "gray"),
        ]
    }

    fn weights(loadout: &Loadout) -> Vec<f64> {
        loadout.plates_per_side.iter().map(|p| p.weight).collect()
    }

    #[test]
    fn test_exact_single_plate() {
        let loadout = calculate(135.0, 45.0, &standard_plates());

        assert_eq!(weights(&loadout), vec![45.0]);
        assert_eq!(loadout.total_weight, 135.0);
        assert!(loadout.is_exact);
        assert_eq!(loadout.difference, 0.0);
    }

    #[test]
    fn test_exact_with_small_plate() {
        let loadout = calculate(140.0, 45.0, &standard_plates());

        assert_eq!(weights(&loadout), vec![45.0, 2.5]);
        assert_eq!(loadout.total_weight, 140.0);
        assert!(loadout.is_exact);
        assert_eq!(loadout.plates_per_side[1].color, "gray");
    }

    #[test]
    fn test_target_below_bar() {
        let loadout = calculate(30.0, 45.0, &standard_plates());

        assert!(loadout.plates_per_side.is_empty());
        assert_eq!(loadout.total_weight, 45.0);
        assert!(!loadout.is_exact);
        assert_eq!(loadout.difference, 15.0);
    }

    #[test]
    fn test_bar_only() {
        let loadout = calculate(45.0, 45.0, &standard_plates());

        assert!(loadout.plates_per_side.is_empty());
        assert!(loadout.is_exact);
        assert_eq!(loadout.total_weight, 45.0);
    }

    #[test]
    fn test_runs_out_of_pairs() {
        // Only two pairs of 45s: 405 needs three per side
        let loadout = calculate(405.0, 45.0, &standard_plates());

        assert_eq!(
            weights(&loadout),
            vec![45.0, 45.0, 10.0, 10.0, 5.0, 5.0, 2.5, 2.5]
        );
        assert_eq!(loadout.total_weight, 45.0 + 2.0 * 125.0);
        assert!(!loadout.is_exact);
        assert_eq!(loadout.difference, 405.0 - loadout.total_weight);
    }

    #[test]
    fn test_odd_counts_only_use_pairs() {
        let plates = vec![Plate::new(25.0, 3, "green"), Plate::new(10.0, 1, "white")];
        let loadout = calculate(115.0, 45.0, &plates);

        // 35 per side wanted: one pair of 25s, the single 10 is unusable
        assert_eq!(weights(&loadout), vec![25.0]);
        assert_eq!(loadout.total_weight, 95.0);
        assert_eq!(loadout.difference, 20.0);
        assert!(!loadout.is_exact);
    }

    #[test]
    fn test_unsorted_inventory_is_loaded_heaviest_first() {
        let plates = vec![
            Plate::new(2.5, 2, "gray"),
            Plate::new(25.0, 2, "green"),
            Plate::new(10.0, 2, "white"),
        ];
        let loadout = calculate(120.0, 45.0, &plates);

        assert_eq!(weights(&loadout), vec![25.0, 10.0, 2.5]);
        assert!(loadout.is_exact);
    }

    #[test]
    fn test_greedy_does_not_backtrack() {
        // 30 per side is reachable as 15+15, but greedy takes the 25 first
        let plates = vec![Plate::new(25.0, 2, "green"), Plate::new(15.0, 4, "yellow")];
        let loadout = calculate(105.0, 45.0, &plates);

        assert_eq!(weights(&loadout), vec![25.0]);
        assert!(!loadout.is_exact);
        assert_eq!(loadout.difference, 10.0);
    }

    #[test]
    fn test_never_overshoots_and_is_non_increasing() {
        let plates = standard_plates();
        let mut target = 45.0;
        while target <= 400.0 {
            let loadout = calculate(target, 45.0, &plates);
            assert!(loadout.total_weight <= target);
            assert!(loadout.difference >= 0.0);
            assert_eq!(loadout.is_exact, loadout.difference < WEIGHT_TOLERANCE);
            assert!(loadout
                .plates_per_side
                .windows(2)
                .all(|w| w[0].weight >= w[1].weight));
            target += 1.25;
        }
    }

    #[test]
    fn test_plate_slightly_too_heavy_is_not_loaded() {
        let plates = vec![Plate::new(2.5, 2, "gray")];
        let loadout = calculate(49.9995, 45.0, &plates);

        assert!(loadout.plates_per_side.is_empty());
        assert_eq!(loadout.total_weight, 45.0);
        assert!(!loadout.is_exact);
        assert!((loadout.difference - 4.9995).abs() < 1e-9);
    }

    #[test]
    fn test_fractional_plates_accumulate_without_drift() {
        let plates = vec![Plate::new(1.25, 10, "silver"), Plate::new(0.5, 4, "silver")];
        let loadout = calculate(20.0 + 2.0 * 7.25, 20.0, &plates);

        assert!(loadout.is_exact);
        assert_eq!(loadout.plates_per_side.len(), 7);
        assert!((loadout.per_side_weight() - 7.25).abs() < WEIGHT_TOLERANCE);
    }
}
