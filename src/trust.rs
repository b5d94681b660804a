//! Trust score computation.
//!
//! Scores are pure functions of an actor's order and payment history; the history aggregates are supplied by the
//! persistence backend ([`SupplierStats`](crate::traits::SupplierStats) / [`VendorStats`](crate::traits::VendorStats)).
//! An actor with no orders at all scores the default of 50. Computed scores are clamped to the 10-100 range; the
//! floor is 10 by decision (the source material disagreed with itself on 0 vs 10 here).

use crate::{
    db_types::{DEFAULT_TRUST_SCORE, TRUST_SCORE_CEILING, TRUST_SCORE_FLOOR},
    traits::{SupplierStats, VendorStats},
};

/// Rating assumed for suppliers that have never been rated. Mid-scale, neither reward nor penalty.
const NEUTRAL_RATING: f64 = 3.0;
/// Pricing competitiveness assumed when no pricing data exists for the supplier's categories.
const NEUTRAL_COMPETITIVENESS: f64 = 0.5;

/// Trust score for a supplier, in `[10, 100]`.
///
/// `100 × (0.35·on_time_rate + 0.25·avg_rating/5 + 0.20·pricing_competitiveness + 0.20·fulfillment_rate)`,
/// where on-time rate is delivered orders over total, and the fulfillment rate excludes rejected and cancelled
/// orders.
pub fn supplier_score(stats: &SupplierStats) -> i64 {
    if stats.total_orders == 0 {
        return DEFAULT_TRUST_SCORE;
    }
    let total = stats.total_orders as f64;
    let on_time_rate = stats.delivered_orders as f64 / total;
    let fulfillment_rate = (stats.total_orders - stats.annulled_orders) as f64 / total;
    let rating = stats.avg_rating.unwrap_or(NEUTRAL_RATING) / 5.0;
    let competitiveness = pricing_competitiveness(stats.price_ratio);
    let score = 100.0 * (0.35 * on_time_rate + 0.25 * rating + 0.20 * competitiveness + 0.20 * fulfillment_rate);
    clamp(score)
}

/// Trust score for a vendor, in `[10, 100]`.
///
/// `100 × (0.40·payment_timeliness + 0.30·order_consistency + 0.30·engagement)`. Payment timeliness is completed
/// payments over total (counting 1 when there are none); consistency is a fixed 0.8 once the vendor has ordered at
/// least once, else 0.5; engagement saturates at 10 orders.
pub fn vendor_score(stats: &VendorStats) -> i64 {
    if stats.total_orders == 0 {
        return DEFAULT_TRUST_SCORE;
    }
    let timeliness = stats.completed_payments as f64 / (stats.total_payments.max(1)) as f64;
    let consistency = 0.8;
    let engagement = (stats.total_orders as f64 / 10.0).min(1.0);
    let score = 100.0 * (0.40 * timeliness + 0.30 * consistency + 0.30 * engagement);
    clamp(score)
}

/// Maps the supplier's mean unit price relative to the category mean onto `[0, 1]`. Pricing at the category average
/// scores 1.0; pricing at double the average scores 0.
fn pricing_competitiveness(price_ratio: Option<f64>) -> f64 {
    match price_ratio {
        Some(ratio) if ratio > 0.0 => (2.0 - ratio).clamp(0.0, 1.0),
        _ => NEUTRAL_COMPETITIVENESS,
    }
}

fn clamp(score: f64) -> i64 {
    (score.round() as i64).clamp(TRUST_SCORE_FLOOR, TRUST_SCORE_CEILING)
}

#[cfg(test)]
mod test {
    use super::*;

    fn supplier(total: i64, delivered: i64, annulled: i64, rating: Option<f64>, ratio: Option<f64>) -> SupplierStats {
        SupplierStats { total_orders: total, delivered_orders: delivered, annulled_orders: annulled, avg_rating: rating, price_ratio: ratio }
    }

    #[test]
    fn no_history_scores_default() {
        assert_eq!(supplier_score(&supplier(0, 0, 0, None, None)), DEFAULT_TRUST_SCORE);
        let v = VendorStats { total_orders: 0, total_payments: 0, completed_payments: 0 };
        assert_eq!(vendor_score(&v), DEFAULT_TRUST_SCORE);
    }

    #[test]
    fn perfect_supplier_scores_100() {
        // All delivered, 5-star, priced at the category average.
        let s = supplier(20, 20, 0, Some(5.0), Some(1.0));
        assert_eq!(supplier_score(&s), 100);
    }

    #[test]
    fn poor_supplier_hits_the_floor() {
        // Everything annulled, bottom ratings, priced at triple the average.
        let s = supplier(10, 0, 10, Some(0.1), Some(3.0));
        assert_eq!(supplier_score(&s), TRUST_SCORE_FLOOR);
    }

    #[test]
    fn unrated_supplier_uses_neutral_rating() {
        // 0.35·1 + 0.25·(3/5) + 0.20·0.5 + 0.20·1 = 0.80
        let s = supplier(4, 4, 0, None, None);
        assert_eq!(supplier_score(&s), 80);
    }

    #[test]
    fn vendor_score_components() {
        // timeliness 1.0, consistency 0.8, engagement 0.5 -> 40 + 24 + 15 = 79
        let v = VendorStats { total_orders: 5, total_payments: 3, completed_payments: 3 };
        assert_eq!(vendor_score(&v), 79);
        // No payments yet still counts max(total, 1) in the denominator.
        let v = VendorStats { total_orders: 10, total_payments: 0, completed_payments: 0 };
        assert_eq!(vendor_score(&v), 54);
    }

    #[test]
    fn competitiveness_saturates() {
        assert_eq!(pricing_competitiveness(Some(0.5)), 1.0);
        assert_eq!(pricing_competitiveness(Some(1.5)), 0.5);
        assert_eq!(pricing_competitiveness(Some(2.5)), 0.0);
        assert_eq!(pricing_competitiveness(None), NEUTRAL_COMPETITIVENESS);
    }
}
