use std::{cmp::Ordering, fmt::Debug};

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::Actor,
    geo::{self, Coordinates},
    traits::{MarketReader, MarketplaceError, SupplierCandidate},
    trust,
};

/// Weights of the composite match score. Trust dominates, proximity next, catalogue depth last.
const WEIGHT_TRUST: f64 = 0.40;
const WEIGHT_PROXIMITY: f64 = 0.35;
const WEIGHT_PRODUCTS: f64 = 0.25;
/// Distances at or beyond this contribute nothing to the proximity component.
const MAX_DISTANCE_KM: f64 = 100.0;
/// Catalogue depth saturates at this many products (each worth 5 points).
const MAX_PRODUCT_COUNT: i64 = 20;

/// A scored candidate from a matching run, best first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierMatch {
    pub supplier_id: i64,
    pub name: String,
    pub trust_score: i64,
    /// Great-circle distance from the vendor, rounded to two decimals.
    pub distance_km: f64,
    pub product_count: i64,
    /// The weighted composite, on a 0-100 scale.
    pub score: f64,
}

/// `MatchingApi` answers "which supplier should take this order?". It is read-only: scoring pulls aggregates from
/// the backend and never writes anything.
pub struct MatchingApi<B> {
    db: B,
}

impl<B> Debug for MatchingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatchingApi")
    }
}

impl<B> MatchingApi<B>
where B: MarketReader
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// The supplier's current trust score (0-100, floor 10). Suppliers with no history score the neutral default.
    pub async fn supplier_trust_score(&self, supplier_id: i64) -> Result<i64, MarketplaceError> {
        let stats = self.db.supplier_stats(supplier_id).await?;
        Ok(trust::supplier_score(&stats))
    }

    pub async fn vendor_trust_score(&self, vendor_id: i64) -> Result<i64, MarketplaceError> {
        let stats = self.db.vendor_stats(vendor_id).await?;
        Ok(trust::vendor_score(&stats))
    }

    /// Ranks every eligible supplier in the category for the vendor and returns them best first. Eligibility means
    /// at least one available product with stock on hand; `exclude` removes suppliers the vendor has blacklisted or
    /// already tried.
    pub async fn rank_suppliers(
        &self,
        vendor_id: i64,
        category: &str,
        exclude: &[i64],
    ) -> Result<Vec<SupplierMatch>, MarketplaceError> {
        let vendor = self.db.fetch_actor(vendor_id).await?.ok_or(MarketplaceError::ActorNotFound(vendor_id))?;
        let origin = actor_coordinates(&vendor);
        let candidates = self.db.supplier_candidates(category, exclude).await?;
        trace!("🔍️ {} candidate supplier(s) for category '{category}'", candidates.len());
        let mut matches = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let trust_score = self.supplier_trust_score(candidate.supplier_id).await?;
            matches.push(score_candidate(&candidate, origin, trust_score));
        }
        // Best score first; ties go to the nearer supplier, then the lower id so results are stable.
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.distance_km.partial_cmp(&b.distance_km).unwrap_or(Ordering::Equal))
                .then(a.supplier_id.cmp(&b.supplier_id))
        });
        Ok(matches)
    }

    /// The single best supplier for the vendor in the category, or `None` when nobody qualifies.
    pub async fn find_best_supplier(
        &self,
        vendor_id: i64,
        category: &str,
        exclude: &[i64],
    ) -> Result<Option<SupplierMatch>, MarketplaceError> {
        let ranked = self.rank_suppliers(vendor_id, category, exclude).await?;
        let best = ranked.into_iter().next();
        match &best {
            Some(m) => debug!("🔍️ Best match for vendor {vendor_id} in '{category}': {} ({:.2})", m.name, m.score),
            None => debug!("🔍️ No supplier matches vendor {vendor_id} in '{category}'"),
        }
        Ok(best)
    }
}

/// An actor's position: explicit coordinates if they were captured, otherwise the city lookup (which itself falls
/// back to the national centroid).
pub fn actor_coordinates(actor: &Actor) -> Coordinates {
    match (actor.lat, actor.lng) {
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
        _ => geo::coordinates_for(&actor.city, &actor.state),
    }
}

fn score_candidate(candidate: &SupplierCandidate, origin: Coordinates, trust_score: i64) -> SupplierMatch {
    let position = match (candidate.lat, candidate.lng) {
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
        _ => geo::coordinates_for(&candidate.city, &candidate.state),
    };
    let distance_km = geo::distance_km(origin, position);
    let proximity = MAX_DISTANCE_KM - distance_km.min(MAX_DISTANCE_KM);
    let depth = (candidate.product_count.min(MAX_PRODUCT_COUNT) as f64) * 5.0;
    let score = WEIGHT_TRUST * trust_score as f64 + WEIGHT_PROXIMITY * proximity + WEIGHT_PRODUCTS * depth;
    SupplierMatch {
        supplier_id: candidate.supplier_id,
        name: candidate.name.clone(),
        trust_score,
        distance_km,
        product_count: candidate.product_count,
        score,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn candidate(id: i64, lat: f64, lng: f64, products: i64) -> SupplierCandidate {
        SupplierCandidate {
            supplier_id: id,
            name: format!("supplier-{id}"),
            city: "mumbai".to_string(),
            state: "maharashtra".to_string(),
            lat: Some(lat),
            lng: Some(lng),
            product_count: products,
        }
    }

    #[test]
    fn composite_weights_add_up() {
        // Perfect trust, zero distance, saturated catalogue ⇒ maximum possible score of 100.
        let origin = Coordinates::new(19.0760, 72.8777);
        let m = score_candidate(&candidate(1, 19.0760, 72.8777, 50), origin, 100);
        assert!((m.score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn nearer_higher_trust_supplier_wins() {
        let origin = Coordinates::new(19.0760, 72.8777);
        // ~5km away, trust 80, 12 products.
        let a = score_candidate(&candidate(1, 19.1136, 72.8697, 12), origin, 80);
        // Pune is ~120km from Mumbai: proximity component bottoms out.
        let b = score_candidate(&candidate(2, 18.5204, 73.8567, 20), origin, 60);
        assert!(a.score > b.score);
        // Candidate B still gets full catalogue credit.
        assert!((b.score - (0.40 * 60.0 + 0.25 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn higher_trust_beats_shorter_distance() {
        let origin = Coordinates::new(19.0760, 72.8777);
        // 2.00 km north of the vendor, trust 85, 3 products: 0.40·85 + 0.35·98 + 0.25·15 = 72.05.
        let a = score_candidate(&candidate(1, 19.093986, 72.8777, 3), origin, 85);
        // 1.00 km north, trust 60, 1 product: 0.40·60 + 0.35·99 + 0.25·5 = 59.90.
        let b = score_candidate(&candidate(2, 19.084993, 72.8777, 1), origin, 60);
        assert!((a.distance_km - 2.0).abs() < 1e-9);
        assert!((b.distance_km - 1.0).abs() < 1e-9);
        assert!((a.score - 72.05).abs() < 1e-9);
        assert!((b.score - 59.90).abs() < 1e-9);
        assert!(a.score > b.score);
    }

    #[test]
    fn distance_beyond_cap_contributes_nothing() {
        let origin = Coordinates::new(19.0760, 72.8777);
        let far = score_candidate(&candidate(1, 13.0827, 80.2707, 1), origin, 50);
        assert!((far.score - (0.40 * 50.0 + 0.25 * 5.0)).abs() < 1e-9);
    }
}
