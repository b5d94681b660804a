//! Human-readable document numbers.
//!
//! Order and contract numbers follow the `<prefix>-<time-suffix>-<random-suffix>` convention: a second-resolution
//! timestamp suffix keeps them roughly sortable, and a random suffix disambiguates documents created within the same
//! second. Uniqueness is ultimately enforced by the database's unique index; these generators just make collisions
//! vanishingly rare.

use chrono::Utc;
use rand::Rng;

const ORDER_PREFIX: &str = "ORD";
const CONTRACT_PREFIX: &str = "CTR";

fn document_number(prefix: &str) -> String {
    let time_suffix = Utc::now().timestamp() % 1_000_000_000;
    let random_suffix = rand::thread_rng().gen_range(0..10_000u32);
    format!("{prefix}-{time_suffix}-{random_suffix:04}")
}

pub fn new_order_number() -> String {
    document_number(ORDER_PREFIX)
}

pub fn new_contract_number() -> String {
    document_number(CONTRACT_PREFIX)
}

/// An opaque reference for a gateway charge, echoed back by callbacks.
pub fn new_gateway_ref() -> String {
    let nonce: u64 = rand::thread_rng().gen();
    format!("gw-{}-{nonce:016x}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn number_format() {
        let n = new_order_number();
        assert!(n.starts_with("ORD-"));
        let parts: Vec<&str> = n.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 4);
        assert!(new_contract_number().starts_with("CTR-"));
    }

    #[test]
    fn gateway_refs_do_not_collide() {
        let refs: HashSet<String> = (0..1000).map(|_| new_gateway_ref()).collect();
        assert_eq!(refs.len(), 1000);
    }
}
