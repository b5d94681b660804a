use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Contract, NewContract, Role, DEFAULT_PAYMENT_TERMS_DAYS},
    helpers::new_contract_number,
    traits::{MarketplaceDatabase, MarketplaceError, SignOutcome},
};

/// `ContractApi` owns the mechanics of supply contracts: drafting one per order, collecting the two signatures, and
/// sweeping stale unsigned drafts. Notifications about these events are the order flow's business.
pub struct ContractApi<B> {
    db: B,
}

impl<B> Debug for ContractApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContractApi")
    }
}

impl<B> ContractApi<B>
where B: MarketplaceDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Drafts and stores the contract for an order, idempotently: a second call for the same order returns the
    /// existing contract with `false`. Payment terms come from the supplier's profile.
    pub async fn generate_for_order(&self, order_id: i64) -> Result<(Contract, bool), MarketplaceError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        let payment_terms_days = self
            .db
            .fetch_actor(order.supplier_id)
            .await?
            .map(|a| a.payment_terms_days)
            .unwrap_or(DEFAULT_PAYMENT_TERMS_DAYS);
        let contract_number = new_contract_number();
        let terms = format!(
            "Supply contract for order {} between vendor #{} and supplier #{}. Total value {}. Payment due within \
             {payment_terms_days} days of delivery. Goods to be delivered to: {}.",
            order.order_number, order.vendor_id, order.supplier_id, order.total_amount, order.delivery_address
        );
        let contract = NewContract {
            contract_number,
            order_id: order.id,
            vendor_id: order.vendor_id,
            supplier_id: order.supplier_id,
            terms,
            payment_terms_days,
            total_amount: order.total_amount,
        };
        let (contract, created) = self.db.insert_contract(contract).await?;
        if created {
            info!("📜️ Contract [{}] drafted for order [{}]", contract.contract_number, order.order_number);
        }
        Ok((contract, created))
    }

    /// Applies `actor_id`'s signature to the contract. The actor must be one of the two parties; their side of the
    /// contract is inferred from which party they are.
    pub async fn sign(&self, contract_id: i64, actor_id: i64) -> Result<SignOutcome, MarketplaceError> {
        let contract =
            self.db.fetch_contract(contract_id).await?.ok_or(MarketplaceError::ContractNotFound(contract_id))?;
        let role = if contract.vendor_id == actor_id {
            Role::Vendor
        } else if contract.supplier_id == actor_id {
            Role::Supplier
        } else {
            return Err(MarketplaceError::Unauthorized {
                actor_id,
                detail: format!("not a party to contract {}", contract.contract_number),
            });
        };
        let outcome = self.db.sign_contract(contract_id, role).await?;
        if !outcome.newly_signed {
            debug!("📜️ {role} had already signed contract [{}]. No-op.", outcome.contract.contract_number);
        }
        Ok(outcome)
    }

    /// Expires `sent` contracts that nobody has signed within the window. Returns the expired contracts so the
    /// caller can notify the parties.
    pub async fn expire_stale(&self, older_than: chrono::Duration) -> Result<Vec<Contract>, MarketplaceError> {
        self.db.expire_stale_contracts(older_than).await
    }
}
