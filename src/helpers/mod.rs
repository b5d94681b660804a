mod numbers;

pub use numbers::{new_contract_number, new_gateway_ref, new_order_number};
