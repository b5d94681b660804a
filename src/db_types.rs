use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::op;

/// Fallback trust score for actors with no order history at all.
pub const DEFAULT_TRUST_SCORE: i64 = 50;
/// Lower clamp for computed trust scores. The score range is 10-100.
pub const TRUST_SCORE_FLOOR: i64 = 10;
/// Upper clamp for computed trust scores.
pub const TRUST_SCORE_CEILING: i64 = 100;
/// Payment terms applied when a supplier has not negotiated their own.
pub const DEFAULT_PAYMENT_TERMS_DAYS: i64 = 30;

//--------------------------------------      Money       ------------------------------------------------------------
/// An amount of money in minor currency units (paise). All order totals are exact integer sums, so there is no
/// rounding drift between an order and its items.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rupees = self.0 as f64 / 100.0;
        write!(f, "₹{rupees:0.2}")
    }
}

impl Money {
    /// Construct an amount from whole rupees.
    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

//--------------------------------------       Role       ------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Buyer sourcing goods from suppliers.
    Vendor,
    /// Seller offering products with finite stock.
    Supplier,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Vendor => write!(f, "vendor"),
            Role::Supplier => write!(f, "supplier"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vendor" => Ok(Self::Vendor),
            "supplier" => Ok(Self::Supplier),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------      Actor       ------------------------------------------------------------
/// A marketplace participant. Identity is owned by the auth subsystem; the engine reads these records and maintains
/// only the rating aggregate.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub name: String,
    pub role: Role,
    pub city: String,
    pub state: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Running average of order ratings received (suppliers only).
    pub rating: Option<f64>,
    /// Days a vendor has to settle a pay-later order with this supplier.
    pub payment_terms_days: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActor {
    pub name: String,
    pub role: Role,
    pub city: String,
    pub state: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub payment_terms_days: i64,
}

impl NewActor {
    pub fn new<S: Into<String>>(name: S, role: Role, city: S, state: S) -> Self {
        Self {
            name: name.into(),
            role,
            city: city.into(),
            state: state.into(),
            lat: None,
            lng: None,
            payment_terms_days: DEFAULT_PAYMENT_TERMS_DAYS,
        }
    }

    pub fn with_coordinates(mut self, lat: f64, lng: f64) -> Self {
        self.lat = Some(lat);
        self.lng = Some(lng);
        self
    }

    pub fn with_payment_terms(mut self, days: i64) -> Self {
        self.payment_terms_days = days;
        self
    }
}

//--------------------------------------     Product      ------------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub supplier_id: i64,
    pub name: String,
    pub category: String,
    pub unit_price: Money,
    pub stock_quantity: i64,
    pub min_order_quantity: i64,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub supplier_id: i64,
    pub name: String,
    pub category: String,
    pub unit_price: Money,
    pub stock_quantity: i64,
    pub min_order_quantity: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(supplier_id: i64, name: S, category: S, unit_price: Money, stock: i64) -> Self {
        Self {
            supplier_id,
            name: name.into(),
            category: category.into(),
            unit_price,
            stock_quantity: stock,
            min_order_quantity: 1,
        }
    }

    pub fn with_min_order_quantity(mut self, moq: i64) -> Self {
        self.min_order_quantity = moq;
        self
    }
}

//--------------------------------------  OrderStatusType ------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Newly created. Stock is reserved, awaiting the supplier's decision.
    Pending,
    /// Accepted by the supplier.
    Accepted,
    /// Declined by the supplier. Reserved stock has been restored. Terminal.
    Rejected,
    /// The supplier is preparing the order.
    InProgress,
    /// The order has left the supplier.
    OutForDelivery,
    /// Received by the vendor. Terminal.
    Delivered,
    /// Cancelled by either party before delivery. Reserved stock has been restored. Terminal.
    Cancelled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Delivered | Self::Cancelled)
    }

    /// The next status along the delivery chain, if this status has one.
    pub fn next_forward(&self) -> Option<Self> {
        match self {
            Self::Accepted => Some(Self::InProgress),
            Self::InProgress => Some(Self::OutForDelivery),
            Self::OutForDelivery => Some(Self::Delivered),
            _ => None,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Accepted => write!(f, "accepted"),
            OrderStatusType::Rejected => write!(f, "rejected"),
            OrderStatusType::InProgress => write!(f, "in_progress"),
            OrderStatusType::OutForDelivery => write!(f, "out_for_delivery"),
            OrderStatusType::Delivered => write!(f, "delivered"),
            OrderStatusType::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "in_progress" => Ok(Self::InProgress),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to pending");
            OrderStatusType::Pending
        })
    }
}

//-------------------------------------- OrderPaymentStatus ----------------------------------------------------------
/// Settlement state recorded on the order itself. `Paid` is only ever set in the same transaction that completes the
/// backing payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl Display for OrderPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderPaymentStatus::Pending => write!(f, "pending"),
            OrderPaymentStatus::Paid => write!(f, "paid"),
            OrderPaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

//--------------------------------------  PaymentMethod   ------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Upi,
    Card,
    NetBanking,
    PayLater,
}

impl PaymentMethod {
    /// Deferred methods create a due-dated pending payment instead of calling the gateway.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::PayLater)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Upi => write!(f, "upi"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::NetBanking => write!(f, "net_banking"),
            PaymentMethod::PayLater => write!(f, "pay_later"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upi" => Ok(Self::Upi),
            "card" => Ok(Self::Card),
            "net_banking" => Ok(Self::NetBanking),
            "pay_later" => Ok(Self::PayLater),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------    OrderItem     ------------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
}

//--------------------------------------      Order       ------------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// Unique human-readable number, e.g. `ORD-170000123-4821`.
    pub order_number: String,
    pub vendor_id: i64,
    pub supplier_id: i64,
    pub status: OrderStatusType,
    pub payment_status: OrderPaymentStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: Money,
    pub delivery_address: String,
    pub notes: Option<String>,
    /// Rating (1-5) given by the vendor after delivery.
    pub supplier_rating: Option<i64>,
    pub contract_id: Option<i64>,
    pub payment_due_at: DateTime<Utc>,
    pub expected_delivery_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Order lines. Not a column; populated by a second query.
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

// `items` lives in its own table, so the row mapping is written by hand and leaves the lines empty for the
// fetch-side to fill in.
#[cfg(feature = "sqlite")]
impl<'r> FromRow<'r, sqlx::sqlite::SqliteRow> for Order {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            order_number: row.try_get("order_number")?,
            vendor_id: row.try_get("vendor_id")?,
            supplier_id: row.try_get("supplier_id")?,
            status: row.try_get("status")?,
            payment_status: row.try_get("payment_status")?,
            payment_method: row.try_get("payment_method")?,
            total_amount: row.try_get("total_amount")?,
            delivery_address: row.try_get("delivery_address")?,
            notes: row.try_get("notes")?,
            supplier_rating: row.try_get("supplier_rating")?,
            contract_id: row.try_get("contract_id")?,
            payment_due_at: row.try_get("payment_due_at")?,
            expected_delivery_at: row.try_get("expected_delivery_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            items: Vec::new(),
        })
    }
}

impl Order {
    /// True if the given actor is one of the two parties to this order.
    pub fn is_party(&self, actor_id: i64) -> bool {
        self.vendor_id == actor_id || self.supplier_id == actor_id
    }
}

/// A fully validated order, ready for atomic insertion + stock reservation. Produced by the order flow API; the item
/// prices have already been resolved against the product records.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub vendor_id: i64,
    pub supplier_id: i64,
    pub payment_method: PaymentMethod,
    pub total_amount: Money,
    pub delivery_address: String,
    pub notes: Option<String>,
    pub payment_due_at: DateTime<Utc>,
    pub items: Vec<PricedOrderItem>,
}

#[derive(Debug, Clone)]
pub struct PricedOrderItem {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
}

//-------------------------------------- ContractStatusType ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContractStatusType {
    Draft,
    Sent,
    Signed,
    Expired,
    Cancelled,
}

impl Display for ContractStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractStatusType::Draft => write!(f, "draft"),
            ContractStatusType::Sent => write!(f, "sent"),
            ContractStatusType::Signed => write!(f, "signed"),
            ContractStatusType::Expired => write!(f, "expired"),
            ContractStatusType::Cancelled => write!(f, "cancelled"),
        }
    }
}

//--------------------------------------     Contract     ------------------------------------------------------------
/// Bilateral agreement generated once per order. Reaches `signed` only when both signature flags are true, and that
/// check-and-flip happens atomically in the backend.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contract {
    pub id: i64,
    /// Unique number, e.g. `CTR-170000123-0042`.
    pub contract_number: String,
    pub order_id: i64,
    pub vendor_id: i64,
    pub supplier_id: i64,
    pub terms: String,
    pub payment_terms_days: i64,
    pub total_amount: Money,
    pub status: ContractStatusType,
    pub vendor_signed: bool,
    pub vendor_signed_at: Option<DateTime<Utc>>,
    pub supplier_signed: bool,
    pub supplier_signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    pub fn is_fully_signed(&self) -> bool {
        self.vendor_signed && self.supplier_signed
    }

    pub fn is_party(&self, actor_id: i64) -> bool {
        self.vendor_id == actor_id || self.supplier_id == actor_id
    }
}

#[derive(Debug, Clone)]
pub struct NewContract {
    pub contract_number: String,
    pub order_id: i64,
    pub vendor_id: i64,
    pub supplier_id: i64,
    pub terms: String,
    pub payment_terms_days: i64,
    pub total_amount: Money,
}

//--------------------------------------   PaymentStatus  ------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Processing => write!(f, "processing"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

//--------------------------------------      Payment     ------------------------------------------------------------
/// A settlement attempt for an order. Retries and refunds append or update records; nothing is silently overwritten,
/// so an order can legitimately accumulate several payment rows.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub vendor_id: i64,
    pub supplier_id: i64,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Reference the external gateway reports back with. Absent for pay-later records.
    pub gateway_ref: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: i64,
    pub vendor_id: i64,
    pub supplier_id: i64,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub gateway_ref: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
}

//-------------------------------------- NotificationType ------------------------------------------------------------
/// Stable, wire-visible notification type names. These names are part of the contract with client applications and
/// must not change between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    OrderReceived,
    OrderApproved,
    OrderRejected,
    ContractSent,
    ContractCompleted,
    PaymentReminder,
    StockAlert,
    NewSupplier,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::OrderReceived => "order_received",
            NotificationType::OrderApproved => "order_approved",
            NotificationType::OrderRejected => "order_rejected",
            NotificationType::ContractSent => "contract_sent",
            NotificationType::ContractCompleted => "contract_completed",
            NotificationType::PaymentReminder => "payment_reminder",
            NotificationType::StockAlert => "stock_alert",
            NotificationType::NewSupplier => "new_supplier",
        }
    }
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//--------------------------------------   Notification   ------------------------------------------------------------
/// Durable notification row. Append-only except the `is_read` flip and explicit deletion; realtime delivery is a
/// best-effort extra on top of this record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub ntype: NotificationType,
    pub title: String,
    pub message: String,
    /// JSON payload for the client, serialized as text.
    pub data: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
