use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    OnHold,
    Failed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Statuses from which an order may be claimed as paid.
    pub const PAYABLE: &'static [OrderStatus] = &[
        OrderStatus::Pending,
        OrderStatus::Failed,
        OrderStatus::OnHold,
    ];

    pub fn is_paid(self) -> bool {
        matches!(self, OrderStatus::Processing | OrderStatus::Completed)
    }

    pub fn is_payable(self) -> bool {
        Self::PAYABLE.contains(&self)
    }

    /// Statuses allowed to move into `next`. Re-entering the current status is not a move.
    pub fn sources_for(next: OrderStatus) -> Vec<OrderStatus> {
        use OrderStatus::*;
        match next {
            Pending => vec![Failed],
            Processing => Self::PAYABLE.to_vec(),
            Completed => vec![Processing],
            OnHold => vec![Pending],
            Failed => vec![Pending, OnHold],
            Cancelled => vec![Pending, Failed, OnHold, Processing],
            Refunded => vec![Processing, Completed],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        Self::sources_for(next).contains(&self)
    }
}

/// Billing details captured by the storefront at checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub address_1: Option<String>,
    #[serde(default)]
    pub address_2: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// ISO 3166-1 alpha-2
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Merchant order number, sent to the provider as `merchantReference`
    pub reference: String,
    pub payment_method_id: String,
    pub status: OrderStatus,
    /// Provider PSP reference
    pub transaction_id: Option<String>,
    pub total: Decimal,
    pub currency: String,
    pub session_id: Option<String>,
    #[serde(skip_serializing)]
    pub order_key: String,
    pub cart_id: Option<String>,
    pub billing: BillingDetails,
    pub created_at: i64,
    pub updated_at: i64,
    pub paid_at: Option<i64>,
    /// Sum of refunds accepted by the provider
    pub refunded_total: Decimal,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.status.is_paid()
    }

    pub fn is_payable(&self) -> bool {
        self.status.is_payable()
    }

    /// Amount still available for refunds.
    pub fn refundable_amount(&self) -> Decimal {
        (self.total - self.refunded_total).max(Decimal::ZERO)
    }

    pub fn has_transaction_id(&self) -> bool {
        self.transaction_id.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether `psp_reference` is the payment already recorded on this order.
    pub fn records_transaction(&self, psp_reference: &str) -> bool {
        self.transaction_id.as_deref() == Some(psp_reference)
    }

    /// Whether this order was placed with the given gateway.
    pub fn belongs_to(&self, gateway_id: &str) -> bool {
        self.payment_method_id == gateway_id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub reference: String,
    pub payment_method_id: String,
    pub total: Decimal,
    pub currency: String,
    #[serde(default)]
    pub cart_id: Option<String>,
    #[serde(default)]
    pub billing: BillingDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderNote {
    pub id: String,
    pub order_id: String,
    pub note: String,
    pub created_at: i64,
}
