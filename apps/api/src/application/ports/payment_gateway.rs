use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{app_error::AppResult, domain::entities::subscription::BillingCycle};

/// Customer id assigned by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recurring charge to create for a customer.
#[derive(Debug, Clone)]
pub struct NewGatewaySubscription {
    pub customer_id: CustomerId,
    pub cycle: BillingCycle,
    pub value_cents: i64,
    pub currency: String,
    pub description: String,
    /// Our user id, echoed back by the gateway on every payment.
    pub external_reference: String,
}

/// An invoice the gateway generated for a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub gateway_payment_id: String,
    pub invoice_url: Option<String>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySubscription {
    pub gateway_subscription_id: String,
    pub first_payment: GatewayPayment,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_customer(&self, email: &str, name: Option<&str>) -> AppResult<CustomerId>;

    async fn create_subscription(
        &self,
        request: &NewGatewaySubscription,
    ) -> AppResult<GatewaySubscription>;

    async fn cancel_subscription(&self, gateway_subscription_id: &str) -> AppResult<()>;
}
