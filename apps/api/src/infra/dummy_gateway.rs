use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use chrono::{Days, Utc};
use sha2::{Digest, Sha256};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        CustomerId, GatewayPayment, GatewaySubscription, NewGatewaySubscription, PaymentGateway,
    },
};

/// In-process gateway for development and tests. Makes no network calls;
/// payments are settled by posting signed webhooks for the returned ids.
///
/// Ids are deterministic: the customer id is derived from the email and
/// subscriptions/payments are numbered per instance.
#[derive(Default)]
pub struct DummyPaymentGateway {
    sequence: AtomicU64,
    canceled: Mutex<Vec<String>>,
}

impl DummyPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway subscription ids passed to `cancel_subscription`, in order.
    pub fn canceled_subscriptions(&self) -> Vec<String> {
        self.canceled
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for DummyPaymentGateway {
    async fn create_customer(&self, email: &str, _name: Option<&str>) -> AppResult<CustomerId> {
        let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
        Ok(CustomerId::new(format!(
            "dummy_cus_{}",
            &hex::encode(digest)[..16]
        )))
    }

    async fn create_subscription(
        &self,
        request: &NewGatewaySubscription,
    ) -> AppResult<GatewaySubscription> {
        if request.value_cents <= 0 {
            return Err(AppError::PaymentGateway("value must be positive".into()));
        }

        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let payment_id = format!("dummy_pay_{n}");
        tracing::info!(
            customer = %request.customer_id,
            cycle = %request.cycle,
            value_cents = request.value_cents,
            "Dummy gateway subscription created"
        );

        Ok(GatewaySubscription {
            gateway_subscription_id: format!("dummy_sub_{n}"),
            first_payment: GatewayPayment {
                invoice_url: Some(format!("https://dummy-gateway.invalid/invoices/{payment_id}")),
                due_date: Utc::now().date_naive().checked_add_days(Days::new(3)),
                gateway_payment_id: payment_id,
            },
        })
    }

    async fn cancel_subscription(&self, gateway_subscription_id: &str) -> AppResult<()> {
        if let Ok(mut canceled) = self.canceled.lock() {
            canceled.push(gateway_subscription_id.to_string());
        }
        Ok(())
    }
}
