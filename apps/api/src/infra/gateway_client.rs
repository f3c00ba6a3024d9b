//! REST adapter for the payment gateway.
//!
//! The gateway speaks JSON with a bearer API key:
//! `POST /customers`, `POST /subscriptions`, `DELETE /subscriptions/{id}`.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        CustomerId, GatewayPayment, GatewaySubscription, NewGatewaySubscription, PaymentGateway,
    },
    domain::entities::subscription::BillingCycle,
};

#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl HttpPaymentGateway {
    pub fn new(client: Client, base_url: Url, api_key: SecretString) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))
            .map_err(|e| AppError::Internal(format!("bad gateway url: {e}")))
    }

    fn request(&self, method: Method, path: &str) -> AppResult<RequestBuilder> {
        Ok(self
            .client
            .request(method, self.endpoint(path)?)
            .bearer_auth(self.api_key.expose_secret()))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "Payment gateway unreachable");
            AppError::PaymentGateway("Payment gateway is unavailable".into())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("Failed to read gateway response: {e}")))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Payment gateway error");
            return Err(AppError::PaymentGateway(gateway_error_message(&body).unwrap_or_else(
                || format!("Payment gateway returned {status}"),
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse gateway response");
            AppError::PaymentGateway(format!("Unexpected gateway response: {e}"))
        })
    }
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    #[serde(default)]
    errors: Vec<GatewayErrorItem>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorItem {
    description: String,
}

/// First human-readable message in a gateway error body.
fn gateway_error_message(body: &str) -> Option<String> {
    let parsed: GatewayErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .errors
        .into_iter()
        .map(|e| e.description)
        .chain(parsed.message)
        .find(|m| !m.trim().is_empty())
}

#[derive(Serialize)]
struct CreateCustomerRequest<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Deserialize)]
struct CustomerResponse {
    id: String,
}

#[derive(Serialize)]
struct CreateSubscriptionRequest<'a> {
    customer: &'a str,
    cycle: &'static str,
    value_cents: i64,
    currency: &'a str,
    description: &'a str,
    external_reference: &'a str,
}

#[derive(Deserialize)]
struct SubscriptionResponse {
    id: String,
    first_payment: PaymentResponse,
}

#[derive(Deserialize)]
struct PaymentResponse {
    id: String,
    #[serde(default)]
    invoice_url: Option<String>,
    #[serde(default)]
    due_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct DeletedResponse {
    #[serde(default)]
    deleted: bool,
}

fn cycle_name(cycle: BillingCycle) -> &'static str {
    match cycle {
        BillingCycle::Monthly => "MONTHLY",
        BillingCycle::Yearly => "YEARLY",
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_customer(&self, email: &str, name: Option<&str>) -> AppResult<CustomerId> {
        let request = self
            .request(Method::POST, "customers")?
            .json(&CreateCustomerRequest { email, name });
        let customer: CustomerResponse = self.send(request).await?;
        Ok(CustomerId::new(customer.id))
    }

    async fn create_subscription(
        &self,
        request: &NewGatewaySubscription,
    ) -> AppResult<GatewaySubscription> {
        let body = CreateSubscriptionRequest {
            customer: request.customer_id.as_str(),
            cycle: cycle_name(request.cycle),
            value_cents: request.value_cents,
            currency: &request.currency,
            description: &request.description,
            external_reference: &request.external_reference,
        };
        let created: SubscriptionResponse = self
            .send(self.request(Method::POST, "subscriptions")?.json(&body))
            .await?;

        Ok(GatewaySubscription {
            gateway_subscription_id: created.id,
            first_payment: GatewayPayment {
                gateway_payment_id: created.first_payment.id,
                invoice_url: created.first_payment.invoice_url,
                due_date: created.first_payment.due_date,
            },
        })
    }

    async fn cancel_subscription(&self, gateway_subscription_id: &str) -> AppResult<()> {
        let path = format!("subscriptions/{gateway_subscription_id}");
        let response: DeletedResponse = self.send(self.request(Method::DELETE, &path)?).await?;
        if !response.deleted {
            tracing::warn!(gateway_subscription_id, "Gateway did not confirm cancellation");
        }
        Ok(())
    }
}
