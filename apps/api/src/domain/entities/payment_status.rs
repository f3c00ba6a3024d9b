use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Payment status as reported by the payment gateway.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Confirmed,
    Received,
    Overdue,
    Refunded,
    Deleted,
}

impl PaymentStatus {
    /// Money has been (or is guaranteed to be) collected.
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Confirmed | PaymentStatus::Received)
    }

    /// Still waiting for the customer to pay.
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Overdue)
    }

    /// Terminal states never change again, whatever the gateway sends later.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Refunded | PaymentStatus::Deleted)
    }

    pub fn valid_transitions(&self) -> &'static [PaymentStatus] {
        match self {
            PaymentStatus::Pending => &[
                PaymentStatus::Confirmed,
                PaymentStatus::Received,
                PaymentStatus::Overdue,
                PaymentStatus::Deleted,
            ],
            PaymentStatus::Overdue => &[
                PaymentStatus::Confirmed,
                PaymentStatus::Received,
                PaymentStatus::Deleted,
            ],
            PaymentStatus::Confirmed => &[PaymentStatus::Received, PaymentStatus::Refunded],
            PaymentStatus::Received => &[PaymentStatus::Refunded],
            PaymentStatus::Refunded | PaymentStatus::Deleted => &[],
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}
