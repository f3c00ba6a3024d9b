use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::{payment_status::PaymentStatus, subscription::SubscriptionStatus};

/// Payment lifecycle events the gateway posts to our webhook.
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
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEventKind {
    PaymentCreated,
    PaymentConfirmed,
    PaymentReceived,
    PaymentOverdue,
    PaymentDeleted,
    PaymentRefunded,
}

impl GatewayEventKind {
    /// Status the payment ends up in after this event.
    pub fn target_status(&self) -> PaymentStatus {
        match self {
            GatewayEventKind::PaymentCreated => PaymentStatus::Pending,
            GatewayEventKind::PaymentConfirmed => PaymentStatus::Confirmed,
            GatewayEventKind::PaymentReceived => PaymentStatus::Received,
            GatewayEventKind::PaymentOverdue => PaymentStatus::Overdue,
            GatewayEventKind::PaymentDeleted => PaymentStatus::Deleted,
            GatewayEventKind::PaymentRefunded => PaymentStatus::Refunded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatsEffect {
    None,
    /// Count the payment and extend premium to the new period end
    Credit,
    /// Take the payment back and end premium now
    Refund,
}

/// What to write for one webhook event, computed from the locked rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub payment_status: PaymentStatus,
    pub subscription_status: Option<SubscriptionStatus>,
    pub extend_period: bool,
    pub stats: UserStatsEffect,
}

/// Transition for an event applied to an existing payment.
///
/// Returns `None` when the event doesn't apply to the current payment status
/// (duplicate confirmation, out-of-order delivery, anything after a terminal
/// state). `PaymentCreated` never transitions an existing payment; new
/// payments are inserted by the caller instead.
pub fn plan_transition(
    event: GatewayEventKind,
    payment: PaymentStatus,
    subscription: SubscriptionStatus,
) -> Option<TransitionPlan> {
    let target = event.target_status();
    if event == GatewayEventKind::PaymentCreated || !payment.can_transition_to(target) {
        return None;
    }

    let plan = match event {
        GatewayEventKind::PaymentConfirmed => credit(target),
        // Confirmation was already counted; only the settlement changes.
        GatewayEventKind::PaymentReceived if payment == PaymentStatus::Confirmed => {
            TransitionPlan {
                payment_status: target,
                subscription_status: None,
                extend_period: false,
                stats: UserStatsEffect::None,
            }
        }
        GatewayEventKind::PaymentReceived => credit(target),
        GatewayEventKind::PaymentOverdue => TransitionPlan {
            payment_status: target,
            subscription_status: (subscription == SubscriptionStatus::Active)
                .then_some(SubscriptionStatus::PastDue),
            extend_period: false,
            stats: UserStatsEffect::None,
        },
        GatewayEventKind::PaymentDeleted => TransitionPlan {
            payment_status: target,
            subscription_status: (subscription == SubscriptionStatus::Pending)
                .then_some(SubscriptionStatus::Canceled),
            extend_period: false,
            stats: UserStatsEffect::None,
        },
        GatewayEventKind::PaymentRefunded => TransitionPlan {
            payment_status: target,
            subscription_status: Some(SubscriptionStatus::Canceled),
            extend_period: false,
            stats: UserStatsEffect::Refund,
        },
        GatewayEventKind::PaymentCreated => return None,
    };

    Some(plan)
}

fn credit(target: PaymentStatus) -> TransitionPlan {
    TransitionPlan {
        payment_status: target,
        subscription_status: Some(SubscriptionStatus::Active),
        extend_period: true,
        stats: UserStatsEffect::Credit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_names() {
        assert_eq!(
            "PAYMENT_CONFIRMED".parse::<GatewayEventKind>().unwrap(),
            GatewayEventKind::PaymentConfirmed
        );
        assert_eq!(
            "PAYMENT_REFUNDED".parse::<GatewayEventKind>().unwrap(),
            GatewayEventKind::PaymentRefunded
        );
        assert!("PAYMENT_SPLIT_CANCELLED".parse::<GatewayEventKind>().is_err());
        assert_eq!(GatewayEventKind::PaymentOverdue.as_ref(), "PAYMENT_OVERDUE");
    }

    #[test]
    fn test_confirmed_activates_subscription() {
        let plan = plan_transition(
            GatewayEventKind::PaymentConfirmed,
            PaymentStatus::Pending,
            SubscriptionStatus::Pending,
        )
        .unwrap();

        assert_eq!(plan.payment_status, PaymentStatus::Confirmed);
        assert_eq!(plan.subscription_status, Some(SubscriptionStatus::Active));
        assert!(plan.extend_period);
        assert_eq!(plan.stats, UserStatsEffect::Credit);
    }

    #[test]
    fn test_confirmed_twice_is_stale() {
        assert!(
            plan_transition(
                GatewayEventKind::PaymentConfirmed,
                PaymentStatus::Confirmed,
                SubscriptionStatus::Active,
            )
            .is_none()
        );
    }

    #[test]
    fn test_received_after_confirmed_does_not_credit_again() {
        let plan = plan_transition(
            GatewayEventKind::PaymentReceived,
            PaymentStatus::Confirmed,
            SubscriptionStatus::Active,
        )
        .unwrap();

        assert_eq!(plan.payment_status, PaymentStatus::Received);
        assert_eq!(plan.subscription_status, None);
        assert!(!plan.extend_period);
        assert_eq!(plan.stats, UserStatsEffect::None);
    }

    #[test]
    fn test_received_without_confirmation_credits() {
        let plan = plan_transition(
            GatewayEventKind::PaymentReceived,
            PaymentStatus::Overdue,
            SubscriptionStatus::PastDue,
        )
        .unwrap();

        assert_eq!(plan.subscription_status, Some(SubscriptionStatus::Active));
        assert_eq!(plan.stats, UserStatsEffect::Credit);
    }

    #[test]
    fn test_overdue_only_downgrades_active_subscription() {
        let plan = plan_transition(
            GatewayEventKind::PaymentOverdue,
            PaymentStatus::Pending,
            SubscriptionStatus::Active,
        )
        .unwrap();
        assert_eq!(plan.subscription_status, Some(SubscriptionStatus::PastDue));

        let plan = plan_transition(
            GatewayEventKind::PaymentOverdue,
            PaymentStatus::Pending,
            SubscriptionStatus::Pending,
        )
        .unwrap();
        assert_eq!(plan.subscription_status, None);
    }

    #[test]
    fn test_overdue_after_payment_is_stale() {
        assert!(
            plan_transition(
                GatewayEventKind::PaymentOverdue,
                PaymentStatus::Received,
                SubscriptionStatus::Active,
            )
            .is_none()
        );
    }

    #[test]
    fn test_deleted_cancels_only_pending_subscription() {
        let plan = plan_transition(
            GatewayEventKind::PaymentDeleted,
            PaymentStatus::Pending,
            SubscriptionStatus::Pending,
        )
        .unwrap();
        assert_eq!(plan.subscription_status, Some(SubscriptionStatus::Canceled));

        // Renewal invoice deleted on an active subscription
        let plan = plan_transition(
            GatewayEventKind::PaymentDeleted,
            PaymentStatus::Pending,
            SubscriptionStatus::Active,
        )
        .unwrap();
        assert_eq!(plan.subscription_status, None);
    }

    #[test]
    fn test_refund_cancels_and_reverts_stats() {
        let plan = plan_transition(
            GatewayEventKind::PaymentRefunded,
            PaymentStatus::Received,
            SubscriptionStatus::Active,
        )
        .unwrap();

        assert_eq!(plan.payment_status, PaymentStatus::Refunded);
        assert_eq!(plan.subscription_status, Some(SubscriptionStatus::Canceled));
        assert_eq!(plan.stats, UserStatsEffect::Refund);
    }

    #[test]
    fn test_refund_of_unpaid_payment_is_stale() {
        assert!(
            plan_transition(
                GatewayEventKind::PaymentRefunded,
                PaymentStatus::Pending,
                SubscriptionStatus::Pending,
            )
            .is_none()
        );
    }

    #[test]
    fn test_nothing_applies_after_terminal_state() {
        for event in [
            GatewayEventKind::PaymentConfirmed,
            GatewayEventKind::PaymentReceived,
            GatewayEventKind::PaymentOverdue,
            GatewayEventKind::PaymentDeleted,
            GatewayEventKind::PaymentRefunded,
        ] {
            for status in [PaymentStatus::Refunded, PaymentStatus::Deleted] {
                assert!(plan_transition(event, status, SubscriptionStatus::Canceled).is_none());
            }
        }
    }

    #[test]
    fn test_created_never_transitions_existing_payment() {
        assert!(
            plan_transition(
                GatewayEventKind::PaymentCreated,
                PaymentStatus::Pending,
                SubscriptionStatus::Active,
            )
            .is_none()
        );
    }
}
