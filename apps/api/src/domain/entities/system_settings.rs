use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::subscription::BillingCycle;

/// Global pricing and free-tier limits, edited by administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub monthly_price_cents: i64,
    pub yearly_price_cents: i64,
    pub currency: String,
    pub max_links_free: i32,
    pub max_forms_free: i32,
    pub analytics_days_free: i32,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            monthly_price_cents: 1990,
            yearly_price_cents: 19900,
            currency: "BRL".to_string(),
            max_links_free: 5,
            max_forms_free: 1,
            analytics_days_free: 7,
            updated_at: None,
        }
    }
}

impl SystemSettings {
    pub fn price_for(&self, cycle: BillingCycle) -> i64 {
        match cycle {
            BillingCycle::Monthly => self.monthly_price_cents,
            BillingCycle::Yearly => self.yearly_price_cents,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.monthly_price_cents <= 0 || self.yearly_price_cents <= 0 {
            return Err("Prices must be positive".into());
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err("Currency must be a 3-letter upper-case code".into());
        }
        if !(1..=1000).contains(&self.max_links_free) {
            return Err("max_links_free must be between 1 and 1000".into());
        }
        if !(0..=100).contains(&self.max_forms_free) {
            return Err("max_forms_free must be between 0 and 100".into());
        }
        if !(1..=90).contains(&self.analytics_days_free) {
            return Err("analytics_days_free must be between 1 and 90".into());
        }
        Ok(())
    }
}
