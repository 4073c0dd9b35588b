//! The catalogue of membership plans that can be bought with USDT.
use serde::Serialize;
use upg_common::MicroUsdt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    /// Base price, before the per-order disambiguating addend.
    pub price: MicroUsdt,
    pub duration_days: u32,
}

impl Plan {
    pub fn new<S: Into<String>>(id: S, name: S, price: MicroUsdt, duration_days: u32) -> Self {
        Self { id: id.into(), name: name.into(), price, duration_days }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::new(vec![
            Plan::new("plan_7d", "7-day membership", MicroUsdt::from_usdt(5), 7),
            Plan::new("plan_30d", "30-day membership", MicroUsdt::from_usdt(15), 30),
            Plan::new("plan_120d", "120-day membership", MicroUsdt::from_usdt(50), 120),
            Plan::new("plan_365d", "365-day membership", MicroUsdt::from_usdt(100), 365),
        ])
    }
}

impl PlanCatalog {
    pub fn new(plans: Vec<Plan>) -> Self {
        Self { plans }
    }

    pub fn get(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == plan_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plan> {
        self.plans.iter()
    }
}
