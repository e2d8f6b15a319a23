//! Ordered, labelled contribution ledger behind every score and risk total.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tolerance between the component sum and the published total.
pub const BREAKDOWN_TOLERANCE: f64 = 0.5;

/// Label used when clamping moves the total away from the raw sum.
pub const CLAMP_LABEL: &str = "clamp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    components: Vec<Component>,
    total: f64,
}

impl Breakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component. Insertion order is the published order.
    pub fn push(&mut self, label: impl Into<String>, value: f64) {
        self.components.push(Component {
            label: label.into(),
            value,
        });
    }

    pub fn raw_sum(&self) -> f64 {
        self.components.iter().map(|c| c.value).sum()
    }

    /// Clamp the raw sum into `[lo, hi]` and publish it as the total.
    ///
    /// When clamping changes the value, the difference is recorded as a
    /// `clamp` component so the components still sum to the total.
    pub fn finalize(mut self, lo: f64, hi: f64) -> Result<Self> {
        let raw = self.raw_sum();
        let total = raw.clamp(lo, hi);
        if (total - raw).abs() > f64::EPSILON {
            self.push(CLAMP_LABEL, total - raw);
        }
        self.total = total;
        self.verify()?;
        Ok(self)
    }

    pub fn verify(&self) -> Result<()> {
        let sum = self.raw_sum();
        if !sum.is_finite() || !self.total.is_finite() {
            return Err(Error::InvariantViolation(format!(
                "non-finite breakdown: sum={} total={}",
                sum, self.total
            )));
        }
        if (sum - self.total).abs() > BREAKDOWN_TOLERANCE {
            return Err(Error::InvariantViolation(format!(
                "breakdown sum {:.3} differs from total {:.3}",
                sum, self.total
            )));
        }
        Ok(())
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.components
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.value)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.label.as_str()).collect()
    }
}
