// 2.0 demand.rs: excess demand functions. an agent's order is one of these.
// 2.1 PriceVector is the candidate price point, always in property registration order.
// 2.2 reference functions used by the demo and the tests.

use crate::types::PropertyId;
use std::collections::BTreeMap;

/// Excess demand per property. Ordered so aggregation is reproducible.
pub type DemandVector = BTreeMap<PropertyId, f64>;

/// Sparse partial derivatives keyed `(demanded property, priced property)`.
pub type Jacobian = BTreeMap<(PropertyId, PropertyId), f64>;

/// A candidate price for every traded property, in registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceVector {
    properties: Vec<PropertyId>,
    prices: Vec<f64>,
}

impl PriceVector {
    pub fn new(entries: impl IntoIterator<Item = (PropertyId, f64)>) -> Self {
        let (properties, prices) = entries.into_iter().unzip();
        Self { properties, prices }
    }

    pub fn get(&self, property: PropertyId) -> Option<f64> {
        self.index_of(property).map(|i| self.prices[i])
    }

    pub fn index_of(&self, property: PropertyId) -> Option<usize> {
        self.properties.iter().position(|p| *p == property)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, f64)> + '_ {
        self.properties.iter().copied().zip(self.prices.iter().copied())
    }

    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn values(&self) -> &[f64] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Same properties, different prices. `values` must match in length.
    pub(crate) fn with_values(&self, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), self.properties.len());
        Self {
            properties: self.properties.clone(),
            prices: values,
        }
    }
}

/// An agent's excess demand as a function of the full price vector.
///
/// Positive values mean the agent wants to buy, negative that it wants to sell.
/// Properties the agent does not care about may be omitted from the result.
pub trait ExcessDemand {
    fn excess_demand(&self, prices: &PriceVector) -> DemandVector;

    /// Analytic derivatives, if known. The solver falls back to central finite
    /// differences when this returns `None`.
    fn jacobian(&self, _prices: &PriceVector) -> Option<Jacobian> {
        None
    }
}

impl<F> ExcessDemand for F
where
    F: Fn(&PriceVector) -> DemandVector,
{
    fn excess_demand(&self, prices: &PriceVector) -> DemandVector {
        self(prices)
    }
}

/// `ed(p) = intercept - slope * p` on a single property. Clears at `intercept / slope`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearExcessDemand {
    pub property: PropertyId,
    pub intercept: f64,
    pub slope: f64,
}

impl ExcessDemand for LinearExcessDemand {
    fn excess_demand(&self, prices: &PriceVector) -> DemandVector {
        let mut demand = DemandVector::new();
        if let Some(p) = prices.get(self.property) {
            demand.insert(self.property, self.intercept - self.slope * p);
        }
        demand
    }

    fn jacobian(&self, _prices: &PriceVector) -> Option<Jacobian> {
        Some(Jacobian::from([((self.property, self.property), -self.slope)]))
    }
}

/// Spends a fixed cash budget on one property while holding `endowment` units:
/// `ed(p) = budget / p - endowment`. Strictly decreasing, clears at `budget / endowment`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsoelasticExcessDemand {
    pub property: PropertyId,
    pub budget: f64,
    pub endowment: f64,
}

impl ExcessDemand for IsoelasticExcessDemand {
    fn excess_demand(&self, prices: &PriceVector) -> DemandVector {
        let mut demand = DemandVector::new();
        if let Some(p) = prices.get(self.property) {
            demand.insert(self.property, self.budget / p - self.endowment);
        }
        demand
    }

    fn jacobian(&self, prices: &PriceVector) -> Option<Jacobian> {
        let p = prices.get(self.property)?;
        Some(Jacobian::from([(
            (self.property, self.property),
            -self.budget / (p * p),
        )]))
    }
}

/// Cobb-Douglas consumer living off its endowment. Wealth is the market value
/// of the endowment and a share `weight_j` of it is spent on property `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct CobbDouglasExcessDemand {
    // (property, expenditure share, endowment)
    pub goods: Vec<(PropertyId, f64, f64)>,
}

impl ExcessDemand for CobbDouglasExcessDemand {
    fn excess_demand(&self, prices: &PriceVector) -> DemandVector {
        let wealth: f64 = self
            .goods
            .iter()
            .filter_map(|&(property, _, endowment)| prices.get(property).map(|p| p * endowment))
            .sum();

        self.goods
            .iter()
            .filter_map(|&(property, weight, endowment)| {
                let p = prices.get(property)?;
                Some((property, weight * wealth / p - endowment))
            })
            .collect()
    }
}
