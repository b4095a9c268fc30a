//! Catalogue of the built-in strategies and their default settings.

use crate::{AggregatorConfig, IntervalConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a registered strategy is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Produces aggregated signals consumed by the trading engine.
    SignalDriven,
    /// Proposes trades directly through the `Strategy` trait.
    Proposal,
}

/// Information about a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Strategy name
    pub name: String,
    /// Strategy description
    pub description: String,
    pub kind: StrategyKind,
    /// Default configuration as JSON
    pub default_config: serde_json::Value,
}

/// Registry for available trading strategies.
pub struct StrategyRegistry {
    strategies: BTreeMap<String, StrategyInfo>,
}

impl StrategyRegistry {
    /// Create a new strategy registry with all built-in strategies.
    pub fn new() -> Self {
        let mut strategies = BTreeMap::new();

        strategies.insert(
            "technical".to_string(),
            StrategyInfo {
                name: "Technical Consensus".to_string(),
                description: "Weighted vote of fifteen indicators blended with ML and sentiment scores"
                    .to_string(),
                kind: StrategyKind::SignalDriven,
                default_config: to_json(&AggregatorConfig::default()),
            },
        );

        strategies.insert(
            "interval".to_string(),
            StrategyInfo {
                name: "Interval".to_string(),
                description: "Buys the lower part of a frequently traversed price band and sells near its top"
                    .to_string(),
                kind: StrategyKind::Proposal,
                default_config: to_json(&IntervalConfig::default()),
            },
        );

        Self { strategies }
    }

    /// List all available strategies.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.strategies.values().collect()
    }

    /// Get strategy info by name.
    pub fn get(&self, name: &str) -> Option<&StrategyInfo> {
        self.strategies.get(name)
    }

    /// Get all strategy names.
    pub fn names(&self) -> Vec<&String> {
        self.strategies.keys().collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_core::traits::StrategyConfig;

    #[test]
    fn test_registry_list() {
        let registry = StrategyRegistry::new();
        let strategies = registry.list();

        assert_eq!(strategies.len(), 2);
        assert_eq!(registry.names(), vec!["interval", "technical"]);
    }

    #[test]
    fn test_registry_get() {
        let registry = StrategyRegistry::new();

        assert!(registry.get("interval").is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(
            registry.get("technical").map(|i| i.kind),
            Some(StrategyKind::SignalDriven)
        );
    }

    #[test]
    fn test_default_configs_parse_back() {
        let registry = StrategyRegistry::new();

        let interval: IntervalConfig =
            serde_json::from_value(registry.get("interval").unwrap().default_config.clone()).unwrap();
        assert!(interval.validate().is_ok());
        assert_eq!(interval.symbol, IntervalConfig::default().symbol);

        let technical: AggregatorConfig =
            serde_json::from_value(registry.get("technical").unwrap().default_config.clone()).unwrap();
        assert!((technical.technical_weight - AggregatorConfig::default().technical_weight).abs() < 1e-12);
    }
}
