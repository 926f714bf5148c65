use crate::utils::error::{EnrollError, Result};
use std::collections::{BTreeMap, HashMap};

/// 方案選項 → 供應商方案代碼 的靜態對應表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTable {
    plans: BTreeMap<String, String>,
}

impl PlanTable {
    /// 選項一律轉成小寫；代碼不可為空且彼此不可重複
    pub fn new<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut plans = BTreeMap::new();
        let mut seen_codes: HashMap<String, String> = HashMap::new();

        for (selector, code) in entries {
            let selector = Self::normalize(selector.as_ref());
            let code = code.as_ref().trim().to_string();

            if selector.is_empty() || code.is_empty() {
                return Err(EnrollError::InvalidConfigValueError {
                    field: format!("plans.{}", selector),
                    value: code,
                    reason: "Plan selector and plan code cannot be empty".to_string(),
                });
            }

            if let Some(other) = seen_codes.insert(code.clone(), selector.clone()) {
                return Err(EnrollError::InvalidConfigValueError {
                    field: format!("plans.{}", selector),
                    value: code,
                    reason: format!("Plan code is already used by selector '{}'", other),
                });
            }

            if plans.insert(selector.clone(), code).is_some() {
                return Err(EnrollError::InvalidConfigValueError {
                    field: format!("plans.{}", selector),
                    value: selector,
                    reason: "Plan selector is defined twice (selectors are case-insensitive)"
                        .to_string(),
                });
            }
        }

        if plans.is_empty() {
            return Err(EnrollError::ConfigError {
                message: "At least one plan must be configured under [plans]".to_string(),
            });
        }

        Ok(Self { plans })
    }

    pub fn normalize(selector: &str) -> String {
        selector.trim().to_lowercase()
    }

    pub fn resolve(&self, selector: &str) -> Option<&str> {
        self.plans.get(&Self::normalize(selector)).map(String::as_str)
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.plans.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PlanTable {
        PlanTable::new([("monthly", "premium-monthly"), ("annual", "premium-annual")]).unwrap()
    }

    #[test]
    fn test_monthly_and_annual_resolve_to_distinct_codes() {
        let plans = table();
        let monthly = plans.resolve("monthly").unwrap();
        let annual = plans.resolve("annual").unwrap();
        assert_eq!(monthly, "premium-monthly");
        assert_ne!(monthly, annual);
    }

    #[test]
    fn test_selector_lookup_is_case_insensitive() {
        let plans = table();
        assert_eq!(plans.resolve("  Monthly "), Some("premium-monthly"));
        assert_eq!(plans.resolve("ANNUAL"), Some("premium-annual"));
    }

    #[test]
    fn test_unknown_selector_is_none() {
        assert_eq!(table().resolve("weekly"), None);
    }

    #[test]
    fn test_duplicate_codes_are_rejected() {
        let err = PlanTable::new([("monthly", "premium"), ("annual", "premium")]).unwrap_err();
        assert!(matches!(err, EnrollError::InvalidConfigValueError { .. }));
    }

    #[test]
    fn test_selectors_colliding_after_normalization_are_rejected() {
        assert!(PlanTable::new([("Monthly", "a"), ("monthly", "b")]).is_err());
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let entries: Vec<(String, String)> = Vec::new();
        assert!(PlanTable::new(entries).is_err());
    }
}
