//! Query model shared by every stage of the pipeline.

use serde::{Deserialize, Serialize};

/// Price band a recipe is tagged with (`budget-low`, `budget-mid`, `budget-high`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetLevel {
    Low,
    Mid,
    High,
}

impl BudgetLevel {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Low => "budget-low",
            Self::Mid => "budget-mid",
            Self::High => "budget-high",
        }
    }
}

impl std::str::FromStr for BudgetLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "mid" | "medium" => Ok(Self::Mid),
            "high" => Ok(Self::High),
            other => Err(format!("unknown budget level: {}", other)),
        }
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Dietary flags. Serialization skips unset flags so query text stays short.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    #[serde(skip_serializing_if = "is_false")]
    pub vegan: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub vegetarian: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub no_pork: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub lactose_free: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub gluten_free: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allergens_avoid: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuisine_bias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_level: Option<BudgetLevel>,
}

impl Preferences {
    /// Tags a generated recipe inherits from the preferences it was built for.
    pub fn implied_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        if self.vegan {
            tags.push("vegan".to_string());
        }
        if self.vegan || self.vegetarian {
            tags.push("vegetarian".to_string());
        }
        if self.no_pork {
            tags.push("no-pork".to_string());
        }
        if self.lactose_free {
            tags.push("lactose-free".to_string());
        }
        if self.gluten_free {
            tags.push("gluten-free".to_string());
        }
        if let Some(cuisine) = &self.cuisine_bias {
            tags.push(cuisine.trim().to_lowercase());
        }
        if let Some(budget) = self.budget_level {
            tags.push(budget.tag().to_string());
        }
        tags
    }
}

/// Macros still open for the day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroTargets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kcal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protein_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbs_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fat_g: Option<f64>,
}

/// Numeric constraints of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    /// Hard per-suggestion energy ceiling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_kcal: Option<f64>,
    #[serde(skip_serializing_if = "MacroTargets::is_empty")]
    pub remaining: MacroTargets,
}

impl MacroTargets {
    pub fn is_empty(&self) -> bool {
        self.kcal.is_none()
            && self.protein_g.is_none()
            && self.carbs_g.is_none()
            && self.fat_g.is_none()
    }
}

/// Macro totals of a recipe or suggestion. Any field may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroSummary {
    pub kcal: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
}

impl MacroSummary {
    pub fn is_empty(&self) -> bool {
        self.kcal.is_none()
            && self.protein_g.is_none()
            && self.carbs_g.is_none()
            && self.fat_g.is_none()
            && self.fiber_g.is_none()
    }
}

/// One retrieval request after preprocessing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryContext {
    pub message: String,
    pub preferences: Preferences,
    pub constraints: Constraints,
    pub servings: u32,
    /// Requested suggestion count. `None` uses the configured default.
    pub limit: Option<usize>,
    /// Food names every returned catalog recipe must contain.
    pub required_ingredients: Vec<String>,
    /// Terms whose presence vetoes a candidate.
    pub negative_terms: Vec<String>,
}

impl QueryContext {
    /// One serving, no limit, default preferences and constraints.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            servings: 1,
            ..Default::default()
        }
    }

    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_serialization_skips_unset() {
        let prefs = Preferences {
            vegan: true,
            cuisine_bias: Some("Italian".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&prefs).unwrap();
        assert_eq!(json, r#"{"vegan":true,"cuisine_bias":"Italian"}"#);
        assert_eq!(serde_json::to_string(&Preferences::default()).unwrap(), "{}");
    }

    #[test]
    fn test_constraints_serialization_skips_unset() {
        let constraints = Constraints {
            max_kcal: Some(600.0),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&constraints).unwrap(), r#"{"max_kcal":600.0}"#);
    }

    #[test]
    fn test_implied_tags() {
        let prefs = Preferences {
            vegan: true,
            budget_level: Some(BudgetLevel::Low),
            ..Default::default()
        };
        assert_eq!(prefs.implied_tags(), vec!["vegan", "vegetarian", "budget-low"]);
    }

    #[test]
    fn test_budget_from_str() {
        assert_eq!("Medium".parse::<BudgetLevel>().unwrap(), BudgetLevel::Mid);
        assert!("cheap".parse::<BudgetLevel>().is_err());
    }
}
