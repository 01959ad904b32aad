//! Instructions sent to the completion service.

use macrogap_core::QueryContext;

/// System and user instructions for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct IdeaPrompt {
    pub system: String,
    pub user: String,
}

const IDEA_FORMAT: &str = concat!(
    r#"{"ideas": [{"title": "string", "time_minutes": 20, "difficulty": "easy", "#,
    r#""ingredients": [{"name": "string", "grams": 120}], "instructions": ["step"], "#,
    r#""macros": {"kcal": 500, "protein_g": 35, "carbs_g": 45, "fat_g": 15, "fiber_g": 6}, "#,
    r#""tags": ["string"]}]}"#
);

/// Build the prompt asking for exactly `slots` ideas.
pub fn build_prompts(ctx: &QueryContext, slots: usize) -> IdeaPrompt {
    let system = format!(
        "You are a nutrition-aware cooking assistant. Suggest exactly {} recipe idea(s) \
         with gram amounts, short steps and macros per serving. Respect every dietary \
         preference and exclusion. Respond only with JSON, no prose, no code fences.",
        slots
    );

    let preferences = serde_json::to_string(&ctx.preferences).unwrap_or_default();
    let constraints = serde_json::to_string(&ctx.constraints).unwrap_or_default();

    let mut user = String::new();
    user.push_str(&format!("Request: {}\n", ctx.message.trim()));
    user.push_str(&format!("Servings: {}\n", ctx.servings.max(1)));
    user.push_str(&format!("Preferences: {}\n", or_none(&preferences)));
    user.push_str(&format!("Constraints: {}\n", or_none(&constraints)));
    if !ctx.negative_terms.is_empty() {
        user.push_str(&format!("Never use: {}\n", ctx.negative_terms.join(", ")));
    }
    user.push_str(&format!("Answer with this JSON shape: {}\n", IDEA_FORMAT));
    user.push_str("Rules: metric units only, 50-400 g per ingredient, macros per serving");
    if let Some(max) = ctx.constraints.max_kcal {
        user.push_str(&format!(", at most {:.0} kcal per serving", max));
    }
    user.push('.');

    IdeaPrompt { system, user }
}

fn or_none(json: &str) -> &str {
    if json.is_empty() || json == "{}" {
        "none"
    } else {
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrogap_core::{Constraints, Preferences};

    #[test]
    fn test_prompt_carries_request_and_limits() {
        let mut ctx = QueryContext::new("high protein dinner")
            .with_preferences(Preferences {
                vegetarian: true,
                ..Default::default()
            })
            .with_constraints(Constraints {
                max_kcal: Some(650.0),
                ..Default::default()
            });
        ctx.negative_terms = vec!["mushrooms".into()];

        let prompt = build_prompts(&ctx, 2);
        assert!(prompt.system.contains("exactly 2 recipe"));
        assert!(prompt.system.contains("only with JSON"));
        assert!(prompt.user.contains("Request: high protein dinner"));
        assert!(prompt.user.contains(r#"Preferences: {"vegetarian":true}"#));
        assert!(prompt.user.contains("Never use: mushrooms"));
        assert!(prompt.user.contains("at most 650 kcal"));
    }

    #[test]
    fn test_empty_preferences_render_as_none() {
        let prompt = build_prompts(&QueryContext::new("snack"), 1);
        assert!(prompt.user.contains("Preferences: none"));
        assert!(prompt.user.contains("Constraints: none"));
        assert!(!prompt.user.contains("Never use"));
    }
}
