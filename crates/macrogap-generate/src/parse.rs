//! Lenient parsing of completion replies into [`RecipeIdea`]s.
//!
//! The reply is untrusted text. Code fences and surrounding prose are cut
//! away, a root `ideas` array (or a bare array) is read, and each idea is
//! validated on its own: one bad idea is dropped, the rest survive.

use serde_json::Value;
use tracing::debug;

use crate::types::{IdeaIngredient, RecipeIdea};
use macrogap_core::{Error, MacroBounds, MacroSummary, Result};

/// Outcome of parsing one reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedIdeas {
    pub ideas: Vec<RecipeIdea>,
    /// Entries that failed validation.
    pub dropped: usize,
}

/// Cut the JSON payload out of a completion reply.
///
/// Fences are stripped, then the text from the first `{` to the last `}` is
/// taken. A reply that is a bare array is returned as-is.
pub fn extract_json_payload(raw: &str) -> Option<&str> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
        text = rest.trim_end().trim_end_matches('`').trim();
    }
    if text.starts_with('[') && text.ends_with(']') {
        return Some(text);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse at most `max_ideas` ideas from a reply, clamping macros into `bounds`.
///
/// Returns `MalformedExternalResponse` only when no idea list can be found at
/// all; invalid individual ideas are counted in `dropped`.
pub fn parse_ideas(raw: &str, max_ideas: usize, bounds: &MacroBounds) -> Result<ParsedIdeas> {
    let payload = extract_json_payload(raw)
        .ok_or_else(|| Error::MalformedExternalResponse("no JSON object in completion".into()))?;
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| Error::MalformedExternalResponse(format!("completion is not JSON: {}", e)))?;

    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("ideas") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(Error::MalformedExternalResponse(
                    "completion has no `ideas` array".into(),
                ))
            }
        },
        _ => {
            return Err(Error::MalformedExternalResponse(
                "unexpected JSON shape in completion".into(),
            ))
        }
    };

    let mut parsed = ParsedIdeas::default();
    for entry in entries.iter().take(max_ideas) {
        match parse_idea(entry, bounds) {
            Ok(idea) => parsed.ideas.push(idea),
            Err(e) => {
                debug!("Dropping generated idea: {}", e);
                parsed.dropped += 1;
            }
        }
    }
    Ok(parsed)
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::Validation(msg.into())
}

/// Number or numeric string. Anything else is `None`.
fn lenient_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn clamp(v: f64, hi: f64) -> f64 {
    v.max(0.0).min(hi)
}

fn parse_idea(value: &Value, bounds: &MacroBounds) -> Result<RecipeIdea> {
    let obj = value.as_object().ok_or_else(|| invalid("idea is not an object"))?;

    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| invalid("missing title"))?
        .to_string();

    let instructions = match obj.get("instructions") {
        Some(Value::Array(steps)) => steps
            .iter()
            .map(|s| s.as_str().map(|s| s.trim().to_string()))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| invalid(format!("non-text step in '{}'", title)))?,
        Some(Value::String(s)) => vec![s.trim().to_string()],
        _ => return Err(invalid(format!("missing instructions in '{}'", title))),
    };

    let ingredients = match obj.get("ingredients") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| parse_ingredient(item, &title))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => return Err(invalid(format!("ingredients of '{}' are not a list", title))),
    };

    let macros = match obj.get("macros") {
        None | Some(Value::Null) => MacroSummary::default(),
        Some(m) => parse_macros(m, bounds)
            .ok_or_else(|| invalid(format!("bad macros in '{}'", title)))?,
    };

    let time_minutes = obj
        .get("time_minutes")
        .and_then(lenient_f64)
        .filter(|m| *m >= 0.0)
        .map(|m| m.round() as u32);

    let difficulty = obj
        .get("difficulty")
        .and_then(Value::as_str)
        .map(|d| d.trim().to_lowercase())
        .filter(|d| matches!(d.as_str(), "easy" | "medium" | "hard"));

    let tags = match obj.get("tags") {
        Some(Value::Array(tags)) => tags
            .iter()
            .filter_map(Value::as_str)
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    Ok(RecipeIdea {
        title,
        time_minutes,
        difficulty,
        ingredients,
        instructions,
        macros,
        tags,
    })
}

fn parse_ingredient(item: &Value, title: &str) -> Result<IdeaIngredient> {
    let name = item
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| invalid(format!("unnamed ingredient in '{}'", title)))?;
    let grams = match item.get("grams") {
        None | Some(Value::Null) => None,
        Some(g) => Some(
            lenient_f64(g)
                .filter(|g| *g >= 0.0)
                .ok_or_else(|| invalid(format!("bad grams for '{}' in '{}'", name, title)))?,
        ),
    };
    Ok(IdeaIngredient {
        name: name.to_string(),
        grams,
    })
}

/// kcal, protein, carbs and fat are required; fiber is optional.
fn parse_macros(value: &Value, bounds: &MacroBounds) -> Option<MacroSummary> {
    let obj = value.as_object()?;
    let field = |key: &str| obj.get(key).and_then(lenient_f64);
    Some(MacroSummary {
        kcal: Some(clamp(field("kcal")?, bounds.kcal)),
        protein_g: Some(clamp(field("protein_g")?, bounds.protein_g)),
        carbs_g: Some(clamp(field("carbs_g")?, bounds.carbs_g)),
        fat_g: Some(clamp(field("fat_g")?, bounds.fat_g)),
        fiber_g: field("fiber_g").map(|f| clamp(f, bounds.fiber_g)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDEA: &str = r#"{"title": "Lentil Bowl",
        "ingredients": [{"name": "Lentils", "grams": 150}],
        "instructions": ["Cook lentils."],
        "macros": {"kcal": 520, "protein_g": 32, "carbs_g": 60, "fat_g": 12}}"#;

    #[test]
    fn test_extract_from_fences_and_prose() {
        let fenced = "```json\n{\"ideas\": []}\n```";
        assert_eq!(extract_json_payload(fenced), Some("{\"ideas\": []}"));

        let chatty = "Sure! Here you go: {\"ideas\": []} Enjoy.";
        assert_eq!(extract_json_payload(chatty), Some("{\"ideas\": []}"));

        assert_eq!(extract_json_payload("[1, 2]"), Some("[1, 2]"));
        assert_eq!(extract_json_payload("no json here"), None);
        assert_eq!(extract_json_payload("} backwards {"), None);
    }

    #[test]
    fn test_parse_root_key_and_bare_array() {
        let bounds = MacroBounds::default();
        let wrapped = format!("{{\"ideas\": [{}]}}", IDEA);
        let parsed = parse_ideas(&wrapped, 5, &bounds).unwrap();
        assert_eq!(parsed.ideas.len(), 1);
        assert_eq!(parsed.ideas[0].title, "Lentil Bowl");
        assert_eq!(parsed.ideas[0].ingredients[0].grams, Some(150.0));
        assert_eq!(parsed.ideas[0].macros.fiber_g, None);

        let bare = format!("[{}]", IDEA);
        assert_eq!(parse_ideas(&bare, 5, &bounds).unwrap().ideas.len(), 1);
    }

    #[test]
    fn test_macros_are_clamped() {
        let raw = r#"{"ideas": [{"title": "Protein Tower", "instructions": ["Stack."],
            "macros": {"kcal": "2500", "protein_g": 500, "carbs_g": -4, "fat_g": 20,
                       "fiber_g": 300}}]}"#;
        let idea = &parse_ideas(raw, 1, &MacroBounds::default()).unwrap().ideas[0];
        assert_eq!(idea.macros.kcal, Some(1400.0));
        assert_eq!(idea.macros.protein_g, Some(200.0));
        assert_eq!(idea.macros.carbs_g, Some(0.0));
        assert_eq!(idea.macros.fat_g, Some(20.0));
        assert_eq!(idea.macros.fiber_g, Some(80.0));
    }

    #[test]
    fn test_malformed_ideas_dropped_individually() {
        let raw = format!(
            r#"{{"ideas": [
                {{"title": "", "instructions": []}},
                {{"title": "No Steps"}},
                {{"title": "Bad Macros", "instructions": ["x"], "macros": {{"kcal": "lots"}}}},
                {{"title": "Bad Grams", "instructions": ["x"],
                  "ingredients": [{{"name": "Rice", "grams": "a cup"}}]}},
                "not an object",
                {}
            ]}}"#,
            IDEA
        );
        let parsed = parse_ideas(&raw, 10, &MacroBounds::default()).unwrap();
        assert_eq!(parsed.ideas.len(), 1);
        assert_eq!(parsed.dropped, 5);
    }

    #[test]
    fn test_truncates_to_requested_count() {
        let raw = format!("{{\"ideas\": [{}, {}, {}]}}", IDEA, IDEA, IDEA);
        let parsed = parse_ideas(&raw, 2, &MacroBounds::default()).unwrap();
        assert_eq!(parsed.ideas.len(), 2);
        assert_eq!(parsed.dropped, 0);
    }

    #[test]
    fn test_lenient_optional_fields() {
        let raw = r#"{"ideas": [{"title": " Quick Oats ", "instructions": "Stir.",
            "time_minutes": "7", "difficulty": "Easy", "tags": ["Breakfast", 3, ""]}]}"#;
        let idea = &parse_ideas(raw, 1, &MacroBounds::default()).unwrap().ideas[0];
        assert_eq!(idea.title, "Quick Oats");
        assert_eq!(idea.instructions, vec!["Stir.".to_string()]);
        assert_eq!(idea.time_minutes, Some(7));
        assert_eq!(idea.difficulty.as_deref(), Some("easy"));
        assert_eq!(idea.tags, vec!["breakfast".to_string()]);
        assert!(idea.macros.is_empty());
    }

    #[test]
    fn test_unusable_reply_is_malformed() {
        let bounds = MacroBounds::default();
        for raw in ["I cannot help with that.", "{\"recipes\": []}", "{\"ideas\": 3}", "{broken"] {
            assert!(matches!(
                parse_ideas(raw, 2, &bounds),
                Err(Error::MalformedExternalResponse(_))
            ));
        }
    }
}
