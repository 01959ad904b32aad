//! Macro estimates from the food table and calorie-bounded portion scaling.

use macrogap_core::{MacroSummary, PortionSettings, Result};
use macrogap_store::{Food, RecipeIngredient, SqliteStore};

use crate::types::Suggestion;

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn zero() -> MacroSummary {
    MacroSummary {
        kcal: Some(0.0),
        protein_g: Some(0.0),
        carbs_g: Some(0.0),
        fat_g: Some(0.0),
        fiber_g: Some(0.0),
    }
}

fn add(field: &mut Option<f64>, per_100g: f64, factor: f64) {
    *field = Some(field.unwrap_or(0.0) + per_100g * factor);
}

/// Add `grams` of a food to a running total.
pub fn add_food(total: &mut MacroSummary, food: &Food, grams: f64) {
    let factor = grams / 100.0;
    add(&mut total.kcal, food.kcal, factor);
    add(&mut total.protein_g, food.protein_g, factor);
    add(&mut total.carbs_g, food.carbs_g, factor);
    add(&mut total.fat_g, food.fat_g, factor);
    add(&mut total.fiber_g, food.fiber_g, factor);
}

/// Every field rounded to one decimal.
pub fn rounded(macros: MacroSummary) -> MacroSummary {
    MacroSummary {
        kcal: macros.kcal.map(round1),
        protein_g: macros.protein_g.map(round1),
        carbs_g: macros.carbs_g.map(round1),
        fat_g: macros.fat_g.map(round1),
        fiber_g: macros.fiber_g.map(round1),
    }
}

/// Estimate macros of an ingredient list from per-100 g food values.
///
/// Ingredients without grams or without a food row are skipped. `None` when
/// not a single ingredient resolved.
pub fn estimate_macros(
    store: &SqliteStore,
    ingredients: &[RecipeIngredient],
) -> Result<Option<MacroSummary>> {
    let mut total = zero();
    let mut hit = false;
    for ingredient in ingredients {
        let Some(grams) = ingredient.grams.filter(|g| *g > 0.0) else {
            continue;
        };
        if let Some(food) = store.find_food(&ingredient.name)? {
            add_food(&mut total, &food, grams);
            hit = true;
        }
    }
    Ok(hit.then(|| rounded(total)))
}

/// Replace the suggestion's macros with an ingredient-derived estimate when one exists.
pub fn tighten_macros(store: &SqliteStore, suggestion: &mut Suggestion) -> Result<bool> {
    match estimate_macros(store, &suggestion.ingredients)? {
        Some(estimate) => {
            suggestion.macros = estimate;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Multiply every gram amount by `factor`, never going below `min_grams`.
pub fn scale_portions(ingredients: &mut [RecipeIngredient], factor: f64, min_grams: f64) -> bool {
    let mut changed = false;
    for grams in ingredients
        .iter_mut()
        .filter_map(|i| i.grams.as_mut())
        .filter(|g| **g > 0.0)
    {
        *grams = round1((*grams * factor).max(min_grams));
        changed = true;
    }
    changed
}

/// Shrink portions until the estimate fits `max_kcal`.
///
/// The factor is `max_kcal / kcal`, floored at `portions.min_scale`, so a
/// very large dish may still exceed the bound. Macros are re-derived from
/// foods, or scaled proportionally when no food resolves.
pub fn respect_max_kcal(
    store: &SqliteStore,
    suggestion: &mut Suggestion,
    max_kcal: Option<f64>,
    portions: &PortionSettings,
) -> Result<bool> {
    let (Some(max_kcal), Some(kcal)) = (max_kcal, suggestion.macros.kcal) else {
        return Ok(false);
    };
    if kcal <= max_kcal || kcal <= 0.0 {
        return Ok(false);
    }

    let factor = (max_kcal / kcal).max(portions.min_scale);
    if !scale_portions(&mut suggestion.ingredients, factor, portions.min_grams) {
        return Ok(false);
    }
    if !tighten_macros(store, suggestion)? {
        let m = suggestion.macros;
        suggestion.macros = rounded(MacroSummary {
            kcal: m.kcal.map(|v| v * factor),
            protein_g: m.protein_g.map(|v| v * factor),
            carbs_g: m.carbs_g.map(|v| v * factor),
            fat_g: m.fat_g.map(|v| v * factor),
            fiber_g: m.fiber_g.map(|v| v * factor),
        });
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrogap_core::Provenance;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn suggestion(items: &[(&str, f64)], kcal: Option<f64>) -> Suggestion {
        Suggestion {
            recipe_id: None,
            title: "Plate".into(),
            macros: MacroSummary {
                kcal,
                ..Default::default()
            },
            ingredients: items.iter().map(|(n, g)| RecipeIngredient::new(*n, *g)).collect(),
            instructions: Vec::new(),
            tags: Vec::new(),
            provenance: Provenance::Heuristic,
            score: None,
            time_minutes: None,
            difficulty: None,
        }
    }

    #[test]
    fn test_estimate_uses_known_foods_only() {
        let (store, _dir) = test_store();
        store.upsert_food(&Food::new("Oats", 370.0, 13.0, 60.0, 7.0)).unwrap();

        let items = vec![
            RecipeIngredient::new("oats", 50.0),
            RecipeIngredient::new("Stardust", 100.0),
            RecipeIngredient {
                name: "Oats".into(),
                grams: None,
                note: None,
            },
        ];
        let macros = estimate_macros(&store, &items).unwrap().unwrap();
        assert_eq!(macros.kcal, Some(185.0));
        assert_eq!(macros.protein_g, Some(6.5));

        let unknown = vec![RecipeIngredient::new("Stardust", 100.0)];
        assert!(estimate_macros(&store, &unknown).unwrap().is_none());
    }

    #[test]
    fn test_scale_respects_floor() {
        let mut items = vec![RecipeIngredient::new("A", 200.0), RecipeIngredient::new("B", 50.0)];
        assert!(scale_portions(&mut items, 0.5, 40.0));
        assert_eq!(items[0].grams, Some(100.0));
        assert_eq!(items[1].grams, Some(40.0));
    }

    #[test]
    fn test_respect_max_kcal_rederives_from_foods() {
        let (store, _dir) = test_store();
        store.upsert_food(&Food::new("Rice", 130.0, 2.7, 28.0, 0.3)).unwrap();

        let mut s = suggestion(&[("Rice", 600.0)], Some(780.0));
        let portions = PortionSettings::default();
        let changed = respect_max_kcal(&store, &mut s, Some(390.0), &portions).unwrap();
        assert!(changed);
        assert_eq!(s.ingredients[0].grams, Some(300.0));
        assert_eq!(s.macros.kcal, Some(390.0));
    }

    #[test]
    fn test_respect_max_kcal_scale_floor_and_fallback() {
        let (store, _dir) = test_store();
        let portions = PortionSettings::default();
        let mut s = suggestion(&[("Mystery", 500.0)], Some(1000.0));
        respect_max_kcal(&store, &mut s, Some(100.0), &portions).unwrap();
        // Factor floors at 0.4; no food row, so macros scale proportionally.
        assert_eq!(s.ingredients[0].grams, Some(200.0));
        assert_eq!(s.macros.kcal, Some(400.0));

        let mut under = suggestion(&[("Mystery", 100.0)], Some(300.0));
        assert!(!respect_max_kcal(&store, &mut under, Some(500.0), &portions).unwrap());
        assert!(!respect_max_kcal(&store, &mut under, None, &portions).unwrap());
    }
}
