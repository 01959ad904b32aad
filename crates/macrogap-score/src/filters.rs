//! Hard pre-filters applied before scoring.

use macrogap_core::{Constraints, Preferences};
use macrogap_preprocess::tokenize;
use macrogap_store::Recipe;

const PORK_MARKERS: &[&str] = &[
    "pork", "bacon", "ham", "prosciutto", "chorizo", "salami", "lard", "schweinefleisch",
    "schweinefilet", "speck", "schinken",
];

const DAIRY_MARKERS: &[&str] = &[
    "milk", "buttermilk", "cheese", "cream", "butter", "yogurt", "yoghurt", "quark", "skyr",
    "whey", "mozzarella", "parmesan", "milch", "vollmilch", "käse", "sahne", "joghurt",
];

const GLUTEN_MARKERS: &[&str] = &[
    "wheat", "flour", "bread", "pasta", "noodle", "spaghetti", "barley", "rye", "couscous",
    "bulgur", "seitan", "weizen", "mehl", "brot", "vollkornbrot", "nudeln",
];

const MEAT_MARKERS: &[&str] = &[
    "chicken", "turkey", "beef", "veal", "lamb", "duck", "fish", "tuna", "salmon", "shrimp",
    "prawn", "sardine", "hähnchen", "hähnchenbrust", "huhn", "hühnchen", "pute", "rindfleisch",
    "rinderhack", "hackfleisch", "lachs", "fisch", "thunfisch", "garnele", "garnelen",
];

/// Exact tokens only: "ei" with a plural suffix would be "eis".
const EGG_HONEY_TOKENS: &[&str] = &["egg", "eggs", "ei", "eier", "honey", "honig"];

const PLANT_BASED_MARKERS: &[&str] = &[
    "oat", "soy", "almond", "coconut", "plant", "hafer", "soja", "mandel", "kokos", "pflanz",
];

const LACTOSE_FREE_MARKERS: &[&str] = &["lactose-free", "laktosefrei", "oat milk", "soy milk"];
const GLUTEN_FREE_MARKERS: &[&str] = &["gluten-free", "glutenfrei"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// A token equal to the marker or to its `-s`/`-es` plural.
fn is_form_of(token: &str, marker: &str) -> bool {
    token == marker
        || token
            .strip_prefix(marker)
            .is_some_and(|rest| rest == "s" || rest == "es")
}

/// Single-word markers match whole tokens ("ham" but not "graham");
/// multi-word markers match as substrings.
fn marker_matches(name_lower: &str, marker: &str) -> bool {
    if marker.chars().any(|c| !c.is_alphanumeric()) {
        return name_lower.contains(marker);
    }
    tokenize(name_lower).iter().any(|t| is_form_of(t, marker))
}

/// Whether any ingredient (not explicitly marked free of it) contains a marker.
fn ingredients_contain(recipe: &Recipe, markers: &[&str], exempt: &[&str]) -> bool {
    recipe.ingredient_names().any(|name| {
        let name = name.to_lowercase();
        markers.iter().any(|m| marker_matches(&name, m)) && !contains_any(&name, exempt)
    })
}

fn name_has(name_lower: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| marker_matches(name_lower, m))
}

/// Plant-based qualifiers only count at the start of a token ("hafermilch", not "goat").
fn plant_based(name_lower: &str) -> bool {
    tokenize(name_lower)
        .iter()
        .any(|t| PLANT_BASED_MARKERS.iter().any(|m| t.starts_with(m)))
}

/// Diet and allergen filter for a single food, used when building ideas from foods.
pub fn food_matches_preferences(food_name: &str, prefs: &Preferences) -> bool {
    let name = food_name.trim().to_lowercase();
    if name.is_empty() {
        return false;
    }
    let meat = name_has(&name, MEAT_MARKERS) || name_has(&name, PORK_MARKERS);
    if (prefs.vegan || prefs.vegetarian) && meat {
        return false;
    }
    if prefs.vegan {
        let tokens = tokenize(&name);
        if tokens.iter().any(|t| EGG_HONEY_TOKENS.contains(&t.as_str())) {
            return false;
        }
        if name_has(&name, DAIRY_MARKERS) && !plant_based(&name) {
            return false;
        }
    }
    if prefs.no_pork && name_has(&name, PORK_MARKERS) {
        return false;
    }
    if prefs.lactose_free
        && name_has(&name, DAIRY_MARKERS)
        && !contains_any(&name, LACTOSE_FREE_MARKERS)
        && !plant_based(&name)
    {
        return false;
    }
    if prefs.gluten_free
        && name_has(&name, GLUTEN_MARKERS)
        && !contains_any(&name, GLUTEN_FREE_MARKERS)
    {
        return false;
    }
    !prefs
        .allergens_avoid
        .iter()
        .map(|a| a.trim().to_lowercase())
        .any(|a| !a.is_empty() && name.contains(&a))
}

/// Diet, cuisine, budget and allergen filter.
///
/// Diet flags trust tags first; lactose/gluten fall back to ingredient
/// markers when the recipe carries no matching tag. Recipes without a budget
/// tag pass any budget preference.
pub fn matches_preferences(recipe: &Recipe, prefs: &Preferences) -> bool {
    if prefs.vegan && !recipe.has_tag("vegan") {
        return false;
    }
    if prefs.vegetarian
        && !(recipe.has_tag("vegetarian") || recipe.has_tag("vegan") || recipe.has_tag("veggie"))
    {
        return false;
    }
    if prefs.no_pork
        && (recipe.has_tag("pork") || ingredients_contain(recipe, PORK_MARKERS, &[]))
    {
        return false;
    }
    if prefs.lactose_free
        && !recipe.has_tag("lactose-free")
        && (recipe.has_tag("dairy")
            || ingredients_contain(recipe, DAIRY_MARKERS, LACTOSE_FREE_MARKERS))
    {
        return false;
    }
    if prefs.gluten_free
        && !recipe.has_tag("gluten-free")
        && ingredients_contain(recipe, GLUTEN_MARKERS, GLUTEN_FREE_MARKERS)
    {
        return false;
    }
    for allergen in prefs
        .allergens_avoid
        .iter()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty())
    {
        if ingredients_contain(recipe, &[allergen.as_str()], &[])
            || recipe.tags.iter().any(|t| t.to_lowercase().contains(&allergen))
        {
            return false;
        }
    }
    if let Some(cuisine) = prefs.cuisine_bias.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        if !recipe.has_tag(cuisine) {
            return false;
        }
    }
    if let Some(budget) = prefs.budget_level {
        let tagged = recipe
            .tags
            .iter()
            .any(|t| t.trim().to_lowercase().starts_with("budget-"));
        if tagged && !recipe.has_tag(budget.tag()) {
            return false;
        }
    }
    true
}

/// Every required ingredient appears as an ingredient name (case-insensitive, exact).
pub fn has_required_ingredients(recipe: &Recipe, required: &[String]) -> bool {
    required.iter().all(|req| {
        let req = req.trim().to_lowercase();
        recipe
            .ingredient_names()
            .any(|name| name.trim().to_lowercase() == req)
    })
}

/// Drop candidates whose known kcal exceeds the explicit bound. Unknown kcal passes.
pub fn filter_by_constraints<'a>(
    recipes: &'a [Recipe],
    constraints: &Constraints,
) -> Vec<&'a Recipe> {
    recipes
        .iter()
        .filter(|r| match (constraints.max_kcal, r.macros.kcal) {
            (Some(max), Some(kcal)) => kcal <= max,
            _ => true,
        })
        .collect()
}
