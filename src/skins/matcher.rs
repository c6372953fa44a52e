//! Best-effort matching of an installed skin to a catalog entry.

use super::types::Skin;

/// Find the catalog entry for an installed skin's folder name.
///
/// Installed skins carry nothing but a directory name, so this is a
/// heuristic, not a correctness guarantee. Candidates are tried in
/// decreasing confidence order:
///
/// 1. exact id
/// 2. exact name (case-insensitive)
/// 3. substring in either direction
/// 4. normalized slug
///
/// Within a tier, the first candidate in catalog order wins.
pub fn find_catalog_match<'a>(installed: &str, catalog: &'a [Skin]) -> Option<&'a Skin> {
  let needle = installed.trim();
  if needle.is_empty() {
    return None;
  }
  let needle_lower = needle.to_lowercase();

  if let Some(skin) = catalog.iter().find(|s| s.id == needle) {
    return Some(skin);
  }

  if let Some(skin) = catalog
    .iter()
    .find(|s| s.name.eq_ignore_ascii_case(needle))
  {
    return Some(skin);
  }

  if let Some(skin) = catalog.iter().find(|s| {
    let name_lower = s.name.to_lowercase();
    name_lower.contains(&needle_lower) || needle_lower.contains(&name_lower)
  }) {
    return Some(skin);
  }

  let needle_slug = slugify(needle);
  catalog.iter().find(|s| slugify(&s.name) == needle_slug)
}

/// Lowercase, alphanumeric runs joined by single dashes.
pub fn slugify(input: &str) -> String {
  let mut slug = String::with_capacity(input.len());
  let mut pending_dash = false;

  for c in input.chars() {
    if c.is_alphanumeric() {
      if pending_dash && !slug.is_empty() {
        slug.push('-');
      }
      pending_dash = false;
      slug.extend(c.to_lowercase());
    } else {
      pending_dash = true;
    }
  }

  slug
}

#[cfg(test)]
mod tests {
  use super::*;

  fn skin(id: &str, name: &str) -> Skin {
    Skin {
      id: id.to_string(),
      name: name.to_string(),
      author: "author".to_string(),
      version: "1.0".to_string(),
      category: "clock".to_string(),
      description: String::new(),
      download_url: String::new(),
      preview_url: String::new(),
    }
  }

  #[test]
  fn test_slugify() {
    assert_eq!(slugify("Mond Clock v2"), "mond-clock-v2");
    assert_eq!(slugify("  --Weather__Widget--  "), "weather-widget");
    assert_eq!(slugify("ALREADY-a-slug"), "already-a-slug");
  }

  #[test]
  fn test_exact_id_wins() {
    let catalog = vec![skin("mond", "Mond"), skin("other", "mond")];
    let hit = find_catalog_match("mond", &catalog).unwrap();
    assert_eq!(hit.id, "mond");
  }

  #[test]
  fn test_exact_name_case_insensitive() {
    let catalog = vec![skin("a", "Cleartext"), skin("b", "Other")];
    let hit = find_catalog_match("CLEARTEXT", &catalog).unwrap();
    assert_eq!(hit.id, "a");
  }

  #[test]
  fn test_substring_both_directions() {
    let catalog = vec![skin("a", "Mond"), skin("b", "Enigma Suite")];

    // installed name contains the catalog name
    assert_eq!(find_catalog_match("Mond 2.1", &catalog).unwrap().id, "a");
    // catalog name contains the installed name
    assert_eq!(find_catalog_match("Enigma", &catalog).unwrap().id, "b");
  }

  #[test]
  fn test_slug_tier() {
    let catalog = vec![skin("a", "Simple Clean Clock")];
    let hit = find_catalog_match("simple_clean_clock", &catalog);
    assert_eq!(hit.unwrap().id, "a");
  }

  #[test]
  fn test_tier_order_beats_catalog_order() {
    // a substring candidate earlier in the catalog must lose to an exact
    // name match later in it
    let catalog = vec![skin("sub", "Clock Suite Extended"), skin("exact", "Clock")];
    let hit = find_catalog_match("clock", &catalog).unwrap();
    assert_eq!(hit.id, "exact");
  }

  #[test]
  fn test_same_tier_first_in_catalog_order_wins() {
    let catalog = vec![skin("a", "Rainy Day"), skin("b", "rainy day")];
    let hit = find_catalog_match("Rainy Day", &catalog).unwrap();
    assert_eq!(hit.id, "a");
  }

  #[test]
  fn test_no_match() {
    let catalog = vec![skin("a", "Mond")];
    assert!(find_catalog_match("totally different", &catalog).is_none());
    assert!(find_catalog_match("   ", &catalog).is_none());
  }
}
