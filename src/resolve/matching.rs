//! Name matching with a fixed precedence. No fuzzy or edit-distance matching:
//! a stronger rule always beats a weaker one, and directory order only breaks
//! ties within the same rule.

use crate::core::models::{Person, Project};

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Exact (case-insensitive) match first, then a project whose name contains
/// the extracted name.
#[must_use]
pub fn match_project<'a>(extracted: &str, projects: &'a [Project]) -> Option<&'a Project> {
    let needle = normalize(extracted);
    if needle.is_empty() {
        return None;
    }
    projects
        .iter()
        .find(|p| normalize(&p.name) == needle)
        .or_else(|| projects.iter().find(|p| normalize(&p.name).contains(&needle)))
}

/// Exact match, then directory name containing the extracted name, then the
/// extracted name containing the directory name.
#[must_use]
pub fn match_person<'a>(extracted: &str, people: &'a [Person]) -> Option<&'a Person> {
    let needle = normalize(extracted);
    if needle.is_empty() {
        return None;
    }
    let names: Vec<String> = people.iter().map(|p| normalize(&p.name)).collect();

    let position = names
        .iter()
        .position(|n| *n == needle)
        .or_else(|| names.iter().position(|n| n.contains(&needle)))
        .or_else(|| {
            names
                .iter()
                .position(|n| !n.is_empty() && needle.contains(n.as_str()))
        })?;
    people.get(position)
}
