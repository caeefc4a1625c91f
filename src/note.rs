//! Note personalization.

/// Substitute the `{name}` / `{fullName}` placeholders with the resolved
/// first name, or the neutral placeholder when no name could be resolved.
/// Every occurrence is replaced; a template without placeholders passes
/// through unchanged.
pub fn personalize(template: &str, first_name: Option<&str>) -> String {
    let name = first_name.unwrap_or(crate::locate::NAME_PLACEHOLDER);
    template.replace("{name}", name).replace("{fullName}", name)
}

/// Best-effort first name: first whitespace token of the display name,
/// title-cased. `None` for empty input.
pub fn first_name(display_name: &str) -> Option<String> {
    let token = display_name.split_whitespace().next()?;
    let mut chars = token.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect())
}
