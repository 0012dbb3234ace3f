//! Human-readable labels for identifiers

/// Turn a `CamelCase` or `snake_case` identifier into a sentence-case label.
///
/// Runs of capitals stay together, so `ClientID` becomes "Client id".
pub fn humanize(identifier: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = identifier.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == ' ' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev_upper = chars[i - 1].is_uppercase();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if !prev_upper || next_lower {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    let sentence = words
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let mut chars = sentence.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize_camel_case() {
        assert_eq!(humanize("FirstName"), "First name");
        assert_eq!(humanize("TypeId"), "Type id");
        assert_eq!(humanize("AddClient"), "Add client");
        assert_eq!(humanize("OptionallyAddMultipleService"), "Optionally add multiple service");
    }

    #[test]
    fn test_humanize_snake_case_and_acronyms() {
        assert_eq!(humanize("date_of_birth"), "Date of birth");
        assert_eq!(humanize("ClientID"), "Client id");
        assert_eq!(humanize("HTMLReport"), "Html report");
    }

    #[test]
    fn test_humanize_empty() {
        assert_eq!(humanize(""), "");
        assert_eq!(humanize("_"), "");
    }
}
