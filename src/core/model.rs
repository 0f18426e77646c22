/// Known model families, matched case-insensitively against the raw identifier.
const FAMILIES: &[(&str, &str)] = &[("opus", "Opus"), ("sonnet", "Sonnet"), ("haiku", "Haiku")];

fn is_version_part(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= 4
        && token.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Short display label for a model identifier.
///
/// `claude-opus-4-5-20250929` becomes `Opus 4.5`, `claude-3-5-sonnet-20241022`
/// becomes `Sonnet 3.5`. Identifiers from unknown families are returned as-is.
pub fn short_label(model_id: &str) -> String {
    let lower = model_id.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| matches!(c, '-' | '_' | ' ' | '@'))
        .collect();

    for (needle, display) in FAMILIES {
        let Some(pos) = tokens.iter().position(|t| t.contains(needle)) else {
            continue;
        };

        // Newer ids put the version after the family, older ones before it.
        let mut version: Vec<&str> = tokens[pos + 1..]
            .iter()
            .copied()
            .take_while(|t| is_version_part(t))
            .collect();
        if version.is_empty() {
            version = tokens[..pos]
                .iter()
                .rev()
                .copied()
                .take_while(|t| is_version_part(t))
                .collect();
            version.reverse();
        }

        return if version.is_empty() {
            display.to_string()
        } else {
            format!("{} {}", display, version.join("."))
        };
    }

    model_id.to_string()
}
