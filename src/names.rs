/// Title-cases `s` when it is wholly upper-case and longer than `threshold` characters.
///
/// `"NEW YORK"` becomes `"New York"`. Mixed-case input, input of at most
/// `threshold` characters, or a `threshold` of 0 leaves `s` untouched.
pub fn title_case(s: &str, threshold: usize) -> String {
    if threshold == 0 || s.chars().count() <= threshold || !is_all_upper(s) {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if in_word {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        in_word = c.is_alphanumeric() || c == '_';
    }
    out
}

fn is_all_upper(s: &str) -> bool {
    s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_lowercase)
}

/// Reconciles a primary name with its ASCII form and alternates.
///
/// Afterwards `name` is non-empty whenever any candidate was, `ascii` is empty
/// when it would repeat `name`, and `alternates` holds neither of them.
pub fn reconcile_names(name: &mut String, ascii: &mut String, alternates: &mut Vec<String>) {
    if name.is_empty() {
        std::mem::swap(name, ascii);
    }
    if name == ascii {
        ascii.clear();
    }
    if name.is_empty() {
        if let Some(first) = alternates.iter().find(|a| !a.is_empty()) {
            *name = first.clone();
        }
    }
    alternates.retain(|a| !a.is_empty() && a != name && a != ascii);
}

/// Splits a comma-separated list field, dropping empty entries.
pub fn split_list(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
