/// Turns a file stem into a valid Android resource name: lowercase ASCII
/// letters, digits and underscores, no runs of underscores, not starting
/// with a digit.
pub fn to_valid_drawable_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for ch in name.chars() {
        let ch = ch.to_ascii_lowercase();
        let ch = if ch.is_ascii_lowercase() || ch.is_ascii_digit() { ch } else { '_' };
        if ch == '_' && result.ends_with('_') {
            continue;
        }
        result.push(ch);
    }
    let trimmed = result.trim_matches('_');
    if trimmed.is_empty() {
        return "drawable".to_string();
    }
    if trimmed.starts_with(|ch: char| ch.is_ascii_digit()) {
        return format!("ic_{trimmed}");
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_names() {
        assert_eq!(to_valid_drawable_name("My Icon-24px"), "my_icon_24px");
        assert_eq!(to_valid_drawable_name("__a..b__"), "a_b");
        assert_eq!(to_valid_drawable_name("3d_rotation"), "ic_3d_rotation");
        assert_eq!(to_valid_drawable_name("24-Baseline-Home"), "ic_24_baseline_home");
        assert_eq!(to_valid_drawable_name("---"), "drawable");
        assert_eq!(to_valid_drawable_name("Ünïcode"), "n_code");
    }

    #[test]
    fn output_is_always_valid() {
        for input in ["", "A", "9", "a  b", "x_y_", "ÄÖÜ", "ok_name"] {
            let name = to_valid_drawable_name(input);
            assert!(!name.is_empty());
            assert!(!name.starts_with(|c: char| c.is_ascii_digit()));
            assert!(!name.contains("__"));
            assert!(!name.starts_with('_') && !name.ends_with('_'));
            assert!(
                name.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            );
        }
    }
}
