use uuid::Uuid;

/// `MyApp Title` → `my-app -title`, or `my-app-title` with `remove_spaces`.
///
/// A dash goes before every uppercase letter except the first character.
pub fn camel_case_to_kebab_case(text: &str, remove_spaces: bool) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    for (i, ch) in text.chars().enumerate() {
        if i > 0 && ch.is_ascii_uppercase() {
            out.push('-');
        }
        out.extend(ch.to_lowercase());
    }
    if remove_spaces {
        out.retain(|c| c != ' ');
    }
    out
}

/// Random lowercase hex string of `len` characters (at most 32).
pub fn generate_hash(len: usize) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..len.min(hex.len())].to_string()
}

/// Routes used by the front-end router must start with `/`.
pub fn with_leading_slash(route: &str) -> String {
    if route.starts_with('/') {
        route.to_string()
    } else {
        format!("/{}", route)
    }
}

/// Whether `name` is usable as a directory name and a bundler argument:
/// ASCII letters, digits, `_` and `-`, not starting with `-`.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_case_conversion() {
        assert_eq!(camel_case_to_kebab_case("My App", true), "my-app");
        assert_eq!(camel_case_to_kebab_case("My App", false), "my -app");
        assert_eq!(camel_case_to_kebab_case("salesDashboard", true), "sales-dashboard");
        assert_eq!(camel_case_to_kebab_case("", true), "");
    }

    #[test]
    fn hash_has_requested_length() {
        assert_eq!(generate_hash(8).len(), 8);
        assert_eq!(generate_hash(4).len(), 4);
        assert!(generate_hash(8).chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn routes_get_a_leading_slash() {
        assert_eq!(with_leading_slash("home"), "/home");
        assert_eq!(with_leading_slash("/home"), "/home");
    }

    #[test]
    fn safe_names_stay_inside_one_directory() {
        assert!(is_safe_name("app-1a2b3c4d"));
        assert!(is_safe_name("sales_portal"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name("../../escape"));
        assert!(!is_safe_name("a/b"));
        assert!(!is_safe_name(".."));
        assert!(!is_safe_name("--components"));
        assert!(!is_safe_name("app 1"));
    }
}
