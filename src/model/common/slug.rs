/// Derive a URL slug from a display name: lowercase alphanumerics with
/// single dashes in place of runs of anything else.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut dash_pending = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if dash_pending && !slug.is_empty() {
                slug.push('-');
            }
            dash_pending = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            dash_pending = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_dashes() {
        assert_eq!(slugify("Smith & Sons Motors"), "smith-sons-motors");
    }

    #[test]
    fn collapses_runs_and_trims_edges() {
        assert_eq!(slugify("  --Weird   name!!  "), "weird-name");
        assert_eq!(slugify("already-good"), "already-good");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(slugify("!!!"), "");
    }
}
