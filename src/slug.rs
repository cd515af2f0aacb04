use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Post,
    Category,
}

impl EntityKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Post => "post",
            EntityKind::Category => "category",
        }
    }
}

// Keep letters, digits and whitespace, join words with '-'
pub fn normalize(text: &str) -> String {
    let kept: String = text
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_numeric() || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

// One existence check; a taken slug gets `-{now_ms}` without re-checking
pub fn allocate<E, F>(source: &str, kind: EntityKind, now_ms: i64, mut exists: F) -> Result<String, E>
where
    F: FnMut(&str) -> Result<bool, E>,
{
    let mut base = normalize(source);
    if base.is_empty() {
        base = format!("{}-{}", kind.prefix(), now_ms);
    }

    if exists(&base)? {
        crate::metrics::SLUG_COLLISIONS
            .with_label_values(&[kind.prefix()])
            .inc();
        tracing::debug!(slug = %base, kind = kind.prefix(), "Slug taken, appending timestamp");
        return Ok(format!("{}-{}", base, now_ms));
    }

    Ok(base)
}

// The entity's own slug never counts as taken
pub fn reallocate<E, F>(
    new_source: &str,
    stored_source: &str,
    current_slug: &str,
    kind: EntityKind,
    now_ms: i64,
    mut exists: F,
) -> Result<String, E>
where
    F: FnMut(&str) -> Result<bool, E>,
{
    if new_source == stored_source {
        return Ok(current_slug.to_string());
    }

    allocate(new_source, kind, now_ms, |candidate| {
        if candidate == current_slug {
            Ok(false)
        } else {
            exists(candidate)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    const NOW: i64 = 1_700_000_000_123;

    fn never(_: &str) -> Result<bool, Infallible> {
        Ok(false)
    }

    #[test]
    fn normalize_keeps_letters_of_any_script() {
        assert_eq!(normalize("你好, World! 123"), "你好-world-123");
        assert_eq!(normalize("Привет мир"), "привет-мир");
        assert_eq!(normalize("Café au lait"), "café-au-lait");
    }

    #[test]
    fn normalize_collapses_and_trims_separators() {
        assert_eq!(normalize("  Hello \t\n  World  "), "hello-world");
        assert_eq!(normalize("- leading and trailing -"), "leading-and-trailing");
        assert_eq!(normalize("rust_lang & c++"), "rustlang-c");
    }

    #[test]
    fn normalize_can_be_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("!!! ??? ---"), "");
    }

    #[test]
    fn allocate_returns_base_when_free() {
        let slug = allocate("你好, World! 123", EntityKind::Post, NOW, never).unwrap();
        assert_eq!(slug, "你好-world-123");
    }

    #[test]
    fn allocate_falls_back_to_kind_and_time() {
        assert_eq!(
            allocate("", EntityKind::Post, NOW, never).unwrap(),
            format!("post-{NOW}")
        );
        assert_eq!(
            allocate("***", EntityKind::Category, NOW, never).unwrap(),
            format!("category-{NOW}")
        );
    }

    #[test]
    fn allocate_suffixes_on_collision_with_single_check() {
        let mut answers = vec![true, false].into_iter();
        let mut calls = Vec::new();
        let slug = allocate("Title", EntityKind::Post, NOW, |candidate| {
            calls.push(candidate.to_string());
            Ok::<_, Infallible>(answers.next().unwrap_or(false))
        })
        .unwrap();

        assert_eq!(slug, format!("title-{NOW}"));
        assert_eq!(calls, vec!["title".to_string()]);
    }

    #[test]
    fn allocate_is_deterministic() {
        let a = allocate("Same Title", EntityKind::Post, NOW, |_| Ok::<_, Infallible>(true)).unwrap();
        let b = allocate("Same Title", EntityKind::Post, NOW, |_| Ok::<_, Infallible>(true)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn allocate_propagates_lookup_errors() {
        let err = allocate("Title", EntityKind::Post, NOW, |_| Err::<bool, _>("store down")).unwrap_err();
        assert_eq!(err, "store down");
    }

    #[test]
    fn reallocate_keeps_slug_when_source_unchanged() {
        let slug = reallocate("Title", "Title", "title", EntityKind::Post, NOW, |_| -> Result<bool, Infallible> {
            panic!("existence check must not run")
        })
        .unwrap();
        assert_eq!(slug, "title");
    }

    #[test]
    fn reallocate_ignores_own_slug() {
        // "Title!" normalizes back to the entity's own slug
        let slug = reallocate("Title!", "Title", "title", EntityKind::Post, NOW, |_| {
            Ok::<_, Infallible>(true)
        })
        .unwrap();
        assert_eq!(slug, "title");
    }

    #[test]
    fn reallocate_checks_other_slugs() {
        let slug = reallocate("Other", "Title", "title", EntityKind::Post, NOW, |candidate| {
            Ok::<_, Infallible>(candidate == "other")
        })
        .unwrap();
        assert_eq!(slug, format!("other-{NOW}"));
    }
}
