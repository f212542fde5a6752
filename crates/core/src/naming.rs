//! Naming helpers
//!
//! Case conversion and singular/plural forms for table, column and
//! operation names. Case conversion is delegated to `heck`, inflection to
//! `pluralizer`.

use heck::{ToLowerCamelCase, ToPascalCase, ToSnakeCase};

/// Convert a name to `snake_case` (e.g. "BlogPost" → "blog_post").
pub fn snake(name: &str) -> String {
    name.to_snake_case()
}

/// Convert a name to `PascalCase` (e.g. "blog_post" → "BlogPost").
pub fn pascal(name: &str) -> String {
    name.to_pascal_case()
}

/// Convert a name to `camelCase` (e.g. "blog_post" → "blogPost").
pub fn camel(name: &str) -> String {
    name.to_lower_camel_case()
}

/// Singular form of a (usually plural) table name.
///
/// Only the last `_`-separated word is inflected, so `blog_posts` becomes
/// `blog_post` and `user_settings` becomes `user_setting`.
pub fn singularize(word: &str) -> String {
    inflect_last_word(word, 1)
}

/// Plural form of a singular name.
pub fn pluralize(word: &str) -> String {
    inflect_last_word(word, 2)
}

fn inflect_last_word(word: &str, count: isize) -> String {
    if word.is_empty() {
        return String::new();
    }
    match word.rsplit_once('_') {
        Some((head, last)) if !last.is_empty() => {
            format!("{}_{}", head, pluralizer::pluralize(last, count, false))
        }
        _ => pluralizer::pluralize(word, count, false),
    }
}

/// Pascal-case singular of a table name (e.g. "blog_posts" → "BlogPost").
pub fn pascal_singular(table: &str) -> String {
    pascal(&singularize(table))
}

// ============================================================================
// Tests
// ============================================================================
