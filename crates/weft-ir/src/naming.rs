//! Identifier casing shared by the front-end and every emitter.

/// Splits an identifier into words at `_`, `-`, `.`, spaces and lower-to-upper case changes.
fn words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in input.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `fooBar` / `foo_bar` / `foo-bar` to `FooBar`. Inner capitals are kept.
pub fn pascal_case(input: &str) -> String {
    words(input).iter().map(|w| capitalize(w)).collect()
}

/// Replaces anything that cannot appear in a C or Zig identifier with `_`.
pub fn identifier(input: &str) -> String {
    let mut out: String = input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

const CPP_KEYWORDS: &[&str] = &[
    "alignas", "alignof", "and", "and_eq", "asm", "auto", "bitand", "bitor", "bool", "break", "case",
    "catch", "char", "char8_t", "char16_t", "char32_t", "class", "compl", "concept", "const",
    "consteval", "constexpr", "constinit", "const_cast", "continue", "co_await", "co_return",
    "co_yield", "decltype", "default", "delete", "do", "double", "dynamic_cast", "else", "enum",
    "explicit", "export", "extern", "false", "float", "for", "friend", "goto", "if", "inline", "int",
    "long", "mutable", "namespace", "new", "noexcept", "not", "not_eq", "nullptr", "operator", "or",
    "or_eq", "private", "protected", "public", "register", "reinterpret_cast", "requires", "restrict",
    "return", "short", "signed", "sizeof", "static", "static_assert", "static_cast", "struct",
    "switch", "template", "this", "thread_local", "throw", "true", "try", "typedef", "typeid",
    "typename", "union", "unsigned", "using", "virtual", "void", "volatile", "wchar_t", "while",
    "xor", "xor_eq",
];

/// `identifier`, with C and C++ keywords suffixed by `_`.
pub fn cpp_identifier(input: &str) -> String {
    let mut out = identifier(input);
    if CPP_KEYWORDS.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_from_mixed_inputs() {
        assert_eq!(pascal_case("node_fs"), "NodeFs");
        assert_eq!(pascal_case("readFile"), "ReadFile");
        assert_eq!(pascal_case("crypto-hash"), "CryptoHash");
        assert_eq!(pascal_case("Already"), "Already");
        assert_eq!(pascal_case("utf8Decode"), "Utf8Decode");
    }

    #[test]
    fn identifiers_are_sanitized() {
        assert_eq!(identifier("a.b-c"), "a_b_c");
        assert_eq!(identifier("1st"), "_1st");
        assert_eq!(identifier(""), "_");
    }

    #[test]
    fn cpp_identifiers_avoid_keywords() {
        assert_eq!(cpp_identifier("default"), "default_");
        assert_eq!(cpp_identifier("content-type"), "content_type");
        assert_eq!(cpp_identifier("width"), "width");
    }
}
