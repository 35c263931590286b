//! Display-name slugs.
//!
//! A user's `name` is the kebab-case form of their display name and is what
//! login-by-display-name looks up, so two display names that differ only in
//! case or spacing collide.

/// Convert `input` to kebab-case.
///
/// Words are separated by any non-alphanumeric character, by a lower→upper
/// transition (`fooBar`), by the end of an upper-case run followed by a
/// capitalised word (`XMLHttp`) and by letter↔digit transitions (`user42`).
pub fn kebab_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            flush(&mut words, &mut current);
            continue;
        }
        if let Some(&prev) = i.checked_sub(1).and_then(|p| chars.get(p))
            && prev.is_alphanumeric()
        {
            let next = chars.get(i + 1).copied();
            let split = prev.is_numeric() != c.is_numeric()
                || (prev.is_lowercase() && c.is_uppercase())
                || (prev.is_uppercase()
                    && c.is_uppercase()
                    && next.is_some_and(char::is_lowercase));
            if split {
                flush(&mut words, &mut current);
            }
        }
        current.extend(c.to_lowercase());
    }
    flush(&mut words, &mut current);

    words.join("-")
}

fn flush(words: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}
