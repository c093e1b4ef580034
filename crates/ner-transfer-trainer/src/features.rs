//! Sparse lexical features for a token in context.

/// Feature present on every token.
pub const BIAS: &str = "bias";

/// Collapse a word into its character-class shape, e.g. `"Novo2"` → `"Xxd"`.
pub fn word_shape(word: &str) -> String {
    let mut shape = String::new();
    let mut last = None;
    for c in word.chars() {
        let class = if c.is_uppercase() {
            'X'
        } else if c.is_lowercase() {
            'x'
        } else if c.is_numeric() {
            'd'
        } else {
            c
        };
        if last != Some(class) {
            shape.push(class);
            last = Some(class);
        }
    }
    shape
}

fn affix(word: &str, n: usize, suffix: bool) -> String {
    let chars: Vec<char> = word.chars().collect();
    if suffix {
        chars[chars.len().saturating_sub(n)..].iter().collect()
    } else {
        chars[..n.min(chars.len())].iter().collect()
    }
}

/// Features of `tokens[i]`. The first entry is always [`BIAS`].
pub fn token_features(tokens: &[String], i: usize) -> Vec<String> {
    let token = &tokens[i];
    let lower = token.to_lowercase();

    let mut features = vec![
        BIAS.to_string(),
        format!("w={lower}"),
        format!("p3={}", affix(&lower, 3, false)),
        format!("s3={}", affix(&lower, 3, true)),
        format!("shape={}", word_shape(token)),
    ];

    let mut chars = token.chars();
    if chars.next().is_some_and(char::is_uppercase) {
        features.push("title".to_string());
        if chars.all(|c| !c.is_alphabetic() || c.is_uppercase()) {
            features.push("upper".to_string());
        }
    }
    if token.chars().any(|c| c.is_ascii_digit()) {
        features.push("digit".to_string());
    }
    if i == 0 {
        features.push("first".to_string());
    }

    match i.checked_sub(1).map(|p| &tokens[p]) {
        Some(prev) => features.push(format!("-1:w={}", prev.to_lowercase())),
        None => features.push("-1:<s>".to_string()),
    }
    match tokens.get(i + 1) {
        Some(next) => features.push(format!("+1:w={}", next.to_lowercase())),
        None => features.push("+1:</s>".to_string()),
    }

    features
}
