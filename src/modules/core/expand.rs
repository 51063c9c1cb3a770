//! Environment variable and home directory expansion for argv elements

use std::collections::HashMap;

/// Expand `$VAR`, `${VAR}` and a leading `~` against `env`.
///
/// Unknown variables are left as written, as is `~user`.
pub fn expand_argument(arg: &str, env: &HashMap<String, String>) -> String {
    let arg = expand_home(arg, env);
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg.as_str();

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) if is_var_name(&braced[..end]) => (&braced[..end], end + 2),
                _ => ("", 0),
            },
            None => {
                let len = var_name_len(after);
                (&after[..len], len)
            }
        };

        match env.get(name).filter(|_| !name.is_empty()) {
            Some(value) => {
                out.push_str(value);
                rest = &after[consumed..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn var_name_len(s: &str) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let valid = c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit());
        if !valid {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}

fn is_var_name(s: &str) -> bool {
    !s.is_empty() && var_name_len(s) == s.len()
}

fn expand_home(arg: &str, env: &HashMap<String, String>) -> String {
    let Some(rest) = arg.strip_prefix('~') else {
        return arg.to_string();
    };
    if !(rest.is_empty() || rest.starts_with('/')) {
        return arg.to_string();
    }
    match env.get("HOME") {
        Some(home) => format!("{home}{rest}"),
        None => arg.to_string(),
    }
}

pub fn expand_argv(argv: &[String], env: &HashMap<String, String>) -> Vec<String> {
    argv.iter().map(|arg| expand_argument(arg, env)).collect()
}
