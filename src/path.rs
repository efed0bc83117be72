//! POSIX-style path helpers for document paths.
//!
//! Document paths are relative to the manager's root and never carry a
//! leading slash; the directory of a top-level entry is the empty string.

pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

pub fn dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(i) => trimmed[..i].trim_start_matches('/'),
        None => "",
    }
}

/// Join segments, dropping empty ones, `.` and leading slashes.
pub fn join(parts: &[&str]) -> String {
    let mut out: Vec<&str> = Vec::new();
    for part in parts {
        for seg in part.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    out.pop();
                }
                s => out.push(s),
            }
        }
    }
    out.join("/")
}
