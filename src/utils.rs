use std::path::Path;
use std::sync::OnceLock;

/// Locations outside a typical user PATH where inspection tools live
/// (`lsof` is often only in /usr/sbin on Linux).
const SEARCH_PATHS: &[&str] = &[
    "/usr/sbin",
    "/usr/bin",
    "/sbin",
    "/opt/homebrew/bin", // Apple Silicon
    "/usr/local/bin",    // Intel Mac
];

/// Find an executable in common locations, falling back to PATH.
/// Results are cached per command.
pub fn find_command(name: &'static str) -> &'static str {
    match name {
        "lsof" => {
            static LSOF: OnceLock<&'static str> = OnceLock::new();
            LSOF.get_or_init(|| find_in_paths(name, SEARCH_PATHS))
        }
        "ps" => {
            static PS: OnceLock<&'static str> = OnceLock::new();
            PS.get_or_init(|| find_in_paths(name, SEARCH_PATHS))
        }
        "docker" => {
            static DOCKER: OnceLock<&'static str> = OnceLock::new();
            DOCKER.get_or_init(|| find_in_paths(name, SEARCH_PATHS))
        }
        _ => name,
    }
}

fn find_in_paths(name: &'static str, prefix_paths: &[&str]) -> &'static str {
    for prefix in prefix_paths {
        let full_path = Path::new(prefix).join(name);
        if full_path.is_file() {
            // Leaked once per cached command
            return Box::leak(full_path.to_string_lossy().into_owned().into_boxed_str());
        }
    }
    name
}

/// Shorten `text` to `max` characters, marking the cut with "...".
pub fn truncate_label(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("...");
    cut
}

pub fn join_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
