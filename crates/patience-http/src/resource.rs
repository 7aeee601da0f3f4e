//! Resource identification from an invocation's argv.

use std::sync::OnceLock;

use regex::Regex;

/// The programs whose argv is parsed as an HTTP client invocation.
const HTTP_CLIENT_PROGRAMS: &[&str] = &["curl", "wget", "http", "https"];

struct NormalizeRule {
    pattern: &'static str,
    replacement: &'static str,
}

/// Path-normalization rules for common API families, applied in
/// order; the first match wins.
const NORMALIZE_RULES: &[NormalizeRule] = &[
    NormalizeRule {
        pattern: r"^/repos/[^/]+/[^/]+",
        replacement: "/repos/*",
    },
    NormalizeRule {
        pattern: r"^/v2/.+/manifests/[^/]+$",
        replacement: "/v2/*/manifests/*",
    },
    NormalizeRule {
        pattern: r"^/v2/.+/blobs/[^/]+$",
        replacement: "/v2/*/blobs/*",
    },
    NormalizeRule {
        pattern: r"^/api/v1/[^/]+",
        replacement: "/api/v1/*",
    },
    NormalizeRule {
        pattern: r"^/v1/[^/]+",
        replacement: "/v1/*",
    },
    NormalizeRule {
        pattern: r"^/\d{4}-\d{2}-\d{2}/[^/]+",
        replacement: "/<version>/*",
    },
];

fn compiled_rules() -> &'static Vec<(Regex, &'static str)> {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        NORMALIZE_RULES
            .iter()
            .map(|r| (Regex::new(r.pattern).expect("static normalize pattern"), r.replacement))
            .collect()
    })
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s'\x22]+").expect("static url pattern"))
}

/// Extracts `(host, path)` from the first URL-shaped argument, if any.
fn extract_host_path(argv: &[String]) -> Option<(String, String)> {
    let url_str = argv.iter().find_map(|arg| url_regex().find(arg).map(|m| m.as_str().to_string()))?;
    let without_scheme = url_str.splitn(2, "://").nth(1)?;
    let (host, rest) = match without_scheme.split_once('/') {
        Some((h, r)) => (h, format!("/{r}")),
        None => (without_scheme, "/".to_string()),
    };
    let path = rest.split(['?', '#']).next().unwrap_or("/").to_string();
    Some((host.to_string(), path))
}

fn normalize_path(path: &str) -> String {
    for (re, replacement) in compiled_rules() {
        if re.is_match(path) {
            return (*replacement).to_string();
        }
    }
    path.to_string()
}

/// Identifies the `resource_id` for an invocation: `host+normalized-path`
/// for HTTP client invocations, `cmd-<program>` otherwise.
pub fn identify_resource(argv: &[String]) -> String {
    let Some(program) = argv.first() else {
        return "cmd-unknown".to_string();
    };
    let program_name = program.rsplit('/').next().unwrap_or(program.as_str());

    if HTTP_CLIENT_PROGRAMS.contains(&program_name) {
        if let Some((host, path)) = extract_host_path(argv) {
            return format!("{host}{}", normalize_path(&path));
        }
    }
    format!("cmd-{program_name}")
}
