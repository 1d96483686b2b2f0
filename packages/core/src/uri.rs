//! URI helpers: root normalisation, href resolution, and display names.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

/// Errors from normalising or resolving a URI.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UriError {
    #[error("unsupported scheme {scheme:?} in {uri:?}; expected http or https")]
    BadScheme { uri: String, scheme: String },

    #[error("too many schemes in {0:?}")]
    TooManySchemes(String),

    #[error("invalid URI {uri:?}: {reason}")]
    Invalid { uri: String, reason: String },
}

/// Normalise an API root: prepend `http://` when no scheme is given, reject
/// anything but `http`/`https`, and return the parsed, serialised form.
pub fn fix_scheme(uri: &str) -> Result<String, UriError> {
    let with_scheme = match uri.split("://").collect::<Vec<_>>().as_slice() {
        [_] => format!("http://{uri}"),
        [scheme, _] if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") => {
            uri.to_string()
        }
        [scheme, _] => {
            return Err(UriError::BadScheme {
                uri: uri.to_string(),
                scheme: scheme.to_string(),
            })
        }
        _ => return Err(UriError::TooManySchemes(uri.to_string())),
    };
    parse(&with_scheme).map(String::from)
}

fn parse(uri: &str) -> Result<Url, UriError> {
    Url::parse(uri).map_err(|e| UriError::Invalid {
        uri: uri.to_string(),
        reason: e.to_string(),
    })
}

/// Resolve `href` against `base`. Without a base, `href` must be absolute.
pub fn resolve(base: Option<&str>, href: &str) -> Result<String, UriError> {
    let resolved = match base {
        Some(base) => parse(base)?.join(href).map_err(|e| UriError::Invalid {
            uri: href.to_string(),
            reason: e.to_string(),
        })?,
        None => parse(href)?,
    };
    Ok(resolved.into())
}

/// Resolve a URI template against `base`.
///
/// Only the literal text before the first expression is resolved, so the
/// braces survive. Templates that start with an expression, or whose literal
/// head cannot be resolved, are returned unchanged.
pub fn resolve_template(base: Option<&str>, href: &str) -> String {
    let Some(open) = href.find('{') else {
        return resolve(base, href).unwrap_or_else(|_| href.to_string());
    };
    let (head, rest) = href.split_at(open);
    if head.is_empty() {
        return href.to_string();
    }
    match resolve(base, head) {
        Ok(resolved) => format!("{resolved}{rest}"),
        Err(_) => href.to_string(),
    }
}

/// `uri` relative to the API root: the first occurrence of the root is
/// replaced by `/`.
pub fn relative_to(root: &str, uri: &str) -> String {
    uri.replacen(root, "/", 1)
}

/// Render a root-relative path for display: numeric segments as `[n]`, other
/// segments as `.segment`.
pub fn display_path(relative: &str) -> String {
    let decoded = urlencoding::decode(relative)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| relative.to_string());
    decoded
        .split('/')
        .map(|chunk| {
            if chunk.is_empty() {
                String::new()
            } else if chunk.bytes().all(|b| b.is_ascii_digit()) {
                format!("[{chunk}]")
            } else {
                format!(".{chunk}")
            }
        })
        .collect()
}

const GENERIC_DOMAINS: &[&str] = &["herokuapp", "appspot"];

/// `v1`, `v2.1`, …
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v[\d.]+").expect("invalid version regex"));

/// Derive a short, readable API name from a root URI.
///
/// Generic hosting domains are dropped, `api` pieces become a trailing
/// `API`, and version pieces a trailing `.vN`: `http://www.example.com` →
/// `Example`, `https://api.github.com` → `GithubAPI`,
/// `http://haltalk.herokuapp.com/v2/` → `Haltalk.v2`.
pub fn namify(root: &str) -> String {
    let decoded = urlencoding::decode(root)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| root.to_string());
    let Ok(url) = fix_scheme(&decoded).and_then(|u| parse(&u)) else {
        return root.to_string();
    };

    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let (domain, tld) = host.rsplit_once('.').unwrap_or((host.as_str(), ""));
    let (subdomain, domain) = domain.rsplit_once('.').unwrap_or(("", domain));

    let mut pieces: Vec<String> = Vec::new();
    if subdomain != "www" {
        pieces.extend(subdomain.split('.').map(str::to_string));
    }
    if !GENERIC_DOMAINS.contains(&domain) {
        pieces.push(domain.to_string());
    }
    if tld.len() == 2 {
        pieces.push(tld.to_ascii_uppercase());
    } else if tld != "com" && !tld.is_empty() {
        pieces.push(tld.to_string());
    }
    pieces.extend(
        url.path()
            .to_ascii_lowercase()
            .split('/')
            .filter(|p| !p.is_empty())
            .map(str::to_string),
    );
    if let Some(query) = url.query() {
        pieces.extend(
            query
                .split(',')
                .filter(|q| !q.is_empty())
                .flat_map(|q| q.split('='))
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        );
    }

    let mut api = false;
    let mut version = String::new();
    let mut name = String::new();
    for piece in pieces {
        let piece = if piece.eq_ignore_ascii_case("api") {
            api = true;
            String::new()
        } else if VERSION_RE.is_match(&piece) {
            version.push('.');
            version.push_str(&piece);
            String::new()
        } else {
            piece.replace("api", "API")
        };
        name.push_str(&capitalize(&piece));
    }
    if api {
        name.push_str("API");
    }
    name.push_str(&version);
    name
}

/// Upper-case the first character, leaving the rest alone.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
