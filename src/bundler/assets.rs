//! Reference scanning for entry documents and stylesheets
//!
//! HTML goes through `lol_html`: local URLs are collected, and root-relative
//! ones are moved under the public URL. Stylesheets are scanned for `url()`
//! and `@import` targets so fonts and images they pull in are bundled too.

use std::cell::RefCell;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use lol_html::html_content::Element;
use lol_html::{element, rewrite_str, RewriteStrSettings};
use percent_encoding::percent_decode_str;

/// An entry after rewriting, with the local references it contains
#[derive(Debug, Default)]
pub struct ProcessedHtml {
    pub html: String,
    pub references: Vec<String>,
}

/// Collect local references from `html` and prefix root-relative URLs with
/// `public_base` (which always ends in `/`).
pub fn process_html(html: &str, public_base: &str) -> Result<ProcessedHtml, String> {
    let references = Rc::new(RefCell::new(Vec::new()));

    let srcset_refs = Rc::clone(&references);
    let html = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("[href]", local_attribute("href", public_base, &references)),
                element!("[src]", local_attribute("src", public_base, &references)),
                element!("[poster]", local_attribute("poster", public_base, &references)),
                element!("[srcset]", move |el| {
                    if let Some(value) = el.get_attribute("srcset") {
                        let mut rewritten = Vec::new();
                        for candidate in value.split(',').map(str::trim).filter(|c| !c.is_empty()) {
                            let (url, descriptor) = candidate
                                .split_once(char::is_whitespace)
                                .map_or((candidate, ""), |(u, d)| (u, d.trim()));
                            let url = if is_local(url) {
                                srcset_refs.borrow_mut().push(url.to_string());
                                under_public_url(url, public_base).unwrap_or_else(|| url.to_string())
                            } else {
                                url.to_string()
                            };
                            if descriptor.is_empty() {
                                rewritten.push(url);
                            } else {
                                rewritten.push(format!("{url} {descriptor}"));
                            }
                        }
                        el.set_attribute("srcset", &rewritten.join(", "))?;
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| e.to_string())?;

    let references = references.take();
    Ok(ProcessedHtml { html, references })
}

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Handler for a single-URL attribute: record it when local and move it under
/// the public URL when root-relative
fn local_attribute<'h>(
    attr: &'static str,
    public_base: &'h str,
    references: &Rc<RefCell<Vec<String>>>,
) -> impl FnMut(&mut Element<'_, '_>) -> HandlerResult + 'h {
    let references = Rc::clone(references);
    move |el| {
        if let Some(value) = el.get_attribute(attr) {
            if is_local(&value) {
                if let Some(moved) = under_public_url(&value, public_base) {
                    el.set_attribute(attr, &moved)?;
                }
                references.borrow_mut().push(value);
            }
        }
        Ok(())
    }
}

/// `url(...)` and `@import "..."` targets in a stylesheet that are local
pub fn css_references(css: &str) -> Vec<String> {
    let mut found = Vec::new();

    let mut rest = css;
    while let Some(start) = rest.find("url(") {
        rest = &rest[start + 4..];
        let Some(end) = rest.find(')') else { break };
        let target = rest[..end].trim().trim_matches(|c| c == '"' || c == '\'');
        if is_local(target) {
            found.push(target.to_string());
        }
        rest = &rest[end..];
    }

    for line in css.split(';') {
        if let Some(import) = line.trim().strip_prefix("@import") {
            let import = import.trim();
            if let Some(quoted) = import
                .strip_prefix('"')
                .and_then(|s| s.split('"').next())
                .or_else(|| import.strip_prefix('\'').and_then(|s| s.split('\'').next()))
            {
                if is_local(quoted) {
                    found.push(quoted.to_string());
                }
            }
        }
    }

    found
}

/// Resolve a reference found in `from` (relative to the source root) to a
/// normalized source-relative path. `None` if it climbs out of the root.
pub fn resolve_reference(from: &Path, reference: &str) -> Option<PathBuf> {
    let path = reference.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path).decode_utf8().ok()?;

    let base = if decoded.starts_with('/') {
        PathBuf::new()
    } else {
        from.parent().map(Path::to_path_buf).unwrap_or_default()
    };

    let mut resolved = PathBuf::new();
    for component in base.join(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(name) => resolved.push(name),
            Component::ParentDir => {
                if !resolved.pop() {
                    return None;
                }
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!resolved.as_os_str().is_empty()).then_some(resolved)
}

/// Local means served by us: not empty, not a fragment, not protocol-relative
/// and without a scheme (`https:`, `mailto:`, `data:`, ...).
pub fn is_local(url: &str) -> bool {
    let url = url.trim();
    !(url.is_empty() || url.starts_with('#') || url.starts_with("//") || has_scheme(url))
}

fn has_scheme(url: &str) -> bool {
    let Some(colon) = url.find(':') else {
        return false;
    };
    let scheme = &url[..colon];
    scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// `/css/app.css` -> `/blog/css/app.css` when the public URL is `/blog/`
fn under_public_url(url: &str, public_base: &str) -> Option<String> {
    if public_base == "/" || !url.starts_with('/') || url.starts_with(public_base) {
        return None;
    }
    Some(format!("{public_base}{}", url.trim_start_matches('/')))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<html><head>
<link rel="stylesheet" href="/styles/app.css">
<link rel="alternate" href="https://example.com/rss.xml">
<script src="js/main.js?v=2"></script>
</head><body>
<a href="#top">top</a>
<a href="mailto:me@example.com">mail</a>
<img src="/images/me.png" srcset="/images/me.png 1x, /images/me@2x.png 2x">
<video poster="poster.jpg"></video>
</body></html>"##;

    #[test]
    fn test_collects_local_references() {
        let processed = process_html(PAGE, "/").unwrap();
        assert_eq!(
            processed.references,
            vec![
                "/styles/app.css",
                "js/main.js?v=2",
                "/images/me.png",
                "/images/me.png",
                "/images/me@2x.png",
                "poster.jpg",
            ]
        );
        assert!(processed.html.contains(r#"href="/styles/app.css""#));
    }

    #[test]
    fn test_moves_root_relative_urls_under_public_url() {
        let processed = process_html(PAGE, "/blog/").unwrap();
        assert!(processed.html.contains(r#"href="/blog/styles/app.css""#));
        assert!(processed.html.contains(r#"src="/blog/images/me.png""#));
        assert!(processed
            .html
            .contains(r#"srcset="/blog/images/me.png 1x, /blog/images/me@2x.png 2x""#));
        // Relative and external URLs are left alone
        assert!(processed.html.contains(r#"src="js/main.js?v=2""#));
        assert!(processed.html.contains(r#"href="https://example.com/rss.xml""#));
    }

    #[test]
    fn test_css_references() {
        let css = r#"@import "base.css";
body { background: url('/images/bg.png'); }
@font-face { src: url(fonts/inter.woff2) format("woff2"), url(data:font/woff;base64,AAA); }"#;
        assert_eq!(
            css_references(css),
            vec!["/images/bg.png", "fonts/inter.woff2", "base.css"]
        );
    }

    #[test]
    fn test_resolve_reference() {
        let from = Path::new("posts/my-post/index.html");
        assert_eq!(
            resolve_reference(from, "/styles/app.css"),
            Some(PathBuf::from("styles/app.css"))
        );
        assert_eq!(
            resolve_reference(from, "cover.png?w=300#x"),
            Some(PathBuf::from("posts/my-post/cover.png"))
        );
        assert_eq!(
            resolve_reference(from, "../shared/a%20b.png"),
            Some(PathBuf::from("posts/shared/a b.png"))
        );
        assert_eq!(resolve_reference(from, "../../../../etc/passwd"), None);
        assert_eq!(resolve_reference(from, "/"), None);
    }

    #[test]
    fn test_is_local() {
        assert!(is_local("/a.css"));
        assert!(is_local("img/a.png"));
        assert!(!is_local("a:b/c.png"));
        assert!(!is_local("https://example.com"));
        assert!(!is_local("//cdn.example.com/x.js"));
        assert!(!is_local("data:image/png;base64,AAA"));
        assert!(!is_local("#section"));
        assert!(!is_local(""));
    }
}
