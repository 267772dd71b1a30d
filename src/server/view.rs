// src/server/view.rs
// =============================================================================
// Alternative response shapes, chosen from the request's Accept header.
//
// - Browsers (Accept: text/html) get the file rendered as a Markdown document
//   inside a small HTML page
// - Accept: application/json gets the resolved locator and its upstream URL
// - Everyone else (curl, wget, sh) gets the raw bytes (see handler.rs)
// =============================================================================

use crate::cli::Settings;
use crate::locator::Locator;
use axum::http::{header, HeaderMap};
use pulldown_cmark::{html, Event, Options, Parser};
use serde::Serialize;

pub fn wants_html(headers: &HeaderMap) -> bool {
    accept_contains(headers, "text/html")
}

pub fn wants_json(headers: &HeaderMap) -> bool {
    accept_contains(headers, "json")
}

fn accept_contains(headers: &HeaderMap, needle: &str) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains(needle))
}

// Body of the JSON view
#[derive(Debug, Serialize)]
pub struct LocatorView<'a> {
    #[serde(flatten)]
    pub locator: &'a Locator,
    pub url: String,
}

// Renders a fetched file as an HTML page
//
// The file is treated as CommonMark. Invalid UTF-8 is replaced rather than
// rejected, since a browser view is best effort. Raw HTML in the file is shown
// as text, never passed through, so a repo can't run script on our origin.
pub fn render_document(locator: &Locator, body: &[u8], settings: &Settings) -> String {
    let source = String::from_utf8_lossy(body);

    let mut content = String::new();
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    // pulldown-cmark reports both block and inline raw HTML as Event::Html
    let events = Parser::new_ext(&source, options).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        other => other,
    });
    html::push_html(&mut content, events);

    let title = escape(&format!("{}/{}", locator.org, locator.repo));
    let avatar = escape(&format!("{}/{}.png", settings.avatar_host, locator.org));

    let mut repo_url = format!("{}/{}/{}", settings.avatar_host, locator.org, locator.repo);
    if locator.git_ref != settings.defaults.git_ref {
        repo_url.push_str("/tree/");
        repo_url.push_str(&locator.git_ref);
    }
    let repo_url = escape(&repo_url);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<link rel="shortcut icon" type="image/png" href="{avatar}">
<style>
#root {{ margin: 100px auto; max-width: 650px; font-family: sans-serif; }}
a {{ text-decoration: none; }}
pre {{ overflow-x: auto; }}
</style>
</head>
<body>
<div id="root">
<div id="content">
{content}</div>
<div id="footer"><a href="{repo_url}">View on GitHub</a></div>
</div>
</body>
</html>
"#
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn locator(git_ref: &str) -> Locator {
        Locator {
            org: "acme".to_string(),
            repo: "widget".to_string(),
            git_ref: git_ref.to_string(),
            file: "README.md".to_string(),
        }
    }

    fn accept(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_content_negotiation() {
        let browser = accept("text/html,application/xhtml+xml,*/*;q=0.8");
        assert!(wants_html(&browser));
        assert!(!wants_json(&browser));

        let api = accept("application/json");
        assert!(wants_json(&api));
        assert!(!wants_html(&api));

        let curl = accept("*/*");
        assert!(!wants_html(&curl));
        assert!(!wants_json(&curl));
        assert!(!wants_html(&HeaderMap::new()));
    }

    #[test]
    fn test_render_document_renders_markdown() {
        let page = render_document(
            &locator("master"),
            b"# Widget\n\nInstall with `curl`.\n",
            &Settings::default(),
        );
        assert!(page.contains("<title>acme/widget</title>"));
        assert!(page.contains("<h1>Widget</h1>"));
        assert!(page.contains("<code>curl</code>"));
        assert!(page.contains(r#"href="https://github.com/acme.png""#));
        assert!(page.contains(r#"href="https://github.com/acme/widget""#));
    }

    #[test]
    fn test_render_document_escapes_raw_html() {
        let page = render_document(
            &locator("master"),
            b"# hi\n\n<script>alert(document.cookie)</script>\n\nclick <img src=x onerror=alert(1)> here\n",
            &Settings::default(),
        );
        assert!(!page.contains("<script>alert"));
        assert!(!page.contains("<img src=x"));
        assert!(page.contains("&lt;script&gt;alert(document.cookie)&lt;/script&gt;"));
        assert!(page.contains("&lt;img src=x onerror=alert(1)&gt;"));
    }

    #[test]
    fn test_render_document_links_to_ref() {
        let page = render_document(&locator("v2"), b"hi", &Settings::default());
        assert!(page.contains(r#"href="https://github.com/acme/widget/tree/v2""#));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_locator_view_json() {
        let locator = locator("v2");
        let view = LocatorView {
            locator: &locator,
            url: "https://raw.githubusercontent.com/acme/widget/v2/README.md".to_string(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["org"], "acme");
        assert_eq!(json["ref"], "v2");
        assert_eq!(json["file"], "README.md");
        assert_eq!(
            json["url"],
            "https://raw.githubusercontent.com/acme/widget/v2/README.md"
        );
    }
}
