//! HTML extraction: title, main text, outbound links, meta tags, and the
//! first JSON-LD block. Built on `scraper`, matching the tag-stripping
//! idiom this codebase's own extraction pipeline uses.

use std::collections::HashMap;

use scraper::{Html, Selector};

const STRIP_SELECTORS: &[&str] = &["script", "style", "nav", "footer", "header"];
const MAIN_CONTENT_SELECTORS: &[&str] = &["main", "article", "#content", ".content", "#main", ".main"];

pub fn extract_title(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").unwrap();
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" ").trim().to_string())
        .unwrap_or_default()
}

/// Prefers a main-content container; falls back to the whole `<body>` text.
/// `script`/`style`/`nav`/`footer`/`header` elements are never included,
/// even inside a preferred container.
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector_str in MAIN_CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = element_text_excluding_stripped(&element);
                if !text.trim().is_empty() {
                    return text;
                }
            }
        }
    }

    let body_selector = Selector::parse("body").unwrap();
    document
        .select(&body_selector)
        .next()
        .map(|el| element_text_excluding_stripped(&el))
        .unwrap_or_else(|| {
            // No <body> at all (e.g. a fragment); fall back to the whole document.
            element_text_excluding_stripped(&document.root_element())
        })
}

fn element_text_excluding_stripped(element: &scraper::ElementRef) -> String {
    let strip_selectors: Vec<Selector> = STRIP_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect();

    let stripped_node_ids: std::collections::HashSet<_> = strip_selectors
        .iter()
        .flat_map(|sel| element.select(sel))
        .map(|el| el.id())
        .collect();

    element
        .descendants()
        .filter_map(|node| {
            let within_stripped = node
                .ancestors()
                .any(|ancestor| stripped_node_ids.contains(&ancestor.id()));
            if within_stripped {
                return None;
            }
            node.value().as_text().map(|t| t.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves every `<a href>` against `base_url`, dropping anything that
/// fails to parse as an absolute URL.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = url::Url::parse(base_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").unwrap();

    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(|url| url.to_string())
        .collect()
}

/// All `<meta name|property>` tags, keyed by name/property.
pub fn extract_meta(html: &str) -> HashMap<String, String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("meta").unwrap();

    document
        .select(&selector)
        .filter_map(|el| {
            let key = el
                .value()
                .attr("name")
                .or_else(|| el.value().attr("property"))?;
            let value = el.value().attr("content").unwrap_or_default();
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// The first `<script type="application/ld+json">` block, parsed as JSON.
pub fn extract_structured_data(html: &str) -> Option<serde_json::Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    let raw = document.select(&selector).next()?.text().collect::<String>();
    serde_json::from_str(&raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title() {
        let html = "<html><head><title>Hello</title></head><body></body></html>";
        assert_eq!(extract_title(html), "Hello");
    }

    #[test]
    fn prefers_main_content_over_full_body() {
        let html = "<html><body><nav>Menu</nav><main>Real content here</main><footer>Copyright</footer></body></html>";
        let text = extract_main_text(html);
        assert!(text.contains("Real content here"));
        assert!(!text.contains("Menu"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn falls_back_to_body_when_no_main_container() {
        let html = "<html><body><p>Just a paragraph</p></body></html>";
        let text = extract_main_text(html);
        assert!(text.contains("Just a paragraph"));
    }

    #[test]
    fn resolves_relative_links_against_base() {
        let html = r#"<html><body><a href="/a">A</a><a href="https://other.example/b">B</a></body></html>"#;
        let links = extract_links(html, "http://h/page");
        assert!(links.contains(&"http://h/a".to_string()));
        assert!(links.contains(&"https://other.example/b".to_string()));
    }

    #[test]
    fn extracts_meta_tags() {
        let html = r#"<html><head><meta name="description" content="a page"><meta property="og:title" content="Title"></head></html>"#;
        let meta = extract_meta(html);
        assert_eq!(meta.get("description"), Some(&"a page".to_string()));
        assert_eq!(meta.get("og:title"), Some(&"Title".to_string()));
    }

    #[test]
    fn extracts_json_ld_block() {
        let html = r#"<html><head><script type="application/ld+json">{"@type": "Article"}</script></head></html>"#;
        let data = extract_structured_data(html).unwrap();
        assert_eq!(data["@type"], "Article");
    }

    #[test]
    fn missing_json_ld_returns_none() {
        assert!(extract_structured_data("<html></html>").is_none());
    }
}
