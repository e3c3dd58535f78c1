//! Spots clones that start loading a subresource once inserted.

use core_types::ResourceKind;
use dom_stream::{CloneKey, CloneNode, ElementClone, InsertionInstruction, Monitor};
use std::sync::{Arc, Mutex};
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchedResource {
    pub key: CloneKey,
    pub kind: ResourceKind,
    pub url: String,
}

/// What `element` would fetch on insertion, as (kind, raw url).
pub fn subresource(element: &ElementClone) -> Option<(ResourceKind, &str)> {
    let (kind, attribute) = if element.is_html("img") {
        (ResourceKind::Image, "src")
    } else if element.is_html("script") {
        (ResourceKind::Script, "src")
    } else if element.is_html("iframe") {
        (ResourceKind::Html, "src")
    } else if element.is_html("link") && is_stylesheet_link(element) {
        (ResourceKind::Css, "href")
    } else {
        return None;
    };
    let url = element.attribute(attribute)?;
    (!url.trim().is_empty()).then_some((kind, url))
}

fn is_stylesheet_link(element: &ElementClone) -> bool {
    element.attribute("rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    })
}

/// A replay monitor appending every fresh subresource clone to `sink`.
/// URLs are resolved against `base`; unresolvable ones are kept verbatim.
pub fn resource_watch(base: Option<Url>, sink: Arc<Mutex<Vec<WatchedResource>>>) -> Monitor {
    Box::new(move |instruction: &InsertionInstruction| {
        let Some(CloneNode::Element(element)) = instruction.clone.as_ref() else {
            return;
        };
        let Some((kind, raw)) = subresource(element) else {
            return;
        };
        let url = Url::options()
            .base_url(base.as_ref())
            .parse(raw.trim())
            .map(String::from)
            .unwrap_or_else(|_| raw.to_string());
        log::trace!(target: "include", "watching {kind:?} {url}");
        if let Ok(mut list) = sink.lock() {
            list.push(WatchedResource {
                key: instruction.key,
                kind,
                url,
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_stream::{ElementNamespace, InsertionParent};

    fn element(name: &str, attributes: &[(&str, &str)]) -> ElementClone {
        let mut element = ElementClone::new(name, ElementNamespace::Html);
        for (key, value) in attributes {
            element.set_attribute(Arc::from(*key), value.to_string());
        }
        element
    }

    #[test]
    fn recognizes_loading_elements() {
        assert_eq!(
            subresource(&element("img", &[("src", "a.png")])),
            Some((ResourceKind::Image, "a.png"))
        );
        assert_eq!(
            subresource(&element("link", &[("rel", "preload Stylesheet"), ("href", "s.css")])),
            Some((ResourceKind::Css, "s.css"))
        );
        assert_eq!(subresource(&element("link", &[("rel", "icon"), ("href", "i")])), None);
        assert_eq!(subresource(&element("script", &[])), None);
        assert_eq!(subresource(&element("img", &[("src", "  ")])), None);
        let svg_image = ElementClone::new("img", ElementNamespace::Svg);
        assert_eq!(subresource(&svg_image), None);
    }

    #[test]
    fn monitor_resolves_against_the_base() {
        let list = Arc::new(Mutex::new(Vec::new()));
        let base = Url::parse("https://example.com/dir/page.html").ok();
        let mut monitor = resource_watch(base, Arc::clone(&list));
        monitor(&InsertionInstruction {
            key: CloneKey(3),
            clone: Some(CloneNode::Element(element("script", &[("src", "app.js")]))),
            parent: InsertionParent::Root,
            next_sibling: None,
        });
        monitor(&InsertionInstruction {
            key: CloneKey(3),
            clone: None,
            parent: InsertionParent::Root,
            next_sibling: None,
        });
        assert_eq!(
            *list.lock().unwrap(),
            vec![WatchedResource {
                key: CloneKey(3),
                kind: ResourceKind::Script,
                url: "https://example.com/dir/app.js".to_string(),
            }]
        );
    }
}
