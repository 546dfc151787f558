use crate::document::{DocumentView, NodeView};
use crate::{Document, DomError, NodeId};
use html_parser::{Dom, Node};
use std::fmt::Write;

impl Document {
    /// Parse `html` and append the resulting nodes to `parent`.
    ///
    /// The fragment is built detached and inserted root by root, so custom elements in it see their
    /// observed attributes before they are connected, just like the browser's parser.
    pub fn append_markup(&self, parent: NodeId, html: &str) -> Result<Vec<NodeId>, DomError> {
        let dom = Dom::parse(html)?;

        let mut roots = Vec::with_capacity(dom.children.len());
        for node in &dom.children {
            if let Some(id) = self.build(node)? {
                roots.push(id);
            }
        }

        for root in &roots {
            self.append_child(parent, *root)?;
        }

        Ok(roots)
    }

    fn build(&self, node: &Node) -> Result<Option<NodeId>, DomError> {
        let element = match node {
            Node::Text(text) => return Ok(Some(self.create_text_node(&unescape(text)))),
            Node::Comment(_) => return Ok(None),
            Node::Element(element) => element,
        };

        let id = self.create_element(&element.name);

        // the parser lifts `id` and `class` out of the attribute list
        if let Some(value) = &element.id {
            self.set_attribute(id, "id", &unescape(value))?;
        }
        if !element.classes.is_empty() {
            self.set_attribute(id, "class", &unescape(&element.classes.join(" ")))?;
        }

        let mut attributes: Vec<_> = element.attributes.iter().collect();
        attributes.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in attributes {
            self.set_attribute(id, name, &unescape(value.as_deref().unwrap_or("")))?;
        }

        for child in &element.children {
            if let Some(child) = self.build(child)? {
                self.append_child(id, child)?;
            }
        }

        Ok(Some(id))
    }

    /// Serialize the light tree of `id`, including the node itself.
    pub fn outer_html(&self, id: NodeId) -> String {
        self.serialize(id, false, true)
    }

    /// Serialize the light tree below `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        self.serialize(id, false, false)
    }

    /// Serialize `id` with every shadow root, open or closed, written as a declarative
    /// `<template shadowrootmode>`.
    pub fn composed_html(&self, id: NodeId) -> String {
        self.serialize(id, true, true)
    }

    fn serialize(&self, id: NodeId, composed: bool, include_self: bool) -> String {
        self.with_inner(|view| {
            let mut out = String::new();
            let children = match view.node(id) {
                Some((_, children)) => children,
                None => return out,
            };
            if include_self {
                write_node(view, id, composed, &mut out);
            } else {
                for child in children {
                    write_node(view, *child, composed, &mut out);
                }
            }
            out
        })
    }
}

fn write_node(view: &DocumentView<'_>, id: NodeId, composed: bool, out: &mut String) {
    let Some((node, children)) = view.node(id) else {
        return;
    };

    match node {
        NodeView::Text(text) => escape(text, false, out),
        NodeView::Document | NodeView::ShadowRoot => {
            for child in children {
                write_node(view, *child, composed, out);
            }
        }
        NodeView::Element {
            tag,
            attributes,
            shadow,
        } => {
            let _ = write!(out, "<{tag}");
            for (name, value) in attributes {
                let _ = write!(out, " {name}=\"");
                escape(value, true, out);
                out.push('"');
            }
            out.push('>');

            if let (true, Some((shadow, mode))) = (composed, shadow) {
                let _ = write!(out, "<template shadowrootmode=\"{mode}\">");
                write_node(view, shadow, composed, out);
                out.push_str("</template>");
            }

            for child in children {
                write_node(view, *child, composed, out);
            }

            let _ = write!(out, "</{tag}>");
        }
    }
}

fn escape(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

/// Decode character references. The parser hands back text and attribute values as written.
fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let decoded = rest.find(';').and_then(|end| {
            let c = match &rest[1..end] {
                "amp" => '&',
                "lt" => '<',
                "gt" => '>',
                "quot" => '"',
                "apos" => '\'',
                "nbsp" => '\u{a0}',
                reference => {
                    let number = reference.strip_prefix('#')?;
                    let code = match number.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                        None => number.parse().ok()?,
                    };
                    char::from_u32(code)?
                }
            };
            Some((c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            // not a reference we know, keep the ampersand as written
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn markup_round_trips_through_the_serializer() {
        let document = Document::new();
        let body = document.body();

        document
            .append_markup(body, r#"<div id="main" title="greeting"><p>hi</p></div>"#)
            .unwrap();

        assert_eq!(
            document.inner_html(body),
            r#"<div id="main" title="greeting"><p>hi</p></div>"#
        );

        let text = document.create_text_node("a < b & c");
        document.append_child(body, text).unwrap();
        assert!(document.inner_html(body).ends_with("a &lt; b &amp; c"));
    }

    #[test]
    fn character_references_are_decoded_once() {
        let document = Document::new();
        let body = document.body();

        let roots = document
            .append_markup(body, r#"<x-clock prefix="a &amp; b">1 &lt; 2 &#38; &#x3E;</x-clock>"#)
            .unwrap();

        assert_eq!(
            document.get_attribute(roots[0], "prefix").as_deref(),
            Some("a & b")
        );
        assert_eq!(document.text_content(roots[0]), "1 < 2 & >");
        assert_eq!(
            document.inner_html(body),
            r#"<x-clock prefix="a &amp; b">1 &lt; 2 &amp; &gt;</x-clock>"#
        );
    }

    #[test]
    fn unknown_references_are_kept() {
        assert_eq!(unescape("fish & chips"), "fish & chips");
        assert_eq!(unescape("&bogus; &#xZZ; &amp"), "&bogus; &#xZZ; &amp");
        assert_eq!(unescape("&quot;hi&quot;&#169;"), "\"hi\"\u{a9}");
    }

    #[test]
    fn composed_html_includes_shadow_roots() {
        let document = Document::new();
        let host = document.create_element("x-host");
        document.append_child(document.body(), host).unwrap();

        let shadow = document
            .attach_shadow(host, crate::ShadowMode::Closed)
            .unwrap();
        let text = document.create_text_node("secret");
        document.append_child(shadow, text).unwrap();

        assert_eq!(document.outer_html(host), "<x-host></x-host>");
        assert_eq!(
            document.composed_html(host),
            r#"<x-host><template shadowrootmode="closed">secret</template></x-host>"#
        );
    }
}
