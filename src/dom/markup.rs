use std::fmt::Write as _;

use indexmap::IndexMap;

/// Static markup as produced by the engine's render pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Markup {
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
        children: Vec<Markup>,
    },
    Text(String),
}

impl Markup {
    pub fn element(tag: impl Into<String>) -> Self {
        Markup::Element {
            tag: tag.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Markup::Text(text.into())
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Markup::Element { attrs, .. } = &mut self {
            attrs.insert(name.into(), value.into());
        }
        self
    }

    pub fn with_child(mut self, child: Markup) -> Self {
        self.push_child(child);
        self
    }

    pub fn with_children(mut self, items: impl IntoIterator<Item = Markup>) -> Self {
        for child in items {
            self.push_child(child);
        }
        self
    }

    pub fn push_child(&mut self, child: Markup) {
        if let Markup::Element { children, .. } = self {
            children.push(child);
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Markup::Element { tag, .. } => Some(tag),
            Markup::Text(_) => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Markup::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            Markup::Text(_) => None,
        }
    }

    /// Depth-first search including `self`.
    pub fn find(&self, predicate: &dyn Fn(&Markup) -> bool) -> Option<&Markup> {
        if predicate(self) {
            return Some(self);
        }
        match self {
            Markup::Element { children, .. } => {
                children.iter().find_map(|child| child.find(predicate))
            }
            Markup::Text(_) => None,
        }
    }

    /// Mutable counterpart of [`Markup::find`].
    pub fn find_mut(&mut self, predicate: &dyn Fn(&Markup) -> bool) -> Option<&mut Markup> {
        if predicate(self) {
            return Some(self);
        }
        match self {
            Markup::Element { children, .. } => children
                .iter_mut()
                .find_map(|child| child.find_mut(predicate)),
            Markup::Text(_) => None,
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Markup::Text(text) => out.push_str(&escape(text)),
            Markup::Element {
                tag,
                attrs,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    let _ = write!(out, " {name}=\"{}\"", escape(value));
                }
                out.push('>');
                for child in children {
                    child.write_html(out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_nested_markup_with_escaping() {
        let markup = Markup::element("div")
            .with_attr("class", "a\"b")
            .with_child(Markup::element("fb-input").with_attr("ref", "input"))
            .with_child(Markup::text("x < y"));
        assert_eq!(
            markup.to_html(),
            "<div class=\"a&quot;b\"><fb-input ref=\"input\"></fb-input>x &lt; y</div>"
        );
    }

    #[test]
    fn find_mut_replaces_nested_node() {
        let mut markup = Markup::element("div")
            .with_child(Markup::element("span").with_child(Markup::element("input")));
        if let Some(node) = markup.find_mut(&|node| node.tag() == Some("input")) {
            *node = Markup::element("fb-text");
        }
        assert!(markup.find(&|node| node.tag() == Some("fb-text")).is_some());
        assert!(markup.find(&|node| node.tag() == Some("input")).is_none());
    }
}
