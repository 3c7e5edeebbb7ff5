use kuchiki::{NodeData, NodeRef};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

// Cloning copies the whole subtree; pages never share storage with the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Element(ElementNode),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<ContentNode>,
}

impl ElementNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_child(mut self, child: ContentNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ContentNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self
            .attributes
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            slot.1 = value;
        } else {
            self.attributes.push((name, value));
        }
    }

    pub fn element_children(&self) -> impl Iterator<Item = &ElementNode> {
        self.children.iter().filter_map(ContentNode::as_element)
    }

    pub fn into_node(self) -> ContentNode {
        ContentNode::Element(self)
    }
}

impl ContentNode {
    pub fn element(tag: impl Into<String>) -> ElementNode {
        ElementNode::new(tag)
    }

    pub fn text(text: impl Into<String>) -> ContentNode {
        ContentNode::Text(text.into())
    }

    pub fn from_kuchiki(node: &NodeRef) -> Option<ContentNode> {
        match node.data() {
            NodeData::Element(el) => {
                let mut element = ElementNode::new(el.name.local.as_ref());
                {
                    let attrs = el.attributes.borrow();
                    for (key, attr) in attrs.map.iter() {
                        element
                            .attributes
                            .push((key.local.as_ref().to_string(), attr.value.clone()));
                    }
                }
                element.children = node
                    .children()
                    .filter_map(|child| ContentNode::from_kuchiki(&child))
                    .collect();
                Some(ContentNode::Element(element))
            }
            NodeData::Text(text) => Some(ContentNode::Text(text.borrow().clone())),
            NodeData::Document(_) | NodeData::DocumentFragment => {
                let mut fragment = ElementNode::new("div");
                fragment.children = node
                    .children()
                    .filter_map(|child| ContentNode::from_kuchiki(&child))
                    .collect();
                Some(ContentNode::Element(fragment))
            }
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            ContentNode::Element(el) => Some(el),
            ContentNode::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementNode> {
        match self {
            ContentNode::Element(el) => Some(el),
            ContentNode::Text(_) => None,
        }
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.as_element().map(|el| el.tag.as_str())
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name()
            .map(|name| name.eq_ignore_ascii_case(tag))
            .unwrap_or(false)
    }

    pub fn is_table(&self) -> bool {
        self.is_tag("table")
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.as_element().and_then(|el| el.attribute(name))
    }

    pub fn class_name(&self) -> &str {
        self.attribute("class").unwrap_or("")
    }

    pub fn children(&self) -> &[ContentNode] {
        match self {
            ContentNode::Element(el) => &el.children,
            ContentNode::Text(_) => &[],
        }
    }

    pub fn is_whitespace_text(&self) -> bool {
        match self {
            ContentNode::Text(text) => text.trim().is_empty(),
            ContentNode::Element(_) => false,
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    pub fn word_count(&self) -> usize {
        match self {
            ContentNode::Text(text) => text.split_whitespace().count(),
            ContentNode::Element(el) => {
                if RAW_TEXT_ELEMENTS.contains(&el.tag.as_str()) {
                    return 0;
                }
                el.children.iter().map(ContentNode::word_count).sum()
            }
        }
    }

    pub fn preview(&self, max_chars: usize) -> String {
        let text = self.text_content();
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut out: String = collapsed.chars().take(max_chars).collect();
        if collapsed.chars().count() > max_chars {
            out.push_str("...");
        }
        out
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_html(self, &mut out);
        out
    }
}

fn collect_text(node: &ContentNode, out: &mut String) {
    match node {
        ContentNode::Text(text) => out.push_str(text),
        ContentNode::Element(el) => {
            if RAW_TEXT_ELEMENTS.contains(&el.tag.as_str()) {
                return;
            }
            for child in &el.children {
                collect_text(child, out);
            }
        }
    }
}

fn write_html(node: &ContentNode, out: &mut String) {
    match node {
        ContentNode::Text(text) => escape_html_text(text, out),
        ContentNode::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (key, value) in &el.attributes {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                escape_html_attr(value, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&el.tag.as_str());
            for child in &el.children {
                match child {
                    ContentNode::Text(text) if raw => out.push_str(text),
                    _ => write_html(child, out),
                }
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

fn escape_html_attr(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_html_text(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}
