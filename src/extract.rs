use crate::error::PaginatorError;
use crate::node::{ContentNode, ElementNode};
use crate::table::{FRAGMENT_ATTR, TableParts};
use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};

pub const CONTENT_ROOT_CLASS: &str = "extracted-page-content";
const SKIPPED_PAGE_CLASSES: &[&str] = &["page-number", "navigation", "footer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootMode {
    ContentContainer,
    #[default]
    ContentContainerOrBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    pub root: ContentNode,
    pub styles: Vec<String>,
    // 0 for flowing input.
    pub source_pages: usize,
}

pub fn extract_content(html: &str, mode: RootMode) -> Result<ExtractedContent, PaginatorError> {
    let document = kuchiki::parse_html().one(html);
    remove_scripts(&document);

    let pages = top_level_pages(&document);
    if !pages.is_empty() {
        log::info!(
            "input is already paginated; joining {} pages into one stream",
            pages.len()
        );
        let root = join_pages(&pages);
        return Ok(ExtractedContent {
            root,
            styles: Vec::new(),
            source_pages: pages.len(),
        });
    }

    let container = document
        .select_first(&format!(".{CONTENT_ROOT_CLASS}"))
        .ok()
        .map(|el| el.as_node().clone());
    let root_node = match (container, mode) {
        (Some(node), _) => node,
        (None, RootMode::ContentContainer) => return Err(PaginatorError::MissingContentRoot),
        (None, RootMode::ContentContainerOrBody) => document
            .select_first("body")
            .map(|el| el.as_node().clone())
            .map_err(|_| PaginatorError::MissingContentRoot)?,
    };
    let root = ContentNode::from_kuchiki(&root_node).ok_or(PaginatorError::MissingContentRoot)?;

    let mut styles = Vec::new();
    if let Ok(head_styles) = document.select("head style") {
        for style in head_styles {
            styles.push(style.as_node().text_contents());
        }
    }
    Ok(ExtractedContent {
        root,
        styles,
        source_pages: 0,
    })
}

fn remove_scripts(document: &NodeRef) {
    let scripts: Vec<NodeRef> = match document.select("script") {
        Ok(found) => found.map(|el| el.as_node().clone()).collect(),
        Err(_) => return,
    };
    for script in scripts {
        script.detach();
    }
}

fn has_class(node: &NodeRef, class: &str) -> bool {
    match node.data() {
        NodeData::Element(el) => el
            .attributes
            .borrow()
            .get("class")
            .map(|value| value.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false),
        _ => false,
    }
}

fn top_level_pages(document: &NodeRef) -> Vec<NodeRef> {
    let Ok(found) = document.select(".page") else {
        return Vec::new();
    };
    found
        .map(|el| el.as_node().clone())
        .filter(|node| !node.ancestors().any(|ancestor| has_class(&ancestor, "page")))
        .collect()
}

fn join_pages(pages: &[NodeRef]) -> ContentNode {
    let mut root = ElementNode::new("div").with_attribute("class", CONTENT_ROOT_CLASS);
    let mut pending_table: Option<ContentNode> = None;

    for (idx, page) in pages.iter().enumerate() {
        let container = page
            .select_first(".page-content")
            .or_else(|_| page.select_first(&format!(".{CONTENT_ROOT_CLASS}")))
            .map(|el| el.as_node().clone())
            .unwrap_or_else(|_| page.clone());

        for child in container.children() {
            let Some(node) = ContentNode::from_kuchiki(&child) else {
                continue;
            };
            let Some(el) = node.as_element() else {
                continue;
            };
            if is_page_chrome(el) {
                continue;
            }
            if node.is_table() {
                let continues = el.attribute(FRAGMENT_ATTR).is_some()
                    || !el.element_children().any(|c| c.tag == "thead");
                match pending_table.as_mut() {
                    Some(open) if continues => {
                        log::debug!("merging table continuation from page {}", idx + 1);
                        append_rows(open, &node);
                    }
                    _ => {
                        if let Some(done) = pending_table.take() {
                            root.children.push(done);
                        }
                        pending_table = Some(node);
                    }
                }
                continue;
            }
            if let Some(done) = pending_table.take() {
                root.children.push(done);
            }
            root.children.push(node);
        }
    }
    if let Some(done) = pending_table {
        root.children.push(done);
    }
    root.into_node()
}

fn is_page_chrome(el: &ElementNode) -> bool {
    let class = el.attribute("class").unwrap_or("");
    SKIPPED_PAGE_CLASSES.iter().any(|skip| class.contains(skip))
}

fn append_rows(target: &mut ContentNode, continuation: &ContentNode) {
    let rows: Vec<ContentNode> = TableParts::of(continuation)
        .rows
        .into_iter()
        .cloned()
        .collect();
    let Some(table) = target.as_element_mut() else {
        return;
    };
    let body = table
        .children
        .iter_mut()
        .filter_map(ContentNode::as_element_mut)
        .find(|child| child.tag == "tbody");
    match body {
        Some(tbody) => tbody.children.extend(rows),
        None => table.children.extend(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_the_content_container() {
        let html = r#"<html><body><nav>menu</nav><div class="extracted-page-content"><h1>Title</h1><p>Body</p></div></body></html>"#;
        let content = extract_content(html, RootMode::ContentContainer).expect("extract");
        assert_eq!(content.root.class_name(), CONTENT_ROOT_CLASS);
        assert_eq!(content.root.text_content(), "TitleBody");
        assert_eq!(content.source_pages, 0);
    }

    #[test]
    fn falls_back_to_body_and_keeps_head_styles() {
        let html = "<html><head><style>p { color: red }</style></head><body><p>One</p><script>alert(1)</script></body></html>";
        let content = extract_content(html, RootMode::ContentContainerOrBody).expect("extract");
        assert!(content.root.is_tag("body"));
        assert_eq!(content.root.children().len(), 1);
        assert_eq!(content.styles, vec!["p { color: red }".to_string()]);
    }

    #[test]
    fn strict_mode_requires_the_container() {
        let err = match extract_content("<p>loose</p>", RootMode::ContentContainer) {
            Ok(_) => panic!("expected a missing root"),
            Err(err) => err,
        };
        assert!(matches!(err, PaginatorError::MissingContentRoot));
    }

    #[test]
    fn joins_paginated_input_and_merges_table_fragments() {
        let html = r#"<html><body>
            <div class="page"><div class="extracted-page-content">
                <h2>Report</h2>
                <table class="t"><thead><tr><th>H</th></tr></thead><tbody><tr><td>r1</td></tr><tr><td>r2</td></tr></tbody></table>
            </div><div class="page-number">Page 1</div></div>
            <div class="page"><div class="extracted-page-content">
                <table class="t" data-table-fragment="2"><thead><tr><th>H</th></tr></thead><tbody><tr><td>r3</td></tr></tbody></table>
                <p>After</p>
            </div><div class="page-number">Page 2</div></div>
        </body></html>"#;
        let content = extract_content(html, RootMode::ContentContainer).expect("extract");
        assert_eq!(content.source_pages, 2);
        let tags: Vec<&str> = content
            .root
            .children()
            .iter()
            .filter_map(|c| c.tag_name())
            .collect();
        assert_eq!(tags, vec!["h2", "table", "p"]);
        let table = &content.root.children()[1];
        let rows: Vec<String> = TableParts::of(table)
            .rows
            .iter()
            .map(|r| r.text_content())
            .collect();
        assert_eq!(rows, vec!["r1", "r2", "r3"]);
        assert!(!content.root.text_content().contains("Page 1"));
    }

    #[test]
    fn headerless_table_after_text_starts_a_new_table() {
        let html = r#"<div class="page"><p>x</p><table><tr><td>a</td></tr></table><table><tr><td>b</td></tr></table></div>"#;
        let content = extract_content(html, RootMode::ContentContainer).expect("extract");
        let tables: Vec<&ContentNode> = content
            .root
            .children()
            .iter()
            .filter(|c| c.is_table())
            .collect();
        assert_eq!(tables.len(), 1, "second headerless table continues the first");
        assert_eq!(tables[0].text_content(), "ab");
    }
}
