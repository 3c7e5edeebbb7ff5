use crate::debug::PaginationTrace;
use crate::error::PaginatorError;
use crate::measure::{Dimensions, MeasurementSurface};
use crate::node::ContentNode;

const PREVIEW_CHARS: usize = 50;

const NON_RENDERED_TAGS: &[&str] = &["script", "style", "template", "link", "meta", "title", "head"];

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub order: usize,
    pub element: ContentNode,
    pub tag_name: String,
    pub class_name: String,
    pub width: u32,
    pub height: u32,
    pub is_table: bool,
    pub can_break: bool,
    pub preview: String,
}

impl RegistryEntry {
    pub fn new(order: usize, element: ContentNode, dims: Dimensions) -> Self {
        let is_table = element.is_table();
        Self {
            order,
            tag_name: element.tag_name().unwrap_or("#text").to_string(),
            class_name: element.class_name().to_string(),
            preview: element.preview(PREVIEW_CHARS),
            width: dims.width,
            height: dims.height,
            is_table,
            can_break: is_table,
            element,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn from_measured(measured: impl IntoIterator<Item = (ContentNode, Dimensions)>) -> Self {
        let entries = measured
            .into_iter()
            .enumerate()
            .map(|(idx, (element, dims))| RegistryEntry::new(idx + 1, element, dims))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RegistryEntry> {
        self.entries.iter()
    }

    pub fn total_height(&self) -> u64 {
        self.entries.iter().map(|entry| entry.height as u64).sum()
    }

    pub fn summary_table(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{:>5} | {:<8} | {:<12} | {:>5} | {:>6} | {:<5} | {}\n",
            "order", "tag", "class", "width", "height", "table", "text"
        ));
        out.push_str(&format!("{}\n", "-".repeat(80)));
        for entry in &self.entries {
            let class: String = entry.class_name.chars().take(12).collect();
            let text: String = entry.preview.chars().take(32).collect();
            out.push_str(&format!(
                "{:>5} | {:<8} | {:<12} | {:>5} | {:>6} | {:<5} | {}\n",
                entry.order,
                entry.tag_name,
                if class.is_empty() { "-".to_string() } else { class },
                entry.width,
                entry.height,
                if entry.is_table { "yes" } else { "" },
                text
            ));
        }
        out
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a RegistryEntry;
    type IntoIter = std::slice::Iter<'a, RegistryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

pub struct RegistryBuilder<'a> {
    decompose_above: u32,
    trace: Option<&'a PaginationTrace>,
}

impl<'a> RegistryBuilder<'a> {
    pub fn new(decompose_above: u32) -> Self {
        Self {
            decompose_above,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: Option<&'a PaginationTrace>) -> Self {
        self.trace = trace;
        self
    }

    pub fn build(
        &self,
        root: &ContentNode,
        surface: &MeasurementSurface<'_>,
    ) -> Result<Registry, PaginatorError> {
        let mut measured = Vec::new();
        self.collect(root, surface, &mut measured)?;
        let registry = Registry::from_measured(measured);

        for entry in registry.iter() {
            log::debug!(
                "registry[{}]: {}.{} {}px \"{}\"",
                entry.order,
                entry.tag_name,
                if entry.class_name.is_empty() { "no-class" } else { entry.class_name.as_str() },
                entry.height,
                entry.preview
            );
            if entry.height == 0 {
                log::warn!(
                    "registry[{}] {} measured 0px; it will be packed without taking space",
                    entry.order,
                    entry.tag_name
                );
            }
            if let Some(trace) = self.trace {
                trace.registry_entry(entry);
            }
        }
        if registry.is_empty() {
            log::warn!("registry is empty; no pageable content under the content root");
        } else {
            log::debug!("registry populated with {} entries\n{}", registry.len(), registry.summary_table());
        }
        Ok(registry)
    }

    fn collect(
        &self,
        parent: &ContentNode,
        surface: &MeasurementSurface<'_>,
        out: &mut Vec<(ContentNode, Dimensions)>,
    ) -> Result<(), PaginatorError> {
        let children = pageable_children(parent);
        if children.is_empty() {
            return Ok(());
        }
        let dims = surface.measure_sequence(&children)?;
        for (child, dims) in children.into_iter().zip(dims) {
            let oversized = dims.height > self.decompose_above;
            // Tables stay whole here; the packer splits them at row boundaries.
            let expandable = !child.is_table() && !pageable_children(child).is_empty();
            if oversized && expandable {
                log::debug!(
                    "expanding oversized {} ({}px > {}px) into its children",
                    child.tag_name().unwrap_or("#text"),
                    dims.height,
                    self.decompose_above
                );
                if let Some(trace) = self.trace {
                    trace.increment("registry.expanded", 1);
                }
                self.collect(child, surface, out)?;
                continue;
            }
            if oversized && !child.is_table() {
                log::warn!(
                    "leaf {} is oversized ({}px) and has no children to break down",
                    child.tag_name().unwrap_or("#text"),
                    dims.height
                );
            }
            out.push((child.clone(), dims));
        }
        Ok(())
    }
}

// Element children plus non-blank text runs, minus elements that never render.
pub fn pageable_children(parent: &ContentNode) -> Vec<&ContentNode> {
    parent
        .children()
        .iter()
        .filter(|child| match child {
            ContentNode::Text(_) => !child.is_whitespace_text(),
            ContentNode::Element(el) => !NON_RENDERED_TAGS.contains(&el.tag.as_str()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::testing::{FixedOracle, block, layout, table};

    fn build(root: &ContentNode, decompose_above: u32) -> (Registry, FixedOracle) {
        let oracle = FixedOracle::new();
        let registry = {
            let surface = MeasurementSurface::acquire(&oracle, layout()).expect("attach");
            RegistryBuilder::new(decompose_above)
                .build(root, &surface)
                .expect("registry")
        };
        (registry, oracle)
    }

    fn root(children: Vec<ContentNode>) -> ContentNode {
        ContentNode::element("div")
            .with_attribute("class", "extracted-page-content")
            .with_children(children)
            .into_node()
    }

    #[test]
    fn direct_children_become_ordered_entries() {
        let content = root(vec![
            block("h1", 60),
            ContentNode::text("\n   \n"),
            block("p", 100),
            table(Some(30), &[40, 40], true),
        ]);
        let (registry, oracle) = build(&content, 1215);
        let orders: Vec<usize> = registry.iter().map(|e| e.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        let tags: Vec<&str> = registry.iter().map(|e| e.tag_name.as_str()).collect();
        assert_eq!(tags, vec!["h1", "p", "table"]);
        assert_eq!(registry.entries()[2].height, 110);
        assert!(registry.entries()[2].is_table);
        assert!(registry.entries()[2].can_break);
        assert!(!registry.entries()[0].can_break);
        assert_eq!(oracle.attached.get(), oracle.detached.get());
    }

    #[test]
    fn oversized_containers_expand_recursively_in_order() {
        let inner = ContentNode::element("section")
            .with_children(vec![block("p", 700), block("p", 700)])
            .into_node();
        let outer = ContentNode::element("div")
            .with_children(vec![block("h2", 50), inner, block("p", 20)])
            .into_node();
        let content = root(vec![block("p", 10), outer, block("p", 30)]);
        let (registry, _) = build(&content, 1215);
        let heights: Vec<u32> = registry.iter().map(|e| e.height).collect();
        assert_eq!(heights, vec![10, 50, 700, 700, 20, 30]);
        let orders: Vec<usize> = registry.iter().map(|e| e.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn oversized_leaf_is_kept_whole() {
        let content = root(vec![block("img", 2430)]);
        let (registry, _) = build(&content, 1215);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].height, 2430);
    }

    #[test]
    fn oversized_container_with_only_non_rendered_children_stays_whole() {
        let container = ContentNode::element("div")
            .with_attribute("data-h", "3000")
            .with_child(ContentNode::element("link").into_node())
            .into_node();
        let content = root(vec![block("p", 10), container]);
        let (registry, _) = build(&content, 1215);
        let tags: Vec<&str> = registry.iter().map(|e| e.tag_name.as_str()).collect();
        assert_eq!(tags, vec!["p", "div"]);
        assert_eq!(registry.entries()[1].height, 3000);
    }

    #[test]
    fn oversized_tables_are_not_expanded() {
        let rows = vec![100; 30];
        let content = root(vec![table(Some(40), &rows, true)]);
        let (registry, _) = build(&content, 1215);
        assert_eq!(registry.len(), 1);
        assert!(registry.entries()[0].is_table);
        assert_eq!(registry.entries()[0].height, 3040);
    }

    #[test]
    fn non_rendered_children_are_skipped_and_text_runs_kept() {
        let content = root(vec![
            ContentNode::element("style")
                .with_child(ContentNode::text("p{}"))
                .into_node(),
            ContentNode::text("loose text"),
            block("p", 20),
        ]);
        let (registry, _) = build(&content, 1215);
        let tags: Vec<&str> = registry.iter().map(|e| e.tag_name.as_str()).collect();
        assert_eq!(tags, vec!["#text", "p"]);
    }

    #[test]
    fn empty_root_builds_empty_registry() {
        let (registry, _) = build(&root(Vec::new()), 1215);
        assert!(registry.is_empty());
        assert_eq!(registry.total_height(), 0);
    }

    #[test]
    fn measurement_failure_propagates_and_releases_surface() {
        let oracle = FixedOracle::new();
        oracle.fail_measure.set(true);
        let result = {
            let surface = MeasurementSurface::acquire(&oracle, layout()).expect("attach");
            RegistryBuilder::new(1215).build(&root(vec![block("p", 10)]), &surface)
        };
        assert!(matches!(result, Err(PaginatorError::Measurement(_))));
        assert_eq!(oracle.attached.get(), oracle.detached.get());
    }

    #[test]
    fn summary_table_lists_every_entry() {
        let content = root(vec![block("p", 12), table(None, &[10], false)]);
        let (registry, _) = build(&content, 1215);
        let summary = registry.summary_table();
        assert_eq!(summary.lines().count(), 4);
        assert!(summary.contains("table"));
        assert!(summary.contains("yes"));
    }

    #[test]
    fn entries_own_independent_copies() {
        let content = root(vec![block("p", 12)]);
        let (registry, _) = build(&content, 1215);
        let mut copy = registry.entries()[0].element.clone();
        copy.as_element_mut()
            .expect("element")
            .set_attribute("data-h", "99");
        assert_eq!(registry.entries()[0].element.attribute("data-h"), Some("12"));
    }
}
