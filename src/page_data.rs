use crate::node::ContentNode;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageData {
    pub page_number: usize,
    pub elements: Vec<ContentNode>,
    pub total_height: u32,
}

impl PageData {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn utilization(&self, capacity: u32) -> f64 {
        if capacity == 0 {
            return 0.0;
        }
        self.total_height as f64 / capacity as f64 * 100.0
    }

    pub fn word_count(&self) -> usize {
        self.elements.iter().map(ContentNode::word_count).sum()
    }
}

pub fn utilization_report(pages: &[PageData], capacity: u32) -> Vec<String> {
    pages
        .iter()
        .map(|page| {
            format!(
                "page {}: {}px / {}px ({:.1}%), {} elements",
                page.page_number,
                page.total_height,
                capacity,
                page.utilization(capacity),
                page.elements.len()
            )
        })
        .collect()
}
