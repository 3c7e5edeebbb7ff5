use crate::error::PaginatorError;
use crate::measure::MeasurementSurface;
use crate::node::{ContentNode, ElementNode};
use crate::page_data::PageData;
use crate::types::PageLimits;

pub const FRAGMENT_ATTR: &str = "data-table-fragment";

#[derive(Debug)]
pub struct TableParts<'a> {
    pub caption: Option<&'a ContentNode>,
    pub colgroups: Vec<&'a ContentNode>,
    pub header: Option<&'a ContentNode>,
    pub rows: Vec<&'a ContentNode>,
    pub body: Option<&'a ElementNode>,
}

impl<'a> TableParts<'a> {
    pub fn of(table: &'a ContentNode) -> Self {
        let mut parts = TableParts {
            caption: None,
            colgroups: Vec::new(),
            header: None,
            rows: Vec::new(),
            body: None,
        };
        for child in table.children() {
            match child.tag_name() {
                Some("caption") if parts.caption.is_none() => parts.caption = Some(child),
                Some("colgroup") | Some("col") => parts.colgroups.push(child),
                Some("thead") if parts.header.is_none() => parts.header = Some(child),
                Some("tr") => parts.rows.push(child),
                Some("thead") | Some("tbody") | Some("tfoot") => {
                    if child.is_tag("tbody") && parts.body.is_none() {
                        parts.body = child.as_element();
                    }
                    parts
                        .rows
                        .extend(child.children().iter().filter(|row| row.is_tag("tr")));
                }
                _ => {}
            }
        }
        parts
    }

    pub fn build_fragment(
        &self,
        table: &ContentNode,
        rows: &[&ContentNode],
        fragment_index: usize,
    ) -> ContentNode {
        let mut fragment = ElementNode::new("table");
        if let Some(source) = table.as_element() {
            fragment.attributes = source.attributes.clone();
        }
        if fragment_index > 1 {
            fragment.set_attribute(FRAGMENT_ATTR, fragment_index.to_string());
        }
        if fragment_index == 1 {
            if let Some(caption) = self.caption {
                fragment.children.push(caption.clone());
            }
        }
        fragment
            .children
            .extend(self.colgroups.iter().map(|node| (*node).clone()));
        if let Some(header) = self.header {
            fragment.children.push(header.clone());
        }
        let rows = rows.iter().map(|row| (*row).clone());
        match self.body {
            Some(body) => {
                let mut tbody = ElementNode::new("tbody");
                tbody.attributes = body.attributes.clone();
                tbody.children.extend(rows);
                fragment.children.push(tbody.into_node());
            }
            None => fragment.children.extend(rows),
        }
        fragment.into_node()
    }
}

pub struct TableSplitter<'s, 'o> {
    surface: &'s MeasurementSurface<'o>,
    limits: PageLimits,
}

impl<'s, 'o> TableSplitter<'s, 'o> {
    pub fn new(surface: &'s MeasurementSurface<'o>, limits: PageLimits) -> Self {
        Self { surface, limits }
    }

    // Empty when the oracle fails; the caller then places the table whole.
    pub fn split(
        &self,
        table: &ContentNode,
        start_height: u32,
        start_page_number: usize,
    ) -> Vec<PageData> {
        match self.try_split(table, start_height, start_page_number) {
            Ok(pages) => pages,
            Err(err) => {
                log::warn!("table split failed, keeping the table whole: {err}");
                Vec::new()
            }
        }
    }

    fn try_split(
        &self,
        table: &ContentNode,
        start_height: u32,
        start_page_number: usize,
    ) -> Result<Vec<PageData>, PaginatorError> {
        let parts = TableParts::of(table);
        if parts.rows.len() <= self.limits.solo_table_max_rows {
            log::debug!(
                "table with {} data rows is kept on a single page",
                parts.rows.len()
            );
            let height = self.surface.measure(table)?.height;
            return Ok(vec![PageData {
                page_number: start_page_number,
                elements: vec![table.clone()],
                total_height: height,
            }]);
        }

        let header_height = match parts.header {
            Some(header) => self
                .surface
                .measure_table_rows(table, &[header])?
                .into_iter()
                .sum::<u32>(),
            None => 0,
        };
        let row_heights = self.surface.measure_table_rows(table, &parts.rows)?;

        let mut groups: Vec<Vec<&ContentNode>> = Vec::new();
        let mut current_rows: Vec<&ContentNode> = Vec::new();
        let mut current_height = start_height.saturating_add(header_height);
        for (row, row_height) in parts.rows.iter().zip(row_heights) {
            let overflows = current_height.saturating_add(row_height) > self.limits.capacity
                && !current_rows.is_empty();
            let well_filled = current_rows.len() >= self.limits.table_break_min_rows
                && current_height >= self.limits.table_break_height;
            if overflows || well_filled {
                groups.push(std::mem::take(&mut current_rows));
                current_height = header_height;
            }
            current_rows.push(row);
            current_height = current_height.saturating_add(row_height);
        }
        if !current_rows.is_empty() {
            groups.push(current_rows);
        }

        let mut pages = Vec::with_capacity(groups.len());
        for (idx, rows) in groups.iter().enumerate() {
            let fragment = parts.build_fragment(table, rows, idx + 1);
            let height = self.surface.measure(&fragment)?.height;
            log::debug!(
                "table fragment {}: {} rows, {}px",
                idx + 1,
                rows.len(),
                height
            );
            pages.push(PageData {
                page_number: start_page_number + idx,
                elements: vec![fragment],
                total_height: height,
            });
        }
        Ok(pages)
    }
}
