use crate::debug::PaginationTrace;
use crate::error::PaginatorError;
use crate::node::ContentNode;
use crate::page_data::PageData;
use crate::registry::{Registry, RegistryEntry};
use crate::table::{TableParts, TableSplitter};
use crate::types::PageLimits;

pub trait SplitTable {
    fn split(
        &self,
        table: &ContentNode,
        start_height: u32,
        start_page_number: usize,
    ) -> Vec<PageData>;
}

impl SplitTable for TableSplitter<'_, '_> {
    fn split(
        &self,
        table: &ContentNode,
        start_height: u32,
        start_page_number: usize,
    ) -> Vec<PageData> {
        TableSplitter::split(self, table, start_height, start_page_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablePlacement {
    Inline,
    FreshPage,
    Split,
}

impl TablePlacement {
    pub fn classify(height: u32, current_height: u32, page_empty: bool, effective: u32) -> Self {
        let remaining = effective as i64 - current_height as i64;
        if height as i64 <= remaining {
            TablePlacement::Inline
        } else if height <= effective && !page_empty {
            TablePlacement::FreshPage
        } else if height > effective {
            TablePlacement::Split
        } else {
            TablePlacement::Inline
        }
    }
}

struct PageAccumulator {
    number: usize,
    elements: Vec<ContentNode>,
    height: u32,
}

impl PageAccumulator {
    fn new() -> Self {
        Self {
            number: 1,
            elements: Vec::new(),
            height: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn push(&mut self, entry: &RegistryEntry) {
        self.elements.push(entry.element.clone());
        self.height = self.height.saturating_add(entry.height);
    }

    fn next_fresh_number(&self) -> usize {
        if self.is_empty() {
            self.number
        } else {
            self.number + 1
        }
    }

    fn flush_into<'p>(&mut self, pages: &'p mut Vec<PageData>) -> Option<&'p PageData> {
        if self.is_empty() {
            return None;
        }
        pages.push(PageData {
            page_number: self.number,
            elements: std::mem::take(&mut self.elements),
            total_height: self.height,
        });
        self.number += 1;
        self.height = 0;
        pages.last()
    }
}

pub struct PagePacker<'a> {
    limits: PageLimits,
    splitter: &'a dyn SplitTable,
    trace: Option<&'a PaginationTrace>,
}

impl<'a> PagePacker<'a> {
    pub fn new(limits: PageLimits, splitter: &'a dyn SplitTable) -> Self {
        Self {
            limits,
            splitter,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: Option<&'a PaginationTrace>) -> Self {
        self.trace = trace;
        self
    }

    pub fn pack(&self, registry: &Registry) -> Result<Vec<PageData>, PaginatorError> {
        if registry.is_empty() {
            return Err(PaginatorError::NoContentRegistered);
        }
        let entries = registry.entries();
        let limits = &self.limits;
        let mut pages: Vec<PageData> = Vec::new();
        let mut page = PageAccumulator::new();
        let mut cursor = 0;
        // Entry whose split already failed; it is placed whole from then on.
        let mut unsplittable: Option<usize> = None;

        while cursor < entries.len() {
            let entry = &entries[cursor];

            if !entry.is_table && entry.height > limits.oversize_above {
                log::warn!(
                    "entry {} ({}) is {}px, over {}px; placing it alone",
                    entry.order,
                    entry.tag_name,
                    entry.height,
                    limits.oversize_above
                );
                self.flush(&mut page, &mut pages, "oversized");
                self.decision("oversized", entry, page.number);
                page.push(entry);
                self.flush(&mut page, &mut pages, "oversized");
                cursor += 1;
                continue;
            }

            if entry.is_table && unsplittable != Some(cursor) {
                let placement = TablePlacement::classify(
                    entry.height,
                    page.height,
                    page.is_empty(),
                    limits.effective,
                );
                log::debug!(
                    "table entry {} ({}px) at {}px on page {}: {:?}",
                    entry.order,
                    entry.height,
                    page.height,
                    page.number,
                    placement
                );
                match placement {
                    TablePlacement::Inline => {}
                    TablePlacement::FreshPage => {
                        self.flush(&mut page, &mut pages, "table.fresh_page");
                        continue;
                    }
                    TablePlacement::Split => {
                        let start = page.next_fresh_number();
                        let fragments = self.splitter.split(&entry.element, 0, start);
                        if fragments.is_empty() {
                            log::warn!(
                                "table entry {} could not be split; placing it whole",
                                entry.order
                            );
                            self.decision("table.fallback", entry, page.number);
                            unsplittable = Some(cursor);
                            continue;
                        }
                        self.flush(&mut page, &mut pages, "table.split");
                        log::debug!(
                            "table entry {} split into {} fragments from page {}",
                            entry.order,
                            fragments.len(),
                            start
                        );
                        if let Some(trace) = self.trace {
                            let rows = TableParts::of(&entry.element).rows.len();
                            trace.table_split(entry.order, rows, fragments.len());
                            for fragment in &fragments {
                                trace.page_closed(fragment, limits.capacity, "table.fragment");
                            }
                        }
                        page.number += fragments.len();
                        pages.extend(fragments);
                        cursor += 1;
                        continue;
                    }
                }
            }

            let remaining = limits.effective as i64 - page.height as i64;
            if entry.height as i64 > remaining + limits.tolerance as i64 && !page.is_empty() {
                log::debug!(
                    "entry {} ({}px) does not fit page {} at {}px",
                    entry.order,
                    entry.height,
                    page.number,
                    page.height
                );
                self.flush(&mut page, &mut pages, "full");
                continue;
            }

            self.decision("place", entry, page.number);
            page.push(entry);
            cursor += 1;
            cursor = self.fill(entries, cursor, &mut page);
        }
        self.flush(&mut page, &mut pages, "end");
        Ok(pages)
    }

    // Pulls following entries onto the page while they fit without tolerance.
    fn fill(&self, entries: &[RegistryEntry], mut cursor: usize, page: &mut PageAccumulator) -> usize {
        let floor = self.limits.fill_floor;
        let remaining = self.limits.effective.saturating_sub(page.height);
        if remaining < floor {
            return cursor;
        }
        let end = cursor
            .saturating_add(self.limits.lookahead_window)
            .min(entries.len());
        let mut filled = 0u32;
        while cursor < end {
            let next = &entries[cursor];
            if next.is_table || filled.saturating_add(next.height) > remaining {
                break;
            }
            self.decision("fill", next, page.number);
            page.push(next);
            filled += next.height;
            cursor += 1;
            if remaining - filled < floor {
                break;
            }
        }
        cursor
    }

    fn flush(&self, page: &mut PageAccumulator, pages: &mut Vec<PageData>, reason: &str) {
        if let Some(closed) = page.flush_into(pages) {
            log::debug!(
                "page {} closed ({}): {} elements, {}px",
                closed.page_number,
                reason,
                closed.elements.len(),
                closed.total_height
            );
            if let Some(trace) = self.trace {
                trace.page_closed(closed, self.limits.capacity, reason);
            }
        }
    }

    fn decision(&self, kind: &str, entry: &RegistryEntry, page_number: usize) {
        log::debug!(
            "{kind}: entry {} ({}, {}px) on page {}",
            entry.order,
            entry.tag_name,
            entry.height,
            page_number
        );
        if let Some(trace) = self.trace {
            trace.pack_decision(kind, entry.order, page_number, entry.height);
        }
    }
}
