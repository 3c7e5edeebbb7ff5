use crate::error::PaginatorError;
use crate::node::{ContentNode, ElementNode};
use crate::types::Typography;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceLayout {
    pub content_width_px: u32,
    pub padding_px: u32,
    pub px_per_inch: f32,
    pub typography: Typography,
}

impl SurfaceLayout {
    pub fn inner_width_px(&self) -> u32 {
        self.content_width_px
            .saturating_sub(self.padding_px.saturating_mul(2))
            .max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

// Repeated measurement of the same node on the same surface must yield the same result.
pub trait MeasurementOracle {
    fn attach(&self, layout: &SurfaceLayout) -> Result<SurfaceId, PaginatorError>;

    fn measure_sequence(
        &self,
        surface: SurfaceId,
        nodes: &[&ContentNode],
    ) -> Result<Vec<Dimensions>, PaginatorError>;

    fn measure_table_rows(
        &self,
        surface: SurfaceId,
        _table: &ContentNode,
        rows: &[&ContentNode],
    ) -> Result<Vec<u32>, PaginatorError> {
        Ok(self
            .measure_sequence(surface, rows)?
            .into_iter()
            .map(|dims| dims.height)
            .collect())
    }

    fn detach(&self, surface: SurfaceId);
}

// Dropping the surface detaches it, including on early returns and `?` paths.
pub struct MeasurementSurface<'a> {
    oracle: &'a dyn MeasurementOracle,
    id: SurfaceId,
}

impl<'a> MeasurementSurface<'a> {
    pub fn acquire(
        oracle: &'a dyn MeasurementOracle,
        layout: SurfaceLayout,
    ) -> Result<Self, PaginatorError> {
        let id = oracle.attach(&layout)?;
        Ok(Self { oracle, id })
    }

    pub fn measure(&self, node: &ContentNode) -> Result<Dimensions, PaginatorError> {
        let dims = self.measure_sequence(&[node])?;
        dims.into_iter()
            .next()
            .ok_or_else(|| PaginatorError::Measurement("oracle returned no dimensions".to_string()))
    }

    pub fn measure_sequence(
        &self,
        nodes: &[&ContentNode],
    ) -> Result<Vec<Dimensions>, PaginatorError> {
        let dims = self.oracle.measure_sequence(self.id, nodes)?;
        if dims.len() != nodes.len() {
            return Err(PaginatorError::Measurement(format!(
                "oracle returned {} measurements for {} nodes",
                dims.len(),
                nodes.len()
            )));
        }
        Ok(dims)
    }

    pub fn measure_table_rows(
        &self,
        table: &ContentNode,
        rows: &[&ContentNode],
    ) -> Result<Vec<u32>, PaginatorError> {
        let heights = self.oracle.measure_table_rows(self.id, table, rows)?;
        if heights.len() != rows.len() {
            return Err(PaginatorError::Measurement(format!(
                "oracle returned {} row heights for {} rows",
                heights.len(),
                rows.len()
            )));
        }
        Ok(heights)
    }
}

impl Drop for MeasurementSurface<'_> {
    fn drop(&mut self) {
        self.oracle.detach(self.id);
    }
}

const AVG_CHAR_EM: f64 = 0.5;
const MONO_CHAR_EM: f64 = 0.6;
const CELL_PADDING_PX: f64 = 4.0;
const LIST_INDENT_PX: f64 = 40.0;
const DEFAULT_IMAGE_HEIGHT_PX: f64 = 150.0;

// Assumes a half-em glyph advance, greedy word wrap and uncollapsed user-agent margins.
#[derive(Debug, Default)]
pub struct HeuristicOracle {
    next_surface: Cell<u64>,
    surfaces: RefCell<HashMap<SurfaceId, SurfaceLayout>>,
}

impl HeuristicOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_surfaces(&self) -> usize {
        self.surfaces.borrow().len()
    }

    fn layout_of(&self, surface: SurfaceId) -> Result<SurfaceLayout, PaginatorError> {
        self.surfaces
            .borrow()
            .get(&surface)
            .cloned()
            .ok_or_else(|| {
                PaginatorError::Measurement(format!("surface {} is not attached", surface.0))
            })
    }
}

impl MeasurementOracle for HeuristicOracle {
    fn attach(&self, layout: &SurfaceLayout) -> Result<SurfaceId, PaginatorError> {
        if layout.content_width_px == 0 {
            return Err(PaginatorError::Measurement(
                "measurement surface has zero width".to_string(),
            ));
        }
        let id = SurfaceId(self.next_surface.get() + 1);
        self.next_surface.set(id.0);
        self.surfaces.borrow_mut().insert(id, layout.clone());
        Ok(id)
    }

    fn measure_sequence(
        &self,
        surface: SurfaceId,
        nodes: &[&ContentNode],
    ) -> Result<Vec<Dimensions>, PaginatorError> {
        let layout = self.layout_of(surface)?;
        Ok(nodes.iter().map(|node| estimate(node, &layout)).collect())
    }

    fn measure_table_rows(
        &self,
        surface: SurfaceId,
        table: &ContentNode,
        rows: &[&ContentNode],
    ) -> Result<Vec<u32>, PaginatorError> {
        let layout = self.layout_of(surface)?;
        let estimator = Estimator::new(&layout);
        let columns = table_column_count(table).max(1);
        Ok(rows
            .iter()
            .map(|row| ceil_px(estimator.row_group_height(row, columns, estimator.width)))
            .collect())
    }

    fn detach(&self, surface: SurfaceId) {
        self.surfaces.borrow_mut().remove(&surface);
    }
}

pub fn estimate(node: &ContentNode, layout: &SurfaceLayout) -> Dimensions {
    let estimator = Estimator::new(layout);
    let height = estimator.block_height(node, estimator.width, estimator.font_px);
    let width = match node {
        ContentNode::Element(el) if el.tag == "img" => {
            let (w, _) = estimator.image_box(el, estimator.width);
            w
        }
        _ => estimator.width,
    };
    Dimensions {
        width: ceil_px(width),
        height: ceil_px(height),
    }
}

fn ceil_px(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        0
    } else {
        value.ceil() as u32
    }
}

struct Estimator {
    width: f64,
    font_px: f64,
    line_height: f64,
}

impl Estimator {
    fn new(layout: &SurfaceLayout) -> Self {
        Self {
            width: layout.inner_width_px() as f64,
            font_px: layout.typography.font_size_px(layout.px_per_inch),
            line_height: layout.typography.line_height as f64,
        }
    }

    fn line_px(&self, font_px: f64) -> f64 {
        font_px * self.line_height
    }

    fn block_height(&self, node: &ContentNode, width: f64, font_px: f64) -> f64 {
        let el = match node {
            ContentNode::Text(text) => return self.text_height(text, width, font_px, AVG_CHAR_EM),
            ContentNode::Element(el) => el,
        };
        match el.tag.as_str() {
            "script" | "style" | "template" | "link" | "meta" | "title" | "head" => 0.0,
            "br" => self.line_px(font_px),
            "hr" => 2.0 + font_px,
            "img" => self.image_box(el, width).1,
            "table" => self.table_height(node, width),
            "tr" | "thead" | "tbody" | "tfoot" => {
                let columns = row_cell_count(node).max(1);
                self.row_group_height(node, columns, width)
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let (scale, margin_em) = heading_metrics(&el.tag);
                let heading_px = font_px * scale;
                self.flow_height(el, width, heading_px) + heading_px * margin_em * 2.0
            }
            "p" | "blockquote" | "figure" | "dl" => {
                let inner = if el.tag == "blockquote" || el.tag == "figure" {
                    (width - LIST_INDENT_PX * 2.0).max(1.0)
                } else {
                    width
                };
                self.flow_height(el, inner, font_px) + font_px * 2.0
            }
            "ul" | "ol" => {
                self.flow_height(el, (width - LIST_INDENT_PX).max(1.0), font_px) + font_px * 2.0
            }
            "pre" => self.pre_height(node, width, font_px) + font_px * 2.0,
            _ => self.flow_height(el, width, font_px),
        }
    }

    fn flow_height(&self, el: &ElementNode, width: f64, font_px: f64) -> f64 {
        let mut total = 0.0;
        let mut inline_run = String::new();
        for child in &el.children {
            if is_inline(child) {
                inline_run.push_str(&child.text_content());
                if child.is_tag("br") {
                    inline_run.push('\n');
                }
                continue;
            }
            total += self.inline_run_height(&inline_run, width, font_px);
            inline_run.clear();
            total += self.block_height(child, width, font_px);
        }
        total + self.inline_run_height(&inline_run, width, font_px)
    }

    fn inline_run_height(&self, run: &str, width: f64, font_px: f64) -> f64 {
        run.split('\n')
            .map(|line| self.text_height(line, width, font_px, AVG_CHAR_EM))
            .sum()
    }

    fn text_height(&self, text: &str, width: f64, font_px: f64, char_em: f64) -> f64 {
        let lines = wrapped_line_count(text, chars_per_line(width, font_px, char_em));
        lines as f64 * self.line_px(font_px)
    }

    fn pre_height(&self, node: &ContentNode, width: f64, font_px: f64) -> f64 {
        let text = node.text_content();
        let per_line = chars_per_line(width, font_px, MONO_CHAR_EM);
        let lines: usize = text
            .trim_matches('\n')
            .split('\n')
            .map(|line| line.chars().count().div_ceil(per_line).max(1))
            .sum();
        lines as f64 * self.line_px(font_px)
    }

    fn image_box(&self, el: &ElementNode, avail_width: f64) -> (f64, f64) {
        let width = el.attribute("width").and_then(parse_px);
        let height = el.attribute("height").and_then(parse_px);
        let (w, h) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (None, Some(h)) => (avail_width.min(h * 4.0 / 3.0), h),
            (Some(w), None) => (w, w * 3.0 / 4.0),
            (None, None) => (avail_width, DEFAULT_IMAGE_HEIGHT_PX),
        };
        if w > avail_width && w > 0.0 {
            (avail_width, h * avail_width / w)
        } else {
            (w, h)
        }
    }

    fn table_height(&self, table: &ContentNode, width: f64) -> f64 {
        let columns = table_column_count(table).max(1);
        let mut total = 2.0;
        for child in table.children() {
            match child.tag_name() {
                Some("caption") => total += self.flow_height_of(child, width, self.font_px),
                Some("tr") | Some("thead") | Some("tbody") | Some("tfoot") => {
                    total += self.row_group_height(child, columns, width);
                }
                _ => {}
            }
        }
        total
    }

    fn flow_height_of(&self, node: &ContentNode, width: f64, font_px: f64) -> f64 {
        match node.as_element() {
            Some(el) => self.flow_height(el, width, font_px),
            None => self.block_height(node, width, font_px),
        }
    }

    fn row_group_height(&self, node: &ContentNode, columns: usize, table_width: f64) -> f64 {
        if node.is_tag("tr") {
            return self.row_height(node, columns, table_width);
        }
        node.children()
            .iter()
            .filter(|child| child.is_tag("tr"))
            .map(|row| self.row_height(row, columns, table_width))
            .sum()
    }

    fn row_height(&self, row: &ContentNode, columns: usize, table_width: f64) -> f64 {
        let column_width = (table_width / columns as f64).max(1.0);
        let tallest = row
            .children()
            .iter()
            .filter(|cell| cell.is_tag("td") || cell.is_tag("th"))
            .map(|cell| {
                let span = cell
                    .attribute("colspan")
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(1)
                    .clamp(1, columns);
                let inner = (column_width * span as f64 - CELL_PADDING_PX * 2.0).max(1.0);
                self.flow_height_of(cell, inner, self.font_px)
                    .max(self.line_px(self.font_px))
            })
            .fold(0.0_f64, f64::max);
        tallest + CELL_PADDING_PX * 2.0 + 1.0
    }
}

fn heading_metrics(tag: &str) -> (f64, f64) {
    match tag {
        "h1" => (2.0, 0.67),
        "h2" => (1.5, 0.83),
        "h3" => (1.17, 1.0),
        "h4" => (1.0, 1.33),
        "h5" => (0.83, 1.67),
        _ => (0.67, 2.33),
    }
}

fn is_inline(node: &ContentNode) -> bool {
    match node {
        ContentNode::Text(_) => true,
        ContentNode::Element(el) => matches!(
            el.tag.as_str(),
            "a" | "abbr"
                | "b"
                | "bdi"
                | "bdo"
                | "br"
                | "cite"
                | "code"
                | "data"
                | "dfn"
                | "em"
                | "i"
                | "kbd"
                | "label"
                | "mark"
                | "q"
                | "s"
                | "samp"
                | "small"
                | "span"
                | "strong"
                | "sub"
                | "sup"
                | "time"
                | "u"
                | "var"
                | "font"
        ),
    }
}

fn chars_per_line(width: f64, font_px: f64, char_em: f64) -> usize {
    let advance = (font_px * char_em).max(0.1);
    ((width / advance).floor() as usize).max(1)
}

fn wrapped_line_count(text: &str, per_line: usize) -> usize {
    let mut lines = 0usize;
    let mut line_len = 0usize;
    for word in text.split_whitespace() {
        let len = word.chars().count();
        if line_len > 0 && line_len + 1 + len <= per_line {
            line_len += 1 + len;
            continue;
        }
        if line_len > 0 {
            lines += 1;
        }
        // Words longer than a line wrap mid-word.
        lines += (len.saturating_sub(1)) / per_line;
        line_len = len - (len.saturating_sub(1) / per_line) * per_line;
    }
    if line_len > 0 {
        lines += 1;
    }
    lines
}

fn parse_px(raw: &str) -> Option<f64> {
    let raw = raw.trim().trim_end_matches("px").trim();
    let value = raw.parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

fn row_cell_count(node: &ContentNode) -> usize {
    let row = if node.is_tag("tr") {
        Some(node)
    } else {
        node.children().iter().find(|child| child.is_tag("tr"))
    };
    row.map(|row| {
        row.children()
            .iter()
            .filter(|cell| cell.is_tag("td") || cell.is_tag("th"))
            .map(|cell| {
                cell.attribute("colspan")
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(1)
                    .max(1)
            })
            .sum()
    })
    .unwrap_or(0)
}

fn table_column_count(table: &ContentNode) -> usize {
    table
        .children()
        .iter()
        .filter(|child| {
            child.is_tag("tr") || child.is_tag("thead") || child.is_tag("tbody") || child.is_tag("tfoot")
        })
        .map(row_cell_count)
        .max()
        .unwrap_or(0)
}
