const MM_PER_INCH: f64 = 25.4;
const PT_PER_INCH: f64 = 72.0;
const FOLD_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_mm: f32,
    pub px_per_inch: f32,
    // Shrinks the printable height to absorb engine rounding and keep a bottom margin.
    pub capacity_scale: f32,
    pub content_width_px: u32,
    pub content_height_override_px: Option<u32>,
}

impl PageGeometry {
    pub fn a4() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 6.0,
            px_per_inch: 96.0,
            capacity_scale: 0.75,
            content_width_px: 753,
            content_height_override_px: None,
        }
    }

    pub fn content_height_mm(&self) -> f64 {
        (self.page_height_mm as f64 - self.margin_mm as f64 * 2.0).max(0.0)
    }

    pub fn content_height_px(&self) -> u32 {
        if let Some(px) = self.content_height_override_px {
            return px;
        }
        let px = self.content_height_mm() / MM_PER_INCH
            * self.px_per_inch as f64
            * self.capacity_scale as f64;
        px.floor().max(0.0) as u32
    }

    pub fn margin_px(&self) -> u32 {
        (self.margin_mm as f64 / MM_PER_INCH * self.px_per_inch as f64).round() as u32
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Typography {
    pub font_size_pt: f32,
    pub line_height: f32,
    pub font_family: String,
}

impl Typography {
    pub fn font_size_px(&self, px_per_inch: f32) -> f64 {
        self.font_size_pt as f64 * px_per_inch as f64 / PT_PER_INCH
    }
}

impl Default for Typography {
    fn default() -> Self {
        Self {
            font_size_pt: 11.0,
            line_height: 1.4,
            font_family: "Helvetica, Arial, sans-serif".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaginationConfig {
    pub effective_fraction: f32,
    pub decompose_factor: f32,
    pub oversize_factor: f32,
    pub tolerance_px: u32,
    pub solo_table_max_rows: usize,
    pub table_break_min_rows: usize,
    pub table_break_utilization: f32,
    pub lookahead_window: usize,
    pub fill_floor_px: u32,
}

impl PaginationConfig {
    pub const MAX_TOLERANCE_PX: u32 = 500;
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            effective_fraction: 0.95,
            decompose_factor: 1.5,
            oversize_factor: 2.0,
            tolerance_px: 123,
            solo_table_max_rows: 2,
            table_break_min_rows: 4,
            table_break_utilization: 0.4,
            lookahead_window: 10,
            fill_floor_px: 30,
        }
    }
}

// Thresholds folded to integers: `h > x` is `h > floor(x)`, `h >= x` is `h >= ceil(x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub capacity: u32,
    pub effective: u32,
    pub decompose_above: u32,
    pub oversize_above: u32,
    pub tolerance: u32,
    pub solo_table_max_rows: usize,
    pub table_break_min_rows: usize,
    pub table_break_height: u32,
    pub lookahead_window: usize,
    pub fill_floor: u32,
}

impl PageLimits {
    pub fn resolve(geometry: &PageGeometry, config: &PaginationConfig) -> Self {
        let capacity = geometry.content_height_px();
        // f32 factors carry ~1e-8 relative error; keep it from crossing an integer boundary.
        let floor_of = |factor: f32| (capacity as f64 * factor as f64 + FOLD_EPSILON).floor() as u32;
        let ceil_of = |factor: f32| (capacity as f64 * factor as f64 - FOLD_EPSILON).ceil() as u32;
        Self {
            capacity,
            effective: floor_of(config.effective_fraction),
            decompose_above: floor_of(config.decompose_factor),
            oversize_above: floor_of(config.oversize_factor),
            tolerance: config.tolerance_px,
            solo_table_max_rows: config.solo_table_max_rows,
            table_break_min_rows: config.table_break_min_rows,
            table_break_height: ceil_of(config.table_break_utilization),
            lookahead_window: config.lookahead_window,
            fill_floor: config.fill_floor_px,
        }
    }
}
