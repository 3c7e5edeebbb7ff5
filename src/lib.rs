mod audit;
mod debug;
mod error;
mod extract;
mod measure;
mod node;
mod pack;
mod page_data;
mod registry;
mod render;
mod table;
mod types;

pub use audit::{AuditReport, WordCountVerdict, audit};
pub use debug::PaginationTrace;
pub use error::PaginatorError;
pub use extract::{CONTENT_ROOT_CLASS, ExtractedContent, RootMode, extract_content};
pub use measure::{
    Dimensions, HeuristicOracle, MeasurementOracle, MeasurementSurface, SurfaceId, SurfaceLayout,
    estimate,
};
pub use node::{ContentNode, ElementNode};
pub use pack::{PagePacker, SplitTable, TablePlacement};
pub use page_data::{PageData, utilization_report};
pub use registry::{Registry, RegistryBuilder, RegistryEntry, pageable_children};
pub use render::{HtmlPageRenderer, PageRenderer};
pub use table::{FRAGMENT_ATTR, TableParts, TableSplitter};
pub use types::{PageGeometry, PageLimits, PaginationConfig, Typography};

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

fn registry_table_enabled() -> bool {
    static FLAG: OnceLock<bool> = OnceLock::new();
    *FLAG.get_or_init(|| {
        std::env::var("HTML_PAGINATOR_REGISTRY_TABLE")
            .ok()
            .map(|v| {
                let v = v.trim();
                v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
            })
            .unwrap_or(false)
    })
}

#[derive(Debug, Clone)]
pub struct PaginationOutcome {
    pub registry: Registry,
    pub pages: Vec<PageData>,
    pub audit: AuditReport,
    pub html: String,
    pub source_pages: usize,
}

impl PaginationOutcome {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

pub struct Paginator {
    geometry: PageGeometry,
    typography: Typography,
    config: PaginationConfig,
    limits: PageLimits,
    root_mode: RootMode,
    renderer: HtmlPageRenderer,
    oracle: Box<dyn MeasurementOracle>,
    trace: Option<Arc<PaginationTrace>>,
}

impl Paginator {
    pub fn builder() -> PaginatorBuilder {
        PaginatorBuilder::new()
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn typography(&self) -> &Typography {
        &self.typography
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    pub fn limits(&self) -> &PageLimits {
        &self.limits
    }

    pub fn registry_layout(&self) -> SurfaceLayout {
        SurfaceLayout {
            content_width_px: self.geometry.content_width_px,
            padding_px: 0,
            px_per_inch: self.geometry.px_per_inch,
            typography: self.typography.clone(),
        }
    }

    pub fn fragment_layout(&self) -> SurfaceLayout {
        SurfaceLayout {
            padding_px: self.geometry.margin_px(),
            ..self.registry_layout()
        }
    }

    pub fn extract(&self, html: &str) -> Result<ExtractedContent, PaginatorError> {
        extract_content(html, self.root_mode)
    }

    pub fn build_registry(&self, root: &ContentNode) -> Result<Registry, PaginatorError> {
        let surface = MeasurementSurface::acquire(self.oracle.as_ref(), self.registry_layout())?;
        let registry = RegistryBuilder::new(self.limits.decompose_above)
            .with_trace(self.trace.as_deref())
            .build(root, &surface)?;
        if registry_table_enabled() {
            log::info!("element registry\n{}", registry.summary_table());
        }
        Ok(registry)
    }

    pub fn pack(&self, registry: &Registry) -> Result<Vec<PageData>, PaginatorError> {
        if registry.is_empty() {
            return Err(PaginatorError::NoContentRegistered);
        }
        let surface = MeasurementSurface::acquire(self.oracle.as_ref(), self.fragment_layout())?;
        let splitter = TableSplitter::new(&surface, self.limits);
        let pages = PagePacker::new(self.limits, &splitter)
            .with_trace(self.trace.as_deref())
            .pack(registry)?;
        for line in utilization_report(&pages, self.limits.capacity) {
            log::info!("{line}");
        }
        Ok(pages)
    }

    pub fn split_table(
        &self,
        table: &ContentNode,
        start_height: u32,
        start_page_number: usize,
    ) -> Result<Vec<PageData>, PaginatorError> {
        let surface = MeasurementSurface::acquire(self.oracle.as_ref(), self.fragment_layout())?;
        Ok(TableSplitter::new(&surface, self.limits).split(table, start_height, start_page_number))
    }

    pub fn render(&self, pages: &[PageData], styles: &[String]) -> String {
        self.renderer.render_document(pages, styles)
    }

    pub fn paginate_html(&self, html: &str) -> Result<PaginationOutcome, PaginatorError> {
        let extracted = self.extract(html)?;
        let source_words = extracted.root.word_count();
        let registry = self.build_registry(&extracted.root)?;
        log::info!(
            "registered {} elements ({}px measured, {}px per page)",
            registry.len(),
            registry.total_height(),
            self.limits.capacity
        );
        let pages = self.pack(&registry)?;
        let audit = audit(&registry, &pages, source_words, &self.limits);
        let html = self.render(&pages, &extracted.styles);
        log::info!("created {} pages; {}", pages.len(), audit.verdict);

        if let Some(trace) = self.trace.as_deref() {
            trace.log_json(&format!(
                "{{\"type\":\"paginate.summary\",\"pages\":{},\"entries\":{},\"source_words\":{},\"paginated_words\":{},\"order_preserved\":{},\"clean\":{}}}",
                pages.len(),
                registry.len(),
                audit.source_words,
                audit.paginated_words,
                audit.order_preserved,
                audit.is_clean()
            ));
            trace.emit_summary("paginate_html");
            trace.flush();
        }

        Ok(PaginationOutcome {
            registry,
            pages,
            audit,
            html,
            source_pages: extracted.source_pages,
        })
    }
}

pub struct PaginatorBuilder {
    geometry: PageGeometry,
    typography: Typography,
    config: PaginationConfig,
    root_mode: RootMode,
    standalone: bool,
    page_numbers: bool,
    oracle: Option<Box<dyn MeasurementOracle>>,
    debug_path: Option<PathBuf>,
}

impl PaginatorBuilder {
    pub fn new() -> Self {
        Self {
            geometry: PageGeometry::a4(),
            typography: Typography::default(),
            config: PaginationConfig::default(),
            root_mode: RootMode::default(),
            standalone: true,
            page_numbers: true,
            oracle: None,
            debug_path: None,
        }
    }

    pub fn geometry(mut self, geometry: PageGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn typography(mut self, typography: Typography) -> Self {
        self.typography = typography;
        self
    }

    pub fn config(mut self, config: PaginationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn page_size_mm(mut self, width: f32, height: f32) -> Self {
        self.geometry.page_width_mm = width;
        self.geometry.page_height_mm = height;
        self
    }

    pub fn margin_mm(mut self, margin: f32) -> Self {
        self.geometry.margin_mm = margin;
        self
    }

    pub fn content_width_px(mut self, width: u32) -> Self {
        self.geometry.content_width_px = width;
        self
    }

    pub fn content_height_px(mut self, height: u32) -> Self {
        self.geometry.content_height_override_px = Some(height);
        self
    }

    // Clamped to 0..=500px.
    pub fn pagination_tolerance(mut self, px: i64) -> Self {
        let clamped = px.clamp(0, PaginationConfig::MAX_TOLERANCE_PX as i64) as u32;
        if clamped as i64 != px {
            log::warn!("pagination tolerance {px}px clamped to {clamped}px");
        }
        self.config.tolerance_px = clamped;
        self
    }

    pub fn lookahead_window(mut self, entries: usize) -> Self {
        self.config.lookahead_window = entries;
        self
    }

    pub fn oracle(mut self, oracle: impl MeasurementOracle + 'static) -> Self {
        self.oracle = Some(Box::new(oracle));
        self
    }

    pub fn require_content_root(mut self, required: bool) -> Self {
        self.root_mode = if required {
            RootMode::ContentContainer
        } else {
            RootMode::ContentContainerOrBody
        };
        self
    }

    pub fn standalone(mut self, enabled: bool) -> Self {
        self.standalone = enabled;
        self
    }

    pub fn page_numbers(mut self, enabled: bool) -> Self {
        self.page_numbers = enabled;
        self
    }

    // Write a JSONL trace of registry entries and packing decisions.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Paginator, PaginatorError> {
        let config = &self.config;
        if !(config.effective_fraction > 0.0 && config.effective_fraction <= 1.0) {
            return Err(PaginatorError::InvalidConfiguration(format!(
                "effective_fraction must be in (0, 1], got {}",
                config.effective_fraction
            )));
        }
        if !(config.table_break_utilization > 0.0 && config.table_break_utilization <= 1.0) {
            return Err(PaginatorError::InvalidConfiguration(format!(
                "table_break_utilization must be in (0, 1], got {}",
                config.table_break_utilization
            )));
        }
        if !(config.decompose_factor.is_finite() && config.decompose_factor >= 1.0) {
            return Err(PaginatorError::InvalidConfiguration(
                "decompose_factor must be >= 1".to_string(),
            ));
        }
        if !(config.oversize_factor.is_finite() && config.oversize_factor >= 1.0) {
            return Err(PaginatorError::InvalidConfiguration(
                "oversize_factor must be >= 1".to_string(),
            ));
        }
        if config.tolerance_px > PaginationConfig::MAX_TOLERANCE_PX {
            return Err(PaginatorError::InvalidConfiguration(format!(
                "tolerance_px must be <= {}",
                PaginationConfig::MAX_TOLERANCE_PX
            )));
        }
        if config.lookahead_window == 0 {
            return Err(PaginatorError::InvalidConfiguration(
                "lookahead_window must be >= 1".to_string(),
            ));
        }
        if self.geometry.content_width_px == 0 {
            return Err(PaginatorError::InvalidConfiguration(
                "content_width_px must be > 0".to_string(),
            ));
        }
        if !(self.typography.font_size_pt > 0.0 && self.typography.line_height > 0.0) {
            return Err(PaginatorError::InvalidConfiguration(
                "font size and line height must be > 0".to_string(),
            ));
        }
        let limits = PageLimits::resolve(&self.geometry, &self.config);
        if limits.capacity == 0 {
            return Err(PaginatorError::InvalidConfiguration(
                "page capacity resolves to 0px".to_string(),
            ));
        }
        log::debug!("page limits: {limits:?}");

        let trace = if let Some(path) = self.debug_path {
            Some(Arc::new(PaginationTrace::new(path)?))
        } else {
            None
        };
        let oracle = self
            .oracle
            .unwrap_or_else(|| Box::new(HeuristicOracle::new()));
        let renderer = HtmlPageRenderer::new(self.geometry, self.typography.clone())
            .standalone(self.standalone)
            .page_numbers(self.page_numbers);
        Ok(Paginator {
            geometry: self.geometry,
            typography: self.typography,
            config: self.config,
            limits,
            root_mode: self.root_mode,
            renderer,
            oracle,
            trace,
        })
    }
}

impl Default for PaginatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::testing::FixedOracle;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_log_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "html_paginator_{tag}_{}_{}.jsonl",
            std::process::id(),
            nanos
        ))
    }

    fn fixed_paginator() -> Paginator {
        Paginator::builder()
            .content_height_px(810)
            .oracle(FixedOracle::new())
            .build()
            .expect("paginator")
    }

    #[test]
    fn tolerance_is_clamped() {
        let paginator = Paginator::builder()
            .pagination_tolerance(900)
            .build()
            .expect("paginator");
        assert_eq!(paginator.limits().tolerance, 500);
        let paginator = Paginator::builder()
            .pagination_tolerance(-5)
            .build()
            .expect("paginator");
        assert_eq!(paginator.limits().tolerance, 0);
    }

    #[test]
    fn invalid_fractions_are_rejected() {
        let err = match Paginator::builder()
            .config(PaginationConfig {
                effective_fraction: 1.5,
                ..PaginationConfig::default()
            })
            .build()
        {
            Ok(_) => panic!("effective fraction above 1 must fail"),
            Err(err) => err,
        };
        assert!(matches!(err, PaginatorError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("effective_fraction"));

        let err = match Paginator::builder().lookahead_window(0).build() {
            Ok(_) => panic!("empty lookahead window must fail"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("lookahead_window"));

        let err = match Paginator::builder().content_height_px(0).build() {
            Ok(_) => panic!("zero capacity must fail"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn default_limits_match_a4() {
        let paginator = Paginator::builder().build().expect("paginator");
        assert_eq!(paginator.limits().capacity, 807);
        assert_eq!(paginator.limits().tolerance, 123);
        assert_eq!(paginator.fragment_layout().padding_px, 23);
        assert_eq!(paginator.registry_layout().padding_px, 0);
    }

    #[test]
    fn letter_paper_shrinks_capacity() {
        let paginator = Paginator::builder()
            .page_size_mm(215.9, 279.4)
            .build()
            .expect("paginator");
        assert_eq!(paginator.limits().capacity, 757);
        assert_eq!(paginator.geometry().page_width_mm, 215.9);
    }

    #[test]
    fn split_table_numbers_fragments_from_start_page() {
        use crate::measure::testing::table;

        let pages = fixed_paginator()
            .split_table(&table(Some(40), &[50; 8], true), 0, 3)
            .expect("split");
        let numbers: Vec<usize> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![3, 4]);
        let heights: Vec<u32> = pages.iter().map(|p| p.total_height).collect();
        assert_eq!(heights, vec![340, 140]);
    }

    #[test]
    fn paginates_fixed_height_document() {
        let blocks: String = (1..=5)
            .map(|n| format!("<p data-h=\"200\">block {n}</p>"))
            .collect();
        let html = format!(
            "<html><body><div class=\"extracted-page-content\">{blocks}</div></body></html>"
        );
        let outcome = fixed_paginator().paginate_html(&html).expect("paginate");
        assert_eq!(outcome.registry.len(), 5);
        assert_eq!(outcome.page_count(), 2);
        assert_eq!(outcome.pages[0].elements.len(), 4);
        assert!(outcome.audit.is_clean(), "{:?}", outcome.audit);
        assert_eq!(
            outcome.audit.verdict,
            WordCountVerdict::Verified { words: 10 }
        );
        assert_eq!(outcome.html.matches("class=\"page\"").count(), 2);
        assert!(outcome.html.contains("Page 2"));
    }

    #[test]
    fn empty_content_is_a_precondition_failure() {
        let err = match fixed_paginator()
            .paginate_html("<div class=\"extracted-page-content\">  </div>")
        {
            Ok(_) => panic!("empty content must not paginate"),
            Err(err) => err,
        };
        assert!(matches!(err, PaginatorError::NoContentRegistered));
    }

    #[test]
    fn missing_root_is_reported_when_required() {
        let paginator = Paginator::builder()
            .require_content_root(true)
            .oracle(FixedOracle::new())
            .build()
            .expect("paginator");
        let err = match paginator.paginate_html("<p>loose</p>") {
            Ok(_) => panic!("missing root must fail"),
            Err(err) => err,
        };
        assert!(matches!(err, PaginatorError::MissingContentRoot));
    }

    #[test]
    fn repaginating_output_is_stable() {
        let rows: String = (1..=20)
            .map(|n| format!("<tr data-h=\"100\"><td>row {n}</td></tr>"))
            .collect();
        let html = format!(
            "<div class=\"extracted-page-content\"><p data-h=\"100\">intro</p><table><thead><tr data-h=\"40\"><th>Head</th></tr></thead><tbody>{rows}</tbody></table><p data-h=\"50\">outro</p></div>"
        );
        let paginator = fixed_paginator();
        let first = paginator.paginate_html(&html).expect("first run");
        assert!(first.page_count() >= 4);
        assert!(first.audit.order_preserved);
        assert!(matches!(
            first.audit.verdict,
            WordCountVerdict::RepeatedHeaders { .. }
        ));

        let second = paginator.paginate_html(&first.html).expect("second run");
        assert_eq!(second.source_pages, first.page_count());
        assert_eq!(second.registry.len(), 3, "fragments merge back into one table");
        assert_eq!(second.page_count(), first.page_count());
    }

    #[test]
    fn debug_log_writes_decisions_and_summary() {
        let path = temp_log_path("paginate");
        let paginator = Paginator::builder()
            .content_height_px(810)
            .oracle(FixedOracle::new())
            .debug_log(&path)
            .build()
            .expect("paginator");
        paginator
            .paginate_html("<div class=\"extracted-page-content\"><p data-h=\"100\">a</p><p data-h=\"700\">b</p></div>")
            .expect("paginate");
        let contents = std::fs::read_to_string(&path).expect("read trace");
        let _ = std::fs::remove_file(&path);
        assert!(contents.contains("\"type\":\"registry.entry\""));
        assert!(contents.contains("\"kind\":\"place\""));
        assert!(contents.contains("\"type\":\"pack.page\""));
        assert!(contents.contains("\"type\":\"paginate.summary\""));
        assert!(contents.contains("\"type\":\"trace.summary\""));
    }
}
