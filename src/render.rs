use crate::extract::CONTENT_ROOT_CLASS;
use crate::page_data::PageData;
use crate::types::{PageGeometry, Typography};

pub trait PageRenderer {
    fn render_page(&self, page: &PageData) -> String;

    fn render_document(&self, pages: &[PageData], styles: &[String]) -> String {
        let mut out = String::new();
        for style in styles {
            out.push_str("<style>");
            out.push_str(style);
            out.push_str("</style>\n");
        }
        for page in pages {
            out.push_str(&self.render_page(page));
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct HtmlPageRenderer {
    geometry: PageGeometry,
    typography: Typography,
    standalone: bool,
    page_numbers: bool,
}

impl HtmlPageRenderer {
    pub fn new(geometry: PageGeometry, typography: Typography) -> Self {
        Self {
            geometry,
            typography,
            standalone: true,
            page_numbers: true,
        }
    }

    pub fn standalone(mut self, enabled: bool) -> Self {
        self.standalone = enabled;
        self
    }

    pub fn page_numbers(mut self, enabled: bool) -> Self {
        self.page_numbers = enabled;
        self
    }

    pub fn page_css(&self) -> String {
        let g = &self.geometry;
        format!(
            "@page {{ size: {w}mm {h}mm; margin: 0; }}\n\
             body {{ margin: 0; }}\n\
             .page {{ position: relative; box-sizing: border-box; width: {w}mm; height: {h}mm; padding: {m}mm; overflow: hidden; page-break-after: always; break-after: page; }}\n\
             .page:last-child {{ page-break-after: auto; break-after: auto; }}\n\
             .page > .{root} {{ width: 100%; margin: 0; padding: 0; max-width: 100%; overflow-wrap: break-word; font-family: {family}; font-size: {size}pt; line-height: {lh}; }}\n\
             .page-number {{ position: absolute; bottom: {m}mm; right: {m}mm; font-size: 9px; color: #666; font-family: Arial, sans-serif; }}\n",
            w = g.page_width_mm,
            h = g.page_height_mm,
            m = g.margin_mm,
            root = CONTENT_ROOT_CLASS,
            family = self.typography.font_family,
            size = self.typography.font_size_pt,
            lh = self.typography.line_height,
        )
    }
}

impl PageRenderer for HtmlPageRenderer {
    fn render_page(&self, page: &PageData) -> String {
        let mut out = format!(
            "<div class=\"page\" data-page-number=\"{}\"><div class=\"{}\">",
            page.page_number, CONTENT_ROOT_CLASS
        );
        for element in &page.elements {
            out.push_str(&element.to_html());
        }
        out.push_str("</div>");
        if self.page_numbers {
            out.push_str(&format!(
                "<div class=\"page-number\">Page {}</div>",
                page.page_number
            ));
        }
        out.push_str("</div>");
        out
    }

    fn render_document(&self, pages: &[PageData], styles: &[String]) -> String {
        let mut body = String::new();
        for page in pages {
            body.push_str(&self.render_page(page));
            body.push('\n');
        }
        if !self.standalone {
            let mut out = String::new();
            for style in styles {
                out.push_str(&format!("<style>{style}</style>\n"));
            }
            out.push_str(&body);
            return out;
        }
        let mut head = format!(
            "<meta charset=\"utf-8\">\n<style>\n{}</style>\n",
            self.page_css()
        );
        for style in styles {
            head.push_str(&format!("<style>{style}</style>\n"));
        }
        format!("<!DOCTYPE html>\n<html>\n<head>\n{head}</head>\n<body>\n{body}</body>\n</html>\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{RootMode, extract_content};
    use crate::node::ContentNode;

    fn page(number: usize, text: &str) -> PageData {
        PageData {
            page_number: number,
            elements: vec![
                ContentNode::element("p")
                    .with_child(ContentNode::text(text))
                    .into_node(),
            ],
            total_height: 10,
        }
    }

    #[test]
    fn page_markup_wraps_content_and_stamps_number() {
        let renderer = HtmlPageRenderer::new(PageGeometry::a4(), Typography::default());
        let html = renderer.render_page(&page(3, "a < b"));
        assert_eq!(
            html,
            "<div class=\"page\" data-page-number=\"3\"><div class=\"extracted-page-content\"><p>a &lt; b</p></div><div class=\"page-number\">Page 3</div></div>"
        );
    }

    #[test]
    fn standalone_document_carries_page_css_and_source_styles() {
        let renderer = HtmlPageRenderer::new(PageGeometry::a4(), Typography::default());
        let html = renderer.render_document(&[page(1, "x")], &["p { margin: 0 }".to_string()]);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("size: 210mm 297mm"));
        assert!(html.contains("padding: 6mm"));
        assert!(html.contains("<style>p { margin: 0 }</style>"));
    }

    #[test]
    fn fragment_output_has_no_document_shell() {
        let renderer = HtmlPageRenderer::new(PageGeometry::a4(), Typography::default())
            .standalone(false)
            .page_numbers(false);
        let html = renderer.render_document(&[page(1, "x"), page(2, "y")], &[]);
        assert!(!html.contains("<html>"));
        assert!(!html.contains("page-number"));
        assert_eq!(html.matches("class=\"page\"").count(), 2);
    }

    #[test]
    fn rendered_pages_reextract_to_the_same_stream() {
        let renderer = HtmlPageRenderer::new(PageGeometry::a4(), Typography::default());
        let pages = vec![page(1, "first"), page(2, "second")];
        let html = renderer.render_document(&pages, &[]);
        let content = extract_content(&html, RootMode::ContentContainer).expect("extract");
        assert_eq!(content.source_pages, 2);
        assert_eq!(content.root.text_content(), "firstsecond");
    }
}
