use crate::node::ContentNode;
use crate::page_data::PageData;
use crate::registry::Registry;
use crate::table::TableParts;
use crate::types::PageLimits;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

const WORDS_VERIFIED_SHARE: f64 = 0.05;
const WORDS_REPEATED_HEADER_SHARE: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordCountVerdict {
    Verified { words: usize },
    RepeatedHeaders { words: usize, extra: usize },
    Mismatch { source: usize, paginated: usize },
}

impl WordCountVerdict {
    pub fn classify(source: usize, paginated: usize) -> Self {
        let diff = paginated as i64 - source as i64;
        let base = source as f64;
        if (diff.unsigned_abs() as f64) <= base * WORDS_VERIFIED_SHARE {
            WordCountVerdict::Verified { words: source }
        } else if diff > 0 && (diff as f64) < base * WORDS_REPEATED_HEADER_SHARE {
            WordCountVerdict::RepeatedHeaders {
                words: source,
                extra: diff as usize,
            }
        } else {
            WordCountVerdict::Mismatch { source, paginated }
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, WordCountVerdict::Mismatch { .. })
    }
}

impl fmt::Display for WordCountVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WordCountVerdict::Verified { words } => write!(f, "word count verified: {words} words"),
            WordCountVerdict::RepeatedHeaders { words, extra } => {
                write!(f, "word count: {words} + {extra} repeated headers")
            }
            WordCountVerdict::Mismatch { source, paginated } => {
                let diff = *paginated as i64 - *source as i64;
                write!(
                    f,
                    "word count mismatch: source={source}, paginated={paginated} ({diff:+})"
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub source_words: usize,
    pub paginated_words: usize,
    pub verdict: WordCountVerdict,
    pub order_preserved: bool,
    pub missing: Vec<usize>,
    pub duplicated: Vec<usize>,
    pub over_capacity: Vec<usize>,
    pub oversized: Vec<usize>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.order_preserved
            && self.missing.is_empty()
            && self.duplicated.is_empty()
            && self.over_capacity.is_empty()
            && self.verdict.is_ok()
    }
}

pub fn audit(
    registry: &Registry,
    pages: &[PageData],
    source_words: usize,
    limits: &PageLimits,
) -> AuditReport {
    let mut expected: Vec<(usize, String)> = Vec::new();
    for entry in registry.iter() {
        for print in fingerprints(&entry.element) {
            expected.push((entry.order, print));
        }
    }
    let actual: Vec<String> = pages
        .iter()
        .flat_map(|page| page.elements.iter())
        .flat_map(fingerprints)
        .collect();

    let order_preserved = expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual.iter())
            .all(|((_, want), got)| want == got);

    let mut balance: HashMap<&str, i64> = HashMap::new();
    for (_, print) in &expected {
        *balance.entry(print.as_str()).or_insert(0) += 1;
    }
    for print in &actual {
        *balance.entry(print.as_str()).or_insert(0) -= 1;
    }
    let mut missing = Vec::new();
    let mut duplicated = Vec::new();
    for (order, print) in &expected {
        let count = balance.get(print.as_str()).copied().unwrap_or(0);
        if count > 0 && missing.last() != Some(order) {
            missing.push(*order);
        }
        if count < 0 && duplicated.last() != Some(order) {
            duplicated.push(*order);
        }
    }

    let bound = limits.effective.saturating_add(limits.tolerance);
    let mut over_capacity = Vec::new();
    let mut oversized = Vec::new();
    for page in pages {
        if page.total_height <= bound {
            continue;
        }
        if page.elements.len() > 1 {
            over_capacity.push(page.page_number);
        } else {
            oversized.push(page.page_number);
        }
    }

    let paginated_words = pages.iter().map(PageData::word_count).sum();
    let verdict = WordCountVerdict::classify(source_words, paginated_words);
    match verdict {
        WordCountVerdict::Mismatch { .. } => log::warn!("{verdict}"),
        _ => log::info!("{verdict}"),
    }
    if !missing.is_empty() || !duplicated.is_empty() || !order_preserved {
        log::warn!(
            "content audit failed: missing={:?} duplicated={:?} order_preserved={}",
            missing,
            duplicated,
            order_preserved
        );
    }

    AuditReport {
        source_words,
        paginated_words,
        verdict,
        order_preserved,
        missing,
        duplicated,
        over_capacity,
        oversized,
    }
}

// Data rows for tables, so split fragments compare equal to their source.
fn fingerprints(node: &ContentNode) -> Vec<String> {
    if node.is_table() {
        let rows = TableParts::of(node).rows;
        if !rows.is_empty() {
            return rows
                .iter()
                .map(|row| hex_sha256(row.to_html().as_bytes()))
                .collect();
        }
    }
    vec![hex_sha256(node.to_html().as_bytes())]
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::Dimensions;
    use crate::measure::testing::{FixedOracle, block, table};
    use crate::types::{PageGeometry, PaginationConfig};

    fn limits() -> PageLimits {
        let geometry = PageGeometry {
            content_height_override_px: Some(810),
            ..PageGeometry::a4()
        };
        PageLimits::resolve(&geometry, &PaginationConfig::default())
    }

    fn registry_of(nodes: &[ContentNode]) -> Registry {
        Registry::from_measured(nodes.iter().map(|node| {
            let height = FixedOracle::height_of(node);
            (node.clone(), Dimensions { width: 753, height })
        }))
    }

    fn page(number: usize, elements: Vec<ContentNode>) -> PageData {
        let total_height = elements.iter().map(FixedOracle::height_of).sum();
        PageData {
            page_number: number,
            elements,
            total_height,
        }
    }

    #[test]
    fn word_count_thresholds() {
        assert_eq!(
            WordCountVerdict::classify(100, 104),
            WordCountVerdict::Verified { words: 100 }
        );
        assert_eq!(
            WordCountVerdict::classify(100, 95),
            WordCountVerdict::Verified { words: 100 }
        );
        assert_eq!(
            WordCountVerdict::classify(100, 110),
            WordCountVerdict::RepeatedHeaders {
                words: 100,
                extra: 10
            }
        );
        assert!(!WordCountVerdict::classify(100, 115).is_ok());
        assert!(!WordCountVerdict::classify(100, 80).is_ok());
        assert_eq!(
            WordCountVerdict::classify(100, 80).to_string(),
            "word count mismatch: source=100, paginated=80 (-20)"
        );
    }

    #[test]
    fn split_table_rows_count_as_their_source() {
        let nodes = vec![block("p", 100), table(Some(40), &[100, 100, 100, 100], true)];
        let registry = registry_of(&nodes);
        let parts = TableParts::of(&nodes[1]);
        let first = parts.build_fragment(&nodes[1], &parts.rows[..2], 1);
        let second = parts.build_fragment(&nodes[1], &parts.rows[2..], 2);
        let pages = vec![
            page(1, vec![nodes[0].clone(), first]),
            page(2, vec![second]),
        ];
        let report = audit(&registry, &pages, 7, &limits());
        assert!(report.order_preserved);
        assert!(report.missing.is_empty());
        assert!(report.duplicated.is_empty());
        assert!(report.over_capacity.is_empty());
    }

    #[test]
    fn reports_missing_duplicated_and_reordered_content() {
        let nodes = vec![block("p", 10), block("h2", 20), block("p", 30)];
        let registry = registry_of(&nodes);

        let dropped = vec![page(1, vec![nodes[0].clone(), nodes[2].clone()])];
        let report = audit(&registry, &dropped, 0, &limits());
        assert_eq!(report.missing, vec![2]);
        assert!(!report.order_preserved);

        let doubled = vec![page(1, nodes.clone()), page(2, vec![nodes[1].clone()])];
        let report = audit(&registry, &doubled, 0, &limits());
        assert_eq!(report.duplicated, vec![2]);

        let swapped = vec![page(1, vec![nodes[1].clone(), nodes[0].clone(), nodes[2].clone()])];
        let report = audit(&registry, &swapped, 0, &limits());
        assert!(report.missing.is_empty() && report.duplicated.is_empty());
        assert!(!report.order_preserved);
        assert!(!report.is_clean());
    }

    #[test]
    fn separates_overfull_pages_from_lone_oversized_entries() {
        let nodes = vec![block("p", 500), block("p", 500), block("img", 2000)];
        let registry = registry_of(&nodes);
        let pages = vec![
            page(1, vec![nodes[0].clone(), nodes[1].clone()]),
            page(2, vec![nodes[2].clone()]),
        ];
        let report = audit(&registry, &pages, 6, &limits());
        assert_eq!(report.over_capacity, vec![1]);
        assert_eq!(report.oversized, vec![2]);
    }
}
