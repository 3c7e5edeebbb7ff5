use crate::page_data::PageData;
use crate::registry::RegistryEntry;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct PaginationTrace {
    inner: Arc<Mutex<TraceState>>,
}

struct TraceState {
    writer: BufWriter<File>,
    counters: HashMap<String, u64>,
}

impl PaginationTrace {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(TraceState {
                writer: BufWriter::new(file),
                counters: HashMap::new(),
            })),
        })
    }

    pub fn log_json(&self, json: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn registry_entry(&self, entry: &RegistryEntry) {
        let json = format!(
            "{{\"type\":\"registry.entry\",\"order\":{},\"tag\":\"{}\",\"class\":\"{}\",\"width\":{},\"height\":{},\"table\":{},\"preview\":\"{}\"}}",
            entry.order,
            json_escape(&entry.tag_name),
            json_escape(&entry.class_name),
            entry.width,
            entry.height,
            entry.is_table,
            json_escape(&entry.preview)
        );
        self.log_json(&json);
        self.increment("registry.entries", 1);
    }

    pub fn page_closed(&self, page: &PageData, capacity: u32, reason: &str) {
        let json = format!(
            "{{\"type\":\"pack.page\",\"page\":{},\"elements\":{},\"height\":{},\"capacity\":{},\"utilization\":{:.1},\"reason\":\"{}\"}}",
            page.page_number,
            page.elements.len(),
            page.total_height,
            capacity,
            page.utilization(capacity),
            json_escape(reason)
        );
        self.log_json(&json);
        self.increment("pack.pages", 1);
    }

    pub fn pack_decision(&self, kind: &str, order: usize, page: usize, height: u32) {
        let json = format!(
            "{{\"type\":\"pack.decision\",\"kind\":\"{}\",\"order\":{},\"page\":{},\"height\":{}}}",
            json_escape(kind),
            order,
            page,
            height
        );
        self.log_json(&json);
        self.increment(&format!("pack.{kind}"), 1);
    }

    pub fn table_split(&self, order: usize, rows: usize, fragments: usize) {
        let json = format!(
            "{{\"type\":\"table.split\",\"order\":{},\"rows\":{},\"fragments\":{}}}",
            order, rows, fragments
        );
        self.log_json(&json);
        self.increment("table.splits", 1);
    }

    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let mut counters: Vec<(String, u64)> = state.counters.drain().collect();
            counters.sort_by(|a, b| a.0.cmp(&b.0));
            let mut counts_json = String::from("{");
            for (idx, (key, value)) in counters.iter().enumerate() {
                if idx > 0 {
                    counts_json.push(',');
                }
                counts_json.push_str(&format!("\"{}\":{}", json_escape(key), value));
            }
            counts_json.push('}');
            let json = format!(
                "{{\"type\":\"trace.summary\",\"context\":\"{}\",\"counts\":{}}}",
                json_escape(context),
                counts_json
            );
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(ch),
        }
    }
    out
}
