use std::str::FromStr;

use cc_domain::{Error, Memory, MEMORY_TYPE_ORDER};
use serde::{Deserialize, Serialize};

use crate::injection;
use crate::report::{ItemReport, PackReport};
use crate::truncation::{self, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Text,
    Toon,
}

impl Default for Format {
    fn default() -> Self {
        Format::Text
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Format::Text),
            "toon" => Ok(Format::Toon),
            other => Err(Error::validation(format!("unknown pack format '{other}'"))),
        }
    }
}

/// Deterministic pack renderer. Pure function of `(items, format)` plus the
/// configured byte budget: identical inputs always produce byte-identical
/// output.
pub struct PackAssembler {
    pub max_pack_bytes: usize,
}

impl PackAssembler {
    pub fn new(max_pack_bytes: usize) -> Self {
        Self { max_pack_bytes }
    }

    /// `items` must already be in ranked order (RecallEngine's output). The
    /// `text` format regroups them by canonical type while preserving each
    /// group's relative ranked order; `toon` keeps ranked order as-is.
    pub fn assemble(&self, items: &[Memory], format: Format) -> (String, PackReport) {
        match format {
            Format::Text => self.assemble_text(items),
            Format::Toon => self.assemble_toon(items),
        }
    }

    fn assemble_text(&self, items: &[Memory]) -> (String, PackReport) {
        let ordered = canonical_order(items);

        let mut sections: Vec<Section> = Vec::with_capacity(ordered.len());
        let mut seen_kinds = std::collections::HashSet::new();
        for memory in &ordered {
            let is_first_of_group = seen_kinds.insert(memory.kind);
            let mut rendered = String::new();
            if is_first_of_group {
                if !sections.is_empty() {
                    rendered.push('\n');
                }
                rendered.push_str(&injection::format_group_header(memory.kind));
            }
            rendered.push_str(&injection::format_text_bullet(memory));
            sections.push(Section {
                memory_id: memory.id,
                raw_chars: rendered.len(),
                rendered,
                included: false,
            });
        }

        let truncated = truncation::apply_byte_budget(&mut sections, self.max_pack_bytes);
        render(sections, truncated, Format::Text)
    }

    fn assemble_toon(&self, items: &[Memory]) -> (String, PackReport) {
        let mut sections: Vec<Section> = items
            .iter()
            .map(|memory| Section {
                memory_id: memory.id,
                rendered: injection::format_toon_line(memory),
                raw_chars: 0,
                included: false,
            })
            .collect();
        for section in &mut sections {
            section.raw_chars = section.rendered.len();
        }

        let truncated = truncation::apply_byte_budget(&mut sections, self.max_pack_bytes);
        render(sections, truncated, Format::Toon)
    }
}

fn canonical_order(items: &[Memory]) -> Vec<Memory> {
    let mut out = Vec::with_capacity(items.len());
    for &kind in MEMORY_TYPE_ORDER.iter() {
        out.extend(items.iter().filter(|m| m.kind == kind).cloned());
    }
    out
}

fn render(sections: Vec<Section>, truncated: bool, format: Format) -> (String, PackReport) {
    let item_reports = sections
        .iter()
        .map(|s| ItemReport { memory_id: s.memory_id, included: s.included })
        .collect();

    let mut text = match format {
        Format::Text => sections.iter().filter(|s| s.included).map(|s| s.rendered.as_str()).collect::<String>(),
        Format::Toon => {
            let joined = sections
                .iter()
                .filter(|s| s.included)
                .map(|s| s.rendered.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            joined
        }
    };

    if format == Format::Toon && text.ends_with('\n') {
        text.pop();
    }

    let report = PackReport { items: item_reports, total_bytes: text.len(), truncated, format };
    (text, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_domain::{MemorySource, MemoryType};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn memory(kind: MemoryType, title: Option<&str>, content: &str) -> Memory {
        Memory {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            kind,
            source: MemorySource::Manual,
            title: title.map(|t| t.to_string()),
            content: content.to_string(),
            tags: vec![],
            metadata: BTreeMap::new(),
            content_hash: "h".into(),
            created_at: chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&chrono::Utc),
            created_by: Uuid::new_v4(),
            rank_score: None,
        }
    }

    #[test]
    fn text_groups_by_canonical_type_order_with_blank_line_between() {
        let items = vec![
            memory(MemoryType::Note, None, "a note"),
            memory(MemoryType::Decision, Some("Use Postgres"), "we use postgres"),
        ];
        let assembler = PackAssembler::new(32 * 1024);
        let (text, report) = assembler.assemble(&items, Format::Text);
        assert!(text.starts_with("## Decisions\n"));
        assert!(text.contains("## Notes\n"));
        assert!(text.find("## Decisions").unwrap() < text.find("## Notes").unwrap());
        assert!(text.ends_with('\n'));
        assert!(!report.truncated);
    }

    #[test]
    fn toon_has_no_headers_and_no_trailing_newline() {
        let items = vec![memory(MemoryType::Note, None, "a note")];
        let assembler = PackAssembler::new(32 * 1024);
        let (text, _report) = assembler.assemble(&items, Format::Toon);
        assert!(text.starts_with("T=note;D=2026-01-01;C="));
        assert!(!text.ends_with('\n'));
        assert!(!text.contains("##"));
    }

    #[test]
    fn tight_budget_drops_items_from_the_end_and_flags_truncated() {
        let items = vec![
            memory(MemoryType::Decision, None, "first decision with enough content to matter"),
            memory(MemoryType::Note, None, "a second item that will not fit in the tiny budget"),
        ];
        let assembler = PackAssembler::new(40);
        let (_text, report) = assembler.assemble(&items, Format::Text);
        assert!(report.truncated);
        assert!(report.items[0].included);
        assert!(!report.items[1].included);
    }
}
