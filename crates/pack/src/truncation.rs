use uuid::Uuid;

/// One memory item, pre-rendered to its final on-the-wire text, awaiting
/// the byte-budget sweep.
pub struct Section {
    pub memory_id: Uuid,
    pub rendered: String,
    pub raw_chars: usize,
    pub included: bool,
}

/// Forward accumulate-then-cutoff sweep: items are kept in order as long as
/// they fit the remaining budget; the first item that doesn't fit, and
/// everything after it, is dropped whole (no partial-content truncation —
/// a dropped memory should never appear half-rendered in a pack).
///
/// Returns `true` if any item was dropped.
pub fn apply_byte_budget(sections: &mut [Section], max_bytes: usize) -> bool {
    let mut accumulated: usize = 0;
    let mut truncated = false;

    for section in sections.iter_mut() {
        if truncated {
            section.included = false;
            continue;
        }
        let len = section.rendered.len();
        if accumulated + len <= max_bytes {
            accumulated += len;
            section.included = true;
        } else {
            section.included = false;
            truncated = true;
        }
    }

    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(rendered: &str) -> Section {
        Section { memory_id: Uuid::nil(), rendered: rendered.to_string(), raw_chars: rendered.len(), included: false }
    }

    #[test]
    fn keeps_everything_under_budget() {
        let mut sections = vec![section("aaaa"), section("bbbb")];
        let truncated = apply_byte_budget(&mut sections, 100);
        assert!(!truncated);
        assert!(sections.iter().all(|s| s.included));
    }

    #[test]
    fn drops_the_first_item_that_overflows_and_everything_after() {
        let mut sections = vec![section("aaaa"), section("bbbbbb"), section("cc")];
        let truncated = apply_byte_budget(&mut sections, 6);
        assert!(truncated);
        assert!(sections[0].included);
        assert!(!sections[1].included);
        assert!(!sections[2].included);
    }
}
