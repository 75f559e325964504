use cc_domain::Memory;

/// `title` if non-empty, else the first 80 characters of `content`
/// (char-boundary safe, never bytes).
pub fn label_for(memory: &Memory) -> String {
    match &memory.title {
        Some(t) if !t.is_empty() => t.clone(),
        _ => memory.content.chars().take(80).collect(),
    }
}

/// `- [<YYYY-MM-DD>] <label>: <content>\n`
pub fn format_text_bullet(memory: &Memory) -> String {
    let date = memory.created_at.format("%Y-%m-%d");
    format!("- [{date}] {}: {}\n", label_for(memory), memory.content)
}

/// `## <TypeTitle>s\n`, e.g. `## Decisions`.
pub fn format_group_header(kind: cc_domain::MemoryType) -> String {
    format!("## {}\n", kind.title_plural())
}

/// `T=<type>;D=<YYYY-MM-DD>;C=<escaped content>`, no trailing newline.
pub fn format_toon_line(memory: &Memory) -> String {
    let date = memory.created_at.format("%Y-%m-%d");
    format!("T={};D={date};C={}", memory.kind.as_str(), escape_toon(&memory.content))
}

fn escape_toon(content: &str) -> String {
    content.replace(';', "\\;").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toon_escapes_semicolons_and_newlines() {
        assert_eq!(escape_toon("a;b\nc"), "a\\;b\\nc");
    }
}
