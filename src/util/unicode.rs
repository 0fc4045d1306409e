use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const ELLIPSIS: char = '\u{2026}';

/// Display width in terminal cells. Control characters count as zero.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate to at most `max_cells` terminal cells, ending in `…` when cut.
/// Never splits a grapheme cluster, so CJK names and emoji stay intact.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if max_cells == 0 {
        return String::new();
    }
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    if max_cells == 1 {
        return ELLIPSIS.to_string();
    }
    let budget = max_cells - 1;
    let mut width = 0;
    let mut out = String::new();
    for g in s.graphemes(true) {
        let gw = UnicodeWidthStr::width(g);
        if width + gw > budget {
            break;
        }
        width += gw;
        out.push_str(g);
    }
    out.push(ELLIPSIS);
    out
}

/// Right-pad with spaces to `cells` terminal cells (no-op if already wider)
pub fn pad_to_width(s: &str, cells: usize) -> String {
    let w = display_width(s);
    if w >= cells {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + cells - w);
    out.push_str(s);
    out.extend(std::iter::repeat_n(' ', cells - w));
    out
}

/// First `n` characters of an identifier, for compact display
pub fn short_id(id: &str, n: usize) -> &str {
    match id.char_indices().nth(n) {
        Some((i, _)) => &id[..i],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── display_width ──────────────────────────────────────────────

    #[test]
    fn width_of_ascii_and_cjk() {
        assert_eq!(display_width("milk"), 4);
        assert_eq!(display_width("牛乳"), 4);
        assert_eq!(display_width("牛乳2本"), 7);
    }

    #[test]
    fn width_ignores_combining_marks() {
        assert_eq!(display_width("cafe\u{0301}"), 4);
    }

    // ── truncate_to_width ──────────────────────────────────────────

    #[test]
    fn truncate_short_string_untouched() {
        assert_eq!(truncate_to_width("eggs", 10), "eggs");
        assert_eq!(truncate_to_width("eggs", 4), "eggs");
    }

    #[test]
    fn truncate_long_url() {
        assert_eq!(
            truncate_to_width("https://shop.example/item/12345", 12),
            "https://sho…"
        );
    }

    #[test]
    fn truncate_never_splits_wide_chars() {
        // 3 cells of budget fit one 2-cell char, not two
        assert_eq!(truncate_to_width("洗濯洗剤", 4), "洗…");
    }

    #[test]
    fn truncate_degenerate_widths() {
        assert_eq!(truncate_to_width("abc", 0), "");
        assert_eq!(truncate_to_width("abc", 1), "…");
    }

    // ── padding / ids ──────────────────────────────────────────────

    #[test]
    fn pad_counts_cells_not_bytes() {
        assert_eq!(pad_to_width("牛乳", 6), "牛乳  ");
        assert_eq!(pad_to_width("toolong", 3), "toolong");
    }

    #[test]
    fn short_id_handles_short_and_multibyte_ids() {
        assert_eq!(short_id("3f2a9c1e-0000-4000", 8), "3f2a9c1e");
        assert_eq!(short_id("abc", 8), "abc");
        assert_eq!(short_id("ééééééééé", 2), "éé");
    }
}
