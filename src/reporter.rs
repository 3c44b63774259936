use crate::types::{EventKind, Snapshot};

const SALES_HEADER: &str = "========[ sales ]========\n";
const BIDS_HEADER: &str = "========[ bids  ]========\n";

/// Full-state console summary accumulated over one poll cycle.
#[derive(Debug, Clone)]
pub struct ConsoleSummary {
    sales: String,
    bids: String,
}

impl Default for ConsoleSummary {
    fn default() -> Self {
        Self {
            sales: SALES_HEADER.to_string(),
            bids: BIDS_HEADER.to_string(),
        }
    }
}

impl ConsoleSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line per event in `snapshot`.
    pub fn add(&mut self, kind: EventKind, snapshot: &Snapshot) {
        let buf = match kind {
            EventKind::Bid => &mut self.bids,
            EventKind::Sale => &mut self.sales,
        };
        for event in snapshot {
            buf.push_str(&event.format_line(kind));
            buf.push('\n');
        }
    }

    pub fn text(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::Bid => &self.bids,
            EventKind::Sale => &self.sales,
        }
    }

    /// The enabled sections, sales first, each followed by a blank line.
    pub fn render(&self, sales: bool, bids: bool) -> String {
        let mut out = String::new();
        if sales {
            out.push_str(&self.sales);
            out.push('\n');
        }
        if bids {
            out.push_str(&self.bids);
            out.push('\n');
        }
        out
    }

    /// Print the enabled sections to stdout.
    pub fn print(&self, sales: bool, bids: bool) {
        let out = self.render(sales, bids);
        if !out.is_empty() {
            print!("{out}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::tests::snap;
    use crate::types::tests::{make_event, ts};

    #[test]
    fn empty_summary_has_headers_only() {
        let s = ConsoleSummary::new();
        assert_eq!(s.text(EventKind::Sale), SALES_HEADER);
        assert_eq!(s.text(EventKind::Bid), BIDS_HEADER);
    }

    #[test]
    fn lines_accumulate_per_kind_in_order() {
        let mut s = ConsoleSummary::new();
        s.add(
            EventKind::Bid,
            &snap(vec![
                make_event("2", ts(1, 0, 0), 1_000_000_000_000_000_000),
                make_event("1", ts(2, 0, 0), 500_000_000_000_000_000),
            ]),
        );
        s.add(EventKind::Bid, &snap(vec![make_event("9", ts(3, 0, 0), 1)]));

        let lines: Vec<&str> = s.text(EventKind::Bid).lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "[ BID @ 2021-10-01 01:00:00 ]\tToken #2\tfor\t1.0 WETH");
        assert_eq!(lines[2], "[ BID @ 2021-10-01 02:00:00 ]\tToken #1\tfor\t0.5 WETH");
        assert!(lines[3].contains("Token #9"));
        assert_eq!(s.text(EventKind::Sale), SALES_HEADER);
    }

    fn filled() -> ConsoleSummary {
        let mut s = ConsoleSummary::new();
        s.add(EventKind::Bid, &snap(vec![make_event("B", ts(1, 0, 0), 1)]));
        s.add(EventKind::Sale, &snap(vec![make_event("S", ts(2, 0, 0), 1)]));
        s
    }

    #[test]
    fn render_with_both_flags_off_is_empty() {
        assert_eq!(filled().render(false, false), "");
    }

    #[test]
    fn render_sales_only() {
        let s = filled();
        let out = s.render(true, false);
        assert_eq!(out, format!("{}\n", s.text(EventKind::Sale)));
        assert!(out.contains("Token #S"));
        assert!(!out.contains(BIDS_HEADER));
    }

    #[test]
    fn render_bids_only() {
        let s = filled();
        let out = s.render(false, true);
        assert_eq!(out, format!("{}\n", s.text(EventKind::Bid)));
        assert!(out.contains("Token #B"));
        assert!(!out.contains(SALES_HEADER));
    }

    #[test]
    fn render_both_puts_sales_before_bids() {
        let s = filled();
        let out = s.render(true, true);
        assert_eq!(
            out,
            format!("{}\n{}\n", s.text(EventKind::Sale), s.text(EventKind::Bid))
        );
        let sales_at = out.find(SALES_HEADER).unwrap();
        let bids_at = out.find(BIDS_HEADER).unwrap();
        assert!(sales_at < bids_at);
    }
}
