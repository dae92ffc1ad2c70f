//! Terminal renderings of the ticket collection.
//!
//! Every view is a pure function from tickets to a `String`; the `tickets`
//! command prints the result. Styling goes through `console`, which drops
//! the escape codes when stdout is not a terminal.

use std::collections::BTreeMap;

use console::{Emoji, style};

use desk_common::{BusinessService, Category, Priority, TicketStatus};

use super::source::{DeskComment, DeskTicket};

static TICKET: Emoji<'_, '_> = Emoji("🎫 ", "");
static LOCK: Emoji<'_, '_> = Emoji("🔒 ", "[internal] ");
static CHART: Emoji<'_, '_> = Emoji("📊 ", "");

const RECENT: usize = 5;
const TOP_AUTHORS: usize = 5;

fn status_text(status: TicketStatus) -> String {
    let text = status.as_str();
    match status {
        TicketStatus::Open => style(text).yellow().to_string(),
        TicketStatus::InProgress => style(text).cyan().to_string(),
        TicketStatus::Waiting => style(text).magenta().to_string(),
        TicketStatus::Resolved | TicketStatus::Closed => style(text).green().to_string(),
    }
}

fn priority_text(priority: Option<Priority>) -> String {
    match priority {
        Some(p @ Priority::P1) => style(format!("{} {}", p, p.label())).red().bold().to_string(),
        Some(p @ Priority::P2) => style(format!("{} {}", p, p.label())).red().to_string(),
        Some(p) => format!("{} {}", p, p.label()),
        None => style("--").dim().to_string(),
    }
}

fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "--".to_string(), |v| v.to_string())
}

/// One line per ticket: key, priority, status, title.
fn ticket_line(t: &DeskTicket) -> String {
    format!(
        "  {:<10} {:<14} {:<12} {}",
        style(short_key(&t.key)).dim(),
        priority_text(t.priority),
        status_text(t.status),
        t.title
    )
}

/// First eight characters of a UUID key; issue numbers are kept whole.
pub fn short_key(key: &str) -> &str {
    key.get(..8).unwrap_or(key)
}

fn most_recent(tickets: &[DeskTicket], n: usize) -> Vec<&DeskTicket> {
    let mut sorted: Vec<&DeskTicket> = tickets.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.truncate(n);
    sorted
}

fn is_finished(status: TicketStatus) -> bool {
    matches!(status, TicketStatus::Resolved | TicketStatus::Closed)
}

// ── Dashboard ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub all: usize,
    pub open: usize,
    pub resolved: usize,
    pub critical: usize,
}

pub fn totals(tickets: &[DeskTicket]) -> Totals {
    Totals {
        all: tickets.len(),
        open: tickets.iter().filter(|t| t.status.is_active()).count(),
        resolved: tickets.iter().filter(|t| is_finished(t.status)).count(),
        critical: tickets
            .iter()
            .filter(|t| t.priority == Some(Priority::P1))
            .count(),
    }
}

pub fn dashboard(tickets: &[DeskTicket], source: &str) -> String {
    let totals = totals(tickets);
    let mut out = format!(
        "{}{} {}\n\n",
        TICKET,
        style("Service Desk").bold(),
        style(format!("({})", source)).dim()
    );
    out.push_str(&format!("  Total tickets   {}\n", style(totals.all).bold()));
    out.push_str(&format!("  Open            {}\n", style(totals.open).yellow()));
    out.push_str(&format!("  Resolved        {}\n", style(totals.resolved).green()));
    out.push_str(&format!("  Critical (P1)   {}\n", style(totals.critical).red()));

    out.push_str(&format!("\n{}\n", style("Recent tickets").bold()));
    let recent = most_recent(tickets, RECENT);
    if recent.is_empty() {
        out.push_str(&format!("  {}\n", style("No tickets yet").dim()));
    }
    for t in recent {
        out.push_str(&ticket_line(t));
        out.push('\n');
    }
    out
}

// ── Board ────────────────────────────────────────────────────────────

/// Board filters. `label` matches any label, service or category name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardFilter {
    pub priority: Option<Priority>,
    pub label: Option<String>,
}

impl BoardFilter {
    pub fn matches(&self, t: &DeskTicket) -> bool {
        let priority_ok = self.priority.is_none_or(|p| t.priority == Some(p));
        let label_ok = self.label.as_deref().is_none_or(|label| {
            t.labels.iter().any(|l| l == label)
                || t.service.is_some_and(|s| s.as_str() == label)
                || t.category.is_some_and(|c| c.as_str() == label)
        });
        priority_ok && label_ok
    }
}

/// Tickets grouped by status, in workflow order.
pub fn columns<'a>(
    tickets: &'a [DeskTicket],
    filter: &BoardFilter,
) -> Vec<(TicketStatus, Vec<&'a DeskTicket>)> {
    TicketStatus::ALL
        .iter()
        .map(|&status| {
            let cards = tickets
                .iter()
                .filter(|t| t.status == status && filter.matches(t))
                .collect();
            (status, cards)
        })
        .collect()
}

pub fn board(tickets: &[DeskTicket], filter: &BoardFilter) -> String {
    let mut out = String::new();
    for (status, cards) in columns(tickets, filter) {
        out.push_str(&format!(
            "{} {}\n",
            status_text(status),
            style(format!("({})", cards.len())).dim()
        ));
        for t in cards {
            out.push_str(&ticket_line(t));
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

// ── Detail ───────────────────────────────────────────────────────────

fn comment_block(c: &DeskComment, width: usize) -> String {
    let marker = if c.is_internal {
        LOCK.to_string()
    } else {
        String::new()
    };
    let mut out = format!(
        "  {}{} {}\n",
        marker,
        style(&c.author).bold(),
        style(c.created_at.format("%Y-%m-%d %H:%M")).dim()
    );
    let options = textwrap::Options::new(width.saturating_sub(4).max(20))
        .initial_indent("    ")
        .subsequent_indent("    ");
    out.push_str(&textwrap::fill(&c.content, options));
    out.push('\n');
    out
}

/// Full ticket. Internal comments are listed only with `show_internal`.
pub fn detail(t: &DeskTicket, show_internal: bool, width: usize) -> String {
    let mut out = format!("{}{}\n", TICKET, style(&t.title).bold());
    let row = |label: &str, value: String| format!("  {:<16}{}\n", style(label).dim(), value);
    out.push_str(&row("Key", t.key.clone()));
    out.push_str(&row("Status", status_text(t.status)));
    out.push_str(&row("Priority", priority_text(t.priority)));
    out.push_str(&row("Service", opt(t.service)));
    out.push_str(&row("Category", opt(t.category)));
    out.push_str(&row("Escalation", opt(t.escalation_level)));
    out.push_str(&row("Assigned to", opt(t.assigned_to.as_deref())));
    if let Some(user) = &t.affected_user {
        out.push_str(&row(
            "Affected user",
            format!("{} <{}> ({})", user.name, user.email, user.role),
        ));
    }
    out.push_str(&row(
        "Created",
        t.created_at.format("%Y-%m-%d %H:%M").to_string(),
    ));
    if let Some(resolved) = t.resolved_at {
        out.push_str(&row("Resolved", resolved.format("%Y-%m-%d %H:%M").to_string()));
    }
    if let Some(url) = &t.tracker_url {
        out.push_str(&row("GitLab", url.clone()));
    }

    out.push('\n');
    let options = textwrap::Options::new(width.max(20))
        .initial_indent("  ")
        .subsequent_indent("  ");
    out.push_str(&textwrap::fill(&t.description, options));
    out.push('\n');

    let visible: Vec<&DeskComment> = t
        .comments
        .iter()
        .filter(|c| show_internal || !c.is_internal)
        .collect();
    let hidden = t.comments.len() - visible.len();
    out.push_str(&format!(
        "\n{} {}\n",
        style("Comments").bold(),
        style(format!("({})", visible.len())).dim()
    ));
    for c in visible {
        out.push_str(&comment_block(c, width));
    }
    if hidden > 0 {
        out.push_str(&format!(
            "  {}\n",
            style(format!("{} internal comment(s) hidden", hidden)).dim()
        ));
    }
    out
}

// ── Statistics ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
    /// Percentage of tickets Resolved or Closed, one decimal.
    pub closure_rate: f64,
    pub by_category: Vec<(Category, usize)>,
    pub by_service: Vec<(BusinessService, usize)>,
    pub by_priority: Vec<(Priority, usize)>,
    /// Most active comment authors, busiest first.
    pub authors: Vec<(String, usize)>,
    /// Tickets created per `YYYY-MM`, oldest first.
    pub timeline: Vec<(String, usize)>,
}

/// Counts in descending order, ties in declaration order. Zero counts are
/// dropped.
fn tally<T: Copy + PartialEq>(all: &[T], values: impl Iterator<Item = T>) -> Vec<(T, usize)> {
    let mut counts: Vec<(T, usize)> = all.iter().map(|&v| (v, 0)).collect();
    for value in values {
        if let Some(entry) = counts.iter_mut().find(|(v, _)| *v == value) {
            entry.1 += 1;
        }
    }
    counts.retain(|(_, n)| *n > 0);
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

pub fn compute_stats(tickets: &[DeskTicket]) -> Stats {
    let total = tickets.len();
    let closed = tickets.iter().filter(|t| is_finished(t.status)).count();
    let closure_rate = if total == 0 {
        0.0
    } else {
        (closed as f64 / total as f64 * 1000.0).round() / 10.0
    };

    let mut author_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for c in tickets.iter().flat_map(|t| &t.comments) {
        *author_counts.entry(c.author.as_str()).or_default() += 1;
    }
    let mut authors: Vec<(String, usize)> = author_counts
        .into_iter()
        .map(|(a, n)| (a.to_string(), n))
        .collect();
    authors.sort_by(|a, b| b.1.cmp(&a.1));
    authors.truncate(TOP_AUTHORS);

    let mut months: BTreeMap<String, usize> = BTreeMap::new();
    for t in tickets {
        *months
            .entry(t.created_at.format("%Y-%m").to_string())
            .or_default() += 1;
    }

    Stats {
        total,
        open: total - closed,
        closed,
        closure_rate,
        by_category: tally(&Category::ALL, tickets.iter().filter_map(|t| t.category)),
        by_service: tally(&BusinessService::ALL, tickets.iter().filter_map(|t| t.service)),
        by_priority: tally(&Priority::ALL, tickets.iter().filter_map(|t| t.priority)),
        authors,
        timeline: months.into_iter().collect(),
    }
}

fn bars<K: std::fmt::Display>(title: &str, rows: &[(K, usize)], total: usize) -> String {
    const BAR: usize = 30;
    let mut out = format!("\n{}\n", style(title).bold());
    if rows.is_empty() {
        out.push_str(&format!("  {}\n", style("none").dim()));
    }
    for (key, n) in rows {
        let len = (n * BAR).div_ceil(total.max(1));
        out.push_str(&format!(
            "  {:<20} {:>4} {}\n",
            key.to_string(),
            n,
            style("█".repeat(len)).cyan()
        ));
    }
    out
}

pub fn statistics(tickets: &[DeskTicket]) -> String {
    if tickets.is_empty() {
        return format!(
            "{}\n{}\n",
            style("No data available").bold(),
            style("Create some tickets to see statistics").dim()
        );
    }
    let stats = compute_stats(tickets);
    let mut out = format!("{}{}\n\n", CHART, style("Statistics").bold());
    out.push_str(&format!("  Total          {}\n", stats.total));
    out.push_str(&format!("  Open           {}\n", stats.open));
    out.push_str(&format!("  Closed         {}\n", stats.closed));
    out.push_str(&format!("  Closure rate   {:.1}%\n", stats.closure_rate));
    out.push_str(&bars("By category", &stats.by_category, stats.total));
    out.push_str(&bars("By service", &stats.by_service, stats.total));
    out.push_str(&bars("By priority", &stats.by_priority, stats.total));
    out.push_str(&bars("Most active authors", &stats.authors, stats.total));
    out.push_str(&bars("Created per month", &stats.timeline, stats.total));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use console::strip_ansi_codes;

    fn ticket(key: &str, status: TicketStatus, priority: Priority, day: u32) -> DeskTicket {
        DeskTicket {
            key: key.to_string(),
            title: format!("Ticket {}", key),
            description: "Something is wrong".into(),
            service: Some(BusinessService::Inventory),
            category: Some(Category::Incident),
            priority: Some(priority),
            status,
            affected_user: None,
            assigned_to: None,
            escalation_level: None,
            labels: vec!["Inventory".into()],
            comments: vec![],
            tracker_url: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap(),
            resolved_at: None,
        }
    }

    fn comment(author: &str, internal: bool) -> DeskComment {
        DeskComment {
            author: author.into(),
            content: format!("note by {}", author),
            is_internal: internal,
            created_at: Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap(),
        }
    }

    fn sample() -> Vec<DeskTicket> {
        vec![
            ticket("t1", TicketStatus::Open, Priority::P1, 1),
            ticket("t2", TicketStatus::InProgress, Priority::P2, 2),
            ticket("t3", TicketStatus::Waiting, Priority::P1, 3),
            ticket("t4", TicketStatus::Resolved, Priority::P3, 4),
            ticket("t5", TicketStatus::Closed, Priority::P4, 5),
            ticket("t6", TicketStatus::Open, Priority::P3, 6),
        ]
    }

    #[test]
    fn test_totals() {
        assert_eq!(
            totals(&sample()),
            Totals {
                all: 6,
                open: 4,
                resolved: 2,
                critical: 2
            }
        );
    }

    #[test]
    fn test_dashboard_lists_five_most_recent() {
        let out = strip_ansi_codes(&dashboard(&sample(), "api")).to_string();
        assert!(out.contains("Total tickets   6"));
        assert!(out.contains("Ticket t6"));
        assert!(out.contains("Ticket t2"));
        assert!(!out.contains("Ticket t1"));
    }

    #[test]
    fn test_board_columns_and_filters() {
        let tickets = sample();
        let cols = columns(&tickets, &BoardFilter::default());
        assert_eq!(cols.len(), 5);
        assert_eq!(cols[0].0, TicketStatus::Open);
        assert_eq!(cols[0].1.len(), 2);

        let p1 = BoardFilter {
            priority: Some(Priority::P1),
            label: None,
        };
        let total: usize = columns(&tickets, &p1).iter().map(|(_, c)| c.len()).sum();
        assert_eq!(total, 2);

        let other_label = BoardFilter {
            priority: None,
            label: Some("Catalog".into()),
        };
        assert!(columns(&tickets, &other_label).iter().all(|(_, c)| c.is_empty()));

        let category = BoardFilter {
            priority: None,
            label: Some("Incident".into()),
        };
        let total: usize = columns(&tickets, &category).iter().map(|(_, c)| c.len()).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn test_detail_hides_internal_comments() {
        let mut t = ticket("t1", TicketStatus::Open, Priority::P1, 1);
        t.comments = vec![comment("Ana", false), comment("Luis", true)];

        let public = strip_ansi_codes(&detail(&t, false, 80)).to_string();
        assert!(public.contains("note by Ana"));
        assert!(!public.contains("note by Luis"));
        assert!(public.contains("1 internal comment(s) hidden"));

        let all = strip_ansi_codes(&detail(&t, true, 80)).to_string();
        assert!(all.contains("note by Luis"));
        assert!(!all.contains("hidden"));
    }

    #[test]
    fn test_compute_stats() {
        let mut tickets = sample();
        tickets[0].comments = vec![comment("Luis", true), comment("Ana", false)];
        tickets[1].comments = vec![comment("Luis", false)];
        tickets[2].category = Some(Category::Inquiry);

        let stats = compute_stats(&tickets);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.closed, 2);
        assert_eq!(stats.open, 4);
        assert_eq!(stats.closure_rate, 33.3);
        assert_eq!(
            stats.by_category,
            vec![(Category::Incident, 5), (Category::Inquiry, 1)]
        );
        assert_eq!(stats.by_service, vec![(BusinessService::Inventory, 6)]);
        assert_eq!(stats.by_priority[0], (Priority::P1, 2));
        assert_eq!(stats.authors[0], ("Luis".to_string(), 2));
        assert_eq!(stats.timeline, vec![("2026-03".to_string(), 6)]);
    }

    #[test]
    fn test_statistics_empty() {
        let out = strip_ansi_codes(&statistics(&[])).to_string();
        assert!(out.contains("No data available"));
    }

    #[test]
    fn test_short_key() {
        assert_eq!(short_key("6f1c2a52-3f0e-4a51"), "6f1c2a52");
        assert_eq!(short_key("12"), "12");
    }
}
