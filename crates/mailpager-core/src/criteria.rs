//! IMAP SEARCH criteria builder.
//!
//! Criteria are an ordered list of rendered clauses. Each filter method
//! consumes the builder and returns it with one clause appended, so a chain
//! reads left to right in the order the clauses end up on the wire:
//!
//! ```
//! use chrono::NaiveDate;
//! use mailpager_core::SearchCriteria;
//!
//! let since = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
//! let before = NaiveDate::from_ymd_opt(2024, 7, 8).unwrap();
//!
//! let criteria = SearchCriteria::new()
//!     .date_range(since, before)
//!     .from("alerts@bank.example")
//!     .unseen();
//!
//! assert_eq!(
//!     criteria.build(),
//!     r#"SINCE "01-Jul-2024" BEFORE "08-Jul-2024" FROM "alerts@bank.example" UNSEEN"#
//! );
//! ```
//!
//! Composition happens on rendered text: [`SearchCriteria::and`],
//! [`SearchCriteria::or`] and [`SearchCriteria::not`] take strings produced
//! by other builders' [`SearchCriteria::build`]. Nothing is validated.

use std::fmt;

use chrono::NaiveDate;

/// Date format of the SEARCH `SINCE`/`BEFORE` keys (`01-Jul-2024`).
const SEARCH_DATE_FORMAT: &str = "%d-%b-%Y";

/// Ordered list of IMAP SEARCH clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct SearchCriteria {
    clauses: Vec<String>,
}

impl SearchCriteria {
    /// Creates an empty set of criteria.
    pub const fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    fn push(mut self, clause: String) -> Self {
        self.clauses.push(clause);
        self
    }

    /// `FROM "addr"`.
    pub fn from(self, addr: &str) -> Self {
        self.push(format!("FROM {}", quoted(addr)))
    }

    /// `TO "addr"`.
    pub fn to(self, addr: &str) -> Self {
        self.push(format!("TO {}", quoted(addr)))
    }

    /// `CC "addr"`.
    pub fn cc(self, addr: &str) -> Self {
        self.push(format!("CC {}", quoted(addr)))
    }

    /// `SUBJECT "text"`.
    ///
    /// An empty subject appends nothing, so optional filters can be passed
    /// through without checking them first.
    pub fn subject(self, text: &str) -> Self {
        if text.is_empty() {
            return self;
        }
        self.push(format!("SUBJECT {}", quoted(text)))
    }

    /// `BODY "text"`.
    pub fn body(self, text: &str) -> Self {
        self.push(format!("BODY {}", quoted(text)))
    }

    /// `SINCE "start" BEFORE "end"` as a single clause.
    ///
    /// IMAP compares dates only, so `end` is exclusive.
    pub fn date_range(self, start: NaiveDate, end: NaiveDate) -> Self {
        self.push(format!(
            "SINCE \"{}\" BEFORE \"{}\"",
            start.format(SEARCH_DATE_FORMAT),
            end.format(SEARCH_DATE_FORMAT)
        ))
    }

    /// `UNSEEN`.
    pub fn unseen(self) -> Self {
        self.push("UNSEEN".to_string())
    }

    /// `DELETED`.
    pub fn deleted(self) -> Self {
        self.push("DELETED".to_string())
    }

    /// `DRAFT`.
    pub fn draft(self) -> Self {
        self.push("DRAFT".to_string())
    }

    /// `FLAGGED`.
    pub fn flagged(self) -> Self {
        self.push("FLAGGED".to_string())
    }

    /// `RECENT`.
    pub fn recent(self) -> Self {
        self.push("RECENT".to_string())
    }

    /// `ALL`.
    pub fn all(self) -> Self {
        self.push("ALL".to_string())
    }

    /// Appends `(a) (b) ...`: every rendered clause parenthesized, joined
    /// by spaces.
    pub fn and<I, S>(self, clauses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let inner = clauses
            .into_iter()
            .map(|clause| format!("({})", clause.as_ref()))
            .collect::<Vec<_>>()
            .join(" ");
        self.push(inner)
    }

    /// Appends `(OR a b ...)` with the operands left as rendered.
    pub fn or<I, S>(self, clauses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let operands = join(clauses);
        self.push(format!("(OR {operands})"))
    }

    /// Appends `(NOT clause)`.
    pub fn not(self, clause: &str) -> Self {
        self.push(format!("(NOT {clause})"))
    }

    /// Accumulated clauses in insertion order.
    #[must_use]
    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    /// Returns true if no clause has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Renders the criteria: clauses joined by single spaces.
    #[must_use]
    pub fn build(&self) -> String {
        self.clauses.join(" ")
    }
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

/// Criteria for one paginated query: the date window, then senders and
/// subjects AND-ed onto it.
///
/// Several senders become one `OR` group of `FROM` clauses; a single sender
/// is a plain `FROM`. Subjects follow the same rule. Empty lists add
/// nothing.
pub fn define_criteria(
    start: NaiveDate,
    end: NaiveDate,
    senders: &[String],
    subjects: &[String],
) -> SearchCriteria {
    let mut groups = Vec::new();

    if let Some(group) = any_of(senders, |c, sender| c.from(sender)) {
        groups.push(group);
    }
    if let Some(group) = any_of(subjects, |c, subject| c.subject(subject)) {
        groups.push(group);
    }

    let criteria = SearchCriteria::new().date_range(start, end);
    if groups.is_empty() {
        criteria
    } else {
        criteria.and(groups)
    }
}

/// Renders `values` as one clause each and ORs them when there is more than
/// one. `None` when nothing renders.
fn any_of(
    values: &[String],
    clause: impl Fn(SearchCriteria, &str) -> SearchCriteria,
) -> Option<String> {
    let rendered: Vec<String> = values
        .iter()
        .map(|value| clause(SearchCriteria::new(), value).build())
        .filter(|rendered| !rendered.is_empty())
        .collect();

    match rendered.len() {
        0 => None,
        1 => rendered.into_iter().next(),
        _ => Some(SearchCriteria::new().or(rendered).build()),
    }
}

fn join<I, S>(clauses: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    clauses
        .into_iter()
        .map(|clause| clause.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wraps a value in double quotes, escaping `"` and `\`.
fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn clauses_keep_call_order() {
        let criteria = SearchCriteria::new().from("a@x").subject("hi");
        assert_eq!(criteria.build(), r#"FROM "a@x" SUBJECT "hi""#);
        assert_eq!(criteria.clauses().len(), 2);
    }

    #[test]
    fn empty_subject_is_skipped() {
        let criteria = SearchCriteria::new()
            .date_range(date(2024, 7, 1), date(2024, 7, 8))
            .subject("");
        assert_eq!(criteria.build(), r#"SINCE "01-Jul-2024" BEFORE "08-Jul-2024""#);
    }

    #[test]
    fn date_range_uses_english_short_months() {
        let criteria = SearchCriteria::new().date_range(date(2023, 12, 9), date(2024, 1, 31));
        assert_eq!(criteria.build(), r#"SINCE "09-Dec-2023" BEFORE "31-Jan-2024""#);
    }

    #[test]
    fn atoms() {
        let criteria = SearchCriteria::new()
            .unseen()
            .deleted()
            .draft()
            .flagged()
            .recent()
            .all();
        assert_eq!(criteria.build(), "UNSEEN DELETED DRAFT FLAGGED RECENT ALL");
    }

    #[test]
    fn address_clauses() {
        let criteria = SearchCriteria::new()
            .to("me@x")
            .cc("team@x")
            .body("invoice");
        assert_eq!(criteria.build(), r#"TO "me@x" CC "team@x" BODY "invoice""#);
    }

    #[test]
    fn composition() {
        let a = SearchCriteria::new().from("a@x").build();
        let b = SearchCriteria::new().from("b@x").build();

        assert_eq!(
            SearchCriteria::new().and([&a, &b]).build(),
            r#"(FROM "a@x") (FROM "b@x")"#
        );
        assert_eq!(
            SearchCriteria::new().or([&a, &b]).build(),
            r#"(OR FROM "a@x" FROM "b@x")"#
        );
        assert_eq!(SearchCriteria::new().not(&a).build(), r#"(NOT FROM "a@x")"#);
    }

    #[test]
    fn quotes_are_escaped() {
        let criteria = SearchCriteria::new().subject(r#"say "hi" \o/"#);
        assert_eq!(criteria.build(), r#"SUBJECT "say \"hi\" \\o/""#);
    }

    #[test]
    fn build_is_repeatable() {
        let criteria = SearchCriteria::new().from("a@x").flagged();
        assert_eq!(criteria.build(), criteria.build());
        assert_eq!(criteria.to_string(), criteria.build());
    }

    #[test]
    fn define_criteria_date_only() {
        let criteria = define_criteria(date(2024, 7, 1), date(2024, 7, 8), &[], &[]);
        assert_eq!(criteria.clauses().len(), 1);
    }

    #[test]
    fn define_criteria_single_sender_and_subject() {
        let criteria = define_criteria(
            date(2024, 7, 1),
            date(2024, 7, 8),
            &["a@x".to_string()],
            &["Receipt".to_string()],
        );
        assert_eq!(
            criteria.build(),
            r#"SINCE "01-Jul-2024" BEFORE "08-Jul-2024" (FROM "a@x") (SUBJECT "Receipt")"#
        );
    }

    #[test]
    fn define_criteria_many_senders() {
        let criteria = define_criteria(
            date(2024, 7, 1),
            date(2024, 7, 8),
            &["a@x".to_string(), "b@x".to_string()],
            &[],
        );
        assert_eq!(
            criteria.build(),
            r#"SINCE "01-Jul-2024" BEFORE "08-Jul-2024" ((OR FROM "a@x" FROM "b@x"))"#
        );
    }

    #[test]
    fn define_criteria_ignores_blank_subjects() {
        let criteria = define_criteria(
            date(2024, 7, 1),
            date(2024, 7, 8),
            &[],
            &[String::new(), "Receipt".to_string()],
        );
        assert!(criteria.build().ends_with(r#" (SUBJECT "Receipt")"#));
    }
}
