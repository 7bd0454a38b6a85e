//! Command-line arguments.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use mailpager_core::QueryRequest;

/// Search a mailbox one page at a time and print the result as JSON.
#[derive(Debug, Parser)]
#[command(name = "mailpager", version, about)]
pub struct Args {
    /// Mailbox to search [default: the configured mailbox]
    pub mailbox: Option<String>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub since: NaiveDate,

    /// First day to exclude (YYYY-MM-DD)
    #[arg(long)]
    pub before: NaiveDate,

    /// Cursor from a previous response's pagination
    #[arg(long)]
    pub cursor: Option<String>,

    /// Page number; overrides the cursor's
    #[arg(long)]
    pub page: Option<u32>,

    /// Page size; overrides the cursor's and the configured default
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Senders to match, separated by semicolons
    #[arg(long)]
    pub senders: Option<String>,

    /// Subject to match; repeat for several
    #[arg(long = "subject")]
    pub subjects: Vec<String>,

    /// Settings file [default: <config dir>/mailpager/config.json]
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Sender list from the semicolon-joined flag, blanks dropped.
    #[must_use]
    pub fn sender_list(&self) -> Vec<String> {
        self.senders
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|sender| !sender.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Builds the query, searching `default_mailbox` when none was given.
    #[must_use]
    pub fn to_request(&self, default_mailbox: &str) -> QueryRequest {
        let mailbox = self.mailbox.as_deref().unwrap_or(default_mailbox);
        let mut request = QueryRequest::new(mailbox, self.since, self.before)
            .senders(self.sender_list())
            .subjects(self.subjects.clone());
        if let Some(cursor) = &self.cursor {
            request = request.cursor(cursor.clone());
        }
        if let Some(page) = self.page {
            request = request.page(page);
        }
        if let Some(page_size) = self.page_size {
            request = request.page_size(page_size);
        }
        request
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn full_invocation() {
        let args = Args::try_parse_from([
            "mailpager",
            "archive",
            "--since",
            "2024-07-01",
            "--before",
            "2024-08-01",
            "--senders",
            "a@x.example; b@x.example;",
            "--subject",
            "Receipt",
            "--subject",
            "Invoice",
            "--page-size",
            "5",
        ])
        .unwrap();

        assert_eq!(args.sender_list(), vec!["a@x.example", "b@x.example"]);

        let request = args.to_request("inbox");
        assert_eq!(request.mailbox, "archive");
        assert_eq!(request.start_date, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        assert_eq!(request.subjects, vec!["Receipt", "Invoice"]);
        assert_eq!(request.page_size, Some(5));
        assert_eq!(request.page, None);
        assert!(request.cursor.is_none());
    }

    #[test]
    fn mailbox_defaults_from_settings() {
        let args =
            Args::try_parse_from(["mailpager", "--since", "2024-07-01", "--before", "2024-07-02"])
                .unwrap();
        assert!(args.sender_list().is_empty());
        assert_eq!(args.to_request("inbox").mailbox, "inbox");
    }

    #[test]
    fn dates_are_required_and_validated() {
        assert!(Args::try_parse_from(["mailpager", "--since", "2024-07-01"]).is_err());
        assert!(
            Args::try_parse_from(["mailpager", "--since", "July", "--before", "2024-07-02"])
                .is_err()
        );
    }
}
