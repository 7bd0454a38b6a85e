//! Header block parsing.

/// Header fields of a message or body part, in their original order.
///
/// Names compare case-insensitively. Values are unfolded (line breaks of
/// continuation lines removed, leading whitespace kept) and trimmed, but
/// otherwise raw: encoded words are left for the caller to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Iterates over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses the header block at the start of `raw` and returns it along
    /// with the remaining body bytes.
    ///
    /// The block ends at the first empty line, which is consumed. A line that
    /// is neither a field nor a continuation also ends the block; it becomes
    /// the first line of the body. Both CRLF and bare LF endings are
    /// accepted.
    #[must_use]
    pub fn split(raw: &[u8]) -> (Self, &[u8]) {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;
        let mut pos = 0;

        let body_start = loop {
            if pos >= raw.len() {
                break raw.len();
            }
            let line_end = raw[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(raw.len(), |i| pos + i + 1);
            let line = trim_line_ending(&raw[pos..line_end]);

            if line.is_empty() {
                break line_end;
            }

            if matches!(line[0], b' ' | b'\t') {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&String::from_utf8_lossy(line));
                }
            } else if let Some(colon) = line.iter().position(|&b| b == b':') {
                if let Some((name, value)) = current.take() {
                    headers.add(name, value.trim());
                }
                let name = String::from_utf8_lossy(&line[..colon]).trim().to_string();
                let value = String::from_utf8_lossy(&line[colon + 1..]).into_owned();
                current = Some((name, value));
            } else {
                break pos;
            }

            pos = line_end;
        };

        if let Some((name, value)) = current {
            headers.add(name, value.trim());
        }

        (headers, &raw[body_start..])
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
