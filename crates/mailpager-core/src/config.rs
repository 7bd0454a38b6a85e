//! Settings: server, credentials, paging and cache sizes.
//!
//! Settings live in `<config_dir>/mailpager/config.json`. Every field is
//! optional in the file; environment variables override whatever the file
//! says:
//!
//! | Variable                                | Field                         |
//! |-----------------------------------------|-------------------------------|
//! | `MAILPAGER_EMAIL_USER`                  | `email_user`                  |
//! | `MAILPAGER_EMAIL_PASSWORD`              | `email_password`              |
//! | `MAILPAGER_PAGE_SIZE`                   | `page_size`                   |
//! | `MAILPAGER_CACHE_CAPACITY_ID_LIST`      | `cache_capacity_id_list`      |
//! | `MAILPAGER_CACHE_CAPACITY_MESSAGE_LIST` | `cache_capacity_message_list` |

use std::fmt;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use mailpager_imap::connection::{Config as ImapConfig, Security};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

const ENV_PREFIX: &str = "MAILPAGER_";

/// Well-known IMAP providers, or an explicit host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImapServer {
    /// Gmail.
    #[default]
    Google,
    /// Outlook.com / Hotmail.
    Outlook,
    /// Yahoo Mail.
    Yahoo,
    /// Any other server.
    Custom {
        /// Hostname.
        host: String,
        /// Port; 993 when omitted.
        #[serde(default = "default_imap_port")]
        port: u16,
    },
}

const fn default_imap_port() -> u16 {
    Security::Implicit.default_port()
}

impl ImapServer {
    /// Hostname to connect to.
    #[must_use]
    pub fn host(&self) -> &str {
        match self {
            Self::Google => "imap.gmail.com",
            Self::Outlook => "imap-mail.outlook.com",
            Self::Yahoo => "imap.mail.yahoo.com",
            Self::Custom { host, .. } => host,
        }
    }

    /// Port to connect to.
    #[must_use]
    pub const fn port(&self) -> u16 {
        match self {
            Self::Custom { port, .. } => *port,
            _ => default_imap_port(),
        }
    }
}

impl fmt::Display for ImapServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host(), self.port())
    }
}

/// Login credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name, usually the email address.
    pub user: String,
    /// Password or app password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Application settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Account name.
    pub email_user: String,
    /// Account password.
    pub email_password: String,
    /// Server to connect to.
    pub server: ImapServer,
    /// Mailbox searched when the caller names none.
    pub mailbox: String,
    /// Page size used when the request carries none.
    pub page_size: u32,
    /// Number of id lists kept.
    pub cache_capacity_id_list: usize,
    /// Number of message batches kept.
    pub cache_capacity_message_list: usize,
    /// TCP connect plus TLS handshake limit, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            email_user: String::new(),
            email_password: String::new(),
            server: ImapServer::default(),
            mailbox: "inbox".to_string(),
            page_size: 15,
            cache_capacity_id_list: 5,
            cache_capacity_message_list: 5,
            connect_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("email_user", &self.email_user)
            .field("server", &self.server)
            .field("mailbox", &self.mailbox)
            .field("page_size", &self.page_size)
            .field("cache_capacity_id_list", &self.cache_capacity_id_list)
            .field("cache_capacity_message_list", &self.cache_capacity_message_list)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Default location of the settings file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailpager")
            .join("config.json")
    }

    /// Loads settings from the default file and the process environment,
    /// then validates them.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed, if an
    /// environment override is malformed, or if validation fails.
    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()).await
    }

    /// Like [`Settings::load`], reading `path` instead of the default file.
    ///
    /// # Errors
    ///
    /// See [`Settings::load`].
    pub async fn load_from(path: &Path) -> Result<Self> {
        let settings = Self::from_file(path)
            .await?
            .with_env(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors other than "not found" and on invalid JSON.
    pub async fn from_file(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                debug!(path = %path.display(), "Loaded settings file");
                Ok(serde_json::from_str(&contents)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No settings file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Applies `MAILPAGER_*` overrides read through `lookup`. Empty values
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a numeric override does not parse.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}{suffix}")).filter(|value| !value.trim().is_empty())
        };

        if let Some(user) = var("EMAIL_USER") {
            self.email_user = user;
        }
        if let Some(password) = var("EMAIL_PASSWORD") {
            self.email_password = password;
        }
        if let Some(value) = var("PAGE_SIZE") {
            self.page_size = parse_number("PAGE_SIZE", &value)?;
        }
        if let Some(value) = var("CACHE_CAPACITY_ID_LIST") {
            self.cache_capacity_id_list = parse_number("CACHE_CAPACITY_ID_LIST", &value)?;
        }
        if let Some(value) = var("CACHE_CAPACITY_MESSAGE_LIST") {
            self.cache_capacity_message_list =
                parse_number("CACHE_CAPACITY_MESSAGE_LIST", &value)?;
        }
        Ok(self)
    }

    /// Checks that sizes are positive and credentials present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.email_user.trim().is_empty() {
            return Err(Error::Config("email_user is required".into()));
        }
        if self.email_password.is_empty() {
            return Err(Error::Config("email_password is required".into()));
        }
        if self.mailbox.trim().is_empty() {
            return Err(Error::Config("mailbox must not be empty".into()));
        }
        if self.server.host().trim().is_empty() {
            return Err(Error::Config("server host must not be empty".into()));
        }
        self.default_page_size()?;
        self.id_list_capacity()?;
        self.message_list_capacity()?;
        Ok(())
    }

    /// Page size as a non-zero value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if it is zero.
    pub fn default_page_size(&self) -> Result<NonZeroU32> {
        NonZeroU32::new(self.page_size)
            .ok_or_else(|| Error::Config("page_size must be at least 1".into()))
    }

    /// Id-list cache capacity as a non-zero value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if it is zero.
    pub fn id_list_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.cache_capacity_id_list)
            .ok_or_else(|| Error::Config("cache_capacity_id_list must be at least 1".into()))
    }

    /// Message-batch cache capacity as a non-zero value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if it is zero.
    pub fn message_list_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.cache_capacity_message_list).ok_or_else(|| {
            Error::Config("cache_capacity_message_list must be at least 1".into())
        })
    }

    /// Credentials for logging in.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            user: self.email_user.clone(),
            password: self.email_password.clone(),
        }
    }

    /// Connection parameters for the IMAP client.
    #[must_use]
    pub fn imap_config(&self) -> ImapConfig {
        ImapConfig::builder(self.server.host())
            .port(self.server.port())
            .security(Security::Implicit)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .build()
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{ENV_PREFIX}{name} is not a valid number: {value}")))
}
