use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mailparse::MailHeaderMap;
use native_tls::{TlsConnector, TlsStream};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{Param, Skill, SkillFunction, ToolArgs, ToolOutput, ToolSchema};
use crate::error::{JarvisError, Result};

const IMAP_PORT: u16 = 993;
const IMAP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RECENT: u32 = 5;
const MAX_RECENT: u32 = 50;
const NO_SUBJECT: &str = "(No Subject)";
const MISSING_CREDENTIALS: &str =
    "Email credentials not configured. Please add EMAIL_ADDRESS and EMAIL_PASSWORD to .env file.";

type ImapSession = imap::Session<TlsStream<TcpStream>>;

/// Read-only INBOX polling over IMAP with TLS.
pub struct EmailSkill {
    inbox: Arc<Inbox>,
}

impl EmailSkill {
    pub fn new(address: Option<String>, password: Option<String>, server: &str) -> Self {
        let credentials = match (address, password) {
            (Some(address), Some(password)) => Some(Credentials { address, password }),
            _ => None,
        };
        Self {
            inbox: Arc::new(Inbox {
                server: server.to_string(),
                credentials,
            }),
        }
    }
}

impl Skill for EmailSkill {
    fn name(&self) -> &str {
        "email_skill"
    }

    fn functions(&self) -> Vec<Arc<dyn SkillFunction>> {
        vec![
            Arc::new(CheckUnread(self.inbox.clone())),
            Arc::new(RecentEmails(self.inbox.clone())),
        ]
    }
}

struct Credentials {
    address: String,
    password: String,
}

/// One account's INBOX.  The `imap` client is blocking, so every session
/// runs on the blocking pool.
struct Inbox {
    server: String,
    credentials: Option<Credentials>,
}

/// Sender and subject of one message, decoded from its headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Envelope {
    from: Option<String>,
    subject: String,
}

impl Envelope {
    fn parse(raw: &[u8]) -> Self {
        match mailparse::parse_headers(raw) {
            Ok((headers, _)) => Self {
                from: headers.get_first_value("From"),
                subject: headers
                    .get_first_value("Subject")
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| NO_SUBJECT.to_string()),
            },
            Err(e) => {
                debug!(error = %e, "unparseable message headers");
                Self {
                    from: None,
                    subject: NO_SUBJECT.to_string(),
                }
            }
        }
    }
}

impl Inbox {
    fn login(&self) -> std::result::Result<ImapSession, String> {
        let Some(credentials) = self.credentials.as_ref() else {
            return Err(MISSING_CREDENTIALS.to_string());
        };
        let tls = TlsConnector::new().map_err(|e| format!("TLS setup failed: {e}"))?;
        let client = imap::connect((self.server.as_str(), IMAP_PORT), &self.server, &tls)
            .map_err(|e| format!("cannot connect to {}: {e}", self.server))?;
        let session = client
            .login(&credentials.address, &credentials.password)
            .map_err(|(e, _)| format!("login failed: {e}"))?;
        debug!(server = %self.server, "imap session opened");
        Ok(session)
    }

    fn unread_count(&self) -> std::result::Result<usize, String> {
        let mut session = self.login()?;
        session.select("INBOX").map_err(|e| e.to_string())?;
        let unseen = session.search("UNSEEN").map_err(|e| e.to_string())?;
        let _ = session.logout();
        Ok(unseen.len())
    }

    /// The last `count` messages by sequence number, newest first.  Only
    /// headers are fetched, and with a peek, so nothing is marked read.
    fn recent(&self, count: u32) -> std::result::Result<Vec<Envelope>, String> {
        let mut session = self.login()?;
        let mailbox = session.select("INBOX").map_err(|e| e.to_string())?;

        let mut found = Vec::new();
        if mailbox.exists > 0 {
            let first = mailbox.exists.saturating_sub(count) + 1;
            let fetches = session
                .fetch(format!("{first}:{}", mailbox.exists), "RFC822.HEADER")
                .map_err(|e| e.to_string())?;
            for fetch in fetches.iter() {
                if let Some(raw) = fetch.header() {
                    found.push((fetch.message, Envelope::parse(raw)));
                }
            }
        }
        let _ = session.logout();

        found.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(found.into_iter().map(|(_, envelope)| envelope).collect())
    }

    /// Run a blocking mailbox operation with a timeout.  The outer `Err` is
    /// reserved for a crashed task; server failures come back as the inner
    /// `Err` text.
    async fn run<T, F>(self: Arc<Self>, op: F) -> Result<std::result::Result<T, String>>
    where
        T: Send + 'static,
        F: FnOnce(&Inbox) -> std::result::Result<T, String> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(move || op(self.as_ref()));
        match tokio::time::timeout(Duration::from_secs(IMAP_TIMEOUT_SECS), task).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(JarvisError::ToolExecution(format!("mailbox task failed: {e}"))),
            Err(_) => Ok(Err(format!(
                "mail server did not respond within {IMAP_TIMEOUT_SECS}s"
            ))),
        }
    }
}

fn recent_count(args: &ToolArgs) -> u32 {
    match args.i64("count") {
        Some(n) if n > 0 => n.min(i64::from(MAX_RECENT)) as u32,
        _ => DEFAULT_RECENT,
    }
}

// -- CheckUnread ---------------------------------------------------------

struct CheckUnread(Arc<Inbox>);

#[async_trait]
impl SkillFunction for CheckUnread {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "check_unread_emails",
            "Check the number of unread emails in the inbox",
        )
    }

    async fn call(&self, _args: ToolArgs) -> Result<ToolOutput> {
        if self.0.credentials.is_none() {
            return Ok(ToolOutput::error(MISSING_CREDENTIALS));
        }

        match self.0.clone().run(|inbox| inbox.unread_count()).await? {
            Ok(unread) => Ok(ToolOutput::json(json!({
                "status": "success",
                "unread_count": unread,
                "message": format!("You have {unread} unread email(s)"),
            }))),
            Err(e) => {
                warn!(error = %e, "unread check failed");
                Ok(ToolOutput::error(format!("Email check error: {e}")))
            }
        }
    }
}

// -- RecentEmails --------------------------------------------------------

struct RecentEmails(Arc<Inbox>);

#[async_trait]
impl SkillFunction for RecentEmails {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "get_recent_emails",
            "Get subject lines and senders of recent emails",
        )
        .param(
            Param::integer("count")
                .describe("Number of recent emails to fetch (default: 5)"),
        )
    }

    async fn call(&self, args: ToolArgs) -> Result<ToolOutput> {
        if self.0.credentials.is_none() {
            return Ok(ToolOutput::error(MISSING_CREDENTIALS));
        }

        let count = recent_count(&args);
        match self.0.clone().run(move |inbox| inbox.recent(count)).await? {
            Ok(emails) => Ok(ToolOutput::json(json!({
                "status": "success",
                "count": emails.len(),
                "emails": emails,
            }))),
            Err(e) => {
                warn!(error = %e, "fetching recent emails failed");
                Ok(ToolOutput::error(format!("Error fetching emails: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> EmailSkill {
        EmailSkill::new(None, None, "imap.gmail.com")
    }

    #[test]
    fn schemas() {
        let schemas = unconfigured().tool_schemas();
        let names: Vec<_> = schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["check_unread_emails", "get_recent_emails"]);

        assert!(schemas[0].params.is_empty());
        let def = schemas[1].to_definition();
        let params = &def["function"]["parameters"];
        assert_eq!(params["properties"]["count"]["type"], "integer");
        assert_eq!(params["required"], json!([]));
    }

    #[tokio::test]
    async fn missing_credentials_is_reported() {
        let skill = unconfigured();
        let map = skill.function_map();
        for tool in ["check_unread_emails", "get_recent_emails"] {
            let out = map[tool].call(ToolArgs::new()).await.unwrap();
            assert!(!out.success, "{tool}");
            assert_eq!(out.output, MISSING_CREDENTIALS);
        }
    }

    #[tokio::test]
    async fn password_alone_is_not_enough() {
        let skill = EmailSkill::new(None, Some("secret".into()), "imap.gmail.com");
        let out = skill.function_map()["check_unread_emails"]
            .call(ToolArgs::new())
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.to_string().contains("EMAIL_ADDRESS"));
    }

    #[test]
    fn count_defaults_and_bounds() {
        let mut args = ToolArgs::new();
        assert_eq!(recent_count(&args), DEFAULT_RECENT);
        args.set("count", 3);
        assert_eq!(recent_count(&args), 3);
        args.set("count", "10");
        assert_eq!(recent_count(&args), 10);
        args.set("count", 0);
        assert_eq!(recent_count(&args), DEFAULT_RECENT);
        args.set("count", 10_000);
        assert_eq!(recent_count(&args), MAX_RECENT);
    }

    #[test]
    fn envelope_decodes_encoded_subject() {
        let raw = b"From: Pepper Potts <pepper@stark.com>\r\n\
                    Subject: =?UTF-8?B?Q2Fmw6kgbWVldGluZw==?=\r\n\
                    \r\n";
        let env = Envelope::parse(raw);
        assert_eq!(env.from.as_deref(), Some("Pepper Potts <pepper@stark.com>"));
        assert_eq!(env.subject, "Café meeting");
    }

    #[test]
    fn envelope_without_subject() {
        let env = Envelope::parse(b"From: happy@stark.com\r\n\r\n");
        assert_eq!(env.subject, NO_SUBJECT);
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"from": "happy@stark.com", "subject": "(No Subject)"})
        );
    }
}
