//! [`SmtpMailer`]: the SMTP implementation of [`MailTransport`].

use std::{collections::BTreeSet, time::Duration};

use herald_core::{compose::OutboundMessage, dispatch::MailTransport, intent::ContentType};
use lettre::{
  AsyncSmtpTransport, AsyncTransport as _, Message, Tokio1Executor,
  message::{Mailbox, header},
  transport::smtp::authentication::Credentials,
};
use serde::Deserialize;

use crate::{Error, Result};

// ─── Settings ────────────────────────────────────────────────────────────────

/// Connection security for the SMTP session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
  /// Plain text. Only for local relays.
  None,
  /// Upgrade with STARTTLS after connecting.
  #[default]
  Starttls,
  /// Implicit TLS from the first byte.
  Tls,
}

/// Deserialised from the `smtp` config section.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
  pub host:            String,
  #[serde(default = "default_port")]
  pub port:            u16,
  #[serde(default)]
  pub security:        SmtpSecurity,
  pub user:            Option<String>,
  pub password:        Option<String>,
  #[serde(default = "default_timeout_seconds")]
  pub timeout_seconds: u64,
}

fn default_port() -> u16 { 587 }

fn default_timeout_seconds() -> u64 { 30 }

// ─── Message building ────────────────────────────────────────────────────────

/// Build a MIME message from a composed [`OutboundMessage`].
///
/// Bcc recipients end up in the envelope only. Recipients that do not parse
/// as mailboxes are logged and left out; the message fails only when none
/// remain.
pub fn build_message(message: &OutboundMessage) -> Result<Message> {
  let mut builder = Message::builder()
    .from(message.from.parse::<Mailbox>()?)
    .subject(message.subject.as_str());
  let mut recipients = 0;
  for to in mailboxes("to", &message.to) {
    builder = builder.to(to);
    recipients += 1;
  }
  for cc in mailboxes("cc", &message.cc) {
    builder = builder.cc(cc);
    recipients += 1;
  }
  for bcc in mailboxes("bcc", &message.bcc) {
    builder = builder.bcc(bcc);
    recipients += 1;
  }
  if recipients == 0 {
    return Err(Error::NoRecipients);
  }

  let content_type = match message.content_type {
    ContentType::Plain => header::ContentType::TEXT_PLAIN,
    ContentType::Html => header::ContentType::TEXT_HTML,
  };
  Ok(builder.header(content_type).body(message.body.clone())?)
}

fn mailboxes<'a>(
  field: &'static str,
  addresses: &'a BTreeSet<String>,
) -> impl Iterator<Item = Mailbox> + 'a {
  addresses.iter().filter_map(move |address| match address.parse::<Mailbox>() {
    Ok(mailbox) => Some(mailbox),
    Err(error) => {
      tracing::warn!(field, %address, %error, "skipping unparseable recipient");
      None
    }
  })
}

// ─── Transport ───────────────────────────────────────────────────────────────

/// Sends mail through one SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
  transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
  pub fn new(settings: &SmtpSettings) -> Result<Self> {
    let builder = match settings.security {
      SmtpSecurity::None => {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
      }
      SmtpSecurity::Starttls => {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
      }
      SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?,
    };

    let mut builder = builder
      .port(settings.port)
      .timeout(Some(Duration::from_secs(settings.timeout_seconds)));
    if let (Some(user), Some(password)) = (&settings.user, &settings.password) {
      builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
    }

    tracing::debug!(
      host = %settings.host,
      port = settings.port,
      security = ?settings.security,
      "smtp transport configured"
    );
    Ok(Self { transport: builder.build() })
  }
}

impl MailTransport for SmtpMailer {
  type Error = Error;

  async fn send<'a>(&'a self, message: &'a OutboundMessage) -> Result<()> {
    let email = build_message(message)?;
    self.transport.send(email).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn outbound(content_type: ContentType) -> OutboundMessage {
    OutboundMessage {
      from: "os2mo@magenta.dk".into(),
      to: BTreeSet::from(["a@x.dk".to_string(), "b@x.dk".to_string()]),
      cc: BTreeSet::from(["chef@x.dk".to_string()]),
      bcc: BTreeSet::from(["arkiv@x.dk".to_string()]),
      subject: "Registrering i MO".into(),
      body: "Hej".into(),
      content_type,
    }
  }

  #[test]
  fn every_recipient_is_in_the_envelope_but_bcc_is_not_a_header() {
    let message = build_message(&outbound(ContentType::Plain)).unwrap();
    assert_eq!(message.envelope().to().len(), 4);

    let formatted = String::from_utf8(message.formatted()).unwrap();
    assert!(formatted.contains("a@x.dk"));
    assert!(formatted.contains("Cc: chef@x.dk"));
    assert!(!formatted.contains("arkiv@x.dk"));
    assert!(formatted.contains("text/plain"));
  }

  #[test]
  fn html_content_type() {
    let message = build_message(&outbound(ContentType::Html)).unwrap();
    let formatted = String::from_utf8(message.formatted()).unwrap();
    assert!(formatted.contains("text/html"));
  }

  #[test]
  fn unparseable_copy_recipients_are_skipped() {
    let mut message = outbound(ContentType::Plain);
    message.cc = BTreeSet::from(["manager@x.dk".to_string(), "no-at-sign".to_string()]);
    message.bcc.insert("also junk".into());

    let built = build_message(&message).unwrap();
    let envelope: Vec<String> = built.envelope().to().iter().map(ToString::to_string).collect();
    assert_eq!(envelope.len(), 4);
    assert!(envelope.contains(&"manager@x.dk".to_string()));
    assert!(!envelope.iter().any(|a| a.contains("no-at-sign")));
  }

  #[test]
  fn message_without_any_valid_recipient_fails() {
    let mut message = outbound(ContentType::Plain);
    message.to = BTreeSet::from(["not an address".to_string()]);
    message.cc = BTreeSet::from(["no-at-sign".to_string()]);
    message.bcc.clear();
    assert!(matches!(build_message(&message), Err(Error::NoRecipients)));
  }

  #[test]
  fn invalid_sender_is_an_address_error() {
    let mut message = outbound(ContentType::Plain);
    message.from = "not an address".into();
    assert!(matches!(build_message(&message), Err(Error::Address(_))));
  }

  #[test]
  fn transport_builds_for_every_security_mode() {
    for security in ["none", "starttls", "tls"] {
      let settings: SmtpSettings = serde_json::from_value(serde_json::json!({
        "host": "localhost",
        "security": security,
        "user": "u",
        "password": "p",
      }))
      .unwrap();
      assert_eq!(settings.port, 587);
      assert!(SmtpMailer::new(&settings).is_ok(), "{security}");
    }
  }
}
