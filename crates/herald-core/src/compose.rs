//! Mail Composer: turns a [`NotificationIntent`] into a transport-ready
//! [`OutboundMessage`].

use std::collections::BTreeSet;

use serde::Serialize;

use crate::intent::{ContentType, NotificationIntent};

/// A message ready for a [`crate::dispatch::MailTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
  pub from:         String,
  pub to:           BTreeSet<String>,
  pub cc:           BTreeSet<String>,
  pub bcc:          BTreeSet<String>,
  pub subject:      String,
  pub body:         String,
  pub content_type: ContentType,
}

#[derive(Debug, Clone)]
pub struct MailComposer {
  sender:            String,
  bcc:               BTreeSet<String>,
  /// Replaces every computed recipient in non-production environments.
  receiver_override: Option<String>,
}

impl MailComposer {
  pub fn new(sender: impl Into<String>) -> Self {
    Self { sender: sender.into(), bcc: BTreeSet::new(), receiver_override: None }
  }

  /// Blind-copy every message to `bcc`.
  pub fn with_bcc(mut self, bcc: impl IntoIterator<Item = String>) -> Self {
    self.bcc = bcc.into_iter().collect();
    self
  }

  /// Send everything to `address` instead. Blank addresses are ignored.
  pub fn with_receiver_override(mut self, address: Option<String>) -> Self {
    self.receiver_override = address.filter(|a| !a.trim().is_empty());
    self
  }

  pub fn compose(&self, intent: &NotificationIntent) -> OutboundMessage {
    let (to, cc, bcc) = match &self.receiver_override {
      Some(address) => (BTreeSet::from([address.clone()]), BTreeSet::new(), BTreeSet::new()),
      None => (intent.recipients.clone(), intent.cc.clone(), self.bcc.clone()),
    };

    OutboundMessage {
      from: self.sender.clone(),
      to,
      cc,
      bcc,
      subject: intent.subject.clone(),
      body: intent.body.clone(),
      content_type: intent.content_type,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn intent() -> NotificationIntent {
    NotificationIntent {
      recipients:   BTreeSet::from(["receiver1@test.net".into(), "receiver2@test.net".into()]),
      cc:           BTreeSet::from(["cc1@test.net".into()]),
      subject:      "A very important message".into(),
      body:         "The body of the very important message with a, ø, and å".into(),
      content_type: ContentType::Plain,
    }
  }

  #[test]
  fn maps_intent_fields() {
    let composer =
      MailComposer::new("sender@test.net").with_bcc(["bcc@test.net".to_string()]);
    let message = composer.compose(&intent());

    assert_eq!(message.from, "sender@test.net");
    assert_eq!(message.to, intent().recipients);
    assert_eq!(message.cc, intent().cc);
    assert_eq!(message.bcc, BTreeSet::from(["bcc@test.net".to_string()]));
    assert_eq!(message.body, intent().body);
    assert_eq!(message.content_type, ContentType::Plain);
  }

  #[test]
  fn receiver_override_replaces_recipients_and_drops_copies() {
    let composer = MailComposer::new("sender@test.net")
      .with_bcc(["bcc@test.net".to_string()])
      .with_receiver_override(Some("mail@test.com".into()));
    let message = composer.compose(&intent());

    assert_eq!(message.to, BTreeSet::from(["mail@test.com".to_string()]));
    assert!(message.cc.is_empty());
    assert!(message.bcc.is_empty());
    assert_eq!(message.subject, "A very important message");
  }

  #[test]
  fn blank_override_is_ignored() {
    let composer =
      MailComposer::new("sender@test.net").with_receiver_override(Some("  ".into()));
    assert_eq!(composer.compose(&intent()).to, intent().recipients);
  }
}
