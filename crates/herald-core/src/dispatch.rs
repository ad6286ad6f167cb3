//! Dispatch Adapter: the `MailTransport` seam and the dry-run aware
//! [`Mailer`] that every send path goes through.

use std::future::Future;

use crate::{
  Error, Result,
  compose::{MailComposer, OutboundMessage},
  intent::NotificationIntent,
};

/// An outbound mail transport (SMTP in production).
pub trait MailTransport: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn send<'a>(
    &'a self,
    message: &'a OutboundMessage,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Composes and dispatches intents, honouring dry-run mode.
pub struct Mailer<T> {
  composer:  MailComposer,
  transport: T,
  dry_run:   bool,
}

impl<T: MailTransport> Mailer<T> {
  pub fn new(composer: MailComposer, transport: T, dry_run: bool) -> Self {
    Self { composer, transport, dry_run }
  }

  pub fn transport(&self) -> &T { &self.transport }

  /// Compose `intent` and send it, or only log it in dry-run mode.
  /// Returns the composed message either way.
  pub async fn deliver(&self, intent: &NotificationIntent) -> Result<OutboundMessage> {
    let message = self.composer.compose(intent);

    if self.dry_run {
      tracing::info!(
        to = ?message.to,
        cc = ?message.cc,
        bcc = ?message.bcc,
        subject = %message.subject,
        body = %message.body,
        "dry run: email not sent"
      );
      return Ok(message);
    }

    self.transport.send(&message).await.map_err(Error::transport)?;
    tracing::info!(to = ?message.to, cc = ?message.cc, subject = %message.subject, "email sent");
    Ok(message)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use super::*;
  use crate::{fixtures::RecordingTransport, intent::ContentType};

  fn intent() -> NotificationIntent {
    NotificationIntent {
      recipients:   BTreeSet::from(["a@x.dk".to_string()]),
      cc:           BTreeSet::new(),
      subject:      "Emne".into(),
      body:         "<p>Indhold</p>".into(),
      content_type: ContentType::Html,
    }
  }

  #[tokio::test]
  async fn dry_run_never_calls_transport_but_composes_the_same_message() {
    let dry = Mailer::new(MailComposer::new("s@x.dk"), RecordingTransport::default(), true);
    let live = Mailer::new(MailComposer::new("s@x.dk"), RecordingTransport::default(), false);

    let dry_message = dry.deliver(&intent()).await.unwrap();
    let live_message = live.deliver(&intent()).await.unwrap();

    assert!(dry.transport().sent().is_empty());
    assert_eq!(live.transport().sent(), vec![live_message.clone()]);
    assert_eq!(dry_message, live_message);
  }

  #[tokio::test]
  async fn transport_failure_propagates() {
    let transport = RecordingTransport { failing: true, ..RecordingTransport::default() };
    let mailer = Mailer::new(MailComposer::new("s@x.dk"), transport, false);
    let err = mailer.deliver(&intent()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
  }
}
