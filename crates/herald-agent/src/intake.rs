//! Event intake: an HTTP front that hands events to a single consumer over a
//! bounded queue.
//!
//! Events are processed one at a time in arrival order. The handler waits
//! for its job to finish, so the status code reports the outcome: a 5xx
//! tells the delivering broker to retry.

use std::sync::Arc;

use axum::{
  Router,
  extract::{Path, Query, State},
  http::StatusCode,
  routing::{get, post},
};
use chrono::Utc;
use herald_core::{
  dispatch::MailTransport,
  event::{Event, EventKind},
  intent::Outcome,
  source::DataSource,
  store::{NotificationStore, SentCache},
};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{
  agent::Agent,
  error::{Error, Result},
};

/// One queued event and the channel its result is reported on.
pub struct Job {
  pub event: Event,
  pub reply: oneshot::Sender<herald_core::Result<()>>,
}

/// The producing side of the queue.
#[derive(Clone)]
pub struct Intake {
  jobs: mpsc::Sender<Job>,
}

impl Intake {
  pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
    let (jobs, rx) = mpsc::channel(capacity.max(1));
    (Self { jobs }, rx)
  }

  /// Queue `event` and wait until it was handled.
  pub async fn submit(&self, event: Event) -> Result<()> {
    let (reply, done) = oneshot::channel();
    self.jobs.send(Job { event, reply }).await.map_err(|_| Error::Unavailable)?;
    done
      .await
      .map_err(|_| Error::Unavailable)?
      .map_err(|e| Error::Processing(e.to_string()))
  }
}

/// Drain `jobs` until every [`Intake`] is dropped.
pub async fn consume<D, S, C, T>(agent: Arc<Agent<D, S, C, T>>, mut jobs: mpsc::Receiver<Job>)
where
  D: DataSource,
  S: NotificationStore,
  C: SentCache,
  T: MailTransport,
{
  while let Some(Job { event, reply }) = jobs.recv().await {
    let result = agent.handle_event(&event, Utc::now()).await;
    match &result {
      Ok(outcomes) => {
        let notified = outcomes.iter().filter(|o| matches!(o, Outcome::Notify(_))).count();
        tracing::debug!(kind = %event.kind, uuid = %event.uuid, notified, "event handled");
      }
      Err(e) => {
        tracing::error!(kind = %event.kind, uuid = %event.uuid, error = %e, "event failed");
      }
    }
    // The submitter may have gone away; the work is done either way.
    let _ = reply.send(result.map(drop));
  }
  tracing::info!("intake closed");
}

pub fn router(intake: Intake) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/events/{kind}/{uuid}", post(receive))
    .layer(TraceLayer::new_for_http())
    .with_state(intake)
}

async fn health() -> &'static str { "ok" }

#[derive(Debug, Deserialize)]
struct EventQuery {
  /// The changed object, when it differs from the routing uuid.
  object: Option<Uuid>,
}

async fn receive(
  State(intake): State<Intake>,
  Path((kind, uuid)): Path<(String, Uuid)>,
  Query(query): Query<EventQuery>,
) -> Result<StatusCode> {
  let kind: EventKind = kind.parse()?;

  // An address event whose object is the routing uuid comes from employee
  // creation, not from an address being added.
  if kind == EventKind::Address && query.object == Some(uuid) {
    tracing::info!(%uuid, "rejecting employee-creation address event");
    return Err(Error::Rejected("employee creation event".to_owned()));
  }

  intake.submit(Event { kind, uuid, object_uuid: query.object }).await?;
  Ok(StatusCode::NO_CONTENT)
}
