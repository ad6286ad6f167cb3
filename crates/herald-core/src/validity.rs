//! Validity intervals and the resolver that picks the authoritative variant
//! of an entity among several time-bounded records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The interval during which a variant of an entity is authoritative.
///
/// `from = None` is unbounded in the past; `to = None` is open-ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
  pub from: Option<DateTime<Utc>>,
  pub to:   Option<DateTime<Utc>>,
}

impl Validity {
  /// Build a validity, rejecting `from > to`.
  pub fn new(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
  ) -> Result<Self> {
    if let (Some(f), Some(t)) = (from, to)
      && f > t
    {
      return Err(Error::DataIntegrity(format!(
        "validity starts ({f}) after it ends ({t})"
      )));
    }
    Ok(Self { from, to })
  }

  /// An interval valid from `from` with no end.
  pub fn open(from: DateTime<Utc>) -> Self { Self { from: Some(from), to: None } }

  /// Strict containment: `from < now < to`, with missing bounds infinite.
  pub fn contains(&self, now: DateTime<Utc>) -> bool {
    self.from.is_none_or(|f| f < now) && self.to.is_none_or(|t| now < t)
  }

  pub fn is_open_ended(&self) -> bool { self.to.is_none() }
}

/// Anything carrying a [`Validity`].
pub trait Timed {
  fn validity(&self) -> &Validity;
}

/// Select the authoritative candidate for `now`.
///
/// Priority, first match wins:
/// 1. the only candidate;
/// 2. the first candidate whose interval strictly contains `now`;
/// 3. the first open-ended candidate;
/// 4. the candidate with the latest `to`, earliest in input order on ties.
///
/// An empty input is a caller contract violation and yields
/// [`Error::EmptyInput`].
pub fn resolve<T: Timed>(candidates: Vec<T>, now: DateTime<Utc>) -> Result<T> {
  if candidates.len() <= 1 {
    return candidates.into_iter().next().ok_or(Error::EmptyInput);
  }

  let index = candidates
    .iter()
    .position(|c| c.validity().contains(now))
    .or_else(|| candidates.iter().position(|c| c.validity().is_open_ended()))
    .or_else(|| latest_end(&candidates))
    .ok_or(Error::EmptyInput)?;

  candidates.into_iter().nth(index).ok_or(Error::EmptyInput)
}

/// Index of the first candidate with the greatest `to`.
fn latest_end<T: Timed>(candidates: &[T]) -> Option<usize> {
  let mut best: Option<(usize, DateTime<Utc>)> = None;
  for (i, c) in candidates.iter().enumerate() {
    if let Some(to) = c.validity().to
      && best.is_none_or(|(_, b)| to > b)
    {
      best = Some((i, to));
    }
  }
  best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[derive(Debug, Clone, PartialEq)]
  struct Variant {
    label:    &'static str,
    validity: Validity,
  }

  impl Timed for Variant {
    fn validity(&self) -> &Validity { &self.validity }
  }

  fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
  }

  fn variant(
    label: &'static str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
  ) -> Variant {
    Variant { label, validity: Validity::new(from, to).unwrap() }
  }

  #[test]
  fn empty_input_is_an_error() {
    let result = resolve::<Variant>(vec![], day(2024, 6, 1));
    assert!(matches!(result, Err(Error::EmptyInput)));
  }

  #[test]
  fn single_candidate_is_returned_even_if_not_current() {
    let only = variant("past", Some(day(2020, 1, 1)), Some(day(2021, 1, 1)));
    let picked = resolve(vec![only.clone()], day(2024, 6, 1)).unwrap();
    assert_eq!(picked, only);
  }

  #[test]
  fn current_candidate_wins_regardless_of_order() {
    let now = day(2024, 6, 1);
    let past = variant("past", Some(day(2020, 1, 1)), Some(day(2021, 1, 1)));
    let current = variant("current", Some(day(2024, 1, 1)), Some(day(2025, 1, 1)));
    let future = variant("future", Some(day(2025, 1, 1)), None);

    let orders = [
      vec![past.clone(), current.clone(), future.clone()],
      vec![future.clone(), past.clone(), current.clone()],
      vec![current.clone(), future.clone(), past.clone()],
    ];
    for order in orders {
      assert_eq!(resolve(order, now).unwrap().label, "current");
    }
  }

  #[test]
  fn open_ended_wins_when_nothing_is_current() {
    let now = day(2024, 6, 1);
    let past = variant("past", Some(day(2020, 1, 1)), Some(day(2021, 1, 1)));
    let later = variant("later", Some(day(2030, 1, 1)), None);

    assert_eq!(resolve(vec![past, later], now).unwrap().label, "later");
  }

  #[test]
  fn latest_expired_wins_when_all_are_closed_and_past() {
    let now = day(2024, 6, 1);
    let a = variant("a", Some(day(2019, 1, 1)), Some(day(2020, 1, 1)));
    let b = variant("b", Some(day(2021, 1, 1)), Some(day(2023, 1, 1)));
    let c = variant("c", Some(day(2020, 1, 1)), Some(day(2021, 1, 1)));

    assert_eq!(resolve(vec![a, b, c], now).unwrap().label, "b");
  }

  #[test]
  fn ties_on_latest_end_keep_input_order() {
    let now = day(2024, 6, 1);
    let first = variant("first", Some(day(2019, 1, 1)), Some(day(2022, 1, 1)));
    let second = variant("second", Some(day(2020, 1, 1)), Some(day(2022, 1, 1)));

    assert_eq!(resolve(vec![first, second], now).unwrap().label, "first");
  }

  #[test]
  fn containment_is_strict() {
    let edge = Validity::new(Some(day(2024, 1, 1)), Some(day(2024, 6, 1))).unwrap();
    assert!(!edge.contains(day(2024, 6, 1)));
    assert!(!edge.contains(day(2024, 1, 1)));
    assert!(edge.contains(day(2024, 3, 1)));
    assert!(Validity::default().contains(day(2024, 3, 1)));
  }

  #[test]
  fn inverted_interval_is_rejected() {
    assert!(Validity::new(Some(day(2024, 2, 1)), Some(day(2024, 1, 1))).is_err());
  }
}
