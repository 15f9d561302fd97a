//! The `AccountStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `tabward-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  account::{Account, Identity},
  blocklist::BlockPattern,
  history::{HistoryEntry, MergedEntry},
  payment::PaymentEffect,
  stats::Stats,
};

/// Abstraction over a Tabward storage backend.
///
/// Every method is one logical operation and must be atomic: a failed call
/// leaves no partial writes behind. Every per-user method is scoped by the
/// identity provider's subject id; nothing crosses subjects.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait AccountStore: Clone + Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Accounts ──────────────────────────────────────────────────────────

  /// Return the account for a verified identity, creating it if needed.
  ///
  /// An email-only account (created earlier by a payment event) is linked to
  /// the identity's subject id. If the identity's email changed, the stored
  /// email follows it.
  fn ensure_account<'a>(
    &'a self,
    identity: &'a Identity,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + 'a;

  /// Set the paying flag on the account with `email`.
  ///
  /// Returns `None` when no account matches and the effect does not ask for
  /// one to be created.
  fn apply_payment<'a>(
    &'a self,
    email: &'a str,
    effect: PaymentEffect,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  // ── Block patterns ────────────────────────────────────────────────────

  /// All stored patterns for a subject.
  fn list_patterns<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Vec<BlockPattern>, Self::Error>> + Send + 'a;

  /// Replace the subject's pattern set with `submitted` and return the
  /// committed set, re-read from storage.
  fn sync_patterns<'a>(
    &'a self,
    subject_id: &'a str,
    submitted: Vec<BlockPattern>,
  ) -> impl Future<Output = Result<Vec<BlockPattern>, Self::Error>> + Send + 'a;

  // ── Blocking history ──────────────────────────────────────────────────

  /// The subject's full history, ordered by timestamp.
  fn history<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Vec<HistoryEntry>, Self::Error>> + Send + 'a;

  /// Merge client-held entries into the subject's history, keyed by
  /// timestamp. Returns only the entries that were created or updated.
  fn merge_history<'a>(
    &'a self,
    subject_id: &'a str,
    entries: Vec<HistoryEntry>,
  ) -> impl Future<Output = Result<Vec<MergedEntry>, Self::Error>> + Send + 'a;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Aggregate the subject's history into [`Stats`].
  fn stats<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Stats, Self::Error>> + Send + 'a;
}
