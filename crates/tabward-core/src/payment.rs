//! Payment events and their effect on an account's paying flag.
//!
//! Provider-specific decoding lives with the HTTP layer; this module only
//! knows which kinds of event matter and what each one does.

/// Payment events that change the paying flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventKind {
  CheckoutCompleted,
  SubscriptionDeleted,
  SubscriptionUpdated { active: bool },
  ChargeRefunded,
  InvoicePaymentFailed,
}

/// The write a payment event asks for.
///
/// Every effect sets the flag to a value, so applying the same event twice
/// leaves the account unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentEffect {
  pub is_paying:         bool,
  /// Create an email-only account when none matches.
  pub create_if_missing: bool,
}

impl PaymentEventKind {
  pub fn effect(self) -> PaymentEffect {
    match self {
      Self::CheckoutCompleted => PaymentEffect { is_paying: true, create_if_missing: true },
      Self::SubscriptionUpdated { active } => {
        PaymentEffect { is_paying: active, create_if_missing: false }
      }
      Self::SubscriptionDeleted | Self::ChargeRefunded | Self::InvoicePaymentFailed => {
        PaymentEffect { is_paying: false, create_if_missing: false }
      }
    }
  }
}
