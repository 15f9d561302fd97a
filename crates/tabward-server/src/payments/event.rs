//! Decoding of payment-provider webhook events.
//!
//! Only the event types that change the paying flag are decoded in full; each
//! gets a struct with exactly the fields needed to find the customer's email.
//! Everything else is reported as [`WebhookEvent::Ignored`].

use serde::{Deserialize, de::DeserializeOwned};
use tabward_core::payment::PaymentEventKind;

use crate::error::Error;

/// Where the email for an event can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailSource {
  /// Embedded in the event itself.
  Known(String),
  /// Requires fetching the checkout session.
  CheckoutSession(String),
  /// Requires fetching the customer.
  Customer(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
  Relevant { kind: PaymentEventKind, email: EmailSource },
  Ignored { event_type: String },
}

// ─── Wire shapes ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Envelope {
  #[serde(rename = "type")]
  event_type: String,
  data:       EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
  object: serde_json::Value,
}

/// `customer` is an id unless the sender expanded it.
#[derive(Deserialize)]
#[serde(untagged)]
enum CustomerRef {
  Id(String),
  Expanded {
    id:    String,
    #[serde(default)]
    email: Option<String>,
  },
}

impl CustomerRef {
  fn into_source(self) -> EmailSource {
    match self {
      CustomerRef::Expanded { email: Some(email), .. } if !email.is_empty() => EmailSource::Known(email),
      CustomerRef::Expanded { id, .. } | CustomerRef::Id(id) => EmailSource::Customer(id),
    }
  }
}

#[derive(Deserialize)]
struct ContactDetails {
  #[serde(default)]
  email: Option<String>,
}

#[derive(Deserialize)]
struct CheckoutSession {
  id:               String,
  #[serde(default)]
  customer_details: Option<ContactDetails>,
  #[serde(default)]
  customer_email:   Option<String>,
}

#[derive(Deserialize)]
struct Subscription {
  customer: CustomerRef,
  status:   String,
}

#[derive(Deserialize)]
struct Charge {
  #[serde(default)]
  customer:        Option<CustomerRef>,
  #[serde(default)]
  billing_details: Option<ContactDetails>,
  #[serde(default)]
  receipt_email:   Option<String>,
}

#[derive(Deserialize)]
struct Invoice {
  #[serde(default)]
  customer:       Option<CustomerRef>,
  #[serde(default)]
  customer_email: Option<String>,
}

// ─── Decoding ────────────────────────────────────────────────────────────────

fn object<T: DeserializeOwned>(event_type: &str, value: serde_json::Value) -> Result<T, Error> {
  serde_json::from_value(value).map_err(|e| Error::BadRequest(format!("invalid {event_type} object: {e}")))
}

fn first_email(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
  candidates.into_iter().flatten().find(|e| !e.trim().is_empty())
}

/// Pick an embedded email, else fall back to the customer lookup.
fn email_or_customer(
  event_type: &str,
  embedded: Option<String>,
  customer: Option<CustomerRef>,
) -> Result<EmailSource, Error> {
  match (embedded, customer) {
    (Some(email), _) => Ok(EmailSource::Known(email)),
    (None, Some(customer)) => Ok(customer.into_source()),
    (None, None) => Err(Error::BadRequest(format!("{event_type} carries neither an email nor a customer"))),
  }
}

/// Decode a raw webhook payload.
pub fn decode(payload: &[u8]) -> Result<WebhookEvent, Error> {
  let envelope: Envelope =
    serde_json::from_slice(payload).map_err(|e| Error::BadRequest(format!("invalid event payload: {e}")))?;
  let event_type = envelope.event_type.as_str();
  let raw = envelope.data.object;

  let (kind, email) = match event_type {
    "checkout.session.completed" => {
      let session: CheckoutSession = object(event_type, raw)?;
      let embedded = first_email([session.customer_details.and_then(|d| d.email), session.customer_email]);
      let email = embedded.map(EmailSource::Known).unwrap_or(EmailSource::CheckoutSession(session.id));
      (PaymentEventKind::CheckoutCompleted, email)
    }
    "customer.subscription.deleted" => {
      let sub: Subscription = object(event_type, raw)?;
      (PaymentEventKind::SubscriptionDeleted, sub.customer.into_source())
    }
    "customer.subscription.updated" => {
      let sub: Subscription = object(event_type, raw)?;
      let kind = PaymentEventKind::SubscriptionUpdated { active: sub.status == "active" };
      (kind, sub.customer.into_source())
    }
    "charge.refunded" => {
      let charge: Charge = object(event_type, raw)?;
      let embedded = first_email([charge.billing_details.and_then(|d| d.email), charge.receipt_email]);
      (PaymentEventKind::ChargeRefunded, email_or_customer(event_type, embedded, charge.customer)?)
    }
    "invoice.payment_failed" => {
      let invoice: Invoice = object(event_type, raw)?;
      let embedded = first_email([invoice.customer_email]);
      (PaymentEventKind::InvoicePaymentFailed, email_or_customer(event_type, embedded, invoice.customer)?)
    }
    _ => return Ok(WebhookEvent::Ignored { event_type: envelope.event_type }),
  };

  Ok(WebhookEvent::Relevant { kind, email })
}
