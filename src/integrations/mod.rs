//! Thin clients for the payment processor and the email provider.

pub mod mailer;
pub mod mercadopago;
