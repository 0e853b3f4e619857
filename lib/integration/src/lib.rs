//! Outbound delivery integrations for the nurture engine.
//!
//! This crate provides:
//!
//! - **Collaborator traits**: [`MailSender`], [`ChatPoster`], [`HttpCaller`]
//!   and [`MessageSender`], the seams the step handlers call through
//! - **HTTP implementations**: Resend-style transactional mail, generic chat
//!   webhooks, a plain HTTP caller, and Twilio-style SMS/WhatsApp delivery

pub mod chat;
pub mod error;
pub mod http;
pub mod mail;
pub mod messaging;

pub use chat::{ChatPoster, WebhookPoster};
pub use error::ConnectorError;
pub use http::{HttpCallResult, HttpCaller, HttpMethod, ReqwestHttpCaller};
pub use mail::{DeliveryResult, MailSender, ResendMailer};
pub use messaging::{MessageChannel, MessageSender, TwilioMessenger};
