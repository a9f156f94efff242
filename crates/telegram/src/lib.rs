//! Telegram Integration - lead submission pipeline
//!
//! This crate delivers storefront leads to a Telegram channel:
//! - **Client** (`client`) - minimal Bot API `sendMessage` client
//! - **Transports** (`transport`) - mock / relay / direct delivery strategies
//! - **Controller** (`controller`) - in-flight guard and UI-facing status
//! - **Pipeline** (`pipeline`) - validate, snapshot, submit, clear cart
//!
//! # Getting Started
//!
//! 1. Create a bot with @BotFather and note the token
//! 2. Add the bot to the destination channel and note the chat id
//! 3. Set env vars: `ARBORA_TELEGRAM_BOT_TOKEN`, `ARBORA_TELEGRAM_CHAT_ID`
//! 4. Pick a transport mode: `mock` (dev), `relay`, or `direct`
//!
//! # Architecture
//!
//! ```text
//! Form → validate → CartStore snapshot → LeadPayload
//!                                            ↓
//!                 LeadSubmitter (one in flight) → LeadTransport → Telegram
//! ```
//!
//! # Key Types
//!
//! - `LeadTransport` - delivery strategy selected once at startup
//! - `DeliveryReceipt` - `Delivered` vs `DispatchedUnconfirmed` vs `SpamDiscarded`
//! - `LeadSubmitter` - submission state machine with double-submit guard
//! - `LeadPipeline` - end-to-end flow for embedding callers

pub mod client;
pub mod controller;
pub mod pipeline;
pub mod transport;

pub use client::{MessageSink, SendError, TelegramClient};
pub use controller::{LeadSubmitter, SubmissionState};
pub use pipeline::LeadPipeline;
pub use transport::{
    select_transport, DeliveryReceipt, DirectTransport, LeadTransport, MockTransport,
    RelayTransport, TransportError,
};
