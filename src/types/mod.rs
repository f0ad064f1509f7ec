//! Record types carried by the inbound stream

pub mod fields;
pub mod message;
pub mod transaction;

pub use fields::{DecodeRecord, Decoded, FieldReader};
pub use message::SocialMessage;
pub use transaction::Transaction;
