//! Line-oriented chat protocol
//!
//! - Line framing codec
//! - Inbound line classification (`#login` vs chat text)
//! - Server reply and broadcast formats

pub mod codec;
pub mod constants;
pub mod message;

pub use codec::{CodecError, LineCodec};
pub use message::{format_chat, format_server_broadcast, ClientLine, Reply};
