//! `HostBox` Core — content records, the persisted store document, the JSON
//! response envelope, and MIME allow/deny policy.

pub mod mime;
pub mod record;
pub mod response;

pub use mime::{MimePatternError, MimePolicy};
pub use record::{ContentRecord, Store};
pub use response::{ApiReply, Envelope};
