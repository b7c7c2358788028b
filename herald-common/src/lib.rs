pub mod logging;
pub mod payload;
pub mod recipient;

pub use payload::{MediaRef, MessagePayload};
pub use recipient::{Recipient, RecipientId, RecipientIdError};

pub use tracing;
