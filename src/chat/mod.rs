//! Chat helpers: message text extraction and file uploads.

pub mod message;
pub mod upload;

pub use message::{conversation_to_wire, extract_text, to_wire};
pub use upload::{UploadedFile, new_chat_id, upload_files};
