//! Media attachments for multipart uploads.

use plaza_core::FormPart;

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Form field carrying this file under `field`.
    pub fn form_part(&self, field: &str) -> FormPart {
        FormPart::File {
            name: field.to_string(),
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            bytes: self.bytes.clone(),
        }
    }
}
