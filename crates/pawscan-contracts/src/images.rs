use serde::{Deserialize, Serialize};

/// One uploaded image, ready for transmission to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub mime_type: String,
    /// Standard base64 body, no `data:` prefix.
    pub data: String,
}

impl ImagePayload {
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// An image as handed over by the caller, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// `data:<mime>;base64,<payload>` as produced by a browser file reader.
    DataUri(String),
    /// Raw bytes; the MIME type is sniffed from the content when not declared.
    Bytes {
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
}
