//! Draft validation for swiftchat.
//!
//! Checks an [`OutgoingMessage`] against the message limits before it is
//! submitted. Nothing here rewrites content beyond trimming surrounding
//! whitespace from the text.

use base64::{engine::general_purpose::STANDARD, Engine};
use swiftchat_types::OutgoingMessage;

/// Default maximum text length, in characters.
pub const DEFAULT_MAX_TEXT_LEN: usize = 1000;

/// Default maximum inline image size, in decoded bytes (5 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Error type for draft validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    /// Neither text nor image was provided.
    Empty,
    /// The text exceeds the length limit.
    TextTooLong {
        /// Length of the submitted text, in characters.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// The inline image exceeds the size limit.
    ImageTooLarge {
        /// Decoded image size in bytes.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },
    /// The inline image is not valid base64.
    InvalidImage(String),
}

impl std::fmt::Display for DraftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DraftError::Empty => write!(f, "message has neither text nor image"),
            DraftError::TextTooLong { len, max } => {
                write!(f, "message text too long ({} > {} characters)", len, max)
            }
            DraftError::ImageTooLarge { size, max } => {
                write!(f, "image too large ({} > {} bytes)", size, max)
            }
            DraftError::InvalidImage(msg) => write!(f, "invalid inline image: {}", msg),
        }
    }
}

impl std::error::Error for DraftError {}

/// Limits applied to drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftLimits {
    /// Maximum text length, in characters.
    pub max_text_len: usize,
    /// Maximum inline image size, in decoded bytes.
    pub max_image_bytes: usize,
}

impl Default for DraftLimits {
    fn default() -> Self {
        Self {
            max_text_len: DEFAULT_MAX_TEXT_LEN,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Validate a draft and return its normalized form.
///
/// Text is trimmed; blank text and blank images are dropped. At least one of
/// the two must remain. Image references that are not inline data URIs are
/// passed through unchecked.
pub fn validate_draft(
    draft: &OutgoingMessage,
    limits: &DraftLimits,
) -> Result<OutgoingMessage, DraftError> {
    let text = draft
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let image = draft.image.clone().filter(|i| !i.trim().is_empty());

    if text.is_none() && image.is_none() {
        return Err(DraftError::Empty);
    }

    if let Some(ref text) = text {
        let len = text.chars().count();
        if len > limits.max_text_len {
            return Err(DraftError::TextTooLong {
                len,
                max: limits.max_text_len,
            });
        }
    }

    if let Some(ref image) = image {
        if let Some(size) = inline_image_size(image)? {
            if size > limits.max_image_bytes {
                return Err(DraftError::ImageTooLarge {
                    size,
                    max: limits.max_image_bytes,
                });
            }
        }
    }

    Ok(OutgoingMessage {
        text,
        image,
        reply_to: draft.reply_to.clone(),
    })
}

/// Decoded size of a `data:<mime>;base64,<payload>` URI, or `None` for other references.
fn inline_image_size(image: &str) -> Result<Option<usize>, DraftError> {
    let Some(rest) = image.strip_prefix("data:") else {
        return Ok(None);
    };
    let Some((_, payload)) = rest.split_once(";base64,") else {
        return Err(DraftError::InvalidImage("data URI is not base64".into()));
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| DraftError::InvalidImage(format!("base64 decode: {}", e)))?;
    Ok(Some(bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use swiftchat_types::MessageId;

    #[test]
    fn text_is_trimmed() {
        let draft = OutgoingMessage::text("  hi there \n");
        let valid = validate_draft(&draft, &DraftLimits::default()).unwrap();
        assert_eq!(valid.text.as_deref(), Some("hi there"));
    }

    #[test]
    fn blank_draft_is_rejected() {
        let draft = OutgoingMessage::text("   ");
        assert_eq!(
            validate_draft(&draft, &DraftLimits::default()),
            Err(DraftError::Empty)
        );
        assert_eq!(
            validate_draft(&OutgoingMessage::default(), &DraftLimits::default()),
            Err(DraftError::Empty)
        );
    }

    #[test]
    fn image_only_draft_is_accepted() {
        let draft = OutgoingMessage::image("https://cdn.example.com/cat.png");
        let valid = validate_draft(&draft, &DraftLimits::default()).unwrap();
        assert!(valid.text.is_none());
        assert!(valid.image.is_some());
    }

    #[test]
    fn text_length_counts_characters() {
        let limits = DraftLimits {
            max_text_len: 3,
            ..DraftLimits::default()
        };
        assert!(validate_draft(&OutgoingMessage::text("héé"), &limits).is_ok());
        assert_eq!(
            validate_draft(&OutgoingMessage::text("four"), &limits),
            Err(DraftError::TextTooLong { len: 4, max: 3 })
        );
    }

    #[test]
    fn inline_image_size_is_checked() {
        let limits = DraftLimits {
            max_image_bytes: 4,
            ..DraftLimits::default()
        };
        let small = format!("data:image/png;base64,{}", STANDARD.encode([1u8, 2, 3, 4]));
        let large = format!("data:image/png;base64,{}", STANDARD.encode([0u8; 5]));

        assert!(validate_draft(&OutgoingMessage::image(small), &limits).is_ok());
        assert_eq!(
            validate_draft(&OutgoingMessage::image(large), &limits),
            Err(DraftError::ImageTooLarge { size: 5, max: 4 })
        );
    }

    #[test]
    fn malformed_inline_image_is_rejected() {
        let draft = OutgoingMessage::image("data:image/png;base64,@@@");
        assert!(matches!(
            validate_draft(&draft, &DraftLimits::default()),
            Err(DraftError::InvalidImage(_))
        ));

        let draft = OutgoingMessage::image("data:image/svg+xml,<svg/>");
        assert!(matches!(
            validate_draft(&draft, &DraftLimits::default()),
            Err(DraftError::InvalidImage(_))
        ));
    }

    #[test]
    fn reply_target_is_kept() {
        let draft = OutgoingMessage::text("sure").replying_to(MessageId::new("m1"));
        let valid = validate_draft(&draft, &DraftLimits::default()).unwrap();
        assert_eq!(valid.reply_to, Some(MessageId::new("m1")));
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(DraftError::Empty.to_string(), "message has neither text nor image");
        assert_eq!(
            DraftError::TextTooLong { len: 1200, max: 1000 }.to_string(),
            "message text too long (1200 > 1000 characters)"
        );
    }
}
