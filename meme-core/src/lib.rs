//! # Meme Core
//!
//! Element model and interaction logic for the meme editor.
//! Has no rendering dependencies; the renderer crate reads from it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 meme-core                   │
//! ├─────────────────────────────────────────────┤
//! │  Element Model   │  Interaction Engine      │
//! │  - Text elements │  - Pointer / touch drag  │
//! │  - Image overlays│  - Rotate / scale steps  │
//! │  - Document      │  - Expiring selection    │
//! ├─────────────────────────────────────────────┤
//! │  Upload checks   │  Toast collaborator      │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod document;
pub mod element;
pub mod error;
pub mod event;
pub mod interaction;
pub mod notify;
pub mod selection;
pub mod upload;

pub use document::Document;
pub use element::{
    ElementId, ImageElement, ImagePatch, ImageSourceKind, TextElement, TextPatch, TextRole,
};
pub use error::{CoreError, CoreResult};
pub use event::{Bounds, PointerEvent, PointerPhase, PointerSource};
pub use interaction::{InteractionEngine, PointerOutcome};
pub use notify::{Notifier, RecordingNotifier, Toast, ToastVariant, TracingNotifier};
pub use selection::{ElementRef, ExpiringSelection, SELECTION_IDLE_TIMEOUT};
pub use upload::{read_as_data_uri, validate_upload, UploadError, MAX_UPLOAD_BYTES};

/// Meme core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
