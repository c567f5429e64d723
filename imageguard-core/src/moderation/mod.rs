//! Chat moderation: candidate extraction, the per-message pipeline, the
//! moderator curation command and the concurrent event service.
//!
//! Handlers receive a [`GuardContext`] explicitly; there is no global state.

pub mod candidates;
pub mod chat;
pub mod context;
pub mod curation;
pub mod pipeline;
pub mod service;

pub use candidates::{
    curation_targets, extract_candidates, extract_urls, has_image_extension, CandidateImage,
    CandidateSource, IMAGE_EXTENSIONS,
};
pub use chat::{Attachment, ChatEvent, ChatGateway, ChatMessage, OutboundAction, RecordingGateway};
pub use context::{GuardContext, Timeouts};
pub use curation::{
    add_if_new, is_block_command, AddOutcome, CurationHandler, CurationOutcome, BLOCK_COMMAND,
};
pub use pipeline::{BlockReason, ModerationDecision, ModerationPipeline, BANNED_NOTICE};
pub use service::{EventOutcome, EventRouter, ModerationService, ServiceConfig, ServiceStats};
