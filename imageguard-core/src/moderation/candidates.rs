//! Candidate image extraction from chat messages.

use url::Url;

use super::chat::ChatMessage;

/// Path suffixes treated as images when a URL appears in message text.
pub const IMAGE_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Attachment,
    Link,
}

/// One image source found in a message. Lives for a single invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateImage {
    pub url: String,
    pub source: CandidateSource,
}

impl CandidateImage {
    fn attachment(url: &str) -> Self {
        Self {
            url: url.to_string(),
            source: CandidateSource::Attachment,
        }
    }

    fn link(url: &str) -> Self {
        Self {
            url: url.to_string(),
            source: CandidateSource::Link,
        }
    }
}

/// Every `http://` or `https://` URL in `text`, in order of appearance.
///
/// A URL runs until the next whitespace. Closing brackets and quotes that
/// chat clients wrap links in are trimmed.
pub fn extract_urls(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .filter_map(|token| {
            let start = [token.find("https://"), token.find("http://")]
                .into_iter()
                .flatten()
                .min()?;
            let url = token[start..].trim_end_matches(['>', ')', ']', '"', '\'', ',', ';']);
            url.split_once("://")
                .is_some_and(|(_, rest)| !rest.is_empty())
                .then_some(url)
        })
        .collect()
}

/// Whether the URL's path, ignoring query string and fragment, ends in a
/// supported image extension (case-insensitive).
pub fn has_image_extension(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase(),
    };
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Candidates for the moderation pipeline: image attachments first, then
/// image-looking URLs from the text, each in encounter order.
pub fn extract_candidates(message: &ChatMessage) -> Vec<CandidateImage> {
    let attachments = message
        .attachments
        .iter()
        .filter(|a| a.is_image())
        .map(|a| CandidateImage::attachment(&a.url));

    let links = extract_urls(&message.content)
        .into_iter()
        .filter(|url| has_image_extension(url))
        .map(CandidateImage::link);

    attachments.chain(links).collect()
}

/// Targets for the curation command on the replied-to message.
///
/// The first image attachment wins outright. Without one, every text URL
/// that contains `trusted_marker` and ends in an image extension is a
/// separate target. Third-party URLs are never trusted here.
pub fn curation_targets(message: &ChatMessage, trusted_marker: &str) -> Vec<CandidateImage> {
    if let Some(attachment) = message.attachments.iter().find(|a| a.is_image()) {
        return vec![CandidateImage::attachment(&attachment.url)];
    }

    extract_urls(&message.content)
        .into_iter()
        .filter(|url| url.contains(trusted_marker) && has_image_extension(url))
        .map(CandidateImage::link)
        .collect()
}
