//! Audio format selection.
//!
//! Sound is forwarded by the `guacsnd` channel plugin; the relay only picks
//! the format, which decides whether the channel is loaded at all.

use tracing::info;

/// Mimetypes the sound channel can produce.
pub const SUPPORTED_AUDIO_MIMETYPES: [&str; 2] = ["audio/ogg", "audio/wav"];

/// Name of the sound channel plugin.
pub const AUDIO_CHANNEL: &str = "guacsnd";

/// Returns the first mimetype, in the client's order of preference, that
/// the sound channel can produce.
pub fn select_mimetype(client_mimetypes: &[String]) -> Option<&'static str> {
    let chosen = client_mimetypes.iter().find_map(|offered| {
        SUPPORTED_AUDIO_MIMETYPES
            .iter()
            .copied()
            .find(|supported| supported == offered)
    });
    match chosen {
        Some(mimetype) => info!(mimetype, "audio format selected"),
        None => info!("no supported audio format offered, sound disabled"),
    }
    chosen
}
