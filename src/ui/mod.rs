//! Discord presentation: embeds for replies and playback events, and the
//! player buttons.

pub mod buttons;
pub mod embeds;
