//! Fixed spoken lines and the best-effort `speak` helper.
//!
//! Exhibit-specific narrative lives on [`Exhibit`][docent_types::Exhibit];
//! everything here is shared by all exhibits.

use docent_hal::Voice;
use tracing::{info, warn};

pub const WELCOME: &str = "Hello and welcome to my museum! Allow me to show you around!";
pub const CHECKING_OCCUPANCY: &str = "Let's see if any exhibits are empty...";
pub const ALL_OCCUPIED: &str = "All exhibits seem occupied, but I'll take you to this one anyway.";
pub const NOTHING_FOUND: &str = "I can't see any exhibits from here. Let me look again.";
pub const GIVING_UP: &str =
    "I'm having trouble finding the exhibits right now. Let's end the tour here. Sorry!";

pub const HIGH_INTEREST_INTRO: &str =
    "You look quite interested in this exhibit! Let me share more history with you.";
pub const HIGH_INTEREST_AGAIN: &str = "You look quite interested in this exhibit!";
pub const INVITE_QUESTIONS: &str = "Feel free to ask any questions about this exhibit.";
pub const NEUTRAL_INTRO: &str =
    "You seem a bit indifferent. That's okay! Feel free to ask any questions about this exhibit.";
pub const NEUTRAL_AGAIN: &str =
    "You seem a bit indifferent. No problem! Feel free to ask anything about this exhibit.";
pub const LOW_INTEREST: &str = "You don't look very interested.";

pub const EXIT_HINT: &str =
    "Say 'move on' to go to another exhibit, or 'stop' to wrap the whole visit up.";
pub const EXIT_HINT_AGAIN: &str =
    "Alternatively, say 'move on' to go to another exhibit, or 'stop' to wrap the whole visit up.";

pub const THINKING: &str = "Hmm, let me think...";
pub const NOT_CAUGHT: &str = "Sorry, I didn't catch that.";
pub const TRANSCRIPTION_APOLOGY: &str =
    "I'm sorry, I couldn't hear you properly. Could you say that again?";

pub const FAREWELL: &str = "Thanks for your visit today! Have a wonderful day.";
pub const TOUR_COMPLETE: &str =
    "You've now seen everything in the museum. I hope you enjoyed your visit!";

/// Say `text`, logging instead of failing when the speaker is unavailable.
pub async fn speak(voice: &dyn Voice, text: &str) {
    info!(%text, "speaking");
    if let Err(e) = voice.say(text).await {
        warn!(error = %e, "speech output failed");
    }
}
