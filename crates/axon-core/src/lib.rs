pub mod chat;
pub mod config;
pub mod gate;
pub mod notify;
pub mod redirect;
pub mod routes;
pub mod session_source;
pub mod speech;
pub mod speech_backends;

pub use chat::*;
pub use config::*;
pub use gate::*;
pub use notify::*;
pub use redirect::*;
pub use routes::*;
pub use session_source::*;
pub use speech::*;
pub use speech_backends::*;

use std::sync::Arc;

/// Speech controller wired from the `speech` config section.
pub fn build_speech_controller(section: &SpeechSection) -> SpeechController {
    if !section.enabled {
        return SpeechController::disabled();
    }
    let synth: Arc<dyn SpeechSynthesizer> = Arc::new(CommandSynthesizer::new(&section.synth_command));
    let player = if section.player_command == "ffplay" {
        CommandPlayer::ffplay()
    } else {
        CommandPlayer::new(&section.player_command, Vec::new())
    };
    let player: Option<Arc<dyn AudioPlayer>> = if player.is_available() {
        Some(Arc::new(player))
    } else {
        tracing::debug!(program = %section.player_command, "audio player not found");
        None
    };
    SpeechController::new(Some(synth), player, &section.lang)
}
