//! `onair check`: validate a show file and summarize it.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;

use crate::config::ShowFile;

pub fn execute(config: &Path) -> Result<()> {
    let file = ShowFile::load(config)?;
    println!("{} is a valid show\n", config.display());
    print!("{}", summary(&file));
    Ok(())
}

fn summary(file: &ShowFile) -> String {
    let show = &file.show;
    let openai = &file.openai;
    let mut out = String::from("Hosts:\n");
    for persona in &show.personas {
        let _ = writeln!(
            out,
            "  {:<12} {:<20} voice {} x{}",
            persona.id, persona.name, persona.voice, persona.speed
        );
    }

    let _ = writeln!(
        out,
        "\nModels: {} (chat), {} (speech), {} (transcription) at {}",
        openai.chat_model, openai.speech_model, openai.transcription_model, openai.base_url
    );
    if show.output.encoder_command.is_empty() {
        out.push_str("Encoder: none\n");
    } else {
        let _ = writeln!(out, "Encoder: {}", show.output.encoder_command.join(" "));
    }
    if show.ad_lib.is_active() {
        let _ = writeln!(out, "Ad-libs: on, p={}", show.ad_lib.probability);
    } else {
        out.push_str("Ad-libs: off\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_hosts_and_outputs() {
        let file = ShowFile::parse(
            r#"{
                "personas": [
                    { "id": "ava", "name": "Ava", "systemPrompt": "You are Ava.", "voice": "nova", "speed": 1.1 }
                ],
                "output": { "encoderCommand": ["ffmpeg", "-i", "-"] }
            }"#,
        )
        .unwrap();

        let text = summary(&file);
        assert!(text.contains("ava"));
        assert!(text.contains("voice nova x1.1"));
        assert!(text.contains("Encoder: ffmpeg -i -"));
        assert!(text.contains("Ad-libs: off"));
    }
}
