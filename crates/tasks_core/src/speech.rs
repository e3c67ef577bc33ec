use crate::config::Config;
use crate::error::AppError;
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Partial hypothesis, replaced by the next event.
    Interim(String),
    Final(String),
}

pub trait SpeechRecognizer {
    /// Captures one utterance, streaming transcript events until the
    /// recognizer stops.
    fn listen(&mut self, on_event: &mut dyn FnMut(TranscriptEvent)) -> Result<(), AppError>;
}

/// Accumulates finalized segments and tracks the live interim segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictation {
    finals: Vec<String>,
    interim: String,
}

impl Dictation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: TranscriptEvent) {
        match event {
            TranscriptEvent::Interim(text) => self.interim = text.trim().to_string(),
            TranscriptEvent::Final(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    self.finals.push(text.to_string());
                }
                self.interim.clear();
            }
        }
    }

    /// Finalized text so far.
    pub fn final_text(&self) -> String {
        self.finals.join(" ")
    }

    /// What the input field shows while listening: finals plus the interim.
    pub fn display_text(&self) -> String {
        let mut text = self.final_text();
        if !self.interim.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&self.interim);
        }
        text
    }
}

/// Runs one dictation and returns the finalized transcript.
pub fn dictate(
    recognizer: &mut dyn SpeechRecognizer,
    mut on_progress: impl FnMut(&Dictation),
) -> Result<String, AppError> {
    let mut dictation = Dictation::new();
    recognizer.listen(&mut |event| {
        dictation.apply(event);
        on_progress(&dictation);
    })?;
    Ok(dictation.final_text())
}

/// Parses one output line of a speech command: `interim: <text>` or
/// `final: <text>`. Other lines are ignored.
pub fn parse_transcript_line(line: &str) -> Option<TranscriptEvent> {
    let (kind, text) = line.split_once(':')?;
    let text = text.trim().to_string();
    match kind.trim().to_ascii_lowercase().as_str() {
        "interim" => Some(TranscriptEvent::Interim(text)),
        "final" => Some(TranscriptEvent::Final(text)),
        _ => None,
    }
}

/// Speech recognition delegated to an external program that prints
/// transcript lines on stdout.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(command_line: &str) -> Result<Self, AppError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| AppError::invalid_input("speech_command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn listen(&mut self, on_event: &mut dyn FnMut(TranscriptEvent)) -> Result<(), AppError> {
        info!(program = %self.program, "starting speech command");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| {
                AppError::unsupported(format!(
                    "could not start speech command `{}`: {err}",
                    self.program
                ))
            })?;

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        child.kill().ok();
                        child.wait().ok();
                        return Err(err.into());
                    }
                };
                match parse_transcript_line(&line) {
                    Some(event) => on_event(event),
                    None => debug!(line = %line, "ignoring speech output"),
                }
            }
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(AppError::io(format!("speech command exited with {status}")));
        }
        Ok(())
    }
}

pub fn recognizer_from_config(config: &Config) -> Result<Box<dyn SpeechRecognizer>, AppError> {
    match config.speech_command.as_deref().map(str::trim) {
        Some(command) if !command.is_empty() => Ok(Box::new(CommandRecognizer::new(command)?)),
        _ => Err(AppError::unsupported(
            "voice input is not available: set speech_command in the config file",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Dictation, SpeechRecognizer, TranscriptEvent, dictate, parse_transcript_line,
        recognizer_from_config,
    };
    use crate::config::Config;
    use crate::error::AppError;

    struct Scripted(Vec<TranscriptEvent>);

    impl SpeechRecognizer for Scripted {
        fn listen(&mut self, on_event: &mut dyn FnMut(TranscriptEvent)) -> Result<(), AppError> {
            for event in self.0.drain(..) {
                on_event(event);
            }
            Ok(())
        }
    }

    #[test]
    fn dictation_tracks_interim_and_finals() {
        let mut dictation = Dictation::new();
        dictation.apply(TranscriptEvent::Interim("buy".into()));
        assert_eq!(dictation.display_text(), "buy");
        assert_eq!(dictation.final_text(), "");

        dictation.apply(TranscriptEvent::Final("buy milk".into()));
        dictation.apply(TranscriptEvent::Interim("and".into()));
        assert_eq!(dictation.display_text(), "buy milk and");

        dictation.apply(TranscriptEvent::Final(" and eggs ".into()));
        assert_eq!(dictation.final_text(), "buy milk and eggs");
    }

    #[test]
    fn dictate_reports_progress() {
        let mut recognizer = Scripted(vec![
            TranscriptEvent::Interim("call".into()),
            TranscriptEvent::Final("call mom".into()),
        ]);
        let mut seen = Vec::new();
        let text = dictate(&mut recognizer, |dictation| seen.push(dictation.display_text()))
            .unwrap();

        assert_eq!(text, "call mom");
        assert_eq!(seen, ["call", "call mom"]);
    }

    #[test]
    fn parses_transcript_lines() {
        assert_eq!(
            parse_transcript_line("interim: buy mi"),
            Some(TranscriptEvent::Interim("buy mi".into()))
        );
        assert_eq!(
            parse_transcript_line("FINAL:buy milk"),
            Some(TranscriptEvent::Final("buy milk".into()))
        );
        assert_eq!(parse_transcript_line("listening..."), None);
        assert_eq!(parse_transcript_line("level: 0.4"), None);
    }

    #[test]
    fn missing_command_is_unsupported() {
        let err = recognizer_from_config(&Config::default()).err().unwrap();
        assert_eq!(err.code(), "unsupported_capability");

        let config = Config {
            speech_command: Some("   ".into()),
            ..Config::default()
        };
        assert!(recognizer_from_config(&config).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn command_recognizer_reads_stdout() {
        let config = Config {
            speech_command: Some("echo final: hello there".into()),
            ..Config::default()
        };
        let mut recognizer = recognizer_from_config(&config).unwrap();
        let text = dictate(recognizer.as_mut(), |_| {}).unwrap();
        assert_eq!(text, "hello there");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_output_is_an_io_error() {
        let config = Config {
            speech_command: Some("printf \\377\\n".into()),
            ..Config::default()
        };
        let mut recognizer = recognizer_from_config(&config).unwrap();
        let err = dictate(recognizer.as_mut(), |_| {}).unwrap_err();
        assert_eq!(err.code(), "io_error");
    }

    #[test]
    fn unknown_program_is_unsupported() {
        let config = Config {
            speech_command: Some("definitely-not-a-speech-tool-4821".into()),
            ..Config::default()
        };
        let mut recognizer = recognizer_from_config(&config).unwrap();
        let err = dictate(recognizer.as_mut(), |_| {}).unwrap_err();
        assert_eq!(err.code(), "unsupported_capability");
    }
}
