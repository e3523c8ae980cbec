use crate::continuity::{RestartHost, SessionStore};
use crate::conversation::{ChatSurface, ConversationEntry, Role};
use crate::render::RenderBackend;
use crate::scene::SceneDescriptor;
use crate::studio::{Frontend, Studio};
use crate::ui::StatusPanel;
use crate::viewport::{ViewportState, ViewportSurface};
use std::io::Write;
use std::time::Instant;

const LOADING_STEPS: [&str; 3] = ["Analyzing prompt", "Preparing splats", "Rendering scene"];

const HELP: &str = "\
commands:
  <text>           chat with the studio
  1..3             pick a suggestion from the latest reply
  /scenes          list the gallery
  /load <id>       load a gallery scene
  /reset           reset the camera
  /close           close the current scene
  /clear           clear the conversation
  /regenerate      retry the last message
  /variant         create a variant
  /enhance         enhance the current creation
  /idea            suggest a prompt
  /forget          reset all session state
  /quit            exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Chat(String),
    Pick(usize),
    Gallery,
    Load(String),
    ResetCamera,
    Close,
    Clear,
    Regenerate,
    Variant,
    Enhance,
    Idea,
    Forget,
    Help,
    Quit,
    Unknown(String),
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Ok(number) = line.parse::<usize>() {
        if number >= 1 {
            return Some(ConsoleCommand::Pick(number - 1));
        }
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(ConsoleCommand::Chat(line.to_string()));
    };
    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };
    let command = match name.to_ascii_lowercase().as_str() {
        "scenes" | "gallery" => ConsoleCommand::Gallery,
        "load" if !argument.is_empty() => ConsoleCommand::Load(argument.to_string()),
        "reset" => ConsoleCommand::ResetCamera,
        "close" => ConsoleCommand::Close,
        "clear" => ConsoleCommand::Clear,
        "regenerate" => ConsoleCommand::Regenerate,
        "variant" => ConsoleCommand::Variant,
        "enhance" => ConsoleCommand::Enhance,
        "idea" => ConsoleCommand::Idea,
        "forget" => ConsoleCommand::Forget,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        _ => ConsoleCommand::Unknown(line.to_string()),
    };
    Some(command)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub fn dispatch<B, S, H, F>(
    studio: &mut Studio<B, S, H, F>,
    command: ConsoleCommand,
    now: Instant,
) -> Flow
where
    B: RenderBackend,
    S: SessionStore,
    H: RestartHost,
    F: Frontend,
{
    match command {
        ConsoleCommand::Chat(text) => {
            studio.submit_message(&text, now);
        }
        ConsoleCommand::Pick(index) => {
            studio.select_suggestion(index, now);
        }
        ConsoleCommand::Gallery => studio.show_gallery(),
        ConsoleCommand::Load(scene_id) => studio.load_scene(&scene_id, now),
        ConsoleCommand::ResetCamera => studio.reset_camera(),
        ConsoleCommand::Close => studio.close_session(now),
        ConsoleCommand::Clear => studio.clear_conversation(),
        ConsoleCommand::Regenerate => studio.regenerate(now),
        ConsoleCommand::Variant => studio.create_variant(now),
        ConsoleCommand::Enhance => studio.enhance(now),
        ConsoleCommand::Idea => {
            studio.suggest_prompt();
        }
        ConsoleCommand::Forget => studio.reset_session(),
        ConsoleCommand::Help => studio.frontend_mut().notify(HELP),
        ConsoleCommand::Quit => return Flow::Quit,
        ConsoleCommand::Unknown(line) => studio
            .frontend_mut()
            .notify(&format!("Unknown command '{}', try /help", line)),
    }
    Flow::Continue
}

/// Text frontend: prints the transcript, viewport changes and status line.
pub struct ConsoleFrontend<W: Write> {
    out: W,
    last_status: String,
}

impl ConsoleFrontend<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleFrontend<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_status: String::new(),
        }
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(err) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            log::warn!("Console output failed: {}", err);
        }
    }
}

impl<W: Write> ChatSurface for ConsoleFrontend<W> {
    fn show_entry(&mut self, entry: &ConversationEntry) {
        let speaker = match entry.role {
            Role::User => "you",
            Role::Assistant => "studio",
        };
        if !entry.text.is_empty() {
            self.line(&format!("{}> {}", speaker, entry.text));
        }
        for (index, suggestion) in entry.suggestions.iter().enumerate() {
            self.line(&format!("  [{}] {}", index + 1, suggestion.label));
        }
    }

    fn clear_entries(&mut self) {
        self.line("(conversation cleared)");
    }
}

impl<W: Write> ViewportSurface for ConsoleFrontend<W> {
    fn set_region_visible(&mut self, region: ViewportState, visible: bool) {
        if visible {
            log::debug!("viewport: {}", region.label());
        }
    }

    fn set_loading_step(&mut self, step: usize) {
        let label = LOADING_STEPS.get(step).copied().unwrap_or("Working");
        self.line(&format!("  ... {} ({}/{})", label, step + 1, LOADING_STEPS.len()));
    }
}

impl<W: Write> Frontend for ConsoleFrontend<W> {
    fn show_status(&mut self, panel: &StatusPanel) {
        if panel.summary() != self.last_status {
            self.last_status = panel.summary().to_string();
            let status = self.last_status.clone();
            self.line(&status);
        }
    }

    fn show_gallery(&mut self, scenes: &[SceneDescriptor]) {
        self.line("gallery:");
        for scene in scenes {
            self.line(&format!(
                "  {:<16} {} - {}",
                scene.id,
                scene.gallery_title(),
                scene.description
            ));
        }
    }

    fn notify(&mut self, message: &str) {
        self.line(&format!("* {}", message));
    }

    fn prefill_input(&mut self, text: &str) {
        self.line(&format!("idea: {}", text));
    }
}
