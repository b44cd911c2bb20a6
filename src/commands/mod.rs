use std::sync::Arc;

use crate::knowledge_base::KnowledgeBase;

mod document;
mod system;

/// Whether the REPL should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    System(&'a str),
    Upload(&'a str),
    Rebuild,
    Clear,
    Status,
    Ask(&'a str),
}

impl<'a> Command<'a> {
    /// Anything that is not a known command is treated as a question.
    pub fn parse(input: &'a str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let (word, rest) = match input.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (input, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "help" | "exit" | "quit" if rest.is_empty() => Command::System(input),
            "upload" => Command::Upload(rest),
            "rebuild" if rest.is_empty() => Command::Rebuild,
            "clear" if rest.is_empty() => Command::Clear,
            "status" if rest.is_empty() => Command::Status,
            "ask" => Command::Ask(rest),
            _ => Command::Ask(input),
        };
        Some(command)
    }
}

pub struct CommandHandler {
    kb: Arc<KnowledgeBase>,
}

impl CommandHandler {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    pub async fn handle_command(&self, input: &str) -> Result<Flow, String> {
        let Some(command) = Command::parse(input) else {
            return Ok(Flow::Continue);
        };

        match command {
            Command::System(input) => return system::handle_command(input),
            Command::Upload(path) => document::upload(&self.kb, path).await?,
            Command::Rebuild => document::rebuild(&self.kb).await?,
            Command::Clear => document::clear(&self.kb).await?,
            Command::Status => document::status(&self.kb).await?,
            Command::Ask(question) => document::ask(&self.kb, question).await?,
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_base::tests::open;
    use crate::providers::testing::CannedCompleter;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn uploads_a_pdf_whose_path_has_spaces() {
        let dir = TempDir::new().unwrap();
        let kb = Arc::new(open(&dir, Arc::new(CannedCompleter::answering("ok [1]"))).await);
        let handler = CommandHandler::new(kb.clone());

        let source = dir.path().join("My Paper.pdf");
        std::fs::write(&source, "spaced out").unwrap();

        let flow = handler
            .handle_command(&format!("upload {}", source.display()))
            .await
            .unwrap();
        assert_eq!(flow, Flow::Continue);
        assert!(kb.config().storage.papers_dir.join("My Paper.pdf").exists());
        assert!(kb.is_loaded());

        let status = kb.status().await.unwrap();
        assert_eq!(status.documents[0].name, "My Paper.pdf");
    }

    #[tokio::test]
    async fn exit_stops_and_missing_files_are_reported() {
        let dir = TempDir::new().unwrap();
        let handler = CommandHandler::new(Arc::new(open(&dir, Arc::new(CannedCompleter::answering("a"))).await));

        assert_eq!(handler.handle_command("exit").await.unwrap(), Flow::Exit);
        let err = handler.handle_command("upload nowhere/missing.pdf").await.unwrap_err();
        assert!(err.starts_with("Upload failed"));
    }

    #[test]
    fn parses_commands_and_bare_questions() {
        assert_eq!(Command::parse("  "), None);
        assert_eq!(Command::parse("help"), Some(Command::System("help")));
        assert_eq!(Command::parse("upload ~/papers/a b.pdf"), Some(Command::Upload("~/papers/a b.pdf")));
        assert_eq!(Command::parse("REBUILD"), Some(Command::Rebuild));
        assert_eq!(Command::parse("status"), Some(Command::Status));
        assert_eq!(Command::parse("ask what is scanning?"), Some(Command::Ask("what is scanning?")));
        assert_eq!(Command::parse("what is scanning?"), Some(Command::Ask("what is scanning?")));
        // a known word followed by text reads as a question
        assert_eq!(Command::parse("clear speech matters?"), Some(Command::Ask("clear speech matters?")));
    }
}
