use colored::Colorize;

use super::Flow;

pub fn handle_command(input: &str) -> Result<Flow, String> {
    match input.to_lowercase().as_str() {
        "help" => {
            println!("\n📚 Knowledge Finder Commands:");
            println!("  Just type a question to search your papers");
            println!("  ask <question>     - Ask a question with citations");
            println!();

            println!("📄 Document Commands:");
            println!("  upload <file.pdf>  - Copy a PDF into the papers folder");
            println!("  rebuild            - Re-embed every paper and rebuild the index");
            println!("  clear              - Delete the index and its metadata");
            println!("  status             - Show index and document information");
            println!();

            println!("⚙️ System Commands:");
            println!("  help  - Show this help menu");
            println!("  exit  - Exit the program");
            println!();
            Ok(Flow::Continue)
        }
        "exit" | "quit" => {
            println!("{}", "👋 Goodbye!".bright_cyan());
            Ok(Flow::Exit)
        }
        _ => Err("Unknown system command. Type 'help' for available commands.".to_string()),
    }
}
