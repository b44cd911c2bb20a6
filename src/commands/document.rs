use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use crate::knowledge_base::{Answer, IndexStatus, KnowledgeBase};
use crate::llm::semantic_search::format_results;

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Splits an `upload` argument list into paths. Quoted paths are taken as
/// is; unquoted words are joined until one ends in `.pdf`, so
/// `My Paper.pdf other.pdf` yields two paths.
pub(crate) fn split_paths(input: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else { break };

        if first == '"' || first == '\'' {
            chars.next();
            let quoted: String = chars.by_ref().take_while(|&c| c != first).collect();
            if !pending.is_empty() {
                paths.push(pending.join(" "));
                pending.clear();
            }
            if !quoted.is_empty() {
                paths.push(quoted);
            }
            continue;
        }

        let mut word = String::new();
        while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
            word.push(c);
        }
        let ends_path = word.to_lowercase().ends_with(".pdf");
        pending.push(word);
        if ends_path {
            paths.push(pending.join(" "));
            pending.clear();
        }
    }

    if !pending.is_empty() {
        paths.push(pending.join(" "));
    }
    paths
}

pub async fn upload(kb: &KnowledgeBase, paths: &str) -> Result<(), String> {
    let paths = split_paths(paths);
    if paths.is_empty() {
        return Err("Missing file path. Usage: upload <file.pdf> [more.pdf ...]".to_string());
    }

    for path in &paths {
        let stored = kb
            .import_file(Path::new(path))
            .await
            .map_err(|e| format!("Upload failed: {}", e))?;
        println!("📥 Stored {}", stored.display().to_string().bright_yellow());
    }

    if kb.is_loaded() {
        println!("💡 Run {} to include new papers in the index.", "rebuild".cyan());
        return Ok(());
    }

    let bar = spinner("Building index...");
    let built = kb.build_if_missing().await;
    bar.finish_and_clear();
    if built.map_err(|e| format!("Index build failed: {}", e))? {
        println!("{}", "✅ Index built".green());
    }
    Ok(())
}

pub async fn rebuild(kb: &KnowledgeBase) -> Result<(), String> {
    let bar = spinner("Re-embedding papers...");
    let result = kb.rebuild().await;
    bar.finish_and_clear();

    let index = result.map_err(|e| format!("Rebuild failed: {}", e))?;
    println!("{} {} chunks", "✅ Index rebuilt with".green(), index.len().to_string().cyan());
    Ok(())
}

pub async fn clear(kb: &KnowledgeBase) -> Result<(), String> {
    kb.clear().await.map_err(|e| format!("Clear failed: {}", e))?;
    println!("{}", "🗑️ Index cleared".yellow());
    Ok(())
}

pub async fn status(kb: &KnowledgeBase) -> Result<(), String> {
    let status = kb.status().await.map_err(|e| format!("Status failed: {}", e))?;
    print_status(&status);
    Ok(())
}

pub async fn ask(kb: &KnowledgeBase, question: &str) -> Result<(), String> {
    if question.is_empty() {
        return Err("Please provide a question.".to_string());
    }

    let bar = spinner("Searching papers...");
    let result = kb.ask(question, None).await;
    bar.finish_and_clear();

    let answer = result.map_err(|e| e.to_string())?;
    print_answer(&answer);
    Ok(())
}

fn print_status(status: &IndexStatus) {
    println!("\n📊 Index Status:");
    if status.loaded {
        println!("  Loaded:    {}", "yes".green());
        println!("  Entries:   {}", status.entries.to_string().cyan());
        if let Some(dimension) = status.dimension {
            println!("  Dimension: {}", dimension.to_string().cyan());
        }
    } else {
        println!("  Loaded:    {}", "no".red());
    }

    println!("\n📄 Documents ({}):", status.documents.len());
    for doc in &status.documents {
        match doc.pages {
            Some(pages) => println!("  • {} ({} pages)", doc.name, pages),
            None => println!("  • {} ({})", doc.name, "unreadable".red()),
        }
    }
    println!();
}

fn print_answer(answer: &Answer) {
    println!("\n{}", answer.answer.truecolor(255, 236, 179));

    if !answer.citations.is_empty() {
        println!("\n🔗 Sources:");
        for citation in answer.citations.iter() {
            println!(
                "  {} {}, page {}",
                citation.marker.cyan(),
                citation.source_document,
                citation.page_number
            );
        }
    }

    if !answer.retrieved.is_empty() {
        println!("\n📑 Retrieved context:");
        print!("{}", format_results(&answer.retrieved).dimmed());
    }
    println!();
}
