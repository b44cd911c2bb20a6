use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use knowledge_finder::api;
use knowledge_finder::commands::{CommandHandler, Flow};
use knowledge_finder::config::{AppConfig, ProviderKind};
use knowledge_finder::document::PdfPageExtractor;
use knowledge_finder::knowledge_base::KnowledgeBase;
use knowledge_finder::providers::build_providers;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Ask questions about your PDF papers, with citations", long_about = None)]
struct Args {
    /// Serve the HTTP API instead of the interactive prompt
    #[arg(long)]
    api: bool,

    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// bedrock or openai
    #[arg(long)]
    provider: Option<ProviderKind>,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    papers_dir: Option<PathBuf>,

    #[arg(short = 'k', long)]
    top_k: Option<usize>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(data_dir) = &self.data_dir {
            let storage = &mut config.storage;
            for path in [&mut storage.index_path, &mut storage.metadata_path] {
                if let Some(name) = path.file_name().map(|n| n.to_os_string()) {
                    *path = data_dir.join(name);
                }
            }
            storage.data_dir = data_dir.clone();
        }
        if let Some(papers_dir) = &self.papers_dir {
            config.storage.papers_dir = papers_dir.clone();
        }
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    colored::control::set_override(true);
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut config = AppConfig::from_env().context("Failed to read configuration")?;
    args.apply(&mut config);

    let providers = build_providers(&config).context("Failed to initialize provider")?;
    let kb = KnowledgeBase::open(config, providers, Arc::new(PdfPageExtractor))
        .await
        .context("Failed to open knowledge base")?;
    let kb = Arc::new(kb);

    if args.api {
        run_api_server(kb, args.port).await
    } else {
        run_cli_mode(kb).await
    }
}

async fn run_cli_mode(kb: Arc<KnowledgeBase>) -> anyhow::Result<()> {
    if !kb.is_loaded() {
        match kb.build_if_missing().await {
            Ok(true) => println!("{}", "✅ Index built from papers folder".green()),
            Ok(false) => println!("{}", "📭 No index yet. Upload a PDF to get started.".yellow()),
            Err(e) => println!("{}", format!("Index build failed: {}", e).red()),
        }
    }

    let handler = CommandHandler::new(kb);
    if let Err(e) = handler.handle_command("help").await {
        println!("{}", e.red());
    }

    let mut rl = Editor::<(), DefaultHistory>::new()?;

    loop {
        match rl.readline("❓ ") {
            Ok(line) => {
                let input = line.trim();
                let _ = rl.add_history_entry(input);

                match handler.handle_command(input).await {
                    Ok(Flow::Exit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => println!("{}", e.red()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}

async fn run_api_server(kb: Arc<KnowledgeBase>, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = api::create_api(kb);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    log::info!("API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
