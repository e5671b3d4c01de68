use std::io::BufRead;
use std::io::Write as _;

use clap::Parser;
use clap::Subcommand;
use minerva::client::ChatClient;
use minerva::client::HttpChatTransport;
use minerva::config::AppConfig;
use minerva::render;
use minerva::Result;
use tracing::info;

#[derive(Parser)]
#[command(name = "minerva")]
#[command(about = "Minerva: retrieval-augmented chat over romance book reviews")]
#[command(version)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
        /// Enable CORS for browser clients
        #[arg(long)]
        cors: bool,
    },
    /// Interactive chat against a running server
    Chat {
        /// Server endpoint
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        endpoint: String,
        /// User id for rate limiting
        #[arg(long)]
        user: Option<String>,
    },
    /// Validate the configuration file and report resolved settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;

    if cli.verbose {
        // Default filter raises minerva to debug.
        minerva::logging::init_logging(None)?;
    } else {
        minerva::logging::init_logging(Some(&config))?;
    }
    info!("Configuration loaded successfully");

    match cli.command {
        Commands::Serve { host, port, cors } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let cors = cors || config.server.enable_cors;
            minerva::api::serve_api(config, host, port, cors).await?;
        }
        Commands::Chat { endpoint, user } => {
            run_chat(&config, endpoint, user).await?;
        }
        Commands::CheckConfig => {
            check_config(&config);
        }
    }

    Ok(())
}

/// Interactive terminal chat loop. Each turn streams the reply,
/// then the parsed book cards and prose are printed together.
async fn run_chat(config: &AppConfig, endpoint: String, user: Option<String>) -> Result<()> {
    let transport = HttpChatTransport::new(endpoint)?;
    let mut client = ChatClient::new(transport, &config.chat, user);

    println!("Minerva chat. Ask about romance books; empty line exits.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        match client.send(question, |_| {}).await {
            Ok(reply) => print_reply(&reply.content),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}

fn print_reply(raw: &str) {
    // Plain prose for the terminal; the HTML conversion is for browser
    // clients only.
    let Some(extraction) = render::parser::extract(raw) else {
        // Mid-stream shape in a final reply; show it as-is.
        println!("{raw}");
        return;
    };

    for book in &extraction.books {
        let mut line = format!("* {} by {}", book.title, book.author);
        if !book.grade.is_empty() {
            line.push_str(&format!(" [grade {}]", book.grade));
        }
        if !book.review_url.is_empty() {
            line.push_str(&format!(" <{}>", book.review_url));
        }
        println!("{line}");
    }
    if !extraction.books.is_empty() {
        println!();
    }

    println!("{}", extraction.prose);
}

fn check_config(config: &AppConfig) {
    println!("server:     {}:{}", config.server.host, config.server.port);
    println!("model:      {}", config.generation.model);
    println!("embeddings: {}", config.retrieval.embedding_model);
    match config.index_host() {
        Ok(host) => println!("index:      {host}"),
        Err(e) => println!("index:      NOT SET ({e})"),
    }
    match config.generation_key() {
        Ok(_) => println!("generation key: present"),
        Err(e) => println!("generation key: MISSING ({e})"),
    }
    match config.retrieval_key() {
        Ok(_) => println!("retrieval key:  present"),
        Err(e) => println!("retrieval key:  MISSING ({e})"),
    }
    println!(
        "chat: timeout {}s, update interval {}ms, history window {}",
        config.chat.stream_timeout_secs, config.chat.update_interval_ms, config.chat.history_window
    );
    println!(
        "rate limit: {} requests / {}s",
        config.rate_limit.max_requests, config.rate_limit.window_secs
    );
}
