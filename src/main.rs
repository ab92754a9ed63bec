use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

use pgask::config::{Config, Overrides};
use pgask::db::{parse_connection_string, resolve_password, PgDatabase};
use pgask::history::QuestionHistory;
use pgask::llm::OllamaClient;
use pgask::pipeline::Pipeline;
use pgask::ui::{self, App};

/// Ask a PostgreSQL database questions in plain language
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Config file (default: <config dir>/pgask/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model name served by Ollama, e.g. llama3.1
    #[arg(long, global = true, env = "PGASK_MODEL")]
    model: Option<String>,

    /// PostgreSQL connection string
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Ollama base URL
    #[arg(long, global = true, env = "OLLAMA_HOST")]
    ollama_host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the JSON API
    Serve {
        /// Address to listen on, e.g. 0.0.0.0:8000
        #[arg(long)]
        listen: Option<String>,
    },
    /// Answer one question and exit
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive terminal dashboard
    Dashboard,
    /// List the tables the model can see
    Tables,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI args (before entering raw mode so --help / errors print normally)
    let cli = Cli::parse();

    let dashboard = matches!(cli.command, Command::Dashboard);
    init_logging(dashboard)?;

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply(&Overrides {
        model: cli.model.clone(),
        database_url: cli.database_url.clone(),
        ollama_host: cli.ollama_host.clone(),
        listen: match &cli.command {
            Command::Serve { listen } => listen.clone(),
            _ => None,
        },
    });
    config.validate()?;

    let (pipeline, label) = build_pipeline(&config).await?;

    match cli.command {
        Command::Serve { .. } => {
            let addr = config.listen_addr()?;
            pgask::server::serve(addr, pipeline).await
        }
        Command::Ask { question, json } => ask(&pipeline, &question.join(" "), json).await,
        Command::Dashboard => run_dashboard(pipeline, label).await,
        Command::Tables => {
            for table in pipeline.database().usable_table_names().await? {
                println!("{}", table);
            }
            Ok(())
        }
    }
}

fn init_logging(to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pgask=info"));

    if to_file {
        // The dashboard owns the terminal
        let path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pgask")
            .join("pgask.log");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

async fn build_pipeline(config: &Config) -> Result<(Arc<Pipeline>, String)> {
    let mut pg_config =
        parse_connection_string(config.database_url()?, &config.database.search_schema)?;
    resolve_password(&mut pg_config, true)?;

    let db = PgDatabase::connect(pg_config, &config.database, config.schema.sample_rows).await?;
    let label = db.display_string().to_string();

    let model = OllamaClient::new(config.model()?, &config.llm)
        .context("Failed to set up the model client")?;

    let pipeline = Pipeline::new(Arc::new(db), Arc::new(model), config.schema.scope());
    Ok((Arc::new(pipeline), label))
}

async fn ask(pipeline: &Pipeline, question: &str, json: bool) -> Result<()> {
    let result = pipeline.run(question).await?.formatted();

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("SQL Query:\n{}\n", result.sql_query);
        println!("Output:\n{}\n", result.output);
        println!("Answer:\n{}", result.natural_language_response);
    }
    Ok(())
}

async fn run_dashboard(pipeline: Arc<Pipeline>, label: String) -> Result<()> {
    let history_path = QuestionHistory::default_path();
    let history = QuestionHistory::load_from(&history_path).unwrap_or_default();
    let mut app = App::new(pipeline, label).with_history(history, history_path);
    app.load_tables().await;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events (ignore release/repeat)
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                // Global quit: Ctrl+Q or Ctrl+D
                if (key.code == KeyCode::Char('q') || key.code == KeyCode::Char('d'))
                    && key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    return Ok(());
                }

                app.handle_input(key).await?;

                if app.should_quit {
                    return Ok(());
                }
            }
        }

        app.tick().await?;
    }
}
