use crate::cli::{Cli, Commands, DefaultsCommands, PresetCommands};
use anyhow::{Context, Result, bail};
use hbctl::config::Config;
use hbctl::engine::{
    self, EncoderLauncher, JobOutcome, JobSupervisor, OptionEditor, PresetStore,
    SupervisorMessage, post_action_hook,
};
use hbctl::logging;
use std::path::PathBuf;
use std::process;
use std::sync::mpsc::Receiver;
use std::thread;
use tracing::{debug, info};

/// Config plus where it came from
struct AppContext {
    config_path: PathBuf,
    config: Config,
}

impl AppContext {
    fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path,
            None => Config::config_path()?,
        };
        let config = Config::load_from(&config_path)?;
        Ok(Self {
            config_path,
            config,
        })
    }

    fn preset_store(&self) -> Result<PresetStore> {
        Ok(PresetStore::open(self.config.presets_path()?))
    }

    fn supervisor(&self) -> JobSupervisor {
        let encoder = &self.config.encoder;
        let launcher =
            EncoderLauncher::new(encoder.executable.clone()).with_extra_args(&encoder.extra_args);
        JobSupervisor::new(launcher, post_action_hook(self.config.defaults.after_encode))
    }
}

pub fn run(cli: Cli) {
    let ctx = match AppContext::load(cli.config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    if let Err(e) = logging::init(&ctx.config.logging, cli.verbose) {
        eprintln!("Warning: {:#}", e);
    }

    let result = match cli.command {
        Commands::Encode {
            query,
            label,
            preset,
        } => handle_encode(&ctx, query, label, preset),
        Commands::Queue { queries } => handle_queue(&ctx, queries),
        Commands::Decode { query } => handle_decode(&query),
        Commands::Normalize { query } => handle_normalize(&query),
        Commands::X264 { options } => handle_x264(&options),
        Commands::Presets { action } => handle_presets(&ctx, action),
        Commands::Defaults { action } => handle_defaults(ctx, action),
        Commands::InitConfig => handle_init_config(&ctx),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Log encoder output until the supervisor goes away
fn spawn_output_logger(messages: Receiver<SupervisorMessage>) {
    thread::spawn(move || {
        for message in messages {
            match message {
                SupervisorMessage::Output { job_id, line, .. } => {
                    debug!(target: logging::ENCODER_TARGET, %job_id, "{}", line);
                }
                SupervisorMessage::JobStarted { job } => {
                    let label = job.label.as_deref().unwrap_or("-");
                    info!(job_id = %job.id, label, "encoding");
                }
                SupervisorMessage::JobFinished { .. } | SupervisorMessage::JobFailed { .. } => {}
            }
        }
    });
}

fn print_outcome(outcome: &JobOutcome) {
    let name = outcome
        .job
        .label
        .clone()
        .unwrap_or_else(|| outcome.job.id.to_string());
    let elapsed = outcome.finished_at - outcome.job.started_at;
    match outcome.exit_code {
        Some(code) if outcome.success => {
            println!("{}: finished (exit {}) in {}s", name, code, elapsed.num_seconds())
        }
        Some(code) => println!("{}: encoder exited with status {}", name, code),
        None => println!("{}: encoder was terminated by a signal", name),
    }
}

fn handle_encode(
    ctx: &AppContext,
    query: Option<String>,
    label: Option<String>,
    preset: Option<String>,
) -> Result<()> {
    let (query, label) = match preset {
        Some(name) => {
            let query = ctx
                .preset_store()?
                .apply(&name)
                .with_context(|| format!("No preset named '{}'", name))?;
            (query, label.or(Some(name)))
        }
        None => (query.context("No query given")?, label),
    };

    let supervisor = ctx.supervisor();
    spawn_output_logger(supervisor.messages());

    let outcome = supervisor.submit(&query, label)?.wait_for_exit()?;
    print_outcome(&outcome);
    if !outcome.success {
        bail!("encode failed");
    }
    Ok(())
}

fn handle_queue(ctx: &AppContext, queries: Vec<String>) -> Result<()> {
    let supervisor = ctx.supervisor();
    spawn_output_logger(supervisor.messages());

    for (i, query) in queries.iter().enumerate() {
        supervisor.enqueue(query, Some(format!("job {}", i + 1)));
    }

    let mut failures = 0;
    while let Some(handle) = supervisor
        .advance()
        .with_context(|| format!("{} job(s) left in queue", supervisor.pending_len()))?
    {
        let outcome = handle.wait_for_exit()?;
        print_outcome(&outcome);
        if !outcome.success {
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{} of {} encodes failed", failures, queries.len());
    }
    Ok(())
}

fn handle_decode(query: &str) -> Result<()> {
    let config = engine::decode_query(query)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn handle_normalize(query: &str) -> Result<()> {
    let config = engine::normalize(engine::decode_query(query)?);
    println!("{}", engine::encode_query(&config));
    Ok(())
}

fn handle_x264(options: &str) -> Result<()> {
    let mut editor = OptionEditor::new();
    editor.edit(options);
    let settings = editor.commit()?.clone();
    println!("{}", editor.text());
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn handle_presets(ctx: &AppContext, action: PresetCommands) -> Result<()> {
    let store = ctx.preset_store()?;
    match action {
        PresetCommands::List => {
            for name in store.snapshot().names() {
                println!("{}", name);
            }
        }
        PresetCommands::Show { name } => {
            let query = store
                .apply(&name)
                .with_context(|| format!("No preset named '{}'", name))?;
            println!("{}", query);
        }
        PresetCommands::Add { name, query } => {
            // Store the canonical form so equal settings diff cleanly
            let config = engine::decode_query(&query)
                .with_context(|| format!("Preset '{}' has an invalid query", name))?;
            store.add(&name, &engine::encode_query(&config))?;
            println!("Saved preset '{}' to {}", name, store.path().display());
        }
        PresetCommands::Remove { name } => {
            if store.remove(&name)? {
                println!("Removed preset '{}'", name);
            } else {
                println!("No preset named '{}'", name);
            }
        }
        PresetCommands::Reset => {
            store.reset()?;
            println!("Cleared presets in {}", store.path().display());
        }
        PresetCommands::Default => match store.snapshot().default_preset_name() {
            Some(name) => println!("{}", name),
            None => println!("No default preset"),
        },
    }
    Ok(())
}

fn handle_defaults(mut ctx: AppContext, action: DefaultsCommands) -> Result<()> {
    match action {
        DefaultsCommands::Save { query } => {
            engine::save_user_defaults(&mut ctx.config, &query)?;
            ctx.config.save_to(&ctx.config_path)?;
            println!("Saved default query to {}", ctx.config_path.display());
        }
        DefaultsCommands::Show => {
            let catalog = ctx.preset_store()?.snapshot();
            let config = engine::initial_config(&ctx.config, &catalog);
            println!("{}", engine::encode_query(&config));
        }
    }
    Ok(())
}

fn handle_init_config(ctx: &AppContext) -> Result<()> {
    // Loading writes a default file best-effort; retry so a failure is reported
    if Config::ensure_default(&ctx.config_path)? {
        println!("Created default config at: {}", ctx.config_path.display());
    } else {
        println!("Config file: {}", ctx.config_path.display());
    }
    println!("Encoder: {}", ctx.config.encoder.executable);
    println!("Presets: {}", ctx.config.presets_path()?.display());
    println!("After encode: {}", ctx.config.defaults.after_encode);
    Ok(())
}
