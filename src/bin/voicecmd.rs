//! CLI for exercising the command pipeline without audio hardware.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use voicecmd::credentials::EnvCredentialSource;
use voicecmd::functions::{FunctionMeta, FunctionRegistry, ParamType, ParameterMeta};
use voicecmd::llm::{DashScopeChatClient, LlmAssistant};
use voicecmd::nlu::{CommandMatcher, FunctionCatalog};
use voicecmd::VoiceConfig;

const BUILTIN_CATALOG: &str = include_str!("../../assets/catalog.json");

/// voicecmd: voice-command matching and tool dispatch.
#[derive(Parser)]
#[command(name = "voicecmd", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a JSON function catalog (overrides `nlu.catalog_path`).
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Also write logs to daily rolling files in this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Match text against the local catalog and execute complete commands.
    Match { text: String },

    /// Send text to the remote model and execute any tool calls it returns.
    Ask { text: String },

    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_deref())?;

    let config = load_config(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Command::Match { text } => run_match(&config, cli.catalog.as_deref(), &text),
        Command::Ask { text } => run_ask(&config, &text).await,
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("voicecmd=info"));
    let console = fmt::layer().with_writer(std::io::stderr).compact();

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .init();
        return Ok(None);
    };

    std::fs::create_dir_all(dir)?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "voicecmd.log"));
    let file = fmt::layer().with_writer(writer).with_ansi(false);
    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    info!(log_dir = %dir.display(), "file logging enabled");
    Ok(Some(guard))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<VoiceConfig> {
    if let Some(path) = path {
        return Ok(VoiceConfig::from_file(path)?);
    }
    let default_path = VoiceConfig::default_config_path();
    if default_path.is_file() {
        info!(path = %default_path.display(), "loading config");
        return Ok(VoiceConfig::from_file(&default_path)?);
    }
    Ok(VoiceConfig::default())
}

fn load_catalog(config: &VoiceConfig, flag: Option<&Path>) -> anyhow::Result<FunctionCatalog> {
    match flag.or(config.nlu.catalog_path.as_deref()) {
        Some(path) => Ok(FunctionCatalog::from_file(path)?),
        None => Ok(FunctionCatalog::from_json(BUILTIN_CATALOG)?),
    }
}

fn run_match(config: &VoiceConfig, catalog: Option<&Path>, text: &str) -> anyhow::Result<()> {
    let catalog = load_catalog(config, catalog)?;
    let registry = demo_registry();
    let mut matcher = CommandMatcher::new(catalog, config.nlu.command_limit)?;

    let tokens = matcher.tokenize(text);
    println!("tokens: {}", tokens.join(" | "));

    for candidate in matcher.process_tokens(&tokens) {
        println!("matched: {candidate}");
    }
    if !matcher.has_pending() {
        println!("no complete command");
        return Ok(());
    }
    println!("{}", matcher.execute_pending(&registry));
    Ok(())
}

async fn run_ask(config: &VoiceConfig, text: &str) -> anyhow::Result<()> {
    let client = DashScopeChatClient::new(config.llm.clone(), &EnvCredentialSource)?;
    let assistant = LlmAssistant::new(
        Arc::new(client),
        Arc::new(demo_registry()),
        config.llm.clone(),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match assistant.process(text, cancel).await? {
        Some(result) if result.has_tool_call => println!("{}", result.response),
        Some(result) => println!("model: {}", result.response),
        None => println!("cancelled"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Demo scene functions
// ---------------------------------------------------------------------------

const OBJECTS: [&str; 3] = ["cube", "sphere", "capsule"];

fn demo_registry() -> FunctionRegistry {
    let registry = FunctionRegistry::new();

    registry.register(
        FunctionMeta::new(
            "ModifyTransform",
            "Move, rotate or scale an object in the scene.",
            |args| {
                let object = args.string("objectName")?;
                let kind = args.string("transformType")?;
                let amount = args.number("number")?;
                info!(object = %object, kind = %kind, amount, "transform");
                Ok(match kind.as_str() {
                    "pitch" | "yaw" | "roll" => format!("{object} rotated ({kind}) by {amount} degrees"),
                    "scale" => format!("{object} scaled to {amount}"),
                    _ => format!("{object} moved {} by {amount} m", kind.trim_start_matches("move")),
                })
            },
        )
        .with_param(
            "objectName",
            ParameterMeta::new(ParamType::String, "Name of the object").with_enum(OBJECTS),
        )
        .with_param(
            "transformType",
            ParameterMeta::new(ParamType::String, "Which transform to apply").with_enum([
                "moveleft",
                "moveright",
                "movebackward",
                "moveforward",
                "moveup",
                "movedown",
                "pitch",
                "yaw",
                "roll",
                "scale",
            ]),
        )
        .with_param(
            "number",
            ParameterMeta::new(ParamType::Number, "Amount to change; never negative"),
        ),
    );

    registry.register(
        FunctionMeta::new("ChangeObjectColor", "Change the color of an object.", |args| {
            let object = args.string("objectName")?;
            let color = args.string("hexColor")?;
            info!(object = %object, color = %color, "recolor");
            Ok(format!("{object} color changed to {color}"))
        })
        .with_param(
            "objectName",
            ParameterMeta::new(ParamType::String, "Name of the object").with_enum(OBJECTS),
        )
        .with_param(
            "hexColor",
            ParameterMeta::new(ParamType::String, "Hex color code such as #FF0000"),
        ),
    );

    registry.register(
        FunctionMeta::new("SetTimeOfDay", "Set the scene time between 0 and 24 hours.", |args| {
            let hour = args.number("timeOfDay")?;
            info!(hour, "time of day");
            Ok(format!("time of day set to {hour}"))
        })
        .with_param("timeOfDay", ParameterMeta::new(ParamType::Number, "0-24")),
    );

    registry.register(
        FunctionMeta::new(
            "ReplaceCustomAnimMotion",
            "Play one of the character's supported animations.",
            |args| {
                let clip = args.string("clipName")?;
                info!(clip = %clip, "animation");
                Ok(format!("playing animation {clip}"))
            },
        )
        .with_param(
            "clipName",
            ParameterMeta::new(ParamType::String, "Animation name, matched exactly").with_enum([
                "aerial_cartwheel",
                "greeting_or_goodbye_wave",
                "sing_gesture",
                "backflip_somersault",
                "check_backside_then_shrug",
            ]),
        ),
    );

    for (name, mood) in [("SetExpressionHappy", "happy"), ("SetExpressionSad", "sad")] {
        registry.register(FunctionMeta::new(
            name,
            format!("Make the character look {mood}."),
            move |_| {
                info!(mood, "expression");
                Ok(format!("expression set to {mood}"))
            },
        ));
    }

    registry
}
