use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use weft::{
    EventSink, TracingEventSink, Weaver,
    adapters::FanoutEventSink,
    config::{
        WeaverConfig, WeaverConfigValidator,
        loader::{load_config, load_config_unchecked, render_toml},
    },
    core::{
        StaticMatch,
        dispatch::{DispatchStrategyFactory, StrategyKind},
        signature::simple_name,
    },
    metrics::{self, MetricsEventSink},
    tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "weft.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file (default)
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "weft.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "weft.toml")]
        config: String,
    },
    /// Show which operations of the catalog a pointcut selects
    Match {
        #[clap(short, long, default_value = "weft.toml")]
        config: String,
        /// Pointcut expression; named pointcuts from the config are available
        #[clap(short, long)]
        expr: String,
        /// Evaluate `bean(..)` as if the operations belonged to this bean
        #[clap(short, long)]
        bean: Option<String>,
    },
    /// Print the advice chain every operation of a type would get
    Plan {
        #[clap(short, long, default_value = "weft.toml")]
        config: String,
        /// Target type, qualified or simple name
        #[clap(short = 't', long = "type")]
        type_name: String,
        /// Bean name; defaults to the simple type name in lower camel case
        #[clap(short, long)]
        bean: Option<String>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config),
        Some(Commands::Init { config }) => init_config_command(&config),
        Some(Commands::Match { config, expr, bean }) => {
            match_command(&config, &expr, bean.as_deref())
        }
        Some(Commands::Plan {
            config,
            type_name,
            bean,
        }) => plan_command(&config, &type_name, bean.as_deref()),
        None => validate_config_command(&args.config),
    }
}

/// Load the config, install logging from it and build the weaver.
fn bootstrap(config_path: &str) -> Result<Weaver> {
    let config = load_config(config_path)?;

    tracing_setup::init_tracing_with_config(
        &config.logging.level,
        config.logging.json,
        config.logging.include_spans,
    )
    .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;
    metrics::init_metrics().map_err(|e| eyre!("Failed to initialize metrics: {}", e))?;

    let span = tracing_setup::configure_component_tracing("cli");
    let _guard = span.enter();

    let events: Arc<dyn EventSink> = Arc::new(
        FanoutEventSink::new()
            .with(Arc::new(TracingEventSink))
            .with(Arc::new(MetricsEventSink::new())),
    );
    Weaver::from_config(&config, events)
        .with_context(|| format!("Failed to build weaver from {config_path}"))
}

fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    // First check if file exists and is readable
    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config_unchecked(config_path) {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    match WeaverConfigValidator::validate(&config) {
        Ok(()) => {
            let advice: usize = config.aspects.iter().map(|a| a.advice.len()).sum();
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Types: {}", config.types.len());
            println!("   • Named pointcuts: {}", config.pointcuts.len());
            println!("   • Aspects: {} ({advice} advice)", config.aspects.len());
            println!("   • Prefer subtype stand-ins: {}", config.proxy.target_class);
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Refer to named pointcuts as name(), with snake_case names");
            println!("   • Declare every type used by args/this/target under [[types]]");
            println!("   • Interceptors are log, trace, timing or retry");
            std::process::exit(1);
        }
    }
}

fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let rendered = render_toml(&WeaverConfig::sample())?;
    let contents = format!("# weft configuration\n\n{rendered}");
    std::fs::write(path, contents).context("Failed to write config file")?;
    println!("✅ Created sample configuration at: {config_path}");
    println!("   Run 'weft plan --config {config_path} --type OrderService' to inspect it");
    Ok(())
}

fn match_command(config_path: &str, expression: &str, bean: Option<&str>) -> Result<()> {
    let weaver = bootstrap(config_path)?;
    let decisions = weaver
        .scan(expression, bean)
        .with_context(|| format!("Failed to evaluate '{expression}'"))?;

    println!("🔍 {expression}");
    let mut selected = 0;
    for (signature, decision) in &decisions {
        let marker = match decision {
            StaticMatch::Always => "✅",
            StaticMatch::Maybe => "❔",
            StaticMatch::Never => continue,
        };
        selected += 1;
        println!("   {marker} {signature} [{decision}]");
    }
    println!();
    println!("{selected} of {} operations may be selected", decisions.len());
    Ok(())
}

fn default_bean_name(type_name: &str) -> String {
    let simple = simple_name(type_name);
    let mut chars = simple.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn plan_command(config_path: &str, type_name: &str, bean: Option<&str>) -> Result<()> {
    let weaver = bootstrap(config_path)?;
    let registry = weaver.registry();
    let owner = registry.resolve(type_name)?.to_string();
    let bean_name = bean.map(str::to_string).unwrap_or_else(|| default_bean_name(&owner));

    let plan = weaver.plan(&bean_name, &owner)?;
    let strategy = if plan.iter().any(|op| op.is_advised()) {
        DispatchStrategyFactory::select(weaver.proxy_config(), &bean_name, registry, &owner)
    } else {
        StrategyKind::Direct
    };

    println!("📋 Bean '{bean_name}' ({owner})");
    match DispatchStrategyFactory::create_strategy(strategy).prepare(registry, &owner) {
        Ok(prepared) => {
            println!("   Strategy: {strategy}");
            println!("   Viewable as: {}", prepared.exposed.join(", "));
        }
        Err(e) => println!("   ❌ Strategy {strategy} cannot wrap this type: {e}"),
    }
    println!();

    for operation in &plan {
        println!("   • {}", operation.signature);
        if operation.signature.is_final && strategy == StrategyKind::Subtype {
            println!("       (final, called directly)");
            continue;
        }
        for (position, m) in operation.matches.iter().enumerate() {
            let check = if m.decision == StaticMatch::Maybe {
                ", checked per call"
            } else {
                ""
            };
            println!(
                "       {}. {} ({}{check})",
                position + 1,
                m.advisor.name,
                m.advisor.kind()
            );
        }
    }
    Ok(())
}
