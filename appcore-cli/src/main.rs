//! appcore - command-line host for the Appcore runtime
//!
//! Wires an `AppRuntime` from configuration and exposes its operations:
//! cached queries, mutations, locale selection and translation lookup.

use clap::{Parser, Subcommand};
use libappcore::http::Method;
use libappcore::locale::{LoadOutcome, Locale};
use libappcore::{AppCoreError, AppRuntime, Config, QueryKey, Result, UnauthorizedBehavior};
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "appcore")]
#[command(version)]
#[command(about = "Query the backend and manage the app locale")]
#[command(long_about = "\
appcore - command-line host for the Appcore runtime

DESCRIPTION:
    appcore builds the same runtime the app uses (endpoint resolution, query
    cache, locale store) and exposes its operations from the shell.

COMMANDS:
    origin      Print the resolved API origin
    get         Fetch a query key (GET) and print the JSON result
    send        Run a mutation (any method) and print the response body
    locale      Show or change the active locale
    translate   Translate a key in the active locale

USAGE EXAMPLES:
    # Where are requests going?
    appcore origin

    # Fetch the signed-in user, printing null when not authenticated
    appcore get /api/user --on-unauthorized returnNull

    # Query keys made of several segments
    appcore get api items 42

    # Create an item
    appcore send POST /api/items --data '{\"name\": \"widget\"}'

    # Switch to Arabic (right-to-left)
    appcore locale set ar

    # Look up a display string
    appcore translate settings

CONFIGURATION:
    Configuration file: ~/.config/appcore/config.toml

    Override with environment variables:
        APPCORE_CONFIG       - Path to config file
        APPCORE_API_HOST     - API host (scheme is derived from the host)
        APPCORE_LOG_FORMAT   - Log format: text, json, pretty
        APPCORE_LOG_LEVEL    - Log level when not verbose

EXIT CODES:
    0 - Success
    1 - Request, storage or configuration error
    2 - Not authenticated (HTTP 401/403)
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: text or json
    #[arg(short, long, global = true, default_value = "text")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved API origin
    Origin,

    /// Fetch a query key and print the JSON result
    Get {
        /// Query key segments, joined with '/'
        #[arg(required = true, num_args = 1..)]
        segments: Vec<String>,

        /// What to do on HTTP 401: returnNull or throw
        #[arg(long, default_value = "throw")]
        on_unauthorized: UnauthorizedBehavior,
    },

    /// Run a mutation and print the response body
    Send {
        /// HTTP method (POST, PUT, PATCH, DELETE, ...)
        method: String,

        /// Request path or absolute URL
        path: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Show or change the active locale
    Locale {
        #[command(subcommand)]
        action: LocaleAction,
    },

    /// Translate a key in the active locale
    Translate {
        /// Translation key
        key: String,
    },
}

#[derive(Subcommand, Debug)]
enum LocaleAction {
    /// Show the active locale and direction
    Show,

    /// Persist and activate a locale (en or ar)
    Set {
        locale: Locale,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libappcore::logging::init_default("error", cli.verbose);

    // Run the main logic and handle errors
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default()?;
    let runtime = AppRuntime::from_config(&config).await?;
    let json_output = cli.format == "json";

    match cli.command {
        Commands::Origin => {
            let endpoint = runtime.resolver().resolve_origin();
            if json_output {
                print_json(&json!({
                    "scheme": endpoint.scheme,
                    "host": endpoint.host,
                    "origin": endpoint.origin(),
                }));
            } else {
                println!("{}", endpoint.origin());
            }
        }

        Commands::Get {
            segments,
            on_unauthorized,
        } => {
            let key = QueryKey::from(segments);
            tracing::debug!(key = %key, policy = %on_unauthorized, "Fetching query");
            let value = runtime
                .queries()
                .fetch_query(&key, on_unauthorized)
                .await?
                .unwrap_or(Value::Null);
            print_json(&value);
        }

        Commands::Send { method, path, data } => {
            let method: Method = method
                .to_uppercase()
                .parse()
                .map_err(|_| AppCoreError::InvalidInput(format!("Invalid HTTP method: {}", method)))?;
            let body = data
                .map(|raw| {
                    serde_json::from_str::<Value>(&raw).map_err(|e| {
                        AppCoreError::InvalidInput(format!("--data is not valid JSON: {}", e))
                    })
                })
                .transpose()?;

            let response = runtime.queries().mutate(method, &path, body).await?;
            if !response.body.is_empty() {
                println!("{}", response.body);
            }
        }

        Commands::Locale { action } => match action {
            LocaleAction::Show => {
                print_locale(&runtime, json_output, None);
            }
            LocaleAction::Set { locale } => {
                let signal = runtime.set_locale(locale).await;
                if signal.is_required() {
                    // Direction changed: come back up as a fresh session
                    runtime.restart().await;
                }
                print_locale(&runtime, json_output, Some(signal.is_required()));
            }
        },

        Commands::Translate { key } => {
            let text = runtime.locale().translate(&key);
            if json_output {
                print_json(&json!({
                    "key": key,
                    "locale": runtime.locale().locale(),
                    "text": text,
                }));
            } else {
                println!("{}", text);
            }
        }
    }

    Ok(())
}

fn print_locale(runtime: &AppRuntime, json_output: bool, restarted: Option<bool>) {
    let store = runtime.locale();
    let source = match runtime.load_outcome() {
        LoadOutcome::Loaded(_) => "stored".to_string(),
        LoadOutcome::Defaulted(reason) => format!("default ({})", reason),
    };

    if json_output {
        let mut value = json!({
            "locale": store.locale(),
            "direction": store.direction(),
            "source": source,
        });
        if let Some(restarted) = restarted {
            value["restarted"] = Value::Bool(restarted);
        }
        print_json(&value);
        return;
    }

    let direction = if store.is_rtl() { "rtl" } else { "ltr" };
    println!("{} ({})", store.locale(), direction);
    if restarted == Some(true) {
        println!("{}", store.translate("language_restart_notice"));
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}
