//! `halnav`: explore a HAL+JSON API from the command line.
//!
//! Provides four subcommands:
//!
//! - **`show`**: print the state of the resource at the end of a path.
//! - **`links`**: list the outbound links of that resource.
//! - **`pages`**: walk a `next`-linked sequence starting there.
//! - **`docs`**: print the documentation URI of a relation.
//!
//! A path is a list of relation steps after the root URI. `rel[name]` picks
//! the link with that name from a multi-valued relation, `rel[2]` picks by
//! position. `--var name=value` fills in a templated link at the end.

use std::process;

use clap::{Parser, Subcommand};
use halnav::{Credentials, Link, NavError, Node, OnError, Path, Relation, Step, Variables};
use halnav_client::{ClientConfig, PrintViewer};
use serde_json::Value;
use tracing::debug;

/// halnav: HAL+JSON API navigator
#[derive(Parser)]
#[command(name = "halnav", version, about, long_about = None)]
struct Cli {
    /// Default curie prefix for short relation names.
    #[arg(long, global = true, env = "HALNAV_CURIE")]
    curie: Option<String>,

    /// Bearer token sent on every request.
    #[arg(long, global = true, env = "HALNAV_TOKEN", hide_env_values = true, conflicts_with = "user")]
    token: Option<String>,

    /// HTTP Basic user name.
    #[arg(long, global = true)]
    user: Option<String>,

    /// HTTP Basic password.
    #[arg(long, global = true, env = "HALNAV_PASSWORD", hide_env_values = true, requires = "user")]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the state of a resource as JSON.
    ///
    /// Examples:
    ///   halnav show https://api.example.com/
    ///   halnav show https://api.example.com/ orders 'items[2]'
    ///   halnav show https://api.example.com/ search --var q=blue
    Show {
        /// API root URI.
        root: String,
        /// Relation steps to follow from the root.
        rels: Vec<String>,
        /// Template variable for a templated link at the end: NAME=VALUE.
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
        /// Print error bodies instead of failing on 4xx/5xx.
        #[arg(long)]
        lenient: bool,
    },

    /// List the links of a resource.
    Links {
        root: String,
        rels: Vec<String>,
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },

    /// Walk `next` links, printing one line per page.
    Pages {
        root: String,
        rels: Vec<String>,
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
        /// Stop after this many pages.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the documentation URI of a relation.
    Docs {
        root: String,
        /// Relation to look up (curie form, short name, or URI).
        rel: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "halnav=warn,halnav_client=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("halnav: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), NavError> {
    match &cli.command {
        Command::Show {
            root,
            rels,
            vars,
            lenient,
        } => {
            let node = resolve(&connect(&cli, root), rels, vars)?;
            let on_error = if *lenient { OnError::Return } else { OnError::Raise };
            let state = node.state_with(on_error)?;
            eprintln!("{node}");
            print_json(&Value::Object(state));
        }

        Command::Links { root, rels, vars } => {
            let node = resolve(&connect(&cli, root), rels, vars)?;
            for list in &node.links()? {
                for link in list {
                    println!("{}", describe_link(link));
                }
            }
            for (rel, nodes) in node.embedded()?.iter() {
                println!("{rel}\t(embedded x{})", nodes.len());
            }
        }

        Command::Pages {
            root,
            rels,
            vars,
            limit,
        } => {
            let start = resolve(&connect(&cli, root), rels, vars)?;
            for page in start.pages().take(limit.unwrap_or(usize::MAX)) {
                let page = page?;
                let state = page.state()?;
                println!("{page}\t{} fields", state.len());
            }
        }

        Command::Docs { root, rel } => {
            let session = connect(&cli, root);
            session.root().open_docs(rel, &PrintViewer::stdout())?;
        }
    }
    Ok(())
}

/// Open a session from the environment plus command-line overrides.
fn connect(cli: &Cli, root: &str) -> halnav::Session {
    let mut config = ClientConfig::from_env().unwrap_or_else(|e| fatal(&e.to_string()));
    if let Some(prefix) = &cli.curie {
        config.default_curie = Some(prefix.clone());
    }
    let mut builder = halnav_client::builder(root, &config).unwrap_or_else(|e| fatal(&e.to_string()));
    if let Some(token) = &cli.token {
        builder = builder.credentials(Credentials::Bearer(token.clone()));
    } else if let Some(user) = &cli.user {
        builder = builder.credentials(Credentials::Basic {
            username: user.clone(),
            password: cli.password.clone(),
        });
    }
    builder.build().unwrap_or_else(|e| fatal(&e.to_string()))
}

/// Follow `rels` from the root and expand a trailing template with `vars`.
fn resolve(session: &halnav::Session, rels: &[String], vars: &[String]) -> Result<Node, NavError> {
    let mut path = Path::new();
    for raw in rels {
        for step in parse_step(raw) {
            path.push(step);
        }
    }
    debug!("cli: navigating {:?}", path.steps());
    match session.root().navigate(&path)? {
        Relation::Template(template) => {
            let bound = template.bind(&parse_vars(vars))?;
            bound.complete()
        }
        other if !vars.is_empty() => {
            fatal(&format!("--var given but the path does not end at a template ({})", describe(&other)))
        }
        other => other.into_resource(),
    }
}

/// `rel`, `rel[name]`, or `rel[3]`.
fn parse_step(raw: &str) -> Vec<Step> {
    let Some((rel, selector)) = raw.strip_suffix(']').and_then(|s| s.split_once('[')) else {
        return vec![Step::Rel(raw.to_string())];
    };
    let select = match selector.parse::<usize>() {
        Ok(i) => Step::Index(i),
        Err(_) => Step::Named(selector.to_string()),
    };
    vec![Step::Rel(rel.to_string()), select]
}

fn parse_vars(raw: &[String]) -> Variables {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .unwrap_or_else(|| fatal(&format!("invalid --var {pair:?}: expected NAME=VALUE")))
        })
        .collect()
}

fn describe(relation: &Relation) -> String {
    match relation {
        Relation::Resource(node) => node.to_string(),
        Relation::List(list) => format!("{} targets under {}", list.len(), list.rel()),
        Relation::Template(template) => template.to_string(),
    }
}

fn describe_link(link: &Link) -> String {
    let mut line = format!("{}\t{}", link.rel, link.href);
    if let Some(name) = link.name() {
        line.push_str(&format!("\tname={name}"));
    }
    if let Some(title) = link.title() {
        line.push_str(&format!("\ttitle={title:?}"));
    }
    if link.templated {
        line.push_str("\ttemplated");
    }
    line
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => fatal(&format!("cannot render JSON: {e}")),
    }
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("halnav: {msg}");
    process::exit(2);
}
