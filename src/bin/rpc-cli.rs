use std::error::Error;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use rpc_tree::auth::{KeyRing, Lifetime, TokenData};
use rpc_tree::client::{CallOptions, CallResult, CallTarget, Client};

#[derive(Parser)]
#[command(name = "rpc-cli")]
#[command(about = "Call route-tree endpoints and work with signed tokens", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a query route (GET), e.g. `query auth.login '{"username":"u"}'`
    Query {
        /// Dotted route path
        path: String,
        /// JSON object sent as the query string
        #[arg(default_value = "null")]
        data: String,
        #[command(flatten)]
        call: CallArgs,
    },
    /// Call a mutation route (POST)
    Mutate {
        /// Dotted route path
        path: String,
        /// JSON body
        #[arg(default_value = "null")]
        data: String,
        #[command(flatten)]
        call: CallArgs,
    },
    /// Sign a JSON payload with the last of the given secrets
    Sign {
        payload: String,
        #[arg(short, long = "secret", required = true)]
        secrets: Vec<String>,
        #[arg(short, long, default_value = "7d")]
        lifetime: Lifetime,
    },
    /// Verify a token against the given secrets and print its contents
    Verify {
        token: String,
        #[arg(short, long = "secret", required = true)]
        secrets: Vec<String>,
    },
}

#[derive(clap::Args)]
struct CallArgs {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Bearer token sent in the Authorization header
    #[arg(short, long)]
    bearer: Option<String>,

    #[arg(short, long, default_value_t = 30)]
    timeout_secs: u64,
}

impl CallArgs {
    fn target(&self, path: &str) -> Result<CallTarget, Box<dyn Error>> {
        let client = Client::new(&self.url)?;
        Ok(path
            .split('.')
            .filter(|segment| !segment.is_empty())
            .fold(client.root(), |target, segment| target.at(segment)))
    }

    fn options(&self) -> CallOptions {
        let options = CallOptions::new().timeout(Duration::from_secs(self.timeout_secs));
        match &self.bearer {
            Some(token) => options.bearer(token),
            None => options,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Query { path, data, call } => {
            let input: Value = serde_json::from_str(&data)?;
            let result: CallResult<Value, Value> =
                call.target(&path)?.query(&input, call.options()).await?;
            print_result(&result)?;
        }
        Commands::Mutate { path, data, call } => {
            let input: Value = serde_json::from_str(&data)?;
            let result: CallResult<Value, Value> =
                call.target(&path)?.mutate(&input, call.options()).await?;
            print_result(&result)?;
        }
        Commands::Sign {
            payload,
            secrets,
            lifetime,
        } => {
            let payload: Value = serde_json::from_str(&payload)?;
            let ring = KeyRing::new(&secrets)?.with_lifetime(lifetime);
            println!("{}", ring.sign(&payload)?);
        }
        Commands::Verify { token, secrets } => {
            let ring = KeyRing::new(&secrets)?;
            let data: TokenData<Value> = ring.verify(&token)?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
    }

    Ok(())
}

fn print_result(result: &CallResult<Value, Value>) -> Result<(), Box<dyn Error>> {
    let rendered = serde_json::to_string_pretty(result)?;
    if result.is_success() {
        println!("{rendered}");
    } else {
        eprintln!("{rendered}");
    }
    Ok(())
}
