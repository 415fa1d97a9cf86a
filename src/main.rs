use std::io::Write;
use std::sync::Arc;

use chatstream_rs::config::{load_config, ClientConfig};
use chatstream_rs::observability::init_tracing;
use chatstream_rs::{
    AccumulatedMessage, CallParams, ChatClient, MemoryHistoryStore, Message, StreamOptions,
    UpdateCallback,
};
use parking_lot::Mutex;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const CONVERSATION_ID: &str = "cli";

fn usage() -> ! {
    eprintln!("Usage: chatstream [CONFIG.yaml] PROMPT...");
    std::process::exit(2);
}

fn main() {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = if args
        .first()
        .is_some_and(|arg| arg.ends_with(".yaml") || arg.ends_with(".yml"))
    {
        args.remove(0)
    } else {
        DEFAULT_CONFIG_PATH.to_string()
    };
    if args.is_empty() {
        usage();
    }
    let prompt = args.join(" ");

    let config = load_config(&config_path).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to start runtime: {e}");
            std::process::exit(1);
        });

    let code = runtime.block_on(run(config, prompt));
    std::process::exit(code);
}

/// Print only what each snapshot adds beyond the previous one.
fn printing_callback() -> UpdateCallback {
    let printed = Mutex::new((0usize, 0usize));
    Arc::new(move |_: &str, snapshot: AccumulatedMessage| {
        let mut printed = printed.lock();
        let (content_seen, reasoning_seen) = *printed;
        if let Some(new) = snapshot.reasoning_content.get(reasoning_seen..) {
            let mut stderr = std::io::stderr().lock();
            let _ = stderr.write_all(new.as_bytes());
            let _ = stderr.flush();
        }
        if let Some(new) = snapshot.content.get(content_seen..) {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(new.as_bytes());
            let _ = stdout.flush();
        }
        *printed = (snapshot.content.len(), snapshot.reasoning_content.len());
    })
}

async fn run(config: ClientConfig, prompt: String) -> i32 {
    let client = match ChatClient::from_config(&config) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };

    let params = CallParams::new(vec![Message::user(prompt)], config.api.clone())
        .with_user_language(config.features.user_language.clone());
    let call = client.call_api(
        params,
        Arc::new(MemoryHistoryStore::new()),
        CONVERSATION_ID,
        printing_callback(),
        StreamOptions::from_features(&config.features),
    );

    let cancel = call.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    match call.start_streaming().await {
        Ok(Some(_)) => {
            println!();
            0
        }
        Ok(None) => {
            eprintln!("\ncancelled");
            130
        }
        Err(err) => {
            eprintln!("\n{err}");
            1
        }
    }
}
